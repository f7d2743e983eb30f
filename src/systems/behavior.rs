//! Behavior state machine: Advance / Engage / Retreat.
//!
//! The decision logic is `Brain::tick`, a pure function of a `BrainContext`
//! (positions already resolved, stale references already dropped). The
//! systems around it gather the context, apply the output to the navigator
//! and follower, and handle knockback.
//!
//! State transitions are evaluated every tick; only the destination refresh
//! is throttled, by both the update scheduler and the repath interval.
//!
//! ## Data Access
//! - `behavior_capability_system`: Reads Brain/NavAgent presence. Writes
//!   BehaviorDisabled (via Commands), UpdateScheduler.
//! - `knockback_system`: Reads SimTime, DamageInbox, Position. Writes Brain,
//!   Velocity, NavAgent.
//! - `behavior_system`: Reads SimTime, UpdateScheduler, NavSampler,
//!   RallyPoint, Position, Health. Writes Brain, NavAgent, Targeting, Follower.

use crate::components::*;
use crate::error::SimError;
use crate::navigation::{NavAgent, NavSampler};
use crate::systems::formation::Follower;
use crate::systems::scheduler::{SimTime, UpdateScheduler};
use crate::systems::targeting::Targeting;
use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, error};
use serde::{Deserialize, Serialize};

/// How far a retreating unit tries to step away per repath.
const RETREAT_STEP: f32 = 5.0;

/// Snap radius for knockback re-sync.
const KNOCKBACK_WARP_RADIUS: f32 = 1.0;

/// Source distance below which the knockback direction falls back to facing.
const KNOCKBACK_MIN_SOURCE_DISTANCE: f32 = 0.01;

// ============================================================================
// STATE AND CONFIG
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub enum BehaviorState {
    #[default]
    Advance,
    Engage,
    Retreat,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BehaviorConfig {
    /// Distance to target at which Advance switches to Engage.
    pub engage_radius: f32,
    /// Health fraction at or below which Engage turns into Retreat. 0 disables.
    pub retreat_health_threshold: f32,
    pub retreat_duration: f32,
    /// Max chase distance from target or formation slot before disengaging.
    pub leash_distance: f32,
    /// Minimum seconds between destination refreshes.
    pub repath_interval: f32,
    /// Impulse applied away from a damage source. 0 disables knockback.
    pub knockback_force: f32,
    pub knockback_duration: f32,
}

impl Default for BehaviorConfig {
    fn default() -> Self {
        Self {
            engage_radius: 10.0,
            retreat_health_threshold: 0.0,
            retreat_duration: 2.0,
            leash_distance: 20.0,
            repath_interval: 0.25,
            knockback_force: 3.0,
            knockback_duration: 0.2,
        }
    }
}

/// Global fallback objective for units without a resolved default target.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct RallyPoint(pub Option<Entity>);

/// Marker: this entity's behavior is switched off (missing capability).
#[derive(Component, Debug, Clone, Copy, Default)]
pub struct BehaviorDisabled;

/// Per-entity behavior controller.
#[derive(Component, Debug, Clone)]
pub struct Brain {
    pub config: BehaviorConfig,
    pub state: BehaviorState,
    pub retreat_end: f32,
    pub knockback_end: Option<f32>,
    /// Cached advance objective. Re-resolved when missing or stale.
    pub advance_target: Option<Entity>,
    pub next_repath: f32,
}

impl Brain {
    pub fn new(config: BehaviorConfig) -> Self {
        Self {
            config,
            state: BehaviorState::Advance,
            retreat_end: 0.0,
            knockback_end: None,
            advance_target: None,
            next_repath: 0.0,
        }
    }

    /// Override the advance objective (e.g. for scripted waves).
    pub fn set_chase_target(&mut self, target: Entity) {
        self.advance_target = Some(target);
    }

    pub fn is_knocked_back(&self) -> bool {
        self.knockback_end.is_some()
    }
}

impl Default for Brain {
    fn default() -> Self {
        Self::new(BehaviorConfig::default())
    }
}

// ============================================================================
// PURE DECISION LOGIC
// ============================================================================

/// Snapshot of everything one tick of the state machine looks at.
#[derive(Debug, Clone, Copy, Default)]
pub struct BrainContext {
    pub now: f32,
    pub position: Vec3,
    pub health_percent: Option<f32>,
    /// Position of the current target, already validated.
    pub target: Option<Vec3>,
    /// Position of the advance objective, already validated.
    pub advance_point: Option<Vec3>,
    pub has_follower: bool,
    pub follower_active: bool,
    /// Last known slot position of the follower.
    pub slot_position: Option<Vec3>,
    /// Scheduler says it's this entity's turn.
    pub scheduled: bool,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum FollowerCommand {
    #[default]
    Keep,
    Pause,
    Resume,
}

#[derive(Debug, Clone, Copy, PartialEq, Default)]
pub struct BrainOutput {
    pub destination: Option<Vec3>,
    pub follower: FollowerCommand,
    /// Drop the targeting engine's current target.
    pub clear_target: bool,
    /// Re-resolve the advance objective.
    pub refresh_advance_target: bool,
}

impl Brain {
    fn can_repath(&self, ctx: &BrainContext) -> bool {
        ctx.scheduled && ctx.now >= self.next_repath
    }

    fn mark_repathed(&mut self, now: f32) {
        self.next_repath = now + self.config.repath_interval;
    }

    fn disengage(&mut self, out: &mut BrainOutput) {
        out.clear_target = true;
        out.follower = FollowerCommand::Resume;
        self.state = BehaviorState::Advance;
    }

    /// Run one tick of the state machine.
    pub fn tick(&mut self, ctx: &BrainContext, nav: &NavSampler) -> BrainOutput {
        let mut out = BrainOutput::default();
        match self.state {
            BehaviorState::Advance => self.tick_advance(ctx, &mut out),
            BehaviorState::Engage => self.tick_engage(ctx, &mut out),
            BehaviorState::Retreat => self.tick_retreat(ctx, nav, &mut out),
        }
        out
    }

    fn tick_advance(&mut self, ctx: &BrainContext, out: &mut BrainOutput) {
        if let Some(target) = ctx.target {
            if ctx.position.distance(target) <= self.config.engage_radius {
                out.follower = FollowerCommand::Pause;
                self.state = BehaviorState::Engage;
                self.next_repath = ctx.now;
                return;
            }
        }

        // An active follower owns the destination while advancing.
        if ctx.has_follower && ctx.follower_active {
            return;
        }

        if self.can_repath(ctx) {
            if ctx.target.is_none() && ctx.advance_point.is_none() {
                out.refresh_advance_target = true;
            }
            out.destination = ctx.target.or(ctx.advance_point);
            self.mark_repathed(ctx.now);
        }
    }

    fn tick_engage(&mut self, ctx: &BrainContext, out: &mut BrainOutput) {
        let Some(target) = ctx.target else {
            self.disengage(out);
            return;
        };

        let threshold = self.config.retreat_health_threshold;
        if threshold > 0.0 && ctx.health_percent.is_some_and(|pct| pct <= threshold) {
            out.follower = FollowerCommand::Pause;
            self.state = BehaviorState::Retreat;
            self.retreat_end = ctx.now + self.config.retreat_duration;
            return;
        }

        if ctx.has_follower {
            if let Some(slot) = ctx.slot_position {
                if ctx.position.distance(slot) > self.config.leash_distance {
                    self.disengage(out);
                    return;
                }
            }
        }

        if ctx.position.distance(target) > self.config.leash_distance {
            self.disengage(out);
            return;
        }

        if self.can_repath(ctx) {
            out.destination = Some(target);
            self.mark_repathed(ctx.now);
        }
    }

    fn tick_retreat(&mut self, ctx: &BrainContext, nav: &NavSampler, out: &mut BrainOutput) {
        if ctx.now >= self.retreat_end {
            out.follower = FollowerCommand::Resume;
            out.refresh_advance_target = true;
            self.state = BehaviorState::Advance;
            return;
        }

        // Without a direction to flee from, hold until the timer runs out.
        let Some(target) = ctx.target else {
            return;
        };

        let away = (ctx.position - target).normalize_or_zero();
        let retreat_point = ctx.position + away * RETREAT_STEP;
        let sampled = if nav.is_available() {
            nav.sample(retreat_point, RETREAT_STEP)
        } else {
            Some(retreat_point)
        };

        match sampled {
            Some(point) => out.destination = Some(point),
            None => self.state = BehaviorState::Engage,
        }
    }
}

/// Outward horizontal direction from `source` to `position`. Falls back to
/// the reverse of `facing` when the two are on top of each other.
pub fn knockback_direction(position: Vec3, source: Vec3, facing: Vec3) -> Vec3 {
    let mut away = position - source;
    away.y = 0.0;
    if away.length() < KNOCKBACK_MIN_SOURCE_DISTANCE {
        let mut back = -facing;
        back.y = 0.0;
        back.normalize_or_zero()
    } else {
        away.normalize()
    }
}

// ============================================================================
// SYSTEMS
// ============================================================================

/// Disables behavior on entities without a navigator. Logged once per entity.
pub fn behavior_capability_system(
    mut commands: Commands,
    mut scheduler: ResMut<UpdateScheduler>,
    missing: Query<Entity, (With<Brain>, Without<NavAgent>, Without<BehaviorDisabled>)>,
) {
    for entity in missing.iter() {
        let err = SimError::MissingCapability {
            entity,
            capability: "NavAgent",
        };
        error!("{err}; behavior disabled");
        scheduler.unregister(entity);
        commands.entity(entity).insert(BehaviorDisabled);
    }
}

/// Applies knockback impulses from pending damage notifications.
pub fn knockback_system(
    time: Res<SimTime>,
    mut bodies: Query<
        (&Position, &DamageInbox, &mut Brain, &mut Velocity, &mut NavAgent, Option<&Health>),
        (Without<BehaviorDisabled>, Without<Inactive>),
    >,
    sources: Query<&Position>,
) {
    let now = time.0;
    for (pos, inbox, mut brain, mut velocity, mut agent, health) in bodies.iter_mut() {
        let force = brain.config.knockback_force;
        if force <= 0.0 || inbox.is_empty() || !agent.is_ready() {
            continue;
        }
        if health.is_some_and(|h| !h.is_alive()) {
            continue;
        }

        let facing = agent
            .destination
            .map(|d| d - pos.0)
            .filter(|d| d.length_squared() > 0.0)
            .unwrap_or(Vec3::Z);

        for hit in inbox.iter() {
            let Some(source_pos) = hit.source.and_then(|s| sources.get(s).ok()) else {
                continue;
            };
            velocity.0 += knockback_direction(pos.0, source_pos.0, facing) * force;
            agent.steering = false;
            brain.knockback_end = Some(now + brain.config.knockback_duration);
        }
    }
}

/// Runs the state machine for every enabled controller.
pub fn behavior_system(
    time: Res<SimTime>,
    scheduler: Res<UpdateScheduler>,
    nav: Res<NavSampler>,
    rally: Res<RallyPoint>,
    mut brains: Query<
        (
            Entity,
            &Position,
            &mut Brain,
            &mut NavAgent,
            Option<&mut Targeting>,
            Option<&mut Follower>,
            Option<&Health>,
        ),
        (Without<BehaviorDisabled>, Without<Inactive>),
    >,
    others: Query<(&Position, Option<&Health>), Without<Inactive>>,
) {
    let now = time.0;
    let live_position = |e: Entity| -> Option<Vec3> {
        others
            .get(e)
            .ok()
            .filter(|(_, h)| h.map_or(true, |h| h.is_alive()))
            .map(|(p, _)| p.0)
    };

    for (entity, pos, mut brain, mut agent, mut targeting, mut follower, health) in brains.iter_mut() {
        if health.is_some_and(|h| !h.is_alive()) {
            continue;
        }

        // End of knockback: steer again from where the impulse left us.
        if brain.knockback_end.is_some_and(|end| now >= end) {
            brain.knockback_end = None;
            if agent.is_ready() {
                agent.steering = true;
                let resync = if nav.is_available() {
                    nav.sample(pos.0, KNOCKBACK_WARP_RADIUS)
                } else {
                    Some(pos.0)
                };
                if let Some(point) = resync {
                    agent.warp(point);
                }
            }
        }

        let target = match targeting.as_deref_mut() {
            Some(t) => match t.target.and_then(live_position) {
                Some(p) => Some(p),
                None => {
                    t.clear_target();
                    None
                }
            },
            None => None,
        };

        if brain.advance_target.and_then(live_position).is_none() {
            brain.advance_target = targeting
                .as_deref()
                .and_then(|t| t.default_target())
                .or(rally.0)
                .filter(|&e| e != entity);
        }
        let advance_point = brain.advance_target.and_then(live_position);

        let ctx = BrainContext {
            now,
            position: pos.0,
            health_percent: health.map(|h| h.percent()),
            target,
            advance_point,
            has_follower: follower.is_some(),
            follower_active: follower.as_ref().is_some_and(|f| f.is_active()),
            slot_position: follower.as_ref().and_then(|f| f.last_destination),
            scheduled: scheduler.should_update(entity),
        };

        let before = brain.state;
        let out = brain.tick(&ctx, &nav);

        if out.clear_target {
            if let Some(t) = targeting.as_deref_mut() {
                t.clear_target();
            }
        }
        if out.refresh_advance_target {
            brain.advance_target = None;
        }
        if let Some(f) = follower.as_deref_mut() {
            match out.follower {
                FollowerCommand::Pause => f.pause(),
                FollowerCommand::Resume => f.resume(),
                FollowerCommand::Keep => {}
            }
        }
        if let Some(destination) = out.destination {
            if agent.is_ready() {
                agent.set_destination(destination);
            }
        }
        if brain.state != before {
            debug!("{:?}: {:?} -> {:?}", entity, before, brain.state);
        }
    }
}
