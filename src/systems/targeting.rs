//! Targeting engine: periodic hostile-target selection per entity.
//!
//! Scoring is a pure function over a candidate list (`evaluate`), wrapped by
//! `targeting_system` which collects candidates from the spatial grid,
//! feeds damage notifications into the aggro table and resolves the default
//! target.
//!
//! ## Candidate order
//! Radius candidates are visited closest first, ties broken by entity id; the
//! default target, if not already present, is appended last. The best score
//! must be strictly greater to replace the current pick, so ties keep the
//! earlier candidate in that order.
//!
//! ## Data Access
//! - Reads: SimTime, SpatialGrid, Tag, Position, Health, DamageInbox
//! - Writes: Targeting

use crate::components::*;
use crate::faction::{are_hostile, hostile_team};
use crate::spatial::SpatialGrid;
use crate::systems::scheduler::SimTime;
use bevy_ecs::prelude::*;
use glam::Vec3;
use log::trace;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Seconds an aggro entry stays hot after the last hit from that source.
pub const AGGRO_DECAY_SECONDS: f32 = 5.0;

/// Smallest detection radius used for scoring.
const MIN_DETECTION_RADIUS: f32 = 0.1;

/// Floor for the normalized distance so point-blank targets don't explode the score.
const MIN_NORMALIZED_DISTANCE: f32 = 0.01;

/// How strongly wounded targets are preferred (up to +50%).
const HEALTH_BONUS_WEIGHT: f32 = 0.5;

/// Priority for one tag. Priority ≤ 0 means never targetable.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TagPriority {
    pub tag: String,
    pub priority: f32,
}

impl TagPriority {
    pub fn new(tag: impl Into<String>, priority: f32) -> Self {
        Self {
            tag: tag.into(),
            priority,
        }
    }
}

/// Tuning for a targeting engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct TargetingConfig {
    pub tag_priorities: Vec<TagPriority>,
    pub detection_radius: f32,
    pub aggro_multiplier: f32,
    /// Seconds between evaluations; 0 evaluates every tick.
    pub evaluation_interval: f32,
    /// Tag of the fallback objective, resolved lazily (e.g. "HomeBase").
    pub default_target_tag: Option<String>,
}

impl Default for TargetingConfig {
    fn default() -> Self {
        Self {
            tag_priorities: vec![TagPriority::new("Enemy", 0.8)],
            detection_radius: 10.0,
            aggro_multiplier: 1.5,
            evaluation_interval: 0.3,
            default_target_tag: None,
        }
    }
}

impl TargetingConfig {
    /// Priority for a tag (first matching entry), 0 if unlisted.
    pub fn priority_for(&self, tag: &str) -> f32 {
        self.tag_priorities
            .iter()
            .find(|p| p.tag == tag)
            .map(|p| p.priority)
            .unwrap_or(0.0)
    }

    pub fn effective_radius(&self) -> f32 {
        self.detection_radius.max(MIN_DETECTION_RADIUS)
    }
}

/// Last time each source damaged us. Expired entries are purged on lookup.
#[derive(Debug, Clone, Default)]
pub struct AggroTable {
    entries: HashMap<Entity, f32>,
}

impl AggroTable {
    pub fn record(&mut self, source: Entity, now: f32) {
        self.entries.insert(source, now);
    }

    /// Multiplier for `candidate`: `multiplier` while `now - last < decay`,
    /// otherwise 1 (and the stale entry is dropped).
    pub fn bonus(&mut self, candidate: Entity, now: f32, multiplier: f32) -> f32 {
        match self.entries.get(&candidate) {
            Some(&last) if now - last < AGGRO_DECAY_SECONDS => multiplier,
            Some(_) => {
                self.entries.remove(&candidate);
                1.0
            }
            None => 1.0,
        }
    }

    pub fn last_damaged_at(&self, source: Entity) -> Option<f32> {
        self.entries.get(&source).copied()
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Per-entity targeting state.
#[derive(Component, Debug, Clone)]
pub struct Targeting {
    pub config: TargetingConfig,
    /// Fixed fallback objective; takes precedence over the tag lookup.
    pub default_target: Option<Entity>,
    resolved_default: Option<Entity>,
    pub aggro: AggroTable,
    /// Current best target. Re-validated every tick before use.
    pub target: Option<Entity>,
    /// Valid hostiles found by the last evaluation (for inspection).
    pub targets_in_range: Vec<Entity>,
    pub next_evaluation: f32,
}

impl Targeting {
    pub fn new(config: TargetingConfig) -> Self {
        Self {
            config,
            default_target: None,
            resolved_default: None,
            aggro: AggroTable::default(),
            target: None,
            targets_in_range: Vec::new(),
            next_evaluation: 0.0,
        }
    }

    pub fn with_default_target(mut self, target: Entity) -> Self {
        self.default_target = Some(target);
        self
    }

    /// Record (or refresh) aggro against whoever just damaged us.
    pub fn notify_damaged_by(&mut self, source: Entity, now: f32) {
        self.aggro.record(source, now);
    }

    /// Fixed default if set, otherwise the cached tag resolution.
    pub fn default_target(&self) -> Option<Entity> {
        self.default_target.or(self.resolved_default)
    }

    pub fn needs_default_resolution(&self) -> bool {
        self.default_target.is_none()
            && self.resolved_default.is_none()
            && self.config.default_target_tag.is_some()
    }

    pub fn set_resolved_default(&mut self, entity: Entity) {
        self.resolved_default = Some(entity);
    }

    /// Forget the cached tag resolution so the next tick looks it up again.
    pub fn reset_default_target(&mut self) {
        self.resolved_default = None;
    }

    pub fn clear_target(&mut self) {
        self.target = None;
    }

    pub fn is_due(&self, now: f32) -> bool {
        self.config.evaluation_interval <= 0.0 || now >= self.next_evaluation
    }
}

impl Default for Targeting {
    fn default() -> Self {
        Self::new(TargetingConfig::default())
    }
}

/// Everything the scorer needs to know about one potential target.
#[derive(Debug, Clone, Copy)]
pub struct Candidate<'a> {
    pub entity: Entity,
    pub tag: &'a str,
    pub position: Vec3,
    /// Health fraction, `None` when the target has no (positive-max) health.
    pub health_percent: Option<f32>,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct TargetingResult {
    pub best_target: Option<Entity>,
    pub candidates: Vec<Entity>,
}

/// Score a single valid candidate.
pub fn score_candidate(
    config: &TargetingConfig,
    aggro: &mut AggroTable,
    own_position: Vec3,
    candidate: &Candidate,
    now: f32,
) -> f32 {
    let priority = config.priority_for(candidate.tag);
    if priority <= 0.0 {
        return 0.0;
    }

    let radius = config.effective_radius();
    let distance = own_position.distance(candidate.position);
    let normalized = (distance / radius).max(MIN_NORMALIZED_DISTANCE);
    let distance_factor = 1.0 / normalized;
    let aggro_bonus = aggro.bonus(candidate.entity, now, config.aggro_multiplier);
    let health_bonus = candidate
        .health_percent
        .map(|pct| 1.0 + (1.0 - pct.clamp(0.0, 1.0)) * HEALTH_BONUS_WEIGHT)
        .unwrap_or(1.0);

    priority * distance_factor * aggro_bonus * health_bonus
}

/// Pick the best hostile target.
///
/// `hostiles` are candidates from the hostile-team world query, already in
/// visiting order; those beyond the detection radius are skipped here.
/// `default` is the resolved fallback objective, which is considered even
/// when it lies outside the radius.
pub fn evaluate(
    own_tag: &str,
    own_position: Vec3,
    state: &mut Targeting,
    hostiles: &[Candidate],
    default: Option<Candidate>,
    now: f32,
) -> TargetingResult {
    let radius = state.config.effective_radius();
    let is_valid = |c: &Candidate| state.config.priority_for(c.tag) > 0.0 && are_hostile(own_tag, c.tag);

    let mut valid: Vec<Candidate> = hostiles
        .iter()
        .filter(|c| own_position.distance(c.position) <= radius)
        .filter(|c| is_valid(*c))
        .copied()
        .collect();

    if let Some(def) = default {
        if is_valid(&def) && !valid.iter().any(|c| c.entity == def.entity) {
            valid.push(def);
        }
    }

    let mut best_score = 0.0;
    let mut best = None;
    for candidate in &valid {
        let score = score_candidate(&state.config, &mut state.aggro, own_position, candidate, now);
        trace!("candidate {:?} ({}) scored {:.3}", candidate.entity, candidate.tag, score);
        if score > best_score {
            best_score = score;
            best = Some(candidate.entity);
        }
    }

    let candidates: Vec<Entity> = valid.iter().map(|c| c.entity).collect();
    state.targets_in_range = candidates.clone();
    state.target = best;

    TargetingResult {
        best_target: best,
        candidates,
    }
}

fn as_candidate<'a>(entity: Entity, tag: &'a Tag, position: &Position, health: Option<&Health>) -> Candidate<'a> {
    Candidate {
        entity,
        tag: tag.as_str(),
        position: position.0,
        health_percent: health.filter(|h| h.max > 0.0).map(|h| h.percent()),
    }
}

/// System that feeds aggro, re-validates targets and runs due evaluations.
pub fn targeting_system(
    time: Res<SimTime>,
    grid: Res<SpatialGrid>,
    mut seekers: Query<(Entity, &Tag, &Position, &mut Targeting, Option<&DamageInbox>, Option<&Health>), Without<Inactive>>,
    world_units: Query<(Entity, &Tag, &Position, Option<&Health>), Without<Inactive>>,
) {
    let now = time.0;

    for (entity, tag, pos, mut targeting, inbox, own_health) in seekers.iter_mut() {
        if own_health.is_some_and(|h| !h.is_alive()) {
            continue;
        }

        if let Some(inbox) = inbox {
            for hit in inbox.iter() {
                if let Some(source) = hit.source {
                    targeting.notify_damaged_by(source, now);
                }
            }
        }

        // Stale references are dropped, never dereferenced.
        if let Some(current) = targeting.target {
            let alive = world_units
                .get(current)
                .is_ok_and(|(_, _, _, h)| h.map_or(true, |h| h.is_alive()));
            if !alive {
                targeting.target = None;
            }
        }

        if targeting.needs_default_resolution() {
            if let Some(wanted) = targeting.config.default_target_tag.clone() {
                let found = world_units
                    .iter()
                    .filter(|(_, t, _, _)| t.as_str() == wanted)
                    .map(|(e, _, _, _)| e)
                    .min();
                if let Some(found) = found {
                    targeting.set_resolved_default(found);
                }
            }
        }

        if !targeting.is_due(now) {
            continue;
        }

        let radius = targeting.config.effective_radius();
        let hostile = hostile_team(tag.as_str());
        let hostiles: Vec<Candidate> = grid
            .query_team(pos.0, radius, hostile)
            .into_iter()
            .filter(|entry| entry.entity != entity)
            .filter_map(|entry| world_units.get(entry.entity).ok())
            .map(|(e, t, p, h)| as_candidate(e, t, p, h))
            .collect();

        let default = targeting
            .default_target()
            .and_then(|d| world_units.get(d).ok())
            .filter(|(_, _, _, h)| h.map_or(true, |h| h.is_alive()))
            .map(|(e, t, p, h)| as_candidate(e, t, p, h));

        evaluate(tag.as_str(), pos.0, &mut targeting, &hostiles, default, now);

        if targeting.config.evaluation_interval > 0.0 {
            targeting.next_evaluation = now + targeting.config.evaluation_interval;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::spatial::spatial_grid_update_system;

    fn cand(id: u32, tag: &str, x: f32, health: Option<f32>) -> Candidate<'_> {
        Candidate {
            entity: Entity::from_raw(id),
            tag,
            position: Vec3::new(x, 0.0, 0.0),
            health_percent: health,
        }
    }

    #[test]
    fn test_reference_score() {
        // Enemy at distance 5 in radius 10, half health, no aggro.
        let mut state = Targeting::default();
        let c = cand(1, "Enemy", 5.0, Some(0.5));
        let score = score_candidate(&state.config.clone(), &mut state.aggro, Vec3::ZERO, &c, 0.0);
        assert!((score - 2.0).abs() < 0.0001);

        let result = evaluate("Hero", Vec3::ZERO, &mut state, &[c], None, 0.0);
        assert_eq!(result.best_target, Some(Entity::from_raw(1)));
        assert_eq!(state.target, Some(Entity::from_raw(1)));
    }

    #[test]
    fn test_zero_priority_never_selected() {
        let mut state = Targeting::new(TargetingConfig {
            tag_priorities: vec![TagPriority::new("Enemy", 0.0), TagPriority::new("Tower", 0.5)],
            ..Default::default()
        });
        let hostiles = [cand(1, "Enemy", 1.0, None), cand(2, "Crate", 1.0, None)];
        let result = evaluate("Hero", Vec3::ZERO, &mut state, &hostiles, None, 0.0);
        assert_eq!(result.best_target, None);
        assert!(result.candidates.is_empty());
    }

    #[test]
    fn test_same_team_rejected() {
        let mut state = Targeting::new(TargetingConfig {
            tag_priorities: vec![TagPriority::new("Tower", 1.0)],
            ..Default::default()
        });
        let result = evaluate("Hero", Vec3::ZERO, &mut state, &[cand(1, "Tower", 2.0, None)], None, 0.0);
        assert_eq!(result.best_target, None);
    }

    #[test]
    fn test_out_of_radius_ignored_but_default_kept() {
        let mut state = Targeting::new(TargetingConfig {
            tag_priorities: vec![TagPriority::new("Hero", 0.6), TagPriority::new("HomeBase", 0.3)],
            ..Default::default()
        });
        let far_hero = cand(1, "Hero", 50.0, None);
        let base = cand(2, "HomeBase", 80.0, None);
        let result = evaluate("Enemy", Vec3::ZERO, &mut state, &[far_hero], Some(base), 0.0);
        assert_eq!(result.candidates, vec![Entity::from_raw(2)]);
        assert_eq!(result.best_target, Some(Entity::from_raw(2)));
    }

    #[test]
    fn test_default_not_duplicated() {
        let mut state = Targeting::new(TargetingConfig {
            tag_priorities: vec![TagPriority::new("HomeBase", 0.3)],
            ..Default::default()
        });
        let base = cand(2, "HomeBase", 3.0, None);
        let result = evaluate("Enemy", Vec3::ZERO, &mut state, &[base], Some(base), 0.0);
        assert_eq!(result.candidates.len(), 1);
    }

    #[test]
    fn test_aggro_window_is_strict() {
        let mut table = AggroTable::default();
        let src = Entity::from_raw(3);
        table.record(src, 10.0);
        assert_eq!(table.bonus(src, 14.999, 1.5), 1.5);
        assert_eq!(table.bonus(src, 15.0, 1.5), 1.0);
        // Expired entry was purged.
        assert!(table.is_empty());
    }

    #[test]
    fn test_aggro_changes_pick() {
        let mut state = Targeting::default();
        let near = cand(1, "Enemy", 4.0, None);
        let attacker = cand(2, "Enemy", 5.0, None);

        let result = evaluate("Hero", Vec3::ZERO, &mut state, &[near, attacker], None, 1.0);
        assert_eq!(result.best_target, Some(Entity::from_raw(1)));

        state.notify_damaged_by(Entity::from_raw(2), 1.0);
        let result = evaluate("Hero", Vec3::ZERO, &mut state, &[near, attacker], None, 2.0);
        assert_eq!(result.best_target, Some(Entity::from_raw(2)));
    }

    #[test]
    fn test_ties_keep_first() {
        let mut state = Targeting::default();
        let a = cand(5, "Enemy", 3.0, None);
        let b = Candidate {
            position: Vec3::new(-3.0, 0.0, 0.0),
            ..cand(4, "Enemy", 0.0, None)
        };
        let result = evaluate("Hero", Vec3::ZERO, &mut state, &[a, b], None, 0.0);
        assert_eq!(result.best_target, Some(Entity::from_raw(5)));
    }

    #[test]
    fn test_zero_radius_is_floored() {
        let mut state = Targeting::new(TargetingConfig {
            detection_radius: 0.0,
            ..Default::default()
        });
        let c = cand(1, "Enemy", 0.05, None);
        let result = evaluate("Hero", Vec3::ZERO, &mut state, &[c], None, 0.0);
        assert_eq!(result.best_target, Some(Entity::from_raw(1)));
    }

    #[test]
    fn test_system_resolves_default_and_evaluates() {
        let mut world = World::new();
        world.insert_resource(SimTime(1.0));
        world.insert_resource(SpatialGrid::new(10.0));

        let base = world
            .spawn((Tag::new("HomeBase"), Position::new(100.0, 0.0, 0.0), Health::new(50.0)))
            .id();
        let hero = world
            .spawn((Tag::new("Hero"), Position::new(4.0, 0.0, 0.0), Health::new(10.0)))
            .id();
        let grunt = world
            .spawn((
                Tag::new("Enemy"),
                Position::new(0.0, 0.0, 0.0),
                Health::new(10.0),
                Targeting::new(TargetingConfig {
                    tag_priorities: vec![TagPriority::new("Hero", 0.6), TagPriority::new("HomeBase", 0.3)],
                    default_target_tag: Some("HomeBase".to_string()),
                    ..Default::default()
                }),
            ))
            .id();

        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_grid_update_system, targeting_system).chain());
        schedule.run(&mut world);

        let targeting = world.get::<Targeting>(grunt).unwrap();
        assert_eq!(targeting.default_target(), Some(base));
        assert_eq!(targeting.target, Some(hero));
        assert_eq!(targeting.targets_in_range, vec![hero, base]);
        assert!((targeting.next_evaluation - 1.3).abs() < 0.0001);
    }

    #[test]
    fn test_system_skips_dead_or_inactive_default_target() {
        let mut world = World::new();
        world.insert_resource(SimTime(1.0));
        world.insert_resource(SpatialGrid::new(10.0));

        let config = TargetingConfig {
            tag_priorities: vec![TagPriority::new("HomeBase", 0.3)],
            ..Default::default()
        };
        let dead_base = world
            .spawn((
                Tag::new("HomeBase"),
                Position::new(100.0, 0.0, 0.0),
                Health { current: 0.0, max: 50.0 },
            ))
            .id();
        let idle_base = world
            .spawn((Tag::new("HomeBase"), Position::new(100.0, 0.0, 0.0), Health::new(50.0), Inactive))
            .id();
        let live_base = world
            .spawn((Tag::new("HomeBase"), Position::new(-100.0, 0.0, 0.0), Health::new(50.0)))
            .id();

        let seekers: Vec<Entity> = [dead_base, idle_base, live_base]
            .into_iter()
            .map(|base| {
                world
                    .spawn((
                        Tag::new("Enemy"),
                        Position::new(0.0, 0.0, 0.0),
                        Health::new(10.0),
                        Targeting::new(config.clone()).with_default_target(base),
                    ))
                    .id()
            })
            .collect();

        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_grid_update_system, targeting_system).chain());
        schedule.run(&mut world);

        for &seeker in &seekers[..2] {
            let targeting = world.get::<Targeting>(seeker).unwrap();
            assert_eq!(targeting.target, None);
            assert!(targeting.targets_in_range.is_empty());
        }
        let targeting = world.get::<Targeting>(seekers[2]).unwrap();
        assert_eq!(targeting.target, Some(live_base));
    }

    #[test]
    fn test_system_drops_stale_target_and_records_aggro() {
        let mut world = World::new();
        world.insert_resource(SimTime(2.0));
        world.insert_resource(SpatialGrid::new(10.0));

        let attacker = world.spawn((Tag::new("Enemy"), Position::new(30.0, 0.0, 0.0))).id();
        let ghost = world.spawn((Tag::new("Enemy"), Position::new(1.0, 0.0, 0.0))).id();

        let mut targeting = Targeting::default();
        targeting.target = Some(ghost);
        targeting.next_evaluation = 100.0;
        let mut inbox = DamageInbox::default();
        inbox.push(DamageTaken { amount: 1.0, source: Some(attacker) });
        let hero = world
            .spawn((Tag::new("Hero"), Position::new(0.0, 0.0, 0.0), targeting, inbox))
            .id();

        world.despawn(ghost);

        let mut schedule = Schedule::default();
        schedule.add_systems((spatial_grid_update_system, targeting_system).chain());
        schedule.run(&mut world);

        let targeting = world.get::<Targeting>(hero).unwrap();
        assert_eq!(targeting.target, None);
        assert_eq!(targeting.aggro.last_damaged_at(attacker), Some(2.0));
    }
}
