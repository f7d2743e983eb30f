//! Formation slots along a moving reference path.
//!
//! - `FormationAllocator` hands out (along-path, lateral) slots: predefined
//!   slots first from a FIFO reuse pool, then generated ones in a staggered
//!   column behind the reference point.
//! - `Follower` turns its slot plus the path's current parameter into a nav
//!   destination, throttled and pausable.
//! - `Caravan` drives the reference anchor along the path and keeps the
//!   shared parameter up to date.
//!
//! ## Data Access
//! - `follower_system`: Reads SimTime, ReferencePath, NavSampler. Writes
//!   FormationAllocator, Follower, NavAgent.
//! - `caravan_system`: Reads SimTime, NavSampler, Position. Writes
//!   ReferencePath, Caravan, NavAgent.

use crate::components::*;
use crate::navigation::{NavAgent, NavSampler};
use crate::path::PathQuery;
use crate::systems::scheduler::SimTime;
use bevy_ecs::prelude::*;
use glam::Vec3;
use log::debug;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};

/// Max distance when snapping a path point onto navigable space.
const PATH_SNAP_RADIUS: f32 = 2.0;

// ============================================================================
// SLOTS AND ALLOCATOR
// ============================================================================

/// A formation position relative to the reference point on the path.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Slot {
    /// Along-path offset in world units. Negative is behind.
    pub distance_offset: f32,
    /// Perpendicular offset. Positive is right of the path direction.
    pub lateral_offset: f32,
}

impl Slot {
    pub fn new(distance_offset: f32, lateral_offset: f32) -> Self {
        Self {
            distance_offset,
            lateral_offset,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FormationConfig {
    pub predefined_slots: Vec<Slot>,
    /// Distance between generated rows along the path.
    pub row_spacing: f32,
    /// Lateral offset of generated slots, alternating right/left.
    pub lateral_stagger: f32,
}

impl Default for FormationConfig {
    fn default() -> Self {
        Self {
            predefined_slots: Vec::new(),
            row_spacing: 3.0,
            lateral_stagger: 0.5,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Assignment {
    slot: Slot,
    predefined: bool,
}

/// Owns every slot assignment. A follower holds at most one slot and a slot
/// belongs to at most one follower until it is released.
#[derive(Resource, Debug, Clone)]
pub struct FormationAllocator {
    row_spacing: f32,
    lateral_stagger: f32,
    available: VecDeque<Slot>,
    assignments: HashMap<Entity, Assignment>,
    dynamic_cursor: usize,
}

impl Default for FormationAllocator {
    fn default() -> Self {
        Self::new(&FormationConfig::default())
    }
}

impl FormationAllocator {
    pub fn new(config: &FormationConfig) -> Self {
        Self {
            row_spacing: config.row_spacing,
            lateral_stagger: config.lateral_stagger,
            available: config.predefined_slots.iter().copied().collect(),
            assignments: HashMap::new(),
            dynamic_cursor: 0,
        }
    }

    /// Assign a slot. A follower that already holds one gets it back.
    pub fn register(&mut self, follower: Entity) -> Slot {
        if let Some(existing) = self.assignments.get(&follower) {
            return existing.slot;
        }

        let assignment = match self.available.pop_front() {
            Some(slot) => Assignment { slot, predefined: true },
            None => Assignment {
                slot: self.generate_dynamic_slot(),
                predefined: false,
            },
        };
        debug!(
            "follower {:?} assigned slot ({:.2}, {:.2})",
            follower, assignment.slot.distance_offset, assignment.slot.lateral_offset
        );
        self.assignments.insert(follower, assignment);
        assignment.slot
    }

    /// Release a follower's slot. Predefined slots go back to the pool;
    /// generated slots are dropped.
    pub fn unregister(&mut self, follower: Entity) {
        if let Some(assignment) = self.assignments.remove(&follower) {
            if assignment.predefined {
                self.available.push_back(assignment.slot);
            }
        }
    }

    pub fn try_get_slot(&self, follower: Entity) -> Option<Slot> {
        self.assignments.get(&follower).map(|a| a.slot)
    }

    /// Number of generated slots handed out so far. Never decreases.
    pub fn dynamic_cursor(&self) -> usize {
        self.dynamic_cursor
    }

    pub fn assigned_count(&self) -> usize {
        self.assignments.len()
    }

    pub fn available_count(&self) -> usize {
        self.available.len()
    }

    fn generate_dynamic_slot(&mut self) -> Slot {
        let i = self.dynamic_cursor;
        let row = i / 2;
        let lateral = if i % 2 == 0 {
            self.lateral_stagger
        } else {
            -self.lateral_stagger
        };
        self.dynamic_cursor += 1;
        Slot::new(-self.row_spacing * (row as f32 + 1.0), lateral)
    }
}

// ============================================================================
// REFERENCE PATH
// ============================================================================

/// The shared moving reference: path geometry, its current parameter and
/// the anchor entity travelling along it.
#[derive(Resource, Default)]
pub struct ReferencePath {
    route: Option<Box<dyn PathQuery>>,
    /// Parameter of the anchor on the path, in `[0, 1]`.
    pub current_param: f32,
    pub anchor: Option<Entity>,
}

impl ReferencePath {
    pub fn new(route: impl PathQuery + 'static, anchor: Option<Entity>) -> Self {
        Self {
            route: Some(Box::new(route)),
            current_param: 0.0,
            anchor,
        }
    }

    pub fn route(&self) -> Option<&dyn PathQuery> {
        self.route.as_deref()
    }

    pub fn is_available(&self) -> bool {
        self.route.is_some()
    }
}

/// World position of a slot for a given reference parameter.
pub fn slot_world_position(route: &dyn PathQuery, current_param: f32, slot: Slot) -> Vec3 {
    let target_param = route.offset_param(current_param, slot.distance_offset);
    let center = route.position_at(target_param);
    let tangent = route.tangent_at(target_param);
    let right = Vec3::Y.cross(tangent).normalize_or_zero();
    center + right * slot.lateral_offset
}

// ============================================================================
// FOLLOWER
// ============================================================================

/// Keeps an escort on its formation slot while active.
#[derive(Component, Debug, Clone)]
pub struct Follower {
    slot: Option<Slot>,
    active: bool,
    /// Last computed slot position (before nav snapping).
    pub last_destination: Option<Vec3>,
    pub next_update: f32,
    /// Seconds between destination updates.
    pub update_interval: f32,
}

impl Follower {
    pub fn new(update_interval: f32) -> Self {
        Self {
            slot: None,
            active: true,
            last_destination: None,
            next_update: 0.0,
            update_interval,
        }
    }

    pub fn pause(&mut self) {
        self.active = false;
    }

    /// Reactivate and recompute on the next tick.
    pub fn resume(&mut self) {
        self.active = true;
        self.next_update = f32::NEG_INFINITY;
    }

    pub fn is_active(&self) -> bool {
        self.active
    }

    pub fn slot(&self) -> Option<Slot> {
        self.slot
    }

    pub fn has_slot(&self) -> bool {
        self.slot.is_some()
    }
}

impl Default for Follower {
    fn default() -> Self {
        Self::new(0.25)
    }
}

/// Assigns slots once a path exists and steers active followers to them.
pub fn follower_system(
    time: Res<SimTime>,
    path: Res<ReferencePath>,
    nav: Res<NavSampler>,
    mut allocator: ResMut<FormationAllocator>,
    mut followers: Query<(Entity, &mut Follower, &mut NavAgent, Option<&Health>), Without<Inactive>>,
) {
    let now = time.0;
    let Some(route) = path.route() else {
        return;
    };

    for (entity, mut follower, mut agent, health) in followers.iter_mut() {
        if health.is_some_and(|h| !h.is_alive()) {
            continue;
        }
        if follower.slot.is_none() {
            follower.slot = Some(allocator.register(entity));
        }
        if !follower.active || !agent.is_ready() || now < follower.next_update {
            continue;
        }
        let Some(slot) = follower.slot else {
            continue;
        };

        let destination = slot_world_position(route, path.current_param, slot);
        follower.last_destination = Some(destination);
        agent.set_destination(nav.snap_or_raw(destination, PATH_SNAP_RADIUS));
        follower.next_update = now + follower.update_interval;
    }
}

// ============================================================================
// CARAVAN ANCHOR
// ============================================================================

/// The entity that moves along the reference path.
#[derive(Component, Debug, Clone)]
pub struct Caravan {
    /// World distance ahead on the path used as the nav destination.
    pub lookahead: f32,
    pub moving: bool,
    /// Seconds between re-reading the anchor's parameter from its position.
    pub param_refresh_interval: f32,
    pub next_param_refresh: f32,
}

impl Caravan {
    pub fn pause_movement(&mut self) {
        self.moving = false;
    }

    pub fn resume_movement(&mut self) {
        self.moving = true;
    }
}

impl Default for Caravan {
    fn default() -> Self {
        Self {
            lookahead: 5.0,
            moving: true,
            param_refresh_interval: 0.15,
            next_param_refresh: 0.0,
        }
    }
}

/// Pushes the anchor along the path and refreshes the shared parameter.
pub fn caravan_system(
    time: Res<SimTime>,
    nav: Res<NavSampler>,
    mut path: ResMut<ReferencePath>,
    mut anchors: Query<(&Position, &mut Caravan, &mut NavAgent), Without<Inactive>>,
) {
    let now = time.0;
    let Some(anchor) = path.anchor else {
        return;
    };
    let Ok((pos, mut caravan, mut agent)) = anchors.get_mut(anchor) else {
        return;
    };

    let current = path.current_param;
    let refreshed = {
        let Some(route) = path.route() else {
            return;
        };
        if route.length() <= 0.0 {
            return;
        }

        if caravan.moving && agent.is_ready() {
            let lookahead_param = (current + route.distance_to_param(caravan.lookahead)).clamp(0.0, 1.0);
            let destination = route.position_at(lookahead_param);
            agent.set_destination(nav.snap_or_raw(destination, PATH_SNAP_RADIUS));
        }

        if now >= caravan.next_param_refresh {
            caravan.next_param_refresh = now + caravan.param_refresh_interval;
            Some(route.nearest_param(pos.0))
        } else {
            None
        }
    };

    if let Some(param) = refreshed {
        path.current_param = param;
    }
}
