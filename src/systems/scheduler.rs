//! Simulation clock and the time-sliced update scheduler.
//!
//! The scheduler keeps a registry of behavior-driven entities and a rotating
//! window. Only entities whose registry slot lies inside the window run the
//! expensive repath logic on a given tick; everything else still moves.
//!
//! ## Data Access
//! - `clock_system`: Reads DeltaTime, writes SimTick / SimTime.
//! - `scheduler_registration_system`: Reads Added<Brain>, writes UpdateScheduler.
//! - `scheduler_advance_system`: Writes UpdateScheduler. Runs last in the tick.

use crate::systems::behavior::{BehaviorDisabled, Brain};
use crate::systems::movement::DeltaTime;
use bevy_ecs::prelude::*;
use std::collections::HashMap;

/// Global simulation tick counter.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTick(pub u64);

impl SimTick {
    pub fn increment(&mut self) {
        self.0 = self.0.wrapping_add(1);
    }
}

/// Monotonic simulation clock in seconds. Every timestamp in the core
/// (aggro, retreat, repath, spawn timelines) is compared against this.
#[derive(Resource, Debug, Clone, Copy, Default)]
pub struct SimTime(pub f32);

/// Round-robin registry deciding whose turn it is to repath.
#[derive(Resource, Debug, Clone)]
pub struct UpdateScheduler {
    /// Max number of entities allowed to repath per tick.
    pub updates_per_frame: usize,
    entities: Vec<Entity>,
    index: HashMap<Entity, usize>,
    window_start: usize,
}

impl Default for UpdateScheduler {
    fn default() -> Self {
        Self::new(30)
    }
}

impl UpdateScheduler {
    pub fn new(updates_per_frame: usize) -> Self {
        Self {
            updates_per_frame,
            entities: Vec::new(),
            index: HashMap::new(),
            window_start: 0,
        }
    }

    /// Add an entity to the rotation. Registering twice is a no-op.
    pub fn register(&mut self, entity: Entity) {
        if self.index.contains_key(&entity) {
            return;
        }
        self.index.insert(entity, self.entities.len());
        self.entities.push(entity);
    }

    /// Remove an entity. The last entry moves into the freed slot.
    pub fn unregister(&mut self, entity: Entity) {
        let Some(idx) = self.index.remove(&entity) else {
            return;
        };
        self.entities.swap_remove(idx);
        if let Some(&moved) = self.entities.get(idx) {
            self.index.insert(moved, idx);
        }
    }

    /// True iff the entity's registry index lies in
    /// `[window_start, window_start + updates_per_frame)` circularly.
    /// Fails open: an empty registry or an unknown entity is always eligible.
    pub fn should_update(&self, entity: Entity) -> bool {
        let n = self.entities.len();
        if n == 0 {
            return true;
        }
        let Some(&idx) = self.index.get(&entity) else {
            return true;
        };
        let start = self.window_start % n;
        let step = (idx + n - start) % n;
        step < self.updates_per_frame
    }

    /// Move the window forward by `updates_per_frame` (mod population).
    pub fn advance(&mut self) {
        let n = self.entities.len();
        if n > 0 {
            self.window_start = (self.window_start + self.updates_per_frame) % n;
        }
    }

    pub fn contains(&self, entity: Entity) -> bool {
        self.index.contains_key(&entity)
    }

    pub fn len(&self) -> usize {
        self.entities.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entities.is_empty()
    }

    pub fn window_start(&self) -> usize {
        self.window_start
    }
}

/// Advances the tick counter and the clock by the fixed timestep.
pub fn clock_system(dt: Res<DeltaTime>, mut tick: ResMut<SimTick>, mut time: ResMut<SimTime>) {
    tick.increment();
    time.0 += dt.0;
}

/// Registers newly spawned behavior controllers with the scheduler.
pub fn scheduler_registration_system(
    mut scheduler: ResMut<UpdateScheduler>,
    added: Query<Entity, (Added<Brain>, Without<BehaviorDisabled>)>,
) {
    for entity in added.iter() {
        scheduler.register(entity);
    }
}

/// Rotates the scheduler window once per tick.
pub fn scheduler_advance_system(mut scheduler: ResMut<UpdateScheduler>) {
    scheduler.advance();
}
