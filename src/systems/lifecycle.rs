//! Unit lifecycle: death cleanup, teardown of registrations, inbox reset.
//!
//! ## Data Access
//! - `death_cleanup_system`: Reads Events<UnitDied>. Writes EventLog<UnitDied>,
//!   despawns via Commands.
//! - `teardown_system`: Reads removed Brain/Follower. Writes UpdateScheduler,
//!   FormationAllocator.
//! - `inbox_clear_system`: Writes DamageInbox.

use crate::components::*;
use crate::systems::behavior::Brain;
use crate::systems::formation::{FormationAllocator, Follower};
use crate::systems::scheduler::UpdateScheduler;
use bevy_ecs::prelude::*;
use log::debug;

/// Append-only record of events, drained by the host.
///
/// `Events<T>` double-buffers and drops anything older than two updates;
/// this keeps everything until someone reads it.
#[derive(Resource, Debug)]
pub struct EventLog<T: Send + Sync + 'static> {
    entries: Vec<T>,
}

impl<T: Send + Sync + 'static> Default for EventLog<T> {
    fn default() -> Self {
        Self { entries: Vec::new() }
    }
}

impl<T: Send + Sync + 'static> EventLog<T> {
    pub fn push(&mut self, entry: T) {
        self.entries.push(entry);
    }

    pub fn drain(&mut self) -> Vec<T> {
        std::mem::take(&mut self.entries)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Despawns dead units and records their deaths.
pub fn death_cleanup_system(
    mut commands: Commands,
    mut deaths: EventReader<UnitDied>,
    mut log: ResMut<EventLog<UnitDied>>,
) {
    for died in deaths.read() {
        log.push(*died);
        if let Some(mut entity) = commands.get_entity(died.entity) {
            debug!("despawning dead unit {:?}", died.entity);
            entity.despawn();
        }
    }
}

/// Releases scheduler and formation registrations of removed units.
pub fn teardown_system(
    mut removed_brains: RemovedComponents<Brain>,
    mut removed_followers: RemovedComponents<Follower>,
    mut scheduler: ResMut<UpdateScheduler>,
    mut allocator: ResMut<FormationAllocator>,
) {
    for entity in removed_brains.read() {
        scheduler.unregister(entity);
    }
    for entity in removed_followers.read() {
        allocator.unregister(entity);
    }
}

/// Empties inboxes after targeting and knockback have read them.
pub fn inbox_clear_system(mut query: Query<&mut DamageInbox>) {
    for mut inbox in query.iter_mut() {
        if !inbox.is_empty() {
            inbox.clear();
        }
    }
}
