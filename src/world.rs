//! Snapshot types.
//!
//! The `Snapshot` struct provides a serializable view of the simulation state
//! for a renderer, a replay log or a test oracle.

use crate::components::*;
use crate::systems::behavior::{BehaviorState, Brain};
use crate::systems::targeting::Targeting;
use crate::systems::waves::WaveOrchestrator;
use bevy_ecs::prelude::*;
use serde::{Deserialize, Serialize};

/// Snapshot of a single unit's state for serialization.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UnitSnapshot {
    /// `Entity::to_bits`.
    pub id: u64,
    pub tag: String,
    pub x: f32,
    pub y: f32,
    pub z: f32,
    pub health: f32,
    pub health_max: f32,
    /// Behavior state, absent for units without a controller.
    pub state: Option<BehaviorState>,
    pub target: Option<u64>,
}

/// Wave progress summary.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WaveSnapshot {
    pub current_wave: usize,
    pub total_waves: usize,
    pub alive: usize,
    pub total_spawned: usize,
    pub in_progress: bool,
    pub all_complete: bool,
}

impl WaveSnapshot {
    pub fn from_orchestrator(orchestrator: &WaveOrchestrator) -> Self {
        Self {
            current_wave: orchestrator.current_wave_index(),
            total_waves: orchestrator.total_waves(),
            alive: orchestrator.alive_count(),
            total_spawned: orchestrator.total_spawned(),
            in_progress: orchestrator.is_wave_in_progress(),
            all_complete: orchestrator.all_waves_complete(),
        }
    }
}

/// Complete simulation state snapshot.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    /// Current simulation tick.
    pub tick: u64,
    /// Elapsed simulation time in seconds.
    pub time: f32,
    /// Units ordered by id.
    pub units: Vec<UnitSnapshot>,
    pub wave: Option<WaveSnapshot>,
}

impl Snapshot {
    /// Create a snapshot from the ECS world.
    pub fn from_world(world: &mut World, tick: u64, time: f32) -> Self {
        let mut query = world.query::<(
            Entity,
            &Tag,
            &Position,
            Option<&Health>,
            Option<&Brain>,
            Option<&Targeting>,
        )>();

        let mut units: Vec<UnitSnapshot> = query
            .iter(world)
            .map(|(entity, tag, pos, health, brain, targeting)| UnitSnapshot {
                id: entity.to_bits(),
                tag: tag.0.clone(),
                x: pos.0.x,
                y: pos.0.y,
                z: pos.0.z,
                health: health.map_or(0.0, |h| h.current),
                health_max: health.map_or(0.0, |h| h.max),
                state: brain.map(|b| b.state),
                target: targeting.and_then(|t| t.target).map(Entity::to_bits),
            })
            .collect();
        units.sort_by_key(|u| u.id);

        let wave = world
            .get_resource::<WaveOrchestrator>()
            .map(WaveSnapshot::from_orchestrator);

        Self { tick, time, units, wave }
    }

    /// Serialize to compact JSON.
    pub fn to_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string(self)
    }

    /// Serialize to pretty JSON (for debugging).
    pub fn to_json_pretty(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    pub fn unit(&self, entity: Entity) -> Option<&UnitSnapshot> {
        let id = entity.to_bits();
        self.units.iter().find(|u| u.id == id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use glam::Vec3;

    #[test]
    fn test_snapshot_from_world() {
        let mut world = World::new();
        let base = world.spawn(UnitBundle::new("HomeBase", Vec3::ZERO, 100.0)).id();
        let mut targeting = Targeting::default();
        targeting.target = Some(base);
        let grunt = world
            .spawn((UnitBundle::new("Enemy", Vec3::new(5.0, 0.0, 1.0), 10.0), Brain::default(), targeting))
            .id();

        let snapshot = Snapshot::from_world(&mut world, 3, 0.1);
        assert_eq!(snapshot.units.len(), 2);
        assert!(snapshot.wave.is_none());
        assert!(snapshot.units.windows(2).all(|w| w[0].id < w[1].id));

        let row = snapshot.unit(grunt).unwrap();
        assert_eq!(row.tag, "Enemy");
        assert_eq!(row.state, Some(BehaviorState::Advance));
        assert_eq!(row.target, Some(base.to_bits()));
        assert_eq!(snapshot.unit(base).unwrap().state, None);
    }
}
