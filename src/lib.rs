//! Skirmish Sim - Simulation Core
//!
//! A deterministic, fixed-timestep ECS core for a wave-based skirmish game:
//! target selection, a per-unit behavior state machine, formation following
//! along a shared path, and wave orchestration.
//! Uses `bevy_ecs` for the entity-component-system architecture.

pub mod api;
pub mod archetype;
pub mod components;
pub mod config;
pub mod error;
pub mod faction;
pub mod navigation;
pub mod path;
pub mod spatial;
pub mod systems;
pub mod world;

pub use api::SimWorld;
pub use archetype::{ArchetypeLibrary, AttackConfig, UnitArchetype};
pub use components::*;
pub use config::SimConfig;
pub use error::SimError;
pub use faction::Team;
pub use navigation::{BoundsSampler, NavAgent, NavMeshSampler, NavSampler};
pub use path::{PathQuery, PolylinePath};
pub use spatial::{SpatialEntry, SpatialGrid};
pub use systems::*;
pub use world::{Snapshot, UnitSnapshot, WaveSnapshot};
