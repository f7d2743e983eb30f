//! ECS Systems for the skirmish simulation.
//!
//! Systems contain the game logic that operates on components.
//!
//! ## System Order
//!
//! The tick is one chained schedule (see `api::SimWorld`), grouped as:
//!
//! **Group 1 (Clock/Spatial)** - Run first:
//! - `clock_system` - Advances tick counter and simulation time
//! - `spatial_grid_update_system` - Rebuilds the spatial grid
//! - `scheduler_registration_system` - Registers new behavior controllers
//! - `behavior_capability_system` - Disables controllers without a navigator
//!
//! **Group 2 (Decisions)** - Read the spatial grid and damage inboxes:
//! - `targeting_system` - Aggro bookkeeping and target selection
//! - `knockback_system` - Impulses from last tick's hits
//! - `inbox_clear_system` - Drops notifications once both readers saw them
//! - `behavior_system` - Advance / Engage / Retreat state machine
//! - `follower_system` - Formation slot destinations
//! - `caravan_system` - Moves the reference path anchor
//!
//! **Group 3 (Motion)**:
//! - `nav_steering_system` - Straight-line steering toward destinations
//! - `knockback_motion_system` - Integrates knockback velocity
//!
//! **Group 4 (Combat)** - Gather then apply:
//! - `combat_gather_system`
//! - `combat_apply_system`
//!
//! **Group 5 (Lifecycle)**:
//! - `wave_system` - Wave orchestration and spawning
//! - `death_cleanup_system` - Despawns the dead
//! - `teardown_system` - Releases scheduler and formation registrations
//! - `scheduler_advance_system` - Rotates the update window

pub mod behavior;
pub mod combat;
pub mod formation;
pub mod lifecycle;
pub mod movement;
pub mod scheduler;
pub mod serialization;
pub mod targeting;
pub mod waves;

pub use behavior::*;
pub use combat::*;
pub use formation::*;
pub use lifecycle::*;
pub use movement::*;
pub use scheduler::*;
pub use serialization::*;
pub use targeting::*;
pub use waves::*;
