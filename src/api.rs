//! Public API for the simulation.
//!
//! `SimWorld` owns the ECS world and the tick schedule, and is the interface
//! a host (game client, replay tool, test) drives the core through.
//!
//! ## Fixed Timestep
//!
//! The simulation uses a fixed timestep internally (default 30 Hz). When `step(dt)` is called,
//! the simulation accumulates time and runs fixed updates as needed. This ensures deterministic
//! behavior regardless of frame rate.
//!
//! ## Tick Order
//!
//! clock -> spatial grid -> registration / capability check -> targeting ->
//! knockback -> inbox clear -> behavior -> follower -> caravan -> steering /
//! knockback motion -> combat -> waves -> death cleanup -> teardown -> scheduler advance
//!
//! Hits landed by combat in tick N sit in the victim's `DamageInbox` until
//! targeting and knockback read them at the start of tick N+1.

use crate::archetype::ArchetypeLibrary;
use crate::components::*;
use crate::config::SimConfig;
use crate::error::SimError;
use crate::navigation::{NavAgent, NavMeshSampler, NavSampler};
use crate::path::PathQuery;
use crate::spatial::{spatial_grid_update_system, SpatialGrid};
use crate::systems::*;
use crate::world::Snapshot;
use bevy_ecs::prelude::*;
use bevy_ecs::world::CommandQueue;
use glam::Vec3;

/// The main simulation world container.
///
/// Holds the ECS world and schedule, providing a clean API for:
/// - Initializing the simulation
/// - Stepping the simulation forward
/// - Extracting state snapshots
/// - Issuing commands
pub struct SimWorld {
    world: World,
    schedule: Schedule,
    /// Accumulated time for fixed timestep.
    time_accumulator: f32,
    /// Gaps found in the config at construction. Logged, never fatal.
    config_gaps: Vec<SimError>,
}

impl SimWorld {
    /// Create a new simulation world with the default configuration.
    pub fn new() -> Self {
        Self::with_config(SimConfig::default())
    }

    /// Create a new simulation world with custom configuration.
    pub fn with_config(config: SimConfig) -> Self {
        let config_gaps = config.validate();
        let mut world = World::new();

        // Clock
        world.insert_resource(DeltaTime(config.fixed_timestep));
        world.insert_resource(SimTick::default());
        world.insert_resource(SimTime::default());

        // Shared services
        world.insert_resource(SpatialGrid::new(config.spatial_cell_size));
        world.insert_resource(UpdateScheduler::new(config.updates_per_frame));
        world.insert_resource(FormationAllocator::new(&config.formation));
        world.insert_resource(ReferencePath::default());
        world.insert_resource(NavSampler::default());
        world.insert_resource(RallyPoint::default());
        world.insert_resource(PendingCombatResults::default());
        world.insert_resource(ArchetypeLibrary::new(config.archetypes.clone()));
        world.insert_resource(WaveOrchestrator::new(
            config.waves.clone(),
            config.rng_seed,
            config.spawn_jitter_radius,
            config.reconcile_interval,
        ));

        // Event channels
        world.insert_resource(Events::<UnitDied>::default());
        world.insert_resource(Events::<WaveEvent>::default());
        world.insert_resource(EventLog::<UnitDied>::default());
        world.insert_resource(EventLog::<WaveEvent>::default());

        world.insert_resource(config);

        let mut schedule = Schedule::default();
        schedule.add_systems(
            (
                clock_system,
                spatial_grid_update_system,
                scheduler_registration_system,
                behavior_capability_system,
                targeting_system,
                knockback_system,
                inbox_clear_system,
                behavior_system,
                follower_system,
                caravan_system,
                nav_steering_system,
                knockback_motion_system,
                combat_gather_system,
                combat_apply_system,
                wave_system,
                death_cleanup_system,
                teardown_system,
                scheduler_advance_system,
            )
                .chain(),
        );

        Self {
            world,
            schedule,
            time_accumulator: 0.0,
            config_gaps,
        }
    }

    /// Step the simulation forward by `dt` seconds.
    ///
    /// Uses fixed timestep internally - accumulates time and runs fixed updates
    /// as needed. Returns the number of fixed updates run.
    pub fn step(&mut self, dt: f32) -> usize {
        let fixed_dt = self.fixed_timestep();
        if fixed_dt <= 0.0 {
            return 0;
        }

        self.time_accumulator += dt;
        let mut ticks = 0;
        while self.time_accumulator >= fixed_dt {
            self.fixed_update(fixed_dt);
            self.time_accumulator -= fixed_dt;
            ticks += 1;
        }
        ticks
    }

    /// Run exactly one fixed update.
    pub fn tick(&mut self) {
        let fixed_dt = self.fixed_timestep();
        self.fixed_update(fixed_dt);
    }

    fn fixed_timestep(&self) -> f32 {
        self.world
            .get_resource::<SimConfig>()
            .map(|c| c.fixed_timestep)
            .unwrap_or(1.0 / 30.0)
    }

    /// Run a single fixed timestep update.
    fn fixed_update(&mut self, dt: f32) {
        if let Some(mut dt_res) = self.world.get_resource_mut::<DeltaTime>() {
            dt_res.0 = dt;
        }

        self.schedule.run(&mut self.world);

        self.world.resource_mut::<Events<UnitDied>>().update();
        self.world.resource_mut::<Events<WaveEvent>>().update();
        self.world.clear_trackers();
    }

    // ------------------------------------------------------------------
    // Spawning and damage
    // ------------------------------------------------------------------

    /// Spawn a named archetype from the library.
    pub fn spawn_unit(&mut self, archetype: &str, at: Vec3) -> Result<Entity, SimError> {
        self.world.resource_scope(|world, library: Mut<ArchetypeLibrary>| {
            let mut queue = CommandQueue::default();
            let result = {
                let mut commands = Commands::new(&mut queue, world);
                library.spawn(&mut commands, archetype, at)
            };
            queue.apply(world);
            result
        })
    }

    /// Spawn a bare unit (tag, position, health, damage channel). Towers,
    /// bases and test dummies.
    pub fn spawn_entity(&mut self, tag: &str, at: Vec3, max_health: f32) -> Entity {
        self.world.spawn(UnitBundle::new(tag, at, max_health)).id()
    }

    /// Damage a unit from outside the tick. Returns `true` if it died.
    pub fn apply_damage(&mut self, target: Entity, amount: f32, source: Option<Entity>) -> bool {
        let mut query = self.world.query::<(&mut Health, Option<&mut DamageInbox>)>();
        let killed = match query.get_mut(&mut self.world, target) {
            Ok((mut health, inbox)) => deal_damage(&mut health, inbox.map(|i| i.into_inner()), amount, source),
            Err(_) => return false,
        };
        if killed {
            self.world.send_event(UnitDied { entity: target });
        }
        killed
    }

    // ------------------------------------------------------------------
    // Shared services
    // ------------------------------------------------------------------

    /// Install the reference path. The anchor (if any) gets a `Caravan` and
    /// a `NavAgent` when it does not carry them already.
    pub fn set_reference_path(&mut self, route: impl PathQuery + 'static, anchor: Option<Entity>) {
        if let Some(anchor) = anchor.filter(|&e| self.world.entities().contains(e)) {
            let mut entity = self.world.entity_mut(anchor);
            if !entity.contains::<Caravan>() {
                entity.insert(Caravan::default());
            }
            if !entity.contains::<NavAgent>() {
                entity.insert(NavAgent::default());
            }
        }
        self.world.insert_resource(ReferencePath::new(route, anchor));
    }

    pub fn clear_reference_path(&mut self) {
        self.world.insert_resource(ReferencePath::default());
    }

    pub fn set_rally_point(&mut self, rally: Option<Entity>) {
        self.world.insert_resource(RallyPoint(rally));
    }

    pub fn set_nav_sampler(&mut self, sampler: impl NavMeshSampler + 'static) {
        self.world.insert_resource(NavSampler::new(sampler));
    }

    // ------------------------------------------------------------------
    // Waves
    // ------------------------------------------------------------------

    pub fn start_waves(&mut self) {
        let now = self.current_time();
        self.world.resource_mut::<WaveOrchestrator>().start(now);
    }

    pub fn trigger_next_wave(&mut self) {
        let now = self.current_time();
        self.world.resource_mut::<WaveOrchestrator>().trigger_next_wave(now);
    }

    pub fn stop_waves(&mut self) {
        self.world.resource_mut::<WaveOrchestrator>().stop();
    }

    pub fn waves(&self) -> &WaveOrchestrator {
        self.world.resource::<WaveOrchestrator>()
    }

    /// Wave events published since the last drain.
    pub fn drain_wave_events(&mut self) -> Vec<WaveEvent> {
        self.world.resource_mut::<EventLog<WaveEvent>>().drain()
    }

    /// Deaths processed since the last drain.
    pub fn drain_deaths(&mut self) -> Vec<Entity> {
        self.world
            .resource_mut::<EventLog<UnitDied>>()
            .drain()
            .into_iter()
            .map(|d| d.entity)
            .collect()
    }

    // ------------------------------------------------------------------
    // Inspection
    // ------------------------------------------------------------------

    pub fn behavior_state(&self, entity: Entity) -> Option<BehaviorState> {
        self.world.get::<Brain>(entity).map(|b| b.state)
    }

    pub fn current_target(&self, entity: Entity) -> Option<Entity> {
        self.world.get::<Targeting>(entity).and_then(|t| t.target)
    }

    pub fn position(&self, entity: Entity) -> Option<Vec3> {
        self.world.get::<Position>(entity).map(|p| p.0)
    }

    /// Get a snapshot of the current simulation state.
    pub fn snapshot(&mut self) -> Snapshot {
        let tick = self.current_tick();
        let time = self.current_time();
        Snapshot::from_world(&mut self.world, tick, time)
    }

    /// Get the snapshot as a JSON string.
    pub fn snapshot_json(&mut self) -> String {
        self.snapshot().to_json().unwrap_or_else(|_| "{}".to_string())
    }

    /// Get the current tick number.
    pub fn current_tick(&self) -> u64 {
        self.world.get_resource::<SimTick>().map_or(0, |t| t.0)
    }

    /// Get the elapsed simulation time.
    pub fn current_time(&self) -> f32 {
        self.world.get_resource::<SimTime>().map_or(0.0, |t| t.0)
    }

    /// Configuration gaps reported when this world was built.
    pub fn config_gaps(&self) -> &[SimError] {
        &self.config_gaps
    }

    /// Get direct access to the ECS world (for advanced usage).
    pub fn world(&self) -> &World {
        &self.world
    }

    /// Get mutable access to the ECS world (for advanced usage).
    pub fn world_mut(&mut self) -> &mut World {
        &mut self.world
    }
}

impl Default for SimWorld {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::path::PolylinePath;

    fn single_wave(count: u32, spawn_point: Vec3, spawn_interval: f32) -> SimConfig {
        let mut config = SimConfig::default();
        config.waves.waves = vec![Wave {
            name: "Test".to_string(),
            spawn_groups: vec![SpawnGroup {
                spawn_interval,
                ..SpawnGroup::new("enemy_grunt", count, spawn_point)
            }],
            pre_wave_delay: 0.0,
        }];
        config
    }

    fn enemies(sim: &mut SimWorld) -> Vec<Entity> {
        let mut query = sim.world_mut().query::<(Entity, &Tag)>();
        let mut found: Vec<Entity> = query
            .iter(sim.world())
            .filter(|(_, tag)| tag.as_str() == "Enemy")
            .map(|(e, _)| e)
            .collect();
        found.sort();
        found
    }

    #[test]
    fn test_fixed_timestep_accumulates() {
        let mut sim = SimWorld::new();
        assert_eq!(sim.step(0.01), 0);
        assert_eq!(sim.step(0.03), 1);
        assert_eq!(sim.current_tick(), 1);
        assert!((sim.current_time() - 1.0 / 30.0).abs() < 1e-6);
    }

    #[test]
    fn test_grunts_march_on_home_base() {
        let mut sim = SimWorld::with_config(single_wave(2, Vec3::new(20.0, 0.0, 0.0), 0.0));
        let base = sim.spawn_entity("HomeBase", Vec3::ZERO, 100.0);
        sim.start_waves();
        sim.tick();

        let grunts = enemies(&mut sim);
        assert_eq!(grunts.len(), 2);
        assert_eq!(sim.waves().total_spawned(), 2);

        let start: Vec<f32> = grunts.iter().map(|&g| sim.position(g).unwrap().x).collect();
        sim.step(1.0);

        for (i, &grunt) in grunts.iter().enumerate() {
            assert_eq!(sim.current_target(grunt), Some(base));
            assert_eq!(sim.behavior_state(grunt), Some(BehaviorState::Advance));
            assert!(sim.position(grunt).unwrap().x < start[i]);
        }
    }

    #[test]
    fn test_killing_the_wave_completes_it() {
        let mut sim = SimWorld::with_config(single_wave(2, Vec3::new(20.0, 0.0, 0.0), 0.0));
        sim.start_waves();
        sim.tick();

        let grunts = enemies(&mut sim);
        assert_eq!(grunts.len(), 2);
        for &grunt in &grunts {
            assert!(sim.apply_damage(grunt, 100.0, None));
        }
        sim.tick();

        assert!(enemies(&mut sim).is_empty());
        let mut deaths = sim.drain_deaths();
        deaths.sort();
        assert_eq!(deaths, grunts);

        let events = sim.drain_wave_events();
        assert_eq!(events.first(), Some(&WaveEvent::WaveStarted { index: 0 }));
        assert!(events.contains(&WaveEvent::WaveCleared { index: 0 }));
        assert_eq!(events.last(), Some(&WaveEvent::AllWavesComplete));
        assert!(sim.waves().all_waves_complete());
    }

    #[test]
    fn test_melee_exchange_kills_and_despawns() {
        let mut sim = SimWorld::new();
        let grunt = sim.spawn_unit("enemy_grunt", Vec3::new(1.5, 0.0, 0.0)).unwrap();
        let tower = sim.spawn_entity("Tower", Vec3::ZERO, 10.0);

        sim.tick();
        assert_eq!(sim.current_target(grunt), Some(tower));
        assert_eq!(sim.behavior_state(grunt), Some(BehaviorState::Engage));
        assert_eq!(sim.world().get::<Health>(tower).unwrap().current, 5.0);

        // One hit per second: the second one kills.
        sim.step(1.5);
        assert!(!sim.world().entities().contains(tower));
        assert_eq!(sim.current_target(grunt), None);
        assert_eq!(sim.drain_deaths(), vec![tower]);
    }

    #[test]
    fn test_melee_hits_feed_aggro_and_knockback() {
        let mut sim = SimWorld::new();
        let escort = sim.spawn_unit("escort", Vec3::ZERO).unwrap();
        let grunt = sim.spawn_unit("enemy_grunt", Vec3::new(1.5, 0.0, 0.0)).unwrap();

        // Run until the grunt's first swing lands.
        for _ in 0..30 {
            if sim.world().get::<Health>(escort).unwrap().current < 20.0 {
                break;
            }
            sim.tick();
        }
        assert_eq!(sim.world().get::<Health>(escort).unwrap().current, 15.0);
        let hit_at = sim.current_time();

        // The hit is read at the start of the next tick.
        sim.tick();
        let targeting = sim.world().get::<Targeting>(escort).unwrap();
        let recorded = targeting.aggro.last_damaged_at(grunt).unwrap();
        assert!(recorded > hit_at);
        let brain = sim.world().get::<Brain>(escort).unwrap();
        assert!(brain.knockback_end.is_some());
        assert!(sim.world().get::<DamageInbox>(escort).unwrap().is_empty());
    }

    #[test]
    fn test_config_gaps_reported_at_construction() {
        let sim = SimWorld::new();
        assert_eq!(sim.config_gaps().len(), 1);
        assert!(matches!(sim.config_gaps()[0], SimError::ConfigurationGap(_)));

        let sim = SimWorld::with_config(single_wave(1, Vec3::ZERO, 0.0));
        assert!(sim.config_gaps().is_empty());
    }

    #[test]
    fn test_missing_navigator_disables_behavior() {
        let mut sim = SimWorld::new();
        let crippled = sim.world_mut().spawn((UnitBundle::new("Enemy", Vec3::ZERO, 10.0), Brain::default())).id();
        sim.tick();
        sim.tick();

        assert!(sim.world().get::<BehaviorDisabled>(crippled).is_some());
        assert!(!sim.world().resource::<UpdateScheduler>().contains(crippled));
        assert_eq!(sim.behavior_state(crippled), Some(BehaviorState::Advance));
    }

    #[test]
    fn test_escort_takes_formation_slot() {
        let mut sim = SimWorld::new();
        let anchor = sim.spawn_entity("Hero", Vec3::ZERO, 50.0);
        sim.set_reference_path(
            PolylinePath::new(vec![Vec3::ZERO, Vec3::new(100.0, 0.0, 0.0)]),
            Some(anchor),
        );
        let escort = sim.spawn_unit("escort", Vec3::new(-5.0, 0.0, 5.0)).unwrap();
        sim.step(0.5);

        let follower = sim.world().get::<Follower>(escort).unwrap();
        assert!(follower.has_slot());
        assert!(follower.last_destination.is_some());
        assert_eq!(sim.world().resource::<FormationAllocator>().assigned_count(), 1);
        // The anchor is pushed along the path.
        assert!(sim.position(anchor).unwrap().x > 0.0);
    }

    #[test]
    fn test_unknown_archetype_is_an_error() {
        let mut sim = SimWorld::new();
        assert!(matches!(
            sim.spawn_unit("dragon", Vec3::ZERO),
            Err(SimError::UnknownArchetype(_))
        ));
    }

    #[test]
    fn test_snapshot_json_lists_units() {
        let mut sim = SimWorld::new();
        sim.spawn_unit("enemy_grunt", Vec3::new(3.0, 0.0, 0.0)).unwrap();
        sim.tick();
        let snapshot = sim.snapshot();
        assert_eq!(snapshot.tick, 1);
        assert_eq!(snapshot.units.len(), 1);
        assert!(sim.snapshot_json().contains("\"Enemy\""));
    }
}
