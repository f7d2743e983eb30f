//! Wave orchestration: timed spawn groups, alive tracking and progression.
//!
//! The orchestrator is an explicit state machine advanced once per tick
//! against the simulation clock:
//!
//! ```text
//! Idle -> PreWave -> Spawning -> (cleared) -> InterWave -> PreWave ...
//!                                        \-> Halted (manual mode)
//!                                        \-> AllComplete (last wave)
//! ```
//!
//! Each spawn group of a wave is an independent timeline keyed by its next
//! spawn timestamp; groups never wait for each other. A wave clears once
//! every timeline has finished and the alive-set is empty.
//!
//! ## Data Access
//! - `wave_system`: Reads SimTime, ArchetypeLibrary, Events<UnitDied>,
//!   Entities. Writes WaveOrchestrator, Events<WaveEvent>, EventLog<WaveEvent>,
//!   spawns via Commands.

use crate::archetype::ArchetypeLibrary;
use crate::components::UnitDied;
use crate::systems::lifecycle::EventLog;
use crate::systems::scheduler::SimTime;
use bevy_ecs::entity::Entities;
use bevy_ecs::prelude::*;
use glam::Vec3;
use log::{debug, info, warn};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

// ============================================================================
// CONFIGURATION
// ============================================================================

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SpawnGroup {
    /// Archetype name in the library.
    pub archetype: Option<String>,
    pub count: u32,
    pub spawn_point: Option<Vec3>,
    /// Seconds after wave start before the first spawn.
    pub start_delay: f32,
    /// Seconds between spawns within the group.
    pub spawn_interval: f32,
}

impl Default for SpawnGroup {
    fn default() -> Self {
        Self {
            archetype: None,
            count: 5,
            spawn_point: None,
            start_delay: 0.0,
            spawn_interval: 0.3,
        }
    }
}

impl SpawnGroup {
    pub fn new(archetype: impl Into<String>, count: u32, spawn_point: Vec3) -> Self {
        Self {
            archetype: Some(archetype.into()),
            count,
            spawn_point: Some(spawn_point),
            ..Default::default()
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Wave {
    pub name: String,
    pub spawn_groups: Vec<SpawnGroup>,
    pub pre_wave_delay: f32,
}

impl Default for Wave {
    fn default() -> Self {
        Self {
            name: "Wave".to_string(),
            spawn_groups: Vec::new(),
            pre_wave_delay: 2.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WaveSchedule {
    pub waves: Vec<Wave>,
    pub starting_wave: usize,
    /// Start the next wave automatically after a clear.
    pub auto_progress: bool,
    pub time_between_waves: f32,
}

impl Default for WaveSchedule {
    fn default() -> Self {
        Self {
            waves: Vec::new(),
            starting_wave: 0,
            auto_progress: true,
            time_between_waves: 5.0,
        }
    }
}

// ============================================================================
// RUNTIME
// ============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub enum WavePhase {
    /// Not started yet.
    Idle,
    /// Waiting out the pre-wave delay.
    PreWave { starts_at: f32 },
    /// Timelines running and/or enemies alive.
    Spawning,
    /// Cleared, counting down to the next wave.
    InterWave { next_at: f32 },
    /// Cleared or stopped, waiting for a manual trigger.
    Halted,
    AllComplete,
}

/// Published on wave lifecycle changes.
#[derive(Event, Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum WaveEvent {
    WaveStarted { index: usize },
    WaveCleared { index: usize },
    AllWavesComplete,
    PopulationChanged { alive: usize, total_spawned: usize },
}

/// Instantiates an archetype at a point. `None` means the request was refused.
pub trait SpawnCommand {
    fn spawn(&mut self, archetype: &str, at: Vec3) -> Option<Entity>;
}

/// Resumable wait-then-act loop for one spawn group.
#[derive(Debug, Clone, PartialEq)]
struct GroupTimeline {
    group: usize,
    spawned: u32,
    next_spawn_at: f32,
    finished: bool,
}

#[derive(Resource, Debug, Clone)]
pub struct WaveOrchestrator {
    schedule: WaveSchedule,
    phase: WavePhase,
    current_wave: usize,
    alive: HashSet<Entity>,
    total_spawned: usize,
    in_progress: bool,
    all_complete: bool,
    timelines: Vec<GroupTimeline>,
    /// Stopped mid-wave; the next trigger resumes the held timelines.
    suspended: bool,
    rng: StdRng,
    jitter_radius: f32,
    reconcile_interval: f32,
    next_reconcile: f32,
    outbox: Vec<WaveEvent>,
}

impl Default for WaveOrchestrator {
    fn default() -> Self {
        Self::new(WaveSchedule::default(), 0, 1.5, 0.5)
    }
}

impl WaveOrchestrator {
    pub fn new(schedule: WaveSchedule, seed: u64, jitter_radius: f32, reconcile_interval: f32) -> Self {
        let current_wave = schedule.starting_wave;
        Self {
            schedule,
            phase: WavePhase::Idle,
            current_wave,
            alive: HashSet::new(),
            total_spawned: 0,
            in_progress: false,
            all_complete: false,
            timelines: Vec::new(),
            suspended: false,
            rng: StdRng::seed_from_u64(seed),
            jitter_radius,
            reconcile_interval,
            next_reconcile: 0.0,
            outbox: Vec::new(),
        }
    }

    // ------------------------------------------------------------------
    // Control
    // ------------------------------------------------------------------

    /// Begin the wave sequence from the configured starting wave.
    pub fn start(&mut self, now: f32) {
        if self.phase != WavePhase::Idle {
            debug!("wave sequence already started ({:?})", self.phase);
            return;
        }
        if self.schedule.waves.is_empty() {
            warn!("no waves defined, wave sequence not started");
            return;
        }
        if self.schedule.starting_wave >= self.schedule.waves.len() {
            warn!(
                "starting wave {} out of range ({} waves), wave sequence not started",
                self.schedule.starting_wave,
                self.schedule.waves.len()
            );
            return;
        }
        self.current_wave = self.schedule.starting_wave;
        self.begin_wave(now);
    }

    /// Manually start the next wave. Works when idle or halted.
    pub fn trigger_next_wave(&mut self, now: f32) {
        if self.in_progress || self.all_complete {
            debug!("trigger ignored: wave in progress or all waves complete");
            return;
        }
        match self.phase {
            WavePhase::Idle => self.start(now),
            WavePhase::Halted if self.suspended => self.resume_wave(now),
            WavePhase::Halted => self.begin_wave(now),
            _ => debug!("trigger ignored in phase {:?}", self.phase),
        }
    }

    /// Halt spawning between spawns. Spawned units stay tracked, and a wave
    /// stopped while spawning resumes its remaining timelines on the next
    /// trigger instead of replaying.
    pub fn stop(&mut self) {
        if matches!(self.phase, WavePhase::Idle | WavePhase::AllComplete | WavePhase::Halted) {
            return;
        }
        info!("wave sequence stopped at wave {}", self.current_wave + 1);
        self.suspended = self.phase == WavePhase::Spawning;
        if !self.suspended {
            self.timelines.clear();
        }
        self.in_progress = false;
        self.phase = WavePhase::Halted;
    }

    /// Death notification from the damage channel.
    pub fn on_unit_died(&mut self, entity: Entity) {
        if self.alive.remove(&entity) {
            debug!("wave unit {:?} killed, {} remaining", entity, self.alive.len());
            self.push_population();
        }
    }

    /// Advance every timeline and phase transition due at `now`.
    pub fn update(&mut self, now: f32, spawner: &mut dyn SpawnCommand, exists: &dyn Fn(Entity) -> bool) {
        if self.in_progress && now >= self.next_reconcile {
            self.reconcile(exists);
            self.next_reconcile = now + self.reconcile_interval;
        }

        // Zero delays can chain several transitions into one tick.
        loop {
            let before = self.phase;
            match before {
                WavePhase::PreWave { starts_at } if now >= starts_at => self.open_wave(starts_at),
                WavePhase::Spawning => {
                    self.run_timelines(now, spawner);
                    if self.timelines.iter().all(|t| t.finished) && self.alive.is_empty() {
                        self.wave_cleared(now);
                    }
                }
                WavePhase::InterWave { next_at } if now >= next_at => self.begin_wave(next_at),
                _ => {}
            }
            if self.phase == before {
                break;
            }
        }
    }

    /// Drop tracked units that vanished without a death notification.
    pub fn reconcile(&mut self, exists: &dyn Fn(Entity) -> bool) {
        let before = self.alive.len();
        self.alive.retain(|&e| exists(e));
        let removed = before - self.alive.len();
        if removed > 0 {
            debug!("reconciled {} wave units destroyed elsewhere", removed);
            self.push_population();
        }
    }

    pub fn drain_events(&mut self) -> Vec<WaveEvent> {
        std::mem::take(&mut self.outbox)
    }

    // ------------------------------------------------------------------
    // Accessors
    // ------------------------------------------------------------------

    pub fn phase(&self) -> WavePhase {
        self.phase
    }

    pub fn current_wave_index(&self) -> usize {
        self.current_wave
    }

    pub fn total_waves(&self) -> usize {
        self.schedule.waves.len()
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    pub fn total_spawned(&self) -> usize {
        self.total_spawned
    }

    pub fn is_wave_in_progress(&self) -> bool {
        self.in_progress
    }

    pub fn all_waves_complete(&self) -> bool {
        self.all_complete
    }

    pub fn is_tracked(&self, entity: Entity) -> bool {
        self.alive.contains(&entity)
    }

    pub fn schedule(&self) -> &WaveSchedule {
        &self.schedule
    }

    // ------------------------------------------------------------------
    // Internals
    // ------------------------------------------------------------------

    fn begin_wave(&mut self, now: f32) {
        let Some(wave) = self.schedule.waves.get(self.current_wave) else {
            return;
        };
        info!(
            "starting {} (wave {}/{})",
            wave.name,
            self.current_wave + 1,
            self.schedule.waves.len()
        );
        self.phase = WavePhase::PreWave {
            starts_at: now + wave.pre_wave_delay.max(0.0),
        };
    }

    fn open_wave(&mut self, now: f32) {
        self.in_progress = true;
        self.total_spawned = 0;
        self.alive.clear();
        self.next_reconcile = now + self.reconcile_interval;

        let groups = self
            .schedule
            .waves
            .get(self.current_wave)
            .map(|w| w.spawn_groups.clone())
            .unwrap_or_default();

        self.timelines = groups
            .iter()
            .enumerate()
            .map(|(i, group)| {
                let usable = group.archetype.is_some() && group.spawn_point.is_some();
                if !usable {
                    warn!(
                        "wave {} group {} has no archetype or spawn point, skipping",
                        self.current_wave + 1,
                        i
                    );
                }
                GroupTimeline {
                    group: i,
                    spawned: 0,
                    next_spawn_at: now + group.start_delay.max(0.0),
                    finished: !usable || group.count == 0,
                }
            })
            .collect();

        self.outbox.push(WaveEvent::WaveStarted {
            index: self.current_wave,
        });
        self.phase = WavePhase::Spawning;
    }

    fn resume_wave(&mut self, now: f32) {
        self.suspended = false;
        self.in_progress = true;
        self.next_reconcile = now + self.reconcile_interval;
        for timeline in self.timelines.iter_mut().filter(|t| !t.finished) {
            timeline.next_spawn_at = timeline.next_spawn_at.max(now);
        }
        info!(
            "resuming wave {} with {} units alive",
            self.current_wave + 1,
            self.alive.len()
        );
        self.phase = WavePhase::Spawning;
    }

    fn run_timelines(&mut self, now: f32, spawner: &mut dyn SpawnCommand) {
        let Some(wave) = self.schedule.waves.get(self.current_wave) else {
            return;
        };

        for timeline in self.timelines.iter_mut() {
            let group = &wave.spawn_groups[timeline.group];
            let (Some(archetype), Some(point)) = (group.archetype.as_deref(), group.spawn_point) else {
                timeline.finished = true;
                continue;
            };

            while !timeline.finished && now >= timeline.next_spawn_at {
                let at = jitter(&mut self.rng, point, self.jitter_radius);
                match spawner.spawn(archetype, at) {
                    Some(entity) => {
                        self.alive.insert(entity);
                        self.total_spawned += 1;
                        self.outbox.push(WaveEvent::PopulationChanged {
                            alive: self.alive.len(),
                            total_spawned: self.total_spawned,
                        });
                        timeline.spawned += 1;
                        if timeline.spawned >= group.count {
                            timeline.finished = true;
                        } else {
                            timeline.next_spawn_at += group.spawn_interval.max(0.0);
                        }
                    }
                    None => {
                        warn!("spawn of '{}' refused, finishing group {}", archetype, timeline.group);
                        timeline.finished = true;
                    }
                }
            }
        }
    }

    fn wave_cleared(&mut self, now: f32) {
        let index = self.current_wave;
        self.in_progress = false;
        self.timelines.clear();
        info!("wave {} cleared", index + 1);
        self.outbox.push(WaveEvent::WaveCleared { index });

        self.current_wave += 1;
        if self.current_wave >= self.schedule.waves.len() {
            self.all_complete = true;
            self.phase = WavePhase::AllComplete;
            info!("all waves complete");
            self.outbox.push(WaveEvent::AllWavesComplete);
        } else if self.schedule.auto_progress {
            info!("next wave in {} seconds", self.schedule.time_between_waves);
            self.phase = WavePhase::InterWave {
                next_at: now + self.schedule.time_between_waves.max(0.0),
            };
        } else {
            self.phase = WavePhase::Halted;
        }
    }

    fn push_population(&mut self) {
        self.outbox.push(WaveEvent::PopulationChanged {
            alive: self.alive.len(),
            total_spawned: self.total_spawned,
        });
    }
}

/// Uniform random point in a horizontal disc around `center`.
fn jitter(rng: &mut StdRng, center: Vec3, radius: f32) -> Vec3 {
    if radius <= 0.0 {
        return center;
    }
    let angle = rng.gen_range(0.0..std::f32::consts::TAU);
    let r = radius * rng.gen::<f32>().sqrt();
    Vec3::new(center.x + r * angle.cos(), center.y, center.z + r * angle.sin())
}

/// Spawns through `Commands` using the archetype library.
pub struct CommandSpawner<'a, 'w, 's> {
    pub commands: &'a mut Commands<'w, 's>,
    pub library: &'a ArchetypeLibrary,
}

impl SpawnCommand for CommandSpawner<'_, '_, '_> {
    fn spawn(&mut self, archetype: &str, at: Vec3) -> Option<Entity> {
        match self.library.spawn(self.commands, archetype, at) {
            Ok(entity) => Some(entity),
            Err(err) => {
                warn!("{err}");
                None
            }
        }
    }
}

/// Feeds deaths to the orchestrator, advances it and publishes its events.
pub fn wave_system(
    time: Res<SimTime>,
    library: Res<ArchetypeLibrary>,
    entities: &Entities,
    mut orchestrator: ResMut<WaveOrchestrator>,
    mut commands: Commands,
    mut deaths: EventReader<UnitDied>,
    mut writer: EventWriter<WaveEvent>,
    mut log: ResMut<EventLog<WaveEvent>>,
) {
    for died in deaths.read() {
        orchestrator.on_unit_died(died.entity);
    }

    let mut spawner = CommandSpawner {
        commands: &mut commands,
        library: &library,
    };
    orchestrator.update(time.0, &mut spawner, &|e| entities.contains(e));

    for event in orchestrator.drain_events() {
        writer.send(event);
        log.push(event);
    }
}
