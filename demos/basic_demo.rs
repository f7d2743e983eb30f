//! Basic demonstration of the skirmish simulation.
//!
//! Run with: RUST_LOG=info cargo run --example basic_demo

use glam::Vec3;
use skirmish_sim::{BehaviorState, BoundsSampler, PolylinePath, SimConfig, SimWorld, SpawnGroup, Wave, WaveEvent};

fn main() {
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    println!("=== Skirmish Sim - Demo ===\n");

    let mut config = SimConfig::default();
    config.rng_seed = 7;
    config.waves.time_between_waves = 3.0;
    config.waves.waves = vec![
        Wave {
            name: "Scouts".to_string(),
            spawn_groups: vec![SpawnGroup::new("enemy_grunt", 3, Vec3::new(40.0, 0.0, 10.0))],
            pre_wave_delay: 1.0,
        },
        Wave {
            name: "Pincer".to_string(),
            spawn_groups: vec![
                SpawnGroup::new("enemy_grunt", 4, Vec3::new(40.0, 0.0, 15.0)),
                SpawnGroup {
                    start_delay: 1.0,
                    ..SpawnGroup::new("enemy_grunt", 4, Vec3::new(40.0, 0.0, -15.0))
                },
            ],
            ..Default::default()
        },
    ];

    let mut sim = SimWorld::with_config(config);
    sim.set_nav_sampler(BoundsSampler {
        min_x: -60.0,
        max_x: 60.0,
        min_z: -30.0,
        max_z: 30.0,
        ground: 0.0,
    });

    // Home base at the end of the road, a caravan travelling toward it.
    sim.spawn_entity("HomeBase", Vec3::new(-40.0, 0.0, 0.0), 200.0);
    sim.spawn_entity("Tower", Vec3::new(0.0, 0.0, 6.0), 40.0);
    let caravan = sim.spawn_entity("Hero", Vec3::new(30.0, 0.0, 0.0), 60.0);
    sim.set_reference_path(
        PolylinePath::new(vec![
            Vec3::new(30.0, 0.0, 0.0),
            Vec3::new(0.0, 0.0, 0.0),
            Vec3::new(-35.0, 0.0, 0.0),
        ]),
        Some(caravan),
    );
    for i in 0..4 {
        if let Err(err) = sim.spawn_unit("escort", Vec3::new(32.0 + i as f32, 0.0, 2.0)) {
            eprintln!("spawn failed: {err}");
        }
    }

    sim.start_waves();

    // 40 seconds at 20 frames per second.
    for frame in 0..800 {
        sim.step(0.05);

        for event in sim.drain_wave_events() {
            match event {
                WaveEvent::WaveStarted { index } => println!("[t={:.1}] wave {} started", sim.current_time(), index + 1),
                WaveEvent::WaveCleared { index } => println!("[t={:.1}] wave {} cleared", sim.current_time(), index + 1),
                WaveEvent::AllWavesComplete => println!("[t={:.1}] all waves complete", sim.current_time()),
                WaveEvent::PopulationChanged { .. } => {}
            }
        }
        let deaths = sim.drain_deaths();
        if !deaths.is_empty() {
            println!("[t={:.1}] {} unit(s) died", sim.current_time(), deaths.len());
        }

        if (frame + 1) % 100 == 0 {
            print_summary(&mut sim);
        }
        if sim.waves().all_waves_complete() {
            break;
        }
    }

    println!("\n=== Final State (JSON) ===\n");
    match sim.snapshot().to_json_pretty() {
        Ok(json) => println!("{json}"),
        Err(err) => eprintln!("snapshot failed: {err}"),
    }
}

fn print_summary(sim: &mut SimWorld) {
    let snapshot = sim.snapshot();
    println!("--- Tick {} (t={:.1}s) ---", snapshot.tick, snapshot.time);
    if let Some(wave) = &snapshot.wave {
        println!(
            "  wave {}/{} alive={} spawned={}",
            wave.current_wave + 1,
            wave.total_waves,
            wave.alive,
            wave.total_spawned
        );
    }
    for unit in &snapshot.units {
        let state = match unit.state {
            Some(BehaviorState::Advance) => "advance",
            Some(BehaviorState::Engage) => "engage",
            Some(BehaviorState::Retreat) => "retreat",
            None => "-",
        };
        println!(
            "  {:>8} pos=({:6.1}, {:6.1}) hp={:5.1}/{:5.1} [{}]",
            unit.tag, unit.x, unit.z, unit.health, unit.health_max, state
        );
    }
}
