//! Benchmarks for target selection over a crowd.
//!
//! Run with: cargo bench --bench targeting
//!
//! This will generate HTML reports in target/criterion/

use bevy_ecs::entity::Entity;
use criterion::{criterion_group, criterion_main, BenchmarkId, Criterion};
use glam::Vec3;
use skirmish_sim::{evaluate, Candidate, TagPriority, Targeting, TargetingConfig};
use std::hint::black_box;

const TAGS: [&str; 3] = ["Hero", "Tower", "HomeBase"];

/// Friendly candidates scattered on a ring around the origin.
fn crowd(count: usize) -> Vec<Candidate<'static>> {
    (0..count)
        .map(|i| {
            let angle = i as f32 * 0.37;
            let dist = 1.0 + (i % 12) as f32;
            Candidate {
                entity: Entity::from_raw(i as u32 + 1),
                tag: TAGS[i % TAGS.len()],
                position: Vec3::new(dist * angle.cos(), 0.0, dist * angle.sin()),
                health_percent: Some(((i % 10) as f32 + 1.0) / 10.0),
            }
        })
        .collect()
}

fn grunt_targeting() -> Targeting {
    let mut targeting = Targeting::new(TargetingConfig {
        tag_priorities: vec![
            TagPriority::new("Hero", 0.6),
            TagPriority::new("Tower", 0.5),
            TagPriority::new("HomeBase", 0.3),
        ],
        ..Default::default()
    });
    // A handful of recent attackers so the aggro lookup is exercised.
    for i in (1..500).step_by(50) {
        targeting.notify_damaged_by(Entity::from_raw(i), 0.0);
    }
    targeting
}

fn bench_evaluate(c: &mut Criterion) {
    let mut group = c.benchmark_group("targeting_evaluate");

    for count in [50usize, 500] {
        let candidates = crowd(count);
        group.bench_with_input(BenchmarkId::from_parameter(format!("{count}_candidates")), &count, |b, _| {
            let mut targeting = grunt_targeting();
            b.iter(|| {
                let result = evaluate("Enemy", Vec3::ZERO, &mut targeting, black_box(&candidates), None, 1.0);
                black_box(result)
            });
        });
    }

    group.finish();
}

criterion_group!(benches, bench_evaluate);
criterion_main!(benches);
