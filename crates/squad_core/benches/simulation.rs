//! Simulation benchmarks for squad_core.
//!
//! Run with: `cargo bench -p squad_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BatchSize, Criterion};
use squad_core::prelude::*;
use squad_core::spatial::SpatialHash;

fn skirmish(spatial_hash: bool) -> Simulation {
    let settings = SimulationSettings::default().with_seed(7);
    let mut sim = Simulation::with_settings(settings);
    if spatial_hash {
        sim = sim.with_spatial_query(Box::new(SpatialHash::new(Fixed::from_num(4))));
    }

    let mut config = AgentConfig::new("line-infantry");
    config.behaviors = vec![
        BehaviorTemplate::new(BehaviorParams::arrival()),
        BehaviorTemplate::new(BehaviorParams::attack()),
        BehaviorTemplate::new(BehaviorParams::separation()).with_weight(Fixed::from_num(0.6)),
        BehaviorTemplate::new(BehaviorParams::fear()).with_probability(Fixed::from_num(0.01)),
    ];
    let config = sim.register_config(config).unwrap();

    for row in 0..4 {
        let y = row * 8;
        sim.create_squad(Vec2Fixed::from_ints(-10, y), FormationType::Square, config, 9, Faction::Defenders)
            .unwrap();
        sim.create_squad(Vec2Fixed::from_ints(10, y), FormationType::V, config, 9, Faction::Raiders)
            .unwrap();
    }
    sim
}

/// Ticks a 72-agent skirmish for one simulated second.
pub fn simulation_benchmark(c: &mut Criterion) {
    c.bench_function("skirmish_20_ticks_linear_scan", |b| {
        b.iter_batched(
            || skirmish(false),
            |mut sim| {
                for _ in 0..20 {
                    black_box(sim.tick());
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("skirmish_20_ticks_spatial_hash", |b| {
        b.iter_batched(
            || skirmish(true),
            |mut sim| {
                for _ in 0..20 {
                    black_box(sim.tick());
                }
            },
            BatchSize::SmallInput,
        );
    });

    c.bench_function("state_hash", |b| {
        let sim = skirmish(false);
        b.iter(|| black_box(sim.state_hash()));
    });
}

criterion_group!(benches, simulation_benchmark);
criterion_main!(benches);
