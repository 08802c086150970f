//! Core ECS benchmarks: table churn, dense iteration and the asset cache.
//!
//! Run with: `cargo bench --bench ecs_benchmarks`

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};

use mip_ecs::prelude::*;

// ---------------------------------------------------------------------------
// Benchmark component types
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq)]
struct Position {
    x: f32,
    y: f32,
}

#[derive(Debug, Clone, PartialEq)]
struct Velocity {
    dx: f32,
    dy: f32,
}

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn setup_manager(entity_count: usize) -> (Manager, Vec<EntityId>) {
    let mut manager = Manager::new();
    manager.register_component::<Position>();
    manager.register_component::<Velocity>();

    let mut entities = Vec::with_capacity(entity_count);
    for i in 0..entity_count {
        let e = manager.create_entity();
        manager.add_component(
            e,
            Position {
                x: i as f32,
                y: 0.0,
            },
        );
        manager.add_component(e, Velocity { dx: 1.0, dy: 0.5 });
        entities.push(e);
    }
    (manager, entities)
}

// ---------------------------------------------------------------------------
// Benchmarks
// ---------------------------------------------------------------------------

fn bench_integrate(c: &mut Criterion) {
    let mut group = c.benchmark_group("integrate_positions");
    for &count in &[1_000usize, 10_000] {
        let (mut manager, _entities) = setup_manager(count);
        group.bench_with_input(BenchmarkId::from_parameter(count), &count, |b, _| {
            b.iter(|| {
                let (mut positions, velocities) = manager.views_mut::<Position, Velocity>();
                for (entity, vel) in velocities.iter() {
                    if let Some(pos) = positions.get_mut(entity) {
                        pos.x += vel.dx * 0.016;
                        pos.y += vel.dy * 0.016;
                    }
                }
                black_box(positions.len());
            });
        });
    }
    group.finish();
}

fn bench_add_remove(c: &mut Criterion) {
    let (mut manager, entities) = setup_manager(1_000);
    c.bench_function("remove_then_add_velocity_1k", |b| {
        b.iter(|| {
            for &e in &entities {
                black_box(manager.remove_component::<Velocity>(e));
            }
            for &e in &entities {
                manager.add_component(e, Velocity { dx: 1.0, dy: 0.5 });
            }
        });
    });
}

fn bench_create_destroy(c: &mut Criterion) {
    c.bench_function("create_destroy_1k", |b| {
        b.iter(|| {
            let (mut manager, entities) = setup_manager(1_000);
            for e in entities {
                let _ = manager.destroy_entity(e);
            }
            black_box(manager.entity_count());
        });
    });
}

fn bench_asset_cache_hit(c: &mut Criterion) {
    let mut manager = Manager::new();
    manager.register_asset::<String, _>(|key: &str| -> anyhow::Result<String> {
        Ok(key.to_owned())
    });
    manager.load_asset::<String>("textures/player.png");

    c.bench_function("load_asset_cache_hit", |b| {
        b.iter(|| black_box(manager.load_asset::<String>(black_box("textures/player.png"))));
    });
}

criterion_group!(
    benches,
    bench_integrate,
    bench_add_remove,
    bench_create_destroy,
    bench_asset_cache_hit
);
criterion_main!(benches);
