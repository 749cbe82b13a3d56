//! Spatial index benchmarks for td_core.
//!
//! Run with: `cargo bench -p td_core`

// Benchmark binaries don't need docs on macro-generated functions
#![allow(missing_docs)]

use criterion::{black_box, criterion_group, criterion_main, BenchmarkId, Criterion};
use td_core::config::GridConfig;
use td_core::math::{Fixed, Vec2Fixed};
use td_core::spatial::SpatialIndex;

fn populated_index(count: u64) -> SpatialIndex {
    let mut index = match SpatialIndex::new(GridConfig::default()) {
        Ok(index) => index,
        Err(err) => panic!("default grid config rejected: {err}"),
    };
    for id in 0..count {
        // Spread deterministically over the 1024x768 world.
        let x = (id * 37 % 1024) as i32;
        let y = (id * 53 % 768) as i32;
        index.insert_at(id, Vec2Fixed::from_ints(x, y));
    }
    index
}

/// Closest-target queries as issued by towers every frame.
pub fn query_benchmark(c: &mut Criterion) {
    let mut group = c.benchmark_group("query_closest");
    for count in [100_u64, 1_000, 5_000] {
        let index = populated_index(count);
        let center = Vec2Fixed::from_ints(512, 384);
        let radius = Fixed::from_num(200);
        group.bench_with_input(BenchmarkId::from_parameter(count), &index, |b, index| {
            b.iter(|| index.query_closest(black_box(center), black_box(radius), None));
        });
    }
    group.finish();
}

/// Per-frame movement updates for every indexed entity.
pub fn update_benchmark(c: &mut Criterion) {
    c.bench_function("update_1000", |b| {
        let mut index = populated_index(1_000);
        let mut step = 0_i32;
        b.iter(|| {
            step = (step + 1) % 64;
            for id in 0..1_000_u64 {
                let x = ((id * 37 % 1024) as i32 + step) % 1024;
                let y = (id * 53 % 768) as i32;
                index.update_at(id, Vec2Fixed::from_ints(x, y));
            }
        });
    });
}

criterion_group!(benches, query_benchmark, update_benchmark);
criterion_main!(benches);
