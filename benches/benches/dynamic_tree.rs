// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Dynamic AABB tree benchmarks: build, incremental moves, area queries, and ray casts.

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use mosaic_index::{Aabb2D, DynamicTree, ProxyId, RayCastInput, RayControl};

#[derive(Clone, Copy)]
struct Rng(u64);

impl Rng {
    fn next_u64(&mut self) -> u64 {
        let mut x = self.0;
        x ^= x << 13;
        x ^= x >> 7;
        x ^= x << 17;
        self.0 = x;
        x
    }

    fn next_f64(&mut self) -> f64 {
        let v = (self.next_u64() >> 11) as f64;
        v / (1_u64 << 53) as f64
    }
}

fn gen_grid_boxes(side: usize, cell: f64) -> Vec<Aabb2D<f64>> {
    let mut out = Vec::with_capacity(side * side);
    for y in 0..side {
        for x in 0..side {
            let (x0, y0) = (x as f64 * cell, y as f64 * cell);
            out.push(Aabb2D::new(x0, y0, x0 + cell * 0.9, y0 + cell * 0.9));
        }
    }
    out
}

fn gen_random_boxes(n: usize, extent: f64, seed: u64) -> Vec<Aabb2D<f64>> {
    let mut rng = Rng(seed);
    (0..n)
        .map(|_| {
            let x = rng.next_f64() * extent;
            let y = rng.next_f64() * extent;
            let w = 0.5 + rng.next_f64() * 4.0;
            let h = 0.5 + rng.next_f64() * 4.0;
            Aabb2D::new(x, y, x + w, y + h)
        })
        .collect()
}

fn build(boxes: &[Aabb2D<f64>]) -> (DynamicTree<f64, u32>, Vec<ProxyId>) {
    let mut tree = DynamicTree::new();
    let ids = boxes
        .iter()
        .zip(0_u32..)
        .map(|(b, i)| tree.create_proxy(*b, i))
        .collect();
    (tree, ids)
}

fn bench_build(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_build");
    for side in [32_usize, 100] {
        let boxes = gen_grid_boxes(side, 10.0);
        group.throughput(Throughput::Elements(boxes.len() as u64));
        group.bench_function(format!("grid_{side}x{side}"), |b| {
            b.iter(|| black_box(build(&boxes).0.height()));
        });
    }
    let boxes = gen_random_boxes(10_000, 1000.0, 0x9E37_79B9_7F4A_7C15);
    group.throughput(Throughput::Elements(boxes.len() as u64));
    group.bench_function("random_10k", |b| {
        b.iter(|| black_box(build(&boxes).0.height()));
    });
    group.finish();
}

fn bench_move(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_move");
    let boxes = gen_random_boxes(10_000, 1000.0, 42);
    group.throughput(Throughput::Elements(boxes.len() as u64));
    // Small steps stay inside the fat bound; large ones force reinsertion.
    for (label, step) in [("jitter", 0.01), ("teleport", 25.0)] {
        group.bench_function(label, |b| {
            b.iter_batched(
                || build(&boxes),
                |(mut tree, ids)| {
                    let mut moved = 0_usize;
                    for (id, bx) in ids.iter().zip(&boxes) {
                        let next =
                            Aabb2D::new(bx.min_x + step, bx.min_y, bx.max_x + step, bx.max_y);
                        moved += usize::from(tree.move_proxy(*id, next, (step, 0.0)));
                    }
                    black_box(moved)
                },
                BatchSize::SmallInput,
            );
        });
    }
    group.finish();
}

fn bench_query(c: &mut Criterion) {
    let mut group = c.benchmark_group("tree_query");
    let (tree, _) = build(&gen_grid_boxes(100, 10.0));
    for (label, window) in [
        ("small_window", Aabb2D::new(200.0, 200.0, 240.0, 240.0)),
        ("large_window", Aabb2D::new(100.0, 100.0, 600.0, 600.0)),
    ] {
        group.bench_function(label, |b| {
            b.iter(|| {
                let mut hits = 0_usize;
                tree.query(black_box(window), |_, _| {
                    hits += 1;
                    true
                });
                black_box(hits)
            });
        });
    }

    let mut rng = Rng(7);
    let rays: Vec<RayCastInput<f64>> = (0..256)
        .map(|_| {
            RayCastInput::new(
                rng.next_f64() * 1000.0,
                rng.next_f64() * 1000.0,
                rng.next_f64() * 1000.0,
                rng.next_f64() * 1000.0,
            )
        })
        .collect();
    group.throughput(Throughput::Elements(rays.len() as u64));
    group.bench_function("ray_all_hits", |b| {
        b.iter(|| {
            let mut hits = 0_usize;
            for ray in &rays {
                tree.ray_cast(*ray, |_, _, _| {
                    hits += 1;
                    RayControl::Ignore
                });
            }
            black_box(hits)
        });
    });
    group.finish();
}

criterion_group!(benches, bench_build, bench_move, bench_query);
criterion_main!(benches);
