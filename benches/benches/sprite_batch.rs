// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sprite batch benchmarks: population, culled render preparation, and picking.

use criterion::{BatchSize, Criterion, Throughput, black_box, criterion_group, criterion_main};
use kurbo::{Affine, Point, Rect, Vec2};
use mosaic_batch::{
    BatchLayout, LogicalPosition, RenderSort, RenderTargetId, SpriteBatch, VecRenderQueue,
    ViewState,
};

fn grid_batch(side: i32, indexed: bool) -> SpriteBatch {
    let mut batch = SpriteBatch::new();
    batch.set_index_enabled(indexed);
    batch.set_layout(BatchLayout::Rectilinear);
    batch.set_default_stride(Vec2::new(1.0, 1.0));
    for y in 0..side {
        for x in 0..side {
            batch.add_item(LogicalPosition::xy(x, y));
        }
    }
    batch
}

fn bench_populate(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_populate");
    let side = 100;
    group.throughput(Throughput::Elements(10_000));
    for indexed in [false, true] {
        group.bench_function(format!("grid_{side}x{side}_indexed_{indexed}"), |b| {
            b.iter(|| black_box(grid_batch(side, indexed).len()));
        });
    }
    group.finish();
}

fn bench_prepare_render(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_prepare_render");
    let view = ViewState::new(Rect::new(20.0, 20.0, 52.0, 38.0));
    for indexed in [false, true] {
        let mut batch = grid_batch(200, indexed);
        batch.set_sort_mode(RenderSort::YAxis);
        group.bench_function(format!("view_32x18_indexed_{indexed}"), |b| {
            b.iter_batched(
                VecRenderQueue::new,
                |mut queue| {
                    let n = batch.prepare_render(RenderTargetId(1), &view, &mut queue);
                    queue.sort();
                    black_box(n)
                },
                BatchSize::SmallInput,
            );
        });
    }

    // A new batch transform invalidates every cached world position.
    let mut batch = grid_batch(200, true);
    let mut angle = 0.0_f64;
    group.bench_function("view_32x18_transform_changes", |b| {
        b.iter_batched(
            VecRenderQueue::new,
            |mut queue| {
                angle += 0.01;
                batch.set_batch_transform(Affine::rotate_about(angle, Point::new(36.0, 28.0)));
                black_box(batch.prepare_render(RenderTargetId(1), &view, &mut queue))
            },
            BatchSize::SmallInput,
        );
    });
    group.finish();
}

fn bench_pick(c: &mut Criterion) {
    let mut group = c.benchmark_group("batch_pick");
    let mut batch = grid_batch(200, true);
    batch.set_batch_transform(Affine::translate((-100.0, -100.0)) * Affine::scale(2.0));
    let points: Vec<Point> = (0..256)
        .map(|i| {
            let t = f64::from(i);
            Point::new((t * 37.0) % 400.0 - 100.0, (t * 53.0) % 400.0 - 100.0)
        })
        .collect();
    group.throughput(Throughput::Elements(points.len() as u64));
    group.bench_function("point", |b| {
        b.iter(|| {
            let mut hits = 0_usize;
            for p in &points {
                hits += batch.pick_point(black_box(*p)).len();
            }
            black_box(hits)
        });
    });
    group.bench_function("ray_diagonal", |b| {
        b.iter(|| {
            black_box(
                batch
                    .pick_ray(Point::new(-100.0, -100.0), Point::new(300.0, 300.0))
                    .len(),
            )
        });
    });
    group.finish();
}

criterion_group!(benches, bench_populate, bench_prepare_render, bench_pick);
criterion_main!(benches);
