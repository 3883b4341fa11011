// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Grid picking.
//!
//! Lay out a tile grid, pick tiles by point, area, and ray through a scaled and rotated batch
//! transform, then save and reload the grid as JSON.
//!
//! Run:
//! - `RUST_LOG=info cargo run -p mosaic_demos --example grid_picking`

use kurbo::{Affine, Point, Rect, Vec2};
use log::info;
use mosaic_batch::{BatchLayout, LogicalPosition, SpriteBatch, SpritesNode};

fn main() {
    env_logger::init();

    let mut batch = SpriteBatch::new();
    batch.set_layout(BatchLayout::Rectilinear);
    batch.set_default_stride(Vec2::new(1.0, 1.0));
    for y in 0..8 {
        for x in 0..8 {
            batch.add_item(LogicalPosition::xy(x, y));
            if (x + y) % 2 == 0 {
                batch.set_item_render_group(Some("dark"));
            }
        }
    }
    batch.select_item_by_logical_position(&LogicalPosition::xy(3, 4));
    batch.set_item_name("door");
    batch.set_item_image("tiles", 7);
    info!("grid of {} tiles", batch.len());

    batch.set_batch_transform(
        Affine::translate((100.0, 50.0)) * Affine::rotate(0.3) * Affine::scale(16.0),
    );

    let world = batch.batch_transform() * Point::new(3.1, 4.2);
    println!("pick_point {world:?} -> {:?}", batch.pick_point(world));

    let area = Rect::from_points(
        batch.batch_transform() * Point::new(0.5, 0.5),
        batch.batch_transform() * Point::new(2.5, 1.5),
    );
    println!("pick_area {area:?} -> {:?}", batch.pick_area(area));

    let (a, b) = (
        batch.batch_transform() * Point::new(-1.0, -1.0),
        batch.batch_transform() * Point::new(9.0, 9.0),
    );
    println!("pick_ray (nearest first) -> {:?}", batch.pick_ray(a, b));

    // Save, reload into a fresh batch, and find the named tile again.
    let node = batch.write_sprites();
    let json = match serde_json::to_string_pretty(&node) {
        Ok(json) => json,
        Err(e) => {
            eprintln!("serialize failed: {e}");
            return;
        }
    };
    println!("saved {} records, {} bytes", node.sprites.len(), json.len());

    let loaded: SpritesNode = match serde_json::from_str(&json) {
        Ok(node) => node,
        Err(e) => {
            eprintln!("parse failed: {e}");
            return;
        }
    };
    let mut copy = SpriteBatch::new();
    copy.set_layout(BatchLayout::Rectilinear);
    let added = copy.read_sprites(&loaded);
    let door = copy
        .find_by_name("door")
        .and_then(|key| copy.item(key))
        .map(|item| (item.batch_id(), item.logical_position()));
    println!("reloaded {added} items, door = {door:?}");
}
