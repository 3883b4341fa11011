// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Sprite batch basics.
//!
//! Add a few items, style them through the selection, move the batch, and prepare and draw
//! render requests with a printing renderer.
//!
//! Run:
//! - `RUST_LOG=debug cargo run -p mosaic_demos --example sprite_batch_basics`

use kurbo::{Affine, Point, Rect, Size, Vec2};
use log::info;
use mosaic_batch::{
    BatchRenderer, BlendFactor, Color, LogicalPosition, QuadSubmission, RenderSort,
    RenderTargetId, SpriteBatch, VecRenderQueue, ViewState,
};

struct PrintRenderer;

impl BatchRenderer for PrintRenderer {
    fn submit_quad(&mut self, quad: &QuadSubmission<'_>) {
        let corners: Vec<String> = quad
            .corners
            .iter()
            .map(|p| format!("({:.1}, {:.1})", p.x, p.y))
            .collect();
        println!(
            "  quad {} frame={:?} flip=({}, {})",
            corners.join(" "),
            quad.frame,
            quad.flip_x,
            quad.flip_y
        );
    }
}

fn main() {
    env_logger::init();

    let mut batch = SpriteBatch::new();
    batch.set_sort_mode(RenderSort::ZAxis);

    // Each add selects the new item, so the following setters style it.
    let hero = batch.add_item(LogicalPosition::xy(0, 0));
    batch.set_item_name("hero");
    batch.set_item_size(Size::new(2.0, 2.0));
    batch.set_item_image("characters", 3);
    batch.set_item_depth(1.0);

    let shadow = batch.add_item(LogicalPosition::xy(1, 0));
    batch.set_item_local_position(Point::new(0.2, 0.4));
    batch.set_item_size(Size::new(2.0, 1.0));
    batch.set_item_blend(
        true,
        BlendFactor::SrcAlpha,
        BlendFactor::OneMinusSrcAlpha,
        Color { r: 0.0, g: 0.0, b: 0.0, a: 0.5 },
    );

    let torch = batch.add_item(LogicalPosition::xy(2, 0));
    batch.set_item_local_position(Point::new(6.0, -1.0));
    batch.set_item_animation("torch_flicker");
    batch.set_item_flip(true, false);
    batch.set_item_depth(2.0);
    info!("added hero={hero} shadow={shadow} torch={torch}");

    if batch.update_local_extents() {
        println!("local extents: {:?}", batch.local_extents());
    }

    let view = ViewState::new(Rect::new(-4.0, -4.0, 4.0, 4.0));
    for (label, transform) in [
        ("identity", Affine::IDENTITY),
        ("moved right", Affine::translate(Vec2::new(3.0, 0.0))),
    ] {
        batch.set_batch_transform(transform);
        let mut queue = VecRenderQueue::new();
        let emitted = batch.prepare_render(RenderTargetId(0), &view, &mut queue);
        queue.sort();
        println!("{label}: {emitted} requests (sort {})", queue.sort_mode());
        for request in queue.requests() {
            println!(
                " id {} at {:?} depth {}",
                request.serial_id, request.world_position, request.depth
            );
            batch.render_request(request, &mut PrintRenderer);
        }
    }

    // Remove the shadow by id; its id is not handed out again.
    batch.select_item_by_id(shadow);
    batch.remove_selected_item();
    let next = batch.add_item(LogicalPosition::xy(1, 0));
    println!("re-added at (1, 0) with id {next}, {} items", batch.len());
}
