// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=mosaic_batch --heading-base-level=0

//! Mosaic Batch: a Kurbo-native sprite batch with a synchronized spatial index.
//!
//! A [`SpriteBatch`] owns many small drawable quads ([`BatchItem`]s) that share one
//! batch-to-world transform. It keeps a dynamic AABB tree ([`mosaic_index`]) over the items'
//! local bounds so that culling and picking do not scan every item, and turns the visible items
//! into [`RenderRequest`]s for a downstream renderer.
//!
//! - Items are addressed by batch id, by [`LogicalPosition`] (grid coordinates and the like),
//!   and by name. Ids start at 1 and are not reused until the batch is cleared.
//! - Items live in a recycling [`ItemPool`]; every checkout starts from the default state.
//! - The spatial index can be toggled. Enabling it indexes every existing item and disabling it
//!   removes every proxy.
//! - Queries (area, oriented box, ray, point) are exact: the tree prunes, and each candidate is
//!   tested against its tight AABB or oriented box. Each item appears at most once per query.
//! - Render preparation culls against the view, emits one request per visible item, and stamps
//!   each request with the transform version so cached world data is refreshed only when needed.
//!
//! ## Select, then mutate
//!
//! Most per-item mutators act on the selected item, which [`SpriteBatch::add_item`] sets. Failures
//! (nothing selected, duplicate name, occupied logical position) never panic: the `try_*` methods
//! return a [`BatchError`], and the plain methods log it with [`log::warn!`] and return
//! `false`, `0`, or `None`.
//!
//! ### Minimal usage
//!
//! ```
//! use kurbo::{Point, Rect, Size};
//! use mosaic_batch::{LogicalPosition, RenderTargetId, SpriteBatch, VecRenderQueue, ViewState};
//!
//! let mut batch = SpriteBatch::new();
//! let a = batch.add_item(LogicalPosition::xy(0, 0));
//! let b = batch.add_item(LogicalPosition::xy(4, 0));
//! batch.set_item_size(Size::new(2.0, 2.0));
//! assert_eq!((a, b), (1, 2));
//!
//! // Local-space area query.
//! batch.query_area(Rect::new(-1.0, -1.0, 1.0, 1.0), false);
//! let hits: Vec<u32> = batch.query_results().iter().map(|r| r.batch_id).collect();
//! assert_eq!(hits, [a]);
//!
//! // World-space pick.
//! assert_eq!(batch.pick_point(Point::new(4.9, 0.9)), [b]);
//!
//! // Render preparation culls to the view.
//! let mut queue = VecRenderQueue::new();
//! let view = ViewState::new(Rect::new(2.0, -2.0, 8.0, 2.0));
//! assert_eq!(batch.prepare_render(RenderTargetId(1), &view, &mut queue), 1);
//! assert_eq!(queue.requests()[0].serial_id, b);
//! ```
//!
//! ## Features
//!
//! - `std` (default): forwards to `kurbo/std`.
//! - `libm`: `no_std` float math for Kurbo.
//! - `serde` (default): [`BatchConfig`] deserialization and the `persist` module
//!   ([`SpriteRecord`], [`SpritesNode`]).

#![no_std]

extern crate alloc;

/// Implement `Serialize`/`Deserialize` through `Display`/`FromStr`.
#[cfg(feature = "serde")]
macro_rules! serde_via_str {
    ($ty:ty) => {
        impl serde::Serialize for $ty {
            fn serialize<S: serde::Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
                serializer.collect_str(self)
            }
        }

        impl<'de> serde::Deserialize<'de> for $ty {
            fn deserialize<D: serde::Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
                let s = <alloc::string::String as serde::Deserialize>::deserialize(deserializer)?;
                s.parse().map_err(serde::de::Error::custom)
            }
        }
    };
}

#[cfg(feature = "serde")]
pub(crate) use serde_via_str;

mod batch;
mod config;
mod error;
mod geometry;
mod intern;
mod item;
mod layout;
mod logical;
mod pool;
mod query;
mod render;

#[cfg(feature = "serde")]
pub mod persist;

pub use batch::SpriteBatch;
pub use config::BatchConfig;
pub use error::BatchError;
pub use geometry::Oobb;
pub use intern::{Interner, Symbol};
pub use item::{BatchItem, BlendFactor, Color, DataObjectId, FrameSource, ImageFrame, ItemFlags};
pub use layout::{BatchLayout, CustomLayout};
pub use logical::{LogicalPosition, MAX_LOGICAL_ARGS};
pub use pool::{ItemKey, ItemPool};
pub use query::{BatchQuery, QueryResult};
pub use render::{
    BatchRenderer, QuadSubmission, RenderQueue, RenderRequest, RenderSort, RenderTargetId,
    VecRenderQueue, ViewState,
};

#[cfg(feature = "serde")]
pub use persist::{SPRITES_NODE_NAME, SpriteRecord, SpritesNode};
