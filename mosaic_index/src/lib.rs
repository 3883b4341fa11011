// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

// After you edit the crate's doc comment, run this command, then check README.md for any missing links
// cargo rdme --workspace-project=mosaic_index --heading-base-level=0

//! Mosaic Index: a dynamic AABB tree for broadphase culling and picking.
//!
//! Mosaic Index keeps a set of axis-aligned boxes ("proxies"), each tagged with a user payload,
//! and answers "what overlaps this region" or "what does this segment pass through" without
//! scanning every proxy.
//!
//! - Proxies are stored with a fattened bound, so small movements do not restructure the tree.
//!   [`DynamicTree::move_proxy`] reports whether a reinsertion happened.
//! - Insertion picks a sibling by a perimeter cost heuristic and rebalances with rotations.
//! - Area queries and ray casts share one traversal through the [`Visitor`] trait.
//! - Handles are generational ([`ProxyId`]); [`ProxyId::INVALID`] marks "not indexed".
//!
//! It is generic over the scalar type (`f32` or `f64`) and does not depend on any geometry crate.
//! Higher layers compute their own AABBs and feed them here.
//!
//! # Example
//!
//! ```rust
//! use mosaic_index::{Aabb2D, DynamicTree, RayCastInput, RayControl};
//!
//! let mut tree: DynamicTree<f64, u32> = DynamicTree::new();
//! let a = tree.create_proxy(Aabb2D::new(0.0, 0.0, 1.0, 1.0), 1);
//! let _b = tree.create_proxy(Aabb2D::new(5.0, 5.0, 6.0, 6.0), 2);
//!
//! // Area query: the callback returns `false` to stop early.
//! let mut hits = Vec::new();
//! tree.query(Aabb2D::new(0.0, 0.0, 2.0, 2.0), |_, payload| {
//!     hits.push(*payload);
//!     true
//! });
//! assert_eq!(hits, vec![1]);
//!
//! // Small moves stay inside the fattened bound.
//! assert!(!tree.move_proxy(a, Aabb2D::new(0.05, 0.0, 1.05, 1.0), (0.05, 0.0)));
//!
//! // Ray cast: ignore every hit to collect all of them.
//! let mut crossed = Vec::new();
//! tree.ray_cast(RayCastInput::new(-1.0, 5.5, 10.0, 5.5), |_, _, payload| {
//!     crossed.push(*payload);
//!     RayControl::Ignore
//! });
//! assert_eq!(crossed, vec![2]);
//! ```
//!
//! ### Float semantics
//!
//! This crate assumes no NaNs for coordinates. Overlap tests are inclusive: boxes that only
//! touch along an edge overlap.

#![no_std]

extern crate alloc;

pub mod ray;
pub mod tree;
pub mod types;
pub mod visit;

pub use ray::{RayCastInput, RayControl};
pub use tree::{DynamicTree, DynamicTreeF32, DynamicTreeF64, ProxyId, TreeConfig};
pub use types::{Aabb2D, Scalar};
pub use visit::{VisitControl, Visitor};
