// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Visitor interface driving the single tree traversal.
//!
//! Area queries and ray casts are both expressed as a [`Visitor`]: one method decides
//! whether a node's bound is worth descending into, the other handles a leaf and says
//! whether to keep going. [`DynamicTree::traverse`](crate::DynamicTree::traverse) is the
//! only traversal loop in the crate.

use crate::ray::{RayCastInput, RayControl};
use crate::tree::ProxyId;
use crate::types::{Aabb2D, Scalar};

/// Whether the traversal should continue after a leaf.
#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum VisitControl {
    /// Keep visiting.
    Continue,
    /// Stop the traversal immediately.
    Stop,
}

/// Capabilities a tree traversal needs from a query.
pub trait Visitor<T, P> {
    /// Whether a node (internal or leaf) with this fat bound should be visited.
    fn overlaps(&mut self, bounds: &Aabb2D<T>) -> bool;

    /// Handle a leaf whose bound passed [`Visitor::overlaps`].
    fn visit_leaf(&mut self, proxy: ProxyId, fat_aabb: &Aabb2D<T>, payload: &P) -> VisitControl;
}

/// Reports every leaf overlapping a fixed region. The callback returns `false` to stop.
pub(crate) struct AreaVisitor<T, F> {
    region: Aabb2D<T>,
    callback: F,
}

impl<T, F> AreaVisitor<T, F> {
    pub(crate) fn new(region: Aabb2D<T>, callback: F) -> Self {
        Self { region, callback }
    }
}

impl<T, P, F> Visitor<T, P> for AreaVisitor<T, F>
where
    T: Scalar,
    F: FnMut(ProxyId, &P) -> bool,
{
    fn overlaps(&mut self, bounds: &Aabb2D<T>) -> bool {
        bounds.overlaps(&self.region)
    }

    fn visit_leaf(&mut self, proxy: ProxyId, _fat_aabb: &Aabb2D<T>, payload: &P) -> VisitControl {
        if (self.callback)(proxy, payload) {
            VisitControl::Continue
        } else {
            VisitControl::Stop
        }
    }
}

/// Walks the leaves a segment passes through, letting the callback shrink the segment.
pub(crate) struct RayVisitor<T, F> {
    input: RayCastInput<T>,
    callback: F,
}

impl<T, F> RayVisitor<T, F> {
    pub(crate) fn new(input: RayCastInput<T>, callback: F) -> Self {
        Self { input, callback }
    }
}

impl<T, P, F> Visitor<T, P> for RayVisitor<T, F>
where
    T: Scalar,
    F: FnMut(&RayCastInput<T>, ProxyId, &P) -> RayControl<T>,
{
    fn overlaps(&mut self, bounds: &Aabb2D<T>) -> bool {
        bounds.ray_cast(&self.input).is_some()
    }

    fn visit_leaf(&mut self, proxy: ProxyId, _fat_aabb: &Aabb2D<T>, payload: &P) -> VisitControl {
        match (self.callback)(&self.input, proxy, payload) {
            RayControl::Clip(fraction) => {
                if fraction <= T::zero() {
                    return VisitControl::Stop;
                }
                if fraction < self.input.max_fraction {
                    self.input.max_fraction = fraction;
                }
                VisitControl::Continue
            }
            RayControl::Ignore => VisitControl::Continue,
            RayControl::Terminate => VisitControl::Stop,
        }
    }
}
