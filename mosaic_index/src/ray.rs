// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Ray cast input, callback control, and the slab test.

use crate::types::{Aabb2D, Scalar, max_t, min_t};

/// A segment from `(x1, y1)` toward `(x2, y2)`, clipped at `max_fraction`.
///
/// Fractions are measured along `p2 - p1`: `0` is `p1`, `1` is `p2`.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct RayCastInput<T> {
    /// Start x.
    pub x1: T,
    /// Start y.
    pub y1: T,
    /// End x.
    pub x2: T,
    /// End y.
    pub y2: T,
    /// Fraction of the segment still under consideration.
    pub max_fraction: T,
}

impl<T: Scalar> RayCastInput<T> {
    /// A full-length segment from `(x1, y1)` to `(x2, y2)`.
    pub fn new(x1: T, y1: T, x2: T, y2: T) -> Self {
        Self {
            x1,
            y1,
            x2,
            y2,
            max_fraction: T::one(),
        }
    }

    /// Point at `fraction` along the segment.
    pub fn point_at(&self, fraction: T) -> (T, T) {
        (
            self.x1 + (self.x2 - self.x1) * fraction,
            self.y1 + (self.y2 - self.y1) * fraction,
        )
    }

    /// Bounding box of the segment up to `max_fraction`.
    pub fn bounds(&self) -> Aabb2D<T> {
        let (ex, ey) = self.point_at(self.max_fraction);
        Aabb2D::new(
            min_t(self.x1, ex),
            min_t(self.y1, ey),
            max_t(self.x1, ex),
            max_t(self.y1, ey),
        )
    }
}

/// What a ray cast callback wants the traversal to do next.
#[derive(Copy, Clone, Debug, PartialEq)]
pub enum RayControl<T> {
    /// Accept the hit and clip the ray to this fraction. A fraction of zero or less terminates.
    Clip(T),
    /// Reject the hit and continue with the current fraction.
    Ignore,
    /// Stop the traversal.
    Terminate,
}

impl<T: Scalar> Aabb2D<T> {
    /// Slab test against the segment in `input`, limited to `input.max_fraction`.
    ///
    /// Returns the entry fraction, or `0` when the segment starts inside the box.
    /// A degenerate segment reports whether its start point is inside.
    pub fn ray_cast(&self, input: &RayCastInput<T>) -> Option<T> {
        let mut t_min = T::zero();
        let mut t_max = input.max_fraction;
        let axes = [
            (input.x1, input.x2 - input.x1, self.min_x, self.max_x),
            (input.y1, input.y2 - input.y1, self.min_y, self.max_y),
        ];
        for (origin, delta, lo, hi) in axes {
            if delta == T::zero() {
                if origin < lo || hi < origin {
                    return None;
                }
                continue;
            }
            let mut t1 = (lo - origin) / delta;
            let mut t2 = (hi - origin) / delta;
            if t2 < t1 {
                core::mem::swap(&mut t1, &mut t2);
            }
            t_min = max_t(t_min, t1);
            t_max = min_t(t_max, t2);
            if t_max < t_min {
                return None;
            }
        }
        Some(t_min)
    }
}
