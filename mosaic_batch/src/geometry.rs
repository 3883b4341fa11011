// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Oriented boxes and conversions between Kurbo rectangles and index AABBs.

use kurbo::{Affine, Point, Rect, Vec2};
use mosaic_index::{Aabb2D, RayCastInput};

/// An oriented bounding box: four corners in winding order.
///
/// Item boxes are parallelograms (a rectangle under a rigid or affine transform) or, in
/// explicit-vertex mode, an arbitrary convex quad. Either winding direction is accepted.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct Oobb {
    /// Corners in winding order.
    pub corners: [Point; 4],
}

impl Oobb {
    /// The four corners of an axis-aligned rectangle.
    pub fn from_rect(rect: Rect) -> Self {
        Self {
            corners: [
                Point::new(rect.x0, rect.y0),
                Point::new(rect.x1, rect.y0),
                Point::new(rect.x1, rect.y1),
                Point::new(rect.x0, rect.y1),
            ],
        }
    }

    /// This box with every corner mapped through `affine`.
    pub fn transformed(&self, affine: Affine) -> Self {
        Self {
            corners: self.corners.map(|p| affine * p),
        }
    }

    /// Axis-aligned bound of the corners.
    pub fn bounding_rect(&self) -> Rect {
        let [p0, p1, p2, p3] = self.corners;
        let min_x = p0.x.min(p1.x).min(p2.x).min(p3.x);
        let min_y = p0.y.min(p1.y).min(p2.y).min(p3.y);
        let max_x = p0.x.max(p1.x).max(p2.x).max(p3.x);
        let max_y = p0.y.max(p1.y).max(p2.y).max(p3.y);
        Rect::new(min_x, min_y, max_x, max_y)
    }

    /// Whether `p` is inside or on the boundary.
    ///
    /// A zero-area box (a zero-size item) contains only the points of its segment.
    pub fn contains_point(&self, p: Point) -> bool {
        if let Some((a, b)) = self.degenerate_segment() {
            return segment_contains(a, b, p);
        }
        let mut pos = false;
        let mut neg = false;
        for (a, b) in self.edges() {
            let c = (b - a).cross(p - a);
            pos |= c > 0.0;
            neg |= c < 0.0;
            if pos && neg {
                return false;
            }
        }
        true
    }

    /// Separating-axis overlap test. Touching counts as overlap.
    pub fn overlaps(&self, other: &Self) -> bool {
        !self.has_separating_axis(other) && !other.has_separating_axis(self)
    }

    /// Clip the segment `p1 → p2` (up to `max_fraction`) against the box and return the
    /// entry fraction, `0` if `p1` is inside.
    pub fn ray_cast(&self, p1: Point, p2: Point, max_fraction: f64) -> Option<f64> {
        if let Some((a, b)) = self.degenerate_segment() {
            return segment_ray_fraction(a, b, p1, p2, max_fraction);
        }
        let d = p2 - p1;
        let winding = self.signed_area2();
        let mut lower = 0.0;
        let mut upper = max_fraction;
        for (a, b) in self.edges() {
            let e = b - a;
            // Outward normal for this winding.
            let n = if winding >= 0.0 {
                Vec2::new(e.y, -e.x)
            } else {
                Vec2::new(-e.y, e.x)
            };
            let numerator = n.dot(a - p1);
            let denominator = n.dot(d);
            if denominator == 0.0 {
                if numerator < 0.0 {
                    return None;
                }
            } else if denominator < 0.0 {
                lower = f64::max(lower, numerator / denominator);
            } else {
                upper = f64::min(upper, numerator / denominator);
            }
            if upper < lower {
                return None;
            }
        }
        Some(lower)
    }

    /// The two farthest corners, if the box has no area.
    fn degenerate_segment(&self) -> Option<(Point, Point)> {
        let bounds = self.bounding_rect();
        let scale = bounds.width().max(bounds.height());
        if self.signed_area2().abs() > AREA_EPSILON * scale * scale {
            return None;
        }
        let c = self.corners;
        let mut best = (c[0], c[0]);
        let mut best_len = 0.0;
        for i in 0..4 {
            for j in i + 1..4 {
                let len = (c[j] - c[i]).hypot2();
                if len > best_len {
                    best = (c[i], c[j]);
                    best_len = len;
                }
            }
        }
        Some(best)
    }

    fn edges(&self) -> impl Iterator<Item = (Point, Point)> + '_ {
        (0..4).map(|i| (self.corners[i], self.corners[(i + 1) % 4]))
    }

    /// Twice the signed area; positive for counter-clockwise in a y-up frame.
    fn signed_area2(&self) -> f64 {
        self.edges().map(|(a, b)| a.to_vec2().cross(b.to_vec2())).sum()
    }

    /// Candidate separating axes: the edge normals, or for a zero-area box its segment's
    /// normal and direction plus both coordinate axes.
    fn axes(&self) -> [Vec2; 4] {
        match self.degenerate_segment() {
            Some((a, b)) => {
                let e = b - a;
                [Vec2::new(-e.y, e.x), e, Vec2::new(1.0, 0.0), Vec2::new(0.0, 1.0)]
            }
            None => {
                let c = self.corners;
                core::array::from_fn(|i| {
                    let e = c[(i + 1) % 4] - c[i];
                    Vec2::new(-e.y, e.x)
                })
            }
        }
    }

    fn has_separating_axis(&self, other: &Self) -> bool {
        self.axes().into_iter().any(|axis| {
            let (min_a, max_a) = project(&self.corners, axis);
            let (min_b, max_b) = project(&other.corners, axis);
            max_a < min_b || max_b < min_a
        })
    }
}

fn project(corners: &[Point; 4], axis: Vec2) -> (f64, f64) {
    corners.iter().fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| {
        let d = p.to_vec2().dot(axis);
        (lo.min(d), hi.max(d))
    })
}

/// Relative tolerance below which a quad's area counts as zero.
const AREA_EPSILON: f64 = 1e-12;

/// Absolute distance tolerance for points on a degenerate box.
const DISTANCE_EPSILON: f64 = 1e-9;

/// Whether `p` lies on the segment `a → b` (a single point when `a == b`).
fn segment_contains(a: Point, b: Point, p: Point) -> bool {
    let e = b - a;
    let len2 = e.hypot2();
    if len2 == 0.0 {
        return (p - a).hypot() <= DISTANCE_EPSILON;
    }
    let t = (p - a).dot(e) / len2;
    (0.0..=1.0).contains(&t) && e.cross(p - a).abs() / len2.sqrt() <= DISTANCE_EPSILON
}

/// First fraction along `p1 → p2` (up to `max_fraction`) at which it touches the segment
/// `a → b`.
fn segment_ray_fraction(
    a: Point,
    b: Point,
    p1: Point,
    p2: Point,
    max_fraction: f64,
) -> Option<f64> {
    let d = p2 - p1;
    let e = b - a;
    let w = a - p1;
    let d_len2 = d.hypot2();
    if d_len2 == 0.0 {
        return segment_contains(a, b, p1).then_some(0.0);
    }
    let denom = d.cross(e);
    if denom.abs() > AREA_EPSILON * d_len2.sqrt() * e.hypot() {
        let t = w.cross(e) / denom;
        let s = w.cross(d) / denom;
        return ((0.0..=max_fraction).contains(&t) && (0.0..=1.0).contains(&s)).then_some(t);
    }
    // Parallel: only a collinear segment can be touched.
    if w.cross(d).abs() / d_len2.sqrt() > DISTANCE_EPSILON {
        return None;
    }
    let ta = w.dot(d) / d_len2;
    let tb = (b - p1).dot(d) / d_len2;
    let lo = ta.min(tb).max(0.0);
    let hi = ta.max(tb).min(max_fraction);
    (lo <= hi).then_some(lo)
}

/// Transform an axis-aligned `Rect` by an `Affine` and return a conservative
/// axis-aligned bounding box.
pub(crate) fn transform_rect_bbox(affine: Affine, rect: Rect) -> Rect {
    Oobb::from_rect(rect).transformed(affine).bounding_rect()
}

pub(crate) fn rect_to_aabb(r: Rect) -> Aabb2D<f64> {
    Aabb2D::new(r.x0, r.y0, r.x1, r.y1)
}

/// Entry fraction of the segment `p1 → p2` into `rect`, `0` if `p1` is inside.
pub(crate) fn rect_ray_fraction(rect: Rect, p1: Point, p2: Point) -> Option<f64> {
    rect_to_aabb(rect).ray_cast(&RayCastInput::new(p1.x, p1.y, p2.x, p2.y))
}
