// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Render requests, the queue they are written into, and the rasterizer seam.

use alloc::string::ToString;
use alloc::vec::Vec;
use core::cmp::Ordering;
use core::fmt;
use core::str::FromStr;

use kurbo::{Point, Rect, Vec2};

use crate::error::BatchError;
use crate::intern::Symbol;
use crate::item::{BlendFactor, Color, FrameSource};
use crate::pool::ItemKey;

/// Identity of the object a request was emitted for (usually the owning scene object).
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct RenderTargetId(pub u64);

/// How a render queue orders its requests before drawing.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub enum RenderSort {
    /// Submission order.
    #[default]
    Off,
    /// Ascending serial id: newer items draw on top.
    Newest,
    /// Descending serial id: older items draw on top.
    Oldest,
    /// Ascending serial id, grouping a batch's requests together.
    Batch,
    /// By render group, then serial id.
    Group,
    /// Ascending world x of the sort point.
    XAxis,
    /// Ascending world y of the sort point.
    YAxis,
    /// Descending depth.
    ZAxis,
    /// Descending world x of the sort point.
    InverseXAxis,
    /// Descending world y of the sort point.
    InverseYAxis,
    /// Ascending depth.
    InverseZAxis,
}

impl RenderSort {
    /// Every mode, in declaration order.
    pub const ALL: [Self; 11] = [
        Self::Off,
        Self::Newest,
        Self::Oldest,
        Self::Batch,
        Self::Group,
        Self::XAxis,
        Self::YAxis,
        Self::ZAxis,
        Self::InverseXAxis,
        Self::InverseYAxis,
        Self::InverseZAxis,
    ];

    /// Short text label, as used in scene files.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Off => "Off",
            Self::Newest => "New",
            Self::Oldest => "Old",
            Self::Batch => "Batch",
            Self::Group => "Group",
            Self::XAxis => "X",
            Self::YAxis => "Y",
            Self::ZAxis => "Z",
            Self::InverseXAxis => "-X",
            Self::InverseYAxis => "-Y",
            Self::InverseZAxis => "-Z",
        }
    }
}

impl fmt::Display for RenderSort {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for RenderSort {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|m| m.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| BatchError::ParseSortMode(s.to_string()))
    }
}

#[cfg(feature = "serde")]
crate::serde_via_str!(RenderSort);

/// One draw, populated by an item during render preparation.
#[derive(Clone, Debug, PartialEq)]
pub struct RenderRequest {
    /// Who emitted the request.
    pub owner: RenderTargetId,
    /// Back-reference to the source item, valid for the current render pass.
    pub custom: Option<ItemKey>,
    /// Batch transform version the item data was computed against.
    pub transform_version: u64,
    /// Centre of the item's world bounds.
    pub world_position: Point,
    /// Render depth.
    pub depth: f64,
    /// Offset from `world_position` used by axis sorting.
    pub sort_point: Vec2,
    /// Batch id of the source item.
    pub serial_id: u32,
    /// Render group of the source item.
    pub render_group: Option<Symbol>,
    /// Blending enabled.
    pub blend_mode: bool,
    /// Source blend factor.
    pub src_factor: BlendFactor,
    /// Destination blend factor.
    pub dst_factor: BlendFactor,
    /// Blend colour.
    pub blend_color: Color,
    /// Alpha test threshold; negative disables it.
    pub alpha_test: f32,
}

impl Default for RenderRequest {
    fn default() -> Self {
        Self {
            owner: RenderTargetId::default(),
            custom: None,
            transform_version: 0,
            world_position: Point::ORIGIN,
            depth: 0.0,
            sort_point: Vec2::ZERO,
            serial_id: 0,
            render_group: None,
            blend_mode: true,
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            blend_color: Color::WHITE,
            alpha_test: -1.0,
        }
    }
}

impl RenderRequest {
    fn sort_x(&self) -> f64 {
        self.world_position.x + self.sort_point.x
    }

    fn sort_y(&self) -> f64 {
        self.world_position.y + self.sort_point.y
    }
}

/// A sink for render requests.
pub trait RenderQueue {
    /// Set how the queue will order its requests.
    fn set_sort_mode(&mut self, mode: RenderSort);

    /// Append a fresh request and return it for populating.
    fn create_request(&mut self) -> &mut RenderRequest;
}

/// A render queue backed by a `Vec`.
#[derive(Clone, Debug, Default)]
pub struct VecRenderQueue {
    requests: Vec<RenderRequest>,
    sort_mode: RenderSort,
}

impl VecRenderQueue {
    /// Create an empty queue sorting by [`RenderSort::Newest`].
    pub fn new() -> Self {
        Self {
            requests: Vec::new(),
            sort_mode: RenderSort::Newest,
        }
    }

    /// Requests in their current order.
    pub fn requests(&self) -> &[RenderRequest] {
        &self.requests
    }

    /// Number of requests.
    pub fn len(&self) -> usize {
        self.requests.len()
    }

    /// Whether the queue is empty.
    pub fn is_empty(&self) -> bool {
        self.requests.is_empty()
    }

    /// Current sort mode.
    pub fn sort_mode(&self) -> RenderSort {
        self.sort_mode
    }

    /// Drop every request, keeping the sort mode.
    pub fn clear(&mut self) {
        self.requests.clear();
    }

    /// Order the requests by the current sort mode. Ties fall back to serial id.
    pub fn sort(&mut self) {
        let primary: fn(&RenderRequest, &RenderRequest) -> Ordering = match self.sort_mode {
            RenderSort::Off => return,
            RenderSort::Newest | RenderSort::Batch => |_, _| Ordering::Equal,
            RenderSort::Oldest => |a, b| b.serial_id.cmp(&a.serial_id),
            RenderSort::Group => |a, b| a.render_group.cmp(&b.render_group),
            RenderSort::XAxis => |a, b| a.sort_x().total_cmp(&b.sort_x()),
            RenderSort::YAxis => |a, b| a.sort_y().total_cmp(&b.sort_y()),
            RenderSort::ZAxis => |a, b| b.depth.total_cmp(&a.depth),
            RenderSort::InverseXAxis => |a, b| b.sort_x().total_cmp(&a.sort_x()),
            RenderSort::InverseYAxis => |a, b| b.sort_y().total_cmp(&a.sort_y()),
            RenderSort::InverseZAxis => |a, b| a.depth.total_cmp(&b.depth),
        };
        self.requests.sort_by(|a, b| primary(a, b).then(a.serial_id.cmp(&b.serial_id)));
    }
}

impl RenderQueue for VecRenderQueue {
    fn set_sort_mode(&mut self, mode: RenderSort) {
        self.sort_mode = mode;
    }

    fn create_request(&mut self) -> &mut RenderRequest {
        let i = self.requests.len();
        self.requests.push(RenderRequest::default());
        &mut self.requests[i]
    }
}

/// Per-frame view information handed to render preparation.
#[derive(Copy, Clone, Debug, PartialEq)]
pub struct ViewState {
    /// Visible region in world space.
    pub render_aabb: Rect,
}

impl ViewState {
    /// View of `render_aabb`.
    pub const fn new(render_aabb: Rect) -> Self {
        Self { render_aabb }
    }
}

/// One textured quad handed to the rasterizer.
#[derive(Clone, Debug, PartialEq)]
pub struct QuadSubmission<'a> {
    /// World-space corners in winding order.
    pub corners: [Point; 4],
    /// Mirror horizontally.
    pub flip_x: bool,
    /// Mirror vertically.
    pub flip_y: bool,
    /// Image or animation to sample.
    pub frame: &'a FrameSource,
    /// Blending enabled.
    pub blend_mode: bool,
    /// Source blend factor.
    pub src_factor: BlendFactor,
    /// Destination blend factor.
    pub dst_factor: BlendFactor,
    /// Blend colour.
    pub blend_color: Color,
    /// Alpha test threshold; negative disables it.
    pub alpha_test: f32,
}

/// The downstream rasterizer.
pub trait BatchRenderer {
    /// Draw one quad.
    fn submit_quad(&mut self, quad: &QuadSubmission<'_>);
}
