// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batch items: one positioned, sized, rotated quad with its visual state.

use alloc::string::{String, ToString};
use core::fmt;
use core::str::FromStr;

use bitflags::bitflags;
use kurbo::{Affine, Point, Rect, Size, Vec2};
use mosaic_index::ProxyId;

use crate::error::BatchError;
use crate::geometry::Oobb;
use crate::intern::Symbol;
use crate::logical::LogicalPosition;
use crate::render::{BatchRenderer, QuadSubmission, RenderRequest};

bitflags! {
    /// Boolean item state.
    #[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
    pub struct ItemFlags: u8 {
        /// Item produces render requests.
        const VISIBLE  = 0b0000_0001;
        /// Mirror horizontally.
        const FLIP_X   = 0b0000_0010;
        /// Mirror vertically.
        const FLIP_Y   = 0b0000_0100;
        /// Blending enabled.
        const BLEND    = 0b0000_1000;
        /// Geometry comes from explicit vertices rather than size.
        const EXPLICIT = 0b0001_0000;
    }
}

impl Default for ItemFlags {
    fn default() -> Self {
        Self::VISIBLE | Self::BLEND
    }
}

/// Blend equation factor.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(rename_all = "SCREAMING_SNAKE_CASE")
)]
pub enum BlendFactor {
    /// `0`
    Zero,
    /// `1`
    One,
    /// Source colour.
    SrcColor,
    /// `1 - source colour`
    OneMinusSrcColor,
    /// Source alpha.
    #[default]
    SrcAlpha,
    /// `1 - source alpha`
    OneMinusSrcAlpha,
    /// Destination alpha.
    DstAlpha,
    /// `1 - destination alpha`
    OneMinusDstAlpha,
    /// Destination colour.
    DstColor,
    /// `1 - destination colour`
    OneMinusDstColor,
    /// `min(source alpha, 1 - destination alpha)`
    SrcAlphaSaturate,
}

impl BlendFactor {
    const ALL: [Self; 11] = [
        Self::Zero,
        Self::One,
        Self::SrcColor,
        Self::OneMinusSrcColor,
        Self::SrcAlpha,
        Self::OneMinusSrcAlpha,
        Self::DstAlpha,
        Self::OneMinusDstAlpha,
        Self::DstColor,
        Self::OneMinusDstColor,
        Self::SrcAlphaSaturate,
    ];

    /// Text label, e.g. `ONE_MINUS_SRC_ALPHA`.
    pub const fn label(self) -> &'static str {
        match self {
            Self::Zero => "ZERO",
            Self::One => "ONE",
            Self::SrcColor => "SRC_COLOR",
            Self::OneMinusSrcColor => "ONE_MINUS_SRC_COLOR",
            Self::SrcAlpha => "SRC_ALPHA",
            Self::OneMinusSrcAlpha => "ONE_MINUS_SRC_ALPHA",
            Self::DstAlpha => "DST_ALPHA",
            Self::OneMinusDstAlpha => "ONE_MINUS_DST_ALPHA",
            Self::DstColor => "DST_COLOR",
            Self::OneMinusDstColor => "ONE_MINUS_DST_COLOR",
            Self::SrcAlphaSaturate => "SRC_ALPHA_SATURATE",
        }
    }
}

impl fmt::Display for BlendFactor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

impl FromStr for BlendFactor {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let s = s.trim();
        Self::ALL
            .into_iter()
            .find(|b| b.label().eq_ignore_ascii_case(s))
            .ok_or_else(|| BatchError::ParseBlendFactor(s.to_string()))
    }
}

/// Linear RGBA colour.
#[derive(Copy, Clone, Debug, PartialEq)]
#[cfg_attr(feature = "serde", derive(serde::Serialize, serde::Deserialize))]
pub struct Color {
    /// Red.
    pub r: f32,
    /// Green.
    pub g: f32,
    /// Blue.
    pub b: f32,
    /// Alpha.
    pub a: f32,
}

impl Color {
    /// Opaque white.
    pub const WHITE: Self = Self::new(1.0, 1.0, 1.0, 1.0);

    /// Colour from components.
    pub const fn new(r: f32, g: f32, b: f32, a: f32) -> Self {
        Self { r, g, b, a }
    }
}

impl Default for Color {
    fn default() -> Self {
        Self::WHITE
    }
}

/// Frame selector within an image asset.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum ImageFrame {
    /// Frame by index.
    Index(u32),
    /// Frame by name.
    Named(String),
}

/// What an item draws.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub enum FrameSource {
    /// Nothing assigned; the item still renders (as an untextured quad).
    #[default]
    None,
    /// A static image frame.
    Image {
        /// Asset id.
        asset: String,
        /// Frame within the asset.
        frame: ImageFrame,
    },
    /// An animation asset.
    Animation {
        /// Asset id.
        asset: String,
    },
}

/// Handle of an opaque object attached to an item by the application.
#[derive(Copy, Clone, Debug, PartialEq, Eq, Hash)]
pub struct DataObjectId(pub u64);

/// World-space data derived from local geometry and the batch transform.
#[derive(Clone, Debug)]
struct RenderCache {
    version: u64,
    stale: bool,
    oobb: Oobb,
    aabb: Rect,
    position: Point,
}

/// One drawable quad owned by a [`SpriteBatch`](crate::SpriteBatch).
///
/// Geometry (position, angle, size, explicit vertices) is changed through the batch so the
/// spatial index stays in sync. Visual state can be changed directly.
#[derive(Clone)]
pub struct BatchItem {
    pub(crate) batch_id: u32,
    pub(crate) proxy: ProxyId,
    pub(crate) logical_position: LogicalPosition,
    pub(crate) name: Option<Symbol>,
    pub(crate) render_group: Option<Symbol>,
    flags: ItemFlags,
    local_position: Point,
    angle: f64,
    size: Size,
    depth: f64,
    sort_point: Vec2,
    src_factor: BlendFactor,
    dst_factor: BlendFactor,
    blend_color: Color,
    alpha_test: f32,
    frame: FrameSource,
    data_object: Option<DataObjectId>,
    user_data: Option<String>,
    explicit_vertices: [Point; 4],
    local_oobb: Oobb,
    local_aabb: Rect,
    render: RenderCache,
}

impl Default for BatchItem {
    fn default() -> Self {
        let unit = Oobb::from_rect(Rect::new(-0.5, -0.5, 0.5, 0.5));
        Self {
            batch_id: 0,
            proxy: ProxyId::INVALID,
            logical_position: LogicalPosition::INVALID,
            name: None,
            render_group: None,
            flags: ItemFlags::default(),
            local_position: Point::ORIGIN,
            angle: 0.0,
            size: Size::new(1.0, 1.0),
            depth: 0.0,
            sort_point: Vec2::ZERO,
            src_factor: BlendFactor::SrcAlpha,
            dst_factor: BlendFactor::OneMinusSrcAlpha,
            blend_color: Color::WHITE,
            alpha_test: -1.0,
            frame: FrameSource::None,
            data_object: None,
            user_data: None,
            explicit_vertices: unit.corners,
            local_oobb: unit,
            local_aabb: unit.bounding_rect(),
            render: RenderCache {
                version: 0,
                stale: true,
                oobb: unit,
                aabb: unit.bounding_rect(),
                position: Point::ORIGIN,
            },
        }
    }
}

impl fmt::Debug for BatchItem {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("BatchItem")
            .field("batch_id", &self.batch_id)
            .field("logical_position", &self.logical_position)
            .field("local_position", &self.local_position)
            .field("angle", &self.angle)
            .field("size", &self.size)
            .field("flags", &self.flags)
            .finish_non_exhaustive()
    }
}

impl BatchItem {
    /// Return to the freshly constructed state.
    pub(crate) fn reset(&mut self) {
        *self = Self::default();
    }

    /// Unique id within the owning batch; `0` when not attached.
    pub fn batch_id(&self) -> u32 {
        self.batch_id
    }

    /// Spatial index handle, [`ProxyId::INVALID`] when not indexed.
    pub fn proxy(&self) -> ProxyId {
        self.proxy
    }

    /// Logical position, invalid when unset.
    pub fn logical_position(&self) -> LogicalPosition {
        self.logical_position
    }

    /// Interned name, if any.
    ///
    /// Resolve it with [`SpriteBatch::resolve`](crate::SpriteBatch::resolve).
    pub fn name(&self) -> Option<Symbol> {
        self.name
    }

    /// Interned render group, if any.
    pub fn render_group(&self) -> Option<Symbol> {
        self.render_group
    }

    /// All boolean state.
    pub fn flags(&self) -> ItemFlags {
        self.flags
    }

    /// Whether the item produces render requests.
    pub fn visible(&self) -> bool {
        self.flags.contains(ItemFlags::VISIBLE)
    }

    /// Position in batch-local space.
    pub fn local_position(&self) -> Point {
        self.local_position
    }

    /// Rotation in radians.
    pub fn angle(&self) -> f64 {
        self.angle
    }

    /// Width and height.
    pub fn size(&self) -> Size {
        self.size
    }

    /// Render depth.
    pub fn depth(&self) -> f64 {
        self.depth
    }

    /// Offset used by axis sorting.
    pub fn sort_point(&self) -> Vec2 {
        self.sort_point
    }

    /// Whether blending is enabled.
    pub fn blend_mode(&self) -> bool {
        self.flags.contains(ItemFlags::BLEND)
    }

    /// Source blend factor.
    pub fn src_blend_factor(&self) -> BlendFactor {
        self.src_factor
    }

    /// Destination blend factor.
    pub fn dst_blend_factor(&self) -> BlendFactor {
        self.dst_factor
    }

    /// Blend colour.
    pub fn blend_color(&self) -> Color {
        self.blend_color
    }

    /// Alpha test threshold; negative when disabled.
    pub fn alpha_test(&self) -> f32 {
        self.alpha_test
    }

    /// Assigned image or animation.
    pub fn frame(&self) -> &FrameSource {
        &self.frame
    }

    /// Attached data object.
    pub fn data_object(&self) -> Option<DataObjectId> {
        self.data_object
    }

    /// Arbitrary application data.
    pub fn user_data(&self) -> Option<&str> {
        self.user_data.as_deref()
    }

    /// Explicit corners, when in explicit-vertex mode.
    pub fn explicit_vertices(&self) -> Option<[Point; 4]> {
        self.flags
            .contains(ItemFlags::EXPLICIT)
            .then_some(self.explicit_vertices)
    }

    /// Oriented box in batch-local space.
    pub fn local_oobb(&self) -> &Oobb {
        &self.local_oobb
    }

    /// Axis-aligned bound of [`local_oobb`](Self::local_oobb).
    pub fn local_aabb(&self) -> Rect {
        self.local_aabb
    }

    /// Show or hide.
    pub fn set_visible(&mut self, visible: bool) {
        self.flags.set(ItemFlags::VISIBLE, visible);
    }

    /// Horizontal mirroring.
    pub fn set_flip_x(&mut self, flip: bool) {
        self.flags.set(ItemFlags::FLIP_X, flip);
    }

    /// Vertical mirroring.
    pub fn set_flip_y(&mut self, flip: bool) {
        self.flags.set(ItemFlags::FLIP_Y, flip);
    }

    /// Render depth.
    pub fn set_depth(&mut self, depth: f64) {
        self.depth = depth;
    }

    /// Offset used by axis sorting.
    pub fn set_sort_point(&mut self, sort_point: Vec2) {
        self.sort_point = sort_point;
    }

    /// Enable or disable blending.
    pub fn set_blend_mode(&mut self, blend: bool) {
        self.flags.set(ItemFlags::BLEND, blend);
    }

    /// Source blend factor.
    pub fn set_src_blend_factor(&mut self, factor: BlendFactor) {
        self.src_factor = factor;
    }

    /// Destination blend factor.
    pub fn set_dst_blend_factor(&mut self, factor: BlendFactor) {
        self.dst_factor = factor;
    }

    /// Blend colour.
    pub fn set_blend_color(&mut self, color: Color) {
        self.blend_color = color;
    }

    /// Alpha channel of the blend colour.
    pub fn set_blend_alpha(&mut self, alpha: f32) {
        self.blend_color.a = alpha;
    }

    /// Alpha test threshold; negative disables it.
    pub fn set_alpha_test(&mut self, threshold: f32) {
        self.alpha_test = threshold;
    }

    /// Turn the alpha test off.
    pub fn disable_alpha_test(&mut self) {
        self.alpha_test = -1.0;
    }

    /// Draw frame `frame` of image `asset`.
    pub fn set_image(&mut self, asset: &str, frame: u32) {
        self.frame = FrameSource::Image {
            asset: asset.to_string(),
            frame: ImageFrame::Index(frame),
        };
    }

    /// Draw the named frame of image `asset`.
    pub fn set_named_image_frame(&mut self, asset: &str, frame: &str) {
        self.frame = FrameSource::Image {
            asset: asset.to_string(),
            frame: ImageFrame::Named(frame.to_string()),
        };
    }

    /// Play animation `asset`.
    pub fn set_animation(&mut self, asset: &str) {
        self.frame = FrameSource::Animation {
            asset: asset.to_string(),
        };
    }

    /// Remove the image or animation.
    pub fn clear_frame(&mut self) {
        self.frame = FrameSource::None;
    }

    /// Attach or detach a data object.
    pub fn set_data_object(&mut self, object: Option<DataObjectId>) {
        self.data_object = object;
    }

    /// Attach or detach application data.
    pub fn set_user_data(&mut self, data: Option<String>) {
        self.user_data = data;
    }

    pub(crate) fn set_local_position(&mut self, position: Point) {
        self.local_position = position;
        self.update_local_geometry();
    }

    pub(crate) fn set_angle(&mut self, radians: f64) {
        self.angle = radians;
        self.update_local_geometry();
    }

    pub(crate) fn set_size(&mut self, size: Size) {
        self.size = size;
        self.update_local_geometry();
    }

    pub(crate) fn set_explicit_vertices(&mut self, vertices: Option<[Point; 4]>) {
        match vertices {
            Some(v) => {
                self.explicit_vertices = v;
                self.flags.insert(ItemFlags::EXPLICIT);
            }
            None => self.flags.remove(ItemFlags::EXPLICIT),
        }
        self.update_local_geometry();
    }

    /// Copy every attribute except identity (id, proxy, logical position, name, group).
    pub(crate) fn copy_state_from(&mut self, other: &Self) {
        self.flags = other.flags;
        self.local_position = other.local_position;
        self.angle = other.angle;
        self.size = other.size;
        self.depth = other.depth;
        self.sort_point = other.sort_point;
        self.src_factor = other.src_factor;
        self.dst_factor = other.dst_factor;
        self.blend_color = other.blend_color;
        self.alpha_test = other.alpha_test;
        self.frame = other.frame.clone();
        self.data_object = other.data_object;
        self.user_data = other.user_data.clone();
        self.explicit_vertices = other.explicit_vertices;
        self.update_local_geometry();
    }

    fn local_transform(&self) -> Affine {
        Affine::translate(self.local_position.to_vec2()) * Affine::rotate(self.angle)
    }

    fn update_local_geometry(&mut self) {
        let quad = if self.flags.contains(ItemFlags::EXPLICIT) {
            Oobb {
                corners: self.explicit_vertices,
            }
        } else {
            Oobb::from_rect(Rect::from_center_size(Point::ORIGIN, self.size))
        };
        self.local_oobb = quad.transformed(self.local_transform());
        self.local_aabb = self.local_oobb.bounding_rect();
        self.render.stale = true;
    }

    fn refresh_render_cache(&mut self, batch_transform: Affine, version: u64) {
        if !self.render.stale && self.render.version == version {
            return;
        }
        self.render.oobb = self.local_oobb.transformed(batch_transform);
        self.render.aabb = self.render.oobb.bounding_rect();
        self.render.position = self.render.aabb.center();
        self.render.version = version;
        self.render.stale = false;
    }

    /// World-space oriented box as of the last render preparation.
    pub fn world_oobb(&self) -> &Oobb {
        &self.render.oobb
    }

    /// World-space bounds as of the last render preparation.
    pub fn world_aabb(&self) -> Rect {
        self.render.aabb
    }

    /// Fill `request` with this item's draw state, refreshing world geometry if the local
    /// geometry changed or `version` differs from the cached one.
    pub fn prepare_render(
        &mut self,
        request: &mut RenderRequest,
        batch_transform: Affine,
        version: u64,
    ) {
        self.refresh_render_cache(batch_transform, version);
        request.transform_version = version;
        request.world_position = self.render.position;
        request.depth = self.depth;
        request.sort_point = self.sort_point;
        request.serial_id = self.batch_id;
        request.render_group = self.render_group;
        request.blend_mode = self.blend_mode();
        request.src_factor = self.src_factor;
        request.dst_factor = self.dst_factor;
        request.blend_color = self.blend_color;
        request.alpha_test = self.alpha_test;
    }

    /// Submit the item's quad using the blend state captured in `request`.
    pub fn render<R: BatchRenderer + ?Sized>(
        &mut self,
        renderer: &mut R,
        request: &RenderRequest,
        batch_transform: Affine,
    ) {
        self.refresh_render_cache(batch_transform, request.transform_version);
        renderer.submit_quad(&QuadSubmission {
            corners: self.render.oobb.corners,
            flip_x: self.flags.contains(ItemFlags::FLIP_X),
            flip_y: self.flags.contains(ItemFlags::FLIP_Y),
            frame: &self.frame,
            blend_mode: request.blend_mode,
            src_factor: request.src_factor,
            dst_factor: request.dst_factor,
            blend_color: request.blend_color,
            alpha_test: request.alpha_test,
        });
    }
}
