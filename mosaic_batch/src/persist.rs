// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Serializable records of batch items.
//!
//! A batch writes one [`SpriteRecord`] per item into a [`SpritesNode`]. Fields still at their
//! default are omitted, so a plain item serializes to almost nothing.

use alloc::string::{String, ToString};
use alloc::vec::Vec;

use kurbo::{Point, Size, Vec2};
use serde::{Deserialize, Serialize};

use crate::intern::Interner;
use crate::item::{BatchItem, BlendFactor, Color, DataObjectId, FrameSource, ImageFrame};
use crate::logical::LogicalPosition;

/// Name of the node holding a batch's items in a scene file.
pub const SPRITES_NODE_NAME: &str = "Sprites";

/// Persisted state of one item. The angle is stored in degrees.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase", default)]
pub struct SpriteRecord {
    /// Unique name within the batch.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Logical position, space separated.
    #[serde(skip_serializing_if = "LogicalPosition::is_invalid")]
    pub logical_position: LogicalPosition,
    /// Visibility.
    #[serde(skip_serializing_if = "is_true")]
    pub visible: bool,
    /// Local position.
    #[serde(skip_serializing_if = "is_origin")]
    pub position: Point,
    /// Local angle in degrees.
    #[serde(skip_serializing_if = "is_zero")]
    pub angle: f64,
    /// Width and height.
    #[serde(skip_serializing_if = "is_unit_size")]
    pub size: Size,
    /// Render depth.
    #[serde(skip_serializing_if = "is_zero")]
    pub depth: f64,
    /// Horizontal mirroring.
    #[serde(skip_serializing_if = "is_false")]
    pub flip_x: bool,
    /// Vertical mirroring.
    #[serde(skip_serializing_if = "is_false")]
    pub flip_y: bool,
    /// Sort point offset.
    #[serde(skip_serializing_if = "is_zero_vec")]
    pub sort_point: Vec2,
    /// Render group.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub render_group: Option<String>,
    /// Blending enabled.
    #[serde(skip_serializing_if = "is_true")]
    pub blend_mode: bool,
    /// Source blend factor.
    #[serde(skip_serializing_if = "is_default_src")]
    pub src_blend_factor: BlendFactor,
    /// Destination blend factor.
    #[serde(skip_serializing_if = "is_default_dst")]
    pub dst_blend_factor: BlendFactor,
    /// Blend colour.
    #[serde(skip_serializing_if = "is_white")]
    pub blend_color: Color,
    /// Alpha test threshold.
    #[serde(skip_serializing_if = "is_disabled_alpha_test")]
    pub alpha_test: f32,
    /// Image asset id.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
    /// Image frame index.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame: Option<u32>,
    /// Image frame name; wins over `Frame`.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub named_frame: Option<String>,
    /// Animation asset id, used when no image is set.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub animation: Option<String>,
    /// Attached data object handle.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_object: Option<u64>,
    /// Application data.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_data: Option<String>,
    /// Explicit local corners.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub explicit_vertices: Option<[Point; 4]>,
}

impl Default for SpriteRecord {
    fn default() -> Self {
        Self {
            name: None,
            logical_position: LogicalPosition::INVALID,
            visible: true,
            position: Point::ORIGIN,
            angle: 0.0,
            size: Size::new(1.0, 1.0),
            depth: 0.0,
            flip_x: false,
            flip_y: false,
            sort_point: Vec2::ZERO,
            render_group: None,
            blend_mode: true,
            src_blend_factor: BlendFactor::SrcAlpha,
            dst_blend_factor: BlendFactor::OneMinusSrcAlpha,
            blend_color: Color::WHITE,
            alpha_test: -1.0,
            image: None,
            frame: None,
            named_frame: None,
            animation: None,
            data_object: None,
            user_data: None,
            explicit_vertices: None,
        }
    }
}

impl SpriteRecord {
    /// Capture `item`, resolving its symbols through `interner`.
    pub(crate) fn from_item(item: &BatchItem, interner: &Interner) -> Self {
        let resolve = |sym| interner.resolve(sym).map(ToString::to_string);
        let mut record = Self {
            name: item.name().and_then(resolve),
            logical_position: item.logical_position(),
            visible: item.visible(),
            position: item.local_position(),
            angle: item.angle().to_degrees(),
            size: item.size(),
            depth: item.depth(),
            flip_x: item.flags().contains(crate::ItemFlags::FLIP_X),
            flip_y: item.flags().contains(crate::ItemFlags::FLIP_Y),
            sort_point: item.sort_point(),
            render_group: item.render_group().and_then(resolve),
            blend_mode: item.blend_mode(),
            src_blend_factor: item.src_blend_factor(),
            dst_blend_factor: item.dst_blend_factor(),
            blend_color: item.blend_color(),
            alpha_test: item.alpha_test(),
            data_object: item.data_object().map(|d| d.0),
            user_data: item.user_data().map(ToString::to_string),
            explicit_vertices: item.explicit_vertices(),
            ..Self::default()
        };
        match item.frame() {
            FrameSource::None => {}
            FrameSource::Image { asset, frame } => {
                record.image = Some(asset.clone());
                match frame {
                    ImageFrame::Index(i) => record.frame = Some(*i),
                    ImageFrame::Named(n) => record.named_frame = Some(n.clone()),
                }
            }
            FrameSource::Animation { asset } => record.animation = Some(asset.clone()),
        }
        record
    }

    /// Apply everything but identity (name, logical position, render group) to `item`.
    pub(crate) fn apply(&self, item: &mut BatchItem) {
        item.set_visible(self.visible);
        item.set_size(self.size);
        item.set_angle(self.angle.to_radians());
        item.set_local_position(self.position);
        item.set_explicit_vertices(self.explicit_vertices);
        item.set_depth(self.depth);
        item.set_flip_x(self.flip_x);
        item.set_flip_y(self.flip_y);
        item.set_sort_point(self.sort_point);
        item.set_blend_mode(self.blend_mode);
        item.set_src_blend_factor(self.src_blend_factor);
        item.set_dst_blend_factor(self.dst_blend_factor);
        item.set_blend_color(self.blend_color);
        item.set_alpha_test(self.alpha_test);
        item.set_data_object(self.data_object.map(DataObjectId));
        item.set_user_data(self.user_data.clone());
        match (&self.image, &self.animation) {
            (Some(image), _) => match &self.named_frame {
                Some(named) => item.set_named_image_frame(image, named),
                None => item.set_image(image, self.frame.unwrap_or(0)),
            },
            (None, Some(animation)) => item.set_animation(animation),
            (None, None) => item.clear_frame(),
        }
    }
}

/// The `"Sprites"` node: every item of one batch.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpritesNode {
    /// One record per item, in batch id order.
    #[serde(rename = "Sprite", default)]
    pub sprites: Vec<SpriteRecord>,
}

fn is_true(b: &bool) -> bool {
    *b
}

fn is_false(b: &bool) -> bool {
    !*b
}

fn is_zero(v: &f64) -> bool {
    *v == 0.0
}

fn is_origin(p: &Point) -> bool {
    *p == Point::ORIGIN
}

fn is_zero_vec(v: &Vec2) -> bool {
    *v == Vec2::ZERO
}

fn is_unit_size(s: &Size) -> bool {
    *s == Size::new(1.0, 1.0)
}

fn is_default_src(b: &BlendFactor) -> bool {
    *b == BlendFactor::SrcAlpha
}

fn is_default_dst(b: &BlendFactor) -> bool {
    *b == BlendFactor::OneMinusSrcAlpha
}

fn is_white(c: &Color) -> bool {
    *c == Color::WHITE
}

fn is_disabled_alpha_test(a: &f32) -> bool {
    *a < 0.0
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_item_writes_empty_object() {
        let json = serde_json::to_string(&SpriteRecord::from_item(
            &BatchItem::default(),
            &Interner::new(),
        ))
        .unwrap();
        assert_eq!(json, "{}");
    }

    #[test]
    fn record_round_trips_through_item() {
        let mut interner = Interner::new();
        let mut item = BatchItem::default();
        item.logical_position = LogicalPosition::xy(2, 3);
        item.name = Some(interner.intern("door"));
        item.render_group = Some(interner.intern("walls"));
        item.set_local_position(Point::new(4.0, -1.0));
        item.set_angle(90_f64.to_radians());
        item.set_size(Size::new(2.0, 1.0));
        item.set_flip_x(true);
        item.set_dst_blend_factor(BlendFactor::One);
        item.set_alpha_test(0.5);
        item.set_named_image_frame("tiles", "door_open");
        item.set_user_data(Some("locked".into()));

        let record = SpriteRecord::from_item(&item, &interner);
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(json["LogicalPosition"], "2 3");
        assert_eq!(json["Name"], "door");
        assert_eq!(json["DstBlendFactor"], "ONE");
        assert_eq!(json["NamedFrame"], "door_open");
        assert!(json.get("Visible").is_none(), "defaults are omitted");

        let back: SpriteRecord = serde_json::from_value(json).unwrap();
        assert!((back.angle - 90.0).abs() < 1e-9);
        let mut copy = BatchItem::default();
        back.apply(&mut copy);
        assert_eq!(copy.local_position(), Point::new(4.0, -1.0));
        assert_eq!(copy.size(), Size::new(2.0, 1.0));
        assert!(copy.flags().contains(crate::ItemFlags::FLIP_X));
        assert_eq!(copy.dst_blend_factor(), BlendFactor::One);
        assert_eq!(copy.alpha_test(), 0.5);
        assert_eq!(
            copy.frame(),
            &FrameSource::Image {
                asset: "tiles".into(),
                frame: ImageFrame::Named("door_open".into()),
            }
        );
        assert_eq!(copy.user_data(), Some("locked"));
    }

    #[test]
    fn node_uses_sprite_element_name() {
        let node = SpritesNode {
            sprites: alloc::vec![SpriteRecord::default(), SpriteRecord::default()],
        };
        let json = serde_json::to_string(&node).unwrap();
        assert_eq!(json, r#"{"Sprite":[{},{}]}"#);
        let empty: SpritesNode = serde_json::from_str("{}").unwrap();
        assert!(empty.sprites.is_empty());
    }
}
