// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Batch configuration.

use kurbo::{Size, Vec2};
use mosaic_index::TreeConfig;

use crate::layout::BatchLayout;
use crate::render::RenderSort;

/// Defaults and policy for a [`SpriteBatch`](crate::SpriteBatch).
///
/// With the `serde` feature this can be loaded from a config file; missing fields take their
/// defaults and a custom layout is never serialized.
#[derive(Clone, Debug)]
#[cfg_attr(
    feature = "serde",
    derive(serde::Serialize, serde::Deserialize),
    serde(default)
)]
pub struct BatchConfig {
    /// Spacing used by grid layouts.
    pub default_stride: Vec2,
    /// Size given to new items.
    pub default_size: Size,
    /// Angle in radians given to new items.
    pub default_angle: f64,
    /// Order the render queue should apply.
    pub sort_mode: RenderSort,
    /// Whether the spatial index is maintained.
    pub culling: bool,
    /// Logical-to-local placement.
    #[cfg_attr(feature = "serde", serde(skip))]
    pub layout: BatchLayout,
    /// Margin added around every indexed AABB.
    pub aabb_margin: f64,
    /// How far ahead a moved AABB is extended along its displacement.
    pub displacement_multiplier: f64,
}

impl Default for BatchConfig {
    fn default() -> Self {
        let tree = TreeConfig::<f64>::default();
        Self {
            default_stride: Vec2::new(1.0, 1.0),
            default_size: Size::new(1.0, 1.0),
            default_angle: 0.0,
            sort_mode: RenderSort::Off,
            culling: true,
            layout: BatchLayout::None,
            aabb_margin: tree.aabb_margin,
            displacement_multiplier: tree.displacement_multiplier,
        }
    }
}

impl BatchConfig {
    /// Spatial index tuning derived from this config.
    pub fn tree_config(&self) -> TreeConfig<f64> {
        TreeConfig {
            aabb_margin: self.aabb_margin,
            displacement_multiplier: self.displacement_multiplier,
        }
    }
}

#[cfg(all(test, feature = "serde"))]
mod tests {
    use super::*;

    #[test]
    fn partial_json_takes_defaults() {
        let config: BatchConfig = serde_json::from_str(
            r#"{ "default_size": { "width": 2.0, "height": 4.0 }, "sort_mode": "-Y", "culling": false }"#,
        )
        .unwrap();
        assert_eq!(config.default_size, Size::new(2.0, 4.0));
        assert_eq!(config.sort_mode, RenderSort::InverseYAxis);
        assert!(!config.culling);
        assert_eq!(config.default_stride, Vec2::new(1.0, 1.0));
        assert_eq!(config.tree_config(), TreeConfig::default());
    }

    #[test]
    fn sort_mode_serializes_as_label() {
        let json = serde_json::to_value(BatchConfig::default()).unwrap();
        assert_eq!(json["sort_mode"], "Off");
        assert!(json.get("layout").is_none());
    }
}
