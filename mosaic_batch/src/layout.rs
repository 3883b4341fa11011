// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Mapping logical positions to local positions.

use alloc::rc::Rc;
use core::fmt::Debug;

use kurbo::{Point, Vec2};

use crate::error::BatchError;
use crate::logical::LogicalPosition;

/// Application-provided placement for [`BatchLayout::Custom`].
pub trait CustomLayout: Debug {
    /// Local position for `logical`, or `None` to reject it.
    fn local_position(&self, logical: &LogicalPosition) -> Option<Point>;
}

/// How a batch turns a new item's logical position into its local position.
#[derive(Clone, Debug, Default)]
pub enum BatchLayout {
    /// A valid logical position `(x, y)` is used as the local position directly.
    #[default]
    None,
    /// Grid: `(x * stride.x, y * stride.y)`.
    Rectilinear,
    /// Diamond lattice: `(x * stride.x + y * stride.x, x * stride.y - y * stride.y)`.
    Isometric,
    /// Delegated to a provider; any logical position shape is allowed.
    Custom(Rc<dyn CustomLayout>),
}

impl BatchLayout {
    /// Local position for a new item at `logical`.
    ///
    /// `Ok(None)` means the item keeps the default position.
    pub fn place(
        &self,
        logical: &LogicalPosition,
        stride: Vec2,
    ) -> Result<Option<Point>, BatchError> {
        let invalid = || BatchError::InvalidLogicalPosition(*logical);
        match self {
            Self::None => {
                if logical.is_invalid() {
                    return Ok(None);
                }
                let v = logical.as_vec2().ok_or_else(invalid)?;
                Ok(Some(v.to_point()))
            }
            Self::Rectilinear => {
                let v = logical.as_vec2().ok_or_else(invalid)?;
                Ok(Some(Point::new(v.x * stride.x, v.y * stride.y)))
            }
            Self::Isometric => {
                let v = logical.as_vec2().ok_or_else(invalid)?;
                Ok(Some(Point::new(
                    v.x * stride.x + v.y * stride.x,
                    v.x * stride.y - v.y * stride.y,
                )))
            }
            Self::Custom(provider) => {
                if logical.is_invalid() {
                    return Ok(None);
                }
                provider
                    .local_position(logical)
                    .map(Some)
                    .ok_or(BatchError::CustomLayoutRejected(*logical))
            }
        }
    }
}
