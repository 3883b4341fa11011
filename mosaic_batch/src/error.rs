// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Recoverable batch errors.

use alloc::string::String;

use crate::logical::LogicalPosition;

/// Why a batch operation was rejected.
///
/// None of these are fatal. The plain (non-`try_`) methods on
/// [`SpriteBatch`](crate::SpriteBatch) log them with `log::warn!` and return a
/// failure indicator instead.
#[derive(Clone, Debug, PartialEq, Eq, thiserror::Error)]
pub enum BatchError {
    /// A selected-item operation ran with nothing selected.
    #[error("no item is selected")]
    NothingSelected,
    /// The logical position does not fit the batch layout.
    #[error("invalid logical position '{0}' for this layout")]
    InvalidLogicalPosition(LogicalPosition),
    /// Another item already occupies the logical position.
    #[error("an item already exists at logical position '{0}'")]
    DuplicateLogicalPosition(LogicalPosition),
    /// Another item already has the name.
    #[error("an item named '{0}' already exists")]
    DuplicateName(String),
    /// No item has this batch id.
    #[error("no item with batch id {0}")]
    UnknownId(u32),
    /// No item sits at this logical position.
    #[error("no item at logical position '{0}'")]
    UnknownLogicalPosition(LogicalPosition),
    /// No item has this name.
    #[error("no item named '{0}'")]
    UnknownName(String),
    /// The operation needs the spatial index, which is disabled.
    #[error("batch culling (the spatial index) is disabled")]
    IndexingDisabled,
    /// The layout cannot change while items exist.
    #[error("cannot change the batch layout while it has items")]
    LayoutLocked,
    /// A custom layout declined to place the logical position.
    #[error("custom layout rejected logical position '{0}'")]
    CustomLayoutRejected(LogicalPosition),
    /// Text could not be parsed as a logical position.
    #[error("cannot parse logical position from '{0}'")]
    ParseLogicalPosition(String),
    /// Unknown render sort label.
    #[error("unknown render sort mode '{0}'")]
    ParseSortMode(String),
    /// Unknown blend factor label.
    #[error("unknown blend factor '{0}'")]
    ParseBlendFactor(String),
}
