// Copyright 2025 the Mosaic Authors
// SPDX-License-Identifier: Apache-2.0 OR MIT

//! Logical positions: small integer tuples addressing items on a grid or lattice.

use alloc::string::ToString;
use core::fmt;
use core::str::FromStr;

use kurbo::Vec2;

use crate::error::BatchError;

/// Maximum number of components in a [`LogicalPosition`].
pub const MAX_LOGICAL_ARGS: usize = 6;

/// An application-defined tuple key, e.g. grid coordinates.
///
/// The empty tuple is "invalid": it is never stored in the logical-position index and
/// lookups with it always miss. Text form is the components separated by spaces, and
/// parsing also accepts commas and tabs as separators.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Hash)]
pub struct LogicalPosition {
    len: u8,
    // Unused trailing components stay zero so derived Eq/Hash are correct.
    args: [i32; MAX_LOGICAL_ARGS],
}

impl LogicalPosition {
    /// The empty (invalid) position.
    pub const INVALID: Self = Self {
        len: 0,
        args: [0; MAX_LOGICAL_ARGS],
    };

    /// Build a position from components. Returns `None` for more than
    /// [`MAX_LOGICAL_ARGS`] components.
    pub fn new(components: &[i32]) -> Option<Self> {
        if components.len() > MAX_LOGICAL_ARGS {
            return None;
        }
        let mut args = [0; MAX_LOGICAL_ARGS];
        args[..components.len()].copy_from_slice(components);
        #[allow(
            clippy::cast_possible_truncation,
            reason = "Length is bounded by MAX_LOGICAL_ARGS."
        )]
        let len = components.len() as u8;
        Some(Self { len, args })
    }

    /// A two-component position.
    pub const fn xy(x: i32, y: i32) -> Self {
        let mut args = [0; MAX_LOGICAL_ARGS];
        args[0] = x;
        args[1] = y;
        Self { len: 2, args }
    }

    /// Whether the tuple has at least one component.
    pub const fn is_valid(&self) -> bool {
        self.len > 0
    }

    /// Whether the tuple is empty.
    pub const fn is_invalid(&self) -> bool {
        self.len == 0
    }

    /// Number of components.
    pub const fn arg_count(&self) -> usize {
        self.len as usize
    }

    /// The components.
    pub fn args(&self) -> &[i32] {
        &self.args[..self.arg_count()]
    }

    /// The first two components as a vector, if this is a two-component position.
    pub fn as_vec2(&self) -> Option<Vec2> {
        match self.args() {
            [x, y] => Some(Vec2::new(f64::from(*x), f64::from(*y))),
            _ => None,
        }
    }
}

impl From<(i32, i32)> for LogicalPosition {
    fn from((x, y): (i32, i32)) -> Self {
        Self::xy(x, y)
    }
}

impl fmt::Display for LogicalPosition {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        for (i, a) in self.args().iter().enumerate() {
            if i > 0 {
                f.write_str(" ")?;
            }
            write!(f, "{a}")?;
        }
        Ok(())
    }
}

impl FromStr for LogicalPosition {
    type Err = BatchError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let mut args = [0; MAX_LOGICAL_ARGS];
        let mut len = 0;
        for part in s
            .split(|c: char| c == ',' || c.is_whitespace())
            .filter(|p| !p.is_empty())
        {
            if len == MAX_LOGICAL_ARGS {
                return Err(BatchError::ParseLogicalPosition(s.to_string()));
            }
            args[len] = part
                .parse()
                .map_err(|_| BatchError::ParseLogicalPosition(s.to_string()))?;
            len += 1;
        }
        Self::new(&args[..len]).ok_or_else(|| BatchError::ParseLogicalPosition(s.to_string()))
    }
}

#[cfg(feature = "serde")]
crate::serde_via_str!(LogicalPosition);
