//! Build flags and sort keys.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::MenuError;

bitflags::bitflags! {
    /// Visibility switches applied while building a tree.
    ///
    /// Flags are part of the cache key, so the same definition looked up
    /// with different flags yields independent trees.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default)]
    pub struct TreeFlags: u32 {
        /// Keep entries excluded by rules or desktop restrictions, marked excluded
        const INCLUDE_EXCLUDED = 1 << 0;
        /// Keep directories with no visible contents
        const SHOW_EMPTY = 1 << 1;
        /// Keep entries and directories marked `NoDisplay`
        const INCLUDE_NODISPLAY = 1 << 2;
        /// Do not collapse leading, trailing or repeated separators
        const SHOW_ALL_SEPARATORS = 1 << 3;
    }
}

impl TreeFlags {
    /// Build flags from raw bits, dropping undefined ones
    pub fn from_raw(bits: u32) -> Self {
        Self::from_bits_truncate(bits)
    }
}

/// Comparator used for sorted layout runs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortKey {
    /// Sort entries by `Name`
    #[default]
    Name = 0,
    /// Sort entries by display name (`X-GNOME-FullName`, else `Name`)
    DisplayName = 1,
}

impl TryFrom<i32> for SortKey {
    type Error = MenuError;

    fn try_from(value: i32) -> Result<Self, Self::Error> {
        match value {
            0 => Ok(Self::Name),
            1 => Ok(Self::DisplayName),
            other => Err(MenuError::invalid("sort key", other)),
        }
    }
}

impl FromStr for SortKey {
    type Err = MenuError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "name" => Ok(Self::Name),
            "display-name" | "display_name" => Ok(Self::DisplayName),
            other => Err(MenuError::invalid("sort key", other)),
        }
    }
}

impl fmt::Display for SortKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Name => write!(f, "name"),
            Self::DisplayName => write!(f, "display-name"),
        }
    }
}
