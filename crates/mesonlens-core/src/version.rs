//! Tool version probing and comparison

use serde::{Deserialize, Serialize};
use std::fmt;

/// A `major.minor.patch` tool version.
///
/// Comparison is lexicographic. The invalid sentinel has every component
/// set to `-1` and compares below any real version.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct ToolVersion {
    pub major: i32,
    pub minor: i32,
    pub patch: i32,
}

impl ToolVersion {
    pub const INVALID: Self = Self {
        major: -1,
        minor: -1,
        patch: -1,
    };

    pub fn new(major: i32, minor: i32, patch: i32) -> Self {
        Self {
            major,
            minor,
            patch,
        }
    }

    pub fn is_valid(&self) -> bool {
        *self != Self::INVALID
    }

    /// Parse the first line of a `--version` output.
    ///
    /// Accepts `major.minor.patch` with optional trailing text after the
    /// patch component (e.g. `1.3.0.rc1`). Anything else is the invalid
    /// sentinel.
    pub fn parse(line: &str) -> Self {
        let mut parts = line.trim().split('.');
        let mut next = |allow_tail: bool| -> Option<i32> {
            let part = parts.next()?;
            if allow_tail {
                let digits: String = part.chars().take_while(|c| c.is_ascii_digit()).collect();
                digits.parse().ok()
            } else {
                part.parse().ok()
            }
        };
        match (next(false), next(false), next(true)) {
            (Some(major), Some(minor), Some(patch)) => Self::new(major, minor, patch),
            _ => Self::INVALID,
        }
    }
}

impl Default for ToolVersion {
    fn default() -> Self {
        Self::INVALID
    }
}

impl fmt::Display for ToolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}.{}.{}", self.major, self.minor, self.patch)
    }
}
