//! Common types shared between diagnostics and reports.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::text::byte_offset_to_position;

// ============================================================================
// Location Type
// ============================================================================

/// Location in a source file, for location-qualified messages.
///
/// - `file`: path as registered
/// - `line`: 1-indexed line number, 0 when the contents were unavailable
/// - `col`: 1-indexed column in bytes, 0 when the contents were unavailable
/// - `byte_offset`: byte offset from file start
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct Location {
    pub file: String,
    pub line: u32,
    pub col: u32,
    pub byte_offset: u64,
}

impl Location {
    /// A location known only by its byte offset.
    pub fn at_offset(file: impl Into<String>, byte_offset: u64) -> Self {
        Location {
            file: file.into(),
            line: 0,
            col: 0,
            byte_offset,
        }
    }

    /// A location with line and column computed from `content`.
    pub fn resolve(file: impl Into<String>, content: &[u8], byte_offset: u64) -> Self {
        let (line, col) = byte_offset_to_position(content, byte_offset);
        Location {
            file: file.into(),
            line,
            col,
            byte_offset,
        }
    }

    pub fn has_line(&self) -> bool {
        self.line > 0
    }

    /// Comparison key for deterministic sorting: (file, offset).
    fn sort_key(&self) -> (&str, u64) {
        (&self.file, self.byte_offset)
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.has_line() {
            write!(f, "{}:{}:{}", self.file, self.line, self.col)
        } else {
            write!(f, "{}@{}", self.file, self.byte_offset)
        }
    }
}

impl PartialOrd for Location {
    fn partial_cmp(&self, other: &Self) -> Option<std::cmp::Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Location {
    fn cmp(&self, other: &Self) -> std::cmp::Ordering {
        self.sort_key().cmp(&other.sort_key())
    }
}
