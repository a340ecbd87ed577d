//! Position addressing: one character position in one file.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::file::FileId;

/// A `(file, byte offset)` pair, ordered by file id then offset.
///
/// This is the atomic unit over which identity is tracked.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct Position {
    pub file: FileId,
    pub offset: u64,
}

impl Position {
    /// Sentinel for synthetic or unknown locations.
    pub const ANONYMOUS: Position = Position {
        file: FileId::ANONYMOUS,
        offset: 0,
    };

    pub fn new(file: FileId, offset: u64) -> Self {
        Position { file, offset }
    }

    /// The position `n` characters further into the same file.
    ///
    /// Callers stay inside runs already validated with
    /// [`checked_offset_by`](Self::checked_offset_by); past `u64::MAX` the
    /// offset saturates.
    pub fn offset_by(self, n: u64) -> Self {
        Position {
            file: self.file,
            offset: self.offset.saturating_add(n),
        }
    }

    /// Like [`offset_by`](Self::offset_by), but `None` when the offset
    /// would not fit in a `u64`.
    pub fn checked_offset_by(self, n: u64) -> Option<Self> {
        Some(Position {
            file: self.file,
            offset: self.offset.checked_add(n)?,
        })
    }

    pub fn is_anonymous(self) -> bool {
        self.file.is_anonymous()
    }

    /// Distance from `start` to `self` when both are in the same file and
    /// `start` is not after `self`.
    pub fn distance_from(self, start: Position) -> Option<u64> {
        if self.file == start.file && start.offset <= self.offset {
            Some(self.offset - start.offset)
        } else {
            None
        }
    }
}

impl fmt::Display for Position {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}@{}", self.file, self.offset)
    }
}
