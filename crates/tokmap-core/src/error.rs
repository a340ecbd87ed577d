//! Error types and error code constants for tokmap.
//!
//! This module provides a unified error type (`TokmapError`) for every
//! operation of the identity engine, plus a stable numeric classification
//! (`ErrorCode`) used by drivers for exit codes and JSON output.
//!
//! ## Error Code Mapping
//!
//! - `2`: Invalid arguments or configuration (bad input from caller)
//! - `3`: I/O and decoding failures (unreadable files, malformed JSON)
//! - `4`: Error ceiling reached (too many diagnostics)
//! - `10`: Internal errors (invariant violations in the engine or its caller)
//!
//! ## Internal Errors
//!
//! Invariant violations are not recoverable. An [`Analysis`](crate::Analysis)
//! that observes one marks itself aborted, and every later mutating call
//! fails with [`TokmapError::Aborted`].

use std::fmt;

use thiserror::Error;

use crate::attr::AttributeId;
use crate::eclass::EClassId;
use crate::file::FileId;
use crate::position::Position;

// ============================================================================
// Output Error Codes
// ============================================================================

/// Stable error codes for drivers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[repr(u8)]
pub enum ErrorCode {
    /// Invalid arguments or configuration from the caller.
    InvalidArguments = 2,
    /// Input could not be read or decoded.
    InputError = 3,
    /// The diagnostic error ceiling was exceeded.
    LimitExceeded = 4,
    /// Internal errors (bugs, broken invariants).
    InternalError = 10,
}

impl ErrorCode {
    /// Get the numeric code value.
    pub fn code(&self) -> u8 {
        *self as u8
    }
}

impl fmt::Display for ErrorCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.code())
    }
}

// ============================================================================
// Unified Error Type
// ============================================================================

/// Unified error type for the identity engine.
#[derive(Debug, Error)]
pub enum TokmapError {
    /// A file id that was never allocated by the registry.
    #[error("unknown file id {id}")]
    UnknownFile { id: FileId },

    /// An attribute id that was never registered.
    #[error("unknown attribute id {id}")]
    UnknownAttribute { id: AttributeId },

    /// An attribute name that matches no built-in or project attribute.
    #[error("unknown attribute name '{name}'")]
    UnknownAttributeName { name: String },

    /// Split length outside `1..len`.
    #[error("invalid split of {class} (length {len}) at {at}")]
    InvalidSplit { class: EClassId, len: u64, at: u64 },

    /// Merge of two classes with different lengths.
    #[error("cannot merge {left} (length {left_len}) with {right} (length {right_len})")]
    LengthMismatch {
        left: EClassId,
        left_len: u64,
        right: EClassId,
        right_len: u64,
    },

    /// A class id that was absorbed by a merge or never allocated.
    #[error("stale equivalence class {class}")]
    StaleClass { class: EClassId },

    /// Token decompositions still disagree after homogenization.
    #[error("constituents disagree after homogenization: {left} vs {right} at fragment {index}")]
    FragmentMismatch {
        left: usize,
        right: usize,
        index: usize,
    },

    /// A fragment with zero length.
    #[error("zero-length fragment at {position}")]
    EmptyFragment { position: Position },

    /// A run that would extend past the largest representable offset.
    #[error("run of length {len} at {position} overflows the offset range")]
    OffsetOverflow { position: Position, len: u64 },

    /// A token without fragments.
    #[error("token '{value}' has no fragments")]
    EmptyToken { value: String },

    /// Two classes cover the same position.
    #[error("partition violated at {position}")]
    PartitionViolation { position: Position },

    /// Too many errors were reported.
    #[error("error count exceeds {limit}; exiting")]
    ErrorLimitExceeded { limit: usize },

    /// The analysis stopped after an internal error.
    #[error("analysis aborted after an internal error")]
    Aborted,

    /// Invalid configuration value.
    #[error("invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// IO error.
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    /// JSON error.
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),
}

/// Result type for engine operations.
pub type TokmapResult<T> = Result<T, TokmapError>;

// ============================================================================
// Error Code Mapping
// ============================================================================

impl From<&TokmapError> for ErrorCode {
    fn from(err: &TokmapError) -> Self {
        match err {
            TokmapError::UnknownAttributeName { .. } => ErrorCode::InvalidArguments,
            TokmapError::InvalidConfig { .. } => ErrorCode::InvalidArguments,
            TokmapError::Io(_) => ErrorCode::InputError,
            TokmapError::Json(_) => ErrorCode::InputError,
            TokmapError::ErrorLimitExceeded { .. } => ErrorCode::LimitExceeded,
            TokmapError::UnknownFile { .. }
            | TokmapError::UnknownAttribute { .. }
            | TokmapError::InvalidSplit { .. }
            | TokmapError::LengthMismatch { .. }
            | TokmapError::StaleClass { .. }
            | TokmapError::FragmentMismatch { .. }
            | TokmapError::EmptyFragment { .. }
            | TokmapError::OffsetOverflow { .. }
            | TokmapError::EmptyToken { .. }
            | TokmapError::PartitionViolation { .. }
            | TokmapError::Aborted => ErrorCode::InternalError,
        }
    }
}

impl From<TokmapError> for ErrorCode {
    fn from(err: TokmapError) -> Self {
        ErrorCode::from(&err)
    }
}

// ============================================================================
// Convenience Constructors
// ============================================================================

impl TokmapError {
    /// Create an invalid configuration error.
    pub fn invalid_config(message: impl Into<String>) -> Self {
        TokmapError::InvalidConfig {
            message: message.into(),
        }
    }

    /// Get the error code for this error.
    pub fn error_code(&self) -> ErrorCode {
        ErrorCode::from(self)
    }

    /// Whether this error reports a broken engine invariant.
    ///
    /// `Aborted` is excluded: it is the consequence of an earlier internal
    /// error, not a new one.
    pub fn is_internal(&self) -> bool {
        self.error_code() == ErrorCode::InternalError && !matches!(self, TokmapError::Aborted)
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod error_code_mapping {
        use super::*;

        #[test]
        fn invalid_split_is_internal() {
            let err = TokmapError::InvalidSplit {
                class: EClassId::new(3),
                len: 4,
                at: 4,
            };
            assert_eq!(err.error_code(), ErrorCode::InternalError);
            assert_eq!(err.error_code().code(), 10);
            assert!(err.is_internal());
        }

        #[test]
        fn aborted_is_not_a_new_internal_error() {
            let err = TokmapError::Aborted;
            assert_eq!(err.error_code(), ErrorCode::InternalError);
            assert!(!err.is_internal());
        }

        #[test]
        fn error_limit_maps_to_limit_exceeded() {
            let err = TokmapError::ErrorLimitExceeded { limit: 100 };
            assert_eq!(ErrorCode::from(&err), ErrorCode::LimitExceeded);
            assert!(!err.is_internal());
        }

        #[test]
        fn config_errors_are_invalid_arguments() {
            let err = TokmapError::invalid_config("max_errors must be positive");
            assert_eq!(err.error_code().code(), 2);
        }

        #[test]
        fn io_errors_are_input_errors() {
            let err = TokmapError::from(std::io::Error::new(
                std::io::ErrorKind::NotFound,
                "missing",
            ));
            assert_eq!(err.error_code(), ErrorCode::InputError);
        }
    }

    mod error_display {
        use super::*;

        #[test]
        fn stale_class_display() {
            let err = TokmapError::StaleClass {
                class: EClassId::new(7),
            };
            assert_eq!(err.to_string(), "stale equivalence class ec_7");
        }

        #[test]
        fn error_limit_display() {
            let err = TokmapError::ErrorLimitExceeded { limit: 100 };
            assert_eq!(err.to_string(), "error count exceeds 100; exiting");
        }

        #[test]
        fn offset_overflow_display() {
            let err = TokmapError::OffsetOverflow {
                position: Position::new(FileId::new(1), u64::MAX),
                len: 2,
            };
            assert_eq!(
                err.to_string(),
                format!("run of length 2 at file_1@{} overflows the offset range", u64::MAX)
            );
            assert!(err.is_internal());
        }

        #[test]
        fn empty_fragment_display() {
            let err = TokmapError::EmptyFragment {
                position: Position::new(FileId::new(2), 10),
            };
            assert_eq!(err.to_string(), "zero-length fragment at file_2@10");
        }
    }
}
