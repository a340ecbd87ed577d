//! JSON output types for the tokmap CLI.
//!
//! Every command writes exactly one JSON document to stdout, success or
//! failure, so callers can parse the output without looking at the exit code
//! first. Errors carry the numeric [`ErrorCode`] that is also used as the
//! process exit code.

use std::io::{self, Write};

use serde::Serialize;

use tokmap_core::config::AnalysisConfig;
use tokmap_core::report::Report;
use tokmap_core::{ErrorCode, TokmapError};

/// Current schema version for JSON output.
pub const SCHEMA_VERSION: &str = "1";

// ============================================================================
// Error Types
// ============================================================================

/// Error information for error responses.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorInfo {
    /// Numeric error code, also the exit code.
    pub code: u8,
    /// Human-readable message.
    pub message: String,
}

impl ErrorInfo {
    pub fn from_error(err: &TokmapError) -> Self {
        ErrorInfo {
            code: ErrorCode::from(err).code(),
            message: err.to_string(),
        }
    }
}

/// Error response.
#[derive(Debug, Clone, Serialize)]
pub struct ErrorResponse {
    /// Status: "error".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Error information.
    pub error: ErrorInfo,
}

impl ErrorResponse {
    pub fn from_error(err: &TokmapError) -> Self {
        ErrorResponse {
            status: "error".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            error: ErrorInfo::from_error(err),
        }
    }
}

// ============================================================================
// Command Responses
// ============================================================================

/// Response for `tokmap run`.
#[derive(Debug, Clone, Serialize)]
pub struct RunResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// Number of script steps executed.
    pub steps: usize,
    /// Number of unifications performed.
    pub unifications: usize,
    pub report: Report,
}

impl RunResponse {
    pub fn new(steps: usize, unifications: usize, report: Report) -> Self {
        RunResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            steps,
            unifications,
            report,
        }
    }
}

/// Response for `tokmap check-config`.
#[derive(Debug, Clone, Serialize)]
pub struct CheckConfigResponse {
    /// Status: "ok".
    pub status: String,
    /// Schema version for compatibility.
    pub schema_version: String,
    /// The configuration with defaults filled in.
    pub config: AnalysisConfig,
}

impl CheckConfigResponse {
    pub fn new(config: AnalysisConfig) -> Self {
        CheckConfigResponse {
            status: "ok".to_string(),
            schema_version: SCHEMA_VERSION.to_string(),
            config,
        }
    }
}

// ============================================================================
// Emitters
// ============================================================================

/// Emit a response as pretty-printed JSON to a writer.
pub fn emit_response<T: Serialize>(response: &T, writer: &mut impl Write) -> io::Result<()> {
    let json = serde_json::to_string_pretty(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}

/// Emit a response as compact JSON (single line) to a writer.
pub fn emit_response_compact<T: Serialize>(
    response: &T,
    writer: &mut impl Write,
) -> io::Result<()> {
    let json = serde_json::to_string(response)
        .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;
    writeln!(writer, "{}", json)
}
