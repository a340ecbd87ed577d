//! Location-qualified diagnostics with an error ceiling.
//!
//! Diagnostics are both logged through `tracing` and kept for the final
//! report. Once the number of errors exceeds the configured ceiling, a fatal
//! diagnostic is recorded and [`TokmapError::ErrorLimitExceeded`] is
//! returned so the driver can stop.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::config::DEFAULT_MAX_ERRORS;
use crate::error::{TokmapError, TokmapResult};
use crate::types::Location;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Warning,
    Error,
    Internal,
    Fatal,
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Severity::Warning => "warning",
            Severity::Error => "error",
            Severity::Internal => "internal error",
            Severity::Fatal => "fatal error",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Diagnostic {
    pub severity: Severity,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.location {
            Some(loc) if loc.has_line() => {
                write!(f, "{}:{}: {}: {}", loc.file, loc.line, self.severity, self.message)
            }
            Some(loc) => write!(f, "{}: {}: {}", loc, self.severity, self.message),
            None => write!(f, "{}: {}", self.severity, self.message),
        }
    }
}

#[derive(Debug, Clone)]
pub struct Diagnostics {
    entries: Vec<Diagnostic>,
    num_errors: usize,
    num_warnings: usize,
    max_errors: usize,
}

impl Default for Diagnostics {
    fn default() -> Self {
        Diagnostics::new(DEFAULT_MAX_ERRORS)
    }
}

impl Diagnostics {
    pub fn new(max_errors: usize) -> Self {
        Diagnostics {
            entries: Vec::new(),
            num_errors: 0,
            num_warnings: 0,
            max_errors,
        }
    }

    pub fn warning(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.num_warnings += 1;
        self.push(Severity::Warning, message.into(), location);
    }

    /// Record an error; fails once the error count exceeds the ceiling.
    pub fn error(&mut self, message: impl Into<String>, location: Option<Location>) -> TokmapResult<()> {
        self.num_errors += 1;
        self.push(Severity::Error, message.into(), location);
        self.check_limit()
    }

    /// Record a broken invariant. Counts as an error but never trips the
    /// ceiling: the caller is already stopping.
    pub fn internal(&mut self, message: impl Into<String>, location: Option<Location>) {
        self.num_errors += 1;
        self.push(Severity::Internal, message.into(), location);
    }

    pub fn fatal(&mut self, message: impl Into<String>) {
        self.push(Severity::Fatal, message.into(), None);
    }

    fn check_limit(&mut self) -> TokmapResult<()> {
        if self.num_errors > self.max_errors {
            let limit = self.max_errors;
            self.fatal(format!("error count exceeds {limit}; exiting"));
            return Err(TokmapError::ErrorLimitExceeded { limit });
        }
        Ok(())
    }

    fn push(&mut self, severity: Severity, message: String, location: Option<Location>) {
        let diagnostic = Diagnostic {
            severity,
            message,
            location,
        };
        match severity {
            Severity::Warning => tracing::warn!("{diagnostic}"),
            _ => tracing::error!("{diagnostic}"),
        }
        self.entries.push(diagnostic);
    }

    pub fn entries(&self) -> &[Diagnostic] {
        &self.entries
    }

    pub fn num_errors(&self) -> usize {
        self.num_errors
    }

    pub fn num_warnings(&self) -> usize {
        self.num_warnings
    }

    pub fn max_errors(&self) -> usize {
        self.max_errors
    }

    pub fn has_fatal(&self) -> bool {
        self.entries.iter().any(|d| d.severity == Severity::Fatal)
    }
}
