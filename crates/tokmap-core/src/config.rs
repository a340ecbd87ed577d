//! Analysis configuration.
//!
//! Every field has a default, so an empty JSON object is a valid config.

use std::path::Path;

use serde::{Deserialize, Serialize};

use crate::error::{TokmapError, TokmapResult};
use crate::file::ANONYMOUS_PATH;

/// Errors tolerated before the run is stopped.
pub const DEFAULT_MAX_ERRORS: usize = 100;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnalysisConfig {
    /// Error ceiling for diagnostics.
    pub max_errors: usize,
    /// Record `f -> f` edges when both occurrences lie in one file. Turning
    /// this off drops edges that carry no cross-file information.
    pub record_self_dependencies: bool,
    /// Path reported for the anonymous file.
    pub anonymous_path: String,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        AnalysisConfig {
            max_errors: DEFAULT_MAX_ERRORS,
            record_self_dependencies: true,
            anonymous_path: ANONYMOUS_PATH.to_string(),
        }
    }
}

impl AnalysisConfig {
    pub fn from_json_str(text: &str) -> TokmapResult<Self> {
        let config: AnalysisConfig = serde_json::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn load(path: impl AsRef<Path>) -> TokmapResult<Self> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Self::from_json_str(&text)
    }

    pub fn validate(&self) -> TokmapResult<()> {
        if self.max_errors == 0 {
            return Err(TokmapError::invalid_config("max_errors must be at least 1"));
        }
        if self.anonymous_path.is_empty() {
            return Err(TokmapError::invalid_config("anonymous_path must not be empty"));
        }
        Ok(())
    }

    pub fn with_max_errors(mut self, max_errors: usize) -> Self {
        self.max_errors = max_errors;
        self
    }

    pub fn with_self_dependencies(mut self, record: bool) -> Self {
        self.record_self_dependencies = record;
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    #[test]
    fn empty_object_uses_defaults() {
        let config = AnalysisConfig::from_json_str("{}").unwrap();
        assert_eq!(config, AnalysisConfig::default());
        assert_eq!(config.max_errors, 100);
        assert!(config.record_self_dependencies);
    }

    #[test]
    fn partial_override() {
        let config = AnalysisConfig::from_json_str(r#"{"max_errors": 5}"#).unwrap();
        assert_eq!(config.max_errors, 5);
        assert_eq!(config.anonymous_path, ANONYMOUS_PATH);
    }

    #[test]
    fn zero_ceiling_is_rejected() {
        let err = AnalysisConfig::from_json_str(r#"{"max_errors": 0}"#).unwrap_err();
        assert!(matches!(err, TokmapError::InvalidConfig { .. }));
    }

    #[test]
    fn malformed_json_is_input_error() {
        let err = AnalysisConfig::from_json_str("{max_errors").unwrap_err();
        assert!(matches!(err, TokmapError::Json(_)));
    }

    #[test]
    fn load_reads_file() {
        let mut file = tempfile::NamedTempFile::new().unwrap();
        write!(file, r#"{{"record_self_dependencies": false}}"#).unwrap();
        let config = AnalysisConfig::load(file.path()).unwrap();
        assert!(!config.record_self_dependencies);
    }
}
