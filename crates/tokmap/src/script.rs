//! Unification scripts.
//!
//! A script stands in for the lexer and the symbol resolver: it names the
//! files of a run, then lists the steps those collaborators would have
//! issued against the identity engine.
//!
//! ```json
//! {
//!   "files": [
//!     { "path": "a.c", "contents": "int counter;" },
//!     { "path": "/usr/include/stdio.h", "readonly": true }
//!   ],
//!   "steps": [
//!     { "op": "project", "name": "app" },
//!     { "op": "unify",
//!       "defining":    { "value": "counter", "parts": [{ "file": "a.c", "offset": 4, "len": 7 }] },
//!       "referencing": { "value": "counter", "parts": [{ "file": "b.c", "offset": 40, "len": 7 }] } },
//!     { "op": "attribute", "attribute": "function",
//!       "token": { "value": "main", "parts": [{ "file": "a.c", "offset": 20, "len": 4 }] } }
//!   ]
//! }
//! ```
//!
//! Files referenced by a step but missing from `files` are registered on
//! first use. Contents that are neither inlined nor readable from disk leave
//! the file out of identifier scanning.

use std::path::{Path, PathBuf};

use serde::Deserialize;

use tokmap_core::config::AnalysisConfig;
use tokmap_core::report::{Report, Sources};
use tokmap_core::token::{Fragment, Token, TokenKind};
use tokmap_core::{Analysis, Position, TokmapResult};

// ============================================================================
// Script Format
// ============================================================================

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct Script {
    /// Overrides for the analysis configuration.
    #[serde(default)]
    pub config: Option<AnalysisConfig>,
    #[serde(default)]
    pub files: Vec<FileSpec>,
    #[serde(default)]
    pub steps: Vec<Step>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct FileSpec {
    pub path: PathBuf,
    #[serde(default)]
    pub readonly: bool,
    /// Inline contents; when absent the file is read from disk.
    #[serde(default)]
    pub contents: Option<String>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct PartSpec {
    pub file: PathBuf,
    pub offset: u64,
    pub len: u64,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TokenSpec {
    pub value: String,
    #[serde(default)]
    pub kind: TokenKind,
    pub parts: Vec<PartSpec>,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(tag = "op", rename_all = "snake_case")]
pub enum Step {
    /// Make `name` the current project; later tokens get its attribute.
    Project { name: String },
    /// Record an occurrence without unifying it with anything.
    Occurrence { token: TokenSpec },
    Unify {
        defining: TokenSpec,
        referencing: TokenSpec,
    },
    /// Set an attribute, by short name or project name, on a token.
    Attribute { token: TokenSpec, attribute: String },
    /// Report a diagnostic at the start of a token.
    Error { token: TokenSpec, message: String },
    Warning { token: TokenSpec, message: String },
}

impl Script {
    pub fn from_json_str(text: &str) -> TokmapResult<Script> {
        Ok(serde_json::from_str(text)?)
    }

    pub fn load(path: impl AsRef<Path>) -> TokmapResult<Script> {
        let text = std::fs::read_to_string(path.as_ref())?;
        Script::from_json_str(&text)
    }
}

// ============================================================================
// Execution
// ============================================================================

/// Result of replaying a script.
#[derive(Debug)]
pub struct ScriptRun {
    pub analysis: Analysis,
    pub sources: Sources,
    pub steps: usize,
    pub unifications: usize,
}

impl ScriptRun {
    pub fn report(&self) -> TokmapResult<Report> {
        Report::build(&self.analysis, &self.sources)
    }
}

/// Replay `script`. Relative paths of on-disk contents resolve against
/// `base_dir`; `config` takes precedence over the script's own config.
pub fn run_script(
    script: &Script,
    base_dir: &Path,
    config: Option<AnalysisConfig>,
) -> TokmapResult<ScriptRun> {
    let config = config
        .or_else(|| script.config.clone())
        .unwrap_or_default();
    let mut run = ScriptRun {
        analysis: Analysis::with_config(config)?,
        sources: Sources::new(),
        steps: 0,
        unifications: 0,
    };

    for file in &script.files {
        let id = run.analysis.intern_file(&file.path)?;
        run.analysis.set_readonly(id, file.readonly)?;
        let contents = match &file.contents {
            Some(text) => Some(text.clone().into_bytes()),
            None => read_source(base_dir, &file.path),
        };
        match contents {
            Some(bytes) => {
                run.sources.insert(id, bytes);
            }
            None => run.analysis.report_warning(
                None,
                format!("{}: contents unavailable", file.path.display()),
            ),
        }
    }

    for step in &script.steps {
        run.execute(step)?;
        run.steps += 1;
    }
    tracing::info!(
        steps = run.steps,
        unifications = run.unifications,
        classes = run.analysis.classes().num_classes(),
        "script finished"
    );
    Ok(run)
}

fn read_source(base_dir: &Path, path: &Path) -> Option<Vec<u8>> {
    let full = if path.is_absolute() {
        path.to_path_buf()
    } else {
        base_dir.join(path)
    };
    match std::fs::read(&full) {
        Ok(bytes) => Some(bytes),
        Err(err) => {
            tracing::debug!(path = %full.display(), %err, "could not read source");
            None
        }
    }
}

impl ScriptRun {
    fn execute(&mut self, step: &Step) -> TokmapResult<()> {
        match step {
            Step::Project { name } => {
                self.analysis.set_current_project(name)?;
            }
            Step::Occurrence { token } => {
                let token = self.token(token)?;
                self.analysis.constituents(&token)?;
                self.mark_project(&token)?;
            }
            Step::Unify {
                defining,
                referencing,
            } => {
                let defining = self.token(defining)?;
                let referencing = self.token(referencing)?;
                self.analysis.unify(&defining, &referencing)?;
                self.mark_project(&defining)?;
                self.mark_project(&referencing)?;
                self.unifications += 1;
            }
            Step::Attribute { token, attribute } => {
                let token = self.token(token)?;
                let attr = self.analysis.attributes().resolve(attribute)?;
                self.analysis.set_token_attribute(&token, attr)?;
            }
            Step::Error { token, message } => {
                let token = self.token(token)?;
                let location = self.locate(&token)?;
                self.analysis.report_error(Some(location), message.clone())?;
            }
            Step::Warning { token, message } => {
                let token = self.token(token)?;
                let location = self.locate(&token)?;
                self.analysis.report_warning(Some(location), message.clone());
            }
        }
        Ok(())
    }

    fn token(&mut self, entry: &TokenSpec) -> TokmapResult<Token> {
        let mut parts = Vec::with_capacity(entry.parts.len());
        for part in &entry.parts {
            let file = self.analysis.intern_file(&part.file)?;
            parts.push(Fragment::new(Position::new(file, part.offset), part.len));
        }
        Token::new(entry.kind, entry.value.clone(), parts)
    }

    fn mark_project(&mut self, token: &Token) -> TokmapResult<()> {
        if let Some(project) = self.analysis.current_project() {
            self.analysis.set_token_attribute(token, project)?;
        }
        Ok(())
    }

    fn locate(&self, token: &Token) -> TokmapResult<tokmap_core::types::Location> {
        let position = token.parts()[0].position;
        let contents = self.sources.get(&position.file).map(Vec::as_slice);
        self.analysis.locate(position, contents)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tokmap_core::TokmapError;

    fn run(text: &str) -> TokmapResult<ScriptRun> {
        let script = Script::from_json_str(text)?;
        run_script(&script, Path::new("."), None)
    }

    #[test]
    fn empty_script_runs() {
        let run = run("{}").unwrap();
        assert_eq!(run.steps, 0);
        assert!(run.analysis.files().is_empty());
    }

    #[test]
    fn unknown_step_is_rejected() {
        let err = Script::from_json_str(r#"{"steps": [{"op": "rename"}]}"#).unwrap_err();
        assert!(matches!(err, TokmapError::Json(_)));
    }

    #[test]
    fn unify_step_merges_and_marks_project() {
        let run = run(
            r#"{
              "files": [
                {"path": "a.c", "contents": "          counter"},
                {"path": "b.c", "contents": ""}
              ],
              "steps": [
                {"op": "project", "name": "app"},
                {"op": "unify",
                 "defining":    {"value": "counter", "parts": [{"file": "a.c", "offset": 10, "len": 7}]},
                 "referencing": {"value": "counter", "parts": [{"file": "b.c", "offset": 40, "len": 7}]}}
              ]
            }"#,
        )
        .unwrap();
        assert_eq!(run.unifications, 1);
        let a = run.analysis.files().lookup("a.c").unwrap();
        let class = run.analysis.class_at(Position::new(a, 10)).unwrap();
        let project = run.analysis.attributes().project_id("app").unwrap();
        assert!(run.analysis.get_flag(class, project).unwrap());
        assert_eq!(run.analysis.class(class).unwrap().size(), 2);
    }

    #[test]
    fn unknown_attribute_name_is_invalid_argument() {
        let result = run(
            r#"{"steps": [{"op": "attribute", "attribute": "nosuch",
                "token": {"value": "x", "parts": [{"file": "a.c", "offset": 0, "len": 1}]}}]}"#,
        );
        let err = result.unwrap_err();
        assert!(matches!(err, TokmapError::UnknownAttributeName { .. }));
        assert_eq!(err.error_code().code(), 2);
    }

    #[test]
    fn offset_past_u64_range_is_rejected() {
        let text = format!(
            r#"{{"steps": [{{"op": "occurrence",
                "token": {{"value": "xy", "parts": [{{"file": "a.c", "offset": {}, "len": 2}}]}}}}]}}"#,
            u64::MAX
        );
        let err = run(&text).unwrap_err();
        assert!(matches!(err, TokmapError::OffsetOverflow { len: 2, .. }));
        assert_eq!(err.error_code().code(), 10);
    }

    #[test]
    fn missing_contents_become_a_warning() {
        let run = run(r#"{"files": [{"path": "does/not/exist.c"}]}"#).unwrap();
        assert_eq!(run.analysis.diagnostics().num_warnings(), 1);
        assert!(run.sources.is_empty());
    }
}
