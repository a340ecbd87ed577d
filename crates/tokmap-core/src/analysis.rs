//! The analysis context.
//!
//! [`Analysis`] owns every registry of one run: files, equivalence classes,
//! the dependency graph, the attribute ledger, and the diagnostics sink.
//! Nothing is global, so a fresh `Analysis` is a fresh run.
//!
//! Every mutating call goes through [`Analysis::guard`]: an internal error
//! is recorded as a diagnostic and the analysis refuses further mutation
//! with [`TokmapError::Aborted`].

use std::path::Path;

use crate::attr::{Attribute, AttributeId, AttributeLedger};
use crate::config::AnalysisConfig;
use crate::diag::Diagnostics;
use crate::eclass::{ClassEngine, EClass, EClassId};
use crate::error::{TokmapError, TokmapResult};
use crate::fdep::DependencyGraph;
use crate::file::{FileId, FileRegistry};
use crate::position::Position;
use crate::token::{self, Fragment, Token};
use crate::types::Location;

#[derive(Debug)]
pub struct Analysis {
    pub(crate) config: AnalysisConfig,
    pub(crate) files: FileRegistry,
    pub(crate) classes: ClassEngine,
    pub(crate) deps: DependencyGraph,
    pub(crate) attributes: AttributeLedger,
    pub(crate) diagnostics: Diagnostics,
    aborted: bool,
}

impl Default for Analysis {
    fn default() -> Self {
        Analysis::from_valid_config(AnalysisConfig::default())
    }
}

impl Analysis {
    /// A run with default configuration.
    pub fn new() -> Self {
        Analysis::default()
    }

    pub fn with_config(config: AnalysisConfig) -> TokmapResult<Self> {
        config.validate()?;
        Ok(Analysis::from_valid_config(config))
    }

    fn from_valid_config(config: AnalysisConfig) -> Self {
        Analysis {
            files: FileRegistry::with_anonymous_path(&config.anonymous_path),
            classes: ClassEngine::new(),
            deps: DependencyGraph::new(),
            attributes: AttributeLedger::new(),
            diagnostics: Diagnostics::new(config.max_errors),
            aborted: false,
            config,
        }
    }

    // ========================================================================
    // Accessors
    // ========================================================================

    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    pub fn files(&self) -> &FileRegistry {
        &self.files
    }

    pub fn classes(&self) -> &ClassEngine {
        &self.classes
    }

    pub fn dependencies(&self) -> &DependencyGraph {
        &self.deps
    }

    pub fn attributes(&self) -> &AttributeLedger {
        &self.attributes
    }

    pub fn diagnostics(&self) -> &Diagnostics {
        &self.diagnostics
    }

    pub fn is_aborted(&self) -> bool {
        self.aborted
    }

    pub(crate) fn ensure_running(&self) -> TokmapResult<()> {
        if self.aborted {
            return Err(TokmapError::Aborted);
        }
        Ok(())
    }

    /// Pass `result` through, aborting the run on an internal error.
    pub(crate) fn guard<T>(&mut self, result: TokmapResult<T>) -> TokmapResult<T> {
        if let Err(err) = &result {
            if err.is_internal() && !self.aborted {
                self.aborted = true;
                self.diagnostics.internal(err.to_string(), None);
            }
        }
        result
    }

    // ========================================================================
    // Files
    // ========================================================================

    pub fn intern_file(&mut self, path: impl AsRef<Path>) -> TokmapResult<FileId> {
        self.ensure_running()?;
        Ok(self.files.intern(path))
    }

    pub fn set_readonly(&mut self, file: FileId, readonly: bool) -> TokmapResult<()> {
        self.ensure_running()?;
        let result = self.files.set_readonly(file, readonly);
        self.guard(result)
    }

    pub fn path_of(&self, file: FileId) -> TokmapResult<&Path> {
        self.files.path_of(file)
    }

    // ========================================================================
    // Classes
    // ========================================================================

    pub fn class_of(&mut self, position: Position, requested_length: u64) -> TokmapResult<EClassId> {
        self.ensure_running()?;
        let result = self.classes.class_of(position, requested_length, &self.files);
        self.guard(result)
    }

    /// Non-creating lookup of the class covering `position`.
    pub fn class_at(&self, position: Position) -> Option<EClassId> {
        self.classes.class_at(position)
    }

    pub fn class(&self, id: EClassId) -> TokmapResult<&EClass> {
        self.classes.get(id)
    }

    pub fn split(&mut self, id: EClassId, at: u64) -> TokmapResult<(EClassId, EClassId)> {
        self.ensure_running()?;
        let result = self.classes.split(id, at);
        self.guard(result)
    }

    pub fn merge(&mut self, a: EClassId, b: EClassId) -> TokmapResult<EClassId> {
        self.ensure_running()?;
        let result = self.classes.merge(a, b);
        self.guard(result)
    }

    /// Files of `id` ordered by path.
    pub fn sorted_files(&self, id: EClassId) -> TokmapResult<Vec<FileId>> {
        self.classes.sorted_files(id, &self.files)
    }

    // ========================================================================
    // Tokens
    // ========================================================================

    pub fn constituents(&mut self, token: &Token) -> TokmapResult<Vec<Fragment>> {
        self.ensure_running()?;
        let result = token::constituents(&mut self.classes, &self.files, token);
        self.guard(result)
    }

    pub fn token_contains(&self, token: &Token, class: EClassId) -> bool {
        token.contains(&self.classes, class)
    }

    /// Flag every class that currently makes up `token`.
    pub fn set_token_attribute(&mut self, token: &Token, attr: impl Into<AttributeId>) -> TokmapResult<()> {
        let attr = attr.into();
        for part in self.constituents(token)? {
            let id = self
                .classes
                .class_starting_at(part.position)
                .ok_or(TokmapError::PartitionViolation {
                    position: part.position,
                });
            let id = self.guard(id)?;
            self.set_flag(id, attr)?;
        }
        Ok(())
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn register_project(&mut self, name: &str) -> TokmapResult<AttributeId> {
        self.ensure_running()?;
        Ok(self.attributes.register_project(name))
    }

    /// Register `name` if needed and make it the project of later tokens.
    pub fn set_current_project(&mut self, name: &str) -> TokmapResult<AttributeId> {
        self.ensure_running()?;
        Ok(self.attributes.set_current_project(name))
    }

    pub fn current_project(&self) -> Option<AttributeId> {
        self.attributes.current_project()
    }

    /// Set attribute `attr` on class `id`. The read-only attribute maps onto
    /// the class's read-only flag.
    pub fn set_flag(&mut self, id: EClassId, attr: impl Into<AttributeId>) -> TokmapResult<()> {
        self.ensure_running()?;
        let attr = attr.into();
        let result = self.attributes.check(attr).and_then(|()| {
            if attr == Attribute::ReadOnly.id() {
                self.classes.set_readonly(id, true)
            } else {
                self.classes.set_attribute(id, attr)
            }
        });
        self.guard(result)
    }

    /// Whether class `id` carries `attr`. Registered attributes the class has
    /// never seen read as `false`.
    pub fn get_flag(&self, id: EClassId, attr: impl Into<AttributeId>) -> TokmapResult<bool> {
        let attr = attr.into();
        self.attributes.check(attr)?;
        let class = self.classes.get(id)?;
        if attr == Attribute::ReadOnly.id() {
            return Ok(class.is_readonly());
        }
        Ok(class.has_attribute(attr))
    }

    // ========================================================================
    // Diagnostics
    // ========================================================================

    /// Location of `position`, with line and column when `contents` are given.
    pub fn locate(&self, position: Position, contents: Option<&[u8]>) -> TokmapResult<Location> {
        let path = self.files.path_of(position.file)?.display().to_string();
        Ok(match contents {
            Some(bytes) => Location::resolve(path, bytes, position.offset),
            None => Location::at_offset(path, position.offset),
        })
    }

    pub fn report_warning(&mut self, location: Option<Location>, message: impl Into<String>) {
        self.diagnostics.warning(message, location);
    }

    /// Record an error diagnostic; fails once the error ceiling is exceeded.
    pub fn report_error(&mut self, location: Option<Location>, message: impl Into<String>) -> TokmapResult<()> {
        self.diagnostics.error(message, location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    mod lifecycle {
        use super::*;

        #[test]
        fn invalid_config_is_rejected() {
            let config = AnalysisConfig::default().with_max_errors(0);
            assert!(Analysis::with_config(config).is_err());
        }

        #[test]
        fn internal_error_aborts_the_run() {
            let mut analysis = Analysis::new();
            let a = analysis.intern_file("a.c").unwrap();
            let id = analysis.class_of(Position::new(a, 0), 3).unwrap();
            let err = analysis.split(id, 3).unwrap_err();
            assert!(matches!(err, TokmapError::InvalidSplit { .. }));
            assert!(analysis.is_aborted());
            assert_eq!(analysis.diagnostics().num_errors(), 1);

            let err = analysis.class_of(Position::new(a, 10), 2).unwrap_err();
            assert!(matches!(err, TokmapError::Aborted));
            assert!(matches!(analysis.intern_file("b.c"), Err(TokmapError::Aborted)));
        }

        #[test]
        fn queries_still_work_after_abort() {
            let mut analysis = Analysis::new();
            let a = analysis.intern_file("a.c").unwrap();
            let id = analysis.class_of(Position::new(a, 0), 3).unwrap();
            let _ = analysis.split(id, 0);
            assert!(analysis.is_aborted());
            assert_eq!(analysis.class(id).unwrap().len(), 3);
            assert_eq!(analysis.class_at(Position::new(a, 1)), Some(id));
        }
    }

    mod flags {
        use super::*;

        #[test]
        fn readonly_attribute_maps_to_class_flag() {
            let mut analysis = Analysis::new();
            let a = analysis.intern_file("a.c").unwrap();
            let id = analysis.class_of(Position::new(a, 0), 3).unwrap();
            assert!(!analysis.get_flag(id, Attribute::ReadOnly).unwrap());
            analysis.set_flag(id, Attribute::ReadOnly).unwrap();
            assert!(analysis.get_flag(id, Attribute::ReadOnly).unwrap());
            assert!(analysis.class(id).unwrap().is_readonly());
        }

        #[test]
        fn unregistered_attribute_is_internal() {
            let mut analysis = Analysis::new();
            let a = analysis.intern_file("a.c").unwrap();
            let id = analysis.class_of(Position::new(a, 0), 3).unwrap();
            assert!(matches!(
                analysis.get_flag(id, AttributeId::new(99)),
                Err(TokmapError::UnknownAttribute { .. })
            ));
            assert!(!analysis.is_aborted());
            assert!(analysis.set_flag(id, AttributeId::new(99)).is_err());
            assert!(analysis.is_aborted());
        }

        #[test]
        fn token_attribute_reaches_every_constituent() {
            let mut analysis = Analysis::new();
            let a = analysis.intern_file("a.c").unwrap();
            let id = analysis.class_of(Position::new(a, 0), 6).unwrap();
            let (left, right) = analysis.split(id, 2).unwrap();
            let token = Token::identifier("fooBar", Position::new(a, 0)).unwrap();
            analysis.set_token_attribute(&token, Attribute::Macro).unwrap();
            assert!(analysis.get_flag(left, Attribute::Macro).unwrap());
            assert!(analysis.get_flag(right, Attribute::Macro).unwrap());
            assert!(analysis.token_contains(&token, right));
        }

        #[test]
        fn current_project_is_registered() {
            let mut analysis = Analysis::new();
            let id = analysis.set_current_project("kernel").unwrap();
            assert_eq!(analysis.current_project(), Some(id));
            assert_eq!(analysis.register_project("kernel").unwrap(), id);
        }
    }

    mod diagnostics {
        use super::*;

        #[test]
        fn locate_uses_registered_path() {
            let mut analysis = Analysis::new();
            let a = analysis.intern_file("src/a.c").unwrap();
            let loc = analysis
                .locate(Position::new(a, 7), Some(b"int x;\nint y;"))
                .unwrap();
            assert_eq!(loc.to_string(), "src/a.c:2:1");
            let loc = analysis.locate(Position::ANONYMOUS, None).unwrap();
            assert_eq!(loc.file, "<anonymous>");
        }

        #[test]
        fn error_ceiling_comes_from_config() {
            let config = AnalysisConfig::default().with_max_errors(1);
            let mut analysis = Analysis::with_config(config).unwrap();
            analysis.report_error(None, "first").unwrap();
            assert!(matches!(
                analysis.report_error(None, "second"),
                Err(TokmapError::ErrorLimitExceeded { limit: 1 })
            ));
        }
    }
}
