//! Core infrastructure for tokmap.
//!
//! This crate tracks identifier identity across a preprocessed C source tree:
//! - File registry and position addressing
//! - Equivalence classes of identical character runs, with split and merge
//! - Composite tokens built from fragments of several classes
//! - Unification of defining and referencing occurrences
//! - File dependency graph and per-class attribute flags
//! - Diagnostics, configuration, and JSON-friendly reports
//!
//! The entry point for callers is [`analysis::Analysis`], which owns every
//! registry for the duration of one analysis run.

pub mod analysis;
pub mod attr;
pub mod config;
pub mod diag;
pub mod eclass;
pub mod error;
pub mod fdep;
pub mod file;
pub mod position;
pub mod report;
pub mod text;
pub mod token;
pub mod types;
pub mod unify;

pub use analysis::Analysis;
pub use attr::{Attribute, AttributeId};
pub use config::AnalysisConfig;
pub use eclass::{EClass, EClassId};
pub use error::{ErrorCode, TokmapError, TokmapResult};
pub use file::FileId;
pub use position::Position;
pub use token::{Fragment, Token, TokenKind};
