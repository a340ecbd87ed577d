//! tokmap: replay unification scripts through the identity engine.
//!
//! The engine itself lives in `tokmap-core`; this crate adds the script
//! format that stands in for a C front end and the JSON output used by the
//! `tokmap` binary.

pub mod output;
pub mod script;
