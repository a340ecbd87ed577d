//! Unification of a defining and a referencing occurrence.
//!
//! Unifying two tokens asserts that they denote the same entity. Their
//! class decompositions are first made to agree fragment by fragment
//! ([`homogenize`]), then corresponding classes are merged pairwise and the
//! definer → referencer file edge is recorded.
//!
//! Merges only ever join runs of identical length: `foo` can be unified with
//! the first three characters of `fooBar` only after the `fooBar` class has
//! been split into `foo` and `Bar`.

use serde::Serialize;

use crate::analysis::Analysis;
use crate::eclass::{ClassEngine, EClassId};
use crate::error::{TokmapError, TokmapResult};
use crate::file::FileRegistry;
use crate::position::Position;
use crate::token::{self, Fragment, Token};

/// What a call to [`Analysis::unify`] changed.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct UnifyOutcome {
    /// Surviving class of each fragment pair, in token order.
    pub classes: Vec<EClassId>,
    /// Splits performed while homogenizing.
    pub splits: usize,
    /// Dependency edges that were not known before.
    pub new_edges: usize,
}

// ============================================================================
// Homogenization
// ============================================================================

/// Walks the characters claimed by a token, fragment by fragment.
#[derive(Debug)]
struct Cursor<'a> {
    parts: &'a [Fragment],
    index: usize,
    position: Position,
    remaining: u64,
}

impl<'a> Cursor<'a> {
    fn new(parts: &'a [Fragment]) -> Self {
        let mut cursor = Cursor {
            parts,
            index: 0,
            position: Position::ANONYMOUS,
            remaining: 0,
        };
        cursor.load();
        cursor
    }

    fn load(&mut self) {
        if let Some(part) = self.parts.get(self.index) {
            self.position = part.position;
            self.remaining = part.len;
        }
    }

    fn is_done(&self) -> bool {
        self.index >= self.parts.len()
    }

    fn advance(&mut self, step: u64) {
        self.position = self.position.offset_by(step);
        self.remaining -= step;
        if self.remaining == 0 {
            self.index += 1;
            self.load();
        }
    }
}

/// Make the class at the cursor start there and end no later than the
/// fragment does. Returns the resulting class length.
fn fit(
    engine: &mut ClassEngine,
    files: &FileRegistry,
    cursor: &Cursor<'_>,
    splits: &mut usize,
) -> TokmapResult<u64> {
    let covering = engine.covering(cursor.position);
    let id = engine.anchor(cursor.position, cursor.remaining, files)?;
    if covering.is_some_and(|(start, _)| start != cursor.position) {
        *splits += 1;
    }
    let len = engine.get(id)?.len();
    if len > cursor.remaining {
        engine.split(id, cursor.remaining)?;
        *splits += 1;
        return Ok(cursor.remaining);
    }
    Ok(len)
}

/// Split classes until both tokens decompose into runs of pairwise equal
/// length. Returns the number of splits performed.
///
/// A split made late in a walk can cut a class that an earlier step of the
/// same walk had already aligned, so walks repeat until one performs no
/// split. Each split adds a class over a finite set of runs, which bounds
/// the number of walks.
pub fn homogenize(
    engine: &mut ClassEngine,
    files: &FileRegistry,
    a: &Token,
    b: &Token,
) -> TokmapResult<usize> {
    let mut total = 0;
    loop {
        let splits = homogenize_pass(engine, files, a, b)?;
        if splits == 0 {
            return Ok(total);
        }
        total += splits;
    }
}

/// One walk over both tokens.
///
/// Both sides are walked in step. At each step the longer of the two current
/// classes is split at the length of the shorter; its right part becomes
/// the next current class of that side. The walk stops as soon as either
/// token is exhausted.
fn homogenize_pass(
    engine: &mut ClassEngine,
    files: &FileRegistry,
    a: &Token,
    b: &Token,
) -> TokmapResult<usize> {
    let mut splits = 0;
    let mut left = Cursor::new(a.parts());
    let mut right = Cursor::new(b.parts());
    while !left.is_done() && !right.is_done() {
        fit(engine, files, &left, &mut splits)?;
        let lb = fit(engine, files, &right, &mut splits)?;
        // Fitting the right side may have split a class the left side shares.
        let la = engine.len_at(left.position)?;
        tracing::trace!(left = %left.position, la, right = %right.position, lb, "homogenize step");
        if la > lb {
            let id = engine
                .class_starting_at(left.position)
                .ok_or(TokmapError::PartitionViolation {
                    position: left.position,
                })?;
            engine.split(id, lb)?;
            splits += 1;
        } else if lb > la {
            let id = engine
                .class_starting_at(right.position)
                .ok_or(TokmapError::PartitionViolation {
                    position: right.position,
                })?;
            engine.split(id, la)?;
            splits += 1;
        }
        let step = la.min(lb);
        left.advance(step);
        right.advance(step);
    }
    Ok(splits)
}

// ============================================================================
// Unify
// ============================================================================

impl Analysis {
    /// Unify the defining token `defining` with the referencing token
    /// `referencing`.
    ///
    /// On success every pair of corresponding characters belongs to one
    /// class and the edge from the defining file to the referencing file is
    /// recorded. Decompositions that still disagree after homogenization are
    /// an internal error and abort the analysis.
    pub fn unify(&mut self, defining: &Token, referencing: &Token) -> TokmapResult<UnifyOutcome> {
        self.ensure_running()?;
        let result = self.unify_tokens(defining, referencing);
        self.guard(result)
    }

    fn unify_tokens(&mut self, defining: &Token, referencing: &Token) -> TokmapResult<UnifyOutcome> {
        let splits = homogenize(&mut self.classes, &self.files, defining, referencing)?;
        let lhs = token::constituents(&mut self.classes, &self.files, defining)?;
        let rhs = token::constituents(&mut self.classes, &self.files, referencing)?;
        if lhs.len() != rhs.len() {
            return Err(TokmapError::FragmentMismatch {
                left: lhs.len(),
                right: rhs.len(),
                index: lhs.len().min(rhs.len()),
            });
        }
        if let Some(index) = lhs.iter().zip(&rhs).position(|(x, y)| x.len != y.len) {
            return Err(TokmapError::FragmentMismatch {
                left: lhs.len(),
                right: rhs.len(),
                index,
            });
        }

        let mut outcome = UnifyOutcome {
            splits,
            ..UnifyOutcome::default()
        };
        for (x, y) in lhs.iter().zip(&rhs) {
            // An earlier pair may have retired either class.
            let cx = self.resolve_start(x.position)?;
            let cy = self.resolve_start(y.position)?;
            self.classes.merge(cx, cy)?;
            if self.record_edge(x.position, y.position) {
                outcome.new_edges += 1;
            }
        }
        outcome.classes = lhs
            .iter()
            .map(|x| self.resolve_start(x.position))
            .collect::<TokmapResult<_>>()?;
        tracing::debug!(
            defining = %defining,
            referencing = %referencing,
            pairs = outcome.classes.len(),
            splits = outcome.splits,
            "unified tokens"
        );
        Ok(outcome)
    }

    fn resolve_start(&self, position: Position) -> TokmapResult<EClassId> {
        self.classes
            .class_starting_at(position)
            .ok_or(TokmapError::PartitionViolation { position })
    }

    fn record_edge(&mut self, definer: Position, referencer: Position) -> bool {
        if definer.file == referencer.file && !self.config.record_self_dependencies {
            return false;
        }
        self.deps.add_edge(definer.file, referencer.file)
    }
}

// ============================================================================
// Tests
// ============================================================================
