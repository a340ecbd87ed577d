//! Equivalence classes of identical character runs.
//!
//! An [`EClass`] groups runs of `len` consecutive characters, each starting
//! at one of its member positions, that are known to denote the same
//! identifier. The [`ClassEngine`] keeps the classes in an arena addressed by
//! [`EClassId`] and indexes every member start, so that at any time each
//! indexed position is covered by exactly one class.
//!
//! # Identity
//!
//! A merge empties one arena slot. Its id becomes stale and every later use
//! fails with [`TokmapError::StaleClass`]; callers re-resolve through
//! [`ClassEngine::class_of`] after any split or merge instead of holding ids.
//! A split keeps the original id for the left part, so ids held across a
//! split still name the class that starts at the same positions.

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::ops::Bound;

use serde::{Deserialize, Serialize};

use crate::attr::{AttributeId, AttributeSet};
use crate::error::{TokmapError, TokmapResult};
use crate::file::{FileId, FileRegistry};
use crate::position::Position;

// ============================================================================
// EClassId
// ============================================================================

/// Arena index of an equivalence class.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct EClassId(pub u32);

impl EClassId {
    pub fn new(id: u32) -> Self {
        EClassId(id)
    }

    fn index(self) -> usize {
        self.0 as usize
    }
}

impl fmt::Display for EClassId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ec_{}", self.0)
    }
}

// ============================================================================
// EClass
// ============================================================================

/// One equivalence class.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EClass {
    len: u64,
    members: BTreeSet<Position>,
    /// True iff every member lies in a read-only file.
    readonly: bool,
    attributes: AttributeSet,
}

impl EClass {
    fn singleton(position: Position, len: u64, readonly: bool) -> Self {
        EClass {
            len,
            members: BTreeSet::from([position]),
            readonly,
            attributes: AttributeSet::new(),
        }
    }

    /// Length of every member run.
    pub fn len(&self) -> u64 {
        self.len
    }

    /// Never true for a class reachable from the engine.
    pub fn is_empty(&self) -> bool {
        self.len == 0
    }

    /// Number of occurrences.
    pub fn size(&self) -> usize {
        self.members.len()
    }

    /// An identifier that occurs only once.
    pub fn is_unused(&self) -> bool {
        self.members.len() == 1
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }

    /// Member start positions in order.
    pub fn members(&self) -> &BTreeSet<Position> {
        &self.members
    }

    /// Files holding at least one member.
    pub fn files(&self) -> BTreeSet<FileId> {
        self.members.iter().map(|p| p.file).collect()
    }

    pub fn attributes(&self) -> &AttributeSet {
        &self.attributes
    }

    pub fn has_attribute(&self, id: impl Into<AttributeId>) -> bool {
        self.attributes.contains(id)
    }

    fn covers(&self, start: Position, position: Position) -> bool {
        position
            .distance_from(start)
            .is_some_and(|d| d < self.len)
    }
}

// ============================================================================
// ClassEngine
// ============================================================================

/// Arena of classes plus the index of member starts.
#[derive(Debug, Default, Clone)]
pub struct ClassEngine {
    /// `None` marks a class absorbed by a merge.
    classes: Vec<Option<EClass>>,
    /// Member start → owning class.
    starts: BTreeMap<Position, EClassId>,
    live: usize,
}

impl ClassEngine {
    pub fn new() -> Self {
        ClassEngine::default()
    }

    // ========================================================================
    // Lookup
    // ========================================================================

    pub fn get(&self, id: EClassId) -> TokmapResult<&EClass> {
        self.classes
            .get(id.index())
            .and_then(Option::as_ref)
            .ok_or(TokmapError::StaleClass { class: id })
    }

    fn get_mut(&mut self, id: EClassId) -> TokmapResult<&mut EClass> {
        self.classes
            .get_mut(id.index())
            .and_then(Option::as_mut)
            .ok_or(TokmapError::StaleClass { class: id })
    }

    pub fn is_live(&self, id: EClassId) -> bool {
        self.get(id).is_ok()
    }

    /// Class whose run starts exactly at `position`.
    pub fn class_starting_at(&self, position: Position) -> Option<EClassId> {
        self.starts.get(&position).copied()
    }

    /// Member start and class of the run covering `position`, without creating
    /// anything.
    pub fn covering(&self, position: Position) -> Option<(Position, EClassId)> {
        let (&start, &id) = self.starts.range(..=position).next_back()?;
        let class = self.classes.get(id.index())?.as_ref()?;
        class.covers(start, position).then_some((start, id))
    }

    /// Class covering `position`, if any.
    pub fn class_at(&self, position: Position) -> Option<EClassId> {
        self.covering(position).map(|(_, id)| id)
    }

    /// Classes with a run overlapping `len` characters from `start`, in
    /// position order. Never creates or splits.
    pub fn classes_overlapping(&self, start: Position, len: u64) -> Vec<EClassId> {
        let end = start.offset_by(len);
        let mut out: Vec<EClassId> = self.class_at(start).into_iter().collect();
        if end <= start {
            return out;
        }
        out.extend(
            self.starts
                .range((Bound::Excluded(start), Bound::Excluded(end)))
                .map(|(_, &id)| id),
        );
        out
    }

    /// Length of the class whose run starts at `position`.
    pub fn len_at(&self, position: Position) -> TokmapResult<u64> {
        let id = self
            .class_starting_at(position)
            .ok_or(TokmapError::PartitionViolation { position })?;
        Ok(self.get(id)?.len)
    }

    /// Number of live classes.
    pub fn num_classes(&self) -> usize {
        self.live
    }

    /// Live classes in id order.
    pub fn live_classes(&self) -> impl Iterator<Item = (EClassId, &EClass)> + '_ {
        self.classes
            .iter()
            .enumerate()
            .filter_map(|(i, c)| c.as_ref().map(|c| (EClassId(i as u32), c)))
    }

    /// Run starts inside `file`, in offset order.
    pub fn starts_in(&self, file: FileId) -> impl Iterator<Item = (Position, EClassId)> + '_ {
        self.starts
            .range(Position::new(file, 0)..=Position::new(file, u64::MAX))
            .map(|(&p, &id)| (p, id))
    }

    /// Files of class `id` ordered by path.
    pub fn sorted_files(&self, id: EClassId, files: &FileRegistry) -> TokmapResult<Vec<FileId>> {
        let mut ids: Vec<FileId> = self.get(id)?.files().into_iter().collect();
        files.sort_by_path(&mut ids);
        Ok(ids)
    }

    // ========================================================================
    // Creation
    // ========================================================================

    /// Class covering `position`, creating a singleton of `requested_length`
    /// when none exists.
    ///
    /// A new class is shortened so it ends before the next run in the same
    /// file. An existing class is returned as is, even when its length
    /// differs from `requested_length` or `position` lies inside its run.
    pub fn class_of(
        &mut self,
        position: Position,
        requested_length: u64,
        files: &FileRegistry,
    ) -> TokmapResult<EClassId> {
        if requested_length == 0 {
            return Err(TokmapError::EmptyFragment { position });
        }
        if position.checked_offset_by(requested_length).is_none() {
            return Err(TokmapError::OffsetOverflow {
                position,
                len: requested_length,
            });
        }
        if let Some(id) = self.class_at(position) {
            return Ok(id);
        }
        let len = match self.next_start_after(position) {
            Some(next) => requested_length.min(next.offset - position.offset),
            None => requested_length,
        };
        let readonly = files.is_readonly(position.file)?;
        let id = EClassId(self.classes.len() as u32);
        self.classes
            .push(Some(EClass::singleton(position, len, readonly)));
        self.starts.insert(position, id);
        self.live += 1;
        tracing::trace!(%id, %position, len, "created class");
        Ok(id)
    }

    /// Like [`class_of`](Self::class_of), but guarantees that `position` is a
    /// member start, splitting the covering class when `position` falls
    /// inside one of its runs.
    pub fn anchor(
        &mut self,
        position: Position,
        requested_length: u64,
        files: &FileRegistry,
    ) -> TokmapResult<EClassId> {
        if let Some((start, id)) = self.covering(position) {
            if start == position {
                return Ok(id);
            }
            let at = position
                .distance_from(start)
                .ok_or(TokmapError::PartitionViolation { position })?;
            let (_, right) = self.split(id, at)?;
            return Ok(right);
        }
        self.class_of(position, requested_length, files)
    }

    fn next_start_after(&self, position: Position) -> Option<Position> {
        self.starts
            .range((Bound::Excluded(position), Bound::Unbounded))
            .next()
            .map(|(&p, _)| p)
            .filter(|p| p.file == position.file)
    }

    // ========================================================================
    // Split and Merge
    // ========================================================================

    /// Split every run of `id` after `at` characters.
    ///
    /// `id` keeps the left part (length `at`); the returned right class holds
    /// the remaining characters of each run. Flags are copied to both.
    pub fn split(&mut self, id: EClassId, at: u64) -> TokmapResult<(EClassId, EClassId)> {
        let right_id = EClassId(self.classes.len() as u32);
        let class = self.get(id)?;
        if at == 0 || at >= class.len {
            return Err(TokmapError::InvalidSplit {
                class: id,
                len: class.len,
                at,
            });
        }
        let right = EClass {
            len: class.len - at,
            members: class.members.iter().map(|p| p.offset_by(at)).collect(),
            readonly: class.readonly,
            attributes: class.attributes.clone(),
        };
        if let Some(&taken) = right.members.iter().find(|p| self.starts.contains_key(p)) {
            return Err(TokmapError::PartitionViolation { position: taken });
        }
        self.get_mut(id)?.len = at;
        for &member in &right.members {
            self.starts.insert(member, right_id);
        }
        tracing::debug!(class = %id, right = %right_id, at, right_len = right.len, "split class");
        self.classes.push(Some(right));
        self.live += 1;
        Ok((id, right_id))
    }

    /// Merge two classes of equal length into one.
    ///
    /// The class with more members survives and is returned; the other id
    /// becomes stale. Read-only is the AND of both, attributes the OR.
    pub fn merge(&mut self, a: EClassId, b: EClassId) -> TokmapResult<EClassId> {
        let (a_len, a_size) = {
            let class = self.get(a)?;
            (class.len, class.size())
        };
        if a == b {
            return Ok(a);
        }
        let (b_len, b_size) = {
            let class = self.get(b)?;
            (class.len, class.size())
        };
        if a_len != b_len {
            return Err(TokmapError::LengthMismatch {
                left: a,
                left_len: a_len,
                right: b,
                right_len: b_len,
            });
        }
        let (survivor, absorbed) = if b_size > a_size { (b, a) } else { (a, b) };
        let gone = self.classes[absorbed.index()]
            .take()
            .ok_or(TokmapError::StaleClass { class: absorbed })?;
        self.live -= 1;
        for &member in &gone.members {
            self.starts.insert(member, survivor);
        }
        let kept = self.get_mut(survivor)?;
        kept.members.extend(gone.members);
        kept.readonly &= gone.readonly;
        kept.attributes.union_with(&gone.attributes);
        tracing::debug!(%survivor, %absorbed, size = kept.size(), "merged classes");
        Ok(survivor)
    }

    // ========================================================================
    // Attributes
    // ========================================================================

    pub fn set_attribute(&mut self, id: EClassId, attr: impl Into<AttributeId>) -> TokmapResult<()> {
        self.get_mut(id)?.attributes.insert(attr);
        Ok(())
    }

    pub fn set_readonly(&mut self, id: EClassId, readonly: bool) -> TokmapResult<()> {
        self.get_mut(id)?.readonly = readonly;
        Ok(())
    }

    // ========================================================================
    // Invariants
    // ========================================================================

    /// Check that runs never overlap and that index and members agree.
    pub fn verify_partition(&self) -> TokmapResult<()> {
        let mut previous: Option<(Position, u64)> = None;
        for (&start, &id) in &self.starts {
            let class = self.get(id)?;
            if !class.members.contains(&start) {
                return Err(TokmapError::PartitionViolation { position: start });
            }
            if let Some((prev, prev_len)) = previous {
                if prev.file == start.file && prev.offset.saturating_add(prev_len) > start.offset {
                    return Err(TokmapError::PartitionViolation { position: start });
                }
            }
            previous = Some((start, class.len));
        }
        for (id, class) in self.live_classes() {
            for member in &class.members {
                if self.starts.get(member) != Some(&id) {
                    return Err(TokmapError::PartitionViolation { position: *member });
                }
            }
        }
        Ok(())
    }
}

// ============================================================================
// Tests
// ============================================================================
