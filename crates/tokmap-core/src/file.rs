//! File registry: stable small integer ids for source file paths.
//!
//! Every distinct (lexically normalized) path gets the next sequential
//! [`FileId`]. Ids are never reused or removed while the registry lives, so
//! `path -> id` and `id -> path` stay bijective. Id 0 is reserved for the
//! anonymous file that hosts synthetic positions.

use std::collections::HashMap;
use std::fmt;
use std::path::{Component, Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::{TokmapError, TokmapResult};

/// Path reported for the anonymous file unless configured otherwise.
pub const ANONYMOUS_PATH: &str = "<anonymous>";

// ============================================================================
// FileId
// ============================================================================

/// Stable file identifier within one analysis run.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct FileId(pub u32);

impl FileId {
    /// The pre-registered anonymous file.
    pub const ANONYMOUS: FileId = FileId(0);

    /// Create a new file ID.
    pub fn new(id: u32) -> Self {
        FileId(id)
    }

    /// Get the raw index.
    pub fn index(self) -> usize {
        self.0 as usize
    }

    pub fn is_anonymous(self) -> bool {
        self == FileId::ANONYMOUS
    }
}

impl fmt::Display for FileId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "file_{}", self.0)
    }
}

// ============================================================================
// File Details
// ============================================================================

/// Details kept for each registered file.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileDetails {
    path: PathBuf,
    readonly: bool,
}

impl FileDetails {
    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn is_readonly(&self) -> bool {
        self.readonly
    }
}

// ============================================================================
// Registry
// ============================================================================

/// Append-only registry of source files.
#[derive(Debug, Clone)]
pub struct FileRegistry {
    /// Indexed by `FileId`; slot 0 is the anonymous file.
    files: Vec<FileDetails>,
    by_path: HashMap<PathBuf, FileId>,
}

impl Default for FileRegistry {
    fn default() -> Self {
        FileRegistry::with_anonymous_path(ANONYMOUS_PATH)
    }
}

impl FileRegistry {
    /// Create a registry holding only the anonymous file.
    pub fn new() -> Self {
        FileRegistry::default()
    }

    /// Create a registry whose anonymous file reports `path`.
    ///
    /// The anonymous path is not entered in the path index, so interning the
    /// same string later yields a regular file.
    pub fn with_anonymous_path(path: impl Into<PathBuf>) -> Self {
        FileRegistry {
            files: vec![FileDetails {
                path: path.into(),
                readonly: false,
            }],
            by_path: HashMap::new(),
        }
    }

    /// Return the id of `path`, allocating one on first sight.
    pub fn intern(&mut self, path: impl AsRef<Path>) -> FileId {
        let key = normalize_path(path.as_ref());
        if let Some(&id) = self.by_path.get(&key) {
            return id;
        }
        let id = FileId::new(self.files.len() as u32);
        self.files.push(FileDetails {
            path: key.clone(),
            readonly: false,
        });
        self.by_path.insert(key, id);
        tracing::trace!(%id, path = %self.files[id.index()].path.display(), "registered file");
        id
    }

    /// Look up a path without allocating.
    pub fn lookup(&self, path: impl AsRef<Path>) -> Option<FileId> {
        self.by_path.get(&normalize_path(path.as_ref())).copied()
    }

    pub fn details(&self, id: FileId) -> TokmapResult<&FileDetails> {
        self.files
            .get(id.index())
            .ok_or(TokmapError::UnknownFile { id })
    }

    pub fn path_of(&self, id: FileId) -> TokmapResult<&Path> {
        self.details(id).map(FileDetails::path)
    }

    pub fn set_readonly(&mut self, id: FileId, readonly: bool) -> TokmapResult<()> {
        let details = self
            .files
            .get_mut(id.index())
            .ok_or(TokmapError::UnknownFile { id })?;
        details.readonly = readonly;
        Ok(())
    }

    pub fn is_readonly(&self, id: FileId) -> TokmapResult<bool> {
        self.details(id).map(FileDetails::is_readonly)
    }

    /// All registered files ordered by path, excluding the anonymous file.
    pub fn all_files_sorted_by_path(&self) -> Vec<FileId> {
        let mut ids: Vec<FileId> = self.by_path.values().copied().collect();
        ids.sort_by(|a, b| {
            self.files[a.index()]
                .path
                .cmp(&self.files[b.index()].path)
                .then(a.cmp(b))
        });
        ids
    }

    /// Sort arbitrary file ids by path; unknown ids sort last.
    pub fn sort_by_path(&self, ids: &mut [FileId]) {
        ids.sort_by(|a, b| {
            let pa = self.files.get(a.index()).map(|d| &d.path);
            let pb = self.files.get(b.index()).map(|d| &d.path);
            match (pa, pb) {
                (Some(pa), Some(pb)) => pa.cmp(pb).then(a.cmp(b)),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => a.cmp(b),
            }
        });
    }

    /// Number of real (non-anonymous) files.
    pub fn len(&self) -> usize {
        self.files.len() - 1
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Drop `.` components so `./a.c` and `a.c` name the same file.
fn normalize_path(path: &Path) -> PathBuf {
    let normalized: PathBuf = path
        .components()
        .filter(|c| !matches!(c, Component::CurDir))
        .collect();
    if normalized.as_os_str().is_empty() {
        path.to_path_buf()
    } else {
        normalized
    }
}

// ============================================================================
// Tests
// ============================================================================
