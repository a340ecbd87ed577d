//! Identifier attributes and the project ledger.
//!
//! Every equivalence class carries an [`AttributeSet`]: a sparse,
//! default-false set of flags. The first [`BUILTIN_ATTRIBUTE_COUNT`] ids are
//! the fixed built-in [`Attribute`]s; one further id is allocated per
//! distinct project name by the [`AttributeLedger`].
//!
//! Because a set only stores the words it needs and reads past its end as
//! `false`, registering a project never touches existing classes.

use std::collections::HashMap;
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{TokmapError, TokmapResult};

/// Number of fixed built-in attributes; project ids start here.
pub const BUILTIN_ATTRIBUTE_COUNT: u16 = 14;

// ============================================================================
// AttributeId
// ============================================================================

/// Index of one attribute flag.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, PartialOrd, Ord)]
pub struct AttributeId(pub u16);

impl AttributeId {
    pub fn new(id: u16) -> Self {
        AttributeId(id)
    }

    pub fn is_builtin(self) -> bool {
        self.0 < BUILTIN_ATTRIBUTE_COUNT
    }
}

impl fmt::Display for AttributeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "attr_{}", self.0)
    }
}

// ============================================================================
// Built-in Attributes
// ============================================================================

/// Fixed identifier attributes.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[repr(u16)]
pub enum Attribute {
    /// Placeholder slot; never set.
    Unused = 0,
    ReadOnly,
    /// Tag for struct/union/enum.
    Tag,
    /// Member of struct/union.
    Member,
    Label,
    /// Ordinary identifier (object).
    Ordinary,
    Macro,
    UndefinedMacro,
    MacroArgument,
    FileScope,
    ProjectScope,
    Typedef,
    EnumConstant,
    Function,
}

impl Attribute {
    /// All built-ins in id order.
    pub const ALL: [Attribute; BUILTIN_ATTRIBUTE_COUNT as usize] = [
        Attribute::Unused,
        Attribute::ReadOnly,
        Attribute::Tag,
        Attribute::Member,
        Attribute::Label,
        Attribute::Ordinary,
        Attribute::Macro,
        Attribute::UndefinedMacro,
        Attribute::MacroArgument,
        Attribute::FileScope,
        Attribute::ProjectScope,
        Attribute::Typedef,
        Attribute::EnumConstant,
        Attribute::Function,
    ];

    pub fn id(self) -> AttributeId {
        AttributeId(self as u16)
    }

    pub fn from_id(id: AttributeId) -> Option<Attribute> {
        Attribute::ALL.get(id.0 as usize).copied()
    }

    /// Human-readable name.
    pub fn name(self) -> &'static str {
        match self {
            Attribute::Unused => "__attribute(__unused__)",
            Attribute::ReadOnly => "Read-only",
            Attribute::Tag => "Tag for struct/union/enum",
            Attribute::Member => "Member of struct/union",
            Attribute::Label => "Label",
            Attribute::Ordinary => "Ordinary identifier",
            Attribute::Macro => "Macro",
            Attribute::UndefinedMacro => "Undefined macro",
            Attribute::MacroArgument => "Macro argument",
            Attribute::FileScope => "File scope",
            Attribute::ProjectScope => "Project scope",
            Attribute::Typedef => "Typedef",
            Attribute::EnumConstant => "Enumeration constant",
            Attribute::Function => "Function",
        }
    }

    /// Short name, used in queries and scripts.
    pub fn short_name(self) -> &'static str {
        match self {
            Attribute::Unused => "__attribute(__unused__)",
            Attribute::ReadOnly => "ro",
            Attribute::Tag => "tag",
            Attribute::Member => "member",
            Attribute::Label => "label",
            Attribute::Ordinary => "obj",
            Attribute::Macro => "macro",
            Attribute::UndefinedMacro => "umacro",
            Attribute::MacroArgument => "macroarg",
            Attribute::FileScope => "fscope",
            Attribute::ProjectScope => "pscope",
            Attribute::Typedef => "typedef",
            Attribute::EnumConstant => "enumconst",
            Attribute::Function => "function",
        }
    }

    pub fn from_short_name(name: &str) -> Option<Attribute> {
        Attribute::ALL
            .iter()
            .copied()
            .find(|a| *a != Attribute::Unused && a.short_name() == name)
    }
}

impl From<Attribute> for AttributeId {
    fn from(attr: Attribute) -> Self {
        attr.id()
    }
}

// ============================================================================
// AttributeSet
// ============================================================================

/// Growable bit set of attribute flags; bits past the end read as `false`.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AttributeSet {
    words: Vec<u64>,
}

impl AttributeSet {
    pub fn new() -> Self {
        AttributeSet::default()
    }

    fn slot(id: AttributeId) -> (usize, u64) {
        let bit = id.0 as usize;
        (bit / 64, 1u64 << (bit % 64))
    }

    pub fn insert(&mut self, id: impl Into<AttributeId>) {
        let (word, mask) = Self::slot(id.into());
        if self.words.len() <= word {
            self.words.resize(word + 1, 0);
        }
        self.words[word] |= mask;
    }

    pub fn remove(&mut self, id: impl Into<AttributeId>) {
        let (word, mask) = Self::slot(id.into());
        if let Some(w) = self.words.get_mut(word) {
            *w &= !mask;
        }
    }

    pub fn contains(&self, id: impl Into<AttributeId>) -> bool {
        let (word, mask) = Self::slot(id.into());
        self.words.get(word).is_some_and(|w| w & mask != 0)
    }

    /// Bitwise OR with `other`.
    pub fn union_with(&mut self, other: &AttributeSet) {
        if self.words.len() < other.words.len() {
            self.words.resize(other.words.len(), 0);
        }
        for (w, o) in self.words.iter_mut().zip(&other.words) {
            *w |= *o;
        }
    }

    pub fn is_empty(&self) -> bool {
        self.words.iter().all(|w| *w == 0)
    }

    /// Set ids in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = AttributeId> + '_ {
        self.words.iter().enumerate().flat_map(|(i, &w)| {
            (0..64u16)
                .filter(move |bit| w & (1u64 << bit) != 0)
                .map(move |bit| AttributeId(i as u16 * 64 + bit))
        })
    }
}

// ============================================================================
// Project Ledger
// ============================================================================

/// Allocates project attributes and names every attribute id.
#[derive(Debug, Clone, Default)]
pub struct AttributeLedger {
    /// Project names in allocation order; index `i` has id `BUILTIN + i`.
    projects: Vec<String>,
    by_name: HashMap<String, AttributeId>,
    current: Option<AttributeId>,
}

impl AttributeLedger {
    pub fn new() -> Self {
        AttributeLedger::default()
    }

    /// Return the attribute of project `name`, allocating it on first use.
    pub fn register_project(&mut self, name: &str) -> AttributeId {
        if let Some(&id) = self.by_name.get(name) {
            return id;
        }
        let id = AttributeId(BUILTIN_ATTRIBUTE_COUNT + self.projects.len() as u16);
        self.projects.push(name.to_string());
        self.by_name.insert(name.to_string(), id);
        tracing::debug!(project = name, %id, "registered project attribute");
        id
    }

    /// Register `name` if needed and make it the current project.
    pub fn set_current_project(&mut self, name: &str) -> AttributeId {
        let id = self.register_project(name);
        self.current = Some(id);
        id
    }

    pub fn current_project(&self) -> Option<AttributeId> {
        self.current
    }

    pub fn project_id(&self, name: &str) -> Option<AttributeId> {
        self.by_name.get(name).copied()
    }

    /// Project attribute ids in allocation order.
    pub fn project_ids(&self) -> impl Iterator<Item = AttributeId> + '_ {
        (0..self.projects.len()).map(|i| AttributeId(BUILTIN_ATTRIBUTE_COUNT + i as u16))
    }

    /// Total width: built-ins plus registered projects.
    pub fn num_attributes(&self) -> usize {
        BUILTIN_ATTRIBUTE_COUNT as usize + self.projects.len()
    }

    pub fn contains(&self, id: AttributeId) -> bool {
        (id.0 as usize) < self.num_attributes()
    }

    pub fn check(&self, id: AttributeId) -> TokmapResult<()> {
        if self.contains(id) {
            Ok(())
        } else {
            Err(TokmapError::UnknownAttribute { id })
        }
    }

    pub fn attribute_name(&self, id: AttributeId) -> TokmapResult<&str> {
        match Attribute::from_id(id) {
            Some(attr) => Ok(attr.name()),
            None => self.project_name(id),
        }
    }

    pub fn attribute_short_name(&self, id: AttributeId) -> TokmapResult<&str> {
        match Attribute::from_id(id) {
            Some(attr) => Ok(attr.short_name()),
            None => self.project_name(id),
        }
    }

    /// Resolve a built-in short name or a registered project name.
    pub fn resolve(&self, name: &str) -> TokmapResult<AttributeId> {
        Attribute::from_short_name(name)
            .map(Attribute::id)
            .or_else(|| self.project_id(name))
            .ok_or_else(|| TokmapError::UnknownAttributeName {
                name: name.to_string(),
            })
    }

    fn project_name(&self, id: AttributeId) -> TokmapResult<&str> {
        id.0.checked_sub(BUILTIN_ATTRIBUTE_COUNT)
            .and_then(|i| self.projects.get(i as usize))
            .map(String::as_str)
            .ok_or(TokmapError::UnknownAttribute { id })
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    mod builtins {
        use super::*;

        #[test]
        fn ids_follow_declaration_order() {
            assert_eq!(Attribute::Unused.id(), AttributeId(0));
            assert_eq!(Attribute::ReadOnly.id(), AttributeId(1));
            assert_eq!(Attribute::Function.id(), AttributeId(13));
            for (i, attr) in Attribute::ALL.iter().enumerate() {
                assert_eq!(attr.id().0 as usize, i);
                assert_eq!(Attribute::from_id(attr.id()), Some(*attr));
            }
        }

        #[test]
        fn short_names_resolve() {
            assert_eq!(Attribute::from_short_name("obj"), Some(Attribute::Ordinary));
            assert_eq!(Attribute::from_short_name("umacro"), Some(Attribute::UndefinedMacro));
            assert_eq!(Attribute::from_short_name("nonsense"), None);
        }
    }

    mod attribute_set {
        use super::*;

        #[test]
        fn reads_past_end_are_false() {
            let set = AttributeSet::new();
            assert!(!set.contains(AttributeId(500)));
            assert!(set.is_empty());
        }

        #[test]
        fn insert_grows_and_remove_clears() {
            let mut set = AttributeSet::new();
            set.insert(AttributeId(130));
            set.insert(Attribute::Macro);
            assert!(set.contains(AttributeId(130)));
            assert!(set.contains(Attribute::Macro));
            set.remove(AttributeId(130));
            assert!(!set.contains(AttributeId(130)));
            assert_eq!(set.iter().collect::<Vec<_>>(), vec![Attribute::Macro.id()]);
        }

        #[test]
        fn union_is_bitwise_or() {
            let mut a = AttributeSet::new();
            a.insert(Attribute::Tag);
            let mut b = AttributeSet::new();
            b.insert(Attribute::Typedef);
            b.insert(AttributeId(70));
            a.union_with(&b);
            assert_eq!(
                a.iter().collect::<Vec<_>>(),
                vec![Attribute::Tag.id(), Attribute::Typedef.id(), AttributeId(70)]
            );
        }
    }

    mod ledger {
        use super::*;

        #[test]
        fn projects_allocate_after_builtins() {
            let mut ledger = AttributeLedger::new();
            let kernel = ledger.register_project("kernel");
            let libc = ledger.register_project("libc");
            assert_eq!(kernel, AttributeId(BUILTIN_ATTRIBUTE_COUNT));
            assert_eq!(libc, AttributeId(BUILTIN_ATTRIBUTE_COUNT + 1));
            assert_eq!(ledger.register_project("kernel"), kernel);
            assert_eq!(ledger.num_attributes(), BUILTIN_ATTRIBUTE_COUNT as usize + 2);
        }

        #[test]
        fn current_project_tracks_last_selection() {
            let mut ledger = AttributeLedger::new();
            assert_eq!(ledger.current_project(), None);
            let a = ledger.set_current_project("a");
            ledger.set_current_project("b");
            ledger.set_current_project("a");
            assert_eq!(ledger.current_project(), Some(a));
            assert_eq!(ledger.project_ids().count(), 2);
        }

        #[test]
        fn names_cover_builtins_and_projects() {
            let mut ledger = AttributeLedger::new();
            let id = ledger.register_project("tools");
            assert_eq!(ledger.attribute_name(Attribute::Label.id()).unwrap(), "Label");
            assert_eq!(ledger.attribute_short_name(Attribute::Ordinary.id()).unwrap(), "obj");
            assert_eq!(ledger.attribute_name(id).unwrap(), "tools");
            assert_eq!(ledger.attribute_short_name(id).unwrap(), "tools");
            assert_eq!(ledger.resolve("tools").unwrap(), id);
            assert_eq!(ledger.resolve("function").unwrap(), Attribute::Function.id());
        }

        #[test]
        fn unregistered_ids_are_rejected() {
            let ledger = AttributeLedger::new();
            let id = AttributeId(BUILTIN_ATTRIBUTE_COUNT);
            assert!(matches!(
                ledger.attribute_name(id),
                Err(TokmapError::UnknownAttribute { .. })
            ));
            assert!(ledger.check(id).is_err());
            assert!(ledger.resolve("nope").is_err());
        }
    }
}
