//! Composite tokens.
//!
//! A [`Token`] is one lexical unit after preprocessing. Macro expansion and
//! token pasting can assemble it from several non-contiguous ranges, so it
//! is stored as an ordered list of [`Fragment`]s. The decomposition of a
//! token into current class runs is its [`constituents`].

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::eclass::{ClassEngine, EClassId};
use crate::error::{TokmapError, TokmapResult};
use crate::file::FileRegistry;
use crate::position::Position;

// ============================================================================
// Fragment
// ============================================================================

/// A contiguous run of `len` characters starting at `position`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Fragment {
    pub position: Position,
    pub len: u64,
}

impl Fragment {
    pub fn new(position: Position, len: u64) -> Self {
        Fragment { position, len }
    }

    /// First position after the run.
    pub fn end(&self) -> Position {
        self.position.offset_by(self.len)
    }
}

impl fmt::Display for Fragment {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{},l={}", self.position, self.len)
    }
}

// ============================================================================
// Token
// ============================================================================

/// Lexical category reported by the lexer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[serde(rename_all = "snake_case")]
pub enum TokenKind {
    #[default]
    Identifier,
    Keyword,
    PpNumber,
    CharLiteral,
    StringLiteral,
    Punctuator,
    Other,
}

/// One token: a non-empty fragment list plus its kind and spelling.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Token {
    kind: TokenKind,
    value: String,
    parts: Vec<Fragment>,
}

impl Token {
    /// Build a token, rejecting empty fragment lists, empty fragments, and
    /// fragments that run past the largest offset.
    pub fn new(kind: TokenKind, value: impl Into<String>, parts: Vec<Fragment>) -> TokmapResult<Self> {
        let value = value.into();
        if parts.is_empty() {
            return Err(TokmapError::EmptyToken { value });
        }
        if let Some(part) = parts.iter().find(|p| p.len == 0) {
            return Err(TokmapError::EmptyFragment {
                position: part.position,
            });
        }
        if let Some(part) = parts.iter().find(|p| p.position.checked_offset_by(p.len).is_none()) {
            return Err(TokmapError::OffsetOverflow {
                position: part.position,
                len: part.len,
            });
        }
        Ok(Token { kind, value, parts })
    }

    /// An identifier spelled in one contiguous run.
    pub fn identifier(value: impl Into<String>, position: Position) -> TokmapResult<Self> {
        let value = value.into();
        let len = value.len() as u64;
        Token::new(TokenKind::Identifier, value, vec![Fragment::new(position, len)])
    }

    pub fn kind(&self) -> TokenKind {
        self.kind
    }

    pub fn value(&self) -> &str {
        &self.value
    }

    pub fn parts(&self) -> &[Fragment] {
        &self.parts
    }

    /// Total characters claimed by all fragments.
    pub fn len(&self) -> u64 {
        self.parts.iter().map(|p| p.len).sum()
    }

    /// Always false: construction rejects empty tokens.
    pub fn is_empty(&self) -> bool {
        self.parts.is_empty()
    }

    /// Whether any character of this token currently belongs to `class`.
    pub fn contains(&self, engine: &ClassEngine, class: EClassId) -> bool {
        self.parts.iter().any(|part| {
            engine
                .classes_overlapping(part.position, part.len)
                .contains(&class)
        })
    }
}

impl fmt::Display for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:?}[{}]:", self.kind, self.value)?;
        for (i, part) in self.parts.iter().enumerate() {
            if i > 0 {
                write!(f, ",")?;
            }
            write!(f, " {part}")?;
        }
        Ok(())
    }
}

// ============================================================================
// Constituents
// ============================================================================

/// Decompose `token` into runs of the classes currently covering it.
///
/// Each output fragment starts at a class start and has length
/// `min(class length, remaining claimed length)`. Positions without a class
/// get one lazily; a fragment starting inside another run splits that run so
/// its start becomes a class boundary. The result reflects the engine at the
/// time of the call and must be recomputed after any split or merge.
pub fn constituents(
    engine: &mut ClassEngine,
    files: &FileRegistry,
    token: &Token,
) -> TokmapResult<Vec<Fragment>> {
    let mut out = Vec::with_capacity(token.parts.len());
    for part in &token.parts {
        let mut position = part.position;
        let mut remaining = part.len;
        while remaining > 0 {
            let id = engine.anchor(position, remaining, files)?;
            let len = engine.get(id)?.len().min(remaining);
            out.push(Fragment::new(position, len));
            position = position.offset_by(len);
            remaining -= len;
        }
    }
    tracing::trace!(token = %token, count = out.len(), "computed constituents");
    Ok(out)
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileId;

    fn setup() -> (ClassEngine, FileRegistry, FileId) {
        let mut files = FileRegistry::new();
        let a = files.intern("a.c");
        (ClassEngine::new(), files, a)
    }

    mod construction {
        use super::*;

        #[test]
        fn empty_token_is_rejected() {
            let err = Token::new(TokenKind::Identifier, "x", vec![]).unwrap_err();
            assert!(matches!(err, TokmapError::EmptyToken { .. }));
        }

        #[test]
        fn zero_length_fragment_is_rejected() {
            let p = Position::new(FileId::new(1), 0);
            let err = Token::new(TokenKind::Identifier, "x", vec![Fragment::new(p, 0)]).unwrap_err();
            assert!(matches!(err, TokmapError::EmptyFragment { .. }));
        }

        #[test]
        fn fragment_past_last_offset_is_rejected() {
            let p = Position::new(FileId::new(1), u64::MAX);
            let err = Token::identifier("x", p).unwrap_err();
            assert!(matches!(err, TokmapError::OffsetOverflow { len: 1, .. }));

            let last = Position::new(FileId::new(1), u64::MAX - 3);
            let token = Token::identifier("abc", last).unwrap();
            assert_eq!(token.parts()[0].end().offset, u64::MAX);
        }

        #[test]
        fn identifier_uses_spelling_length() {
            let p = Position::new(FileId::new(1), 4);
            let token = Token::identifier("counter", p).unwrap();
            assert_eq!(token.len(), 7);
            assert_eq!(token.parts()[0].end(), Position::new(FileId::new(1), 11));
            assert!(!token.is_empty());
        }
    }

    mod decomposition {
        use super::*;

        #[test]
        fn fresh_token_is_one_constituent() {
            let (mut engine, files, a) = setup();
            let token = Token::identifier("foo", Position::new(a, 0)).unwrap();
            let parts = constituents(&mut engine, &files, &token).unwrap();
            assert_eq!(parts, vec![Fragment::new(Position::new(a, 0), 3)]);
            assert_eq!(engine.num_classes(), 1);
        }

        #[test]
        fn follows_existing_class_boundaries() {
            let (mut engine, files, a) = setup();
            let id = engine.class_of(Position::new(a, 0), 6, &files).unwrap();
            engine.split(id, 3).unwrap();
            let token = Token::identifier("fooBar", Position::new(a, 0)).unwrap();
            let parts = constituents(&mut engine, &files, &token).unwrap();
            assert_eq!(
                parts,
                vec![
                    Fragment::new(Position::new(a, 0), 3),
                    Fragment::new(Position::new(a, 3), 3),
                ]
            );
        }

        #[test]
        fn contains_sees_every_covering_class() {
            let (mut engine, files, a) = setup();
            let id = engine.class_of(Position::new(a, 0), 6, &files).unwrap();
            let (_, right) = engine.split(id, 3).unwrap();
            let other = engine.class_of(Position::new(a, 20), 3, &files).unwrap();
            let token = Token::identifier("fooBar", Position::new(a, 0)).unwrap();
            assert!(token.contains(&engine, id));
            assert!(token.contains(&engine, right));
            assert!(!token.contains(&engine, other));
        }

        #[test]
        fn shorter_claim_is_truncated_not_split() {
            let (mut engine, files, a) = setup();
            let id = engine.class_of(Position::new(a, 0), 6, &files).unwrap();
            let token = Token::new(
                TokenKind::Identifier,
                "foo",
                vec![Fragment::new(Position::new(a, 0), 3)],
            )
            .unwrap();
            let parts = constituents(&mut engine, &files, &token).unwrap();
            assert_eq!(parts, vec![Fragment::new(Position::new(a, 0), 3)]);
            assert_eq!(engine.get(id).unwrap().len(), 6);
        }

        #[test]
        fn multi_fragment_token_spans_files() {
            let mut files = FileRegistry::new();
            let a = files.intern("a.c");
            let h = files.intern("paste.h");
            let mut engine = ClassEngine::new();
            let token = Token::new(
                TokenKind::Identifier,
                "foobar",
                vec![
                    Fragment::new(Position::new(a, 8), 3),
                    Fragment::new(Position::new(h, 40), 3),
                ],
            )
            .unwrap();
            let parts = constituents(&mut engine, &files, &token).unwrap();
            assert_eq!(parts.len(), 2);
            assert_eq!(parts[1].position.file, h);
        }
    }
}
