//! Text helpers for turning byte offsets into something a human can read.
//!
//! Lines and columns are **1-indexed**; byte offsets are **0-indexed**.
//! Columns count bytes.

use crate::token::Fragment;

/// Convert a byte offset to 1-indexed line and column.
///
/// If `offset` exceeds the content length, returns the position at the end of
/// the content.
pub fn byte_offset_to_position(content: &[u8], offset: u64) -> (u32, u32) {
    let offset = usize::try_from(offset).map_or(content.len(), |o| o.min(content.len()));
    let mut line = 1u32;
    let mut col = 1u32;

    for &byte in &content[..offset] {
        if byte == b'\n' {
            line += 1;
            col = 1;
        } else {
            col += 1;
        }
    }

    (line, col)
}

/// Bytes covered by `len` characters at `offset`, if all lie inside `content`.
pub fn slice(content: &[u8], offset: u64, len: u64) -> Option<&[u8]> {
    let start = usize::try_from(offset).ok()?;
    let end = start.checked_add(usize::try_from(len).ok()?)?;
    content.get(start..end)
}

/// Spelling of a fragment, decoded lossily as UTF-8.
pub fn fragment_text(content: &[u8], fragment: &Fragment) -> Option<String> {
    slice(content, fragment.position.offset, fragment.len)
        .map(|bytes| String::from_utf8_lossy(bytes).into_owned())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::file::FileId;
    use crate::position::Position;

    #[test]
    fn offsets_map_to_line_and_column() {
        let content = b"int a;\nint counter;\n";
        assert_eq!(byte_offset_to_position(content, 0), (1, 1));
        assert_eq!(byte_offset_to_position(content, 4), (1, 5));
        assert_eq!(byte_offset_to_position(content, 11), (2, 5));
    }

    #[test]
    fn offsets_past_end_clamp() {
        assert_eq!(byte_offset_to_position(b"ab\n", 99), (2, 1));
    }

    #[test]
    fn fragment_text_reads_spelling() {
        let content = b"int counter;";
        let fragment = Fragment::new(Position::new(FileId::new(1), 4), 7);
        assert_eq!(fragment_text(content, &fragment).as_deref(), Some("counter"));
        let outside = Fragment::new(Position::new(FileId::new(1), 10), 7);
        assert_eq!(fragment_text(content, &outside), None);
    }
}
