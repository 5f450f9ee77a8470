//! Source file representation with line-start indexing for fast line/column lookup.

use crate::registry::FileId;
use kiln_common::ContentHash;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

/// The role a file plays in a program.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
pub enum SourceKind {
    /// A script module that is analyzed and emitted (`.ts`).
    Script,
    /// A declaration-only module that is analyzed but never emitted (`.d.ts`).
    Declaration,
    /// A markup template referenced by a component.
    Template,
    /// A stylesheet referenced by a component.
    Style,
    /// A generated file that exists only to type-check another file's templates.
    TypeCheckShadow,
}

impl SourceKind {
    /// Classifies a path by its file name.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy())
            .unwrap_or_default();
        if name.ends_with(".d.ts") {
            SourceKind::Declaration
        } else if name.ends_with(".html") || name.ends_with(".htm") || name.ends_with(".svg") {
            SourceKind::Template
        } else if name.ends_with(".css")
            || name.ends_with(".scss")
            || name.ends_with(".sass")
            || name.ends_with(".less")
        {
            SourceKind::Style
        } else {
            SourceKind::Script
        }
    }

    /// Returns `true` for kinds that the module analyzer parses.
    pub fn is_module(self) -> bool {
        matches!(
            self,
            SourceKind::Script | SourceKind::Declaration | SourceKind::TypeCheckShadow
        )
    }
}

/// A source file loaded into a program snapshot.
///
/// Stores the file's content along with precomputed line-start offsets for
/// efficient line/column resolution during diagnostic conversion.
#[derive(Debug, Clone)]
pub struct SourceFile {
    /// The stable identifier of this file.
    pub id: FileId,
    /// The path of this file (or a synthetic path for generated files).
    pub path: PathBuf,
    /// The full text content of the file.
    pub content: String,
    /// What role the file plays in the program.
    pub kind: SourceKind,
    /// Byte offsets of each line start (the first entry is always 0).
    line_starts: Vec<u32>,
    /// Hash of the file content, used as the file's version marker.
    pub content_hash: ContentHash,
}

impl SourceFile {
    /// Creates a new `SourceFile` with precomputed line starts and content hash.
    pub fn new(id: FileId, path: PathBuf, content: String, kind: SourceKind) -> Self {
        let line_starts = compute_line_starts(&content);
        let content_hash = ContentHash::from_text(&content);
        Self {
            id,
            path,
            content,
            kind,
            line_starts,
            content_hash,
        }
    }

    /// Converts a byte offset into 1-indexed (line, column) coordinates.
    ///
    /// Offsets past the end of the file clamp to the last position.
    pub fn line_col(&self, byte_offset: u32) -> (u32, u32) {
        let byte_offset = byte_offset.min(self.content.len() as u32);
        let line_idx = match self.line_starts.binary_search(&byte_offset) {
            Ok(idx) => idx,
            Err(idx) => idx - 1,
        };
        let line = (line_idx as u32) + 1;
        let col = byte_offset - self.line_starts[line_idx] + 1;
        (line, col)
    }

    /// Returns the text of a 1-indexed line without its line terminator.
    pub fn line_text(&self, line: u32) -> &str {
        let Some(idx) = (line as usize).checked_sub(1) else {
            return "";
        };
        let Some(&start) = self.line_starts.get(idx) else {
            return "";
        };
        let end = self
            .line_starts
            .get(idx + 1)
            .map(|&next| next as usize)
            .unwrap_or(self.content.len());
        self.content[start as usize..end].trim_end_matches(['\n', '\r'])
    }

    /// Returns a substring of the file content between byte offsets.
    pub fn snippet(&self, start: u32, end: u32) -> &str {
        &self.content[start as usize..end as usize]
    }
}

/// Computes the byte offsets of each line start in the given content.
fn compute_line_starts(content: &str) -> Vec<u32> {
    let mut starts = vec![0u32];
    for (i, byte) in content.bytes().enumerate() {
        if byte == b'\n' {
            starts.push((i + 1) as u32);
        }
    }
    starts
}

#[cfg(test)]
mod tests {
    use super::*;

    fn make_file(content: &str) -> SourceFile {
        SourceFile::new(
            FileId::from_raw(0),
            PathBuf::from("main.ts"),
            content.to_string(),
            SourceKind::Script,
        )
    }

    #[test]
    fn line_starts_computation() {
        let f = make_file("abc\ndef\nghi");
        assert_eq!(f.line_starts, vec![0, 4, 8]);
    }

    #[test]
    fn line_col_resolution() {
        let f = make_file("abc\ndef\nghi");
        assert_eq!(f.line_col(0), (1, 1));
        assert_eq!(f.line_col(4), (2, 1));
        assert_eq!(f.line_col(5), (2, 2));
        assert_eq!(f.line_col(8), (3, 1));
    }

    #[test]
    fn line_col_clamps_past_end() {
        let f = make_file("ab");
        assert_eq!(f.line_col(99), (1, 3));
    }

    #[test]
    fn line_text_strips_terminators() {
        let f = make_file("first\r\nsecond\nthird");
        assert_eq!(f.line_text(1), "first");
        assert_eq!(f.line_text(2), "second");
        assert_eq!(f.line_text(3), "third");
        assert_eq!(f.line_text(4), "");
        assert_eq!(f.line_text(0), "");
    }

    #[test]
    fn empty_file() {
        let f = make_file("");
        assert_eq!(f.line_starts, vec![0]);
        assert_eq!(f.line_col(0), (1, 1));
    }

    #[test]
    fn content_hash_computed() {
        let f = make_file("test content");
        assert_eq!(f.content_hash, ContentHash::from_text("test content"));
    }

    #[test]
    fn kind_from_path() {
        assert_eq!(SourceKind::from_path(Path::new("a.ts")), SourceKind::Script);
        assert_eq!(
            SourceKind::from_path(Path::new("types.d.ts")),
            SourceKind::Declaration
        );
        assert_eq!(
            SourceKind::from_path(Path::new("app.component.html")),
            SourceKind::Template
        );
        assert_eq!(
            SourceKind::from_path(Path::new("app.component.scss")),
            SourceKind::Style
        );
    }
}
