//! The set of source files belonging to one program snapshot.

use crate::registry::FileId;
use crate::resolved_span::ResolvedSpan;
use crate::source_file::SourceFile;
use crate::span::Span;
use std::collections::BTreeMap;

/// The source database of one program snapshot, owning all loaded source
/// text and resolving [`Span`]s to line/column coordinates.
///
/// Iteration order is by [`FileId`], which is stable across snapshots.
#[derive(Debug, Clone, Default)]
pub struct SourceDb {
    files: BTreeMap<FileId, SourceFile>,
}

impl SourceDb {
    /// Creates an empty source database.
    pub fn new() -> Self {
        Self::default()
    }

    /// Adds a file, replacing any previous file with the same id.
    pub fn insert(&mut self, file: SourceFile) {
        self.files.insert(file.id, file);
    }

    /// Returns the [`SourceFile`] for the given [`FileId`], if present.
    pub fn get(&self, id: FileId) -> Option<&SourceFile> {
        self.files.get(&id)
    }

    /// Returns `true` if the id belongs to this snapshot.
    pub fn contains(&self, id: FileId) -> bool {
        self.files.contains_key(&id)
    }

    /// Iterates over all files in id order.
    pub fn iter(&self) -> impl Iterator<Item = &SourceFile> {
        self.files.values()
    }

    /// Returns the number of files.
    pub fn len(&self) -> usize {
        self.files.len()
    }

    /// Returns `true` if the database has no files.
    pub fn is_empty(&self) -> bool {
        self.files.is_empty()
    }

    /// Resolves a [`Span`] to human-readable line/column coordinates.
    ///
    /// Returns `None` for dummy spans and spans of files outside this snapshot.
    pub fn resolve_span(&self, span: Span) -> Option<ResolvedSpan> {
        let file = self.get(span.file)?;
        let (start_line, start_col) = file.line_col(span.start);
        let (end_line, end_col) = file.line_col(span.end.saturating_sub(1).max(span.start));
        Some(ResolvedSpan {
            file_path: file.path.clone(),
            start_line,
            start_col,
            end_line,
            end_col,
        })
    }
}
