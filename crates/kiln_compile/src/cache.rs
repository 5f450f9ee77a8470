//! Per-file diagnostic cache.

use kiln_diagnostics::Diagnostic;
use kiln_source::FileId;
use std::collections::BTreeMap;
use std::sync::Arc;

/// Semantic and template diagnostics last computed for one file.
#[derive(Debug, Clone, Default)]
pub struct CachedDiagnostics {
    /// Import and export checks.
    pub semantic: Arc<Vec<Diagnostic>>,
    /// Template checks; always empty under the JIT strategy.
    pub template: Arc<Vec<Diagnostic>>,
}

/// Diagnostics keyed by file, overwritten on reanalysis and evicted when a
/// file leaves the program.
#[derive(Debug, Clone, Default)]
pub struct DiagnosticCache {
    entries: BTreeMap<FileId, CachedDiagnostics>,
}

impl DiagnosticCache {
    /// Creates an empty cache.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the entry for `id`.
    pub fn get(&self, id: FileId) -> Option<&CachedDiagnostics> {
        self.entries.get(&id)
    }

    /// Stores or replaces the entry for `id`.
    pub fn insert(&mut self, id: FileId, entry: CachedDiagnostics) {
        self.entries.insert(id, entry);
    }

    /// Drops entries for which `keep` returns `false`.
    pub fn retain(&mut self, mut keep: impl FnMut(FileId) -> bool) {
        self.entries.retain(|id, _| keep(*id));
    }

    /// Returns the number of cached files.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use kiln_diagnostics::{Category, DiagnosticCode};
    use kiln_source::Span;

    fn entry(message: &str) -> CachedDiagnostics {
        let code = DiagnosticCode::new(Category::Semantic, 1);
        CachedDiagnostics {
            semantic: Arc::new(vec![Diagnostic::error(code, message, Span::DUMMY)]),
            template: Arc::default(),
        }
    }

    #[test]
    fn overwrite_and_evict() {
        let mut cache = DiagnosticCache::new();
        let a = FileId::from_raw(0);
        let b = FileId::from_raw(1);
        cache.insert(a, entry("first"));
        cache.insert(b, entry("other"));
        cache.insert(a, entry("second"));
        assert_eq!(cache.get(a).unwrap().semantic[0].message, "second");

        cache.retain(|id| id != b);
        assert_eq!(cache.len(), 1);
        assert!(cache.get(b).is_none());
    }
}
