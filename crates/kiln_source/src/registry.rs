//! File identities: [`FileId`] and the [`FileRegistry`] that hands them out.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};

/// Index of a path in the [`FileRegistry`] of one compiler instance.
///
/// Ids are dense and allocated in first-seen order, so they double as the
/// emission order of the builder and as keys of the per-file caches. An id
/// outlives the snapshots that contain its file: a path that disappears and
/// comes back gets the same id.
#[derive(Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct FileId(u32);

impl FileId {
    /// Id of diagnostics that belong to no file (configuration, global checks).
    pub const DUMMY: FileId = FileId(u32::MAX);

    /// Wraps a registry index.
    pub fn from_raw(raw: u32) -> Self {
        Self(raw)
    }

    /// Position of this id in the registry's path table.
    pub fn index(self) -> usize {
        self.0 as usize
    }
}

/// Assigns a [`FileId`] to every path seen by a compiler instance.
///
/// The first request for a path allocates the next id; later requests return
/// the same id even if the file disappeared from intermediate snapshots.
#[derive(Debug, Default)]
pub struct FileRegistry {
    ids: HashMap<PathBuf, FileId>,
    paths: Vec<PathBuf>,
}

impl FileRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the id for `path`, allocating one on first use.
    pub fn intern(&mut self, path: &Path) -> FileId {
        if let Some(&id) = self.ids.get(path) {
            return id;
        }
        let id = FileId::from_raw(self.paths.len() as u32);
        self.paths.push(path.to_path_buf());
        self.ids.insert(path.to_path_buf(), id);
        id
    }

    /// Returns the id for `path` if it has been interned.
    pub fn lookup(&self, path: &Path) -> Option<FileId> {
        self.ids.get(path).copied()
    }

    /// Returns the path of an interned id.
    pub fn path(&self, id: FileId) -> Option<&Path> {
        self.paths.get(id.index()).map(PathBuf::as_path)
    }

    /// Returns the number of interned paths.
    pub fn len(&self) -> usize {
        self.paths.len()
    }

    /// Returns `true` if no path has been interned.
    pub fn is_empty(&self) -> bool {
        self.paths.is_empty()
    }
}
