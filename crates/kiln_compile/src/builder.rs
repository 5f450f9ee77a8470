//! Incremental builder state: per-file versions, signatures and dependency
//! sets, the emit-pending set, and affected-set computation between builds.

use crate::program::Program;
use kiln_common::ContentHash;
use kiln_source::{FileId, SourceKind};
use std::collections::{BTreeMap, BTreeSet, VecDeque};

/// What the builder recorded about one file in the last build.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileState {
    /// Content hash of the file text.
    pub version: ContentHash,
    /// Semantic signature (export surface for modules, version otherwise).
    pub signature: ContentHash,
    /// Files this one imports or reads resources from.
    pub dependencies: BTreeSet<FileId>,
}

/// The next thing the builder wants emitted.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum EmitTarget {
    /// A script whose output is out of date.
    File(FileId),
    /// The persisted builder state itself.
    BuildInfo,
}

/// Builder state carried from one build to the next.
#[derive(Debug, Clone, Default)]
pub struct BuilderState {
    pub(crate) options_hash: ContentHash,
    pub(crate) files: BTreeMap<FileId, FileState>,
    pub(crate) pending_emit: BTreeSet<FileId>,
    pub(crate) emit_fingerprints: BTreeMap<FileId, ContentHash>,
    pub(crate) dirty: bool,
}

impl BuilderState {
    /// Computes the state for `program` and the set of files whose
    /// diagnostics or output may differ from the `prior` build.
    pub fn compute(
        program: &Program,
        options_hash: ContentHash,
        prior: Option<&BuilderState>,
    ) -> (BuilderState, BTreeSet<FileId>) {
        let files: BTreeMap<FileId, FileState> = program
            .files()
            .map(|file| {
                let state = FileState {
                    version: file.content_hash,
                    signature: program.signature(file.id).unwrap_or(file.content_hash),
                    dependencies: program.dependencies(file.id),
                };
                (file.id, state)
            })
            .collect();
        let is_script =
            |id: FileId| program.file(id).is_some_and(|f| f.kind == SourceKind::Script);

        let Some(prior) = prior.filter(|p| p.options_hash == options_hash) else {
            let affected: BTreeSet<FileId> = files.keys().copied().collect();
            let pending_emit = affected.iter().copied().filter(|id| is_script(*id)).collect();
            let state = BuilderState {
                options_hash,
                files,
                pending_emit,
                emit_fingerprints: BTreeMap::new(),
                dirty: true,
            };
            return (state, affected);
        };

        let mut affected = BTreeSet::new();
        let mut pending_emit: BTreeSet<FileId> = prior
            .pending_emit
            .iter()
            .copied()
            .filter(|id| files.contains_key(id))
            .collect();
        let mut changed_signatures = Vec::new();

        for (&id, state) in &files {
            match prior.files.get(&id) {
                None => {
                    affected.insert(id);
                    changed_signatures.push(id);
                    if is_script(id) {
                        pending_emit.insert(id);
                    }
                }
                Some(old) => {
                    if old.version != state.version {
                        affected.insert(id);
                        if is_script(id) {
                            pending_emit.insert(id);
                        }
                    }
                    if old.signature != state.signature {
                        changed_signatures.push(id);
                    }
                    if old.dependencies != state.dependencies {
                        affected.insert(id);
                    }
                }
            }
        }

        for (removed, _) in prior.files.iter().filter(|(id, _)| !files.contains_key(*id)) {
            affected.extend(
                prior
                    .files
                    .iter()
                    .filter(|(id, old)| old.dependencies.contains(removed) && files.contains_key(*id))
                    .map(|(id, _)| *id),
            );
        }

        let mut visited = BTreeSet::new();
        let mut queue: VecDeque<FileId> = changed_signatures.into_iter().collect();
        while let Some(id) = queue.pop_front() {
            if !visited.insert(id) {
                continue;
            }
            for (importer, through_reexport) in program.importers(id) {
                affected.insert(importer);
                if through_reexport {
                    queue.push_back(importer);
                }
            }
        }

        let emit_fingerprints = prior
            .emit_fingerprints
            .iter()
            .filter(|(id, _)| files.contains_key(*id))
            .map(|(id, fp)| (*id, *fp))
            .collect();
        let dirty = prior.dirty || !affected.is_empty() || files != prior.files;
        let state = BuilderState {
            options_hash,
            files,
            pending_emit,
            emit_fingerprints,
            dirty,
        };
        (state, affected)
    }

    /// Returns the next emission, or `None` when nothing is left.
    ///
    /// Pending scripts come first in id order. Once they are drained, the
    /// build info is requested once if anything changed and `persist` is set.
    pub fn next_emit(&self, persist: bool) -> Option<EmitTarget> {
        if let Some(id) = self.pending_emit.first() {
            return Some(EmitTarget::File(*id));
        }
        (persist && self.dirty).then_some(EmitTarget::BuildInfo)
    }

    /// Marks an emission returned by [`next_emit`](Self::next_emit) as done.
    pub fn complete_emit(&mut self, target: EmitTarget) {
        match target {
            EmitTarget::File(id) => {
                if self.pending_emit.remove(&id) {
                    self.dirty = true;
                }
            }
            EmitTarget::BuildInfo => self.dirty = false,
        }
    }

    /// Returns `true` if `id` still awaits emission.
    pub fn is_pending(&self, id: FileId) -> bool {
        self.pending_emit.contains(&id)
    }

    /// Returns the pending files in emission order.
    pub fn pending(&self) -> impl Iterator<Item = FileId> + '_ {
        self.pending_emit.iter().copied()
    }

    /// Returns the fingerprint recorded for the last emit of `id`.
    pub fn emit_fingerprint(&self, id: FileId) -> Option<ContentHash> {
        self.emit_fingerprints.get(&id).copied()
    }

    /// Records the fingerprint of an emit of `id`.
    pub fn record_emit_fingerprint(&mut self, id: FileId, fingerprint: ContentHash) {
        if self.emit_fingerprints.insert(id, fingerprint) != Some(fingerprint) {
            self.dirty = true;
        }
    }

    /// Returns the recorded state of `id`.
    pub fn file(&self, id: FileId) -> Option<&FileState> {
        self.files.get(&id)
    }

    /// Returns the options fingerprint this state was computed with.
    pub fn options_hash(&self) -> ContentHash {
        self.options_hash
    }

    /// Returns `true` if the state changed since it was last persisted.
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }
}
