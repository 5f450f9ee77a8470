//! Persisted builder state.
//!
//! The build info is a JSON document written through the host after the
//! emit-pending set drains. A fresh engine loads it on its first build so a new
//! process resumes where the last one stopped. Paths are stored relative to the
//! configuration directory with forward slashes.

use crate::builder::{BuilderState, FileState};
use kiln_common::{path, ContentHash, InternalError, KilnResult};
use kiln_host::ProgramHost;
use kiln_source::{FileId, FileRegistry};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

/// Version of the build-info layout. Documents with another version are ignored.
pub const BUILD_INFO_FORMAT: u32 = 1;

/// Serialized form of a [`BuilderState`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfo {
    /// Layout version.
    pub format: u32,
    /// Fingerprint of the compiler options.
    pub options_hash: ContentHash,
    /// Per-file state keyed by relative path.
    pub files: BTreeMap<String, BuildInfoFile>,
    /// Files still awaiting emission.
    #[serde(default)]
    pub pending_emit: Vec<String>,
}

/// Serialized state of one file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BuildInfoFile {
    /// Content hash of the text.
    pub version: ContentHash,
    /// Semantic signature.
    pub signature: ContentHash,
    /// Relative paths of dependencies.
    #[serde(default)]
    pub dependencies: Vec<String>,
    /// Fingerprint of the last emit, if tracked.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub emit_fingerprint: Option<ContentHash>,
}

impl BuildInfo {
    /// Captures `state`, naming files relative to `base_dir`.
    pub fn from_state(state: &BuilderState, registry: &FileRegistry, base_dir: &Path) -> Self {
        let key = |id: &FileId| registry.path(*id).map(|p| path::to_slash(&path::relative(base_dir, p)));
        let files = state
            .files
            .iter()
            .filter_map(|(id, file)| {
                let entry = BuildInfoFile {
                    version: file.version,
                    signature: file.signature,
                    dependencies: file.dependencies.iter().filter_map(key).collect(),
                    emit_fingerprint: state.emit_fingerprints.get(id).copied(),
                };
                Some((key(id)?, entry))
            })
            .collect();
        Self {
            format: BUILD_INFO_FORMAT,
            options_hash: state.options_hash,
            files,
            pending_emit: state.pending_emit.iter().filter_map(key).collect(),
        }
    }

    /// Rebuilds a builder state, interning every path into `registry`.
    ///
    /// The result is clean: it matches what is on disk.
    pub fn into_state(self, registry: &mut FileRegistry, base_dir: &Path) -> BuilderState {
        let mut intern = |key: &str| registry.intern(&path::resolve(base_dir, Path::new(key)));
        let mut state = BuilderState {
            options_hash: self.options_hash,
            ..BuilderState::default()
        };
        for (key, file) in self.files {
            let id = intern(&key);
            let dependencies: BTreeSet<FileId> =
                file.dependencies.iter().map(|d| intern(d)).collect();
            if let Some(fingerprint) = file.emit_fingerprint {
                state.emit_fingerprints.insert(id, fingerprint);
            }
            state.files.insert(
                id,
                FileState {
                    version: file.version,
                    signature: file.signature,
                    dependencies,
                },
            );
        }
        state.pending_emit = self.pending_emit.iter().map(|k| intern(k)).collect();
        state
    }

    /// Serializes to pretty JSON.
    pub fn to_json(&self) -> KilnResult<String> {
        serde_json::to_string_pretty(self)
            .map_err(|e| InternalError::new(format!("failed to serialize build info: {e}")))
    }

    /// Loads build info through the host.
    ///
    /// Any problem (missing file, read failure, malformed JSON, another
    /// layout version) yields `None` and the engine starts from scratch.
    pub fn load(host: &ProgramHost, path: &Path) -> Option<Self> {
        let text = match host.read_file(path) {
            Ok(Some(text)) => text,
            Ok(None) => {
                tracing::debug!(path = %path.display(), "no build info found");
                return None;
            }
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "failed to read build info, starting fresh");
                return None;
            }
        };
        let info: BuildInfo = match serde_json::from_str(&text) {
            Ok(info) => info,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "malformed build info, starting fresh");
                return None;
            }
        };
        if info.format != BUILD_INFO_FORMAT {
            tracing::warn!(
                path = %path.display(),
                found = info.format,
                expected = BUILD_INFO_FORMAT,
                "incompatible build info, starting fresh"
            );
            return None;
        }
        tracing::debug!(path = %path.display(), files = info.files.len(), "loaded build info");
        Some(info)
    }
}
