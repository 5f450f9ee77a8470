//! Initial-file classification over a metafile's output graph.
//!
//! Seeds are the outputs generated for declared entry points. From there the
//! closure follows static imports (`import-statement` and `import-rule`)
//! breadth-first. Outputs reached only through dynamic imports stay out: they
//! are lazy. External imports are recorded but never scanned, since the
//! bundle has nothing to scan for them.

use crate::metafile::Metafile;
use kiln_common::path;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet, VecDeque};
use std::path::{Path, PathBuf};

/// Initial files keyed by output path.
pub type InitialFiles = BTreeMap<String, InitialFileRecord>;

/// Decides whether a candidate reached through an import is kept.
///
/// Receives the record key and the record. Seeds are never filtered.
pub type InitialFilter = dyn Fn(&str, &InitialFileRecord) -> bool + Send + Sync;

/// What kind of file an initial output is.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum FileType {
    /// A JavaScript output.
    Script,
    /// A stylesheet output.
    Style,
}

impl FileType {
    /// `.css` outputs are styles, everything else is a script.
    pub fn from_path(path: &str) -> Self {
        if path.ends_with(".css") {
            FileType::Style
        } else {
            FileType::Script
        }
    }
}

/// One initial output file.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InitialFileRecord {
    /// Entry name, for entry point outputs only.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    /// Script or style.
    #[serde(rename = "type")]
    pub file_type: FileType,
    /// Whether the output was generated for a declared entry point.
    pub entrypoint: bool,
    /// Set for imports left out of the bundle.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub external: Option<bool>,
}

/// Returns the entry name of an output path: its base name up to the first
/// `.` (`polyfills.AB12CD34.js` gives `polyfills`).
pub fn entry_name(output: &str) -> String {
    let base = output.rsplit(['/', '\\']).next().unwrap_or(output);
    base.split('.').next().unwrap_or(base).to_string()
}

/// Computes the initial files of one pass.
///
/// Metafile paths and relative `entry_points` are resolved against
/// `working_dir`. Keys of the result are relative to `workspace_root`, except
/// for externals, which keep the specifier they were imported with.
#[tracing::instrument(level = "debug", skip_all, fields(outputs = metafile.outputs.len()))]
pub fn classify_initial_files(
    metafile: &Metafile,
    entry_points: &[PathBuf],
    working_dir: &Path,
    workspace_root: &Path,
    filter: Option<&InitialFilter>,
) -> InitialFiles {
    let entry_points: BTreeSet<PathBuf> = entry_points
        .iter()
        .map(|p| path::resolve(working_dir, p))
        .collect();
    let key_of = |output: &str| {
        let absolute = path::resolve(working_dir, Path::new(output));
        path::to_slash(&path::relative(workspace_root, &absolute))
    };

    let mut initial = InitialFiles::new();
    let mut queue: VecDeque<&str> = VecDeque::new();
    for (output, meta) in &metafile.outputs {
        let Some(entry) = &meta.entry_point else {
            continue;
        };
        if !entry_points.contains(&path::resolve(working_dir, Path::new(entry))) {
            continue;
        }
        initial.insert(
            key_of(output),
            InitialFileRecord {
                name: Some(entry_name(output)),
                file_type: FileType::from_path(output),
                entrypoint: true,
                external: None,
            },
        );
        queue.push_back(output);
    }

    while let Some(output) = queue.pop_front() {
        let Some(meta) = metafile.outputs.get(output) else {
            continue;
        };
        for import in meta.imports.iter().filter(|i| i.kind.is_static()) {
            let key = if import.external {
                import.path.clone()
            } else {
                key_of(&import.path)
            };
            if initial.contains_key(&key) {
                continue;
            }
            let record = InitialFileRecord {
                name: None,
                file_type: FileType::from_path(&import.path),
                entrypoint: false,
                external: import.external.then_some(true),
            };
            if filter.is_some_and(|keep| !keep(&key, &record)) {
                continue;
            }
            initial.insert(key, record);
            if !import.external {
                queue.push_back(&import.path);
            }
        }
    }

    tracing::debug!(initial = initial.len(), "classified initial files");
    initial
}

/// Merges `other` into `into` by key. Later records win, but a file that was
/// an entry point in either stays one.
pub fn merge_initial_files(into: &mut InitialFiles, other: InitialFiles) {
    for (key, mut record) in other {
        if into.get(&key).is_some_and(|prev| prev.entrypoint) {
            record.entrypoint = true;
        }
        into.insert(key, record);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metafile::{ImportKind, MetafileImport, MetafileOutput};

    fn import(path: &str, kind: ImportKind) -> MetafileImport {
        MetafileImport {
            path: path.to_string(),
            kind,
            external: false,
        }
    }

    fn output(entry: Option<&str>, imports: Vec<MetafileImport>) -> MetafileOutput {
        MetafileOutput {
            bytes: 0,
            entry_point: entry.map(str::to_string),
            imports,
        }
    }

    fn classify(metafile: &Metafile, entries: &[&str]) -> InitialFiles {
        let entries: Vec<PathBuf> = entries.iter().map(PathBuf::from).collect();
        classify_initial_files(metafile, &entries, Path::new("/ws"), Path::new("/ws"), None)
    }

    #[test]
    fn entry_names() {
        assert_eq!(entry_name("polyfills.AB12CD34.js"), "polyfills");
        assert_eq!(entry_name("dist/browser/main.js"), "main");
        assert_eq!(entry_name("styles"), "styles");
    }

    #[test]
    fn file_types() {
        assert_eq!(FileType::from_path("styles.css"), FileType::Style);
        assert_eq!(FileType::from_path("main.js"), FileType::Script);
        assert_eq!(FileType::from_path("main.css.map"), FileType::Script);
    }

    #[test]
    fn only_declared_entry_points_seed() {
        let mut metafile = Metafile::default();
        metafile
            .outputs
            .insert("dist/main.js".to_string(), output(Some("src/main.ts"), vec![]));
        metafile
            .outputs
            .insert("dist/worker.js".to_string(), output(Some("src/worker.ts"), vec![]));
        let initial = classify(&metafile, &["src/main.ts"]);
        assert_eq!(initial.keys().collect::<Vec<_>>(), vec!["dist/main.js"]);
        assert_eq!(initial["dist/main.js"].name.as_deref(), Some("main"));
    }

    #[test]
    fn style_rules_are_followed() {
        let mut metafile = Metafile::default();
        metafile.outputs.insert(
            "styles.css".to_string(),
            output(
                Some("src/styles.css"),
                vec![
                    import("theme.css", ImportKind::ImportRule),
                    import("font.woff", ImportKind::UrlToken),
                ],
            ),
        );
        metafile
            .outputs
            .insert("theme.css".to_string(), output(None, vec![]));
        let initial = classify(&metafile, &["/ws/src/styles.css"]);
        assert_eq!(initial.len(), 2);
        assert_eq!(initial["theme.css"].file_type, FileType::Style);
        assert!(!initial["theme.css"].entrypoint);
    }

    #[test]
    fn externals_are_recorded_not_scanned() {
        let mut metafile = Metafile::default();
        let mut external = import("@scope/pkg", ImportKind::ImportStatement);
        external.external = true;
        metafile
            .outputs
            .insert("main.js".to_string(), output(Some("main.ts"), vec![external]));
        metafile.outputs.insert(
            "@scope/pkg".to_string(),
            output(None, vec![import("never.js", ImportKind::ImportStatement)]),
        );
        let initial = classify(&metafile, &["main.ts"]);
        assert_eq!(initial["@scope/pkg"].external, Some(true));
        assert!(!initial.contains_key("never.js"));
    }

    #[test]
    fn filter_rejects_candidates_but_not_seeds() {
        let mut metafile = Metafile::default();
        metafile.outputs.insert(
            "main.js".to_string(),
            output(
                Some("main.ts"),
                vec![
                    import("a.js", ImportKind::ImportStatement),
                    import("b.css", ImportKind::ImportRule),
                ],
            ),
        );
        let scripts_only = |_: &str, record: &InitialFileRecord| record.file_type == FileType::Script;
        let initial = classify_initial_files(
            &metafile,
            &[PathBuf::from("main.ts")],
            Path::new("/ws"),
            Path::new("/ws"),
            Some(&scripts_only),
        );
        assert_eq!(initial.keys().collect::<Vec<_>>(), vec!["a.js", "main.js"]);
    }

    #[test]
    fn keys_are_relative_to_the_workspace_root() {
        let mut metafile = Metafile::default();
        metafile.outputs.insert(
            "main.js".to_string(),
            output(Some("src/main.ts"), vec![import("chunk.js", ImportKind::ImportStatement)]),
        );
        let initial = classify_initial_files(
            &metafile,
            &[PathBuf::from("/ws/app/src/main.ts")],
            Path::new("/ws/app"),
            Path::new("/ws"),
            None,
        );
        assert_eq!(
            initial.keys().collect::<Vec<_>>(),
            vec!["app/chunk.js", "app/main.js"]
        );
    }

    #[test]
    fn merge_keeps_entrypoint_sticky() {
        let record = |entrypoint| InitialFileRecord {
            name: None,
            file_type: FileType::Script,
            entrypoint,
            external: None,
        };
        let mut into = InitialFiles::from([("a.js".to_string(), record(true))]);
        merge_initial_files(
            &mut into,
            InitialFiles::from([
                ("a.js".to_string(), record(false)),
                ("b.js".to_string(), record(false)),
            ]),
        );
        assert!(into["a.js"].entrypoint);
        assert!(!into["b.js"].entrypoint);
    }

    #[test]
    fn record_wire_shape() {
        let record = InitialFileRecord {
            name: Some("main".to_string()),
            file_type: FileType::Script,
            entrypoint: true,
            external: None,
        };
        assert_eq!(
            serde_json::to_string(&record).unwrap(),
            r#"{"name":"main","type":"script","entrypoint":true}"#
        );
    }
}
