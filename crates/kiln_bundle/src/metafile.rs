//! The bundler metafile: inputs and outputs of one pass and the imports
//! between them.
//!
//! Paths are slash-separated and relative to the bundler's working
//! directory, as the bundler writes them.

use crate::error::BundleError;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// How one file refers to another.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ImportKind {
    /// The file is an entry point of the pass.
    EntryPoint,
    /// A static `import` statement.
    ImportStatement,
    /// A `require(...)` call.
    RequireCall,
    /// An `import(...)` expression.
    DynamicImport,
    /// A `require.resolve(...)` call.
    RequireResolve,
    /// A stylesheet `@import` rule.
    ImportRule,
    /// A CSS modules `composes ... from`.
    ComposesFrom,
    /// A stylesheet `url(...)` token.
    UrlToken,
}

impl ImportKind {
    /// Returns true for imports whose target loads together with the
    /// importer.
    pub fn is_static(self) -> bool {
        matches!(self, ImportKind::ImportStatement | ImportKind::ImportRule)
    }
}

/// One import edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafileImport {
    /// The imported path, or the bare specifier for externals.
    pub path: String,
    /// How the file is imported.
    pub kind: ImportKind,
    /// Set when the target was left out of the bundle.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub external: bool,
}

/// An input file of the pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MetafileInput {
    /// Size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// Imports of the input.
    #[serde(default)]
    pub imports: Vec<MetafileImport>,
}

/// An output file of the pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct MetafileOutput {
    /// Size in bytes.
    #[serde(default)]
    pub bytes: u64,
    /// The input this output was generated for, when it is an entry point.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub entry_point: Option<String>,
    /// Imports of the output.
    #[serde(default)]
    pub imports: Vec<MetafileImport>,
}

/// Inputs and outputs of one bundling pass.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Metafile {
    /// Input files by path.
    #[serde(default)]
    pub inputs: BTreeMap<String, MetafileInput>,
    /// Output files by path.
    #[serde(default)]
    pub outputs: BTreeMap<String, MetafileOutput>,
}

impl Metafile {
    /// Decodes a metafile from its JSON form.
    pub fn from_json(json: &str) -> Result<Self, BundleError> {
        serde_json::from_str(json).map_err(|e| BundleError::Metafile {
            reason: e.to_string(),
        })
    }

    /// Shallow merge: entries of `other` replace entries with the same key.
    pub fn merge(&mut self, other: Metafile) {
        self.inputs.extend(other.inputs);
        self.outputs.extend(other.outputs);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const JSON: &str = r#"{
        "inputs": { "src/main.ts": { "bytes": 10, "imports": [] } },
        "outputs": {
            "main.js": {
                "bytes": 120,
                "entryPoint": "src/main.ts",
                "imports": [
                    { "path": "chunk-1.js", "kind": "import-statement" },
                    { "path": "lazy.js", "kind": "dynamic-import" },
                    { "path": "@scope/pkg", "kind": "import-statement", "external": true }
                ]
            }
        }
    }"#;

    #[test]
    fn decodes_bundler_metafile() {
        let metafile = Metafile::from_json(JSON).unwrap();
        let main = &metafile.outputs["main.js"];
        assert_eq!(main.entry_point.as_deref(), Some("src/main.ts"));
        assert_eq!(main.imports.len(), 3);
        assert_eq!(main.imports[1].kind, ImportKind::DynamicImport);
        assert!(main.imports[2].external);
        assert!(!main.imports[0].external);
    }

    #[test]
    fn malformed_metafile_is_an_error() {
        let err = Metafile::from_json("{\"outputs\": 3}").unwrap_err();
        assert!(matches!(err, BundleError::Metafile { .. }));
    }

    #[test]
    fn static_kinds() {
        assert!(ImportKind::ImportStatement.is_static());
        assert!(ImportKind::ImportRule.is_static());
        assert!(!ImportKind::DynamicImport.is_static());
        assert!(!ImportKind::RequireCall.is_static());
        assert!(!ImportKind::UrlToken.is_static());
    }

    #[test]
    fn merge_replaces_by_key() {
        let mut a = Metafile::from_json(JSON).unwrap();
        let mut b = Metafile::default();
        b.outputs.insert("main.js".to_string(), MetafileOutput::default());
        b.outputs.insert("other.js".to_string(), MetafileOutput::default());
        a.merge(b);
        assert_eq!(a.outputs.len(), 2);
        assert!(a.outputs["main.js"].imports.is_empty());
        assert_eq!(a.inputs.len(), 1);
    }

    #[test]
    fn kinds_serialize_kebab_case() {
        let import = MetafileImport {
            path: "a.css".to_string(),
            kind: ImportKind::ImportRule,
            external: false,
        };
        assert_eq!(
            serde_json::to_string(&import).unwrap(),
            r#"{"path":"a.css","kind":"import-rule"}"#
        );
    }
}
