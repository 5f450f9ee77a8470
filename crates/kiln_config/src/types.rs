//! Configuration types: the raw TOML shape and the resolved options.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::PathBuf;

/// The raw project file as written by the user.
///
/// Every compiler option is optional here so the loader can tell an explicit
/// value apart from a default when applying forced overrides.
#[derive(Debug, Default, Deserialize)]
pub struct ProjectFile {
    /// Root script files, relative to the configuration file's directory.
    #[serde(default)]
    pub files: Option<Vec<String>>,
    /// Compiler option table.
    #[serde(default)]
    pub compiler: CompilerSection,
}

/// The `[compiler]` table of a project file.
#[derive(Debug, Default, Deserialize)]
pub struct CompilerSection {
    /// Language level of the emitted output.
    pub target: Option<ScriptTarget>,
    /// Base directory for non-relative module specifiers.
    pub base_url: Option<String>,
    /// Module specifier aliases (`"@app/*" = ["src/app/*"]`).
    #[serde(default)]
    pub paths: BTreeMap<String, Vec<String>>,
    /// Whether incremental state is persisted between processes.
    pub incremental: Option<bool>,
    /// Where the incremental state blob is written.
    pub build_info_file: Option<String>,
    /// Whether component templates are type-checked.
    pub strict_templates: Option<bool>,
    /// Declaration output (forced off).
    pub declaration: Option<bool>,
    /// Separate output directory (forced unset).
    pub out_dir: Option<String>,
    /// How decorators are lowered (forced to decorators).
    pub annotations: Option<AnnotationMode>,
    /// Compiler-driven resource inlining (forced off).
    pub inline_resources: Option<bool>,
}

/// ECMAScript language level of the emitted output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScriptTarget {
    /// ES2020.
    Es2020,
    /// ES2022.
    #[default]
    Es2022,
    /// The latest supported syntax.
    EsNext,
}

/// How class decorators are represented in the output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum AnnotationMode {
    /// Decorators are kept as decorator calls.
    #[default]
    Decorators,
    /// Decorators are lowered to static class fields.
    StaticFields,
}

/// Fully resolved compiler options for one build.
///
/// Paths are absolute (resolved against the configuration directory). The
/// value is immutable for the duration of a build; its serialized form is
/// fingerprinted to detect option changes between builds.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompilationOptions {
    /// Path of the configuration file these options were read from.
    pub config_path: PathBuf,
    /// Language level of the emitted output.
    pub target: ScriptTarget,
    /// Base directory for `paths` aliases.
    pub base_url: Option<PathBuf>,
    /// Module specifier aliases.
    pub paths: BTreeMap<String, Vec<String>>,
    /// Whether incremental state is persisted between processes.
    pub incremental: bool,
    /// Explicit location of the incremental state blob.
    pub build_info_file: Option<PathBuf>,
    /// Whether component templates are type-checked.
    pub strict_templates: bool,
    /// Declaration output.
    pub declaration: bool,
    /// Separate output directory.
    pub out_dir: Option<PathBuf>,
    /// How decorators are lowered.
    pub annotations: AnnotationMode,
    /// Compiler-driven resource inlining.
    pub inline_resources: bool,
}

impl CompilationOptions {
    /// Creates default options for a configuration file at `config_path`.
    pub fn new(config_path: impl Into<PathBuf>) -> Self {
        Self {
            config_path: config_path.into(),
            target: ScriptTarget::default(),
            base_url: None,
            paths: BTreeMap::new(),
            incremental: false,
            build_info_file: None,
            strict_templates: true,
            declaration: false,
            out_dir: None,
            annotations: AnnotationMode::Decorators,
            inline_resources: false,
        }
    }

    /// Returns the directory containing the configuration file.
    pub fn config_dir(&self) -> PathBuf {
        kiln_common::path::dirname(&self.config_path)
    }

    /// Returns where the incremental state blob is written, if persistence is on.
    ///
    /// Defaults to `<config stem>.buildinfo.json` next to the configuration file.
    pub fn build_info_path(&self) -> Option<PathBuf> {
        if !self.incremental {
            return None;
        }
        if let Some(explicit) = &self.build_info_file {
            return Some(explicit.clone());
        }
        let stem = self
            .config_path
            .file_stem()
            .map(|s| s.to_string_lossy().into_owned())
            .unwrap_or_else(|| "kiln".to_string());
        Some(self.config_dir().join(format!("{stem}.buildinfo.json")))
    }

    /// Returns the directory non-relative specifiers are resolved against.
    pub fn module_root(&self) -> PathBuf {
        self.base_url.clone().unwrap_or_else(|| self.config_dir())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults() {
        let options = CompilationOptions::new("/ws/kiln.toml");
        assert_eq!(options.target, ScriptTarget::Es2022);
        assert_eq!(options.annotations, AnnotationMode::Decorators);
        assert!(options.strict_templates);
        assert!(!options.incremental);
        assert_eq!(options.config_dir(), PathBuf::from("/ws"));
    }

    #[test]
    fn build_info_path_requires_incremental() {
        let mut options = CompilationOptions::new("/ws/kiln.toml");
        assert!(options.build_info_path().is_none());
        options.incremental = true;
        assert_eq!(
            options.build_info_path(),
            Some(PathBuf::from("/ws/kiln.buildinfo.json"))
        );
        options.build_info_file = Some(PathBuf::from("/ws/.kiln/state.json"));
        assert_eq!(
            options.build_info_path(),
            Some(PathBuf::from("/ws/.kiln/state.json"))
        );
    }

    #[test]
    fn module_root_prefers_base_url() {
        let mut options = CompilationOptions::new("/ws/kiln.toml");
        assert_eq!(options.module_root(), PathBuf::from("/ws"));
        options.base_url = Some(PathBuf::from("/ws/src"));
        assert_eq!(options.module_root(), PathBuf::from("/ws/src"));
    }

    #[test]
    fn target_serde_names() {
        let json = serde_json::to_string(&ScriptTarget::EsNext).unwrap();
        assert_eq!(json, "\"esnext\"");
        let mode: AnnotationMode = serde_json::from_str("\"static-fields\"").unwrap();
        assert_eq!(mode, AnnotationMode::StaticFields);
    }
}
