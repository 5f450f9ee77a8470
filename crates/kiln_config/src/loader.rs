//! Project file loading, forced overrides, and validation.

use crate::error::ConfigError;
use crate::types::{AnnotationMode, CompilationOptions, CompilerSection, ProjectFile};
use kiln_common::path;
use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode};
use kiln_source::Span;
use std::io;
use std::path::{Path, PathBuf};

/// Reported when an explicit user value is replaced by a forced option.
pub const OPTION_OVERRIDDEN: DiagnosticCode = DiagnosticCode::new(Category::Config, 5110);

/// The result of reading a project file.
#[derive(Clone, Debug, PartialEq)]
pub struct ParsedConfiguration {
    /// Resolved compiler options, with forced overrides applied.
    pub options: CompilationOptions,
    /// Absolute paths of the root script files.
    pub root_names: Vec<PathBuf>,
    /// Non-fatal configuration diagnostics (overridden options).
    pub errors: Vec<Diagnostic>,
}

/// Loads a project file from disk.
pub fn load_configuration(config_path: &Path) -> Result<ParsedConfiguration, ConfigError> {
    read_configuration(config_path, &|p: &Path| std::fs::read_to_string(p))
}

/// Loads a project file through a caller-supplied reader.
///
/// The compiler host passes its own file reader so configuration files can be
/// served from an in-memory filesystem.
pub fn read_configuration(
    config_path: &Path,
    read_file: &dyn Fn(&Path) -> io::Result<String>,
) -> Result<ParsedConfiguration, ConfigError> {
    let content = read_file(config_path).map_err(|source| ConfigError::IoError {
        path: config_path.to_path_buf(),
        source,
    })?;
    parse_configuration(&content, config_path)
}

/// Parses and validates project file content that was read from `config_path`.
///
/// Useful for testing without filesystem dependencies.
pub fn parse_configuration(
    content: &str,
    config_path: &Path,
) -> Result<ParsedConfiguration, ConfigError> {
    let project: ProjectFile =
        toml::from_str(content).map_err(|e| ConfigError::ParseError(e.to_string()))?;
    validate_project(&project)?;

    let config_path = path::normalize(config_path);
    let config_dir = path::dirname(&config_path);
    let root_names = project
        .files
        .unwrap_or_default()
        .iter()
        .map(|f| path::resolve(&config_dir, Path::new(f)))
        .collect();

    let mut errors = Vec::new();
    let options = resolve_options(project.compiler, &config_path, &config_dir, &mut errors);

    Ok(ParsedConfiguration {
        options,
        root_names,
        errors,
    })
}

/// Checks required fields and value consistency before resolution.
fn validate_project(project: &ProjectFile) -> Result<(), ConfigError> {
    let Some(files) = &project.files else {
        return Err(ConfigError::MissingField("files".to_string()));
    };
    if files.iter().any(|f| f.trim().is_empty()) {
        return Err(ConfigError::ValidationError(
            "'files' entries must not be empty".to_string(),
        ));
    }
    for (pattern, targets) in &project.compiler.paths {
        if pattern.is_empty() {
            return Err(ConfigError::ValidationError(
                "'compiler.paths' keys must not be empty".to_string(),
            ));
        }
        if targets.is_empty() {
            return Err(ConfigError::ValidationError(format!(
                "'compiler.paths.\"{pattern}\"' must list at least one target"
            )));
        }
    }
    if let Some(file) = &project.compiler.build_info_file {
        if file.trim().is_empty() {
            return Err(ConfigError::ValidationError(
                "'compiler.build_info_file' must not be empty".to_string(),
            ));
        }
    }
    Ok(())
}

/// Resolves the raw compiler table into options, applying forced overrides.
fn resolve_options(
    section: CompilerSection,
    config_path: &Path,
    config_dir: &Path,
    errors: &mut Vec<Diagnostic>,
) -> CompilationOptions {
    let mut options = CompilationOptions::new(config_path);

    if let Some(target) = section.target {
        options.target = target;
    }
    options.base_url = section
        .base_url
        .map(|b| path::resolve(config_dir, Path::new(&b)));
    options.paths = section.paths;
    options.incremental = section.incremental.unwrap_or(false);
    options.build_info_file = section
        .build_info_file
        .map(|b| path::resolve(config_dir, Path::new(&b)));
    options.strict_templates = section.strict_templates.unwrap_or(true);

    if section.declaration == Some(true) {
        errors.push(overridden("declaration"));
    }
    if section.out_dir.is_some() {
        errors.push(overridden("out_dir"));
    }
    if section
        .annotations
        .is_some_and(|mode| mode != AnnotationMode::Decorators)
    {
        errors.push(overridden("annotations"));
    }
    if section.inline_resources == Some(true) {
        errors.push(overridden("inline_resources"));
    }

    options.declaration = false;
    options.out_dir = None;
    options.annotations = AnnotationMode::Decorators;
    options.inline_resources = false;
    options
}

fn overridden(option: &str) -> Diagnostic {
    Diagnostic::warning(
        OPTION_OVERRIDDEN,
        format!("option '{option}' is not supported and was overridden"),
        Span::DUMMY,
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::ScriptTarget;
    use kiln_diagnostics::Severity;
    use std::collections::HashMap;

    fn parse(toml: &str) -> Result<ParsedConfiguration, ConfigError> {
        parse_configuration(toml, Path::new("/ws/kiln.toml"))
    }

    #[test]
    fn parse_minimal_config() {
        let parsed = parse(r#"files = ["src/main.ts"]"#).unwrap();
        assert_eq!(parsed.root_names, vec![PathBuf::from("/ws/src/main.ts")]);
        assert_eq!(parsed.options.config_path, PathBuf::from("/ws/kiln.toml"));
        assert!(parsed.errors.is_empty());
    }

    #[test]
    fn parse_full_config() {
        let toml = r#"
files = ["src/main.ts", "./src/polyfills.ts"]

[compiler]
target = "esnext"
base_url = "src"
incremental = true
build_info_file = ".kiln/build.json"
strict_templates = false

[compiler.paths]
"@app/*" = ["app/*"]
"#;
        let parsed = parse(toml).unwrap();
        let options = &parsed.options;
        assert_eq!(options.target, ScriptTarget::EsNext);
        assert_eq!(options.base_url, Some(PathBuf::from("/ws/src")));
        assert!(options.incremental);
        assert_eq!(
            options.build_info_file,
            Some(PathBuf::from("/ws/.kiln/build.json"))
        );
        assert!(!options.strict_templates);
        assert_eq!(options.paths["@app/*"], vec!["app/*".to_string()]);
        assert_eq!(
            parsed.root_names,
            vec![
                PathBuf::from("/ws/src/main.ts"),
                PathBuf::from("/ws/src/polyfills.ts")
            ]
        );
    }

    #[test]
    fn forced_options_emit_warnings() {
        let toml = r#"
files = ["main.ts"]

[compiler]
declaration = true
out_dir = "dist"
annotations = "static-fields"
inline_resources = true
"#;
        let parsed = parse(toml).unwrap();
        assert_eq!(parsed.errors.len(), 4);
        assert!(parsed
            .errors
            .iter()
            .all(|d| d.severity == Severity::Warning && d.code == OPTION_OVERRIDDEN));
        assert!(parsed.errors[1].message.contains("'out_dir'"));
        assert!(!parsed.options.declaration);
        assert!(parsed.options.out_dir.is_none());
        assert_eq!(parsed.options.annotations, AnnotationMode::Decorators);
        assert!(!parsed.options.inline_resources);
    }

    #[test]
    fn matching_forced_values_are_silent() {
        let toml = r#"
files = ["main.ts"]

[compiler]
declaration = false
annotations = "decorators"
inline_resources = false
"#;
        assert!(parse(toml).unwrap().errors.is_empty());
    }

    #[test]
    fn missing_files_errors() {
        let err = parse("[compiler]\nincremental = true\n").unwrap_err();
        assert!(matches!(err, ConfigError::MissingField(ref f) if f == "files"));
    }

    #[test]
    fn empty_file_entry_errors() {
        let err = parse(r#"files = ["main.ts", " "]"#).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(_)));
    }

    #[test]
    fn empty_paths_targets_error() {
        let toml = r#"
files = ["main.ts"]

[compiler.paths]
"@lib/*" = []
"#;
        let err = parse(toml).unwrap_err();
        assert!(matches!(err, ConfigError::ValidationError(ref m) if m.contains("@lib/*")));
    }

    #[test]
    fn invalid_toml_errors() {
        let err = parse("this is not valid toml {{{}}}").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn unknown_target_errors() {
        let err = parse("files = []\n[compiler]\ntarget = \"es3\"\n").unwrap_err();
        assert!(matches!(err, ConfigError::ParseError(_)));
    }

    #[test]
    fn read_through_custom_reader() {
        let files: HashMap<PathBuf, String> = [(
            PathBuf::from("/mem/kiln.toml"),
            "files = [\"a.ts\"]".to_string(),
        )]
        .into_iter()
        .collect();
        let reader = |p: &Path| {
            files
                .get(p)
                .cloned()
                .ok_or_else(|| io::Error::new(io::ErrorKind::NotFound, "missing"))
        };
        let parsed = read_configuration(Path::new("/mem/kiln.toml"), &reader).unwrap();
        assert_eq!(parsed.root_names, vec![PathBuf::from("/mem/a.ts")]);

        let err = read_configuration(Path::new("/mem/other.toml"), &reader).unwrap_err();
        assert!(matches!(err, ConfigError::IoError { .. }));
    }

    #[test]
    fn load_from_disk() {
        let dir = tempfile::tempdir().unwrap();
        let config_path = dir.path().join("kiln.toml");
        std::fs::write(&config_path, "files = [\"src/main.ts\"]\n").unwrap();
        let parsed = load_configuration(&config_path).unwrap();
        assert_eq!(parsed.root_names, vec![dir.path().join("src/main.ts")]);
    }
}
