//! Option validation, global checks, and the options fingerprint.

use crate::program::Program;
use kiln_common::{ContentHash, InternalError, KilnResult};
use kiln_config::CompilationOptions;
use kiln_diagnostics::{Category, Diagnostic, DiagnosticCode};
use kiln_source::Span;
use std::path::PathBuf;

/// `build_info_file` set while `incremental` is off.
pub const BUILD_INFO_WITHOUT_INCREMENTAL: DiagnosticCode =
    DiagnosticCode::new(Category::Config, 5074);
/// A `paths` pattern with more than one `*`.
pub const INVALID_PATH_PATTERN: DiagnosticCode = DiagnosticCode::new(Category::Config, 5061);
/// The configuration lists no root files.
pub const NO_INPUTS: DiagnosticCode = DiagnosticCode::new(Category::Config, 18003);
/// A root file could not be read.
pub const FILE_NOT_FOUND: DiagnosticCode = DiagnosticCode::new(Category::Config, 6053);

/// Checks option combinations that load fine but cannot be honored.
pub fn option_diagnostics(options: &CompilationOptions) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if options.build_info_file.is_some() && !options.incremental {
        diagnostics.push(Diagnostic::error(
            BUILD_INFO_WITHOUT_INCREMENTAL,
            "Option 'build_info_file' cannot be specified without specifying option 'incremental'.",
            Span::DUMMY,
        ));
    }
    for pattern in options.paths.keys().filter(|p| p.matches('*').count() > 1) {
        diagnostics.push(Diagnostic::error(
            INVALID_PATH_PATTERN,
            format!("Pattern '{pattern}' can have at most one '*' character."),
            Span::DUMMY,
        ));
    }
    diagnostics
}

/// Checks that concern the build as a whole rather than one file.
pub fn global_diagnostics(
    program: &Program,
    options: &CompilationOptions,
    root_names: &[PathBuf],
) -> Vec<Diagnostic> {
    let mut diagnostics = Vec::new();
    if root_names.is_empty() {
        diagnostics.push(Diagnostic::error(
            NO_INPUTS,
            format!(
                "No inputs were found in config file '{}'.",
                options.config_path.display()
            ),
            Span::DUMMY,
        ));
    }
    for missing in program.missing_roots() {
        diagnostics.push(Diagnostic::error(
            FILE_NOT_FOUND,
            format!("File '{}' not found.", missing.display()),
            Span::DUMMY,
        ));
    }
    diagnostics
}

/// Fingerprint of the resolved options. Any change invalidates all prior
/// builder state.
pub fn options_hash(options: &CompilationOptions) -> KilnResult<ContentHash> {
    let json = serde_json::to_string(options)
        .map_err(|e| InternalError::new(format!("failed to fingerprint options: {e}")))?;
    Ok(ContentHash::from_text(&json))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn build_info_requires_incremental() {
        let mut options = CompilationOptions::new("/ws/kiln.toml");
        options.build_info_file = Some(PathBuf::from("/ws/b.json"));
        let diags = option_diagnostics(&options);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].code, BUILD_INFO_WITHOUT_INCREMENTAL);

        options.incremental = true;
        assert!(option_diagnostics(&options).is_empty());
    }

    #[test]
    fn multi_star_patterns_are_rejected() {
        let mut options = CompilationOptions::new("/ws/kiln.toml");
        options.paths.insert("@a/*/*".to_string(), vec!["x/*".to_string()]);
        options.paths.insert("@b/*".to_string(), vec!["y/*".to_string()]);
        let diags = option_diagnostics(&options);
        assert_eq!(diags.len(), 1);
        assert_eq!(diags[0].message, "Pattern '@a/*/*' can have at most one '*' character.");
    }

    #[test]
    fn empty_roots_are_reported() {
        let options = CompilationOptions::new("/ws/kiln.toml");
        let diags = global_diagnostics(&Program::default(), &options, &[]);
        assert_eq!(diags[0].code, NO_INPUTS);
        assert_eq!(diags[0].message, "No inputs were found in config file '/ws/kiln.toml'.");
    }

    #[test]
    fn hash_follows_options() {
        let a = CompilationOptions::new("/ws/kiln.toml");
        let mut b = a.clone();
        assert_eq!(options_hash(&a).unwrap(), options_hash(&b).unwrap());
        b.strict_templates = false;
        assert_ne!(options_hash(&a).unwrap(), options_hash(&b).unwrap());
    }
}
