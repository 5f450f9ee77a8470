//! The style processing collaborator.

use kiln_common::OutputFile;
use kiln_diagnostics::Message;
use std::path::Path;

/// What a [`StyleProcessor`] produced for one stylesheet.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct StyleOutput {
    /// Processed CSS, or `None` to use the input verbatim.
    pub contents: Option<String>,
    /// Errors found while processing.
    pub errors: Vec<Message>,
    /// Warnings found while processing.
    pub warnings: Vec<Message>,
    /// Side outputs referenced by the stylesheet (fonts, images).
    pub output_files: Vec<OutputFile>,
}

impl StyleOutput {
    /// Creates an output with processed contents and nothing else.
    pub fn contents(contents: impl Into<String>) -> Self {
        Self {
            contents: Some(contents.into()),
            ..Self::default()
        }
    }
}

/// Bundles stylesheets referenced by or embedded in components.
///
/// Implementations report problems through [`StyleOutput`] rather than
/// failing; the host accumulates them so a broken stylesheet surfaces as a
/// message instead of aborting the build.
pub trait StyleProcessor: Send + Sync {
    /// Processes an external stylesheet read from `path`.
    fn process_file(&self, path: &Path, content: &str) -> StyleOutput;

    /// Processes an inline style embedded in `containing_file`.
    ///
    /// `order` is the position of the style within the component's `styles`.
    fn process_inline(&self, data: &str, containing_file: &Path, order: usize) -> StyleOutput;
}

/// A style processor that leaves every stylesheet unchanged.
#[derive(Debug, Default, Clone, Copy)]
pub struct PassthroughStyles;

impl StyleProcessor for PassthroughStyles {
    fn process_file(&self, _path: &Path, content: &str) -> StyleOutput {
        StyleOutput::contents(content)
    }

    fn process_inline(&self, _data: &str, _containing_file: &Path, _order: usize) -> StyleOutput {
        StyleOutput::default()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn passthrough_keeps_files_and_skips_inline() {
        let out = PassthroughStyles.process_file(Path::new("a.css"), "a { color: red }");
        assert_eq!(out.contents.as_deref(), Some("a { color: red }"));
        let inline = PassthroughStyles.process_inline("b {}", Path::new("a.ts"), 0);
        assert!(inline.contents.is_none());
        assert!(inline.errors.is_empty());
    }
}
