//! Native compiler diagnostics: severity, code, message and related spans.

use crate::code::DiagnosticCode;
use kiln_source::Span;
use serde::{Deserialize, Serialize};
use std::fmt;

/// Which bucket of [`CollectedMessages`](crate::CollectedMessages) a report lands in.
#[derive(Clone, Copy, PartialEq, Eq, Hash, Debug, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Severity {
    /// Fails the build.
    Error,
    /// Reported, but output is still produced.
    Warning,
}

impl Severity {
    /// Returns `true` for [`Severity::Error`].
    pub fn is_error(self) -> bool {
        self == Severity::Error
    }
}

impl fmt::Display for Severity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Severity::Error => "error",
            Severity::Warning => "warning",
        })
    }
}

/// A second location that explains the primary one, such as the opening
/// delimiter of an unclosed block. Converted into a located note.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct RelatedSpan {
    /// Where the related code is.
    pub span: Span,
    /// What it has to do with the diagnostic.
    pub message: String,
}

/// A native compiler diagnostic pointing into a program snapshot.
///
/// Diagnostics without a source location (configuration problems, global
/// errors) use [`Span::DUMMY`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Diagnostic {
    /// Error or warning.
    pub severity: Severity,
    /// The code identifying the kind of diagnostic.
    pub code: DiagnosticCode,
    /// The main diagnostic message.
    pub message: String,
    /// The primary source span where the issue was detected.
    pub primary_span: Span,
    /// Related source locations.
    pub related: Vec<RelatedSpan>,
    /// Explanatory footnotes without a location.
    pub notes: Vec<String>,
}

impl Diagnostic {
    /// Creates a diagnostic with an explicit severity.
    pub fn new(
        severity: Severity,
        code: DiagnosticCode,
        message: impl Into<String>,
        span: Span,
    ) -> Self {
        Self {
            severity,
            code,
            message: message.into(),
            primary_span: span,
            related: Vec::new(),
            notes: Vec::new(),
        }
    }

    /// Creates a new error diagnostic.
    pub fn error(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Error, code, message, span)
    }

    /// Creates a new warning diagnostic.
    pub fn warning(code: DiagnosticCode, message: impl Into<String>, span: Span) -> Self {
        Self::new(Severity::Warning, code, message, span)
    }

    /// Points at a related location.
    pub fn with_related(mut self, span: Span, message: impl Into<String>) -> Self {
        self.related.push(RelatedSpan {
            span,
            message: message.into(),
        });
        self
    }

    /// Adds a note to this diagnostic.
    pub fn with_note(mut self, note: impl Into<String>) -> Self {
        self.notes.push(note.into());
        self
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::code::Category;

    #[test]
    fn create_error() {
        let code = DiagnosticCode::new(Category::Semantic, 2307);
        let diag = Diagnostic::error(code, "cannot find module", Span::DUMMY);
        assert!(diag.severity.is_error());
        assert_eq!(diag.message, "cannot find module");
        assert_eq!(diag.code.to_string(), "E2307");
    }

    #[test]
    fn create_warning() {
        let code = DiagnosticCode::new(Category::Lint, 6133);
        let diag = Diagnostic::warning(code, "unused import", Span::DUMMY);
        assert_eq!(diag.severity, Severity::Warning);
        assert_eq!(diag.severity.to_string(), "warning");
    }

    #[test]
    fn builder_methods() {
        let code = DiagnosticCode::new(Category::Template, 2339);
        let diag = Diagnostic::error(code, "unknown binding", Span::DUMMY)
            .with_related(Span::DUMMY, "component declared here")
            .with_note("bindings must be class members");
        assert_eq!(diag.related[0].message, "component declared here");
        assert_eq!(diag.notes.len(), 1);
    }

    #[test]
    fn severity_serializes_lowercase() {
        assert_eq!(serde_json::to_string(&Severity::Error).unwrap(), "\"error\"");
    }
}
