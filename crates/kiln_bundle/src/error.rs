//! Error types for bundling passes.

use kiln_diagnostics::Message;
use std::path::PathBuf;

/// Errors reported by a [`Bundler`](crate::Bundler).
///
/// [`Failure`](BundleError::Failure) is the bundler's own structured report
/// of errors in the bundled code. A context turns it into
/// [`BundleResult::Failure`](crate::BundleResult::Failure). Every other variant
/// means the pass itself broke and is returned to the caller as is.
#[derive(Debug, thiserror::Error)]
pub enum BundleError {
    /// The bundler ran and reported errors.
    #[error("bundling failed with {} error(s)", errors.len())]
    Failure {
        /// Errors reported by the bundler.
        errors: Vec<Message>,
        /// Warnings reported alongside the errors.
        warnings: Vec<Message>,
    },

    /// An I/O error occurred while the bundler read or wrote files.
    #[error("bundler I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },

    /// The bundler's metafile could not be decoded.
    #[error("failed to parse metafile: {reason}")]
    Metafile {
        /// Description of the parse failure.
        reason: String,
    },

    /// Any other bundler malfunction.
    #[error("bundler error: {0}")]
    Bundler(String),
}

impl BundleError {
    /// Creates a structured failure with no warnings.
    pub fn failure(errors: Vec<Message>) -> Self {
        Self::Failure {
            errors,
            warnings: Vec::new(),
        }
    }
}
