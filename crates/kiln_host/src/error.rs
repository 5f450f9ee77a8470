//! Error types for host operations.

use std::path::PathBuf;

/// Errors raised by the [`ProgramHost`](crate::ProgramHost).
///
/// A missing file is not an error; reads report it as `None`.
#[derive(Debug, thiserror::Error)]
pub enum HostError {
    /// The underlying filesystem failed.
    #[error("I/O error on {path}: {source}")]
    Io {
        /// The path being accessed.
        path: PathBuf,
        /// The underlying I/O error.
        source: std::io::Error,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn display_io_error() {
        let err = HostError::Io {
            path: PathBuf::from("/ws/out/main.js"),
            source: std::io::Error::new(std::io::ErrorKind::PermissionDenied, "denied"),
        };
        assert_eq!(err.to_string(), "I/O error on /ws/out/main.js: denied");
    }
}
