//! Error types for the compilation engine.

use kiln_common::InternalError;
use kiln_config::ConfigError;
use kiln_host::HostError;

/// Errors returned by [`Compilation`](crate::Compilation) operations.
///
/// Problems in the user's sources are never reported this way; they are
/// diagnostics. These errors mean the engine itself could not proceed.
#[derive(Debug, thiserror::Error)]
pub enum CompileError {
    /// The configuration could not be read, parsed, or validated.
    #[error(transparent)]
    Configuration(#[from] ConfigError),

    /// An engine precondition was violated.
    #[error("assertion failed: {0}")]
    Assertion(String),

    /// The host failed to read or write a file.
    #[error(transparent)]
    Host(#[from] HostError),

    /// An internal invariant was violated.
    #[error(transparent)]
    Internal(#[from] InternalError),
}
