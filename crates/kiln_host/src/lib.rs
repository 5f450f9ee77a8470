//! Filesystem-shaped primitives the compiler runs on.
//!
//! The [`ProgramHost`] is a fixed capability table wrapping a [`FileSystem`]
//! and a [`StyleProcessor`]. It owns no compilation state beyond the messages
//! and side output files that style processing accumulates until the engine
//! drains them.

#![warn(missing_docs)]

pub mod error;
pub mod fs;
pub mod host;
pub mod style;

pub use error::HostError;
pub use fs::{DiskFileSystem, FileSystem, MemoryFileSystem};
pub use host::{HostOptions, ProgramHost, ResourceContext};
pub use style::{PassthroughStyles, StyleOutput, StyleProcessor};
