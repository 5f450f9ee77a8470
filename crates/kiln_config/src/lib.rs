//! Parsing and validation of kiln project configuration files.
//!
//! This crate reads a TOML project file and produces strongly-typed
//! [`CompilationOptions`] plus the list of root files. A fixed set of options
//! is forced by the loader; overriding an explicit user value is reported as
//! a warning diagnostic rather than an error.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_configuration, parse_configuration, read_configuration, ParsedConfiguration};
pub use types::*;
