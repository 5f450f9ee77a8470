//! Shared foundational types used across the kiln build pipeline.
//!
//! This crate provides content hashing, the internal error type, lexical
//! path helpers, and the [`OutputFile`] record shared by the compiler host and
//! the bundle classifier.

#![warn(missing_docs)]

pub mod hash;
pub mod output;
pub mod path;
pub mod result;

pub use hash::{ContentHash, ContentHasher};
pub use output::OutputFile;
pub use result::{InternalError, KilnResult};
