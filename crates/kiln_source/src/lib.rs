//! Source file management, stable file identities, and span resolution.
//!
//! This crate provides the [`FileRegistry`] that hands out stable [`FileId`]s
//! per path for the lifetime of a compiler instance, the [`SourceDb`] that owns
//! the text of one program snapshot, and [`Span`]/[`ResolvedSpan`] for turning
//! byte offsets into line/column coordinates.

#![warn(missing_docs)]

pub mod registry;
pub mod resolved_span;
pub mod source_db;
pub mod source_file;
pub mod span;

pub use registry::{FileId, FileRegistry};
pub use resolved_span::ResolvedSpan;
pub use source_db::SourceDb;
pub use source_file::{SourceFile, SourceKind};
pub use span::Span;
