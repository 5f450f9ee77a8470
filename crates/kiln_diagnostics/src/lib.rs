//! Native compiler diagnostics and their normalized wire form.
//!
//! Analysis passes produce [`Diagnostic`]s that point into a program snapshot
//! by [`Span`](kiln_source::Span). Before they leave the compiler they are
//! converted with [`convert_diagnostic`] into [`Message`]s carrying resolved
//! file/line/column locations, the same shape the bundler reports its own
//! errors and warnings in. The [`MessageSink`] accumulates messages from
//! collaborators (such as style processors) without aborting a build.

#![warn(missing_docs)]

pub mod code;
pub mod convert;
pub mod diagnostic;
pub mod message;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use convert::convert_diagnostic;
pub use diagnostic::{Diagnostic, RelatedSpan, Severity};
pub use message::{Location, Message, Note};
pub use sink::{CollectedMessages, MessageSink};
