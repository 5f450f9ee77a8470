//! Conversion of native diagnostics into user-facing messages.

use crate::diagnostic::Diagnostic;
use crate::message::{Location, Message, Note};
use kiln_common::path::to_slash;
use kiln_source::{SourceDb, Span};

/// Converts a native diagnostic into a [`Message`].
///
/// The text is prefixed with the diagnostic code. Related spans become
/// located notes and plain notes follow them. The original diagnostic is kept
/// in `detail`.
pub fn convert_diagnostic(diagnostic: &Diagnostic, sources: &SourceDb) -> Message {
    let mut notes: Vec<Note> = diagnostic
        .related
        .iter()
        .map(|related| Note {
            text: related.message.clone(),
            location: resolve_location(related.span, sources),
        })
        .collect();
    notes.extend(diagnostic.notes.iter().map(|text| Note {
        text: text.clone(),
        location: None,
    }));

    Message {
        text: format!("{}: {}", diagnostic.code, diagnostic.message),
        location: resolve_location(diagnostic.primary_span, sources),
        notes,
        detail: Some(diagnostic.clone()),
    }
}

/// Resolves a span into a single-line [`Location`].
///
/// The highlighted length is clipped to the end of the first line.
fn resolve_location(span: Span, sources: &SourceDb) -> Option<Location> {
    let resolved = sources.resolve_span(span)?;
    let line_text = sources.get(span.file)?.line_text(resolved.start_line);
    let column = resolved.start_col - 1;
    let remaining = (line_text.len() as u32).saturating_sub(column);
    Some(Location {
        file: to_slash(&resolved.file_path),
        line: resolved.start_line,
        column,
        length: span.len().min(remaining),
        line_text: line_text.to_string(),
    })
}
