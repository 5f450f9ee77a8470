//! The normalized message shape shared by compiler and bundler reports.

use crate::diagnostic::Diagnostic;
use serde::{Deserialize, Serialize};

/// A resolved source location.
///
/// `line` is 1-indexed and `column` is 0-indexed, counted in bytes.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Location {
    /// Path of the file the location points into.
    pub file: String,
    /// Line number (1-indexed).
    pub line: u32,
    /// Column offset within the line (0-indexed).
    pub column: u32,
    /// Length of the highlighted range on the first line.
    pub length: u32,
    /// Full text of the line.
    pub line_text: String,
}

/// Additional context attached to a [`Message`].
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Note {
    /// The note text.
    pub text: String,
    /// Where the note points, if anywhere.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
}

/// A user-facing error or warning.
///
/// Compiler diagnostics are converted into this shape by
/// [`convert_diagnostic`](crate::convert_diagnostic), keeping the original in
/// `detail`. Messages from bundlers and style processors have no `detail`.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Message {
    /// The rendered message text.
    pub text: String,
    /// Primary location, if the message has one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub location: Option<Location>,
    /// Related notes.
    #[serde(default)]
    pub notes: Vec<Note>,
    /// The native diagnostic this message was converted from.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detail: Option<Diagnostic>,
}

impl Message {
    /// Creates a message with only text.
    pub fn text(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            location: None,
            notes: Vec::new(),
            detail: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn text_only_message_serializes_without_optional_fields() {
        let json = serde_json::to_string(&Message::text("boom")).unwrap();
        assert_eq!(json, r#"{"text":"boom","notes":[]}"#);
    }

    #[test]
    fn location_uses_camel_case() {
        let location = Location {
            file: "a.css".to_string(),
            line: 1,
            column: 0,
            length: 3,
            line_text: "a{}".to_string(),
        };
        let json = serde_json::to_string(&location).unwrap();
        assert!(json.contains("\"lineText\":\"a{}\""));
    }
}
