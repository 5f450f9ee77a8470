//! Output file records shared by resource processing and bundling.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// A file produced by a build step that should be written to the output tree.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OutputFile {
    /// Destination path of the file.
    pub path: PathBuf,
    /// Raw file contents.
    pub contents: Vec<u8>,
}

impl OutputFile {
    /// Creates an output file from text contents.
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            contents: text.as_bytes().to_vec(),
        }
    }

    /// Returns the contents as UTF-8 text, replacing invalid sequences.
    pub fn text(&self) -> String {
        String::from_utf8_lossy(&self.contents).into_owned()
    }
}
