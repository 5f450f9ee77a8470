//! The compiler host capability table.

use crate::error::HostError;
use crate::fs::{DiskFileSystem, FileSystem};
use crate::style::{PassthroughStyles, StyleOutput, StyleProcessor};
use kiln_common::{path, OutputFile};
use kiln_diagnostics::{CollectedMessages, MessageSink, Severity};
use kiln_source::SourceKind;
use std::collections::BTreeMap;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};

/// Caller-supplied configuration for a [`ProgramHost`].
#[derive(Clone)]
pub struct HostOptions {
    /// Reads of a key path are served from the mapped path instead.
    pub file_replacements: BTreeMap<PathBuf, PathBuf>,
    /// The filesystem all reads and writes go through.
    pub file_system: Arc<dyn FileSystem>,
    /// The collaborator that bundles stylesheets.
    pub style_processor: Arc<dyn StyleProcessor>,
}

impl HostOptions {
    /// Creates options over `file_system` with passthrough styles and no replacements.
    pub fn new(file_system: Arc<dyn FileSystem>) -> Self {
        Self {
            file_replacements: BTreeMap::new(),
            file_system,
            style_processor: Arc::new(PassthroughStyles),
        }
    }

    /// Replaces the style processor.
    pub fn with_style_processor(mut self, processor: Arc<dyn StyleProcessor>) -> Self {
        self.style_processor = processor;
        self
    }

    /// Adds a file replacement.
    pub fn with_replacement(mut self, from: impl Into<PathBuf>, to: impl Into<PathBuf>) -> Self {
        self.file_replacements.insert(from.into(), to.into());
        self
    }
}

impl Default for HostOptions {
    fn default() -> Self {
        Self::new(Arc::new(DiskFileSystem))
    }
}

impl std::fmt::Debug for HostOptions {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("HostOptions")
            .field("file_replacements", &self.file_replacements)
            .finish_non_exhaustive()
    }
}

/// Describes a resource passed to [`ProgramHost::transform_resource`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResourceContext {
    /// The kind of resource.
    pub kind: SourceKind,
    /// The script file the resource belongs to.
    pub containing_file: PathBuf,
    /// The resource's own file, or `None` for inline text.
    pub resource_file: Option<PathBuf>,
    /// Position of the resource within its component property.
    pub order: usize,
}

/// Filesystem-shaped primitives used by the compiler.
///
/// Style processing problems and side output files accumulate inside the host
/// until drained with [`take_messages`](Self::take_messages) and
/// [`take_output_files`](Self::take_output_files).
pub struct ProgramHost {
    fs: Arc<dyn FileSystem>,
    replacements: BTreeMap<PathBuf, PathBuf>,
    styles: Arc<dyn StyleProcessor>,
    messages: MessageSink,
    output_files: Mutex<Vec<OutputFile>>,
}

impl ProgramHost {
    /// Creates a host from caller options.
    pub fn new(options: &HostOptions) -> Self {
        let replacements = options
            .file_replacements
            .iter()
            .map(|(from, to)| (path::normalize(from), path::normalize(to)))
            .collect();
        Self {
            fs: Arc::clone(&options.file_system),
            replacements,
            styles: Arc::clone(&options.style_processor),
            messages: MessageSink::new(),
            output_files: Mutex::new(Vec::new()),
        }
    }

    fn remap<'a>(&'a self, path: &'a Path) -> &'a Path {
        self.replacements
            .get(path)
            .map(PathBuf::as_path)
            .unwrap_or(path)
    }

    /// Reads a file as text, applying file replacements.
    ///
    /// Returns `Ok(None)` if the file does not exist.
    pub fn read_file(&self, path: &Path) -> Result<Option<String>, HostError> {
        let actual = self.remap(path);
        match self.fs.read_to_string(actual) {
            Ok(text) => Ok(Some(text)),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(source) => Err(HostError::Io {
                path: actual.to_path_buf(),
                source,
            }),
        }
    }

    /// Returns `true` if `path` (after replacement) exists.
    pub fn file_exists(&self, path: &Path) -> bool {
        self.fs.exists(self.remap(path))
    }

    /// Resolves `path` against the directory `base`.
    pub fn resolve(&self, base: &Path, path: &Path) -> PathBuf {
        path::resolve(base, path)
    }

    /// Computes `to` relative to the directory `from`.
    pub fn relative(&self, from: &Path, to: &Path) -> PathBuf {
        path::relative(from, to)
    }

    /// Returns the directory containing `path`.
    pub fn dirname(&self, path: &Path) -> PathBuf {
        path::dirname(path)
    }

    /// Reads a component resource.
    ///
    /// Templates are returned verbatim. Stylesheets go through the style
    /// processor; its messages and side outputs are accumulated. Returns
    /// `Ok(None)` if the resource does not exist.
    pub fn read_resource(&self, path: &Path) -> Result<Option<String>, HostError> {
        let Some(text) = self.read_file(path)? else {
            return Ok(None);
        };
        if SourceKind::from_path(path) != SourceKind::Style {
            return Ok(Some(text));
        }
        let output = self.styles.process_file(path, &text);
        Ok(Some(self.absorb(output).unwrap_or(text)))
    }

    /// Transforms inline resource text embedded in a script file.
    ///
    /// Only inline styles are transformed. `None` means the data should be
    /// used verbatim.
    pub fn transform_resource(&self, data: &str, context: &ResourceContext) -> Option<String> {
        if context.kind != SourceKind::Style || context.resource_file.is_some() {
            return None;
        }
        let output = self
            .styles
            .process_inline(data, &context.containing_file, context.order);
        self.absorb(output)
    }

    fn absorb(&self, output: StyleOutput) -> Option<String> {
        for message in output.errors {
            self.messages.emit(Severity::Error, message);
        }
        for message in output.warnings {
            self.messages.emit(Severity::Warning, message);
        }
        if !output.output_files.is_empty() {
            self.output_files
                .lock()
                .unwrap()
                .extend(output.output_files);
        }
        output.contents
    }

    /// Writes a file through the filesystem.
    pub fn write_file(&self, path: &Path, contents: &str) -> Result<(), HostError> {
        tracing::debug!(path = %path.display(), bytes = contents.len(), "writing file");
        self.fs
            .write(path, contents.as_bytes())
            .map_err(|source| HostError::Io {
                path: path.to_path_buf(),
                source,
            })
    }

    /// Drains style messages accumulated since the last call.
    pub fn take_messages(&self) -> CollectedMessages {
        self.messages.take_all()
    }

    /// Drains style side outputs accumulated since the last call.
    pub fn take_output_files(&self) -> Vec<OutputFile> {
        std::mem::take(&mut *self.output_files.lock().unwrap())
    }
}
