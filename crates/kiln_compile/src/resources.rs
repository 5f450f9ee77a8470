//! Processed component stylesheets, kept across builds.
//!
//! Every external stylesheet and inline style of the program's components is
//! run through the host once and the result is reused until its input text
//! changes. Each entry keeps the messages and side output files produced while
//! processing it, so they stay attributed to the resource that caused them.

use crate::error::CompileError;
use crate::program::Program;
use kiln_common::{ContentHash, OutputFile};
use kiln_diagnostics::CollectedMessages;
use kiln_host::{ProgramHost, ResourceContext};
use kiln_source::{FileId, SourceKind};
use std::collections::BTreeMap;

/// Identifies a processed stylesheet.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum ResourceKey {
    /// An external stylesheet file.
    File(FileId),
    /// The `order`-th inline style of component `component` in a script.
    Inline {
        /// The script declaring the component.
        file: FileId,
        /// Index of the component within the script.
        component: usize,
        /// Index of the style within the `styles` property.
        order: usize,
    },
}

/// The result of processing one stylesheet.
#[derive(Debug, Clone, Default)]
pub struct ProcessedResource {
    fingerprint: ContentHash,
    /// Processed text, or `None` to use the original.
    pub contents: Option<String>,
    /// Messages reported while processing.
    pub messages: CollectedMessages,
    /// Side outputs such as fonts and images.
    pub output_files: Vec<OutputFile>,
}

/// Cache of processed stylesheets keyed by [`ResourceKey`].
#[derive(Debug, Clone, Default)]
pub struct ResourceCache {
    entries: BTreeMap<ResourceKey, ProcessedResource>,
}

impl ResourceCache {
    /// Brings the cache in line with `program`.
    ///
    /// Unchanged stylesheets keep their entries, changed or new ones are
    /// processed through `host`, and entries for stylesheets no longer
    /// referenced are dropped. Returns the number of stylesheets processed.
    pub fn refresh(&mut self, program: &Program, host: &ProgramHost) -> Result<usize, CompileError> {
        let mut next = BTreeMap::new();
        let mut processed = 0;
        for file in program.files().filter(|f| f.kind == SourceKind::Script) {
            let Some(module) = program.module(file.id) else {
                continue;
            };
            for resource in program.resources(file.id) {
                let Some(style) = resource.file.filter(|_| resource.kind == SourceKind::Style) else {
                    continue;
                };
                let key = ResourceKey::File(style);
                let Some(style_file) = program.file(style) else {
                    continue;
                };
                if next.contains_key(&key) {
                    continue;
                }
                let entry = match self.entries.remove(&key) {
                    Some(entry) if entry.fingerprint == style_file.content_hash => entry,
                    _ => {
                        processed += 1;
                        let contents = host.read_resource(&style_file.path)?;
                        collect(style_file.content_hash, contents, host)
                    }
                };
                next.insert(key, entry);
            }
            for (component_index, component) in module.info.components.iter().enumerate() {
                for (order, style) in component.inline_styles.iter().enumerate() {
                    let key = ResourceKey::Inline {
                        file: file.id,
                        component: component_index,
                        order,
                    };
                    let fingerprint = ContentHash::from_text(&style.text);
                    let entry = match self.entries.remove(&key) {
                        Some(entry) if entry.fingerprint == fingerprint => entry,
                        _ => {
                            processed += 1;
                            let context = ResourceContext {
                                kind: SourceKind::Style,
                                containing_file: file.path.clone(),
                                resource_file: None,
                                order,
                            };
                            let contents = host.transform_resource(&style.text, &context);
                            collect(fingerprint, contents, host)
                        }
                    };
                    next.insert(key, entry);
                }
            }
        }
        self.entries = next;
        Ok(processed)
    }

    /// Returns the processed text of a stylesheet, if processing replaced it.
    pub fn contents(&self, key: ResourceKey) -> Option<&str> {
        self.entries.get(&key).and_then(|e| e.contents.as_deref())
    }

    /// Returns all messages in key order.
    pub fn messages(&self) -> CollectedMessages {
        let mut all = CollectedMessages::default();
        for entry in self.entries.values() {
            all.errors.extend(entry.messages.errors.iter().cloned());
            all.warnings.extend(entry.messages.warnings.iter().cloned());
        }
        all
    }

    /// Returns all side output files in key order.
    pub fn output_files(&self) -> Vec<OutputFile> {
        self.entries
            .values()
            .flat_map(|e| e.output_files.iter().cloned())
            .collect()
    }

    /// Returns the number of cached stylesheets.
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    /// Returns `true` if nothing is cached.
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

fn collect(fingerprint: ContentHash, contents: Option<String>, host: &ProgramHost) -> ProcessedResource {
    ProcessedResource {
        fingerprint,
        contents,
        messages: host.take_messages(),
        output_files: host.take_output_files(),
    }
}
