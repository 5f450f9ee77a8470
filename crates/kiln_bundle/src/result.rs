//! Results of bundling passes and how several are combined.

use crate::initial_files::{merge_initial_files, InitialFiles};
use crate::metafile::Metafile;
use kiln_common::OutputFile;
use kiln_diagnostics::Message;

/// The outcome of one or more bundling passes.
#[derive(Clone, Debug, PartialEq)]
pub enum BundleResult {
    /// The bundler reported errors. No outputs are kept.
    Failure {
        /// Every reported error.
        errors: Vec<Message>,
        /// Every reported warning.
        warnings: Vec<Message>,
    },
    /// The pass succeeded.
    Success {
        /// Reported warnings.
        warnings: Vec<Message>,
        /// The pass's metafile.
        metafile: Metafile,
        /// Files written by the pass.
        output_files: Vec<OutputFile>,
        /// Initial files keyed by path relative to the workspace root.
        initial_files: InitialFiles,
    },
}

impl BundleResult {
    /// Returns true for [`BundleResult::Success`].
    pub fn is_success(&self) -> bool {
        matches!(self, BundleResult::Success { .. })
    }

    /// Reported errors; empty on success.
    pub fn errors(&self) -> &[Message] {
        match self {
            BundleResult::Failure { errors, .. } => errors,
            BundleResult::Success { .. } => &[],
        }
    }

    /// Reported warnings.
    pub fn warnings(&self) -> &[Message] {
        match self {
            BundleResult::Failure { warnings, .. } | BundleResult::Success { warnings, .. } => {
                warnings
            }
        }
    }

    /// Combines the results of independent passes.
    ///
    /// One result is returned unchanged. Otherwise warnings and errors are
    /// concatenated in order, and a single failure makes the whole result a
    /// failure. When all succeed, metafiles are merged by key, initial files
    /// by key union (later wins, entry points stay entry points) and output
    /// files are concatenated.
    pub fn merge(results: impl IntoIterator<Item = BundleResult>) -> BundleResult {
        let mut results: Vec<BundleResult> = results.into_iter().collect();
        if results.len() == 1 {
            if let Some(only) = results.pop() {
                return only;
            }
        }

        let mut errors = Vec::new();
        let mut warnings = Vec::new();
        let mut failed = false;
        let mut merged_metafile = Metafile::default();
        let mut merged_outputs = Vec::new();
        let mut merged_initial = InitialFiles::new();
        for result in results {
            match result {
                BundleResult::Failure {
                    errors: e,
                    warnings: w,
                } => {
                    failed = true;
                    errors.extend(e);
                    warnings.extend(w);
                }
                BundleResult::Success {
                    warnings: w,
                    metafile,
                    output_files,
                    initial_files,
                } => {
                    warnings.extend(w);
                    if !failed {
                        merged_metafile.merge(metafile);
                        merged_outputs.extend(output_files);
                        merge_initial_files(&mut merged_initial, initial_files);
                    }
                }
            }
        }

        if failed {
            return BundleResult::Failure { errors, warnings };
        }
        BundleResult::Success {
            warnings,
            metafile: merged_metafile,
            output_files: merged_outputs,
            initial_files: merged_initial,
        }
    }
}
