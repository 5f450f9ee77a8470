//! The full strategy: template analysis and inlined resources.

use super::state::{deliver, Engine};
use super::{Compilation, EmitFileResult, InitializeResult, OptionsTransform, Strategy};
use crate::emit::{emit_fingerprint, emit_inlined};
use crate::error::CompileError;
use crate::profile::profile_step;
use kiln_common::OutputFile;
use kiln_diagnostics::{CollectedMessages, Diagnostic};
use kiln_host::HostOptions;
use kiln_source::{FileId, SourceKind};
use std::collections::BTreeSet;
use std::path::Path;

/// Compilation with full template analysis.
///
/// Templates and stylesheets are program members, checked against their
/// components, and inlined into the output. Besides the files the builder
/// marks pending, every script whose emit fingerprint changed (a template or
/// stylesheet it inlines was edited) is emitted again.
pub struct AotCompilation {
    engine: Engine,
}

impl AotCompilation {
    /// Creates an uninitialized engine.
    pub fn new() -> Self {
        Self {
            engine: Engine::new(true),
        }
    }

    fn emit(&mut self) -> Result<Vec<EmitFileResult>, CompileError> {
        let mut emitted = self.engine.drain_pending(false, |state, id| {
            emit_inlined(&state.program, id, &state.resources)
        })?;

        let state = self.engine.state_mut()?;
        for (id, _) in &emitted {
            if let Some(fingerprint) = emit_fingerprint(&state.program, *id, state.options_hash) {
                state.builder.record_emit_fingerprint(*id, fingerprint);
            }
        }

        let done: BTreeSet<FileId> = emitted.iter().map(|(id, _)| *id).collect();
        let remaining: Vec<FileId> = state
            .program
            .files()
            .filter(|f| f.kind == SourceKind::Script && !done.contains(&f.id))
            .map(|f| f.id)
            .collect();
        let mut skipped = 0usize;
        for id in remaining {
            let Some(fingerprint) = emit_fingerprint(&state.program, id, state.options_hash) else {
                continue;
            };
            if state.builder.emit_fingerprint(id) == Some(fingerprint) {
                skipped += 1;
                continue;
            }
            if let Some(output) = emit_inlined(&state.program, id, &state.resources) {
                emitted.extend(deliver(state, output)?);
            }
            state.builder.record_emit_fingerprint(id, fingerprint);
        }
        tracing::debug!(skipped, "scanned unchanged scripts");

        // Nothing is pending any more; this only persists the build info.
        emitted.extend(self.engine.drain_pending(true, |state, id| {
            emit_inlined(&state.program, id, &state.resources)
        })?);
        Ok(emitted.into_iter().map(|(_, result)| result).collect())
    }
}

impl Default for AotCompilation {
    fn default() -> Self {
        Self::new()
    }
}

impl Compilation for AotCompilation {
    fn strategy(&self) -> Strategy {
        Strategy::Aot
    }

    fn initialize(
        &mut self,
        config_path: &Path,
        host_options: HostOptions,
        transform: Option<OptionsTransform<'_>>,
    ) -> Result<InitializeResult, CompileError> {
        self.engine.initialize(config_path, host_options, transform)
    }

    fn collect_diagnostics(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Diagnostic> + '_>, CompileError> {
        self.engine.collect_diagnostics()
    }

    fn diagnose_files(&self) -> Result<CollectedMessages, CompileError> {
        self.engine.diagnose_files()
    }

    #[tracing::instrument(level = "debug", skip_all)]
    fn emit_affected_files(&mut self) -> Result<Vec<EmitFileResult>, CompileError> {
        let results = profile_step("emit", || self.emit())?;
        tracing::debug!(emitted = results.len(), "emit finished");
        Ok(results)
    }

    fn additional_output_files(&self) -> Vec<OutputFile> {
        self.engine.additional_output_files()
    }
}
