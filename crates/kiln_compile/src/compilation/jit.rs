//! The light strategy: no template analysis, resources deferred to the bundler.

use super::state::Engine;
use super::{Compilation, EmitFileResult, InitializeResult, OptionsTransform, Strategy};
use crate::emit::emit_deferred;
use crate::error::CompileError;
use crate::profile::profile_step;
use kiln_common::OutputFile;
use kiln_diagnostics::{CollectedMessages, Diagnostic};
use kiln_host::HostOptions;
use std::path::Path;

/// Compilation that leaves templates and stylesheets to the bundler.
///
/// Component resources are rewritten into `?kiln-resource` imports and are
/// never read by the engine. Only files the builder marks pending are emitted.
pub struct JitCompilation {
    engine: Engine,
}

impl JitCompilation {
    /// Creates an uninitialized engine.
    pub fn new() -> Self {
        Self {
            engine: Engine::new(false),
        }
    }
}

impl Default for JitCompilation {
    fn default() -> Self {
        Self::new()
    }
}

impl Compilation for JitCompilation {
    fn strategy(&self) -> Strategy {
        Strategy::Jit
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
        let emitted = profile_step("emit", || {
            self.engine
                .drain_pending(true, |state, id| emit_deferred(&state.program, id))
        })?;
        tracing::debug!(emitted = emitted.len(), "emit finished");
        Ok(emitted.into_iter().map(|(_, result)| result).collect())
    }

    fn additional_output_files(&self) -> Vec<OutputFile> {
        self.engine.additional_output_files()
    }
}
