//! The compilation contract shared by both strategies.
//!
//! A [`Compilation`] lives across many builds. Each [`initialize`] loads the
//! configuration, builds a new program seeded from the previous one, and works
//! out which files are affected. Diagnostics and emission then operate on that
//! snapshot until the next `initialize`.
//!
//! [`initialize`]: Compilation::initialize

mod aot;
mod jit;
mod state;

pub use aot::AotCompilation;
pub use jit::JitCompilation;

use crate::error::CompileError;
use kiln_common::OutputFile;
use kiln_config::CompilationOptions;
use kiln_diagnostics::{CollectedMessages, Diagnostic};
use kiln_host::HostOptions;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

/// Rewrites the loaded options before a build uses them.
pub type OptionsTransform<'a> = &'a dyn Fn(CompilationOptions) -> CompilationOptions;

/// Which compilation strategy to use.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Strategy {
    /// Full template analysis; resources are inlined into the output.
    Aot,
    /// No template analysis; resources are left for the bundler to load.
    Jit,
}

/// Result of [`Compilation::initialize`].
#[derive(Debug, Clone, PartialEq)]
pub struct InitializeResult {
    /// Files whose diagnostics or output may differ from the previous build.
    pub affected_files: BTreeSet<PathBuf>,
    /// The options the build runs with.
    pub compiler_options: CompilationOptions,
    /// Every file the build depends on, resources included.
    pub referenced_files: Vec<PathBuf>,
}

/// One emitted output file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EmitFileResult {
    /// Destination path.
    pub filename: PathBuf,
    /// Emitted text.
    pub contents: String,
    /// Resource files inlined into the output, when the strategy tracks them.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub dependencies: Option<Vec<PathBuf>>,
}

/// An incremental compilation engine.
pub trait Compilation {
    /// Returns the strategy this engine implements.
    fn strategy(&self) -> Strategy;

    /// Loads the configuration at `config_path` and builds a new snapshot.
    ///
    /// On error the previous snapshot stays in place.
    fn initialize(
        &mut self,
        config_path: &Path,
        host_options: HostOptions,
        transform: Option<OptionsTransform<'_>>,
    ) -> Result<InitializeResult, CompileError>;

    /// Returns all diagnostics of the current snapshot: configuration,
    /// options, global, then syntactic, semantic and template diagnostics
    /// per file.
    fn collect_diagnostics(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Diagnostic> + '_>, CompileError>;

    /// Converts all diagnostics to messages, plus those reported while
    /// processing resources.
    fn diagnose_files(&self) -> Result<CollectedMessages, CompileError>;

    /// Emits every file whose output is out of date.
    fn emit_affected_files(&mut self) -> Result<Vec<EmitFileResult>, CompileError>;

    /// Returns side output files produced by resource processing.
    fn additional_output_files(&self) -> Vec<OutputFile>;
}

/// Creates an engine for `strategy`.
pub fn create_compilation(strategy: Strategy) -> Box<dyn Compilation> {
    match strategy {
        Strategy::Aot => Box::new(AotCompilation::new()),
        Strategy::Jit => Box::new(JitCompilation::new()),
    }
}
