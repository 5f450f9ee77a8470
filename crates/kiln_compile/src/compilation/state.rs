//! Engine state shared by both strategies.

use super::{EmitFileResult, InitializeResult, OptionsTransform};
use crate::analysis::{semantic_diagnostics, template_diagnostics};
use crate::build_info::BuildInfo;
use crate::builder::{BuilderState, EmitTarget};
use crate::cache::{CachedDiagnostics, DiagnosticCache};
use crate::emit::EmitOutput;
use crate::error::CompileError;
use crate::options::{global_diagnostics, option_diagnostics, options_hash};
use crate::profile::profile_step;
use crate::program::{Program, ProgramBuilder};
use crate::resources::ResourceCache;
use kiln_common::{ContentHash, OutputFile};
use kiln_config::{read_configuration, CompilationOptions};
use kiln_diagnostics::{convert_diagnostic, CollectedMessages, Diagnostic};
use kiln_host::{HostOptions, ProgramHost};
use kiln_source::{FileId, FileRegistry, SourceKind};
use std::collections::BTreeSet;
use std::path::Path;
use std::sync::Arc;

/// Everything one successful `initialize` produced.
pub(crate) struct EngineState {
    pub(crate) options: CompilationOptions,
    pub(crate) options_hash: ContentHash,
    pub(crate) host: ProgramHost,
    pub(crate) program: Program,
    pub(crate) builder: BuilderState,
    pub(crate) diagnostics: DiagnosticCache,
    pub(crate) resources: ResourceCache,
    config_diagnostics: Vec<Diagnostic>,
    option_diagnostics: Vec<Diagnostic>,
    global_diagnostics: Vec<Diagnostic>,
}

/// The engine shared by both strategies; `full` selects template analysis
/// and resource processing.
pub(crate) struct Engine {
    registry: FileRegistry,
    full: bool,
    state: Option<EngineState>,
}

impl Engine {
    pub(crate) fn new(full: bool) -> Self {
        Self {
            registry: FileRegistry::new(),
            full,
            state: None,
        }
    }

    pub(crate) fn state(&self) -> Result<&EngineState, CompileError> {
        self.state
            .as_ref()
            .ok_or_else(uninitialized)
    }

    pub(crate) fn state_mut(&mut self) -> Result<&mut EngineState, CompileError> {
        self.state
            .as_mut()
            .ok_or_else(uninitialized)
    }

    #[tracing::instrument(level = "debug", skip_all, fields(config = %config_path.display(), full = self.full))]
    pub(crate) fn initialize(
        &mut self,
        config_path: &Path,
        host_options: HostOptions,
        transform: Option<OptionsTransform<'_>>,
    ) -> Result<InitializeResult, CompileError> {
        let file_system = Arc::clone(&host_options.file_system);
        let parsed = profile_step("load configuration", || {
            read_configuration(config_path, &|p: &Path| file_system.read_to_string(p))
        })?;
        let options = match transform {
            Some(transform) => transform(parsed.options),
            None => parsed.options,
        };
        let options_hash = options_hash(&options)?;
        let host = ProgramHost::new(&host_options);

        let seeded;
        let prior_builder = match &self.state {
            Some(state) => Some(&state.builder),
            None => {
                seeded = options.build_info_path().and_then(|path| {
                    BuildInfo::load(&host, &path)
                        .map(|info| info.into_state(&mut self.registry, &options.config_dir()))
                });
                seeded.as_ref()
            }
        };

        let prior_program = self.state.as_ref().map(|s| &s.program);
        let full = self.full;
        let program = profile_step("build program", || {
            ProgramBuilder {
                options: &options,
                host: &host,
                registry: &mut self.registry,
                prior: prior_program,
                include_resources: full,
            }
            .build(&parsed.root_names)
        })?;

        let (builder, changed) = BuilderState::compute(&program, options_hash, prior_builder);
        let affected = reported_files(&program, &changed);

        let mut diagnostics = self
            .state
            .as_ref()
            .map(|s| s.diagnostics.clone())
            .unwrap_or_default();
        diagnostics.retain(|id| program.contains(id));
        let mut resources = self
            .state
            .as_ref()
            .map(|s| s.resources.clone())
            .unwrap_or_default();

        profile_step("analyze", || -> Result<(), CompileError> {
            let mut analyzed = 0usize;
            for file in program
                .files()
                .filter(|f| matches!(f.kind, SourceKind::Script | SourceKind::Declaration))
            {
                if !affected.contains(&file.id) && diagnostics.get(file.id).is_some() {
                    continue;
                }
                let template = if full && file.kind == SourceKind::Script {
                    template_diagnostics(&program, file.id, options.strict_templates)
                } else {
                    Vec::new()
                };
                diagnostics.insert(
                    file.id,
                    CachedDiagnostics {
                        semantic: Arc::new(semantic_diagnostics(&program, file.id)),
                        template: Arc::new(template),
                    },
                );
                analyzed += 1;
            }
            let processed = if full {
                resources.refresh(&program, &host)?
            } else {
                0
            };
            tracing::debug!(analyzed, processed, "analysis finished");
            Ok(())
        })?;

        let option_diagnostics = option_diagnostics(&options);
        let global_diagnostics = global_diagnostics(&program, &options, &parsed.root_names);
        let result = InitializeResult {
            affected_files: affected
                .iter()
                .filter_map(|id| program.file(*id).map(|f| f.path.clone()))
                .collect(),
            compiler_options: options.clone(),
            referenced_files: program.referenced_files(),
        };
        tracing::debug!(
            files = program.sources().len(),
            affected = result.affected_files.len(),
            pending = builder.pending().count(),
            "program initialized"
        );

        self.state = Some(EngineState {
            options,
            options_hash,
            host,
            program,
            builder,
            diagnostics,
            resources,
            config_diagnostics: parsed.errors,
            option_diagnostics,
            global_diagnostics,
        });
        Ok(result)
    }

    pub(crate) fn collect_diagnostics(
        &self,
    ) -> Result<Box<dyn Iterator<Item = Diagnostic> + '_>, CompileError> {
        let state = self.state()?;
        let per_file = state
            .program
            .files()
            .filter(|f| matches!(f.kind, SourceKind::Script | SourceKind::Declaration))
            .flat_map(move |file| {
                let syntax = state
                    .program
                    .module(file.id)
                    .map(|m| m.syntax.as_slice())
                    .unwrap_or(&[]);
                let cached = state.diagnostics.get(file.id);
                let semantic = cached.map(|c| c.semantic.as_slice()).unwrap_or(&[]);
                let template = cached.map(|c| c.template.as_slice()).unwrap_or(&[]);
                syntax.iter().chain(semantic).chain(template)
            });
        let all = state
            .config_diagnostics
            .iter()
            .chain(&state.option_diagnostics)
            .chain(&state.global_diagnostics)
            .chain(per_file)
            .cloned();
        Ok(Box::new(all))
    }

    pub(crate) fn diagnose_files(&self) -> Result<CollectedMessages, CompileError> {
        let state = self.state()?;
        let mut messages = CollectedMessages::default();
        for diagnostic in self.collect_diagnostics()? {
            let message = convert_diagnostic(&diagnostic, state.program.sources());
            if diagnostic.severity.is_error() {
                messages.errors.push(message);
            } else {
                messages.warnings.push(message);
            }
        }
        let resource_messages = state.resources.messages();
        messages.errors.extend(resource_messages.errors);
        messages.warnings.extend(resource_messages.warnings);
        Ok(messages)
    }

    /// Emits pending files with `emit` until the builder has nothing left.
    ///
    /// With `persist` set, the build info is written through the host once the
    /// pending files drain. Returns the ids of emitted files with their output.
    pub(crate) fn drain_pending(
        &mut self,
        persist: bool,
        emit: impl Fn(&EngineState, FileId) -> Option<EmitOutput>,
    ) -> Result<Vec<(FileId, EmitFileResult)>, CompileError> {
        let registry = &self.registry;
        let state = self
            .state
            .as_mut()
            .ok_or_else(uninitialized)?;
        let persist = persist && state.options.incremental;
        let mut emitted = Vec::new();
        while let Some(target) = state.builder.next_emit(persist) {
            let output = match target {
                EmitTarget::File(id) => emit(state, id),
                EmitTarget::BuildInfo => Some(build_info_output(state, registry)?),
            };
            if let Some(output) = output {
                if let Some(result) = deliver(state, output)? {
                    emitted.push(result);
                }
            }
            state.builder.complete_emit(target);
        }
        Ok(emitted)
    }

    pub(crate) fn additional_output_files(&self) -> Vec<OutputFile> {
        self.state
            .as_ref()
            .map(|s| s.resources.output_files())
            .unwrap_or_default()
    }
}

fn uninitialized() -> CompileError {
    CompileError::Assertion("compilation must be initialized".to_string())
}

/// Maps the builder's changed files to the files callers care about:
/// scripts and declarations as is, shadows to their origin, resources to the
/// scripts that use them.
fn reported_files(program: &Program, changed: &BTreeSet<FileId>) -> BTreeSet<FileId> {
    let mut reported = BTreeSet::new();
    for &id in changed {
        let Some(file) = program.file(id) else {
            continue;
        };
        match file.kind {
            SourceKind::Script | SourceKind::Declaration => {
                reported.insert(id);
            }
            SourceKind::TypeCheckShadow => reported.extend(program.origin(id)),
            SourceKind::Template | SourceKind::Style => {
                reported.extend(program.importers(id).into_iter().map(|(importer, _)| importer));
            }
        }
    }
    reported
}

fn build_info_output(state: &EngineState, registry: &FileRegistry) -> Result<EmitOutput, CompileError> {
    let Some(filename) = state.options.build_info_path() else {
        return Err(CompileError::Assertion(
            "build info requested without a build info path".to_string(),
        ));
    };
    let info = BuildInfo::from_state(&state.builder, registry, &state.options.config_dir());
    Ok(EmitOutput {
        filename,
        contents: info.to_json()?,
        dependencies: None,
        sources: Vec::new(),
    })
}

/// Routes an output: source-less outputs are written through the host, one
/// source yields a result, more than one is ambiguous.
pub(crate) fn deliver(
    state: &EngineState,
    output: EmitOutput,
) -> Result<Option<(FileId, EmitFileResult)>, CompileError> {
    match output.sources.as_slice() {
        [] => {
            state.host.write_file(&output.filename, &output.contents)?;
            Ok(None)
        }
        [id] => Ok(Some((
            *id,
            EmitFileResult {
                filename: output.filename,
                contents: output.contents,
                dependencies: output.dependencies,
            },
        ))),
        sources => Err(CompileError::Assertion(format!(
            "emit produced one output for {} source files",
            sources.len()
        ))),
    }
}
