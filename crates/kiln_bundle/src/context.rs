//! Bundling contexts: one pass of a bundler plus classification of its
//! output.

use crate::error::BundleError;
use crate::initial_files::{classify_initial_files, InitialFileRecord, InitialFilter};
use crate::metafile::Metafile;
use crate::result::BundleResult;
use kiln_common::OutputFile;
use kiln_diagnostics::Message;
use rayon::prelude::*;
use std::path::PathBuf;

/// What a successful bundler pass produced.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct BuildOutput {
    /// Warnings reported by the bundler.
    pub warnings: Vec<Message>,
    /// The pass's metafile.
    pub metafile: Metafile,
    /// Files written by the pass.
    pub output_files: Vec<OutputFile>,
}

/// A persistent bundling session that can rebuild incrementally.
pub trait BundlerSession: Send {
    /// Rebuilds, reusing whatever the session kept from earlier builds.
    fn rebuild(&mut self) -> Result<BuildOutput, BundleError>;

    /// Releases the session's resources.
    fn dispose(&mut self);
}

/// The bundler a context drives.
pub trait Bundler: Send {
    /// Runs one complete build.
    fn build(&mut self) -> Result<BuildOutput, BundleError>;

    /// Starts a persistent session for incremental builds.
    fn start(&mut self) -> Result<Box<dyn BundlerSession>, BundleError>;
}

/// Drives one bundler and classifies its initial files.
///
/// Whether the context is incremental is fixed at construction. An
/// incremental context starts a session on its first [`bundle`] and rebuilds
/// it on every later one; the session lives until [`dispose`] or drop.
///
/// [`bundle`]: BundlerContext::bundle
/// [`dispose`]: BundlerContext::dispose
pub struct BundlerContext<B: Bundler> {
    bundler: B,
    incremental: bool,
    session: Option<Box<dyn BundlerSession>>,
    workspace_root: PathBuf,
    working_dir: PathBuf,
    entry_points: Vec<PathBuf>,
    filter: Option<Box<InitialFilter>>,
}

impl<B: Bundler> BundlerContext<B> {
    /// Creates a context whose bundler runs in `workspace_root`.
    pub fn new(
        workspace_root: impl Into<PathBuf>,
        incremental: bool,
        bundler: B,
        entry_points: Vec<PathBuf>,
    ) -> Self {
        let workspace_root = workspace_root.into();
        Self {
            bundler,
            incremental,
            session: None,
            working_dir: workspace_root.clone(),
            workspace_root,
            entry_points,
            filter: None,
        }
    }

    /// Sets the directory the bundler resolves metafile paths against, when
    /// it differs from the workspace root.
    pub fn with_working_dir(mut self, working_dir: impl Into<PathBuf>) -> Self {
        self.working_dir = working_dir.into();
        self
    }

    /// Sets a predicate that can reject files reached from entry points.
    pub fn with_initial_filter(
        mut self,
        filter: impl Fn(&str, &InitialFileRecord) -> bool + Send + Sync + 'static,
    ) -> Self {
        self.filter = Some(Box::new(filter));
        self
    }

    /// Whether a session is currently held.
    pub fn has_session(&self) -> bool {
        self.session.is_some()
    }

    /// Runs one pass.
    ///
    /// A [`BundleError::Failure`] from the bundler becomes
    /// [`BundleResult::Failure`]; any other error is returned unchanged.
    #[tracing::instrument(level = "debug", skip_all, fields(incremental = self.incremental))]
    pub fn bundle(&mut self) -> Result<BundleResult, BundleError> {
        let output = match self.run() {
            Ok(output) => output,
            Err(BundleError::Failure { errors, warnings }) => {
                tracing::debug!(errors = errors.len(), "bundler reported failure");
                return Ok(BundleResult::Failure { errors, warnings });
            }
            Err(err) => return Err(err),
        };
        let initial_files = classify_initial_files(
            &output.metafile,
            &self.entry_points,
            &self.working_dir,
            &self.workspace_root,
            self.filter.as_deref(),
        );
        Ok(BundleResult::Success {
            warnings: output.warnings,
            metafile: output.metafile,
            output_files: output.output_files,
            initial_files,
        })
    }

    fn run(&mut self) -> Result<BuildOutput, BundleError> {
        if !self.incremental {
            return self.bundler.build();
        }
        let session = match self.session.take() {
            Some(session) => session,
            None => {
                tracing::debug!("starting bundler session");
                self.bundler.start()?
            }
        };
        self.session.insert(session).rebuild()
    }

    /// Releases the session, if one was started. Safe to call repeatedly.
    pub fn dispose(&mut self) {
        if let Some(mut session) = self.session.take() {
            tracing::debug!("disposing bundler session");
            session.dispose();
        }
    }
}

impl<B: Bundler> Drop for BundlerContext<B> {
    fn drop(&mut self) {
        self.dispose();
    }
}

/// Runs every context and merges the results.
///
/// Contexts bundle in parallel. A single context's result is returned as is.
/// Otherwise any failure makes the whole result a failure carrying every
/// error; see [`BundleResult::merge`].
pub fn bundle_all<B: Bundler>(
    contexts: &mut [BundlerContext<B>],
) -> Result<BundleResult, BundleError> {
    let results = contexts
        .par_iter_mut()
        .map(BundlerContext::bundle)
        .collect::<Result<Vec<_>, _>>()?;
    Ok(BundleResult::merge(results))
}
