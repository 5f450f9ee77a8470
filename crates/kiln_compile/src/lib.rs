//! Incremental module compilation.
//!
//! A [`Compilation`] turns a project file into a [`Program`]: every script
//! reachable from the configured roots, scanned and analyzed into a
//! [`ModuleInfo`](module::ModuleInfo). Between builds the [`BuilderState`]
//! compares versions and export signatures to find the affected files, the
//! [`DiagnosticCache`] keeps diagnostics of everything else, and the emitter
//! writes only outputs that are out of date.
//!
//! Two strategies share the [`Compilation`] contract. [`AotCompilation`] reads
//! component templates and stylesheets, checks templates against their
//! components and inlines both into the output. [`JitCompilation`] skips
//! template analysis and leaves resources for the bundler to load.

#![warn(missing_docs)]

pub mod analysis;
pub mod build_info;
pub mod builder;
pub mod cache;
pub mod compilation;
pub mod emit;
pub mod error;
pub mod module;
pub mod options;
pub mod profile;
pub mod program;
pub mod resources;
pub mod scan;
pub mod template;

pub use builder::BuilderState;
pub use cache::DiagnosticCache;
pub use compilation::{
    create_compilation, AotCompilation, Compilation, EmitFileResult, InitializeResult,
    JitCompilation, OptionsTransform, Strategy,
};
pub use error::CompileError;
pub use program::Program;
