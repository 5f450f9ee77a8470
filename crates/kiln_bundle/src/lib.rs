//! Classification of a bundler's output graph.
//!
//! A [`BundlerContext`] drives one bundling pass through a [`Bundler`]
//! implementation, either one-shot or through a persistent incremental
//! session. From the pass's [`Metafile`] it computes the initial files: the
//! outputs of the declared entry points plus everything they load
//! statically. Outputs reached only through dynamic imports are lazy and are
//! left out. [`bundle_all`] runs several contexts (one per locale, say) and
//! merges their results.

#![warn(missing_docs)]

pub mod context;
pub mod error;
pub mod initial_files;
pub mod metafile;
pub mod result;

pub use context::{bundle_all, BuildOutput, Bundler, BundlerContext, BundlerSession};
pub use error::BundleError;
pub use initial_files::{
    classify_initial_files, entry_name, merge_initial_files, FileType, InitialFileRecord,
    InitialFiles, InitialFilter,
};
pub use metafile::{ImportKind, Metafile, MetafileImport, MetafileInput, MetafileOutput};
pub use result::BundleResult;
