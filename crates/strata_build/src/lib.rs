//! Incremental builds over a layer graph.
//!
//! A [`Builder`] runs one pass per build layer, wave by wave, so that a
//! build layer starts only after every build layer it depends on has
//! finished. Each pass asks a [`SourceProducer`] for the files generated from
//! every effective source, inherits unchanged records from the previous build
//! layer where allowed, writes only changed bytes, and sweeps files that are
//! no longer produced. After the passes, a [`ModuleLoaderChain`] is stacked
//! over the build outputs and a [`TypeResolver`] answers where each type
//! should be loaded from.
//!
//! [`ModuleLoaderChain`]: strata_loader::ModuleLoaderChain

#![warn(missing_docs)]

pub mod error;
pub mod package_index;
pub mod pass;
pub mod producer;
pub mod project;
pub mod resolver;
pub mod scheduler;

pub use error::BuildError;
pub use package_index::PackageIndex;
pub use pass::{CompileRequest, FinishedLayer, PassReport};
pub use producer::{FileContent, GeneratedFile, SourceContext, SourceOutput, SourceProducer};
pub use project::Project;
pub use resolver::{Resolution, TypeResolver};
pub use scheduler::{BuildOptions, BuildOutcome, Builder};
