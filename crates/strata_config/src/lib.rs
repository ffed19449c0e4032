//! Parsing and validation of `strata.toml` project configuration files.
//!
//! This crate reads the project configuration and produces a strongly-typed
//! [`ProjectConfig`]: project metadata, build settings, and the ordered list
//! of declarative [`LayerDef`]s that the layer graph registers.

#![warn(missing_docs)]

pub mod error;
pub mod loader;
pub mod resolve;
pub mod types;

pub use error::ConfigError;
pub use loader::{load_config, load_config_from_str, CONFIG_FILE};
pub use resolve::{resolve_def, resolve_layer, ResolvedLayerPaths};
pub use types::*;
