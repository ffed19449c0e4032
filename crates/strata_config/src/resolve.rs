//! Layer path resolution: turning relative definitions into absolute paths.

use crate::error::ConfigError;
use crate::types::{BuildConfig, LayerDef, ProjectConfig};
use std::path::{Path, PathBuf};

/// Absolute filesystem locations for one layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ResolvedLayerPaths {
    /// The layer root directory.
    pub root: PathBuf,
    /// Source directories to scan, in declaration order.
    pub source_dirs: Vec<PathBuf>,
    /// Where the layer's generated output goes when it is a build layer.
    pub build_dir: PathBuf,
}

/// Resolves a named layer definition against the project root.
pub fn resolve_layer(
    config: &ProjectConfig,
    name: &str,
    project_root: &Path,
) -> Result<ResolvedLayerPaths, ConfigError> {
    let def = config
        .layers
        .iter()
        .find(|l| l.name == name)
        .ok_or_else(|| ConfigError::UnknownLayer(name.to_string()))?;
    Ok(resolve_def(def, &config.build, project_root))
}

/// Resolves a single definition. The build directory defaults to
/// `<output_dir>/<layer name>`.
pub fn resolve_def(def: &LayerDef, build: &BuildConfig, project_root: &Path) -> ResolvedLayerPaths {
    let root = project_root.join(def.root_path());
    let source_dirs = def
        .source_dirs
        .iter()
        .map(|d| if d == "." { root.clone() } else { root.join(d) })
        .collect();
    let build_dir = match &def.build_dir {
        Some(dir) => project_root.join(dir),
        None => project_root.join(&build.output_dir).join(&def.name),
    };
    ResolvedLayerPaths {
        root,
        source_dirs,
        build_dir,
    }
}
