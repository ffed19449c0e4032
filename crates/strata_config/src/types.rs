//! Configuration types deserialized from `strata.toml`.

use serde::Deserialize;

/// The top-level project configuration parsed from `strata.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectConfig {
    /// Core project metadata.
    pub project: ProjectMeta,
    /// Build settings shared by every build layer.
    #[serde(default)]
    pub build: BuildConfig,
    /// Layer definitions in registration order.
    #[serde(default)]
    pub layers: Vec<LayerDef>,
}

/// Core project metadata required in every `strata.toml`.
#[derive(Debug, Clone, Deserialize)]
pub struct ProjectMeta {
    /// The project name.
    pub name: String,
    /// The project version string. Persisted indexes written by a different
    /// version are discarded.
    pub version: String,
}

/// Build settings.
#[derive(Debug, Clone, Deserialize)]
pub struct BuildConfig {
    /// Root for per-layer output directories, relative to the project root.
    #[serde(default = "default_output_dir")]
    pub output_dir: String,
    /// Force a full rebuild of every build layer.
    #[serde(default)]
    pub build_all: bool,
    /// Run independent build layers concurrently.
    #[serde(default = "default_true")]
    pub parallel: bool,
    /// Name of the aggregate build layer. Defaults to the last active layer.
    #[serde(default)]
    pub aggregate_layer: Option<String>,
    /// File extensions treated as sources. Empty means every file.
    #[serde(default)]
    pub source_extensions: Vec<String>,
    /// Extension of compiled artifacts resolved through the loader chain.
    #[serde(default = "default_artifact_ext")]
    pub artifact_ext: String,
}

impl Default for BuildConfig {
    fn default() -> Self {
        Self {
            output_dir: default_output_dir(),
            build_all: false,
            parallel: true,
            aggregate_layer: None,
            source_extensions: Vec::new(),
            artifact_ext: default_artifact_ext(),
        }
    }
}

fn default_output_dir() -> String {
    "build".to_string()
}

fn default_artifact_ext() -> String {
    "bin".to_string()
}

fn default_true() -> bool {
    true
}

fn default_source_dirs() -> Vec<String> {
    vec![".".to_string()]
}

/// A declarative layer definition.
///
/// The layer graph registers definitions in the order they appear; every
/// name in `extends` must refer to a definition that appears earlier.
#[derive(Debug, Clone, Deserialize)]
pub struct LayerDef {
    /// Unique layer name, e.g. `sys.core`.
    pub name: String,
    /// Dotted package prefix prepended to the layer's relative source paths.
    #[serde(default)]
    pub package: String,
    /// Names of the base layers this layer extends, in declaration order.
    #[serde(default)]
    pub extends: Vec<String>,
    /// Layer root directory, relative to the project root. Defaults to the name.
    #[serde(default)]
    pub path: Option<String>,
    /// Source directories, relative to the layer root.
    #[serde(default = "default_source_dirs")]
    pub source_dirs: Vec<String>,
    /// Glob patterns over layer-relative paths excluded from scanning.
    #[serde(default)]
    pub exclude: Vec<String>,
    /// Layers whose namespace this layer deliberately overlaps.
    #[serde(default)]
    pub modifies: Vec<String>,
    /// Output directory, relative to the project root.
    #[serde(default)]
    pub build_dir: Option<String>,
    /// Types from this layer stay uncompiled and load from source.
    #[serde(default)]
    pub dynamic: bool,
    /// Never dynamic; always resolved to compiled artifacts.
    #[serde(default)]
    pub compiled_only: bool,
    /// No later layer may extend this one.
    #[serde(default)]
    pub final_layer: bool,
    /// Self-contained build output that is never superseded.
    #[serde(default)]
    pub build_separate: bool,
    /// Omitted from layer listings.
    #[serde(default)]
    pub hidden: bool,
    /// Exempt from overlap conflict detection.
    #[serde(default)]
    pub transparent: bool,
    /// Owns an output directory and an artifact index.
    #[serde(default)]
    pub build_layer: bool,
}

impl LayerDef {
    /// Creates a definition with the given name and every option defaulted.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            package: String::new(),
            extends: Vec::new(),
            path: None,
            source_dirs: default_source_dirs(),
            exclude: Vec::new(),
            modifies: Vec::new(),
            build_dir: None,
            dynamic: false,
            compiled_only: false,
            final_layer: false,
            build_separate: false,
            hidden: false,
            transparent: false,
            build_layer: false,
        }
    }

    /// Sets the package prefix.
    pub fn with_package(mut self, package: impl Into<String>) -> Self {
        self.package = package.into();
        self
    }

    /// Appends base layers.
    pub fn extending(mut self, bases: &[&str]) -> Self {
        self.extends.extend(bases.iter().map(|b| b.to_string()));
        self
    }

    /// Sets the layer root path.
    pub fn at_path(mut self, path: impl Into<String>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Marks the layer as a build layer.
    pub fn as_build_layer(mut self) -> Self {
        self.build_layer = true;
        self
    }

    /// Returns the layer root path relative to the project root.
    pub fn root_path(&self) -> &str {
        self.path.as_deref().unwrap_or(&self.name)
    }
}
