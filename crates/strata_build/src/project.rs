//! A project on disk: configuration plus the layer graph built from it.

use std::path::{Path, PathBuf};

use strata_config::{load_config, ConfigError, ProjectConfig};
use strata_diagnostics::DiagnosticSink;
use strata_layer::{HookRegistry, LayerGraph, ScanOptions};
use strata_loader::ModuleLoaderChain;
use tracing::info;

use crate::error::BuildError;
use crate::producer::SourceProducer;
use crate::scheduler::{BuildOptions, BuildOutcome, Builder};

/// A loaded project with its layers registered, started, and checked for
/// overlap conflicts.
pub struct Project {
    /// The project root directory.
    pub root: PathBuf,
    /// The parsed configuration.
    pub config: ProjectConfig,
    /// The layer graph.
    pub graph: LayerGraph,
}

impl Project {
    /// Loads `strata.toml` from `root` and brings up every layer.
    ///
    /// Only an unreadable or invalid configuration is an error. Problems with
    /// individual layers are reported to `sink` and exclude those layers.
    pub fn open(root: &Path, hooks: &HookRegistry, sink: &DiagnosticSink) -> Result<Self, ConfigError> {
        let config = load_config(root)?;
        Ok(Self::from_config(root, config, hooks, sink))
    }

    /// Brings up the layers of an already-parsed configuration.
    pub fn from_config(
        root: &Path,
        config: ProjectConfig,
        hooks: &HookRegistry,
        sink: &DiagnosticSink,
    ) -> Self {
        let mut graph = LayerGraph::from_config(&config, root, sink);
        let scan = ScanOptions {
            extensions: config.build.source_extensions.clone(),
            output_dirs: vec![root.join(&config.build.output_dir)],
        };
        graph.bring_up(hooks, &scan, sink);
        let conflicts = graph.detect_conflicts(sink);
        info!(
            project = %config.project.name,
            layers = graph.active_layers().len(),
            build_layers = graph.build_layers().len(),
            conflicts,
            "project loaded"
        );
        Self {
            root: root.to_path_buf(),
            config,
            graph,
        }
    }

    /// Builds every build layer with options from the configuration.
    pub fn build(
        &self,
        producer: &dyn SourceProducer,
        sink: &DiagnosticSink,
    ) -> Result<BuildOutcome, BuildError> {
        self.build_with(producer, BuildOptions::from(&self.config.build), sink)
    }

    /// Builds every build layer and stacks the new loader nodes on a chain
    /// that may already be serving symbols from an earlier build.
    pub fn rebuild(
        &self,
        producer: &dyn SourceProducer,
        loader: &mut ModuleLoaderChain,
        sink: &DiagnosticSink,
    ) -> Result<BuildOutcome, BuildError> {
        Builder::new(&self.graph, producer, BuildOptions::from(&self.config.build))
            .run_with_loader(loader, sink)
    }

    /// Builds every build layer with explicit options.
    pub fn build_with(
        &self,
        producer: &dyn SourceProducer,
        options: BuildOptions,
        sink: &DiagnosticSink,
    ) -> Result<BuildOutcome, BuildError> {
        Builder::new(&self.graph, producer, options).run(sink)
    }
}
