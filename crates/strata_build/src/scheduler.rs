//! Dependency-ordered execution of build passes.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use rayon::prelude::*;
use strata_common::{InternalError, LayerId};
use strata_config::BuildConfig;
use strata_diagnostics::{codes, Diagnostic, DiagnosticSink, Location};
use strata_layer::LayerGraph;
use strata_loader::{ModuleLoaderChain, NodeSpec};
use tracing::{error, info, warn};

use crate::error::BuildError;
use crate::pass::{BuildPass, FinishedLayer, PassReport};
use crate::producer::SourceProducer;
use crate::resolver::TypeResolver;

/// Settings that shape a build run.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildOptions {
    /// Discard every build layer's incremental state.
    pub build_all: bool,
    /// Run the passes of a wave concurrently.
    pub parallel: bool,
    /// Extension of compiled artifacts, used by the loader chain.
    pub artifact_ext: String,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self::from(&BuildConfig::default())
    }
}

impl From<&BuildConfig> for BuildOptions {
    fn from(config: &BuildConfig) -> Self {
        Self {
            build_all: config.build_all,
            parallel: config.parallel,
            artifact_ext: config.artifact_ext.clone(),
        }
    }
}

/// The result of a build run.
#[derive(Debug)]
pub struct BuildOutcome {
    /// Pass reports of the build layers that finished.
    pub reports: BTreeMap<LayerId, PassReport>,
    /// State of the build layers that finished.
    pub finished: HashMap<LayerId, Arc<FinishedLayer>>,
    /// Build layers whose pass failed.
    pub failed: Vec<LayerId>,
    /// Build layers skipped because a dependency failed.
    pub skipped: Vec<LayerId>,
    /// The loader chain after this run's nodes were stacked on it.
    pub loader: ModuleLoaderChain,
}

impl BuildOutcome {
    /// The pass report of a build layer.
    pub fn report(&self, id: LayerId) -> Option<&PassReport> {
        self.reports.get(&id)
    }

    /// The finished state of a build layer.
    pub fn layer(&self, id: LayerId) -> Option<&FinishedLayer> {
        self.finished.get(&id).map(Arc::as_ref)
    }

    /// A resolver over this outcome.
    pub fn resolver<'a>(&'a self, graph: &'a LayerGraph) -> TypeResolver<'a> {
        TypeResolver::new(graph, self)
    }
}

/// Runs build passes over a layer graph.
pub struct Builder<'a> {
    graph: &'a LayerGraph,
    producer: &'a dyn SourceProducer,
    options: BuildOptions,
}

impl<'a> Builder<'a> {
    /// Creates a builder.
    pub fn new(graph: &'a LayerGraph, producer: &'a dyn SourceProducer, options: BuildOptions) -> Self {
        Self {
            graph,
            producer,
            options,
        }
    }

    /// Builds every active build layer, wave by wave, over a fresh loader
    /// chain.
    ///
    /// A failed pass is reported as `E300` and every build layer depending on
    /// it is skipped with `W204`; independent layers still build. Only a
    /// failed inheritance or an internal error aborts the run.
    pub fn run(&self, sink: &DiagnosticSink) -> Result<BuildOutcome, BuildError> {
        let mut loader = ModuleLoaderChain::new();
        self.run_with_loader(&mut loader, sink)
    }

    /// Builds like [`Builder::run`], then stacks one node per finished build
    /// layer on a live `loader`.
    ///
    /// Nodes left from earlier runs stay in the chain. Each is disabled once
    /// its layer is rebuilt or superseded, and keeps answering for the
    /// symbols it had already resolved.
    pub fn run_with_loader(
        &self,
        loader: &mut ModuleLoaderChain,
        sink: &DiagnosticSink,
    ) -> Result<BuildOutcome, BuildError> {
        let waves = self.graph.build_waves();
        info!(
            waves = waves.len(),
            layers = waves.iter().map(Vec::len).sum::<usize>(),
            parallel = self.options.parallel,
            "starting build"
        );

        let mut finished: HashMap<LayerId, Arc<FinishedLayer>> = HashMap::new();
        let mut reports = BTreeMap::new();
        let mut failed = Vec::new();
        let mut skipped = Vec::new();
        let mut blocked: HashSet<LayerId> = HashSet::new();

        for wave in waves {
            let mut ready = Vec::with_capacity(wave.len());
            for id in wave {
                match self.failed_dependency(id, &blocked) {
                    Some(dep) => {
                        warn!(layer = %self.graph.name(id), dependency = %self.graph.name(dep), "skipping build layer");
                        sink.emit(Diagnostic::warning(
                            codes::DEPENDENCY_FAILED,
                            format!(
                                "build layer `{}` was skipped because `{}` failed",
                                self.graph.name(id),
                                self.graph.name(dep)
                            ),
                            Location::layer(self.graph.name(id)),
                        ));
                        blocked.insert(id);
                        skipped.push(id);
                    }
                    None => ready.push(id),
                }
            }

            let run_one = |id: LayerId| {
                let pass = BuildPass {
                    graph: self.graph,
                    id,
                    producer: self.producer,
                    options: &self.options,
                    finished: &finished,
                    sink,
                };
                (id, pass.run())
            };
            let results: Vec<_> = if self.options.parallel {
                ready.par_iter().map(|&id| run_one(id)).collect()
            } else {
                ready.iter().map(|&id| run_one(id)).collect()
            };

            for (id, result) in results {
                match result {
                    Ok((state, report)) => {
                        finished.insert(id, Arc::new(state));
                        reports.insert(id, report);
                    }
                    Err(err) if err.is_fatal() => {
                        error!(layer = %self.graph.name(id), error = %err, "build aborted");
                        return Err(err);
                    }
                    Err(err) => {
                        error!(layer = %self.graph.name(id), error = %err, "build pass failed");
                        sink.emit(err.to_diagnostic());
                        blocked.insert(id);
                        failed.push(id);
                    }
                }
            }
        }

        for id in self.graph.build_layers() {
            if !finished.contains_key(&id) && !blocked.contains(&id) {
                return Err(InternalError::new(format!(
                    "build layer `{}` was never scheduled",
                    self.graph.name(id)
                ))
                .into());
            }
        }

        self.stack_nodes(loader, &finished);
        info!(
            finished = finished.len(),
            failed = failed.len(),
            skipped = skipped.len(),
            "build complete"
        );
        Ok(BuildOutcome {
            reports,
            finished,
            failed,
            skipped,
            loader: loader.clone(),
        })
    }

    fn failed_dependency(&self, id: LayerId, blocked: &HashSet<LayerId>) -> Option<LayerId> {
        self.graph
            .build_dependencies(id)
            .into_iter()
            .find(|dep| blocked.contains(dep))
    }

    /// Stacks one loader node per finished build layer in position order.
    ///
    /// A node searches its own output first, then the outputs of the build
    /// layers in its build order, newest first. It supersedes older nodes of
    /// its own layer, and the node of any layer it extends that records a key
    /// this layer serves from its own output.
    fn stack_nodes(
        &self,
        chain: &mut ModuleLoaderChain,
        finished: &HashMap<LayerId, Arc<FinishedLayer>>,
    ) {
        for id in self.graph.build_layers() {
            let Some(state) = finished.get(&id) else {
                continue;
            };
            let layer = self.graph.get(id);
            let mut deps = self.graph.build_dependencies(id);
            deps.sort_unstable_by(|a, b| b.cmp(a));
            let dirs = std::iter::once(layer.paths.build_dir.clone())
                .chain(deps.into_iter().map(|d| self.graph.get(d).paths.build_dir.clone()))
                .collect();
            let spec = NodeSpec {
                layer: id,
                name: layer.name.clone(),
                dirs,
                artifact_ext: self.options.artifact_ext.clone(),
                build_separate: layer.flags.build_separate,
            };
            chain.push_node(spec, |older| {
                older.layer() == id
                    || (self.graph.extends_layer(id, older.layer())
                        && finished.get(&older.layer()).is_some_and(|prev| {
                            state.local.iter().any(|key| prev.index.contains(key))
                        }))
            });
        }
    }
}
