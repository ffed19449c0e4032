//! The layer graph: registration, extension reachability, lifecycle, and
//! type-source lookup across visible layers.

use std::collections::{HashMap, HashSet};
use std::path::Path;

use petgraph::algo::has_path_connecting;
use petgraph::graph::{DiGraph, NodeIndex};
use strata_common::{LayerId, TypeName};
use strata_config::{resolve_def, LayerDef, ProjectConfig, ResolvedLayerPaths};
use strata_diagnostics::DiagnosticSink;
use tracing::{debug, info};

use crate::error::LayerError;
use crate::hooks::{HookRegistry, LifecycleStage};
use crate::layer::{Layer, LayerState, SourceEntry};
use crate::scan::{scan_layer, ScanOptions};

/// The ordered set of layers and their extension edges.
///
/// Layers are stored by position; node `i` of the extension graph is the
/// layer at position `i`, with an edge from each layer to every base layer it
/// directly extends. Because a base must already be registered, every edge
/// points to a smaller position and the graph is acyclic by construction.
pub struct LayerGraph {
    pub(crate) layers: Vec<Layer>,
    by_name: HashMap<String, LayerId>,
    edges: DiGraph<LayerId, ()>,
    pub(crate) conflicts: HashSet<(LayerId, LayerId)>,
    aggregate: Option<LayerId>,
}

impl LayerGraph {
    /// Creates an empty graph.
    pub fn new() -> Self {
        Self {
            layers: Vec::new(),
            by_name: HashMap::new(),
            edges: DiGraph::new(),
            conflicts: HashSet::new(),
            aggregate: None,
        }
    }

    /// Registers every layer of a project configuration in declaration order.
    ///
    /// Definitions that fail to register are reported to `sink` and left out;
    /// the remaining layers are still registered. The configured aggregate
    /// layer is applied if it registered successfully.
    pub fn from_config(config: &ProjectConfig, project_root: &Path, sink: &DiagnosticSink) -> Self {
        let mut graph = Self::new();
        let declared: HashMap<&str, usize> = config
            .layers
            .iter()
            .enumerate()
            .map(|(i, def)| (def.name.as_str(), i))
            .collect();

        for (i, def) in config.layers.iter().enumerate() {
            let paths = resolve_def(def, &config.build, project_root);
            let result = graph.register_declared(def, paths, |base| {
                declared.get(base).is_some_and(|&pos| pos >= i)
            });
            if let Err(err) = result {
                sink.emit(err.to_diagnostic());
            }
        }

        if let Some(name) = &config.build.aggregate_layer {
            if let Some(id) = graph.find(name) {
                graph.aggregate = Some(id);
            }
        }
        graph
    }

    /// Registers one layer definition at the next position.
    pub fn register(
        &mut self,
        def: &LayerDef,
        paths: ResolvedLayerPaths,
    ) -> Result<LayerId, LayerError> {
        self.register_declared(def, paths, |_| false)
    }

    /// Registers a definition; `declared_later` tells whether an unknown base
    /// name belongs to a definition that comes at or after this one.
    fn register_declared(
        &mut self,
        def: &LayerDef,
        paths: ResolvedLayerPaths,
        declared_later: impl Fn(&str) -> bool,
    ) -> Result<LayerId, LayerError> {
        if self.by_name.contains_key(&def.name) {
            return Err(LayerError::DuplicateLayer {
                layer: def.name.clone(),
            });
        }

        let mut bases = Vec::with_capacity(def.extends.len());
        for base in &def.extends {
            let Some(&base_id) = self.by_name.get(base) else {
                if base == &def.name || declared_later(base) {
                    return Err(LayerError::ForwardReference {
                        layer: def.name.clone(),
                        base: base.clone(),
                    });
                }
                return Err(LayerError::UnknownBaseLayer {
                    layer: def.name.clone(),
                    base: base.clone(),
                });
            };
            let base_layer = &self.layers[base_id.index()];
            if !base_layer.is_active() {
                return Err(LayerError::UnknownBaseLayer {
                    layer: def.name.clone(),
                    base: base.clone(),
                });
            }
            if base_layer.flags.final_layer {
                return Err(LayerError::ExtendsFinalLayer {
                    layer: def.name.clone(),
                    base: base.clone(),
                });
            }
            if !bases.contains(&base_id) {
                bases.push(base_id);
            }
        }

        let id = LayerId::from_raw(self.layers.len() as u32);
        let node = self.edges.add_node(id);
        debug_assert_eq!(node.index(), id.index());
        for base in &bases {
            self.edges.add_edge(node, NodeIndex::new(base.index()), ());
        }
        debug!(layer = %def.name, position = id.as_raw(), bases = bases.len(), "registered layer");
        self.layers.push(Layer::new(id, def, bases, paths));
        self.by_name.insert(def.name.clone(), id);
        Ok(id)
    }

    /// Number of registered layers, including removed ones.
    pub fn len(&self) -> usize {
        self.layers.len()
    }

    /// Returns `true` if no layer is registered.
    pub fn is_empty(&self) -> bool {
        self.layers.is_empty()
    }

    /// Returns the layer at a position.
    ///
    /// # Panics
    ///
    /// Panics if `id` was not produced by this graph.
    pub fn get(&self, id: LayerId) -> &Layer {
        &self.layers[id.index()]
    }

    /// Looks a layer up by name.
    pub fn find(&self, name: &str) -> Option<LayerId> {
        self.by_name.get(name).copied()
    }

    /// Returns the name of a layer.
    pub fn name(&self, id: LayerId) -> &str {
        &self.get(id).name
    }

    /// Active layers in position order.
    pub fn active_layers(&self) -> Vec<LayerId> {
        self.layers.iter().filter(|l| l.is_active()).map(|l| l.id).collect()
    }

    /// Active layers that are not hidden, in position order.
    pub fn visible_layers(&self) -> Vec<LayerId> {
        self.layers
            .iter()
            .filter(|l| l.is_active() && !l.flags.hidden)
            .map(|l| l.id)
            .collect()
    }

    /// Returns `true` if `a` transitively extends `b`. A layer does not
    /// extend itself.
    pub fn extends_layer(&self, a: LayerId, b: LayerId) -> bool {
        if a == b || b > a {
            return false;
        }
        has_path_connecting(
            &self.edges,
            NodeIndex::new(a.index()),
            NodeIndex::new(b.index()),
            None,
        )
    }

    /// Returns `true` if `a` is `b` or extends it.
    pub fn extends_or_same(&self, a: LayerId, b: LayerId) -> bool {
        a == b || self.extends_layer(a, b)
    }

    /// Every active layer `id` transitively extends, in position order.
    pub fn extended_layers(&self, id: LayerId) -> Vec<LayerId> {
        (0..id.index())
            .map(|i| LayerId::from_raw(i as u32))
            .filter(|&b| self.get(b).is_active() && self.extends_layer(id, b))
            .collect()
    }

    /// The aggregate build layer: the configured one if still active,
    /// otherwise the last active layer.
    pub fn aggregate_layer(&self) -> Option<LayerId> {
        self.aggregate
            .filter(|&id| self.get(id).is_active())
            .or_else(|| self.layers.iter().rev().find(|l| l.is_active()).map(|l| l.id))
    }

    /// Designates the aggregate build layer.
    pub fn set_aggregate_layer(&mut self, id: LayerId) {
        self.aggregate = Some(id);
    }

    /// Returns `true` if the layer owns an output directory and artifact index.
    pub fn is_build_layer(&self, id: LayerId) -> bool {
        self.get(id).flags.build_layer || self.aggregate_layer() == Some(id)
    }

    /// Active build layers in position order.
    pub fn build_layers(&self) -> Vec<LayerId> {
        self.active_layers()
            .into_iter()
            .filter(|&id| self.is_build_layer(id))
            .collect()
    }

    /// Marks a layer and every active layer extending it as removed.
    ///
    /// Returns the removed layers in position order.
    pub fn remove_layer(&mut self, id: LayerId) -> Vec<LayerId> {
        let removed: Vec<LayerId> = self
            .active_layers()
            .into_iter()
            .filter(|&l| self.extends_or_same(l, id))
            .collect();
        for &l in &removed {
            self.layers[l.index()].state = LayerState::Removed;
            info!(layer = %self.layers[l.index()].name, "removed layer");
        }
        removed
    }

    fn fail_layer(&mut self, err: LayerError, sink: &DiagnosticSink) {
        sink.emit(err.to_diagnostic());
        if let Some(id) = self.find(err.layer()) {
            self.remove_layer(id);
        }
    }

    /// Initializes every active layer in position order.
    ///
    /// A layer whose base has been removed, or whose initialize hook fails,
    /// is removed together with its dependents.
    pub fn initialize_layers(&mut self, hooks: &HookRegistry, sink: &DiagnosticSink) {
        for id in self.active_layers() {
            if !self.get(id).is_active() {
                continue;
            }
            let layer = self.get(id);
            let removed_base = layer
                .base_layers
                .iter()
                .copied()
                .find(|&b| !self.get(b).is_active());
            if let Some(base) = removed_base {
                let err = LayerError::UnknownBaseLayer {
                    layer: layer.name.clone(),
                    base: self.name(base).to_string(),
                };
                self.fail_layer(err, sink);
                continue;
            }
            if let Err(source) = hooks.run(LifecycleStage::Initialize, layer, self) {
                let err = LayerError::Hook {
                    layer: layer.name.clone(),
                    stage: LifecycleStage::Initialize,
                    source,
                };
                self.fail_layer(err, sink);
                continue;
            }
            self.layers[id.index()].state = LayerState::Initialized;
        }
    }

    /// Scans the sources of every active layer and runs its start hook.
    ///
    /// The build directory of every registered layer is excluded from
    /// scanning, in addition to `options.output_dirs`.
    pub fn start_layers(
        &mut self,
        hooks: &HookRegistry,
        options: &ScanOptions,
        sink: &DiagnosticSink,
    ) {
        let mut options = options.clone();
        options
            .output_dirs
            .extend(self.layers.iter().map(|l| l.paths.build_dir.clone()));
        for id in self.active_layers() {
            if !self.get(id).is_active() {
                continue;
            }
            match scan_layer(self.get(id), &options) {
                Ok(sources) => self.layers[id.index()].set_sources(sources),
                Err(err) => {
                    self.fail_layer(err, sink);
                    continue;
                }
            }
            let layer = self.get(id);
            if let Err(source) = hooks.run(LifecycleStage::Start, layer, self) {
                let err = LayerError::Hook {
                    layer: layer.name.clone(),
                    stage: LifecycleStage::Start,
                    source,
                };
                self.fail_layer(err, sink);
                continue;
            }
            debug!(layer = %layer.name, sources = layer.sources().len(), "started layer");
            self.layers[id.index()].state = LayerState::Started;
        }
    }

    /// Runs the validate hook of every active layer.
    pub fn validate_layers(&mut self, hooks: &HookRegistry, sink: &DiagnosticSink) {
        for id in self.active_layers() {
            if !self.get(id).is_active() {
                continue;
            }
            let layer = self.get(id);
            if let Err(source) = hooks.run(LifecycleStage::Validate, layer, self) {
                let err = LayerError::Hook {
                    layer: layer.name.clone(),
                    stage: LifecycleStage::Validate,
                    source,
                };
                self.fail_layer(err, sink);
                continue;
            }
            self.layers[id.index()].state = LayerState::Validated;
        }
    }

    /// Runs initialize, start, and validate over the whole graph.
    pub fn bring_up(&mut self, hooks: &HookRegistry, options: &ScanOptions, sink: &DiagnosticSink) {
        self.initialize_layers(hooks, sink);
        self.start_layers(hooks, options, sink);
        self.validate_layers(hooks, sink);
    }

    /// Replaces a layer's sources directly, bypassing directory scanning.
    pub fn set_layer_sources(&mut self, id: LayerId, sources: Vec<SourceEntry>) {
        self.layers[id.index()].set_sources(sources);
    }

    /// Finds the source defining `type_name` as seen from `requesting`.
    ///
    /// Only the requesting layer and layers it extends are visible; among
    /// those, the highest-positioned definition wins.
    pub fn find_source(&self, type_name: &TypeName, requesting: LayerId) -> Option<&SourceEntry> {
        let mut candidates = self.extended_layers(requesting);
        if self.get(requesting).is_active() {
            candidates.push(requesting);
        }
        candidates.into_iter().rev().find_map(|id| {
            let layer = self.get(id);
            let prefixed = type_name
                .relative_to(&layer.package)
                .and_then(|stem| layer.source_by_stem(&stem))
                .filter(|e| e.prepend_package || layer.package.is_empty());
            prefixed.or_else(|| {
                type_name
                    .relative_to("")
                    .and_then(|stem| layer.source_by_stem(&stem))
                    .filter(|e| !e.prepend_package)
            })
        })
    }
}

impl Default for LayerGraph {
    fn default() -> Self {
        Self::new()
    }
}
