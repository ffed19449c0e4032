//! One incremental build pass over a single build layer.

use std::collections::{BTreeSet, HashMap};
use std::path::Path;
use std::sync::Arc;

use strata_cache::{
    disk_state, ArtifactIndex, BuildLayout, BuildMarker, CacheError, DiskState,
    DynamicTypeRegistry, SnapshotError, TypeRole,
};
use strata_common::{ContentHash, LayerId, TypeName};
use strata_diagnostics::{codes, Diagnostic, DiagnosticSink, Location};
use strata_layer::{Layer, LayerGraph, SourceEntry};
use tracing::{debug, info, warn};

use crate::error::BuildError;
use crate::package_index::PackageIndex;
use crate::producer::{GeneratedFile, SourceContext, SourceProducer};
use crate::scheduler::BuildOptions;

/// A generated file that needs a compile step.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CompileRequest {
    /// The file's key.
    pub key: String,
    /// The type it was generated from.
    pub type_name: TypeName,
    /// Whether the pass wrote new bytes for it.
    pub changed: bool,
}

/// Counters and decisions of one pass.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PassReport {
    /// The incremental state was discarded before the pass.
    pub full_rebuild: bool,
    /// Files written with new bytes.
    pub written: usize,
    /// Files whose bytes were already current.
    pub unchanged: usize,
    /// Records copied from the previous build layer.
    pub inherited: usize,
    /// Keys whose on-disk files were modified by hand and left alone.
    pub drifted: Vec<String>,
    /// Keys whose files were swept because nothing produces them any more.
    pub deleted: Vec<String>,
    /// Files to hand to the compiler.
    pub compile_queue: Vec<CompileRequest>,
}

/// The persisted state of a build layer after its pass.
#[derive(Debug)]
pub struct FinishedLayer {
    /// The build layer.
    pub layer: LayerId,
    /// Where its files live.
    pub layout: BuildLayout,
    /// Its artifact index.
    pub index: ArtifactIndex,
    /// Its dynamic-type set.
    pub dynamic: DynamicTypeRegistry,
    /// Every type it can see and the source defining it.
    pub packages: PackageIndex,
    /// Keys this layer serves from its own output directory rather than
    /// inheriting, whether or not this pass rewrote them.
    pub local: BTreeSet<String>,
}

struct PassState {
    index: ArtifactIndex,
    report: PassReport,
    local: BTreeSet<String>,
}

/// The previous build layer a pass may inherit from.
struct Upstream<'a> {
    id: LayerId,
    state: &'a FinishedLayer,
    /// Layers after it in the current build order, up to the current layer.
    between: Vec<LayerId>,
}

pub(crate) struct BuildPass<'a> {
    pub(crate) graph: &'a LayerGraph,
    pub(crate) id: LayerId,
    pub(crate) producer: &'a dyn SourceProducer,
    pub(crate) options: &'a BuildOptions,
    pub(crate) finished: &'a HashMap<LayerId, Arc<FinishedLayer>>,
    pub(crate) sink: &'a DiagnosticSink,
}

impl<'a> BuildPass<'a> {
    fn layer(&self) -> &'a Layer {
        self.graph.get(self.id)
    }

    fn cache_error(&self) -> impl FnOnce(CacheError) -> BuildError + 'a {
        let layer = self.layer().name.clone();
        move |source| BuildError::Cache { layer, source }
    }

    fn io_error(&self, path: &Path) -> impl FnOnce(std::io::Error) -> BuildError + 'a {
        let layer = self.layer().name.clone();
        let path = path.to_path_buf();
        move |source| BuildError::Io {
            layer,
            path,
            source,
        }
    }

    pub(crate) fn run(self) -> Result<(FinishedLayer, PassReport), BuildError> {
        let layer = self.layer();
        let layout = BuildLayout::new(&layer.paths.build_dir);
        let marker = BuildMarker::new(layout.marker_path());

        let mut full_rebuild = self.options.build_all;
        if marker.check().is_interrupted() {
            self.sink.emit(
                Diagnostic::warning(
                    codes::INTERRUPTED_BUILD,
                    format!("the last build of `{}` did not complete", layer.name),
                    Location::file(layer.name.as_str(), marker.path()),
                )
                .with_note("the layer is rebuilt from scratch"),
            );
            full_rebuild = true;
        }
        let mut index = self.load_or_reset(ArtifactIndex::load(&layout), &mut full_rebuild);
        let mut dynamic = self.load_or_reset(DynamicTypeRegistry::load(&layout), &mut full_rebuild);
        // Loaded records survive a full rebuild so drift checks and the
        // stale sweep still see the previous outputs.
        if full_rebuild {
            dynamic = DynamicTypeRegistry::new();
        }
        info!(layer = %layer.name, full_rebuild, records = index.len(), "starting build pass");

        marker.write_started().map_err(self.cache_error())?;

        let upstream = self.upstream()?;
        if dynamic.is_empty() {
            if let Some(up) = &upstream {
                dynamic.inherit_from(&up.state.dynamic);
            }
        }

        let packages = self.effective_sources();

        index.begin_pass();
        let mut st = PassState {
            index,
            report: PassReport {
                full_rebuild,
                ..PassReport::default()
            },
            local: BTreeSet::new(),
        };
        for (type_name, entry) in packages.iter() {
            let owner = self.graph.get(entry.layer);
            let cx = SourceContext {
                owner,
                build_layer: layer,
                type_name,
            };
            let output = self
                .producer
                .produce(entry, cx)
                .map_err(self.io_error(&entry.absolute_path))?;

            if !owner.flags.compiled_only && (owner.flags.dynamic || output.dynamic) {
                if output.synchronized {
                    dynamic.mark_synchronized(type_name.clone());
                } else {
                    dynamic.mark(type_name.clone());
                }
            }
            for file in output.files {
                self.place(file, entry, type_name, upstream.as_ref(), &layout, &mut st)?;
            }
        }

        let sweep = st.index.sweep(&layout).map_err(self.cache_error())?;
        for key in &sweep.drifted {
            self.report_drift(key, &layout, "it is no longer produced but was left in place");
        }
        st.report.deleted = sweep.deleted;
        st.report.drifted.extend(sweep.drifted);

        let removed = dynamic.prune(|t| {
            packages
                .source(t)
                .is_some_and(|e| !self.graph.get(e.layer).flags.compiled_only)
        });
        for (type_name, role) in removed {
            if role == TypeRole::Synchronized && !packages.contains(&type_name) {
                self.sink.emit(Diagnostic::error(
                    codes::UNREACHABLE_SYNC_TYPE,
                    format!("synchronized dynamic type `{type_name}` is no longer defined by any source"),
                    Location::layer(layer.name.as_str()),
                ));
            }
        }

        st.index.persist(&layout).map_err(self.cache_error())?;
        dynamic.persist(&layout).map_err(self.cache_error())?;
        marker.write_completed().map_err(self.cache_error())?;

        let report = st.report;
        info!(
            layer = %layer.name,
            written = report.written,
            unchanged = report.unchanged,
            inherited = report.inherited,
            deleted = report.deleted.len(),
            drifted = report.drifted.len(),
            "build pass finished"
        );
        let finished = FinishedLayer {
            layer: self.id,
            layout,
            index: st.index,
            dynamic,
            packages,
            local: st.local,
        };
        Ok((finished, report))
    }

    fn load_or_reset<T: Default>(&self, loaded: Result<T, SnapshotError>, full: &mut bool) -> T {
        match loaded {
            Ok(value) => value,
            Err(err) if !err.is_corruption() => T::default(),
            Err(err) => {
                warn!(layer = %self.layer().name, error = %err, "discarding unreadable build state");
                self.sink.emit(
                    Diagnostic::warning(
                        codes::INDEX_CORRUPTION,
                        err.to_string(),
                        Location::layer(self.layer().name.as_str()),
                    )
                    .with_note("the layer is rebuilt from scratch"),
                );
                *full = true;
                T::default()
            }
        }
    }

    fn upstream(&self) -> Result<Option<Upstream<'a>>, BuildError> {
        let Some(previous) = self.graph.previous_build_layer(self.id) else {
            return Ok(None);
        };
        let state = self
            .finished
            .get(&previous)
            .ok_or_else(|| BuildError::Inheritance {
                layer: self.layer().name.clone(),
                previous: self.graph.name(previous).to_string(),
            })?;
        let between = self
            .graph
            .build_order(self.id)
            .into_iter()
            .filter(|&l| l > previous && l <= self.id)
            .collect();
        Ok(Some(Upstream {
            id: previous,
            state,
            between,
        }))
    }

    /// Walks the build order, letting later layers override earlier
    /// definitions of the same type.
    fn effective_sources(&self) -> PackageIndex {
        let mut packages = PackageIndex::new();
        for id in self.graph.build_order(self.id) {
            let layer = self.graph.get(id);
            for entry in layer.sources() {
                if let Some(replaced) = packages.insert(entry.type_name(&layer.package), entry.clone())
                {
                    debug!(
                        source = %entry.relative_path,
                        by = %layer.name,
                        over = %self.graph.name(replaced),
                        "source overridden"
                    );
                }
            }
        }
        packages
    }

    fn can_inherit(&self, owner: LayerId, up: &Upstream<'_>) -> bool {
        owner <= up.id
            && self.graph.extends_or_same(up.id, owner)
            && up
                .between
                .iter()
                .all(|&l| self.graph.cache_sharing_allowed(owner, l))
    }

    fn place(
        &self,
        file: GeneratedFile,
        entry: &SourceEntry,
        type_name: &TypeName,
        upstream: Option<&Upstream<'_>>,
        layout: &BuildLayout,
        st: &mut PassState,
    ) -> Result<(), BuildError> {
        let key = file.relative_path.clone();
        let extension = file.extension().to_string();
        let path = layout.artifact_path(&key);

        let inherit_from = upstream
            .filter(|up| up.state.index.contains(&key) && self.can_inherit(entry.layer, up));
        let changed = if let Some(up) = inherit_from {
            let expected = st
                .index
                .get(&key)
                .or_else(|| up.state.index.get(&key))
                .map(|r| r.hash);
            if let Some(expected) = expected {
                match disk_state(&path, &expected).map_err(self.cache_error())? {
                    DiskState::Matches => {
                        std::fs::remove_file(&path).map_err(self.io_error(&path))?;
                    }
                    DiskState::Drifted => {
                        self.report_drift(&key, layout, "the inherited artifact is used instead");
                        st.report.drifted.push(key.clone());
                    }
                    DiskState::Missing => {}
                }
            }
            st.index.inherit_from(&up.state.index, &key);
            st.report.inherited += 1;
            debug!(key = %key, from = %self.graph.name(up.id), "inherited artifact record");
            false
        } else {
            let bytes = file
                .content
                .produce()
                .map_err(self.io_error(&entry.absolute_path))?;
            let hash = ContentHash::from_bytes(&bytes);
            let on_disk = match st.index.get(&key) {
                Some(record) => disk_state(&path, &record.hash).map_err(self.cache_error())?,
                None => DiskState::Missing,
            };
            st.local.insert(key.clone());
            match on_disk {
                DiskState::Matches
                    if !st.report.full_rebuild && st.index.is_current(&key, &hash) =>
                {
                    st.index.mark_in_use(&key);
                    st.report.unchanged += 1;
                    false
                }
                // An interrupted pass may have written the new bytes before
                // persisting its index.
                DiskState::Drifted if self.holds(&path, &hash)? => {
                    st.index.record(&key, hash, &extension);
                    st.report.unchanged += 1;
                    false
                }
                DiskState::Drifted => {
                    self.report_drift(&key, layout, "the regenerated content was not written");
                    st.index.mark_in_use(&key);
                    st.report.drifted.push(key.clone());
                    false
                }
                _ => {
                    if let Some(parent) = path.parent() {
                        std::fs::create_dir_all(parent).map_err(self.io_error(parent))?;
                    }
                    std::fs::write(&path, &bytes).map_err(self.io_error(&path))?;
                    st.index.record(&key, hash, &extension);
                    st.report.written += 1;
                    true
                }
            }
        };

        for dependent in &file.dependent_files {
            st.index.mark_in_use(dependent);
        }
        if file.needs_compile {
            st.report.compile_queue.push(CompileRequest {
                key,
                type_name: type_name.clone(),
                changed,
            });
        }
        Ok(())
    }

    fn holds(&self, path: &Path, hash: &ContentHash) -> Result<bool, BuildError> {
        let on_disk = ContentHash::of_file(path).map_err(self.io_error(path))?;
        Ok(on_disk == *hash)
    }

    fn report_drift(&self, key: &str, layout: &BuildLayout, outcome: &str) {
        let name = &self.layer().name;
        warn!(layer = %name, key = %key, "generated file modified on disk");
        self.sink.emit(
            Diagnostic::warning(
                codes::ARTIFACT_DRIFT,
                format!("generated file `{key}` was modified after it was generated"),
                Location::file(name.as_str(), &layout.artifact_path(key)),
            )
            .with_note(outcome.to_string())
            .with_help("delete the file or restore its generated content"),
        );
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::producer::SourceOutput;
    use strata_config::{LayerDef, ResolvedLayerPaths};

    struct Nothing;

    impl SourceProducer for Nothing {
        fn produce(&self, _: &SourceEntry, _: SourceContext<'_>) -> std::io::Result<SourceOutput> {
            Ok(SourceOutput::default())
        }
    }

    fn paths(root: &Path, name: &str) -> ResolvedLayerPaths {
        ResolvedLayerPaths {
            root: root.join(name),
            source_dirs: vec![root.join(name)],
            build_dir: root.join("build").join(name),
        }
    }

    #[test]
    fn missing_upstream_state_aborts() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = LayerGraph::new();
        graph
            .register(&LayerDef::new("a").as_build_layer(), paths(dir.path(), "a"))
            .unwrap();
        let b = graph
            .register(
                &LayerDef::new("b").extending(&["a"]).as_build_layer(),
                paths(dir.path(), "b"),
            )
            .unwrap();

        let finished = HashMap::new();
        let sink = DiagnosticSink::new();
        let pass = BuildPass {
            graph: &graph,
            id: b,
            producer: &Nothing,
            options: &BuildOptions::default(),
            finished: &finished,
            sink: &sink,
        };
        let err = pass.run().unwrap_err();
        assert!(matches!(err, BuildError::Inheritance { ref previous, .. } if previous == "a"));
        assert!(err.is_fatal());
    }

    #[test]
    fn empty_layer_completes_and_persists() {
        let dir = tempfile::tempdir().unwrap();
        let mut graph = LayerGraph::new();
        let a = graph
            .register(&LayerDef::new("a"), paths(dir.path(), "a"))
            .unwrap();
        let finished = HashMap::new();
        let sink = DiagnosticSink::new();
        let pass = BuildPass {
            graph: &graph,
            id: a,
            producer: &Nothing,
            options: &BuildOptions::default(),
            finished: &finished,
            sink: &sink,
        };
        let (state, report) = pass.run().unwrap();
        assert_eq!(report, PassReport::default());
        assert!(state.index.is_empty());
        let layout = BuildLayout::new(dir.path().join("build/a"));
        assert!(layout.index_path().exists());
        assert!(layout.dynamic_path().exists());
        assert!(!BuildMarker::new(layout.marker_path()).check().is_interrupted());
    }
}
