//! Layers, their flags and lifecycle state, and the source entries they own.

use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::hash::{Hash, Hasher};
use std::path::PathBuf;

use strata_common::{LayerId, TypeName};
use strata_config::{LayerDef, ResolvedLayerPaths};

/// Behavioral flags copied from a layer definition.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct LayerFlags {
    /// Types stay uncompiled and load from source.
    pub dynamic: bool,
    /// Never dynamic; always resolved to compiled artifacts.
    pub compiled_only: bool,
    /// No later layer may extend this one.
    pub final_layer: bool,
    /// Self-contained output that is never superseded.
    pub build_separate: bool,
    /// Omitted from layer listings.
    pub hidden: bool,
    /// Exempt from overlap conflict detection.
    pub transparent: bool,
    /// Owns an output directory and artifact index.
    pub build_layer: bool,
}

impl LayerFlags {
    /// Extracts the flags from a definition.
    pub fn from_def(def: &LayerDef) -> Self {
        Self {
            dynamic: def.dynamic,
            compiled_only: def.compiled_only,
            final_layer: def.final_layer,
            build_separate: def.build_separate,
            hidden: def.hidden,
            transparent: def.transparent,
            build_layer: def.build_layer || def.build_separate,
        }
    }

    /// Whether types defined by this layer are left uncompiled.
    pub fn defines_dynamic_types(&self) -> bool {
        self.dynamic && !self.compiled_only
    }
}

/// Where a layer is in its lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
pub enum LayerState {
    /// Registered from its definition.
    Created,
    /// Base layers confirmed active and the initialize hook has run.
    Initialized,
    /// Sources scanned and the start hook has run.
    Started,
    /// The validate hook has run.
    Validated,
    /// Excluded from the build.
    Removed,
}

/// One source unit contributed by a layer.
///
/// Two entries are equal when they name the same absolute path.
#[derive(Debug, Clone)]
pub struct SourceEntry {
    /// The layer that owns the source.
    pub layer: LayerId,
    /// Absolute path of the file.
    pub absolute_path: PathBuf,
    /// `/`-separated path relative to the source root, with extension.
    pub relative_path: String,
    /// File name without directories or extension.
    pub base_name: String,
    /// Whether the owning layer's package prefix is part of the type name.
    pub prepend_package: bool,
}

impl SourceEntry {
    /// The relative path with its extension removed (`ui/Button.sc` → `ui/Button`).
    pub fn relative_stem(&self) -> &str {
        match self.relative_path.rsplit_once('.') {
            Some((stem, ext)) if !stem.is_empty() && !stem.ends_with('/') && !ext.contains('/') => {
                stem
            }
            _ => &self.relative_path,
        }
    }

    /// The directory part of the relative path, or `""` at the source root.
    pub fn relative_dir(&self) -> &str {
        self.relative_path.rsplit_once('/').map_or("", |(dir, _)| dir)
    }

    /// The fully-qualified type this source defines.
    pub fn type_name(&self, package: &str) -> TypeName {
        let package = if self.prepend_package { package } else { "" };
        TypeName::from_source(package, self.relative_stem())
    }
}

impl PartialEq for SourceEntry {
    fn eq(&self, other: &Self) -> bool {
        self.absolute_path == other.absolute_path
    }
}

impl Eq for SourceEntry {}

impl Hash for SourceEntry {
    fn hash<H: Hasher>(&self, state: &mut H) {
        self.absolute_path.hash(state);
    }
}

/// A registered layer.
#[derive(Debug)]
pub struct Layer {
    /// Position in the graph (topological rank).
    pub id: LayerId,
    /// Unique name.
    pub name: String,
    /// Dotted package prefix.
    pub package: String,
    /// Directly extended layers, in declaration order.
    pub base_layers: Vec<LayerId>,
    /// Behavioral flags.
    pub flags: LayerFlags,
    /// Absolute root, source and build directories.
    pub paths: ResolvedLayerPaths,
    /// Exclusion globs over source-relative paths.
    pub excludes: Vec<String>,
    /// Names of layers this one declares it modifies.
    pub modifies: Vec<String>,
    /// Lifecycle state.
    pub state: LayerState,
    sources: Vec<SourceEntry>,
    by_stem: HashMap<String, usize>,
    dir_index: BTreeMap<String, BTreeSet<String>>,
}

impl Layer {
    pub(crate) fn new(
        id: LayerId,
        def: &LayerDef,
        base_layers: Vec<LayerId>,
        paths: ResolvedLayerPaths,
    ) -> Self {
        Self {
            id,
            name: def.name.clone(),
            package: def.package.clone(),
            base_layers,
            flags: LayerFlags::from_def(def),
            paths,
            excludes: def.exclude.clone(),
            modifies: def.modifies.clone(),
            state: LayerState::Created,
            sources: Vec::new(),
            by_stem: HashMap::new(),
            dir_index: BTreeMap::new(),
        }
    }

    /// Returns `true` unless the layer has been removed.
    pub fn is_active(&self) -> bool {
        self.state != LayerState::Removed
    }

    /// The package prefix with dots replaced by `/`.
    pub fn package_path(&self) -> String {
        self.package.replace('.', "/")
    }

    /// Sources in discovery order.
    pub fn sources(&self) -> &[SourceEntry] {
        &self.sources
    }

    /// Looks up a source by its extension-less relative path.
    pub fn source_by_stem(&self, stem: &str) -> Option<&SourceEntry> {
        self.by_stem.get(stem).map(|&i| &self.sources[i])
    }

    /// Base names per relative directory, used for overlap checks.
    pub fn dir_index(&self) -> &BTreeMap<String, BTreeSet<String>> {
        &self.dir_index
    }

    /// Returns `true` if this layer declares that it modifies `other`.
    pub fn declares_modifies(&self, other: &str) -> bool {
        self.modifies.iter().any(|m| m == other)
    }

    /// Replaces the layer's sources, rebuilding the lookup indexes.
    ///
    /// The first entry for a given relative stem wins, so earlier source
    /// directories shadow later ones within a layer.
    pub fn set_sources(&mut self, sources: Vec<SourceEntry>) {
        self.by_stem.clear();
        self.dir_index.clear();
        let mut kept = Vec::with_capacity(sources.len());
        for entry in sources {
            let stem = entry.relative_stem().to_string();
            if self.by_stem.contains_key(&stem) {
                continue;
            }
            self.dir_index
                .entry(entry.relative_dir().to_string())
                .or_default()
                .insert(entry.base_name.clone());
            self.by_stem.insert(stem, kept.len());
            kept.push(entry);
        }
        self.sources = kept;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn entry(rel: &str) -> SourceEntry {
        let base = Path::new(rel)
            .file_stem()
            .and_then(|s| s.to_str())
            .unwrap_or_default()
            .to_string();
        SourceEntry {
            layer: LayerId::from_raw(0),
            absolute_path: PathBuf::from("/proj/core").join(rel),
            relative_path: rel.to_string(),
            base_name: base,
            prepend_package: true,
        }
    }

    fn layer() -> Layer {
        let def = LayerDef::new("core").with_package("sys.core");
        let paths = ResolvedLayerPaths {
            root: PathBuf::from("/proj/core"),
            source_dirs: vec![PathBuf::from("/proj/core")],
            build_dir: PathBuf::from("/proj/build/core"),
        };
        Layer::new(LayerId::from_raw(0), &def, Vec::new(), paths)
    }

    #[test]
    fn source_entry_paths() {
        let e = entry("ui/Button.sc");
        assert_eq!(e.relative_stem(), "ui/Button");
        assert_eq!(e.relative_dir(), "ui");
        assert_eq!(e.type_name("sys.core").as_str(), "sys.core.ui.Button");
        let root = entry("Main");
        assert_eq!(root.relative_stem(), "Main");
        assert_eq!(root.relative_dir(), "");
    }

    #[test]
    fn no_package_prepend() {
        let mut e = entry("Main.sc");
        e.prepend_package = false;
        assert_eq!(e.type_name("sys.core").as_str(), "Main");
    }

    #[test]
    fn equality_is_by_absolute_path() {
        let a = entry("ui/Button.sc");
        let mut b = entry("ui/Button.sc");
        b.layer = LayerId::from_raw(9);
        b.prepend_package = false;
        assert_eq!(a, b);
        assert_ne!(a, entry("ui/Label.sc"));
    }

    #[test]
    fn set_sources_indexes_directories() {
        let mut l = layer();
        l.set_sources(vec![
            entry("Main.sc"),
            entry("ui/Button.sc"),
            entry("ui/Label.sc"),
            entry("ui/Button.alt"),
        ]);
        assert_eq!(l.sources().len(), 3, "duplicate stem is shadowed");
        assert!(l.source_by_stem("ui/Button").is_some());
        assert!(l.source_by_stem("ui/Missing").is_none());
        let ui = &l.dir_index()["ui"];
        assert!(ui.contains("Button") && ui.contains("Label"));
        assert!(l.dir_index()[""].contains("Main"));
    }

    #[test]
    fn flags_build_separate_implies_build_layer() {
        let mut def = LayerDef::new("x");
        def.build_separate = true;
        assert!(LayerFlags::from_def(&def).build_layer);
        def.dynamic = true;
        def.compiled_only = true;
        assert!(!LayerFlags::from_def(&def).defines_dynamic_types());
    }

    #[test]
    fn package_path_uses_slashes() {
        assert_eq!(layer().package_path(), "sys/core");
    }
}
