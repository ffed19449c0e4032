//! A single loader node and its resolution rules.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, OnceLock, PoisonError, Weak};

use strata_common::{LayerId, TypeName};

/// A symbol resolved to a compiled artifact.
///
/// Two resolutions denote the same live symbol exactly when they are the
/// same allocation (`Arc::ptr_eq`).
#[derive(Debug, PartialEq, Eq)]
pub struct ResolvedSymbol {
    /// The resolved type.
    pub name: TypeName,
    /// The artifact file the symbol was loaded from.
    pub path: PathBuf,
    /// The build layer whose node resolved it.
    pub layer: LayerId,
}

/// The resolution boundary of one build layer.
pub struct LoaderNode {
    layer: LayerId,
    name: String,
    dirs: Vec<PathBuf>,
    artifact_ext: String,
    build_separate: bool,
    parent: Option<Arc<LoaderNode>>,
    disabled: AtomicBool,
    replacement: OnceLock<Weak<LoaderNode>>,
    activated: Mutex<HashMap<TypeName, Arc<ResolvedSymbol>>>,
    in_flight: AtomicUsize,
}

/// Counts a resolution in progress on a node for as long as it is alive.
struct InFlight<'a>(&'a AtomicUsize);

impl<'a> InFlight<'a> {
    fn enter(counter: &'a AtomicUsize) -> Self {
        counter.fetch_add(1, Ordering::SeqCst);
        Self(counter)
    }
}

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.fetch_sub(1, Ordering::SeqCst);
    }
}

impl LoaderNode {
    pub(crate) fn new(
        layer: LayerId,
        name: String,
        dirs: Vec<PathBuf>,
        artifact_ext: String,
        build_separate: bool,
        parent: Option<Arc<LoaderNode>>,
    ) -> Self {
        Self {
            layer,
            name,
            dirs,
            artifact_ext,
            build_separate,
            parent,
            disabled: AtomicBool::new(false),
            replacement: OnceLock::new(),
            activated: Mutex::new(HashMap::new()),
            in_flight: AtomicUsize::new(0),
        }
    }

    /// The build layer this node belongs to.
    pub fn layer(&self) -> LayerId {
        self.layer
    }

    /// The build layer's name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Artifact directories searched by this node, in order.
    pub fn dirs(&self) -> &[PathBuf] {
        &self.dirs
    }

    /// The enclosing, older node.
    pub fn parent(&self) -> Option<&Arc<LoaderNode>> {
        self.parent.as_ref()
    }

    /// Returns `true` for nodes of build-separate layers, which are never
    /// disabled.
    pub fn is_build_separate(&self) -> bool {
        self.build_separate
    }

    /// Returns `true` once a newer node has superseded this one.
    pub fn is_disabled(&self) -> bool {
        self.disabled.load(Ordering::SeqCst)
    }

    /// The node that superseded this one, if it is still alive.
    pub fn replacement(&self) -> Option<Arc<LoaderNode>> {
        self.replacement.get().and_then(Weak::upgrade)
    }

    /// Number of resolutions currently running through this node.
    pub fn in_flight(&self) -> usize {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Returns `true` if this node has resolved `name` itself.
    pub fn is_activated(&self, name: &TypeName) -> bool {
        self.activated_map().contains_key(name)
    }

    fn activated_map(
        &self,
    ) -> std::sync::MutexGuard<'_, HashMap<TypeName, Arc<ResolvedSymbol>>> {
        self.activated.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Disables this node in favor of `replacement`.
    ///
    /// Returns `false` if the node is build-separate or already disabled.
    pub(crate) fn disable(&self, replacement: &Arc<LoaderNode>) -> bool {
        if self.build_separate || self.disabled.swap(true, Ordering::SeqCst) {
            return false;
        }
        let _ = self.replacement.set(Arc::downgrade(replacement));
        true
    }

    fn find_artifact(&self, name: &TypeName) -> Option<PathBuf> {
        let relative = name.artifact_path(&self.artifact_ext);
        self.dirs
            .iter()
            .map(|dir| dir.join(&relative))
            .find(|path| path.is_file())
    }

    /// Resolves `name` through this node.
    ///
    /// An active node searches its own directories first and falls back to
    /// its parent. A disabled node answers only for symbols it resolved
    /// before it was disabled; anything else goes to its replacement when
    /// that node is idle, and to its parent otherwise.
    pub fn resolve(&self, name: &TypeName) -> Option<Arc<ResolvedSymbol>> {
        let _guard = InFlight::enter(&self.in_flight);

        if let Some(hit) = self.activated_map().get(name) {
            return Some(Arc::clone(hit));
        }

        if !self.is_disabled() {
            if let Some(path) = self.find_artifact(name) {
                let symbol = Arc::new(ResolvedSymbol {
                    name: name.clone(),
                    path,
                    layer: self.layer,
                });
                let mut activated = self.activated_map();
                let entry = activated
                    .entry(name.clone())
                    .or_insert_with(|| Arc::clone(&symbol));
                return Some(Arc::clone(entry));
            }
            return self.parent.as_ref()?.resolve(name);
        }

        match self.replacement() {
            Some(replacement) if replacement.in_flight() == 0 => replacement.resolve(name),
            _ => self.parent.as_ref()?.resolve(name),
        }
    }

    /// Resolves `name` and returns the artifact path, if any.
    pub fn resolve_path(&self, name: &TypeName) -> Option<PathBuf> {
        self.resolve(name).map(|s| s.path.clone())
    }
}

impl std::fmt::Debug for LoaderNode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoaderNode")
            .field("layer", &self.name)
            .field("dirs", &self.dirs)
            .field("disabled", &self.is_disabled())
            .finish()
    }
}
