//! The stack of loader nodes, newest first.

use std::collections::HashMap;
use std::path::PathBuf;
use std::sync::Arc;

use strata_common::{LayerId, TypeName};
use tracing::info;

use crate::node::{LoaderNode, ResolvedSymbol};

/// Everything needed to construct the node of one build layer.
#[derive(Debug, Clone)]
pub struct NodeSpec {
    /// The build layer.
    pub layer: LayerId,
    /// The build layer's name, for logging.
    pub name: String,
    /// Artifact directories, searched in order.
    pub dirs: Vec<PathBuf>,
    /// Extension of compiled artifacts.
    pub artifact_ext: String,
    /// Whether the layer is built separately and must never be disabled.
    pub build_separate: bool,
}

/// A singly linked chain of [`LoaderNode`]s, newest first.
///
/// A build layer may own several nodes when it is rebuilt within one
/// process; the newest one answers for it. Cloning shares the nodes.
#[derive(Debug, Clone, Default)]
pub struct ModuleLoaderChain {
    nodes: Vec<Arc<LoaderNode>>,
    by_layer: HashMap<LayerId, usize>,
}

impl ModuleLoaderChain {
    /// Creates an empty chain.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stacks a new node on the current head.
    ///
    /// Every ancestor for which `supersedes` returns `true` is disabled with
    /// the new node as its replacement, except build-separate nodes.
    pub fn push_node(
        &mut self,
        spec: NodeSpec,
        supersedes: impl Fn(&LoaderNode) -> bool,
    ) -> Arc<LoaderNode> {
        let node = Arc::new(LoaderNode::new(
            spec.layer,
            spec.name,
            spec.dirs,
            spec.artifact_ext,
            spec.build_separate,
            self.head(),
        ));

        let mut ancestor = node.parent().cloned();
        while let Some(current) = ancestor {
            if !current.is_build_separate() && supersedes(&current) && current.disable(&node) {
                info!(
                    disabled = %current.name(),
                    replacement = %node.name(),
                    "loader node superseded"
                );
            }
            ancestor = current.parent().cloned();
        }

        self.by_layer.insert(node.layer(), self.nodes.len());
        self.nodes.push(Arc::clone(&node));
        node
    }

    /// The newest node.
    pub fn head(&self) -> Option<Arc<LoaderNode>> {
        self.nodes.last().cloned()
    }

    /// The node constructed for a build layer.
    pub fn node_for(&self, layer: LayerId) -> Option<Arc<LoaderNode>> {
        self.by_layer.get(&layer).map(|&i| Arc::clone(&self.nodes[i]))
    }

    /// Number of nodes.
    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    /// Returns `true` if no node has been pushed.
    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Resolves a symbol through the newest node.
    pub fn resolve(&self, name: &TypeName) -> Option<Arc<ResolvedSymbol>> {
        self.nodes.last()?.resolve(name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::Path;

    fn spec(id: u32, name: &str, dirs: &[&Path]) -> NodeSpec {
        NodeSpec {
            layer: LayerId::from_raw(id),
            name: name.to_string(),
            dirs: dirs.iter().map(|d| d.to_path_buf()).collect(),
            artifact_ext: "bin".to_string(),
            build_separate: false,
        }
    }

    fn write_artifact(dir: &Path, rel: &str) {
        let path = dir.join(rel);
        std::fs::create_dir_all(path.parent().unwrap()).unwrap();
        std::fs::write(path, rel).unwrap();
    }

    #[test]
    fn newest_node_wins_for_fresh_symbols() {
        let tmp = tempfile::tempdir().unwrap();
        let (a, b) = (tmp.path().join("a"), tmp.path().join("b"));
        write_artifact(&a, "app/S.bin");
        write_artifact(&b, "app/S.bin");

        let mut chain = ModuleLoaderChain::new();
        chain.push_node(spec(0, "a", &[&a]), |_| false);
        chain.push_node(spec(1, "b", &[&b, &a]), |_| true);

        let s = chain.resolve(&TypeName::new("app.S")).unwrap();
        assert_eq!(s.path, b.join("app/S.bin"));
        assert_eq!(s.layer, LayerId::from_raw(1));
    }

    #[test]
    fn activated_symbols_keep_identity_after_supersession() {
        let tmp = tempfile::tempdir().unwrap();
        let (a, b) = (tmp.path().join("a"), tmp.path().join("b"));
        write_artifact(&a, "app/S.bin");
        write_artifact(&a, "app/T.bin");
        write_artifact(&b, "app/S.bin");
        write_artifact(&b, "app/T.bin");

        let mut chain = ModuleLoaderChain::new();
        let node_a = chain.push_node(spec(0, "a", &[&a]), |_| false);
        let s = TypeName::new("app.S");
        let t = TypeName::new("app.T");

        let before = node_a.resolve(&s).unwrap();
        assert!(node_a.is_activated(&s));

        let node_b = chain.push_node(spec(1, "b", &[&b, &a]), |n| n.name() == "a");
        assert!(node_a.is_disabled());
        assert!(Arc::ptr_eq(&node_a.replacement().unwrap(), &node_b));

        let after = node_a.resolve(&s).unwrap();
        assert!(Arc::ptr_eq(&before, &after));

        let fresh = node_a.resolve(&t).unwrap();
        assert_eq!(fresh.layer, LayerId::from_raw(1));
        assert_eq!(fresh.path, b.join("app/T.bin"));
        assert!(!node_a.is_activated(&t));
        assert_eq!(node_a.in_flight(), 0);
    }

    #[test]
    fn build_separate_nodes_are_never_disabled() {
        let tmp = tempfile::tempdir().unwrap();
        let a = tmp.path().join("a");
        let mut chain = ModuleLoaderChain::new();
        let mut sep = spec(0, "a", &[&a]);
        sep.build_separate = true;
        let node_a = chain.push_node(sep, |_| false);
        chain.push_node(spec(1, "b", &[]), |_| true);
        assert!(!node_a.is_disabled());
    }

    #[test]
    fn miss_falls_back_to_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let (a, b) = (tmp.path().join("a"), tmp.path().join("b"));
        write_artifact(&a, "lib/Only.bin");
        let mut chain = ModuleLoaderChain::new();
        chain.push_node(spec(0, "a", &[&a]), |_| false);
        chain.push_node(spec(1, "b", &[&b]), |_| false);

        let hit = chain.resolve(&TypeName::new("lib.Only")).unwrap();
        assert_eq!(hit.layer, LayerId::from_raw(0));
        assert!(chain.resolve(&TypeName::new("lib.Nowhere")).is_none());
        assert_eq!(chain.node_for(LayerId::from_raw(0)).unwrap().name(), "a");
    }

    #[test]
    fn busy_replacement_delegates_to_parent() {
        let tmp = tempfile::tempdir().unwrap();
        let (root, a, b) = (tmp.path().join("root"), tmp.path().join("a"), tmp.path().join("b"));
        write_artifact(&root, "x/T.bin");
        write_artifact(&b, "x/T.bin");

        let mut chain = ModuleLoaderChain::new();
        chain.push_node(spec(0, "root", &[&root]), |_| false);
        chain.push_node(spec(1, "a", &[&a]), |_| false);
        let node_a = chain.node_for(LayerId::from_raw(1)).unwrap();
        chain.push_node(spec(2, "b", &[&b]), |n| n.name() == "a");

        let through_b = chain.resolve(&TypeName::new("x.T")).unwrap();
        assert_eq!(through_b.layer, LayerId::from_raw(2));
        let via_a = node_a.resolve(&TypeName::new("x.T")).unwrap();
        assert_eq!(via_a.layer, LayerId::from_raw(2));
        // `b` misses and falls back to `a`, which sees `b` busy and hands
        // the lookup to its own parent instead of looping.
        assert!(chain.resolve(&TypeName::new("x.Missing")).is_none());
    }
}
