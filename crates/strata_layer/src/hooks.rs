//! Lifecycle hooks that layer definitions plug into the graph.
//!
//! A layer may carry code that runs when it is initialized, started, or
//! validated. Implementations register themselves by layer name in a
//! [`HookRegistry`]; the graph calls them in position order.

use std::collections::HashMap;
use std::fmt;

use crate::error::HookError;
use crate::graph::LayerGraph;
use crate::layer::Layer;

/// The lifecycle step a hook runs at.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LifecycleStage {
    /// After base layers are confirmed active.
    Initialize,
    /// After the layer's sources are scanned.
    Start,
    /// After every layer has started.
    Validate,
}

impl fmt::Display for LifecycleStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            LifecycleStage::Initialize => write!(f, "initialize"),
            LifecycleStage::Start => write!(f, "start"),
            LifecycleStage::Validate => write!(f, "validate"),
        }
    }
}

/// Per-layer lifecycle callbacks. Every method defaults to a no-op.
pub trait LayerHooks: Send + Sync {
    /// Called once the layer's base layers are known to be active.
    fn initialize(&self, _layer: &Layer) -> Result<(), HookError> {
        Ok(())
    }

    /// Called after the layer's source directories have been scanned.
    fn start(&self, _layer: &Layer) -> Result<(), HookError> {
        Ok(())
    }

    /// Called after every active layer has started.
    fn validate(&self, _layer: &Layer, _graph: &LayerGraph) -> Result<(), HookError> {
        Ok(())
    }
}

/// Hook implementations keyed by layer name.
#[derive(Default)]
pub struct HookRegistry {
    hooks: HashMap<String, Box<dyn LayerHooks>>,
}

impl HookRegistry {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers hooks for a layer, replacing any previous registration.
    pub fn register(&mut self, layer: impl Into<String>, hooks: impl LayerHooks + 'static) {
        self.hooks.insert(layer.into(), Box::new(hooks));
    }

    /// Returns the hooks registered for a layer.
    pub fn get(&self, layer: &str) -> Option<&dyn LayerHooks> {
        self.hooks.get(layer).map(|h| h.as_ref())
    }

    /// Runs one lifecycle stage of a layer's hooks, if any are registered.
    pub fn run(
        &self,
        stage: LifecycleStage,
        layer: &Layer,
        graph: &LayerGraph,
    ) -> Result<(), HookError> {
        let Some(hooks) = self.get(&layer.name) else {
            return Ok(());
        };
        match stage {
            LifecycleStage::Initialize => hooks.initialize(layer),
            LifecycleStage::Start => hooks.start(layer),
            LifecycleStage::Validate => hooks.validate(layer, graph),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    struct Reject;

    impl LayerHooks for Reject {
        fn start(&self, layer: &Layer) -> Result<(), HookError> {
            Err(HookError(format!("{} refuses to start", layer.name)))
        }
    }

    #[test]
    fn stage_display() {
        assert_eq!(LifecycleStage::Initialize.to_string(), "initialize");
        assert_eq!(LifecycleStage::Validate.to_string(), "validate");
    }

    #[test]
    fn registry_lookup() {
        let mut reg = HookRegistry::new();
        reg.register("ui", Reject);
        assert!(reg.get("ui").is_some());
        assert!(reg.get("core").is_none());
    }
}
