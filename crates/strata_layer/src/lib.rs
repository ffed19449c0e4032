//! The layer graph: ordered overlay modules, their extension DAG, and
//! namespace overlap detection.
//!
//! A [`LayerGraph`] registers declarative layer definitions in order, assigns
//! each a position, and records extension edges. Every visibility question
//! ("can this layer see that one's types?") is answered by
//! [`LayerGraph::extends_layer`]. The graph also computes the build order of
//! a build layer, groups independent build layers into parallel waves, and
//! reports unrelated layers whose namespaces collide.

#![warn(missing_docs)]

pub mod error;
pub mod graph;
pub mod hooks;
pub mod layer;
pub mod order;
pub mod overlap;
pub mod scan;

pub use error::{HookError, LayerError};
pub use graph::LayerGraph;
pub use hooks::{HookRegistry, LayerHooks, LifecycleStage};
pub use layer::{Layer, LayerFlags, LayerState, SourceEntry};
pub use order::SortTier;
pub use overlap::structural_overlap;
pub use scan::{scan_layer, ScanOptions};
