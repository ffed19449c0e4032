//! Chained symbol resolution across build layers.
//!
//! Each build layer gets a [`LoaderNode`] over a fixed list of artifact
//! directories, stacked on the node of the build layer before it. A newer
//! node can disable the older nodes it supersedes so that its recompiled
//! artifacts win, while symbols an older node already resolved keep
//! resolving to the same [`ResolvedSymbol`] instance.

#![warn(missing_docs)]

pub mod chain;
pub mod node;

pub use chain::{ModuleLoaderChain, NodeSpec};
pub use node::{LoaderNode, ResolvedSymbol};
