//! Answers where a type should be loaded from.

use std::path::PathBuf;

use strata_common::{LayerId, TypeName};
use strata_layer::{LayerGraph, SourceEntry};

use crate::scheduler::BuildOutcome;

/// Where a type comes from, as seen by a requesting layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Resolution {
    /// Load the type from its source.
    Source(SourceEntry),
    /// Load the type from a compiled artifact.
    Compiled(PathBuf),
}

/// Resolves types against the layer graph and a finished build.
pub struct TypeResolver<'a> {
    graph: &'a LayerGraph,
    outcome: &'a BuildOutcome,
}

impl<'a> TypeResolver<'a> {
    /// Creates a resolver.
    pub fn new(graph: &'a LayerGraph, outcome: &'a BuildOutcome) -> Self {
        Self { graph, outcome }
    }

    /// Resolves `type_name` for `requesting`.
    ///
    /// The defining source is the highest-positioned visible definition.
    /// Dynamic types and types without a compiled artifact resolve to that
    /// source; everything else resolves through the loader node of the build
    /// layer covering the requester. Returns `None` if no visible layer
    /// defines the type.
    pub fn resolve(&self, type_name: &TypeName, requesting: LayerId) -> Option<Resolution> {
        let entry = self.graph.find_source(type_name, requesting)?;
        let source = || Resolution::Source(entry.clone());

        let Some(cover) = self.graph.covering_build_layer(requesting) else {
            return Some(source());
        };
        if self.is_dynamic(type_name, cover) {
            return Some(source());
        }
        let compiled = self
            .outcome
            .loader
            .node_for(cover)
            .and_then(|node| node.resolve(type_name))
            .map(|symbol| Resolution::Compiled(symbol.path.clone()));
        Some(compiled.unwrap_or_else(source))
    }

    /// Returns `true` if `build_layer` or any build layer before it in the
    /// build-layer chain marked the type dynamic.
    pub fn is_dynamic(&self, type_name: &TypeName, build_layer: LayerId) -> bool {
        let mut current = Some(build_layer);
        while let Some(id) = current {
            if self
                .outcome
                .layer(id)
                .is_some_and(|state| state.dynamic.is_dynamic(type_name))
            {
                return true;
            }
            current = self.graph.previous_build_layer(id);
        }
        false
    }
}
