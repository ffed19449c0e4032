//! Errors raised while registering layers and running their lifecycle.

use std::path::PathBuf;

use strata_diagnostics::{codes, Diagnostic, Location};

use crate::hooks::LifecycleStage;

/// Errors that exclude a single layer from the build.
///
/// None of these abort the graph: the offending layer is left out, a
/// diagnostic is emitted, and registration of the remaining layers continues.
#[derive(Debug, thiserror::Error)]
pub enum LayerError {
    /// A base layer reference names no registered or declared layer.
    #[error("layer `{layer}` extends unknown layer `{base}`")]
    UnknownBaseLayer {
        /// The layer being registered.
        layer: String,
        /// The unresolved base layer name.
        base: String,
    },

    /// A base layer reference resolves to a layer at or after the extender.
    #[error("layer `{layer}` extends `{base}`, which is not positioned before it")]
    ForwardReference {
        /// The layer being registered.
        layer: String,
        /// The forward-referenced base layer.
        base: String,
    },

    /// A layer with this name is already registered.
    #[error("duplicate layer `{layer}`")]
    DuplicateLayer {
        /// The duplicated name.
        layer: String,
    },

    /// A layer extends a layer flagged as final.
    #[error("layer `{layer}` extends final layer `{base}`")]
    ExtendsFinalLayer {
        /// The layer being registered.
        layer: String,
        /// The final base layer.
        base: String,
    },

    /// A lifecycle hook rejected the layer.
    #[error("{stage} of layer `{layer}` failed: {source}")]
    Hook {
        /// The layer whose hook failed.
        layer: String,
        /// The lifecycle step that failed.
        stage: LifecycleStage,
        /// The hook's error.
        #[source]
        source: HookError,
    },

    /// Scanning a source directory failed.
    #[error("failed to scan {path} for layer `{layer}`: {source}")]
    Scan {
        /// The layer being started.
        layer: String,
        /// The directory or file that could not be read.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// An exclusion pattern is not a valid glob.
    #[error("invalid exclude pattern `{pattern}` in layer `{layer}`: {reason}")]
    BadExclude {
        /// The layer declaring the pattern.
        layer: String,
        /// The offending pattern.
        pattern: String,
        /// Why the pattern was rejected.
        reason: String,
    },
}

impl LayerError {
    /// Name of the layer the error excludes.
    pub fn layer(&self) -> &str {
        match self {
            LayerError::UnknownBaseLayer { layer, .. }
            | LayerError::ForwardReference { layer, .. }
            | LayerError::DuplicateLayer { layer }
            | LayerError::ExtendsFinalLayer { layer, .. }
            | LayerError::Hook { layer, .. }
            | LayerError::Scan { layer, .. }
            | LayerError::BadExclude { layer, .. } => layer,
        }
    }

    /// Converts the error into the diagnostic reported to the user.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let code = match self {
            LayerError::UnknownBaseLayer { .. } => codes::UNKNOWN_BASE_LAYER,
            LayerError::ForwardReference { .. } => codes::FORWARD_REFERENCE,
            LayerError::DuplicateLayer { .. } => codes::DUPLICATE_LAYER,
            LayerError::ExtendsFinalLayer { .. } => codes::EXTENDS_FINAL_LAYER,
            LayerError::Hook { .. } | LayerError::Scan { .. } | LayerError::BadExclude { .. } => {
                codes::LIFECYCLE_FAILED
            }
        };
        let location = match self {
            LayerError::Scan { layer, path, .. } => Location::file(layer.as_str(), path),
            _ => Location::layer(self.layer()),
        };
        let diag = Diagnostic::error(code, self.to_string(), location)
            .with_note("the layer is excluded from the build");
        match self {
            LayerError::ForwardReference { .. } => {
                diag.with_help("declare base layers before the layers that extend them")
            }
            _ => diag,
        }
    }
}

/// An error reported by a [`LayerHooks`](crate::LayerHooks) implementation.
#[derive(Debug, thiserror::Error)]
#[error("{0}")]
pub struct HookError(pub String);
