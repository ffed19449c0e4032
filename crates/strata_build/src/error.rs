//! Build errors.

use std::path::PathBuf;

use strata_cache::CacheError;
use strata_common::InternalError;
use strata_diagnostics::{codes, Diagnostic, Location};

/// Errors raised by a build pass.
///
/// Only [`BuildError::Inheritance`] and [`BuildError::Internal`] abort the
/// whole build. The others fail a single build layer, which is reported as a
/// diagnostic while independent layers carry on.
#[derive(Debug, thiserror::Error)]
pub enum BuildError {
    /// A previous build layer's finished state was not available when a
    /// later build layer needed to inherit from it.
    #[error("build layer `{layer}` cannot inherit from `{previous}`: it has not finished")]
    Inheritance {
        /// The build layer being built.
        layer: String,
        /// The build layer it inherits from.
        previous: String,
    },

    /// Reading a source or writing a generated file failed.
    #[error("I/O error in layer `{layer}` at {path}: {source}")]
    Io {
        /// The build layer being built.
        layer: String,
        /// The file involved.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// Loading or saving the build layer's state failed.
    #[error("cache error in layer `{layer}`: {source}")]
    Cache {
        /// The build layer being built.
        layer: String,
        /// The underlying cache error.
        #[source]
        source: CacheError,
    },

    /// A broken invariant inside the builder.
    #[error(transparent)]
    Internal(#[from] InternalError),
}

impl BuildError {
    /// Returns `true` if the error stops the whole build.
    pub fn is_fatal(&self) -> bool {
        matches!(self, BuildError::Inheritance { .. } | BuildError::Internal(_))
    }

    /// The diagnostic reported for a failed build layer.
    pub fn to_diagnostic(&self) -> Diagnostic {
        let location = match self {
            BuildError::Io { layer, path, .. } => Location::file(layer.as_str(), path),
            BuildError::Cache { layer, .. } | BuildError::Inheritance { layer, .. } => {
                Location::layer(layer.as_str())
            }
            BuildError::Internal(_) => Location::NONE,
        };
        Diagnostic::error(codes::BUILD_FAILED, self.to_string(), location)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn only_inheritance_and_internal_are_fatal() {
        let inherit = BuildError::Inheritance {
            layer: "c".into(),
            previous: "b".into(),
        };
        let io = BuildError::Io {
            layer: "c".into(),
            path: PathBuf::from("/out/c/x.js"),
            source: std::io::Error::new(std::io::ErrorKind::Other, "disk full"),
        };
        assert!(inherit.is_fatal());
        assert!(!io.is_fatal());
        assert!(BuildError::Internal(InternalError::new("x")).is_fatal());

        let diag = io.to_diagnostic();
        assert_eq!(diag.code, codes::BUILD_FAILED);
        assert!(diag.is_for_layer("c"));
    }
}
