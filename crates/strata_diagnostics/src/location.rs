//! Layer and file identity attached to every diagnostic.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::{Path, PathBuf};

/// Where a diagnostic applies: the offending layer and, when known, the file.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Location {
    /// Name of the layer the condition belongs to.
    pub layer: Option<String>,
    /// The source or generated file involved.
    pub file: Option<PathBuf>,
}

impl Location {
    /// A location with neither layer nor file (graph-wide conditions).
    pub const NONE: Location = Location {
        layer: None,
        file: None,
    };

    /// A location naming only a layer.
    pub fn layer(name: impl Into<String>) -> Self {
        Self {
            layer: Some(name.into()),
            file: None,
        }
    }

    /// A location naming a layer and a file within it.
    pub fn file(layer: impl Into<String>, file: &Path) -> Self {
        Self {
            layer: Some(layer.into()),
            file: Some(file.to_path_buf()),
        }
    }

    /// Returns `true` if neither layer nor file is known.
    pub fn is_none(&self) -> bool {
        self.layer.is_none() && self.file.is_none()
    }
}

impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match (&self.layer, &self.file) {
            (Some(layer), Some(file)) => write!(f, "layer `{layer}`: {}", file.display()),
            (Some(layer), None) => write!(f, "layer `{layer}`"),
            (None, Some(file)) => write!(f, "{}", file.display()),
            (None, None) => Ok(()),
        }
    }
}
