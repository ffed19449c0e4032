//! Fully-qualified, dot-separated type names.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::path::PathBuf;

/// A fully-qualified type name such as `sys.core.Widget`.
///
/// Type names are derived from a layer's package prefix plus the
/// layer-relative path of the source that defines them, and map back to
/// artifact paths (`sys/core/Widget.<ext>`) when resolving compiled output.
#[derive(Clone, PartialEq, Eq, PartialOrd, Ord, Hash, Debug, Serialize, Deserialize)]
pub struct TypeName(String);

impl TypeName {
    /// Creates a type name from its dotted string form.
    pub fn new(name: impl Into<String>) -> Self {
        Self(name.into())
    }

    /// Builds a type name from a package prefix and a layer-relative source
    /// path with its extension already removed (`ui/Button` → `pkg.ui.Button`).
    pub fn from_source(package: &str, relative_stem: &str) -> Self {
        let dotted = relative_stem.replace(['/', '\\'], ".");
        if package.is_empty() {
            Self(dotted)
        } else {
            Self(format!("{package}.{dotted}"))
        }
    }

    /// Returns the dotted string form.
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Returns the package part (everything before the last dot), or `""`.
    pub fn package(&self) -> &str {
        self.0.rsplit_once('.').map_or("", |(pkg, _)| pkg)
    }

    /// Returns the unqualified name (everything after the last dot).
    pub fn simple_name(&self) -> &str {
        self.0.rsplit_once('.').map_or(self.0.as_str(), |(_, name)| name)
    }

    /// Strips a package prefix, returning the remaining slash-separated
    /// relative stem, or `None` when the name is not inside that package.
    pub fn relative_to(&self, package: &str) -> Option<String> {
        let rest = if package.is_empty() {
            self.0.as_str()
        } else {
            self.0.strip_prefix(package)?.strip_prefix('.')?
        };
        if rest.is_empty() {
            return None;
        }
        Some(rest.replace('.', "/"))
    }

    /// Returns the artifact path for this type under an output root,
    /// e.g. `sys/core/Widget.bin` for extension `bin`.
    pub fn artifact_path(&self, ext: &str) -> PathBuf {
        let mut path = PathBuf::from(self.0.replace('.', "/"));
        path.set_extension(ext);
        path
    }
}

impl fmt::Display for TypeName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for TypeName {
    fn from(s: &str) -> Self {
        Self::new(s)
    }
}
