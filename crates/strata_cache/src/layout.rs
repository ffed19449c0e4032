//! Where a build layer keeps its artifacts and state files.

use std::path::{Component, Path, PathBuf};

/// Directory under a build layer's output holding its state files.
pub const META_DIR: &str = ".strata";

/// Paths of one build layer's output directory and state files.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct BuildLayout {
    build_dir: PathBuf,
}

impl BuildLayout {
    /// Creates the layout for a build output directory.
    pub fn new(build_dir: impl Into<PathBuf>) -> Self {
        Self {
            build_dir: build_dir.into(),
        }
    }

    /// The directory generated files are written under.
    pub fn build_dir(&self) -> &Path {
        &self.build_dir
    }

    /// The state directory.
    pub fn meta_dir(&self) -> PathBuf {
        self.build_dir.join(META_DIR)
    }

    /// The artifact index snapshot.
    pub fn index_path(&self) -> PathBuf {
        self.meta_dir().join("index.bin")
    }

    /// The dynamic-type snapshot.
    pub fn dynamic_path(&self) -> PathBuf {
        self.meta_dir().join("dynamic.bin")
    }

    /// The build-progress marker.
    pub fn marker_path(&self) -> PathBuf {
        self.meta_dir().join("build.marker")
    }

    /// The on-disk location of a generated file, given its `/`-separated key.
    ///
    /// Only plain name segments are kept, so the result always lies under the
    /// build directory: `.`, `..`, roots and drive prefixes are dropped.
    pub fn artifact_path(&self, key: &str) -> PathBuf {
        key.split('/')
            .filter(|part| is_plain_segment(part))
            .fold(self.build_dir.clone(), |path, part| path.join(part))
    }
}

fn is_plain_segment(part: &str) -> bool {
    let mut components = Path::new(part).components();
    matches!(
        (components.next(), components.next()),
        (Some(Component::Normal(_)), None)
    )
}
