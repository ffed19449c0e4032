//! Build-progress markers used to detect interrupted passes.

use std::path::{Path, PathBuf};

use chrono::{DateTime, FixedOffset, Utc};

use crate::error::CacheError;

const STARTED: &str = "Build started: ";
const COMPLETED: &str = "Build completed: ";

/// What a marker file says about the last pass.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MarkerState {
    /// No marker: the layer has never been built here.
    Absent,
    /// A pass started at this time and never completed.
    Started(Option<DateTime<FixedOffset>>),
    /// The last pass completed at this time.
    Completed(Option<DateTime<FixedOffset>>),
    /// The marker exists but is not in a recognized format.
    Unreadable,
}

impl MarkerState {
    /// Returns `true` if the incremental state of the layer cannot be trusted.
    pub fn is_interrupted(&self) -> bool {
        matches!(self, MarkerState::Started(_) | MarkerState::Unreadable)
    }
}

/// The build-progress marker file of one build layer.
#[derive(Debug, Clone)]
pub struct BuildMarker {
    path: PathBuf,
}

impl BuildMarker {
    /// Creates a handle for the marker at `path`.
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// The marker file path.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Reads the marker.
    pub fn check(&self) -> MarkerState {
        let Ok(content) = std::fs::read_to_string(&self.path) else {
            return if self.path.exists() {
                MarkerState::Unreadable
            } else {
                MarkerState::Absent
            };
        };
        let line = content.lines().next().unwrap_or_default().trim();
        let parse = |ts: &str| DateTime::parse_from_rfc3339(ts.trim()).ok();
        if let Some(ts) = line.strip_prefix(COMPLETED) {
            MarkerState::Completed(parse(ts))
        } else if let Some(ts) = line.strip_prefix(STARTED) {
            MarkerState::Started(parse(ts))
        } else {
            MarkerState::Unreadable
        }
    }

    /// Records that a pass is starting.
    pub fn write_started(&self) -> Result<(), CacheError> {
        self.write(STARTED)
    }

    /// Records that the pass completed, replacing the started line.
    pub fn write_completed(&self) -> Result<(), CacheError> {
        self.write(COMPLETED)
    }

    fn write(&self, prefix: &str) -> Result<(), CacheError> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(CacheError::io(parent))?;
        }
        let line = format!("{prefix}{}\n", Utc::now().to_rfc3339());
        std::fs::write(&self.path, line).map_err(CacheError::io(&self.path))
    }
}
