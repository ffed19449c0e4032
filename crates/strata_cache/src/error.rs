//! Error types for build-layer state files.

use std::path::PathBuf;

/// Errors that can occur while writing or maintaining build-layer state.
#[derive(Debug, thiserror::Error)]
pub enum CacheError {
    /// An I/O error occurred while reading or writing a state or artifact file.
    #[error("cache I/O error at {path}: {source}")]
    Io {
        /// The path that caused the error.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// A snapshot could not be encoded.
    #[error("serialization error: {reason}")]
    Serialization {
        /// Description of the serialization failure.
        reason: String,
    },
}

impl CacheError {
    pub(crate) fn io(path: impl Into<PathBuf>) -> impl FnOnce(std::io::Error) -> Self {
        let path = path.into();
        move |source| CacheError::Io { path, source }
    }
}

/// Reasons a persisted snapshot could not be loaded.
///
/// [`SnapshotError::Missing`] is the normal state of a layer that has never
/// been built. Every other variant means the file exists but cannot be
/// trusted.
#[derive(Debug, thiserror::Error)]
pub enum SnapshotError {
    /// The snapshot file does not exist.
    #[error("no snapshot at {path}")]
    Missing {
        /// The expected snapshot path.
        path: PathBuf,
    },

    /// The file could not be read.
    #[error("failed to read snapshot {path}: {source}")]
    Io {
        /// The snapshot path.
        path: PathBuf,
        /// The underlying I/O error.
        #[source]
        source: std::io::Error,
    },

    /// The header is truncated, undecodable, or carries the wrong magic bytes.
    #[error("invalid snapshot header in {path}: {reason}")]
    InvalidHeader {
        /// The snapshot path.
        path: PathBuf,
        /// Description of the header problem.
        reason: String,
    },

    /// The snapshot was written by an incompatible format version.
    #[error("version mismatch in {path}: expected {expected}, got {actual}")]
    VersionMismatch {
        /// The snapshot path.
        path: PathBuf,
        /// The format version this build understands.
        expected: u32,
        /// The format version found in the file.
        actual: u32,
    },

    /// The payload does not match the checksum recorded in the header.
    #[error("checksum mismatch in {path}")]
    ChecksumMismatch {
        /// The snapshot path.
        path: PathBuf,
    },

    /// The payload could not be decoded.
    #[error("corrupt snapshot payload in {path}: {reason}")]
    Corrupt {
        /// The snapshot path.
        path: PathBuf,
        /// Description of the decode failure.
        reason: String,
    },
}

impl SnapshotError {
    /// Returns `true` for every failure except a missing file.
    pub fn is_corruption(&self) -> bool {
        !matches!(self, SnapshotError::Missing { .. })
    }
}
