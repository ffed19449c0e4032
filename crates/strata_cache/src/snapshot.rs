//! Versioned binary snapshots of build-layer state.
//!
//! A snapshot file is a 4-byte little-endian header length, a bincode
//! [`SnapshotHeader`], and a bincode payload. The header carries magic bytes
//! naming the snapshot kind, a format version, the producing tool version,
//! and a checksum of the payload. Reads fail closed: anything that does not
//! validate is an error, never a partially-decoded value.

use std::path::Path;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use strata_common::ContentHash;

use crate::error::{CacheError, SnapshotError};

/// Magic bytes of an artifact index snapshot.
pub const INDEX_MAGIC: [u8; 4] = *b"SIDX";

/// Magic bytes of a dynamic-type snapshot.
pub const DYNAMIC_MAGIC: [u8; 4] = *b"SDYN";

/// Current snapshot format version. Increment on breaking changes to the
/// header or any payload type.
pub const FORMAT_VERSION: u32 = 1;

/// Header prepended to every snapshot.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SnapshotHeader {
    /// Snapshot kind.
    pub magic: [u8; 4],
    /// Snapshot format version.
    pub format_version: u32,
    /// Version of the tool that wrote the snapshot.
    pub tool_version: String,
    /// Content hash of the payload bytes.
    pub checksum: ContentHash,
}

/// Encodes `value` and writes it to `path`, replacing any previous snapshot.
///
/// The bytes go to a sibling temporary file that is then renamed over the
/// target, so a reader never observes a half-written snapshot.
pub fn write_snapshot<T: Serialize>(
    path: &Path,
    magic: [u8; 4],
    value: &T,
) -> Result<(), CacheError> {
    let payload = bincode::serde::encode_to_vec(value, bincode::config::standard()).map_err(
        |e| CacheError::Serialization {
            reason: e.to_string(),
        },
    )?;
    let header = SnapshotHeader {
        magic,
        format_version: FORMAT_VERSION,
        tool_version: env!("CARGO_PKG_VERSION").to_string(),
        checksum: ContentHash::from_bytes(&payload),
    };
    let header_bytes = bincode::serde::encode_to_vec(&header, bincode::config::standard())
        .map_err(|e| CacheError::Serialization {
            reason: e.to_string(),
        })?;

    let header_len = header_bytes.len() as u32;
    let mut output = Vec::with_capacity(4 + header_bytes.len() + payload.len());
    output.extend_from_slice(&header_len.to_le_bytes());
    output.extend_from_slice(&header_bytes);
    output.extend_from_slice(&payload);

    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(CacheError::io(parent))?;
    }
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, &output).map_err(CacheError::io(&tmp))?;
    std::fs::rename(&tmp, path).map_err(CacheError::io(path))
}

/// Reads and validates a snapshot written by [`write_snapshot`].
pub fn read_snapshot<T: DeserializeOwned>(
    path: &Path,
    magic: [u8; 4],
) -> Result<T, SnapshotError> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
            return Err(SnapshotError::Missing {
                path: path.to_path_buf(),
            })
        }
        Err(source) => {
            return Err(SnapshotError::Io {
                path: path.to_path_buf(),
                source,
            })
        }
    };
    let invalid = |reason: &str| SnapshotError::InvalidHeader {
        path: path.to_path_buf(),
        reason: reason.to_string(),
    };

    let len_bytes: [u8; 4] = raw
        .get(..4)
        .and_then(|b| b.try_into().ok())
        .ok_or_else(|| invalid("file too short"))?;
    let header_len = u32::from_le_bytes(len_bytes) as usize;
    let header_bytes = raw
        .get(4..4 + header_len)
        .ok_or_else(|| invalid("truncated header"))?;

    let (header, _): (SnapshotHeader, usize) =
        bincode::serde::decode_from_slice(header_bytes, bincode::config::standard())
            .map_err(|e| invalid(&e.to_string()))?;
    if header.magic != magic {
        return Err(invalid("unexpected magic bytes"));
    }
    if header.format_version != FORMAT_VERSION {
        return Err(SnapshotError::VersionMismatch {
            path: path.to_path_buf(),
            expected: FORMAT_VERSION,
            actual: header.format_version,
        });
    }

    let payload = &raw[4 + header_len..];
    if ContentHash::from_bytes(payload) != header.checksum {
        return Err(SnapshotError::ChecksumMismatch {
            path: path.to_path_buf(),
        });
    }

    bincode::serde::decode_from_slice(payload, bincode::config::standard())
        .map(|(value, _)| value)
        .map_err(|e| SnapshotError::Corrupt {
            path: path.to_path_buf(),
            reason: e.to_string(),
        })
}
