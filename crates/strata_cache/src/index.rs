//! The per-build-layer artifact index.
//!
//! Keys are the `/`-separated paths of generated files relative to the build
//! layer's output directory. A pass calls [`ArtifactIndex::begin_pass`] to
//! mark every record stale, marks each key it visits as in use, and finally
//! calls [`ArtifactIndex::sweep`] to delete generated files that were not
//! produced again. Files whose on-disk bytes no longer match the recorded hash
//! are never deleted or overwritten.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use serde::{Deserialize, Serialize};
use strata_common::ContentHash;
use tracing::{debug, warn};

use crate::error::{CacheError, SnapshotError};
use crate::layout::BuildLayout;
use crate::snapshot::{read_snapshot, write_snapshot, INDEX_MAGIC};

/// What the index knows about one generated file.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArtifactRecord {
    /// Hash of the bytes last written (or inherited) for the key.
    pub hash: ContentHash,
    /// Extension of the generated file.
    pub extension: String,
    /// Whether the current pass produced the key.
    pub in_use: bool,
}

/// Where a key is in its per-pass lifecycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordState {
    /// Never recorded.
    Unknown,
    /// Produced by the current pass.
    InUse,
    /// Recorded, but not produced by the current pass.
    Stale,
    /// Swept during the current pass.
    Removed,
}

/// How a generated file on disk compares with its recorded hash.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DiskState {
    /// No file at the path.
    Missing,
    /// The file's bytes hash to the recorded value.
    Matches,
    /// The file was changed after it was generated.
    Drifted,
}

/// Compares the file at `path` against `expected`.
pub fn disk_state(path: &Path, expected: &ContentHash) -> Result<DiskState, CacheError> {
    match ContentHash::of_file(path) {
        Ok(actual) if actual == *expected => Ok(DiskState::Matches),
        Ok(_) => Ok(DiskState::Drifted),
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(DiskState::Missing),
        Err(source) => Err(CacheError::Io {
            path: path.to_path_buf(),
            source,
        }),
    }
}

/// Outcome of a stale sweep.
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    /// Keys whose files were deleted.
    pub deleted: Vec<String>,
    /// Keys whose files were modified on disk and left in place.
    pub drifted: Vec<String>,
    /// Keys dropped because their files were already gone.
    pub missing: Vec<String>,
}

/// Map from generated-file key to [`ArtifactRecord`] for one build layer.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ArtifactIndex {
    records: BTreeMap<String, ArtifactRecord>,
    removed: BTreeSet<String>,
}

impl ArtifactIndex {
    /// Creates an empty index.
    pub fn new() -> Self {
        Self::default()
    }

    /// Loads the index snapshot of a build layer.
    pub fn load(layout: &BuildLayout) -> Result<Self, SnapshotError> {
        let records = read_snapshot(&layout.index_path(), INDEX_MAGIC)?;
        Ok(Self {
            records,
            removed: BTreeSet::new(),
        })
    }

    /// Writes the index snapshot of a build layer.
    pub fn persist(&self, layout: &BuildLayout) -> Result<(), CacheError> {
        write_snapshot(&layout.index_path(), INDEX_MAGIC, &self.records)
    }

    /// Number of records.
    pub fn len(&self) -> usize {
        self.records.len()
    }

    /// Returns `true` if there are no records.
    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }

    /// Returns the record for a key.
    pub fn get(&self, key: &str) -> Option<&ArtifactRecord> {
        self.records.get(key)
    }

    /// Returns `true` if the key has a record.
    pub fn contains(&self, key: &str) -> bool {
        self.records.contains_key(key)
    }

    /// Iterates over records in key order.
    pub fn iter(&self) -> impl Iterator<Item = (&str, &ArtifactRecord)> {
        self.records.iter().map(|(k, r)| (k.as_str(), r))
    }

    /// The lifecycle state of a key.
    pub fn state(&self, key: &str) -> RecordState {
        match self.records.get(key) {
            Some(r) if r.in_use => RecordState::InUse,
            Some(_) => RecordState::Stale,
            None if self.removed.contains(key) => RecordState::Removed,
            None => RecordState::Unknown,
        }
    }

    /// Starts a pass: every record becomes stale.
    pub fn begin_pass(&mut self) {
        for record in self.records.values_mut() {
            record.in_use = false;
        }
        self.removed.clear();
    }

    /// Marks an existing record as produced by this pass.
    ///
    /// Returns `false` if the key has no record.
    pub fn mark_in_use(&mut self, key: &str) -> bool {
        match self.records.get_mut(key) {
            Some(record) => {
                record.in_use = true;
                true
            }
            None => false,
        }
    }

    /// Returns `true` if the key is recorded with exactly this hash.
    pub fn is_current(&self, key: &str, hash: &ContentHash) -> bool {
        self.records.get(key).is_some_and(|r| r.hash == *hash)
    }

    /// Records freshly written bytes for a key and marks it in use.
    ///
    /// Returns `true` if the key was new or its hash changed.
    pub fn record(&mut self, key: &str, hash: ContentHash, extension: &str) -> bool {
        let record = ArtifactRecord {
            hash,
            extension: extension.to_string(),
            in_use: true,
        };
        self.removed.remove(key);
        match self.records.insert(key.to_string(), record) {
            Some(previous) => previous.hash != hash,
            None => true,
        }
    }

    /// Copies another build layer's record for `key` and marks it in use.
    ///
    /// Returns `false` if `source` has no record for the key.
    pub fn inherit_from(&mut self, source: &ArtifactIndex, key: &str) -> bool {
        let Some(theirs) = source.get(key) else {
            return false;
        };
        self.record(key, theirs.hash, &theirs.extension);
        true
    }

    /// Drops a record without touching the file.
    pub fn remove(&mut self, key: &str) -> Option<ArtifactRecord> {
        let record = self.records.remove(key)?;
        self.removed.insert(key.to_string());
        Some(record)
    }

    /// Keys still stale in the current pass.
    pub fn stale_keys(&self) -> Vec<String> {
        self.records
            .iter()
            .filter(|(_, r)| !r.in_use)
            .map(|(k, _)| k.clone())
            .collect()
    }

    /// Deletes the files of stale records whose on-disk bytes still match.
    ///
    /// Drifted files are left alone and keep their stale record so later
    /// passes report them again. Records of files that are already gone are
    /// dropped.
    pub fn sweep(&mut self, layout: &BuildLayout) -> Result<SweepReport, CacheError> {
        let mut report = SweepReport::default();
        for key in self.stale_keys() {
            let Some(record) = self.records.get(&key) else {
                continue;
            };
            let path = layout.artifact_path(&key);
            match disk_state(&path, &record.hash)? {
                DiskState::Matches => {
                    std::fs::remove_file(&path).map_err(CacheError::io(&path))?;
                    debug!(key = %key, "deleted stale artifact");
                    self.remove(&key);
                    report.deleted.push(key);
                }
                DiskState::Missing => {
                    self.remove(&key);
                    report.missing.push(key);
                }
                DiskState::Drifted => {
                    warn!(key = %key, "stale artifact modified on disk; leaving it");
                    report.drifted.push(key);
                }
            }
        }
        Ok(report)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn hash(s: &str) -> ContentHash {
        ContentHash::from_bytes(s.as_bytes())
    }

    #[test]
    fn state_machine() {
        let mut idx = ArtifactIndex::new();
        assert_eq!(idx.state("a.js"), RecordState::Unknown);
        assert!(idx.record("a.js", hash("a"), "js"));
        assert_eq!(idx.state("a.js"), RecordState::InUse);
        idx.begin_pass();
        assert_eq!(idx.state("a.js"), RecordState::Stale);
        assert!(idx.mark_in_use("a.js"));
        assert_eq!(idx.state("a.js"), RecordState::InUse);
        idx.remove("a.js");
        assert_eq!(idx.state("a.js"), RecordState::Removed);
        idx.begin_pass();
        assert_eq!(idx.state("a.js"), RecordState::Unknown);
    }

    #[test]
    fn record_reports_changes_only() {
        let mut idx = ArtifactIndex::new();
        assert!(idx.record("a.js", hash("a"), "js"));
        assert!(!idx.record("a.js", hash("a"), "js"));
        assert!(idx.record("a.js", hash("b"), "js"));
        assert!(idx.is_current("a.js", &hash("b")));
        assert!(!idx.mark_in_use("missing.js"));
    }

    #[test]
    fn inherit_copies_hash_and_extension() {
        let mut upstream = ArtifactIndex::new();
        upstream.record("ui/Button.js", hash("btn"), "js");
        upstream.begin_pass();

        let mut idx = ArtifactIndex::new();
        assert!(idx.inherit_from(&upstream, "ui/Button.js"));
        assert!(!idx.inherit_from(&upstream, "ui/Other.js"));
        let rec = idx.get("ui/Button.js").unwrap();
        assert_eq!(rec.hash, hash("btn"));
        assert_eq!(rec.extension, "js");
        assert!(rec.in_use);
    }

    #[test]
    fn persist_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path());
        let mut idx = ArtifactIndex::new();
        idx.record("a/B.js", hash("b"), "js");
        idx.record("c.css", hash("c"), "css");
        idx.persist(&layout).unwrap();

        let back = ArtifactIndex::load(&layout).unwrap();
        assert_eq!(back, idx);
        assert_eq!(back.get("a/B.js").unwrap().hash.as_bytes(), hash("b").as_bytes());
    }

    #[test]
    fn load_without_snapshot_is_missing() {
        let dir = tempfile::tempdir().unwrap();
        let err = ArtifactIndex::load(&BuildLayout::new(dir.path())).unwrap_err();
        assert!(!err.is_corruption());
    }

    #[test]
    fn sweep_deletes_matching_and_keeps_drifted() {
        let dir = tempfile::tempdir().unwrap();
        let layout = BuildLayout::new(dir.path());
        std::fs::write(dir.path().join("old.gen"), "old").unwrap();
        std::fs::write(dir.path().join("edited.gen"), "hand edit").unwrap();
        std::fs::write(dir.path().join("live.gen"), "live").unwrap();

        let mut idx = ArtifactIndex::new();
        idx.record("old.gen", hash("old"), "gen");
        idx.record("edited.gen", hash("edited"), "gen");
        idx.record("gone.gen", hash("gone"), "gen");
        idx.record("live.gen", hash("live"), "gen");
        idx.begin_pass();
        idx.mark_in_use("live.gen");

        let report = idx.sweep(&layout).unwrap();
        assert_eq!(report.deleted, vec!["old.gen"]);
        assert_eq!(report.drifted, vec!["edited.gen"]);
        assert_eq!(report.missing, vec!["gone.gen"]);
        assert!(!dir.path().join("old.gen").exists());
        assert!(dir.path().join("edited.gen").exists());
        assert_eq!(idx.state("edited.gen"), RecordState::Stale);
        assert_eq!(idx.state("old.gen"), RecordState::Removed);
        assert_eq!(idx.state("live.gen"), RecordState::InUse);
    }

    #[test]
    fn sweep_never_leaves_the_build_dir() {
        let dir = tempfile::tempdir().unwrap();
        let build = dir.path().join("build");
        std::fs::create_dir_all(&build).unwrap();
        std::fs::write(dir.path().join("victim.gen"), "keep").unwrap();
        let layout = BuildLayout::new(&build);

        let mut idx = ArtifactIndex::new();
        idx.record("../victim.gen", hash("keep"), "gen");
        idx.begin_pass();
        let report = idx.sweep(&layout).unwrap();

        assert_eq!(report.missing, vec!["../victim.gen"]);
        assert!(report.deleted.is_empty());
        assert!(dir.path().join("victim.gen").exists());
    }
}
