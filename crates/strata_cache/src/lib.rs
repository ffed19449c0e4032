//! Per-build-layer persisted state for incremental builds.
//!
//! Every build layer owns three files under `<build_dir>/.strata/`: an
//! [`ArtifactIndex`] mapping generated files to their content hashes, a
//! [`DynamicTypeRegistry`] of types left uncompiled, and a [`BuildMarker`]
//! whose state is the only signal used to detect an interrupted pass. The
//! index and registry are stored as versioned snapshots; anything unreadable
//! is reported as a [`SnapshotError`] and treated by callers as empty.

#![warn(missing_docs)]

pub mod dynamic;
pub mod error;
pub mod index;
pub mod layout;
pub mod marker;
pub mod snapshot;

pub use dynamic::{DynamicTypeRegistry, TypeRole};
pub use error::{CacheError, SnapshotError};
pub use index::{disk_state, ArtifactIndex, ArtifactRecord, DiskState, RecordState, SweepReport};
pub use layout::BuildLayout;
pub use marker::{BuildMarker, MarkerState};
