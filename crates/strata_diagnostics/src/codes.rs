//! The fixed diagnostic code table shared by every Strata crate.
//!
//! `E1xx` covers layer configuration, `W2xx` recoverable build conditions,
//! `E3xx` per-layer build failures.

use crate::code::{Category, DiagnosticCode};

/// A base layer reference names a layer that is not registered.
pub const UNKNOWN_BASE_LAYER: DiagnosticCode = DiagnosticCode::new(Category::Error, 100);

/// A base layer reference names a layer positioned at or after the extender.
pub const FORWARD_REFERENCE: DiagnosticCode = DiagnosticCode::new(Category::Error, 101);

/// Two layer definitions share a name.
pub const DUPLICATE_LAYER: DiagnosticCode = DiagnosticCode::new(Category::Error, 102);

/// A layer extends a layer flagged `final_layer`.
pub const EXTENDS_FINAL_LAYER: DiagnosticCode = DiagnosticCode::new(Category::Error, 103);

/// A layer lifecycle hook (initialize/start/validate) failed.
pub const LIFECYCLE_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 104);

/// Two unrelated layers can define the same relative source path.
pub const OVERLAP_CONFLICT: DiagnosticCode = DiagnosticCode::new(Category::Warning, 200);

/// A persisted index or registry could not be read and was discarded.
pub const INDEX_CORRUPTION: DiagnosticCode = DiagnosticCode::new(Category::Warning, 201);

/// A generated file on disk no longer matches its recorded hash.
pub const ARTIFACT_DRIFT: DiagnosticCode = DiagnosticCode::new(Category::Warning, 202);

/// A previous build of a layer started but never completed.
pub const INTERRUPTED_BUILD: DiagnosticCode = DiagnosticCode::new(Category::Warning, 203);

/// A build layer was skipped because a layer it depends on failed.
pub const DEPENDENCY_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Warning, 204);

/// A build pass failed with an I/O error.
pub const BUILD_FAILED: DiagnosticCode = DiagnosticCode::new(Category::Error, 300);

/// A synchronized dynamic type no longer has a defining source.
pub const UNREACHABLE_SYNC_TYPE: DiagnosticCode = DiagnosticCode::new(Category::Error, 301);
