//! Diagnostic creation, severity management, and rendering for layered builds.
//!
//! Every user-visible condition the build core detects (bad layer
//! definitions, namespace overlaps, corrupt indexes, drifted artifacts,
//! interrupted builds) becomes a [`Diagnostic`] tagged with the offending
//! layer and file. The thread-safe [`DiagnosticSink`] collects them from
//! concurrent build workers, and [`DiagnosticRenderer`] implementations format
//! them for a terminal or as JSON lines.

#![warn(missing_docs)]

pub mod code;
pub mod codes;
pub mod diagnostic;
pub mod location;
pub mod renderer;
pub mod severity;
pub mod sink;

pub use code::{Category, DiagnosticCode};
pub use diagnostic::Diagnostic;
pub use location::Location;
pub use renderer::{DiagnosticRenderer, JsonRenderer, TerminalRenderer};
pub use severity::Severity;
pub use sink::DiagnosticSink;
