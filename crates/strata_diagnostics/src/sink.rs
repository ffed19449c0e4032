//! Thread-safe diagnostic accumulator shared by concurrent build workers.

use crate::code::DiagnosticCode;
use crate::diagnostic::Diagnostic;
use crate::renderer::DiagnosticRenderer;
use crate::severity::Severity;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Mutex, MutexGuard, PoisonError};

/// A thread-safe accumulator for diagnostics.
///
/// Build passes for independent layers run on separate workers and all emit
/// into one sink. The error count is tracked atomically so `has_errors` never
/// takes the lock.
///
/// ```
/// use strata_diagnostics::{codes, Diagnostic, DiagnosticSink, JsonRenderer, Location, TerminalRenderer};
///
/// let sink = DiagnosticSink::new();
/// sink.emit(Diagnostic::warning(
///     codes::ARTIFACT_DRIFT,
///     "generated file `app/Main.bin` was modified after it was generated",
///     Location::layer("app"),
/// ));
/// assert!(sink.render(&TerminalRenderer::new(false)).starts_with("warning[W202]"));
/// assert!(sink.render(&JsonRenderer).contains(r#""layer":"app""#));
/// ```
pub struct DiagnosticSink {
    diagnostics: Mutex<Vec<Diagnostic>>,
    error_count: AtomicUsize,
}

impl DiagnosticSink {
    /// Creates a new empty diagnostic sink.
    pub fn new() -> Self {
        Self {
            diagnostics: Mutex::new(Vec::new()),
            error_count: AtomicUsize::new(0),
        }
    }

    fn lock(&self) -> MutexGuard<'_, Vec<Diagnostic>> {
        self.diagnostics.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Emits a diagnostic into the sink.
    pub fn emit(&self, diag: Diagnostic) {
        if diag.severity == Severity::Error {
            self.error_count.fetch_add(1, Ordering::Relaxed);
        }
        self.lock().push(diag);
    }

    /// Returns `true` if any error-severity diagnostics have been emitted.
    pub fn has_errors(&self) -> bool {
        self.error_count.load(Ordering::Relaxed) > 0
    }

    /// Returns the number of error-severity diagnostics emitted so far.
    pub fn error_count(&self) -> usize {
        self.error_count.load(Ordering::Relaxed)
    }

    /// Takes all accumulated diagnostics, leaving the sink empty.
    pub fn take_all(&self) -> Vec<Diagnostic> {
        std::mem::take(&mut *self.lock())
    }

    /// Returns a snapshot of all accumulated diagnostics without draining.
    pub fn diagnostics(&self) -> Vec<Diagnostic> {
        self.lock().clone()
    }

    /// Returns the diagnostics carrying the given code.
    pub fn with_code(&self, code: DiagnosticCode) -> Vec<Diagnostic> {
        self.lock().iter().filter(|d| d.code == code).cloned().collect()
    }

    /// Renders every accumulated diagnostic in emission order, separated by
    /// newlines.
    pub fn render(&self, renderer: &dyn DiagnosticRenderer) -> String {
        self.lock()
            .iter()
            .map(|d| renderer.render(d))
            .collect::<Vec<_>>()
            .join("\n")
    }

    /// Returns `true` if a diagnostic with `code` was emitted for `layer`.
    pub fn has_code_for(&self, code: DiagnosticCode, layer: &str) -> bool {
        self.lock()
            .iter()
            .any(|d| d.code == code && d.is_for_layer(layer))
    }
}

impl Default for DiagnosticSink {
    fn default() -> Self {
        Self::new()
    }
}
