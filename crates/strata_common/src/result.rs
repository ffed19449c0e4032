//! Internal error type for invariant violations inside the build core.

/// Result type for operations whose only failure mode is a bug in Strata.
///
/// User problems (bad layer definitions, drifted artifacts, corrupt indexes)
/// are reported as diagnostics and never surface through this type.
pub type StrataResult<T> = Result<T, InternalError>;

/// An internal error indicating a broken invariant, not a user input problem.
#[derive(Debug, thiserror::Error)]
#[error("internal error: {message}")]
pub struct InternalError {
    /// Description of the violated invariant.
    pub message: String,
}

impl InternalError {
    /// Creates a new internal error with the given message.
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

impl From<String> for InternalError {
    fn from(message: String) -> Self {
        Self { message }
    }
}
