//! Error types for editing operations.

use thiserror::Error;

/// Result type for core editing operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors that can occur while transforming a document in the core.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Document serialization/deserialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Reasons the model path of an edit did not produce a usable document.
///
/// Every kind is recovered by the heuristic fallback; none of them reach the
/// caller as a failed edit.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Error)]
pub enum FailureKind {
    /// The model call did not complete before its deadline.
    #[error("model request timed out")]
    Timeout,
    /// The model could not be reached or is not configured.
    #[error("model unavailable")]
    Unavailable,
    /// The model answered with text that does not parse as JSON.
    #[error("model response is not valid JSON")]
    Malformed,
    /// The model answered with JSON that is not an animation document.
    #[error("model response is not an animation document")]
    InvalidShape,
}

impl FailureKind {
    /// Stable lowercase label, used for log fields and metric labels.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Timeout => "timeout",
            Self::Unavailable => "unavailable",
            Self::Malformed => "malformed",
            Self::InvalidShape => "invalid_shape",
        }
    }
}
