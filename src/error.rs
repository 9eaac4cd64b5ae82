//! Error types surfaced by the review engine.

use thiserror::Error;

/// Errors returned by review-session, issue-store and history operations.
#[derive(Debug, Error)]
pub enum EngineError {
    /// A finding or history entry with this id does not exist.
    #[error("{kind} '{id}' not found")]
    NotFound { kind: &'static str, id: String },

    /// A finding in a backend payload was malformed and was not loaded.
    #[error("invalid finding at position {index}: {reason}")]
    InvalidFinding { index: usize, reason: String },

    /// `total_errors` disagrees with the number of findings in the payload.
    #[error("result declares {declared} findings but carries {actual}")]
    TotalMismatch { declared: usize, actual: usize },

    /// A history entry whose optional fields do not match its action type.
    #[error("invalid history entry: {0}")]
    InvalidEntry(String),

    /// The caller may not touch entries owned by someone else.
    #[error("forbidden: {0}")]
    Forbidden(String),

    /// The validate/translate backend failed; the message is user-facing.
    #[error("backend request failed: {0}")]
    Backend(String),

    /// The in-flight call was cancelled before its result was applied.
    #[error("operation cancelled")]
    Cancelled,

    #[error(transparent)]
    Storage(#[from] anyhow::Error),
}

impl EngineError {
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        Self::NotFound {
            kind,
            id: id.to_string(),
        }
    }

    /// Errors the UI should show as a retryable message rather than a hard stop.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, Self::Backend(_) | Self::Cancelled)
    }
}

pub type EngineResult<T> = std::result::Result<T, EngineError>;
