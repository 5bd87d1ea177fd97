//! Error types for the notification pipeline.

use signup_core::environment::DirectoryError;
use thiserror::Error;

/// Result type for feed operations.
pub type FeedResult<T> = std::result::Result<T, FeedError>;

// ═══════════════════════════════════════════════════════════════════════
// Feed errors
// ═══════════════════════════════════════════════════════════════════════

/// Errors raised by the feed store and feed service.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum FeedError {
    /// The entry or bell does not exist for this user.
    ///
    /// Another user's identifiers deliberately produce this error too.
    #[error("Not found: {0}")]
    NotFound(String),

    /// Invalid paging or input.
    #[error("Invalid request: {0}")]
    Validation(String),

    /// Backend failure.
    #[error("Feed store error: {0}")]
    Database(String),
}

// ═══════════════════════════════════════════════════════════════════════
// Dispatch errors
// ═══════════════════════════════════════════════════════════════════════

/// Failures that stop a dispatch before any recipient is reached.
///
/// Per-recipient failures do not abort a dispatch; they are counted in the
/// [`crate::dispatcher::DispatchOutcome`].
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DispatchError {
    /// The audience could not be resolved to recipients.
    #[error("Audience resolution failed: {0}")]
    Audience(#[from] DirectoryError),

    /// The message itself could not be stored.
    #[error("Message could not be stored: {0}")]
    Store(#[from] FeedError),
}
