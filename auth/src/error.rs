//! Error types for authorization checks.

use crate::resolver::Capability;
use thiserror::Error;

/// Result type alias for authorization checks.
pub type Result<T> = std::result::Result<T, AuthError>;

/// Why an actor was refused.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum AuthError {
    /// The actor lacks the capability the operation requires.
    #[error("Insufficient permissions: {required}")]
    InsufficientPermissions {
        /// Required capability that was missing
        required: Capability,
    },

    /// The actor's email address is not verified.
    #[error("Email address not verified")]
    NotVerified,
}
