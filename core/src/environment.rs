//! Collaborator traits injected into the registration engine and the
//! notification pipeline.
//!
//! All external dependencies are abstracted behind traits so the engine can be
//! exercised with deterministic fakes in tests and real adapters in production.

use crate::types::UserId;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Clock trait - abstracts time operations for testability
///
/// # Examples
///
/// ```
/// use signup_core::environment::{Clock, SystemClock};
///
/// let clock = SystemClock;
/// let before = clock.now();
/// assert!(clock.now() >= before);
/// ```
pub trait Clock: Send + Sync {
    /// Get the current time
    fn now(&self) -> DateTime<Utc>;
}

/// Production clock backed by the system time.
#[derive(Clone, Copy, Debug, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

// ============================================================================
// Email transport
// ============================================================================

/// Failure reported by an email transport.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EmailError {
    /// The recipient address could not be parsed.
    #[error("Invalid email address: {0}")]
    InvalidAddress(String),

    /// The message could not be built.
    #[error("Failed to build email: {0}")]
    Build(String),

    /// The transport (SMTP relay, API) failed or refused the message.
    #[error("Email transport failed: {0}")]
    Transport(String),
}

/// Outbound email sink.
///
/// Treated as fire-and-forget: callers record failures but never let them
/// affect other delivery surfaces.
#[async_trait]
pub trait EmailTransport: Send + Sync {
    /// Send a plain-text email.
    ///
    /// # Errors
    ///
    /// Returns [`EmailError`] if the address is invalid or the transport
    /// rejects the message.
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError>;
}

// ============================================================================
// User directory
// ============================================================================

/// A user that can receive notifications.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Recipient {
    /// Stable user identifier
    pub user_id: UserId,
    /// Delivery address for the email channel
    pub email: String,
    /// Name used in greetings
    pub display_name: String,
}

/// Failure looking up recipients.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum DirectoryError {
    /// The backing store could not be reached.
    #[error("User directory unavailable: {0}")]
    Unavailable(String),
}

/// Read access to the user base, owned by the account management collaborator.
#[async_trait]
pub trait UserDirectory: Send + Sync {
    /// All users whose accounts are active.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the directory cannot be queried.
    async fn active_users(&self) -> Result<Vec<Recipient>, DirectoryError>;

    /// Active users among `ids`. Unknown or inactive ids are omitted.
    ///
    /// # Errors
    ///
    /// Returns [`DirectoryError`] if the directory cannot be queried.
    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<Recipient>, DirectoryError>;
}
