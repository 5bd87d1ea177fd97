//! User directory seeded from a JSON file, for in-memory deployments.
//!
//! The file holds an array of recipients:
//!
//! ```json
//! [{"user_id": "…", "email": "ada@example.com", "display_name": "Ada"}]
//! ```

use async_trait::async_trait;
use signup_core::environment::{DirectoryError, Recipient, UserDirectory};
use signup_core::types::UserId;
use std::path::Path;

/// Failure loading the users file.
#[derive(thiserror::Error, Debug)]
pub enum SeedError {
    /// The file could not be read.
    #[error("Failed to read users file: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not a JSON array of recipients.
    #[error("Failed to parse users file: {0}")]
    Parse(#[from] serde_json::Error),
}

/// [`UserDirectory`] over a fixed set of users. Every listed user is active.
#[derive(Debug, Clone, Default)]
pub struct SeededUserDirectory {
    users: Vec<Recipient>,
}

impl SeededUserDirectory {
    /// Directory over `users`.
    #[must_use]
    pub const fn new(users: Vec<Recipient>) -> Self {
        Self { users }
    }

    /// Parse a JSON array of recipients.
    ///
    /// # Errors
    ///
    /// [`SeedError::Parse`] if `json` is not an array of recipients.
    pub fn from_json(json: &str) -> Result<Self, SeedError> {
        Ok(Self::new(serde_json::from_str(json)?))
    }

    /// Load a JSON array of recipients from `path`.
    ///
    /// # Errors
    ///
    /// [`SeedError`] if the file cannot be read or parsed.
    pub async fn load(path: impl AsRef<Path>) -> Result<Self, SeedError> {
        let json = tokio::fs::read_to_string(path).await?;
        Self::from_json(&json)
    }

    /// Number of users.
    #[must_use]
    pub fn len(&self) -> usize {
        self.users.len()
    }

    /// Whether the directory has no users.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.users.is_empty()
    }
}

#[async_trait]
impl UserDirectory for SeededUserDirectory {
    async fn active_users(&self) -> Result<Vec<Recipient>, DirectoryError> {
        Ok(self.users.clone())
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<Recipient>, DirectoryError> {
        Ok(self
            .users
            .iter()
            .filter(|user| ids.contains(&user.user_id))
            .cloned()
            .collect())
    }
}
