//! In-memory user directory.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use async_trait::async_trait;
use signup_core::environment::{DirectoryError, Recipient, UserDirectory};
use signup_core::types::UserId;
use std::sync::{Arc, RwLock};

/// [`UserDirectory`] over a fixed list of users.
#[derive(Clone, Debug, Default)]
pub struct StaticUserDirectory {
    users: Arc<RwLock<Vec<Recipient>>>,
}

impl StaticUserDirectory {
    /// Empty directory
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a user with a generated address and return their id
    pub fn add(&self, display_name: &str) -> UserId {
        let user_id = UserId::new();
        self.insert(Recipient {
            user_id,
            email: format!("{}@example.com", display_name.to_lowercase()),
            display_name: display_name.to_string(),
        });
        user_id
    }

    /// Add (or replace) a user
    pub fn insert(&self, recipient: Recipient) {
        let mut users = self.users.write().unwrap();
        users.retain(|user| user.user_id != recipient.user_id);
        users.push(recipient);
    }

    /// Email address of a user, if known
    #[must_use]
    pub fn email_of(&self, user_id: UserId) -> Option<String> {
        self.users
            .read()
            .unwrap()
            .iter()
            .find(|user| user.user_id == user_id)
            .map(|user| user.email.clone())
    }
}

#[async_trait]
impl UserDirectory for StaticUserDirectory {
    async fn active_users(&self) -> Result<Vec<Recipient>, DirectoryError> {
        Ok(self.users.read().unwrap().clone())
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<Recipient>, DirectoryError> {
        Ok(self
            .users
            .read()
            .unwrap()
            .iter()
            .filter(|user| ids.contains(&user.user_id))
            .cloned()
            .collect())
    }
}
