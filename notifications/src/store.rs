//! Persistence boundary of the notification feed.
//!
//! Holds composed messages, per-user system message entries and the bell
//! pointers that reference them. Every per-user query takes the owner's id
//! and must never return or touch another user's rows.

use crate::error::FeedResult;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signup_core::notification::{BellPointer, NotificationMessage, SystemMessageEntry};
use signup_core::types::{BellId, EntryId, MessageId, UserId};

/// A system message entry together with the bell pointer created for it.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct Delivery {
    /// The new feed entry
    pub entry: SystemMessageEntry,
    /// The bell pointer referencing it
    pub bell: BellPointer,
}

/// Entry counts of one user's feed.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct EntryCounts {
    /// All entries
    pub total: u64,
    /// Entries not yet read
    pub unread: u64,
}

/// Storage for notification messages, system message entries and bells.
#[async_trait]
pub trait FeedStore: Send + Sync {
    /// Store a composed message. Storing the same message id again is a no-op.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn insert_message(&self, message: &NotificationMessage) -> FeedResult<()>;

    /// Deliver a message to one user: create an unread entry and an unread
    /// bell pointing at it, atomically.
    ///
    /// Keyed on `(message_id, user_id)`: returns `None` when the message was
    /// already delivered to this user, even if the user has since deleted
    /// the entry.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::NotFound`] if the message is unknown,
    /// [`crate::FeedError::Database`] on failure.
    async fn deliver(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<Delivery>>;

    /// A page of the user's entries with their messages, newest first.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn list_entries(
        &self,
        user_id: UserId,
        offset: u64,
        limit: u64,
    ) -> FeedResult<Vec<(SystemMessageEntry, NotificationMessage)>>;

    /// Total and unread entry counts of the user.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn count_entries(&self, user_id: UserId) -> FeedResult<EntryCounts>;

    /// Mark one entry read. Already-read entries keep their read time.
    ///
    /// Returns `None` if the user owns no such entry. Bells are untouched.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn mark_entry_read(
        &self,
        user_id: UserId,
        entry_id: EntryId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<SystemMessageEntry>>;

    /// Mark every unread entry of the user read; returns how many changed.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn mark_all_entries_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64>;

    /// Delete one entry and the bells that reference it.
    ///
    /// Returns the ids of the removed bells, or `None` if the user owns no
    /// such entry.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn delete_entry(&self, user_id: UserId, entry_id: EntryId) -> FeedResult<Option<Vec<BellId>>>;

    /// The user's most recent bells with their messages, newest first.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn list_bells(
        &self,
        user_id: UserId,
        limit: u64,
    ) -> FeedResult<Vec<(BellPointer, NotificationMessage)>>;

    /// Number of unread bells of the user.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn unread_bell_count(&self, user_id: UserId) -> FeedResult<u64>;

    /// Mark one bell read. The referenced entry is untouched.
    ///
    /// Returns `None` if the user owns no such bell.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn mark_bell_read(
        &self,
        user_id: UserId,
        bell_id: BellId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<BellPointer>>;

    /// Mark every unread bell of the user read; returns how many changed.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn mark_all_bells_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64>;

    /// Delete one bell, keeping its entry. Returns `false` if the user owns
    /// no such bell.
    ///
    /// # Errors
    ///
    /// [`crate::FeedError::Database`] on failure.
    async fn delete_bell(&self, user_id: UserId, bell_id: BellId) -> FeedResult<bool>;
}
