//! Feed service: the notification surfaces exposed to one user.
//!
//! Every operation takes the calling user's id and only ever sees that
//! user's rows; another user's entry or bell id behaves as not found.
//! Bell changes are pushed through the [`RealtimeHub`] after they are stored.

use crate::error::{FeedError, FeedResult};
use crate::realtime::{RealtimeEvent, RealtimeHub};
use crate::store::FeedStore;
use chrono::{DateTime, Utc};
use serde::Serialize;
use signup_core::environment::Clock;
use signup_core::notification::{
    Author, BellPointer, Category, NotificationMessage, Priority, SystemMessageEntry,
};
use signup_core::types::{BellId, EntryId, MessageId, UserId};
use std::sync::Arc;

/// Largest accepted page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Bells returned by [`FeedService::list_bells`].
pub const BELL_LIST_LIMIT: u64 = 50;

/// One system message as shown in the feed.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SystemMessageView {
    /// Entry identifier
    pub entry_id: EntryId,
    /// Message identifier
    pub message_id: MessageId,
    /// Title
    pub title: String,
    /// Body
    pub body: String,
    /// Category
    pub category: Category,
    /// Priority
    pub priority: Priority,
    /// Attribution
    pub author: Author,
    /// Read flag of the entry
    pub is_read: bool,
    /// When the entry was read
    pub read_at: Option<DateTime<Utc>>,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
}

impl SystemMessageView {
    fn new(entry: SystemMessageEntry, message: NotificationMessage) -> Self {
        Self {
            entry_id: entry.id,
            message_id: message.id,
            title: message.title,
            body: message.body,
            category: message.category,
            priority: message.priority,
            author: message.author,
            is_read: entry.is_read,
            read_at: entry.read_at,
            created_at: entry.created_at,
        }
    }
}

/// One bell as shown in the notification dropdown and pushed in real time.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BellView {
    /// Bell identifier
    pub bell_id: BellId,
    /// Entry the bell points at
    pub entry_id: EntryId,
    /// Message identifier
    pub message_id: MessageId,
    /// Title
    pub title: String,
    /// Category
    pub category: Category,
    /// Priority
    pub priority: Priority,
    /// Read flag of the bell
    pub is_read: bool,
    /// When the bell was created
    pub created_at: DateTime<Utc>,
}

impl BellView {
    /// Combine a bell with the message it refers to.
    #[must_use]
    pub fn new(bell: &BellPointer, message: &NotificationMessage) -> Self {
        Self {
            bell_id: bell.id,
            entry_id: bell.entry_id,
            message_id: message.id,
            title: message.title.clone(),
            category: message.category,
            priority: message.priority,
            is_read: bell.is_read,
            created_at: bell.created_at,
        }
    }
}

/// Page request (1-based).
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct Page {
    /// Page number, starting at 1
    pub page: u32,
    /// Items per page, 1..=[`MAX_PAGE_SIZE`]
    pub per_page: u32,
}

impl Default for Page {
    fn default() -> Self {
        Self {
            page: 1,
            per_page: 20,
        }
    }
}

/// One page of system messages.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct SystemMessagePage {
    /// Messages on this page, newest first
    pub items: Vec<SystemMessageView>,
    /// Page number
    pub page: u32,
    /// Page size
    pub per_page: u32,
    /// All entries of the user
    pub total: u64,
    /// Unread entries of the user
    pub unread: u64,
}

/// The user's bells with their unread count.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct BellList {
    /// Most recent bells, newest first
    pub items: Vec<BellView>,
    /// Unread bells
    pub unread_count: u64,
}

/// User-scoped access to system messages and bells.
#[derive(Clone)]
pub struct FeedService {
    store: Arc<dyn FeedStore>,
    hub: Arc<RealtimeHub>,
    clock: Arc<dyn Clock>,
}

impl FeedService {
    /// Create a feed service
    #[must_use]
    pub fn new(store: Arc<dyn FeedStore>, hub: Arc<RealtimeHub>, clock: Arc<dyn Clock>) -> Self {
        Self { store, hub, clock }
    }

    /// The hub this service pushes to
    #[must_use]
    pub const fn hub(&self) -> &Arc<RealtimeHub> {
        &self.hub
    }

    /// A page of the user's system messages with total and unread counts.
    ///
    /// # Errors
    ///
    /// [`FeedError::Validation`] for page 0 or a page size outside
    /// `1..=MAX_PAGE_SIZE`, [`FeedError::Database`] on store failure.
    pub async fn list_system_messages(&self, user_id: UserId, page: Page) -> FeedResult<SystemMessagePage> {
        if page.page == 0 || page.per_page == 0 || page.per_page > MAX_PAGE_SIZE {
            return Err(FeedError::Validation(format!(
                "page must be >= 1 and per_page within 1..={MAX_PAGE_SIZE}"
            )));
        }
        let offset = u64::from(page.page - 1) * u64::from(page.per_page);
        let items = self
            .store
            .list_entries(user_id, offset, u64::from(page.per_page))
            .await?
            .into_iter()
            .map(|(entry, message)| SystemMessageView::new(entry, message))
            .collect();
        let counts = self.store.count_entries(user_id).await?;

        Ok(SystemMessagePage {
            items,
            page: page.page,
            per_page: page.per_page,
            total: counts.total,
            unread: counts.unread,
        })
    }

    /// The user's most recent bells and unread bell count.
    ///
    /// This is also the snapshot a reconnecting client resynchronizes from.
    ///
    /// # Errors
    ///
    /// [`FeedError::Database`] on store failure.
    pub async fn list_bells(&self, user_id: UserId) -> FeedResult<BellList> {
        let items = self
            .store
            .list_bells(user_id, BELL_LIST_LIMIT)
            .await?
            .iter()
            .map(|(bell, message)| BellView::new(bell, message))
            .collect();
        let unread_count = self.store.unread_bell_count(user_id).await?;
        Ok(BellList {
            items,
            unread_count,
        })
    }

    /// Mark one system message read. Its bell keeps its own flag.
    ///
    /// # Errors
    ///
    /// [`FeedError::NotFound`] if the user owns no such entry.
    pub async fn mark_system_message_read(
        &self,
        user_id: UserId,
        entry_id: EntryId,
    ) -> FeedResult<SystemMessageEntry> {
        self.store
            .mark_entry_read(user_id, entry_id, self.clock.now())
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("system message {entry_id}")))
    }

    /// Mark all of the user's system messages read; returns how many changed.
    ///
    /// # Errors
    ///
    /// [`FeedError::Database`] on store failure.
    pub async fn mark_all_system_messages_read(&self, user_id: UserId) -> FeedResult<u64> {
        let changed = self
            .store
            .mark_all_entries_read(user_id, self.clock.now())
            .await?;
        tracing::debug!(user_id = %user_id, changed, "System messages marked read");
        Ok(changed)
    }

    /// Delete one system message together with the bells pointing at it.
    ///
    /// # Errors
    ///
    /// [`FeedError::NotFound`] if the user owns no such entry.
    pub async fn delete_system_message(&self, user_id: UserId, entry_id: EntryId) -> FeedResult<()> {
        let removed = self
            .store
            .delete_entry(user_id, entry_id)
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("system message {entry_id}")))?;
        for bell_id in removed {
            self.hub
                .push(user_id, RealtimeEvent::NotificationRemoved { bell_id });
        }
        Ok(())
    }

    /// Mark one bell read. The system message keeps its own flag.
    ///
    /// # Errors
    ///
    /// [`FeedError::NotFound`] if the user owns no such bell.
    pub async fn mark_bell_read(&self, user_id: UserId, bell_id: BellId) -> FeedResult<BellPointer> {
        let bell = self
            .store
            .mark_bell_read(user_id, bell_id, self.clock.now())
            .await?
            .ok_or_else(|| FeedError::NotFound(format!("bell {bell_id}")))?;
        self.hub
            .push(user_id, RealtimeEvent::NotificationRead { bell_id });
        Ok(bell)
    }

    /// Mark all of the user's bells read; returns how many changed.
    ///
    /// `all_read` is pushed only when at least one bell changed.
    ///
    /// # Errors
    ///
    /// [`FeedError::Database`] on store failure.
    pub async fn mark_all_bells_read(&self, user_id: UserId) -> FeedResult<u64> {
        let changed = self
            .store
            .mark_all_bells_read(user_id, self.clock.now())
            .await?;
        if changed > 0 {
            self.hub.push(user_id, RealtimeEvent::AllRead);
        }
        Ok(changed)
    }

    /// Delete one bell; its system message stays in the feed.
    ///
    /// # Errors
    ///
    /// [`FeedError::NotFound`] if the user owns no such bell.
    pub async fn delete_bell(&self, user_id: UserId, bell_id: BellId) -> FeedResult<()> {
        if !self.store.delete_bell(user_id, bell_id).await? {
            return Err(FeedError::NotFound(format!("bell {bell_id}")));
        }
        self.hub
            .push(user_id, RealtimeEvent::NotificationRemoved { bell_id });
        Ok(())
    }
}
