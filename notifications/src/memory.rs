//! In-memory feed store.
//!
//! All tables sit behind one lock, so a delivery (entry plus bell) is never
//! observed half-written.

use crate::error::{FeedError, FeedResult};
use crate::store::{Delivery, EntryCounts, FeedStore};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signup_core::notification::{BellPointer, NotificationMessage, SystemMessageEntry};
use signup_core::types::{BellId, EntryId, MessageId, UserId};
use std::collections::{HashMap, HashSet};
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    messages: HashMap<MessageId, NotificationMessage>,
    delivered: HashSet<(MessageId, UserId)>,
    entries: HashMap<EntryId, SystemMessageEntry>,
    bells: HashMap<BellId, BellPointer>,
}

impl Tables {
    fn with_message<T: Clone>(&self, value: &T, message_id: MessageId) -> Option<(T, NotificationMessage)> {
        self.messages
            .get(&message_id)
            .map(|message| (value.clone(), message.clone()))
    }
}

/// [`FeedStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryFeedStore {
    tables: RwLock<Tables>,
}

impl InMemoryFeedStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn page<T>(items: Vec<T>, offset: u64, limit: u64) -> Vec<T> {
    let offset = usize::try_from(offset).unwrap_or(usize::MAX);
    let limit = usize::try_from(limit).unwrap_or(usize::MAX);
    items.into_iter().skip(offset).take(limit).collect()
}

#[async_trait]
impl FeedStore for InMemoryFeedStore {
    async fn insert_message(&self, message: &NotificationMessage) -> FeedResult<()> {
        self.write()
            .messages
            .entry(message.id)
            .or_insert_with(|| message.clone());
        Ok(())
    }

    async fn deliver(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<Delivery>> {
        let mut tables = self.write();
        if !tables.messages.contains_key(&message_id) {
            return Err(FeedError::NotFound(format!("message {message_id}")));
        }
        if !tables.delivered.insert((message_id, user_id)) {
            return Ok(None);
        }

        let entry = SystemMessageEntry::unread(message_id, user_id, at);
        let bell = BellPointer::unread(&entry, at);
        tables.entries.insert(entry.id, entry.clone());
        tables.bells.insert(bell.id, bell.clone());
        Ok(Some(Delivery { entry, bell }))
    }

    async fn list_entries(
        &self,
        user_id: UserId,
        offset: u64,
        limit: u64,
    ) -> FeedResult<Vec<(SystemMessageEntry, NotificationMessage)>> {
        let tables = self.read();
        let mut entries: Vec<_> = tables
            .entries
            .values()
            .filter(|entry| entry.user_id == user_id)
            .filter_map(|entry| tables.with_message(entry, entry.message_id))
            .collect();
        entries.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(entries, offset, limit))
    }

    async fn count_entries(&self, user_id: UserId) -> FeedResult<EntryCounts> {
        let tables = self.read();
        let mut counts = EntryCounts::default();
        for entry in tables.entries.values().filter(|e| e.user_id == user_id) {
            counts.total += 1;
            if !entry.is_read {
                counts.unread += 1;
            }
        }
        Ok(counts)
    }

    async fn mark_entry_read(
        &self,
        user_id: UserId,
        entry_id: EntryId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<SystemMessageEntry>> {
        let mut tables = self.write();
        let Some(entry) = tables
            .entries
            .get_mut(&entry_id)
            .filter(|entry| entry.user_id == user_id)
        else {
            return Ok(None);
        };
        if !entry.is_read {
            entry.is_read = true;
            entry.read_at = Some(at);
        }
        Ok(Some(entry.clone()))
    }

    async fn mark_all_entries_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64> {
        let mut tables = self.write();
        let mut changed = 0;
        for entry in tables
            .entries
            .values_mut()
            .filter(|entry| entry.user_id == user_id && !entry.is_read)
        {
            entry.is_read = true;
            entry.read_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_entry(&self, user_id: UserId, entry_id: EntryId) -> FeedResult<Option<Vec<BellId>>> {
        let mut tables = self.write();
        if !tables
            .entries
            .get(&entry_id)
            .is_some_and(|entry| entry.user_id == user_id)
        {
            return Ok(None);
        }
        tables.entries.remove(&entry_id);

        let removed: Vec<BellId> = tables
            .bells
            .values()
            .filter(|bell| bell.entry_id == entry_id)
            .map(|bell| bell.id)
            .collect();
        for bell_id in &removed {
            tables.bells.remove(bell_id);
        }
        Ok(Some(removed))
    }

    async fn list_bells(
        &self,
        user_id: UserId,
        limit: u64,
    ) -> FeedResult<Vec<(BellPointer, NotificationMessage)>> {
        let tables = self.read();
        let mut bells: Vec<_> = tables
            .bells
            .values()
            .filter(|bell| bell.user_id == user_id)
            .filter_map(|bell| tables.with_message(bell, bell.message_id))
            .collect();
        bells.sort_by(|(a, _), (b, _)| b.created_at.cmp(&a.created_at).then(b.id.cmp(&a.id)));
        Ok(page(bells, 0, limit))
    }

    async fn unread_bell_count(&self, user_id: UserId) -> FeedResult<u64> {
        let count = self
            .read()
            .bells
            .values()
            .filter(|bell| bell.user_id == user_id && !bell.is_read)
            .count();
        Ok(count as u64)
    }

    async fn mark_bell_read(
        &self,
        user_id: UserId,
        bell_id: BellId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<BellPointer>> {
        let mut tables = self.write();
        let Some(bell) = tables
            .bells
            .get_mut(&bell_id)
            .filter(|bell| bell.user_id == user_id)
        else {
            return Ok(None);
        };
        if !bell.is_read {
            bell.is_read = true;
            bell.read_at = Some(at);
        }
        Ok(Some(bell.clone()))
    }

    async fn mark_all_bells_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64> {
        let mut tables = self.write();
        let mut changed = 0;
        for bell in tables
            .bells
            .values_mut()
            .filter(|bell| bell.user_id == user_id && !bell.is_read)
        {
            bell.is_read = true;
            bell.read_at = Some(at);
            changed += 1;
        }
        Ok(changed)
    }

    async fn delete_bell(&self, user_id: UserId, bell_id: BellId) -> FeedResult<bool> {
        let mut tables = self.write();
        if tables
            .bells
            .get(&bell_id)
            .is_some_and(|bell| bell.user_id == user_id)
        {
            tables.bells.remove(&bell_id);
            return Ok(true);
        }
        Ok(false)
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use signup_core::notification::{Audience, Author, Category, Priority};
    use signup_core::types::DomainEventId;

    fn message(at: DateTime<Utc>) -> NotificationMessage {
        NotificationMessage {
            id: MessageId::new(),
            source_event: DomainEventId::new(),
            title: "Hello".to_string(),
            body: "World".to_string(),
            category: Category::Announcement,
            priority: Priority::Normal,
            created_at: at,
            author: Author::System,
            audience: Audience::All,
        }
    }

    #[tokio::test]
    async fn delivery_is_keyed_on_message_and_user() {
        let store = InMemoryFeedStore::new();
        let now = Utc::now();
        let msg = message(now);
        let user = UserId::new();
        store.insert_message(&msg).await.unwrap();
        store.insert_message(&msg).await.unwrap();

        let first = store.deliver(msg.id, user, now).await.unwrap();
        let second = store.deliver(msg.id, user, now).await.unwrap();

        let delivery = first.unwrap();
        assert_eq!(delivery.bell.entry_id, delivery.entry.id);
        assert!(second.is_none());
        assert_eq!(store.count_entries(user).await.unwrap().total, 1);
        assert_eq!(store.unread_bell_count(user).await.unwrap(), 1);
    }

    #[tokio::test]
    async fn deleted_entry_is_not_redelivered() {
        let store = InMemoryFeedStore::new();
        let now = Utc::now();
        let msg = message(now);
        let user = UserId::new();
        store.insert_message(&msg).await.unwrap();

        let delivery = store.deliver(msg.id, user, now).await.unwrap().unwrap();
        let removed = store.delete_entry(user, delivery.entry.id).await.unwrap();

        assert_eq!(removed, Some(vec![delivery.bell.id]));
        assert!(store.deliver(msg.id, user, now).await.unwrap().is_none());
        assert_eq!(store.count_entries(user).await.unwrap(), EntryCounts::default());
    }

    #[tokio::test]
    async fn unknown_message_cannot_be_delivered() {
        let store = InMemoryFeedStore::new();
        let result = store.deliver(MessageId::new(), UserId::new(), Utc::now()).await;
        assert!(matches!(result, Err(FeedError::NotFound(_))));
    }

    #[tokio::test]
    async fn read_flags_are_independent() {
        let store = InMemoryFeedStore::new();
        let now = Utc::now();
        let msg = message(now);
        let user = UserId::new();
        store.insert_message(&msg).await.unwrap();
        let delivery = store.deliver(msg.id, user, now).await.unwrap().unwrap();

        store.mark_bell_read(user, delivery.bell.id, now).await.unwrap();

        assert_eq!(store.unread_bell_count(user).await.unwrap(), 0);
        assert_eq!(store.count_entries(user).await.unwrap().unread, 1);
    }

    #[tokio::test]
    async fn rows_of_other_users_are_invisible() {
        let store = InMemoryFeedStore::new();
        let now = Utc::now();
        let msg = message(now);
        let (owner, stranger) = (UserId::new(), UserId::new());
        store.insert_message(&msg).await.unwrap();
        let delivery = store.deliver(msg.id, owner, now).await.unwrap().unwrap();

        assert!(store.mark_entry_read(stranger, delivery.entry.id, now).await.unwrap().is_none());
        assert!(store.mark_bell_read(stranger, delivery.bell.id, now).await.unwrap().is_none());
        assert!(!store.delete_bell(stranger, delivery.bell.id).await.unwrap());
        assert!(store.delete_entry(stranger, delivery.entry.id).await.unwrap().is_none());
        assert!(store.list_entries(stranger, 0, 10).await.unwrap().is_empty());
        assert_eq!(store.count_entries(owner).await.unwrap().unread, 1);
    }

    #[tokio::test]
    async fn entries_are_listed_newest_first_and_paged() {
        let store = InMemoryFeedStore::new();
        let user = UserId::new();
        let start = Utc::now();
        for minutes in 0..5 {
            let at = start + chrono::Duration::minutes(minutes);
            let msg = message(at);
            store.insert_message(&msg).await.unwrap();
            store.deliver(msg.id, user, at).await.unwrap();
        }

        let first_page = store.list_entries(user, 0, 2).await.unwrap();
        let last_page = store.list_entries(user, 4, 2).await.unwrap();

        assert_eq!(first_page.len(), 2);
        assert!(first_page[0].0.created_at > first_page[1].0.created_at);
        assert_eq!(last_page.len(), 1);
        assert_eq!(last_page[0].0.created_at, start);
    }
}
