//! Notification data model.
//!
//! A [`NotificationMessage`] is composed once per domain event and never
//! changes afterwards. Fan-out projects it into one [`SystemMessageEntry`] per
//! recipient (the durable feed) and one [`BellPointer`] per entry (the
//! real-time unread indicator). Entries and bell pointers carry independent
//! read flags.

use crate::types::{BellId, DomainEventId, EntryId, MessageId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::fmt;

/// Notification category.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Category {
    /// Platform-wide news such as a newly published event
    Announcement,
    /// Upcoming event reminder
    Reminder,
    /// Account security (password reset, verification)
    Security,
    /// Administrative change affecting the recipient
    AdminAlert,
    /// Registration role changes
    RoleChange,
}

impl Category {
    /// Wire name of the category.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Announcement => "announcement",
            Self::Reminder => "reminder",
            Self::Security => "security",
            Self::AdminAlert => "admin_alert",
            Self::RoleChange => "role_change",
        }
    }
}

impl fmt::Display for Category {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Display priority.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Priority {
    /// Informational
    Low,
    /// Default
    Normal,
    /// Needs attention
    High,
}

impl Priority {
    /// Wire name of the priority.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Normal => "normal",
            Self::High => "high",
        }
    }
}

/// Who a message is attributed to.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "id", rename_all = "snake_case")]
pub enum Author {
    /// Generated by the platform
    System,
    /// Caused by a user action
    User(UserId),
}

/// Who receives a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "users", rename_all = "snake_case")]
pub enum Audience {
    /// Every active user
    All,
    /// An explicit set of users
    Users(BTreeSet<UserId>),
}

impl Audience {
    /// Builds an explicit audience, collapsing duplicates.
    #[must_use]
    pub fn users(ids: impl IntoIterator<Item = UserId>) -> Self {
        Self::Users(ids.into_iter().collect())
    }
}

/// Canonical notification payload.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotificationMessage {
    /// Message identifier, derived from the source domain event
    pub id: MessageId,
    /// Domain event this message was composed from
    pub source_event: DomainEventId,
    /// Short title (email subject, bell label)
    pub title: String,
    /// Full text
    pub body: String,
    /// Category
    pub category: Category,
    /// Priority
    pub priority: Priority,
    /// Creation time (the domain event's commit time)
    pub created_at: DateTime<Utc>,
    /// Attribution
    pub author: Author,
    /// Target audience
    pub audience: Audience,
}

/// Durable per-user projection of a message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct SystemMessageEntry {
    /// Entry identifier
    pub id: EntryId,
    /// Message this entry projects
    pub message_id: MessageId,
    /// Owner of the entry
    pub user_id: UserId,
    /// Read flag of the feed entry
    pub is_read: bool,
    /// When the entry was read
    pub read_at: Option<DateTime<Utc>>,
    /// When the entry was created
    pub created_at: DateTime<Utc>,
}

impl SystemMessageEntry {
    /// Creates an unread entry.
    #[must_use]
    pub fn unread(message_id: MessageId, user_id: UserId, created_at: DateTime<Utc>) -> Self {
        Self {
            id: EntryId::new(),
            message_id,
            user_id,
            is_read: false,
            read_at: None,
            created_at,
        }
    }
}

/// Lightweight per-user pointer to a system message entry.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BellPointer {
    /// Bell identifier
    pub id: BellId,
    /// Entry this pointer references
    pub entry_id: EntryId,
    /// Message of the referenced entry
    pub message_id: MessageId,
    /// Owner of the pointer
    pub user_id: UserId,
    /// Read flag of the bell, independent of the entry's
    pub is_read: bool,
    /// When the bell was read
    pub read_at: Option<DateTime<Utc>>,
    /// When the bell was created
    pub created_at: DateTime<Utc>,
}

impl BellPointer {
    /// Creates an unread bell pointing at `entry`.
    #[must_use]
    pub fn unread(entry: &SystemMessageEntry, created_at: DateTime<Utc>) -> Self {
        Self {
            id: BellId::new(),
            entry_id: entry.id,
            message_id: entry.message_id,
            user_id: entry.user_id,
            is_read: false,
            read_at: None,
            created_at,
        }
    }
}
