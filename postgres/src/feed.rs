//! `PostgreSQL` feed store.
//!
//! The `notification_deliveries` primary key makes fan-out idempotent per
//! (message, user). A delivery row, its system message entry and its bell are
//! written in one transaction.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signup_core::notification::{
    Audience, Author, BellPointer, Category, NotificationMessage, Priority, SystemMessageEntry,
};
use signup_core::types::{BellId, DomainEventId, EntryId, MessageId, UserId};
use signup_notifications::{Delivery, EntryCounts, FeedError, FeedResult, FeedStore};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::types::Json;
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

const MESSAGE_COLUMNS: &str = "m.id AS m_id, m.source_event, m.title, m.body, m.category, \
     m.priority, m.author_id, m.audience, m.created_at AS m_created_at";

/// [`FeedStore`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresFeedStore {
    pool: PgPool,
}

impl PostgresFeedStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> FeedResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| database("begin transaction", &e))
    }
}

fn database(context: &str, error: &sqlx::Error) -> FeedError {
    FeedError::Database(format!("Failed to {context}: {error}"))
}

fn decode(error: &sqlx::Error) -> FeedError {
    FeedError::Database(format!("Failed to decode row: {error}"))
}

fn to_u64(count: i64) -> u64 {
    u64::try_from(count).unwrap_or(0)
}

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn parse_category(value: &str) -> FeedResult<Category> {
    [
        Category::Announcement,
        Category::Reminder,
        Category::Security,
        Category::AdminAlert,
        Category::RoleChange,
    ]
    .into_iter()
    .find(|category| category.as_str() == value)
    .ok_or_else(|| FeedError::Database(format!("Invalid category: {value}")))
}

fn parse_priority(value: &str) -> FeedResult<Priority> {
    [Priority::Low, Priority::Normal, Priority::High]
        .into_iter()
        .find(|priority| priority.as_str() == value)
        .ok_or_else(|| FeedError::Database(format!("Invalid priority: {value}")))
}

/// Decode the message half of a joined row (columns from [`MESSAGE_COLUMNS`]).
fn message_from_row(row: &PgRow) -> FeedResult<NotificationMessage> {
    let category: String = row.try_get("category").map_err(|e| decode(&e))?;
    let priority: String = row.try_get("priority").map_err(|e| decode(&e))?;
    let author: Option<Uuid> = row.try_get("author_id").map_err(|e| decode(&e))?;
    let Json(audience): Json<Audience> = row.try_get("audience").map_err(|e| decode(&e))?;

    Ok(NotificationMessage {
        id: MessageId::from_uuid(row.try_get("m_id").map_err(|e| decode(&e))?),
        source_event: DomainEventId::from_uuid(row.try_get("source_event").map_err(|e| decode(&e))?),
        title: row.try_get("title").map_err(|e| decode(&e))?,
        body: row.try_get("body").map_err(|e| decode(&e))?,
        category: parse_category(&category)?,
        priority: parse_priority(&priority)?,
        created_at: row.try_get("m_created_at").map_err(|e| decode(&e))?,
        author: author.map_or(Author::System, |id| Author::User(UserId::from_uuid(id))),
        audience,
    })
}

fn entry_from_row(row: &PgRow) -> FeedResult<SystemMessageEntry> {
    Ok(SystemMessageEntry {
        id: EntryId::from_uuid(row.try_get("id").map_err(|e| decode(&e))?),
        message_id: MessageId::from_uuid(row.try_get("message_id").map_err(|e| decode(&e))?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(|e| decode(&e))?),
        is_read: row.try_get("is_read").map_err(|e| decode(&e))?,
        read_at: row.try_get("read_at").map_err(|e| decode(&e))?,
        created_at: row.try_get("created_at").map_err(|e| decode(&e))?,
    })
}

fn bell_from_row(row: &PgRow) -> FeedResult<BellPointer> {
    Ok(BellPointer {
        id: BellId::from_uuid(row.try_get("id").map_err(|e| decode(&e))?),
        entry_id: EntryId::from_uuid(row.try_get("entry_id").map_err(|e| decode(&e))?),
        message_id: MessageId::from_uuid(row.try_get("message_id").map_err(|e| decode(&e))?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(|e| decode(&e))?),
        is_read: row.try_get("is_read").map_err(|e| decode(&e))?,
        read_at: row.try_get("read_at").map_err(|e| decode(&e))?,
        created_at: row.try_get("created_at").map_err(|e| decode(&e))?,
    })
}

#[async_trait]
impl FeedStore for PostgresFeedStore {
    async fn insert_message(&self, message: &NotificationMessage) -> FeedResult<()> {
        let author = match message.author {
            Author::System => None,
            Author::User(id) => Some(*id.as_uuid()),
        };
        sqlx::query(
            r"
            INSERT INTO notification_messages
                (id, source_event, title, body, category, priority, author_id, audience, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)
            ON CONFLICT (id) DO NOTHING
            ",
        )
        .bind(message.id.as_uuid())
        .bind(message.source_event.as_uuid())
        .bind(&message.title)
        .bind(&message.body)
        .bind(message.category.as_str())
        .bind(message.priority.as_str())
        .bind(author)
        .bind(Json(&message.audience))
        .bind(message.created_at)
        .execute(&self.pool)
        .await
        .map_err(|e| database("insert message", &e))?;
        Ok(())
    }

    async fn deliver(
        &self,
        message_id: MessageId,
        user_id: UserId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<Delivery>> {
        let mut tx = self.begin().await?;

        let claimed = sqlx::query(
            r"
            INSERT INTO notification_deliveries (message_id, user_id, delivered_at)
            VALUES ($1, $2, $3)
            ON CONFLICT (message_id, user_id) DO NOTHING
            ",
        )
        .bind(message_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| match &e {
            sqlx::Error::Database(db_err) if db_err.is_foreign_key_violation() => {
                FeedError::NotFound(format!("message {message_id}"))
            }
            _ => database("record delivery", &e),
        })?;
        if claimed.rows_affected() == 0 {
            return Ok(None);
        }

        let entry = SystemMessageEntry::unread(message_id, user_id, at);
        let bell = BellPointer::unread(&entry, at);

        sqlx::query(
            r"
            INSERT INTO system_message_entries (id, message_id, user_id, is_read, read_at, created_at)
            VALUES ($1, $2, $3, FALSE, NULL, $4)
            ",
        )
        .bind(entry.id.as_uuid())
        .bind(message_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| database("insert entry", &e))?;

        sqlx::query(
            r"
            INSERT INTO bell_pointers (id, entry_id, message_id, user_id, is_read, read_at, created_at)
            VALUES ($1, $2, $3, $4, FALSE, NULL, $5)
            ",
        )
        .bind(bell.id.as_uuid())
        .bind(entry.id.as_uuid())
        .bind(message_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&mut *tx)
        .await
        .map_err(|e| database("insert bell", &e))?;

        tx.commit().await.map_err(|e| database("commit delivery", &e))?;
        Ok(Some(Delivery { entry, bell }))
    }

    async fn list_entries(
        &self,
        user_id: UserId,
        offset: u64,
        limit: u64,
    ) -> FeedResult<Vec<(SystemMessageEntry, NotificationMessage)>> {
        sqlx::query(&format!(
            r"
            SELECT e.*, {MESSAGE_COLUMNS}
            FROM system_message_entries e
            JOIN notification_messages m ON m.id = e.message_id
            WHERE e.user_id = $1
            ORDER BY e.created_at DESC, e.id DESC
            OFFSET $2 LIMIT $3
            "
        ))
        .bind(user_id.as_uuid())
        .bind(to_i64(offset))
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database("list entries", &e))?
        .iter()
        .map(|row| -> FeedResult<_> { Ok((entry_from_row(row)?, message_from_row(row)?)) })
        .collect()
    }

    async fn count_entries(&self, user_id: UserId) -> FeedResult<EntryCounts> {
        let row = sqlx::query(
            r"
            SELECT COUNT(*) AS total, COUNT(*) FILTER (WHERE NOT is_read) AS unread
            FROM system_message_entries
            WHERE user_id = $1
            ",
        )
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database("count entries", &e))?;

        Ok(EntryCounts {
            total: to_u64(row.try_get("total").map_err(|e| decode(&e))?),
            unread: to_u64(row.try_get("unread").map_err(|e| decode(&e))?),
        })
    }

    async fn mark_entry_read(
        &self,
        user_id: UserId,
        entry_id: EntryId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<SystemMessageEntry>> {
        sqlx::query(
            r"
            UPDATE system_message_entries
            SET is_read = TRUE, read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            RETURNING *
            ",
        )
        .bind(entry_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database("mark entry read", &e))?
        .as_ref()
        .map(entry_from_row)
        .transpose()
    }

    async fn mark_all_entries_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64> {
        let result = sqlx::query(
            "UPDATE system_message_entries SET is_read = TRUE, read_at = $2 WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| database("mark entries read", &e))?;
        Ok(result.rows_affected())
    }

    async fn delete_entry(&self, user_id: UserId, entry_id: EntryId) -> FeedResult<Option<Vec<BellId>>> {
        let mut tx = self.begin().await?;

        let bells = sqlx::query("DELETE FROM bell_pointers WHERE entry_id = $1 AND user_id = $2 RETURNING id")
            .bind(entry_id.as_uuid())
            .bind(user_id.as_uuid())
            .fetch_all(&mut *tx)
            .await
            .map_err(|e| database("delete bells", &e))?
            .iter()
            .map(|row| row.try_get::<Uuid, _>("id").map(BellId::from_uuid).map_err(|e| decode(&e)))
            .collect::<FeedResult<Vec<_>>>()?;

        let deleted = sqlx::query("DELETE FROM system_message_entries WHERE id = $1 AND user_id = $2")
            .bind(entry_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| database("delete entry", &e))?;
        if deleted.rows_affected() == 0 {
            tx.rollback().await.map_err(|e| database("roll back", &e))?;
            return Ok(None);
        }

        tx.commit().await.map_err(|e| database("commit entry deletion", &e))?;
        Ok(Some(bells))
    }

    async fn list_bells(
        &self,
        user_id: UserId,
        limit: u64,
    ) -> FeedResult<Vec<(BellPointer, NotificationMessage)>> {
        sqlx::query(&format!(
            r"
            SELECT b.*, {MESSAGE_COLUMNS}
            FROM bell_pointers b
            JOIN notification_messages m ON m.id = b.message_id
            WHERE b.user_id = $1
            ORDER BY b.created_at DESC, b.id DESC
            LIMIT $2
            "
        ))
        .bind(user_id.as_uuid())
        .bind(to_i64(limit))
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database("list bells", &e))?
        .iter()
        .map(|row| -> FeedResult<_> { Ok((bell_from_row(row)?, message_from_row(row)?)) })
        .collect()
    }

    async fn unread_bell_count(&self, user_id: UserId) -> FeedResult<u64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM bell_pointers WHERE user_id = $1 AND NOT is_read")
            .bind(user_id.as_uuid())
            .fetch_one(&self.pool)
            .await
            .map_err(|e| database("count bells", &e))?;
        Ok(to_u64(count))
    }

    async fn mark_bell_read(
        &self,
        user_id: UserId,
        bell_id: BellId,
        at: DateTime<Utc>,
    ) -> FeedResult<Option<BellPointer>> {
        sqlx::query(
            r"
            UPDATE bell_pointers
            SET is_read = TRUE, read_at = COALESCE(read_at, $3)
            WHERE id = $1 AND user_id = $2
            RETURNING *
            ",
        )
        .bind(bell_id.as_uuid())
        .bind(user_id.as_uuid())
        .bind(at)
        .fetch_optional(&self.pool)
        .await
        .map_err(|e| database("mark bell read", &e))?
        .as_ref()
        .map(bell_from_row)
        .transpose()
    }

    async fn mark_all_bells_read(&self, user_id: UserId, at: DateTime<Utc>) -> FeedResult<u64> {
        let result = sqlx::query(
            "UPDATE bell_pointers SET is_read = TRUE, read_at = $2 WHERE user_id = $1 AND NOT is_read",
        )
        .bind(user_id.as_uuid())
        .bind(at)
        .execute(&self.pool)
        .await
        .map_err(|e| database("mark bells read", &e))?;
        Ok(result.rows_affected())
    }

    async fn delete_bell(&self, user_id: UserId, bell_id: BellId) -> FeedResult<bool> {
        let result = sqlx::query("DELETE FROM bell_pointers WHERE id = $1 AND user_id = $2")
            .bind(bell_id.as_uuid())
            .bind(user_id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| database("delete bell", &e))?;
        Ok(result.rows_affected() > 0)
    }
}
