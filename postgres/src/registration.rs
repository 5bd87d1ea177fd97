//! `PostgreSQL` registration store.
//!
//! Multi-row writes (an event with its roles, a cascading delete) run in one
//! transaction. The `registrations_user_event_role_key` constraint reports
//! duplicates as [`StoreError::Conflict`].
//!
//! Several server processes may share one database, each with its own
//! coordinator. Every write that can break a capacity bound therefore runs in
//! a transaction that first locks the event row (`SELECT ... FOR UPDATE`),
//! then counts and writes. Writers of one event queue on that lock, and a
//! write that would overfill a role or exceed the per-user role cap is
//! refused with [`StoreError::CapacityExceeded`].

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signup_core::types::{
    Capacity, Event, EventId, EventStatus, MAX_ROLES_PER_USER, Registration, RegistrationId, Role,
    RoleId, UserId,
};
use signup_registration::{RegistrationStore, StoreError, StoreResult};
use sqlx::postgres::{PgPool, PgRow};
use sqlx::{Postgres, Row, Transaction};
use uuid::Uuid;

const REGISTRATION_COLUMNS: &str = "id, user_id, event_id, role_id, created_at, updated_at";

/// [`RegistrationStore`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresRegistrationStore {
    pool: PgPool,
}

impl PostgresRegistrationStore {
    /// Create a store over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    async fn begin(&self) -> StoreResult<Transaction<'static, Postgres>> {
        self.pool
            .begin()
            .await
            .map_err(|e| database("begin transaction", &e))
    }

    async fn load_event(&self, row: &PgRow) -> StoreResult<Event> {
        let id: Uuid = row.try_get("id").map_err(|e| decode(&e))?;

        let roles = sqlx::query("SELECT id, name, capacity FROM roles WHERE event_id = $1 ORDER BY position")
            .bind(id)
            .fetch_all(&self.pool)
            .await
            .map_err(|e| database("load roles", &e))?
            .iter()
            .map(role_from_row)
            .collect::<StoreResult<Vec<_>>>()?;

        let co_organizers = sqlx::query(
            "SELECT user_id FROM event_co_organizers WHERE event_id = $1 ORDER BY position",
        )
        .bind(id)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database("load co-organizers", &e))?
        .iter()
        .map(|row| row.try_get::<Uuid, _>("user_id").map(UserId::from_uuid).map_err(|e| decode(&e)))
        .collect::<StoreResult<Vec<_>>>()?;

        let status: String = row.try_get("status").map_err(|e| decode(&e))?;
        Ok(Event {
            id: EventId::from_uuid(id),
            title: row.try_get("title").map_err(|e| decode(&e))?,
            created_by: UserId::from_uuid(row.try_get("created_by").map_err(|e| decode(&e))?),
            co_organizers,
            roles,
            starts_at: row.try_get("starts_at").map_err(|e| decode(&e))?,
            status: parse_status(&status)?,
            reminder_sent: row.try_get("reminder_sent").map_err(|e| decode(&e))?,
            created_at: row.try_get("created_at").map_err(|e| decode(&e))?,
        })
    }
}

fn database(context: &str, error: &sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = error {
        if db_err.is_unique_violation() {
            return StoreError::Conflict(format!("{context}: {db_err}"));
        }
    }
    StoreError::Database(format!("Failed to {context}: {error}"))
}

fn decode(error: &sqlx::Error) -> StoreError {
    StoreError::Database(format!("Failed to decode row: {error}"))
}

const fn status_str(status: EventStatus) -> &'static str {
    match status {
        EventStatus::Open => "open",
        EventStatus::Closed => "closed",
    }
}

fn parse_status(status: &str) -> StoreResult<EventStatus> {
    match status {
        "open" => Ok(EventStatus::Open),
        "closed" => Ok(EventStatus::Closed),
        other => Err(StoreError::Database(format!("Invalid event status: {other}"))),
    }
}

fn role_from_row(row: &PgRow) -> StoreResult<Role> {
    let capacity: i64 = row.try_get("capacity").map_err(|e| decode(&e))?;
    let capacity = u32::try_from(capacity)
        .ok()
        .and_then(Capacity::new)
        .ok_or_else(|| StoreError::Database(format!("Invalid role capacity: {capacity}")))?;
    Ok(Role {
        id: RoleId::from_uuid(row.try_get("id").map_err(|e| decode(&e))?),
        name: row.try_get("name").map_err(|e| decode(&e))?,
        capacity,
    })
}

fn registration_from_row(row: &PgRow) -> StoreResult<Registration> {
    Ok(Registration {
        id: RegistrationId::from_uuid(row.try_get("id").map_err(|e| decode(&e))?),
        user_id: UserId::from_uuid(row.try_get("user_id").map_err(|e| decode(&e))?),
        event_id: EventId::from_uuid(row.try_get("event_id").map_err(|e| decode(&e))?),
        role_id: RoleId::from_uuid(row.try_get("role_id").map_err(|e| decode(&e))?),
        created_at: row.try_get("created_at").map_err(|e| decode(&e))?,
        updated_at: row.try_get("updated_at").map_err(|e| decode(&e))?,
    })
}

/// Lock the event row until `tx` ends.
async fn lock_event(tx: &mut Transaction<'static, Postgres>, event_id: &Uuid) -> StoreResult<()> {
    let locked = sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
        .bind(event_id)
        .fetch_optional(&mut **tx)
        .await
        .map_err(|e| database("lock event", &e))?;
    if locked.is_none() {
        return Err(StoreError::NotFound(format!("event {event_id}")));
    }
    Ok(())
}

/// Refuse unless `role_id` has a free seat. Call with the event locked.
async fn check_role_has_room(
    tx: &mut Transaction<'static, Postgres>,
    event_id: &Uuid,
    role_id: &Uuid,
) -> StoreResult<()> {
    let row = sqlx::query(
        r"
        SELECT r.capacity,
               (SELECT COUNT(*) FROM registrations g WHERE g.role_id = r.id) AS taken
        FROM roles r
        WHERE r.id = $1 AND r.event_id = $2
        ",
    )
    .bind(role_id)
    .bind(event_id)
    .fetch_optional(&mut **tx)
    .await
    .map_err(|e| database("count role seats", &e))?
    .ok_or_else(|| StoreError::NotFound(format!("role {role_id}")))?;

    let capacity: i64 = row.try_get("capacity").map_err(|e| decode(&e))?;
    let taken: i64 = row.try_get("taken").map_err(|e| decode(&e))?;
    if taken >= capacity {
        return Err(StoreError::CapacityExceeded(format!(
            "role {role_id} is full ({taken} of {capacity})"
        )));
    }
    Ok(())
}

fn position(index: usize) -> i32 {
    i32::try_from(index).unwrap_or(i32::MAX)
}

async fn write_roles(tx: &mut Transaction<'static, Postgres>, event: &Event) -> StoreResult<()> {
    for (index, role) in event.roles.iter().enumerate() {
        sqlx::query(
            r"
            INSERT INTO roles (id, event_id, position, name, capacity)
            VALUES ($1, $2, $3, $4, $5)
            ON CONFLICT (id) DO UPDATE
                SET position = EXCLUDED.position,
                    name = EXCLUDED.name,
                    capacity = EXCLUDED.capacity
            ",
        )
        .bind(role.id.as_uuid())
        .bind(event.id.as_uuid())
        .bind(position(index))
        .bind(&role.name)
        .bind(i64::from(role.capacity.value()))
        .execute(&mut **tx)
        .await
        .map_err(|e| database("write role", &e))?;
    }
    Ok(())
}

async fn write_co_organizers(tx: &mut Transaction<'static, Postgres>, event: &Event) -> StoreResult<()> {
    sqlx::query("DELETE FROM event_co_organizers WHERE event_id = $1")
        .bind(event.id.as_uuid())
        .execute(&mut **tx)
        .await
        .map_err(|e| database("clear co-organizers", &e))?;

    for (index, user_id) in event.co_organizers.iter().enumerate() {
        sqlx::query("INSERT INTO event_co_organizers (event_id, user_id, position) VALUES ($1, $2, $3)")
            .bind(event.id.as_uuid())
            .bind(user_id.as_uuid())
            .bind(position(index))
            .execute(&mut **tx)
            .await
            .map_err(|e| database("write co-organizer", &e))?;
    }
    Ok(())
}

#[async_trait]
impl RegistrationStore for PostgresRegistrationStore {
    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        sqlx::query(
            r"
            INSERT INTO events (id, title, created_by, starts_at, status, reminder_sent, created_at)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            ",
        )
        .bind(event.id.as_uuid())
        .bind(&event.title)
        .bind(event.created_by.as_uuid())
        .bind(event.starts_at)
        .bind(status_str(event.status))
        .bind(event.reminder_sent)
        .bind(event.created_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| database("insert event", &e))?;

        write_roles(&mut tx, event).await?;
        write_co_organizers(&mut tx, event).await?;

        tx.commit().await.map_err(|e| database("commit event", &e))?;
        tracing::debug!(event_id = %event.id, "Event stored");
        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> StoreResult<Option<Event>> {
        let row = sqlx::query("SELECT * FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("get event", &e))?;

        match row {
            Some(row) => Ok(Some(self.load_event(&row).await?)),
            None => Ok(None),
        }
    }

    async fn update_event(&self, event: &Event) -> StoreResult<()> {
        let mut tx = self.begin().await?;

        let updated = sqlx::query(
            r"
            UPDATE events
            SET title = $2, starts_at = $3, status = $4, reminder_sent = $5
            WHERE id = $1
            ",
        )
        .bind(event.id.as_uuid())
        .bind(&event.title)
        .bind(event.starts_at)
        .bind(status_str(event.status))
        .bind(event.reminder_sent)
        .execute(&mut *tx)
        .await
        .map_err(|e| database("update event", &e))?;
        if updated.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("event {}", event.id)));
        }

        let kept: Vec<Uuid> = event.roles.iter().map(|role| *role.id.as_uuid()).collect();
        sqlx::query("DELETE FROM roles WHERE event_id = $1 AND NOT (id = ANY($2))")
            .bind(event.id.as_uuid())
            .bind(&kept)
            .execute(&mut *tx)
            .await
            .map_err(|e| database("remove roles", &e))?;
        write_roles(&mut tx, event).await?;
        write_co_organizers(&mut tx, event).await?;

        // The UPDATE above holds the event row, so no registration can land
        // between this check and the commit.
        let overfull: Option<Uuid> = sqlx::query_scalar(
            r"
            SELECT r.id
            FROM roles r
            JOIN registrations g ON g.role_id = r.id
            WHERE r.event_id = $1
            GROUP BY r.id, r.capacity
            HAVING COUNT(*) > r.capacity
            LIMIT 1
            ",
        )
        .bind(event.id.as_uuid())
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| database("check role capacities", &e))?;
        if let Some(role_id) = overfull {
            return Err(StoreError::CapacityExceeded(format!(
                "role {role_id} holds more registrations than its capacity"
            )));
        }

        tx.commit().await.map_err(|e| database("commit event update", &e))
    }

    async fn events_due_for_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let rows = sqlx::query(
            r"
            SELECT * FROM events
            WHERE status = 'open' AND NOT reminder_sent
              AND starts_at > $1 AND starts_at <= $2
            ORDER BY starts_at
            ",
        )
        .bind(from)
        .bind(until)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database("list due events", &e))?;

        let mut events = Vec::with_capacity(rows.len());
        for row in &rows {
            events.push(self.load_event(row).await?);
        }
        Ok(events)
    }

    async fn registrations_for_event(&self, event_id: EventId) -> StoreResult<Vec<Registration>> {
        sqlx::query(&format!(
            "SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE event_id = $1 ORDER BY created_at, id"
        ))
        .bind(event_id.as_uuid())
        .fetch_all(&self.pool)
        .await
        .map_err(|e| database("list registrations", &e))?
        .iter()
        .map(registration_from_row)
        .collect()
    }

    async fn count_for_user(&self, event_id: EventId, user_id: UserId) -> StoreResult<u32> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id.as_uuid())
        .bind(user_id.as_uuid())
        .fetch_one(&self.pool)
        .await
        .map_err(|e| database("count registrations", &e))?;
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn get_registration(&self, id: RegistrationId) -> StoreResult<Option<Registration>> {
        sqlx::query(&format!("SELECT {REGISTRATION_COLUMNS} FROM registrations WHERE id = $1"))
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("get registration", &e))?
            .as_ref()
            .map(registration_from_row)
            .transpose()
    }

    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        let event_id = registration.event_id.as_uuid();
        let mut tx = self.begin().await?;
        lock_event(&mut tx, event_id).await?;

        let held: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM registrations WHERE event_id = $1 AND user_id = $2",
        )
        .bind(event_id)
        .bind(registration.user_id.as_uuid())
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| database("count held roles", &e))?;
        if held >= i64::from(MAX_ROLES_PER_USER) {
            return Err(StoreError::CapacityExceeded(format!(
                "user {} already holds {held} roles",
                registration.user_id
            )));
        }
        check_role_has_room(&mut tx, event_id, registration.role_id.as_uuid()).await?;

        sqlx::query(&format!(
            "INSERT INTO registrations ({REGISTRATION_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6)"
        ))
        .bind(registration.id.as_uuid())
        .bind(registration.user_id.as_uuid())
        .bind(event_id)
        .bind(registration.role_id.as_uuid())
        .bind(registration.created_at)
        .bind(registration.updated_at)
        .execute(&mut *tx)
        .await
        .map_err(|e| database("insert registration", &e))?;

        tx.commit().await.map_err(|e| database("commit registration", &e))
    }

    async fn move_registration(
        &self,
        id: RegistrationId,
        role_id: RoleId,
        at: DateTime<Utc>,
    ) -> StoreResult<Registration> {
        let not_found = || StoreError::NotFound(format!("registration {id}"));
        let event_id: Uuid = sqlx::query_scalar("SELECT event_id FROM registrations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&self.pool)
            .await
            .map_err(|e| database("locate registration", &e))?
            .ok_or_else(not_found)?;

        let mut tx = self.begin().await?;
        lock_event(&mut tx, &event_id).await.map_err(|e| match e {
            StoreError::NotFound(_) => not_found(),
            other => other,
        })?;
        // Re-read under the lock: another writer may have moved or removed it.
        let current_role: Uuid = sqlx::query_scalar("SELECT role_id FROM registrations WHERE id = $1")
            .bind(id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| database("get registration", &e))?
            .ok_or_else(not_found)?;
        if current_role != *role_id.as_uuid() {
            check_role_has_room(&mut tx, &event_id, role_id.as_uuid()).await?;
        }

        let moved = sqlx::query(&format!(
            "UPDATE registrations SET role_id = $2, updated_at = $3 WHERE id = $1 RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(id.as_uuid())
        .bind(role_id.as_uuid())
        .bind(at)
        .fetch_optional(&mut *tx)
        .await
        .map_err(|e| database("move registration", &e))?
        .as_ref()
        .map(registration_from_row)
        .transpose()?
        .ok_or_else(not_found)?;

        tx.commit().await.map_err(|e| database("commit move", &e))?;
        Ok(moved)
    }

    async fn delete_registration(&self, id: RegistrationId) -> StoreResult<()> {
        let deleted = sqlx::query("DELETE FROM registrations WHERE id = $1")
            .bind(id.as_uuid())
            .execute(&self.pool)
            .await
            .map_err(|e| database("delete registration", &e))?;
        if deleted.rows_affected() == 0 {
            return Err(StoreError::NotFound(format!("registration {id}")));
        }
        Ok(())
    }

    async fn delete_event_cascade(&self, event_id: EventId) -> StoreResult<Vec<Registration>> {
        let mut tx = self.begin().await?;

        let exists = sqlx::query("SELECT id FROM events WHERE id = $1 FOR UPDATE")
            .bind(event_id.as_uuid())
            .fetch_optional(&mut *tx)
            .await
            .map_err(|e| database("lock event", &e))?;
        if exists.is_none() {
            return Err(StoreError::NotFound(format!("event {event_id}")));
        }

        let removed = sqlx::query(&format!(
            "DELETE FROM registrations WHERE event_id = $1 RETURNING {REGISTRATION_COLUMNS}"
        ))
        .bind(event_id.as_uuid())
        .fetch_all(&mut *tx)
        .await
        .map_err(|e| database("delete registrations", &e))?
        .iter()
        .map(registration_from_row)
        .collect::<StoreResult<Vec<_>>>()?;

        sqlx::query("DELETE FROM events WHERE id = $1")
            .bind(event_id.as_uuid())
            .execute(&mut *tx)
            .await
            .map_err(|e| database("delete event", &e))?;

        tx.commit().await.map_err(|e| database("commit event deletion", &e))?;
        tracing::debug!(event_id = %event_id, removed = removed.len(), "Event deleted with registrations");
        Ok(removed)
    }
}
