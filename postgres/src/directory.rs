//! User directory over the `users` table.

use async_trait::async_trait;
use signup_core::environment::{DirectoryError, Recipient, UserDirectory};
use signup_core::types::UserId;
use sqlx::postgres::{PgPool, PgRow};
use sqlx::Row;
use uuid::Uuid;

/// [`UserDirectory`] backed by `PostgreSQL`.
#[derive(Clone)]
pub struct PostgresUserDirectory {
    pool: PgPool,
}

impl PostgresUserDirectory {
    /// Create a directory over an existing pool.
    #[must_use]
    pub const fn new(pool: PgPool) -> Self {
        Self { pool }
    }
}

fn unavailable(error: &sqlx::Error) -> DirectoryError {
    tracing::error!(error = %error, "User directory query failed");
    DirectoryError::Unavailable(error.to_string())
}

fn recipient_from_row(row: &PgRow) -> Result<Recipient, DirectoryError> {
    Ok(Recipient {
        user_id: UserId::from_uuid(row.try_get("id").map_err(|e| unavailable(&e))?),
        email: row.try_get("email").map_err(|e| unavailable(&e))?,
        display_name: row.try_get("display_name").map_err(|e| unavailable(&e))?,
    })
}

#[async_trait]
impl UserDirectory for PostgresUserDirectory {
    async fn active_users(&self) -> Result<Vec<Recipient>, DirectoryError> {
        sqlx::query("SELECT id, email, display_name FROM users WHERE is_active ORDER BY id")
            .fetch_all(&self.pool)
            .await
            .map_err(|e| unavailable(&e))?
            .iter()
            .map(recipient_from_row)
            .collect()
    }

    async fn find_users(&self, ids: &[UserId]) -> Result<Vec<Recipient>, DirectoryError> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let ids: Vec<Uuid> = ids.iter().map(|id| *id.as_uuid()).collect();
        sqlx::query(
            "SELECT id, email, display_name FROM users WHERE is_active AND id = ANY($1) ORDER BY id",
        )
        .bind(&ids)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| unavailable(&e))?
        .iter()
        .map(recipient_from_row)
        .collect()
    }
}
