//! `PostgreSQL` stores for the event sign-up platform.
//!
//! This crate provides production implementations of the persistence traits:
//!
//! - [`PostgresRegistrationStore`]: events, roles and registrations, with the
//!   (user, event, role) key backed by a unique constraint and cascading
//!   event deletion in one transaction
//! - [`PostgresFeedStore`]: notification messages, system message entries and
//!   bell pointers, with the (message, user) delivery key backed by a primary key
//! - [`PostgresUserDirectory`]: active users for audience resolution
//!
//! # Example
//!
//! ```ignore
//! use signup_postgres::{PostgresRegistrationStore, connect, run_migrations};
//!
//! async fn example() -> Result<(), Box<dyn std::error::Error>> {
//!     let pool = connect("postgres://localhost/signup", 10).await?;
//!     run_migrations(&pool).await?;
//!     let store = PostgresRegistrationStore::new(pool);
//!     Ok(())
//! }
//! ```

pub mod directory;
pub mod feed;
pub mod registration;

pub use directory::PostgresUserDirectory;
pub use feed::PostgresFeedStore;
pub use registration::PostgresRegistrationStore;

use sqlx::postgres::{PgPool, PgPoolOptions};

/// Open a connection pool.
///
/// # Errors
///
/// Returns the `sqlx` error if the database cannot be reached.
pub async fn connect(database_url: &str, max_connections: u32) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(max_connections)
        .connect(database_url)
        .await
}

/// Create or upgrade every table used by the stores in this crate.
///
/// # Errors
///
/// Returns the migration error if a migration fails.
pub async fn run_migrations(pool: &PgPool) -> Result<(), sqlx::migrate::MigrateError> {
    sqlx::migrate!("./migrations").run(pool).await?;
    tracing::info!("Database migrations applied");
    Ok(())
}
