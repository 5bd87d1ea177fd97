//! Persistence boundary of the registration engine.
//!
//! Each coordinator serializes its own mutations per event, but several
//! coordinators (one per server process) may share a store. Implementations
//! therefore check the bounds again inside the write itself:
//!
//! - the (user, event, role) key, reported as [`StoreError::Conflict`]
//! - role capacity and the per-user role cap, reported as
//!   [`StoreError::CapacityExceeded`]
//!
//! The check and the write must be atomic with respect to every other writer
//! of the same event.

use crate::error::StoreError;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signup_core::types::{Event, EventId, Registration, RegistrationId, RoleId, UserId};

/// Result type alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// Storage for events, their roles and registrations.
#[async_trait]
pub trait RegistrationStore: Send + Sync {
    /// Insert a new event with its roles.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the id is taken, [`StoreError::Database`] on failure.
    async fn insert_event(&self, event: &Event) -> StoreResult<()>;

    /// Load an event with its roles and co-organizers.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on failure.
    async fn get_event(&self, event_id: EventId) -> StoreResult<Option<Event>>;

    /// Overwrite an event's mutable fields, roles and co-organizers.
    ///
    /// Roles missing from `event` are removed; the caller guarantees they hold
    /// no registrations.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the event does not exist,
    /// [`StoreError::CapacityExceeded`] if a role would end up holding more
    /// registrations than its new capacity.
    async fn update_event(&self, event: &Event) -> StoreResult<()>;

    /// Open events starting in `(from, until]` whose reminder is not sent yet.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on failure.
    async fn events_due_for_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>>;

    /// Live registrations of an event, oldest first.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on failure.
    async fn registrations_for_event(&self, event_id: EventId) -> StoreResult<Vec<Registration>>;

    /// Number of roles `user_id` holds on `event_id`.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on failure.
    async fn count_for_user(&self, event_id: EventId, user_id: UserId) -> StoreResult<u32>;

    /// Load one registration.
    ///
    /// # Errors
    ///
    /// [`StoreError::Database`] on failure.
    async fn get_registration(&self, id: RegistrationId) -> StoreResult<Option<Registration>>;

    /// Insert a registration.
    ///
    /// # Errors
    ///
    /// [`StoreError::Conflict`] if the (user, event, role) key already exists,
    /// [`StoreError::CapacityExceeded`] if the role is full or the user already
    /// holds [`MAX_ROLES_PER_USER`](signup_core::types::MAX_ROLES_PER_USER) roles on the event.
    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()>;

    /// Point an existing registration at another role, in place.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the registration does not exist,
    /// [`StoreError::Conflict`] if the user already holds `role_id`,
    /// [`StoreError::CapacityExceeded`] if `role_id` is full.
    async fn move_registration(
        &self,
        id: RegistrationId,
        role_id: RoleId,
        at: DateTime<Utc>,
    ) -> StoreResult<Registration>;

    /// Delete one registration.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the registration does not exist.
    async fn delete_registration(&self, id: RegistrationId) -> StoreResult<()>;

    /// Delete an event and every registration referencing it, atomically.
    ///
    /// Returns the registrations that were removed.
    ///
    /// # Errors
    ///
    /// [`StoreError::NotFound`] if the event does not exist. On any error
    /// nothing is deleted.
    async fn delete_event_cascade(&self, event_id: EventId) -> StoreResult<Vec<Registration>>;
}
