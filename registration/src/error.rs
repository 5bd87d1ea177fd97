//! Error types for the registration engine.
//!
//! Errors fall into four groups, and callers are expected to treat them
//! differently:
//!
//! - **Validation**: malformed input, rejected before any lock is taken
//! - **Policy**: expected, user-facing refusals (`EventClosed`, `RoleFull`,
//!   `DuplicateRegistration`, `RoleCapExceeded`, `Unauthorized`)
//! - **Not found**: the referenced event, role or registration does not exist
//! - **Internal**: `InvariantViolation` and `Store`; the mutation was aborted
//!   and nothing was written

use signup_auth::AuthError;
use signup_core::types::{EventId, RegistrationId, RoleId, MAX_ROLES_PER_USER};
use thiserror::Error;

/// Result type alias for registration operations.
pub type Result<T> = std::result::Result<T, RegistrationError>;

/// Errors returned by the registration coordinator.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum RegistrationError {
    // ═══════════════════════════════════════════════════════════════════════
    // Validation
    // ═══════════════════════════════════════════════════════════════════════
    /// Input failed validation.
    #[error("Validation failed: {0}")]
    Validation(String),

    // ═══════════════════════════════════════════════════════════════════════
    // Policy rejections
    // ═══════════════════════════════════════════════════════════════════════
    /// The event is closed or has already started.
    #[error("Event {0} is not accepting signups")]
    EventClosed(EventId),

    /// The role has no free capacity.
    #[error("Role {role_id} is full ({capacity} of {capacity} taken)")]
    RoleFull {
        /// Role that is full
        role_id: RoleId,
        /// Its capacity
        capacity: u32,
    },

    /// The user already holds this role on this event.
    #[error("Already registered for role {0}")]
    DuplicateRegistration(RoleId),

    /// The user already holds the maximum number of roles on this event.
    #[error("Role cap reached: maximum {MAX_ROLES_PER_USER} roles per user per event")]
    RoleCapExceeded,

    /// The actor may not perform the operation.
    #[error("Unauthorized: {0}")]
    Unauthorized(#[from] AuthError),

    // ═══════════════════════════════════════════════════════════════════════
    // Not found
    // ═══════════════════════════════════════════════════════════════════════
    /// No such event.
    #[error("Event not found: {0}")]
    EventNotFound(EventId),

    /// No such role on the event.
    #[error("Role not found: {0}")]
    RoleNotFound(RoleId),

    /// No such registration.
    #[error("Registration not found: {0}")]
    RegistrationNotFound(RegistrationId),

    // ═══════════════════════════════════════════════════════════════════════
    // Internal
    // ═══════════════════════════════════════════════════════════════════════
    /// Stored state breaks a ledger invariant; the mutation was aborted.
    #[error("Invariant violation: {0}")]
    InvariantViolation(String),

    /// The registration store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}

impl RegistrationError {
    /// Whether this is an expected, user-facing refusal.
    #[must_use]
    pub const fn is_policy_rejection(&self) -> bool {
        matches!(
            self,
            Self::EventClosed(_)
                | Self::RoleFull { .. }
                | Self::DuplicateRegistration(_)
                | Self::RoleCapExceeded
                | Self::Unauthorized(_)
        )
    }

    /// Whether this indicates a failure of the engine itself.
    #[must_use]
    pub const fn is_internal(&self) -> bool {
        matches!(self, Self::InvariantViolation(_) | Self::Store(_))
    }

    /// Short machine-readable reason, used as a metrics label and API code.
    #[must_use]
    pub const fn reason(&self) -> &'static str {
        match self {
            Self::Validation(_) => "validation",
            Self::EventClosed(_) => "event_closed",
            Self::RoleFull { .. } => "role_full",
            Self::DuplicateRegistration(_) => "duplicate_registration",
            Self::RoleCapExceeded => "role_cap_exceeded",
            Self::Unauthorized(_) => "unauthorized",
            Self::EventNotFound(_) => "event_not_found",
            Self::RoleNotFound(_) => "role_not_found",
            Self::RegistrationNotFound(_) => "registration_not_found",
            Self::InvariantViolation(_) => "invariant_violation",
            Self::Store(_) => "store_error",
        }
    }
}

/// Errors reported by a [`RegistrationStore`](crate::store::RegistrationStore).
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// A uniqueness constraint rejected the write.
    #[error("Conflict: {0}")]
    Conflict(String),

    /// The write would overfill a role or exceed the per-user role cap.
    #[error("Capacity exceeded: {0}")]
    CapacityExceeded(String),

    /// The row to update or delete does not exist.
    #[error("Not found: {0}")]
    NotFound(String),

    /// The backing database failed.
    #[error("Database error: {0}")]
    Database(String),
}
