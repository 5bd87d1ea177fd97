//! Domain events emitted by the registration engine.
//!
//! A [`DomainEvent`] is a fact: it is produced only after the corresponding
//! mutation has been committed, and it carries every field downstream
//! consumers need (audience snapshots included), so the notification composer
//! can stay a pure function.

use crate::types::{DomainEventId, EventId, RegistrationId, RoleId, UserId};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// What happened to a registration.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RegistrationChange {
    /// The user signed up for the role
    SignedUp,
    /// The user cancelled their own registration
    Cancelled,
    /// An organizer removed the registration
    Removed,
    /// The registration moved to another role
    Moved,
}

/// Payload of a domain event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum DomainEventKind {
    /// A new event was published
    EventCreated {
        /// Event identifier
        event_id: EventId,
        /// Event title
        event_title: String,
        /// When the event starts
        starts_at: DateTime<Utc>,
    },

    /// Generic "a registration changed" fact
    RegistrationUpdated {
        /// Event identifier
        event_id: EventId,
        /// Event title
        event_title: String,
        /// Registration identifier
        registration_id: RegistrationId,
        /// Registrant
        user_id: UserId,
        /// Role held after the change (or released, for cancellations)
        role_id: RoleId,
        /// Name of that role
        role_name: String,
        /// Kind of change
        change: RegistrationChange,
        /// Creator and co-organizers at the time of the change
        organizers: Vec<UserId>,
    },

    /// Specific role transition of an existing registration
    RegistrationMoved {
        /// Event identifier
        event_id: EventId,
        /// Event title
        event_title: String,
        /// Registration identifier (unchanged by the move)
        registration_id: RegistrationId,
        /// Registrant
        user_id: UserId,
        /// Role before the move
        from_role_id: RoleId,
        /// Name of the role before the move
        from_role_name: String,
        /// Role after the move
        to_role_id: RoleId,
        /// Name of the role after the move
        to_role_name: String,
        /// Creator and co-organizers at the time of the move
        organizers: Vec<UserId>,
    },

    /// A user was added to an event's co-organizer list
    CoOrganizerAssigned {
        /// Event identifier
        event_id: EventId,
        /// Event title
        event_title: String,
        /// The new co-organizer
        user_id: UserId,
    },

    /// A user asked to reset their password
    PasswordResetRequested {
        /// Requesting user
        user_id: UserId,
    },

    /// A newly registered account must verify its email address
    EmailVerificationRequired {
        /// The new user
        user_id: UserId,
    },

    /// An event is about to start
    EventReminderDue {
        /// Event identifier
        event_id: EventId,
        /// Event title
        event_title: String,
        /// When the event starts
        starts_at: DateTime<Utc>,
        /// Users registered at reminder time
        participants: Vec<UserId>,
    },

    /// An event and all of its registrations were deleted
    EventDeleted {
        /// Event identifier
        event_id: EventId,
        /// Event title
        event_title: String,
        /// Users who were registered before deletion
        participants: Vec<UserId>,
        /// Whether live registrations were cascaded
        forced: bool,
    },
}

/// Envelope around a [`DomainEventKind`] with identity and attribution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct DomainEvent {
    /// Unique event identifier; notification messages derive their id from it
    pub id: DomainEventId,
    /// When the underlying mutation committed
    pub occurred_at: DateTime<Utc>,
    /// User who caused the event, `None` for system-initiated events
    pub actor: Option<UserId>,
    /// What happened
    pub kind: DomainEventKind,
}

impl DomainEvent {
    /// Wraps a payload in a fresh envelope.
    #[must_use]
    pub fn new(kind: DomainEventKind, actor: Option<UserId>, occurred_at: DateTime<Utc>) -> Self {
        Self {
            id: DomainEventId::new(),
            occurred_at,
            actor,
            kind,
        }
    }

    /// Stable name of the payload variant, used in logs and metrics.
    #[must_use]
    pub const fn name(&self) -> &'static str {
        match self.kind {
            DomainEventKind::EventCreated { .. } => "EventCreated",
            DomainEventKind::RegistrationUpdated { .. } => "RegistrationUpdated",
            DomainEventKind::RegistrationMoved { .. } => "RegistrationMoved",
            DomainEventKind::CoOrganizerAssigned { .. } => "CoOrganizerAssigned",
            DomainEventKind::PasswordResetRequested { .. } => "PasswordResetRequested",
            DomainEventKind::EmailVerificationRequired { .. } => "EmailVerificationRequired",
            DomainEventKind::EventReminderDue { .. } => "EventReminderDue",
            DomainEventKind::EventDeleted { .. } => "EventDeleted",
        }
    }
}
