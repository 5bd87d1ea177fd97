//! Domain types for the event sign-up platform.
//!
//! Identifiers, actors, events, roles and registrations. These are plain
//! owned values; every mutation rule lives in the registration engine.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;
use std::num::NonZeroU32;
use uuid::Uuid;

/// Maximum number of distinct roles one user may hold within a single event.
pub const MAX_ROLES_PER_USER: u32 = 3;

// ============================================================================
// Identifiers
// ============================================================================

macro_rules! uuid_id {
    ($(#[$meta:meta])* $name:ident) => {
        $(#[$meta])*
        #[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
        #[serde(transparent)]
        pub struct $name(Uuid);

        impl $name {
            #[doc = concat!("Creates a new random `", stringify!($name), "`")]
            #[must_use]
            pub fn new() -> Self {
                Self(Uuid::new_v4())
            }

            #[doc = concat!("Create a `", stringify!($name), "` from a `Uuid`")]
            #[must_use]
            pub const fn from_uuid(uuid: Uuid) -> Self {
                Self(uuid)
            }

            /// Get the inner UUID
            #[must_use]
            pub const fn as_uuid(&self) -> &Uuid {
                &self.0
            }
        }

        impl Default for $name {
            fn default() -> Self {
                Self::new()
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}", self.0)
            }
        }
    };
}

uuid_id! {
    /// Stable identifier of a user, issued by the authentication collaborator
    UserId
}

uuid_id! {
    /// Unique identifier for an event
    EventId
}

uuid_id! {
    /// Unique identifier for a role within an event
    RoleId
}

uuid_id! {
    /// Unique identifier for a registration
    RegistrationId
}

uuid_id! {
    /// Unique identifier for a composed notification message
    MessageId
}

uuid_id! {
    /// Unique identifier for a per-user system message entry
    EntryId
}

uuid_id! {
    /// Unique identifier for a bell pointer
    BellId
}

uuid_id! {
    /// Unique identifier for an emitted domain event
    DomainEventId
}

// ============================================================================
// Actors
// ============================================================================

/// Global role tier of a user.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RoleTier {
    /// Regular member; may only manage their own registrations
    Participant,
    /// May create events and delete their own
    Leader,
    /// Full control over every event
    Administrator,
    /// Full control over every event and every administrator
    SuperAdmin,
}

impl RoleTier {
    /// Whether this tier is one of the administrative tiers.
    #[must_use]
    pub const fn is_admin(self) -> bool {
        matches!(self, Self::Administrator | Self::SuperAdmin)
    }
}

impl fmt::Display for RoleTier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::Participant => "participant",
            Self::Leader => "leader",
            Self::Administrator => "administrator",
            Self::SuperAdmin => "super_admin",
        };
        f.write_str(name)
    }
}

/// Resolved identity of the caller, as handed over by authentication.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Actor {
    /// Stable user identifier
    pub id: UserId,
    /// Whether the account's email address has been verified
    pub verified: bool,
    /// Global role tier
    pub tier: RoleTier,
}

impl Actor {
    /// Creates a verified actor with the given tier.
    #[must_use]
    pub const fn new(id: UserId, tier: RoleTier) -> Self {
        Self {
            id,
            verified: true,
            tier,
        }
    }

    /// Creates an actor whose email address is not verified yet.
    #[must_use]
    pub const fn unverified(id: UserId, tier: RoleTier) -> Self {
        Self {
            id,
            verified: false,
            tier,
        }
    }
}

// ============================================================================
// Events and Roles
// ============================================================================

/// Number of registrations a role can hold. Never zero.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(try_from = "u32", into = "u32")]
pub struct Capacity(NonZeroU32);

/// A role capacity of zero was supplied.
#[derive(Debug, Clone, Copy, PartialEq, Eq, thiserror::Error)]
#[error("role capacity must be at least 1")]
pub struct ZeroCapacity;

impl Capacity {
    /// Creates a new `Capacity`, or `None` for zero
    #[must_use]
    pub const fn new(value: u32) -> Option<Self> {
        match NonZeroU32::new(value) {
            Some(value) => Some(Self(value)),
            None => None,
        }
    }

    /// Returns the capacity value
    #[must_use]
    pub const fn value(&self) -> u32 {
        self.0.get()
    }
}

impl TryFrom<u32> for Capacity {
    type Error = ZeroCapacity;

    fn try_from(value: u32) -> Result<Self, Self::Error> {
        Self::new(value).ok_or(ZeroCapacity)
    }
}

impl From<Capacity> for u32 {
    fn from(capacity: Capacity) -> Self {
        capacity.value()
    }
}

impl fmt::Display for Capacity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A named, capacity-bounded slot within an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Role {
    /// Role identifier
    pub id: RoleId,
    /// Display name, unique within the event
    pub name: String,
    /// Maximum number of registrations
    pub capacity: Capacity,
}

impl Role {
    /// Creates a role with a fresh identifier.
    #[must_use]
    pub fn new(name: String, capacity: Capacity) -> Self {
        Self {
            id: RoleId::new(),
            name,
            capacity,
        }
    }
}

/// Role definition supplied when creating or redefining an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RoleDraft {
    /// Role name
    pub name: String,
    /// Requested capacity
    pub capacity: u32,
}

impl RoleDraft {
    /// Creates a role draft.
    #[must_use]
    pub fn new(name: impl Into<String>, capacity: u32) -> Self {
        Self {
            name: name.into(),
            capacity,
        }
    }
}

/// Input for creating an event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventDraft {
    /// Event title
    pub title: String,
    /// When the event starts
    pub starts_at: DateTime<Utc>,
    /// Ordered role definitions
    pub roles: Vec<RoleDraft>,
}

/// Whether an event still takes signups.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EventStatus {
    /// Accepting signups until it starts
    Open,
    /// Closed by an organizer
    Closed,
}

/// An event users can sign up for.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Event {
    /// Event identifier
    pub id: EventId,
    /// Title shown in notifications
    pub title: String,
    /// User who created the event
    pub created_by: UserId,
    /// Users granted event-scoped management rights
    pub co_organizers: Vec<UserId>,
    /// Ordered role definitions
    pub roles: Vec<Role>,
    /// When the event starts
    pub starts_at: DateTime<Utc>,
    /// Signup status
    pub status: EventStatus,
    /// Whether the participant reminder has been emitted
    pub reminder_sent: bool,
    /// When the event was created
    pub created_at: DateTime<Utc>,
}

impl Event {
    /// Creates an open event with no co-organizers.
    #[must_use]
    pub fn new(
        title: String,
        created_by: UserId,
        starts_at: DateTime<Utc>,
        roles: Vec<Role>,
        created_at: DateTime<Utc>,
    ) -> Self {
        Self {
            id: EventId::new(),
            title,
            created_by,
            co_organizers: Vec::new(),
            roles,
            starts_at,
            status: EventStatus::Open,
            reminder_sent: false,
            created_at,
        }
    }

    /// Looks up a role by identifier.
    #[must_use]
    pub fn role(&self, role_id: &RoleId) -> Option<&Role> {
        self.roles.iter().find(|role| role.id == *role_id)
    }

    /// Looks up a role by identifier for modification.
    pub fn role_mut(&mut self, role_id: &RoleId) -> Option<&mut Role> {
        self.roles.iter_mut().find(|role| role.id == *role_id)
    }

    /// Whether the user is listed as a co-organizer.
    #[must_use]
    pub fn is_co_organizer(&self, user_id: &UserId) -> bool {
        self.co_organizers.contains(user_id)
    }

    /// Creator followed by co-organizers, without duplicates.
    #[must_use]
    pub fn organizers(&self) -> Vec<UserId> {
        let mut organizers = vec![self.created_by];
        for user in &self.co_organizers {
            if !organizers.contains(user) {
                organizers.push(*user);
            }
        }
        organizers
    }

    /// Whether signups are accepted at `now` (open and not yet started).
    #[must_use]
    pub fn accepts_signups(&self, now: DateTime<Utc>) -> bool {
        self.status == EventStatus::Open && self.starts_at > now
    }
}

// ============================================================================
// Registrations
// ============================================================================

/// Binding of one user to one role within one event.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Registration {
    /// Registration identifier, stable across role moves
    pub id: RegistrationId,
    /// Registrant
    pub user_id: UserId,
    /// Event registered for
    pub event_id: EventId,
    /// Role currently held
    pub role_id: RoleId,
    /// When the registration was created
    pub created_at: DateTime<Utc>,
    /// When the role reference last changed
    pub updated_at: DateTime<Utc>,
}

impl Registration {
    /// Creates a registration with a fresh identifier.
    #[must_use]
    pub fn new(user_id: UserId, event_id: EventId, role_id: RoleId, now: DateTime<Utc>) -> Self {
        Self {
            id: RegistrationId::new(),
            user_id,
            event_id,
            role_id,
            created_at: now,
            updated_at: now,
        }
    }
}
