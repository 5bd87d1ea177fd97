//! Builders for events and actors.

use chrono::{DateTime, Duration, Utc};
use signup_core::environment::Clock;
use signup_core::types::{Capacity, Event, EventDraft, Role, RoleDraft, UserId};

/// Ready-made actors of each tier.
pub mod actors {
    use signup_core::types::{Actor, RoleTier, UserId};

    /// Verified participant
    #[must_use]
    pub fn participant() -> Actor {
        Actor::new(UserId::new(), RoleTier::Participant)
    }

    /// Verified leader (may create events)
    #[must_use]
    pub fn leader() -> Actor {
        Actor::new(UserId::new(), RoleTier::Leader)
    }

    /// Verified administrator
    #[must_use]
    pub fn admin() -> Actor {
        Actor::new(UserId::new(), RoleTier::Administrator)
    }

    /// Verified super-admin
    #[must_use]
    pub fn super_admin() -> Actor {
        Actor::new(UserId::new(), RoleTier::SuperAdmin)
    }
}

/// Builder for [`Event`] values and [`EventDraft`]s.
///
/// Defaults to an open event starting one week after the clock's time.
#[derive(Clone, Debug)]
pub struct EventFixture {
    title: String,
    created_by: UserId,
    co_organizers: Vec<UserId>,
    roles: Vec<(String, u32)>,
    starts_at: DateTime<Utc>,
    now: DateTime<Utc>,
}

impl EventFixture {
    /// Start a fixture relative to `clock`
    #[must_use]
    pub fn new(clock: &dyn Clock) -> Self {
        let now = clock.now();
        Self {
            title: "Community Breakfast".to_string(),
            created_by: UserId::new(),
            co_organizers: Vec::new(),
            roles: Vec::new(),
            starts_at: now + Duration::days(7),
            now,
        }
    }

    /// Set the title
    #[must_use]
    pub fn title(mut self, title: &str) -> Self {
        self.title = title.to_string();
        self
    }

    /// Set the creator
    #[must_use]
    pub const fn created_by(mut self, user: UserId) -> Self {
        self.created_by = user;
        self
    }

    /// List a co-organizer
    #[must_use]
    pub fn co_organizer(mut self, user: UserId) -> Self {
        self.co_organizers.push(user);
        self
    }

    /// Append a role
    #[must_use]
    pub fn role(mut self, name: &str, capacity: u32) -> Self {
        self.roles.push((name.to_string(), capacity));
        self
    }

    /// Set the start time
    #[must_use]
    pub const fn starts_at(mut self, starts_at: DateTime<Utc>) -> Self {
        self.starts_at = starts_at;
        self
    }

    /// Build the event value directly
    ///
    /// # Panics
    ///
    /// Panics if a role was given a capacity of zero; use [`Self::draft`] to
    /// exercise validation instead.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn build(self) -> Event {
        let roles = self
            .roles
            .into_iter()
            .map(|(name, capacity)| {
                let capacity = Capacity::new(capacity).expect("built roles need a capacity of at least 1");
                Role::new(name, capacity)
            })
            .collect();
        let mut event = Event::new(self.title, self.created_by, self.starts_at, roles, self.now);
        event.co_organizers = self.co_organizers;
        event
    }

    /// Build a creation request instead (creator and co-organizers are ignored)
    #[must_use]
    pub fn draft(self) -> EventDraft {
        EventDraft {
            title: self.title,
            starts_at: self.starts_at,
            roles: self
                .roles
                .into_iter()
                .map(|(name, capacity)| RoleDraft::new(name, capacity))
                .collect(),
        }
    }
}
