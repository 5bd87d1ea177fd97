//! Capacity ledger.
//!
//! The ledger is never stored. It is rebuilt from the live registrations of an
//! event each time the coordinator holds that event's lock, so it cannot drift
//! from the registration table. Building it also audits the stored state:
//! over-capacity roles, duplicate holdings and users above the role cap are
//! reported as invariant violations instead of being silently accepted.

use crate::error::{RegistrationError, Result};
use signup_core::types::{Event, EventId, MAX_ROLES_PER_USER, Registration, RoleId, UserId};
use std::collections::{BTreeMap, HashMap, HashSet};

/// Occupancy of one role.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct RoleOccupancy {
    /// Maximum registrations
    pub capacity: u32,
    /// Live registrations
    pub registered: u32,
}

impl RoleOccupancy {
    /// Free seats left.
    #[must_use]
    pub const fn remaining(&self) -> u32 {
        self.capacity.saturating_sub(self.registered)
    }

    /// Whether at least one seat is free.
    #[must_use]
    pub const fn has_free_seat(&self) -> bool {
        self.registered < self.capacity
    }
}

/// Per-role counts and per-user holdings of one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CapacityLedger {
    event_id: EventId,
    roles: BTreeMap<RoleId, RoleOccupancy>,
    roles_per_user: HashMap<UserId, u32>,
    holdings: HashSet<(UserId, RoleId)>,
}

impl CapacityLedger {
    /// Build the ledger of `event` from its live registrations.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvariantViolation`] if the registrations
    /// reference an unknown role, hold a role twice, exceed a role's capacity
    /// or put a user above the role cap.
    pub fn from_registrations(event: &Event, registrations: &[Registration]) -> Result<Self> {
        let mut ledger = Self {
            event_id: event.id,
            roles: event
                .roles
                .iter()
                .map(|role| {
                    (
                        role.id,
                        RoleOccupancy {
                            capacity: role.capacity.value(),
                            registered: 0,
                        },
                    )
                })
                .collect(),
            roles_per_user: HashMap::new(),
            holdings: HashSet::new(),
        };

        for registration in registrations {
            if registration.event_id != event.id {
                return Err(violation(format!(
                    "registration {} belongs to event {}, not {}",
                    registration.id, registration.event_id, event.id
                )));
            }
            ledger.record(registration.user_id, registration.role_id)?;
        }

        for (role_id, occupancy) in &ledger.roles {
            if occupancy.registered > occupancy.capacity {
                return Err(violation(format!(
                    "role {role_id} holds {} registrations over capacity {}",
                    occupancy.registered, occupancy.capacity
                )));
            }
        }
        if let Some((user, held)) = ledger
            .roles_per_user
            .iter()
            .find(|(_, held)| **held > MAX_ROLES_PER_USER)
        {
            return Err(violation(format!("user {user} holds {held} roles")));
        }

        Ok(ledger)
    }

    fn record(&mut self, user: UserId, role_id: RoleId) -> Result<()> {
        let Some(occupancy) = self.roles.get_mut(&role_id) else {
            return Err(violation(format!(
                "registration references role {role_id} not defined on event {}",
                self.event_id
            )));
        };
        if !self.holdings.insert((user, role_id)) {
            return Err(violation(format!("user {user} holds role {role_id} twice")));
        }
        occupancy.registered += 1;
        *self.roles_per_user.entry(user).or_insert(0) += 1;
        Ok(())
    }

    /// Event this ledger describes.
    #[must_use]
    pub const fn event_id(&self) -> EventId {
        self.event_id
    }

    /// Occupancy of a role, `None` if the role is not defined.
    #[must_use]
    pub fn occupancy(&self, role_id: &RoleId) -> Option<RoleOccupancy> {
        self.roles.get(role_id).copied()
    }

    /// Registrations currently held for a role (zero for unknown roles).
    #[must_use]
    pub fn registered(&self, role_id: &RoleId) -> u32 {
        self.roles.get(role_id).map_or(0, |occupancy| occupancy.registered)
    }

    /// Number of roles `user` holds on this event.
    #[must_use]
    pub fn roles_held(&self, user: &UserId) -> u32 {
        self.roles_per_user.get(user).copied().unwrap_or(0)
    }

    /// Whether `user` holds `role_id`.
    #[must_use]
    pub fn holds(&self, user: &UserId, role_id: &RoleId) -> bool {
        self.holdings.contains(&(*user, *role_id))
    }

    /// Total live registrations on the event.
    #[must_use]
    pub fn total_registered(&self) -> u32 {
        self.roles.values().map(|occupancy| occupancy.registered).sum()
    }

    /// Check whether `user` may take a seat in `role_id`.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::RoleNotFound`], [`RegistrationError::DuplicateRegistration`],
    /// [`RegistrationError::RoleFull`] or [`RegistrationError::RoleCapExceeded`],
    /// checked in that order.
    pub fn check_signup(&self, user: &UserId, role_id: &RoleId) -> Result<()> {
        let occupancy = self
            .roles
            .get(role_id)
            .ok_or(RegistrationError::RoleNotFound(*role_id))?;
        if self.holds(user, role_id) {
            return Err(RegistrationError::DuplicateRegistration(*role_id));
        }
        if !occupancy.has_free_seat() {
            return Err(RegistrationError::RoleFull {
                role_id: *role_id,
                capacity: occupancy.capacity,
            });
        }
        if self.roles_held(user) >= MAX_ROLES_PER_USER {
            return Err(RegistrationError::RoleCapExceeded);
        }
        Ok(())
    }

    /// Check whether `user` may move from `from` to `to`.
    ///
    /// A move never changes how many roles the user holds, so the role cap
    /// only needs to hold for the current count.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Validation`] when `from == to`,
    /// [`RegistrationError::InvariantViolation`] when the user does not hold
    /// `from`, then the same rejections as [`Self::check_signup`] against `to`.
    pub fn check_move(&self, user: &UserId, from: &RoleId, to: &RoleId) -> Result<()> {
        if from == to {
            return Err(RegistrationError::Validation(
                "registration already holds the target role".to_string(),
            ));
        }
        if !self.holds(user, from) {
            return Err(violation(format!("user {user} does not hold role {from}")));
        }
        let occupancy = self
            .roles
            .get(to)
            .ok_or(RegistrationError::RoleNotFound(*to))?;
        if self.holds(user, to) {
            return Err(RegistrationError::DuplicateRegistration(*to));
        }
        if !occupancy.has_free_seat() {
            return Err(RegistrationError::RoleFull {
                role_id: *to,
                capacity: occupancy.capacity,
            });
        }
        if self.roles_held(user) > MAX_ROLES_PER_USER {
            return Err(RegistrationError::RoleCapExceeded);
        }
        Ok(())
    }

    /// Check whether `role_id` may shrink or grow to `capacity`.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::RoleNotFound`] for an unknown role,
    /// [`RegistrationError::Validation`] when the role already holds more
    /// registrations than `capacity`.
    pub fn check_capacity_change(&self, role_id: &RoleId, capacity: u32) -> Result<()> {
        let occupancy = self
            .roles
            .get(role_id)
            .ok_or(RegistrationError::RoleNotFound(*role_id))?;
        if occupancy.registered > capacity {
            return Err(RegistrationError::Validation(format!(
                "role {role_id} already holds {} registrations, more than {capacity}",
                occupancy.registered
            )));
        }
        Ok(())
    }

    /// Apply a checked signup.
    ///
    /// # Errors
    ///
    /// Same as [`Self::check_signup`]; the ledger is unchanged on error.
    pub fn sign_up(&mut self, user: UserId, role_id: RoleId) -> Result<()> {
        self.check_signup(&user, &role_id)?;
        self.record(user, role_id)
    }

    /// Apply a checked move.
    ///
    /// # Errors
    ///
    /// Same as [`Self::check_move`]; the ledger is unchanged on error.
    pub fn move_role(&mut self, user: UserId, from: RoleId, to: RoleId) -> Result<()> {
        self.check_move(&user, &from, &to)?;
        self.release(user, from)?;
        self.record(user, to)
    }

    /// Release a seat.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvariantViolation`] if `user` does not hold `role_id`.
    pub fn release(&mut self, user: UserId, role_id: RoleId) -> Result<()> {
        if !self.holdings.remove(&(user, role_id)) {
            return Err(violation(format!("user {user} does not hold role {role_id}")));
        }
        if let Some(occupancy) = self.roles.get_mut(&role_id) {
            occupancy.registered = occupancy.registered.saturating_sub(1);
        }
        if let Some(held) = self.roles_per_user.get_mut(&user) {
            *held = held.saturating_sub(1);
            if *held == 0 {
                self.roles_per_user.remove(&user);
            }
        }
        Ok(())
    }
}

fn violation(message: String) -> RegistrationError {
    RegistrationError::InvariantViolation(message)
}
