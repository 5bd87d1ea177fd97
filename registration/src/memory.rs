//! In-memory registration store.
//!
//! Events and registrations share one lock, so every method (the cascade
//! delete and the capacity checks included) is atomic with respect to the
//! others.

use crate::error::StoreError;
use crate::store::{RegistrationStore, StoreResult};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use signup_core::types::{
    Event, EventId, EventStatus, MAX_ROLES_PER_USER, Registration, RegistrationId, RoleId, UserId,
};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

#[derive(Debug, Default)]
struct Tables {
    events: HashMap<EventId, Event>,
    registrations: HashMap<RegistrationId, Registration>,
}

impl Tables {
    fn holds(&self, user_id: UserId, event_id: EventId, role_id: RoleId) -> bool {
        self.registrations.values().any(|r| {
            r.user_id == user_id && r.event_id == event_id && r.role_id == role_id
        })
    }

    fn count(&self, matches: impl Fn(&Registration) -> bool) -> u32 {
        let count = self.registrations.values().filter(|r| matches(r)).count();
        u32::try_from(count).unwrap_or(u32::MAX)
    }

    fn check_role_has_room(&self, event_id: EventId, role_id: RoleId) -> StoreResult<()> {
        let capacity = self
            .events
            .get(&event_id)
            .and_then(|event| event.role(&role_id))
            .map(|role| role.capacity.value())
            .ok_or_else(|| StoreError::NotFound(format!("role {role_id}")))?;
        let taken = self.count(|r| r.role_id == role_id);
        if taken >= capacity {
            return Err(StoreError::CapacityExceeded(format!(
                "role {role_id} is full ({taken} of {capacity})"
            )));
        }
        Ok(())
    }
}

/// [`RegistrationStore`] kept in process memory.
#[derive(Debug, Default)]
pub struct InMemoryRegistrationStore {
    tables: RwLock<Tables>,
}

impl InMemoryRegistrationStore {
    /// Create an empty store
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, Tables> {
        self.tables.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, Tables> {
        self.tables.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Insert a registration without any key check.
    ///
    /// Only for tests that need to simulate corrupted state.
    #[doc(hidden)]
    pub fn insert_unchecked(&self, registration: Registration) {
        self.write().registrations.insert(registration.id, registration);
    }
}

#[async_trait]
impl RegistrationStore for InMemoryRegistrationStore {
    async fn insert_event(&self, event: &Event) -> StoreResult<()> {
        let mut tables = self.write();
        if tables.events.contains_key(&event.id) {
            return Err(StoreError::Conflict(format!("event {} exists", event.id)));
        }
        tables.events.insert(event.id, event.clone());
        Ok(())
    }

    async fn get_event(&self, event_id: EventId) -> StoreResult<Option<Event>> {
        Ok(self.read().events.get(&event_id).cloned())
    }

    async fn update_event(&self, event: &Event) -> StoreResult<()> {
        let mut tables = self.write();
        for role in &event.roles {
            let taken = tables.count(|r| r.role_id == role.id);
            if taken > role.capacity.value() {
                return Err(StoreError::CapacityExceeded(format!(
                    "role {} holds {taken}, more than {}",
                    role.id, role.capacity
                )));
            }
        }
        match tables.events.get_mut(&event.id) {
            Some(stored) => {
                *stored = event.clone();
                Ok(())
            }
            None => Err(StoreError::NotFound(format!("event {}", event.id))),
        }
    }

    async fn events_due_for_reminder(
        &self,
        from: DateTime<Utc>,
        until: DateTime<Utc>,
    ) -> StoreResult<Vec<Event>> {
        let mut due: Vec<Event> = self
            .read()
            .events
            .values()
            .filter(|event| {
                event.status == EventStatus::Open
                    && !event.reminder_sent
                    && event.starts_at > from
                    && event.starts_at <= until
            })
            .cloned()
            .collect();
        due.sort_by_key(|event| event.starts_at);
        Ok(due)
    }

    async fn registrations_for_event(&self, event_id: EventId) -> StoreResult<Vec<Registration>> {
        let mut registrations: Vec<Registration> = self
            .read()
            .registrations
            .values()
            .filter(|r| r.event_id == event_id)
            .cloned()
            .collect();
        registrations.sort_by_key(|r| (r.created_at, r.id));
        Ok(registrations)
    }

    async fn count_for_user(&self, event_id: EventId, user_id: UserId) -> StoreResult<u32> {
        let count = self
            .read()
            .registrations
            .values()
            .filter(|r| r.event_id == event_id && r.user_id == user_id)
            .count();
        Ok(u32::try_from(count).unwrap_or(u32::MAX))
    }

    async fn get_registration(&self, id: RegistrationId) -> StoreResult<Option<Registration>> {
        Ok(self.read().registrations.get(&id).cloned())
    }

    async fn insert_registration(&self, registration: &Registration) -> StoreResult<()> {
        let mut tables = self.write();
        if !tables.events.contains_key(&registration.event_id) {
            return Err(StoreError::NotFound(format!("event {}", registration.event_id)));
        }
        if tables.holds(registration.user_id, registration.event_id, registration.role_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already holds role {}",
                registration.user_id, registration.role_id
            )));
        }
        tables.check_role_has_room(registration.event_id, registration.role_id)?;
        let held = tables.count(|r| {
            r.event_id == registration.event_id && r.user_id == registration.user_id
        });
        if held >= MAX_ROLES_PER_USER {
            return Err(StoreError::CapacityExceeded(format!(
                "user {} already holds {held} roles",
                registration.user_id
            )));
        }
        tables.registrations.insert(registration.id, registration.clone());
        Ok(())
    }

    async fn move_registration(
        &self,
        id: RegistrationId,
        role_id: RoleId,
        at: DateTime<Utc>,
    ) -> StoreResult<Registration> {
        let mut tables = self.write();
        let Some(current) = tables.registrations.get(&id).cloned() else {
            return Err(StoreError::NotFound(format!("registration {id}")));
        };
        if tables.holds(current.user_id, current.event_id, role_id) {
            return Err(StoreError::Conflict(format!(
                "user {} already holds role {role_id}",
                current.user_id
            )));
        }
        if current.role_id != role_id {
            tables.check_role_has_room(current.event_id, role_id)?;
        }
        let moved = Registration {
            role_id,
            updated_at: at,
            ..current
        };
        tables.registrations.insert(id, moved.clone());
        Ok(moved)
    }

    async fn delete_registration(&self, id: RegistrationId) -> StoreResult<()> {
        self.write()
            .registrations
            .remove(&id)
            .map(|_| ())
            .ok_or_else(|| StoreError::NotFound(format!("registration {id}")))
    }

    async fn delete_event_cascade(&self, event_id: EventId) -> StoreResult<Vec<Registration>> {
        let mut tables = self.write();
        if tables.events.remove(&event_id).is_none() {
            return Err(StoreError::NotFound(format!("event {event_id}")));
        }
        let mut removed = Vec::new();
        tables.registrations.retain(|_, registration| {
            if registration.event_id == event_id {
                removed.push(registration.clone());
                false
            } else {
                true
            }
        });
        removed.sort_by_key(|r| (r.created_at, r.id));
        Ok(removed)
    }
}
