//! Event lifecycle: creation, co-organizers, role definitions, closing.
//!
//! Role sets are frozen once any registration exists; only capacities may
//! change afterwards, and never below the number of seats already taken.

use crate::coordinator::{RegistrationCoordinator, observe};
use crate::error::{RegistrationError, Result};
use crate::ledger::CapacityLedger;
use signup_auth::Capability;
use signup_core::event::DomainEventKind;
use signup_core::types::{
    Actor, Capacity, Event, EventDraft, EventId, EventStatus, Role, RoleDraft, RoleId, UserId,
};
use std::collections::HashSet;

impl RegistrationCoordinator {
    /// Create an event owned by the actor.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Unauthorized`] for tiers that may not create
    /// events, [`RegistrationError::Validation`] for a blank title or invalid
    /// roles.
    #[tracing::instrument(skip(self, actor, draft), fields(actor = %actor.id, title = %draft.title))]
    pub async fn create_event(&self, actor: &Actor, draft: EventDraft) -> Result<Event> {
        let result: Result<Event> = async {
            self.resolver.require_create_event(actor)?;
            let title = draft.title.trim();
            if title.is_empty() {
                return Err(RegistrationError::Validation("event title is empty".to_string()));
            }
            let roles = build_roles(&draft.roles)?;

            let event = Event::new(
                title.to_string(),
                actor.id,
                draft.starts_at,
                roles,
                self.clock.now(),
            );
            self.store.insert_event(&event).await?;
            tracing::info!(event_id = %event.id, roles = event.roles.len(), "Event created");

            self.publish(
                DomainEventKind::EventCreated {
                    event_id: event.id,
                    event_title: event.title.clone(),
                    starts_at: event.starts_at,
                },
                Some(actor.id),
            )
            .await;
            Ok(event)
        }
        .await;
        observe("create_event", &result);
        result
    }

    /// Grant `user_id` event-scoped management rights.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Unauthorized`] without management rights,
    /// [`RegistrationError::Validation`] if the user already organizes the event.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn assign_co_organizer(
        &self,
        actor: &Actor,
        event_id: EventId,
        user_id: UserId,
    ) -> Result<Event> {
        let result: Result<Event> = async {
            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.load_event(event_id).await?;
            self.resolver
                .resolve(actor, &event)
                .require(Capability::ManageParticipants)?;
            if event.organizers().contains(&user_id) {
                return Err(RegistrationError::Validation(format!(
                    "user {user_id} already organizes this event"
                )));
            }

            event.co_organizers.push(user_id);
            self.store.update_event(&event).await?;
            tracing::info!(event_id = %event_id, user_id = %user_id, "Co-organizer assigned");

            self.publish(
                DomainEventKind::CoOrganizerAssigned {
                    event_id,
                    event_title: event.title.clone(),
                    user_id,
                },
                Some(actor.id),
            )
            .await;
            Ok(event)
        }
        .await;
        observe("assign_co_organizer", &result);
        result
    }

    /// Change one role's capacity.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Validation`] for a zero capacity or one below the
    /// seats already taken, [`RegistrationError::RoleNotFound`],
    /// [`RegistrationError::Unauthorized`] without edit rights.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn update_role_capacity(
        &self,
        actor: &Actor,
        event_id: EventId,
        role_id: RoleId,
        capacity: u32,
    ) -> Result<Event> {
        let result: Result<Event> = async {
            let new_capacity = Capacity::try_from(capacity)
                .map_err(|e| RegistrationError::Validation(e.to_string()))?;

            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.load_event(event_id).await?;
            self.resolver
                .resolve(actor, &event)
                .require(Capability::EditEvent)?;

            let registrations = self.store.registrations_for_event(event_id).await?;
            let ledger = CapacityLedger::from_registrations(&event, &registrations)?;
            ledger.check_capacity_change(&role_id, capacity)?;

            let before = event.clone();
            if let Some(role) = event.role_mut(&role_id) {
                role.capacity = new_capacity;
            }
            if let Err(error) = self.store.update_event(&event).await {
                return Err(self
                    .explain_refused_write(&before, error, |ledger| {
                        ledger.check_capacity_change(&role_id, capacity)
                    })
                    .await);
            }
            tracing::info!(event_id = %event_id, role_id = %role_id, capacity, "Role capacity updated");
            Ok(event)
        }
        .await;
        observe("update_role_capacity", &result);
        result
    }

    /// Replace the whole role set of an event that has no registrations.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Validation`] for invalid roles or when any
    /// registration exists, [`RegistrationError::Unauthorized`] without edit
    /// rights.
    #[tracing::instrument(skip(self, actor, roles), fields(actor = %actor.id))]
    pub async fn replace_roles(
        &self,
        actor: &Actor,
        event_id: EventId,
        roles: Vec<RoleDraft>,
    ) -> Result<Event> {
        let result: Result<Event> = async {
            let roles = build_roles(&roles)?;

            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.load_event(event_id).await?;
            self.resolver
                .resolve(actor, &event)
                .require(Capability::EditEvent)?;
            if !self.store.registrations_for_event(event_id).await?.is_empty() {
                return Err(RegistrationError::Validation(
                    "roles cannot be replaced once registrations exist".to_string(),
                ));
            }

            event.roles = roles;
            self.store.update_event(&event).await?;
            tracing::info!(event_id = %event_id, roles = event.roles.len(), "Roles replaced");
            Ok(event)
        }
        .await;
        observe("replace_roles", &result);
        result
    }

    /// Stop accepting self-service signups and moves.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Unauthorized`] without edit rights.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn close_event(&self, actor: &Actor, event_id: EventId) -> Result<Event> {
        let result: Result<Event> = async {
            let _guard = self.locks.acquire(event_id).await;
            let mut event = self.load_event(event_id).await?;
            self.resolver
                .resolve(actor, &event)
                .require(Capability::EditEvent)?;

            if event.status != EventStatus::Closed {
                event.status = EventStatus::Closed;
                self.store.update_event(&event).await?;
                tracing::info!(event_id = %event_id, "Event closed");
            }
            Ok(event)
        }
        .await;
        observe("close_event", &result);
        result
    }
}

/// Validate role drafts and turn them into roles with fresh identifiers.
fn build_roles(drafts: &[RoleDraft]) -> Result<Vec<Role>> {
    if drafts.is_empty() {
        return Err(RegistrationError::Validation(
            "an event needs at least one role".to_string(),
        ));
    }
    let mut seen = HashSet::new();
    drafts
        .iter()
        .map(|draft| {
            let name = draft.name.trim();
            if name.is_empty() {
                return Err(RegistrationError::Validation("role name is empty".to_string()));
            }
            let Some(capacity) = Capacity::new(draft.capacity) else {
                return Err(RegistrationError::Validation(format!(
                    "role '{name}' must have a capacity of at least 1"
                )));
            };
            if !seen.insert(name.to_lowercase()) {
                return Err(RegistrationError::Validation(format!(
                    "role '{name}' is defined twice"
                )));
            }
            Ok(Role::new(name.to_string(), capacity))
        })
        .collect()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;

    #[test]
    fn role_names_are_unique_ignoring_case() {
        let result = build_roles(&[RoleDraft::new("Usher", 2), RoleDraft::new(" usher ", 1)]);
        assert!(matches!(result, Err(RegistrationError::Validation(_))));
    }

    #[test]
    fn zero_capacity_is_rejected() {
        let result = build_roles(&[RoleDraft::new("Usher", 0)]);
        assert!(matches!(result, Err(RegistrationError::Validation(_))));
    }

    #[test]
    fn names_are_trimmed() {
        let roles = build_roles(&[RoleDraft::new("  Cook ", 3)]).unwrap();
        assert_eq!(roles[0].name, "Cook");
        assert_eq!(roles[0].capacity.value(), 3);
    }
}
