//! Registration coordinator.
//!
//! The only code path that writes registrations. Every mutation of an event
//! follows the same shape:
//!
//! 1. cheap checks that need no lock (input validation, the role-cap fast path)
//! 2. acquire the event's exclusive section
//! 3. reload the event and its registrations, resolve the actor's capabilities
//!    and rebuild the [`CapacityLedger`]
//! 4. check the ledger, write to the store (which checks the bounds again, for
//!    coordinators in other processes sharing it)
//! 5. publish the resulting domain events, still inside the section so that
//!    consumers see one event's changes in commit order
//!
//! Publish failures are logged; they never undo a committed change.

use crate::error::{RegistrationError, Result, StoreError};
use crate::ledger::CapacityLedger;
use crate::locks::EventLocks;
use crate::metrics;
use crate::store::RegistrationStore;
use signup_auth::{AuthorizationResolver, Capability};
use signup_core::environment::Clock;
use signup_core::event::{DomainEvent, DomainEventKind, RegistrationChange};
use signup_core::event_bus::EventBus;
use signup_core::types::{
    Actor, Event, EventId, MAX_ROLES_PER_USER, Registration, RegistrationId, RoleId, UserId,
};
use std::sync::Arc;

/// Serializes and validates every registration change.
pub struct RegistrationCoordinator {
    pub(crate) store: Arc<dyn RegistrationStore>,
    event_bus: Arc<dyn EventBus>,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) resolver: AuthorizationResolver,
    pub(crate) locks: EventLocks,
}

impl RegistrationCoordinator {
    /// Create a coordinator over `store`, publishing to `event_bus`.
    #[must_use]
    pub fn new(
        store: Arc<dyn RegistrationStore>,
        event_bus: Arc<dyn EventBus>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            store,
            event_bus,
            clock,
            resolver: AuthorizationResolver,
            locks: EventLocks::new(),
        }
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Queries
    // ═══════════════════════════════════════════════════════════════════════

    /// Load an event.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::EventNotFound`] or [`RegistrationError::Store`].
    pub async fn event(&self, event_id: EventId) -> Result<Event> {
        self.load_event(event_id).await
    }

    /// Live registrations of an event, oldest first.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::EventNotFound`] or [`RegistrationError::Store`].
    pub async fn registrations(&self, event_id: EventId) -> Result<Vec<Registration>> {
        self.load_event(event_id).await?;
        Ok(self.store.registrations_for_event(event_id).await?)
    }

    /// Current ledger of an event.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::EventNotFound`], [`RegistrationError::Store`], or
    /// [`RegistrationError::InvariantViolation`] if stored state is corrupt.
    pub async fn ledger(&self, event_id: EventId) -> Result<CapacityLedger> {
        let _guard = self.locks.acquire(event_id).await;
        let event = self.load_event(event_id).await?;
        let registrations = self.store.registrations_for_event(event_id).await?;
        CapacityLedger::from_registrations(&event, &registrations)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Sign up
    // ═══════════════════════════════════════════════════════════════════════

    /// Register the actor for a role.
    ///
    /// # Errors
    ///
    /// In check order: [`RegistrationError::RoleCapExceeded`] (fast path),
    /// [`RegistrationError::EventNotFound`], [`RegistrationError::Unauthorized`]
    /// (unverified actor), [`RegistrationError::EventClosed`],
    /// [`RegistrationError::RoleNotFound`],
    /// [`RegistrationError::DuplicateRegistration`], [`RegistrationError::RoleFull`],
    /// [`RegistrationError::RoleCapExceeded`].
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn sign_up(
        &self,
        actor: &Actor,
        event_id: EventId,
        role_id: RoleId,
    ) -> Result<Registration> {
        let result = self.register(actor, actor.id, event_id, role_id).await;
        observe("sign_up", &result);
        result
    }

    /// Register another user for a role on the actor's event.
    ///
    /// Requires participant-management rights. Organizers may fill roles of
    /// events that are closed to self-service signups; capacity and the role
    /// cap still apply.
    ///
    /// # Errors
    ///
    /// Same as [`Self::sign_up`], except that `EventClosed` is never returned.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn add_participant(
        &self,
        actor: &Actor,
        user_id: UserId,
        event_id: EventId,
        role_id: RoleId,
    ) -> Result<Registration> {
        let result = self.register(actor, user_id, event_id, role_id).await;
        observe("add_participant", &result);
        result
    }

    async fn register(
        &self,
        actor: &Actor,
        user_id: UserId,
        event_id: EventId,
        role_id: RoleId,
    ) -> Result<Registration> {
        // Fast path: fail without contending for the lock. Re-checked below.
        if self.store.count_for_user(event_id, user_id).await? >= MAX_ROLES_PER_USER {
            return Err(RegistrationError::RoleCapExceeded);
        }

        let _guard = self.locks.acquire(event_id).await;
        let event = self.load_event(event_id).await?;
        let caps = self.resolver.resolve(actor, &event);
        let self_service = actor.id == user_id;
        if self_service {
            caps.require(Capability::RegisterSelf)?;
        } else {
            caps.require(Capability::ManageParticipants)?;
        }

        let now = self.clock.now();
        if self_service && !event.accepts_signups(now) {
            return Err(RegistrationError::EventClosed(event_id));
        }
        let role = event
            .role(&role_id)
            .ok_or(RegistrationError::RoleNotFound(role_id))?;

        let registrations = self.store.registrations_for_event(event_id).await?;
        let ledger = CapacityLedger::from_registrations(&event, &registrations)?;
        ledger.check_signup(&user_id, &role_id)?;

        let registration = Registration::new(user_id, event_id, role_id, now);
        if let Err(error) = self.store.insert_registration(&registration).await {
            return Err(self
                .explain_refused_write(&event, error, |ledger| ledger.check_signup(&user_id, &role_id))
                .await);
        }

        metrics::record_change(RegistrationChange::SignedUp);
        tracing::info!(
            event_id = %event_id,
            role_id = %role_id,
            user_id = %user_id,
            registration_id = %registration.id,
            "Registration created"
        );

        self.publish(
            DomainEventKind::RegistrationUpdated {
                event_id,
                event_title: event.title.clone(),
                registration_id: registration.id,
                user_id,
                role_id,
                role_name: role.name.clone(),
                change: RegistrationChange::SignedUp,
                organizers: event.organizers(),
            },
            Some(actor.id),
        )
        .await;

        Ok(registration)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Cancel
    // ═══════════════════════════════════════════════════════════════════════

    /// Cancel a registration, freeing its seat.
    ///
    /// The registrant may always cancel their own registration; anyone else
    /// needs participant-management rights, and the change is reported as a
    /// removal.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::RegistrationNotFound`], [`RegistrationError::Unauthorized`],
    /// or an internal error.
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn cancel(&self, actor: &Actor, registration_id: RegistrationId) -> Result<Registration> {
        let result = self.cancel_inner(actor, registration_id).await;
        observe("cancel", &result);
        result
    }

    async fn cancel_inner(&self, actor: &Actor, registration_id: RegistrationId) -> Result<Registration> {
        let located = self.load_registration(registration_id).await?;

        let _guard = self.locks.acquire(located.event_id).await;
        // Reload: the registration may have moved or gone while we waited.
        let registration = self.load_registration(registration_id).await?;
        let event = self.load_event(registration.event_id).await?;
        let caps = self.resolver.resolve(actor, &event);
        caps.require_act_for(&actor.id, &registration.user_id)?;

        let registrations = self.store.registrations_for_event(event.id).await?;
        let mut ledger = CapacityLedger::from_registrations(&event, &registrations)?;
        ledger.release(registration.user_id, registration.role_id)?;

        self.store
            .delete_registration(registration_id)
            .await
            .map_err(|error| match error {
                StoreError::NotFound(_) => RegistrationError::RegistrationNotFound(registration_id),
                other => other.into(),
            })?;

        let change = if actor.id == registration.user_id {
            RegistrationChange::Cancelled
        } else {
            RegistrationChange::Removed
        };
        metrics::record_change(change);
        tracing::info!(
            event_id = %event.id,
            registration_id = %registration_id,
            user_id = %registration.user_id,
            change = ?change,
            "Registration cancelled"
        );

        self.publish(
            DomainEventKind::RegistrationUpdated {
                event_id: event.id,
                event_title: event.title.clone(),
                registration_id,
                user_id: registration.user_id,
                role_id: registration.role_id,
                role_name: role_name(&event, &registration.role_id),
                change,
                organizers: event.organizers(),
            },
            Some(actor.id),
        )
        .await;

        Ok(registration)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Move
    // ═══════════════════════════════════════════════════════════════════════

    /// Move a registration to another role of the same event, in place.
    ///
    /// The registration keeps its identifier. Both the generic
    /// `RegistrationUpdated` and the specific `RegistrationMoved` are
    /// published.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::Validation`] when the target is the current role,
    /// [`RegistrationError::RegistrationNotFound`], [`RegistrationError::Unauthorized`],
    /// [`RegistrationError::EventClosed`] (self-service only),
    /// [`RegistrationError::RoleNotFound`], [`RegistrationError::DuplicateRegistration`],
    /// [`RegistrationError::RoleFull`].
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn move_registration(
        &self,
        actor: &Actor,
        registration_id: RegistrationId,
        to_role: RoleId,
    ) -> Result<Registration> {
        let result = self.move_inner(actor, registration_id, to_role).await;
        observe("move", &result);
        result
    }

    async fn move_inner(
        &self,
        actor: &Actor,
        registration_id: RegistrationId,
        to_role: RoleId,
    ) -> Result<Registration> {
        let located = self.load_registration(registration_id).await?;
        if located.role_id == to_role {
            return Err(RegistrationError::Validation(
                "registration already holds the target role".to_string(),
            ));
        }

        let _guard = self.locks.acquire(located.event_id).await;
        let registration = self.load_registration(registration_id).await?;
        let event = self.load_event(registration.event_id).await?;
        let caps = self.resolver.resolve(actor, &event);
        let self_service = actor.id == registration.user_id;
        caps.require_act_for(&actor.id, &registration.user_id)?;

        let now = self.clock.now();
        if self_service && !event.accepts_signups(now) {
            return Err(RegistrationError::EventClosed(event.id));
        }
        let target = event
            .role(&to_role)
            .ok_or(RegistrationError::RoleNotFound(to_role))?;

        let registrations = self.store.registrations_for_event(event.id).await?;
        let ledger = CapacityLedger::from_registrations(&event, &registrations)?;
        ledger.check_move(&registration.user_id, &registration.role_id, &to_role)?;

        let from_role = registration.role_id;
        let moved = match self.store.move_registration(registration_id, to_role, now).await {
            Ok(moved) => moved,
            Err(StoreError::NotFound(_)) => {
                return Err(RegistrationError::RegistrationNotFound(registration_id));
            }
            Err(error) => {
                let user_id = registration.user_id;
                return Err(self
                    .explain_refused_write(&event, error, |ledger| {
                        ledger.check_move(&user_id, &from_role, &to_role)
                    })
                    .await);
            }
        };

        metrics::record_change(RegistrationChange::Moved);
        tracing::info!(
            event_id = %event.id,
            registration_id = %registration_id,
            from_role = %from_role,
            to_role = %to_role,
            "Registration moved"
        );

        let organizers = event.organizers();
        self.publish(
            DomainEventKind::RegistrationUpdated {
                event_id: event.id,
                event_title: event.title.clone(),
                registration_id,
                user_id: moved.user_id,
                role_id: to_role,
                role_name: target.name.clone(),
                change: RegistrationChange::Moved,
                organizers: organizers.clone(),
            },
            Some(actor.id),
        )
        .await;
        self.publish(
            DomainEventKind::RegistrationMoved {
                event_id: event.id,
                event_title: event.title.clone(),
                registration_id,
                user_id: moved.user_id,
                from_role_id: from_role,
                from_role_name: role_name(&event, &from_role),
                to_role_id: to_role,
                to_role_name: target.name.clone(),
                organizers,
            },
            Some(actor.id),
        )
        .await;

        Ok(moved)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Deletion
    // ═══════════════════════════════════════════════════════════════════════

    /// Delete an event together with all of its registrations.
    ///
    /// Returns the registrations that were removed.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::EventNotFound`], [`RegistrationError::Unauthorized`]
    /// unless the actor holds the force-delete capability, or
    /// [`RegistrationError::Store`] (in which case nothing was deleted).
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn force_delete_event(&self, actor: &Actor, event_id: EventId) -> Result<Vec<Registration>> {
        let result: Result<Vec<Registration>> = async {
            let _guard = self.locks.acquire(event_id).await;
            let event = self.load_event(event_id).await?;
            self.resolver
                .resolve(actor, &event)
                .require(Capability::ForceDeleteEvent)?;
            self.delete_locked(actor, event).await
        }
        .await;
        observe("force_delete_event", &result);
        result
    }

    /// Delete an event.
    ///
    /// An event without registrations needs only the delete capability; one
    /// with registrations is force-deleted and needs that capability instead.
    ///
    /// # Errors
    ///
    /// Same as [`Self::force_delete_event`].
    #[tracing::instrument(skip(self, actor), fields(actor = %actor.id))]
    pub async fn delete_event(&self, actor: &Actor, event_id: EventId) -> Result<Vec<Registration>> {
        let result: Result<Vec<Registration>> = async {
            let _guard = self.locks.acquire(event_id).await;
            let event = self.load_event(event_id).await?;
            let caps = self.resolver.resolve(actor, &event);
            if self.store.registrations_for_event(event_id).await?.is_empty() {
                caps.require(Capability::DeleteEvent)?;
            } else {
                caps.require(Capability::ForceDeleteEvent)?;
            }
            self.delete_locked(actor, event).await
        }
        .await;
        observe("delete_event", &result);
        result
    }

    async fn delete_locked(&self, actor: &Actor, event: Event) -> Result<Vec<Registration>> {
        let removed = self
            .store
            .delete_event_cascade(event.id)
            .await
            .map_err(|error| match error {
                StoreError::NotFound(_) => RegistrationError::EventNotFound(event.id),
                other => other.into(),
            })?;
        self.locks.forget(event.id);

        let forced = !removed.is_empty();
        let mut participants: Vec<UserId> = Vec::new();
        for registration in &removed {
            if !participants.contains(&registration.user_id) {
                participants.push(registration.user_id);
            }
        }

        metrics::record_event_deleted(forced);
        tracing::info!(
            event_id = %event.id,
            removed = removed.len(),
            forced,
            "Event deleted"
        );

        self.publish(
            DomainEventKind::EventDeleted {
                event_id: event.id,
                event_title: event.title,
                participants,
                forced,
            },
            Some(actor.id),
        )
        .await;

        Ok(removed)
    }

    // ═══════════════════════════════════════════════════════════════════════
    // Helpers
    // ═══════════════════════════════════════════════════════════════════════

    pub(crate) async fn load_event(&self, event_id: EventId) -> Result<Event> {
        self.store
            .get_event(event_id)
            .await?
            .ok_or(RegistrationError::EventNotFound(event_id))
    }

    async fn load_registration(&self, id: RegistrationId) -> Result<Registration> {
        self.store
            .get_registration(id)
            .await?
            .ok_or(RegistrationError::RegistrationNotFound(id))
    }

    /// Turn a store refusal of a ledger-approved write into the caller's error.
    ///
    /// Another coordinator sharing the store may have committed first; then a
    /// ledger rebuilt from the store refuses the write too, and that refusal
    /// is what the caller gets. A store that refuses what a fresh ledger
    /// allows disagrees with the ledger, which is an invariant violation.
    pub(crate) async fn explain_refused_write(
        &self,
        event: &Event,
        error: StoreError,
        check: impl FnOnce(&CapacityLedger) -> Result<()> + Send,
    ) -> RegistrationError {
        if !matches!(error, StoreError::Conflict(_) | StoreError::CapacityExceeded(_)) {
            return error.into();
        }
        let registrations = match self.store.registrations_for_event(event.id).await {
            Ok(registrations) => registrations,
            Err(reload) => return reload.into(),
        };
        match CapacityLedger::from_registrations(event, &registrations).and_then(|ledger| check(&ledger)) {
            Err(refusal) => {
                tracing::info!(event_id = %event.id, %error, "Write lost to a concurrent writer");
                refusal
            }
            Ok(()) => RegistrationError::InvariantViolation(format!(
                "store rejected a ledger-approved write: {error}"
            )),
        }
    }

    /// Publish a committed fact. Failures are logged and swallowed.
    pub(crate) async fn publish(&self, kind: DomainEventKind, actor: Option<UserId>) {
        let event = DomainEvent::new(kind, actor, self.clock.now());
        match self.event_bus.publish(&event).await {
            Ok(()) => tracing::debug!(event = event.name(), id = %event.id, "Domain event published"),
            Err(error) => tracing::error!(
                event = event.name(),
                id = %event.id,
                %error,
                "Failed to publish domain event"
            ),
        }
    }
}

/// Log and count a failed operation by its category.
pub(crate) fn observe<T>(operation: &'static str, result: &Result<T>) {
    let Err(error) = result else {
        return;
    };
    metrics::record_rejection(error);
    if error.is_internal() {
        tracing::error!(operation, %error, "Registration operation aborted");
    } else {
        tracing::debug!(operation, reason = error.reason(), %error, "Registration operation refused");
    }
}


fn role_name(event: &Event, role_id: &RoleId) -> String {
    event
        .role(role_id)
        .map_or_else(|| role_id.to_string(), |role| role.name.clone())
}
