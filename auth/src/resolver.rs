//! The authorization resolver.

use crate::error::{AuthError, Result};
use crate::permissions::TierPermissions;
use serde::{Deserialize, Serialize};
use signup_core::types::{Actor, Event, UserId};
use std::fmt;

/// An event-scoped operation that requires authorization.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Capability {
    /// Change event details, roles or capacities
    EditEvent,
    /// Delete an event that has no live registrations
    DeleteEvent,
    /// Delete an event despite live registrations, cascading them
    ForceDeleteEvent,
    /// Move or remove other users' registrations, assign co-organizers
    ManageParticipants,
    /// Sign up for roles on the actor's own behalf
    RegisterSelf,
}

impl fmt::Display for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let name = match self {
            Self::EditEvent => "edit_event",
            Self::DeleteEvent => "delete_event",
            Self::ForceDeleteEvent => "force_delete_event",
            Self::ManageParticipants => "manage_participants",
            Self::RegisterSelf => "register_self",
        };
        f.write_str(name)
    }
}

/// How the actor relates to the event; reported for logging.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Relationship {
    /// Administrator or super-admin
    Admin,
    /// Created the event
    Creator,
    /// Listed as co-organizer
    CoOrganizer,
    /// No special relationship
    Participant,
}

/// What an actor may do to one event.
///
/// Derived per request and never stored. An unverified actor gets an empty
/// set whatever their tier or relationship, and every refusal then reports
/// [`AuthError::NotVerified`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
#[allow(clippy::struct_excessive_bools)] // One flag per capability
pub struct CapabilitySet {
    /// The actor's relationship to the event
    pub relationship: Relationship,
    verified: bool,
    edit_event: bool,
    delete_event: bool,
    force_delete_event: bool,
    manage_participants: bool,
    register_self: bool,
}

impl CapabilitySet {
    /// Whether the set contains `capability`.
    #[must_use]
    pub const fn allows(&self, capability: Capability) -> bool {
        match capability {
            Capability::EditEvent => self.edit_event,
            Capability::DeleteEvent => self.delete_event,
            Capability::ForceDeleteEvent => self.force_delete_event,
            Capability::ManageParticipants => self.manage_participants,
            Capability::RegisterSelf => self.register_self,
        }
    }

    /// Fails unless the set contains `capability`.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::NotVerified`] when the actor is unverified and
    /// [`AuthError::InsufficientPermissions`] otherwise.
    pub const fn require(&self, capability: Capability) -> Result<()> {
        if self.allows(capability) {
            Ok(())
        } else {
            Err(self.refusal(capability))
        }
    }

    /// Whether the actor may act on a registration owned by `owner`.
    #[must_use]
    pub fn may_act_for(&self, actor: &UserId, owner: &UserId) -> bool {
        self.verified && (actor == owner || self.manage_participants)
    }

    /// Fails unless the actor may act on a registration owned by `owner`.
    ///
    /// # Errors
    ///
    /// Same as [`Self::require`] with [`Capability::ManageParticipants`].
    pub fn require_act_for(&self, actor: &UserId, owner: &UserId) -> Result<()> {
        if self.may_act_for(actor, owner) {
            Ok(())
        } else {
            Err(self.refusal(Capability::ManageParticipants))
        }
    }

    const fn refusal(&self, required: Capability) -> AuthError {
        if self.verified {
            AuthError::InsufficientPermissions { required }
        } else {
            AuthError::NotVerified
        }
    }
}

/// Computes capability sets. Stateless; a single instance serves every caller.
#[derive(Clone, Copy, Debug, Default)]
pub struct AuthorizationResolver;

impl AuthorizationResolver {
    /// Resolve the capability set of `actor` against `event`.
    #[must_use]
    pub fn resolve(&self, actor: &Actor, event: &Event) -> CapabilitySet {
        let permissions = TierPermissions::for_tier(actor.tier);
        let is_creator = event.created_by == actor.id;
        let is_co_organizer = event.is_co_organizer(&actor.id);

        let relationship = if actor.tier.is_admin() {
            Relationship::Admin
        } else if is_creator {
            Relationship::Creator
        } else if is_co_organizer {
            Relationship::CoOrganizer
        } else {
            Relationship::Participant
        };

        let organizer = is_creator || is_co_organizer;
        let verified = actor.verified;
        let caps = CapabilitySet {
            relationship,
            verified,
            edit_event: verified && (organizer || permissions.can_edit_any_event),
            delete_event: verified && (organizer || permissions.can_delete_any_event),
            // Narrower than "manage": being listed never grants it.
            force_delete_event: verified
                && (permissions.can_delete_any_event
                    || (permissions.can_delete_own_event && is_creator)),
            manage_participants: verified && (organizer || permissions.can_manage_any_participants),
            register_self: verified,
        };

        tracing::trace!(
            actor = %actor.id,
            event_id = %event.id,
            relationship = ?caps.relationship,
            verified,
            "Resolved capabilities"
        );
        caps
    }

    /// Whether `actor` may create events at all.
    ///
    /// # Errors
    ///
    /// Returns [`AuthError::InsufficientPermissions`] for tiers without the
    /// permission and [`AuthError::NotVerified`] for unverified actors.
    pub const fn require_create_event(&self, actor: &Actor) -> Result<()> {
        if !actor.verified {
            return Err(AuthError::NotVerified);
        }
        if TierPermissions::for_tier(actor.tier).can_create_event {
            Ok(())
        } else {
            Err(AuthError::InsufficientPermissions {
                required: Capability::EditEvent,
            })
        }
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::Utc;
    use proptest::prelude::*;
    use signup_core::types::RoleTier;

    const ALL: [Capability; 5] = [
        Capability::EditEvent,
        Capability::DeleteEvent,
        Capability::ForceDeleteEvent,
        Capability::ManageParticipants,
        Capability::RegisterSelf,
    ];

    fn event_created_by(creator: UserId) -> Event {
        Event::new("Fundraiser".to_string(), creator, Utc::now(), vec![], Utc::now())
    }

    #[test]
    fn creator_with_leader_tier_gets_full_event_rights() {
        let actor = Actor::new(UserId::new(), RoleTier::Leader);
        let caps = AuthorizationResolver.resolve(&actor, &event_created_by(actor.id));

        assert_eq!(caps.relationship, Relationship::Creator);
        assert!(caps.allows(Capability::EditEvent));
        assert!(caps.allows(Capability::ManageParticipants));
        assert!(caps.allows(Capability::ForceDeleteEvent));
    }

    #[test]
    fn creator_with_participant_tier_cannot_force_delete() {
        let actor = Actor::new(UserId::new(), RoleTier::Participant);
        let caps = AuthorizationResolver.resolve(&actor, &event_created_by(actor.id));

        assert!(caps.allows(Capability::DeleteEvent));
        assert!(!caps.allows(Capability::ForceDeleteEvent));
    }

    #[test]
    fn co_organizer_manages_but_cannot_force_delete() {
        let co_organizer = Actor::new(UserId::new(), RoleTier::Leader);
        let mut event = event_created_by(UserId::new());
        event.co_organizers.push(co_organizer.id);

        let caps = AuthorizationResolver.resolve(&co_organizer, &event);

        assert_eq!(caps.relationship, Relationship::CoOrganizer);
        assert!(caps.allows(Capability::EditEvent));
        assert!(caps.allows(Capability::ManageParticipants));
        assert!(!caps.allows(Capability::ForceDeleteEvent));
        assert_eq!(
            caps.require(Capability::ForceDeleteEvent),
            Err(AuthError::InsufficientPermissions {
                required: Capability::ForceDeleteEvent
            })
        );
    }

    #[test]
    fn co_organizer_rights_do_not_leak_to_other_events() {
        let co_organizer = Actor::new(UserId::new(), RoleTier::Participant);
        let mut listed = event_created_by(UserId::new());
        listed.co_organizers.push(co_organizer.id);
        let other = event_created_by(UserId::new());

        assert!(AuthorizationResolver
            .resolve(&co_organizer, &listed)
            .allows(Capability::ManageParticipants));
        assert!(!AuthorizationResolver
            .resolve(&co_organizer, &other)
            .allows(Capability::ManageParticipants));
    }

    #[test]
    fn stranger_may_only_act_for_themselves() {
        let stranger = Actor::new(UserId::new(), RoleTier::Participant);
        let caps = AuthorizationResolver.resolve(&stranger, &event_created_by(UserId::new()));

        assert_eq!(caps.relationship, Relationship::Participant);
        assert!(caps.may_act_for(&stranger.id, &stranger.id));
        assert!(!caps.may_act_for(&stranger.id, &UserId::new()));
        assert!(caps.require(Capability::EditEvent).is_err());
    }

    #[test]
    fn unverified_actor_cannot_register() {
        let actor = Actor::unverified(UserId::new(), RoleTier::Participant);
        let caps = AuthorizationResolver.resolve(&actor, &event_created_by(UserId::new()));

        assert_eq!(
            caps.require(Capability::RegisterSelf),
            Err(AuthError::NotVerified)
        );
        assert_eq!(
            AuthorizationResolver.require_create_event(&actor),
            Err(AuthError::NotVerified)
        );
    }

    #[test]
    fn unverified_actor_holds_nothing_even_on_own_registration() {
        let actor = Actor::unverified(UserId::new(), RoleTier::Leader);
        let caps = AuthorizationResolver.resolve(&actor, &event_created_by(actor.id));

        assert_eq!(caps.relationship, Relationship::Creator);
        assert!(!caps.may_act_for(&actor.id, &actor.id));
        assert_eq!(
            caps.require_act_for(&actor.id, &actor.id),
            Err(AuthError::NotVerified)
        );
        assert_eq!(caps.require(Capability::EditEvent), Err(AuthError::NotVerified));
    }

    #[test]
    fn verified_stranger_refusal_names_the_capability() {
        let stranger = Actor::new(UserId::new(), RoleTier::Participant);
        let caps = AuthorizationResolver.resolve(&stranger, &event_created_by(UserId::new()));

        assert_eq!(
            caps.require_act_for(&stranger.id, &UserId::new()),
            Err(AuthError::InsufficientPermissions {
                required: Capability::ManageParticipants
            })
        );
    }

    proptest! {
        #[test]
        fn admins_hold_every_capability(super_admin in any::<bool>(), listed in any::<bool>()) {
            let tier = if super_admin { RoleTier::SuperAdmin } else { RoleTier::Administrator };
            let admin = Actor::new(UserId::new(), tier);
            let mut event = event_created_by(UserId::new());
            if listed {
                event.co_organizers.push(admin.id);
            }

            let caps = AuthorizationResolver.resolve(&admin, &event);
            for capability in ALL {
                prop_assert!(caps.allows(capability));
            }
        }

        #[test]
        fn unverified_actors_hold_nothing(tier_index in 0usize..4, creator in any::<bool>()) {
            let tier = [
                RoleTier::Participant,
                RoleTier::Leader,
                RoleTier::Administrator,
                RoleTier::SuperAdmin,
            ][tier_index];
            let actor = Actor::unverified(UserId::new(), tier);
            let event = event_created_by(if creator { actor.id } else { UserId::new() });

            let caps = AuthorizationResolver.resolve(&actor, &event);
            for capability in ALL {
                prop_assert_eq!(caps.require(capability), Err(AuthError::NotVerified));
            }
        }
    }
}
