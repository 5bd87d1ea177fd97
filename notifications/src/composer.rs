//! Notification composer: domain event in, canonical message out.
//!
//! [`compose`] performs no I/O and is deterministic: the same domain event
//! always yields the same message, identifier included. That is what makes
//! re-dispatching a message after a partial failure idempotent.

use chrono::{DateTime, Utc};
use signup_core::event::{DomainEvent, DomainEventKind, RegistrationChange};
use signup_core::notification::{Audience, Author, Category, NotificationMessage, Priority};
use signup_core::types::{MessageId, UserId};

/// Title, body and routing of one message before it is stamped with ids.
struct Template {
    title: String,
    body: String,
    category: Category,
    priority: Priority,
    audience: Audience,
}

/// Build the notification message for a committed domain event.
///
/// The message id is derived from the domain event id; the author is the
/// acting user, or the system for scheduled events.
#[must_use]
pub fn compose(event: &DomainEvent) -> NotificationMessage {
    let template = template_for(&event.kind);
    NotificationMessage {
        id: MessageId::from_uuid(*event.id.as_uuid()),
        source_event: event.id,
        title: template.title,
        body: template.body,
        category: template.category,
        priority: template.priority,
        created_at: event.occurred_at,
        author: event.actor.map_or(Author::System, Author::User),
        audience: template.audience,
    }
}

fn template_for(kind: &DomainEventKind) -> Template {
    match kind {
        DomainEventKind::EventCreated {
            event_title,
            starts_at,
            ..
        } => Template {
            title: format!("New event: {event_title}"),
            body: format!(
                "'{event_title}' takes place on {}. Roles are open for sign-up.",
                format_start(*starts_at)
            ),
            category: Category::Announcement,
            priority: Priority::Normal,
            audience: Audience::All,
        },

        DomainEventKind::RegistrationUpdated {
            event_title,
            user_id,
            role_name,
            change,
            organizers,
            ..
        } => {
            let (title, body, priority) = match change {
                RegistrationChange::SignedUp => (
                    format!("New sign-up: {event_title}"),
                    format!("A registration for the role '{role_name}' on '{event_title}' was created."),
                    Priority::Normal,
                ),
                RegistrationChange::Cancelled => (
                    format!("Registration cancelled: {event_title}"),
                    format!("The registration for the role '{role_name}' on '{event_title}' was cancelled."),
                    Priority::Normal,
                ),
                RegistrationChange::Removed => (
                    format!("Registration removed: {event_title}"),
                    format!(
                        "The registration for the role '{role_name}' on '{event_title}' was removed by an organizer."
                    ),
                    Priority::High,
                ),
                RegistrationChange::Moved => (
                    format!("Registration updated: {event_title}"),
                    format!("A registration on '{event_title}' now holds the role '{role_name}'."),
                    Priority::Normal,
                ),
            };
            Template {
                title,
                body,
                category: Category::RoleChange,
                priority,
                audience: organizers_and(organizers, *user_id),
            }
        }

        DomainEventKind::RegistrationMoved {
            event_title,
            user_id,
            from_role_name,
            to_role_name,
            organizers,
            ..
        } => Template {
            title: format!("Role changed: {event_title}"),
            body: format!(
                "A registration on '{event_title}' moved from '{from_role_name}' to '{to_role_name}'."
            ),
            category: Category::RoleChange,
            priority: Priority::Normal,
            audience: organizers_and(organizers, *user_id),
        },

        DomainEventKind::CoOrganizerAssigned {
            event_title,
            user_id,
            ..
        } => Template {
            title: format!("You are now a co-organizer of {event_title}"),
            body: format!("You can now edit '{event_title}' and manage its participants."),
            category: Category::AdminAlert,
            priority: Priority::High,
            audience: Audience::users([*user_id]),
        },

        DomainEventKind::PasswordResetRequested { user_id } => Template {
            title: "Password reset requested".to_string(),
            body: "A password reset was requested for your account. If this was not you, \
                   you can ignore this message."
                .to_string(),
            category: Category::Security,
            priority: Priority::High,
            audience: Audience::users([*user_id]),
        },

        DomainEventKind::EmailVerificationRequired { user_id } => Template {
            title: "Verify your email address".to_string(),
            body: "Welcome! Please verify your email address to start signing up for events."
                .to_string(),
            category: Category::Security,
            priority: Priority::High,
            audience: Audience::users([*user_id]),
        },

        DomainEventKind::EventReminderDue {
            event_title,
            starts_at,
            participants,
            ..
        } => Template {
            title: format!("Reminder: {event_title}"),
            body: format!(
                "'{event_title}' starts on {}. Thank you for signing up!",
                format_start(*starts_at)
            ),
            category: Category::Reminder,
            priority: Priority::Normal,
            audience: Audience::users(participants.iter().copied()),
        },

        DomainEventKind::EventDeleted {
            event_title,
            participants,
            ..
        } => Template {
            title: format!("Event cancelled: {event_title}"),
            body: format!("'{event_title}' was deleted and your registrations for it were removed."),
            category: Category::Announcement,
            priority: Priority::High,
            audience: Audience::users(participants.iter().copied()),
        },
    }
}

fn organizers_and(organizers: &[UserId], user_id: UserId) -> Audience {
    Audience::users(organizers.iter().copied().chain(std::iter::once(user_id)))
}

fn format_start(starts_at: DateTime<Utc>) -> String {
    starts_at.format("%A %-d %B %Y at %H:%M UTC").to_string()
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use chrono::TimeZone;
    use proptest::prelude::*;
    use signup_core::types::{EventId, RegistrationId, RoleId};

    fn at() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 3, 14, 18, 30, 0).unwrap()
    }

    fn audience_of(message: &NotificationMessage) -> Vec<UserId> {
        match &message.audience {
            Audience::All => Vec::new(),
            Audience::Users(users) => users.iter().copied().collect(),
        }
    }

    fn updated(change: RegistrationChange, user_id: UserId, organizers: Vec<UserId>) -> DomainEvent {
        DomainEvent::new(
            DomainEventKind::RegistrationUpdated {
                event_id: EventId::new(),
                event_title: "Food Drive".to_string(),
                registration_id: RegistrationId::new(),
                user_id,
                role_id: RoleId::new(),
                role_name: "Driver".to_string(),
                change,
                organizers,
            },
            Some(user_id),
            at(),
        )
    }

    #[test]
    fn event_created_goes_to_everyone() {
        let organizer = UserId::new();
        let event = DomainEvent::new(
            DomainEventKind::EventCreated {
                event_id: EventId::new(),
                event_title: "Spring Retreat".to_string(),
                starts_at: at(),
            },
            Some(organizer),
            at(),
        );

        let message = compose(&event);
        assert_eq!(message.audience, Audience::All);
        assert_eq!(message.category, Category::Announcement);
        assert_eq!(message.author, Author::User(organizer));
        assert_eq!(message.title, "New event: Spring Retreat");
        assert!(message.body.contains("Friday 14 March 2025 at 18:30 UTC"));
    }

    #[test]
    fn registration_changes_reach_organizers_and_registrant() {
        let (creator, co_organizer, volunteer) = (UserId::new(), UserId::new(), UserId::new());
        let message = compose(&updated(
            RegistrationChange::SignedUp,
            volunteer,
            vec![creator, co_organizer],
        ));

        let audience = audience_of(&message);
        assert_eq!(audience.len(), 3);
        assert!(audience.contains(&creator));
        assert!(audience.contains(&co_organizer));
        assert!(audience.contains(&volunteer));
        assert_eq!(message.category, Category::RoleChange);
    }

    #[test]
    fn organizer_acting_on_own_registration_is_listed_once() {
        let creator = UserId::new();
        let message = compose(&updated(RegistrationChange::Cancelled, creator, vec![creator]));
        assert_eq!(audience_of(&message), vec![creator]);
    }

    #[test]
    fn removal_is_worded_as_organizer_action() {
        let message = compose(&updated(RegistrationChange::Removed, UserId::new(), vec![]));
        assert!(message.body.contains("removed by an organizer"));
        assert_eq!(message.priority, Priority::High);
    }

    #[test]
    fn move_names_both_roles() {
        let volunteer = UserId::new();
        let event = DomainEvent::new(
            DomainEventKind::RegistrationMoved {
                event_id: EventId::new(),
                event_title: "Food Drive".to_string(),
                registration_id: RegistrationId::new(),
                user_id: volunteer,
                from_role_id: RoleId::new(),
                from_role_name: "Driver".to_string(),
                to_role_id: RoleId::new(),
                to_role_name: "Packer".to_string(),
                organizers: vec![UserId::new()],
            },
            Some(volunteer),
            at(),
        );

        let message = compose(&event);
        assert!(message.body.contains("from 'Driver' to 'Packer'"));
        assert_eq!(audience_of(&message).len(), 2);
    }

    #[test]
    fn security_messages_target_the_account_owner() {
        let user = UserId::new();
        for kind in [
            DomainEventKind::PasswordResetRequested { user_id: user },
            DomainEventKind::EmailVerificationRequired { user_id: user },
        ] {
            let message = compose(&DomainEvent::new(kind, Some(user), at()));
            assert_eq!(message.category, Category::Security);
            assert_eq!(audience_of(&message), vec![user]);
        }
    }

    #[test]
    fn co_organizer_assignment_is_an_admin_alert() {
        let (admin, user) = (UserId::new(), UserId::new());
        let message = compose(&DomainEvent::new(
            DomainEventKind::CoOrganizerAssigned {
                event_id: EventId::new(),
                event_title: "Gala".to_string(),
                user_id: user,
            },
            Some(admin),
            at(),
        ));
        assert_eq!(message.category, Category::AdminAlert);
        assert_eq!(audience_of(&message), vec![user]);
        assert_eq!(message.author, Author::User(admin));
    }

    #[test]
    fn reminders_come_from_the_system() {
        let participants = vec![UserId::new(), UserId::new()];
        let message = compose(&DomainEvent::new(
            DomainEventKind::EventReminderDue {
                event_id: EventId::new(),
                event_title: "Gala".to_string(),
                starts_at: at(),
                participants: participants.clone(),
            },
            None,
            at(),
        ));
        assert_eq!(message.author, Author::System);
        assert_eq!(message.category, Category::Reminder);
        assert_eq!(audience_of(&message).len(), participants.len());
    }

    #[test]
    fn deletion_notifies_former_participants() {
        let participant = UserId::new();
        let message = compose(&DomainEvent::new(
            DomainEventKind::EventDeleted {
                event_id: EventId::new(),
                event_title: "Gala".to_string(),
                participants: vec![participant],
                forced: true,
            },
            Some(UserId::new()),
            at(),
        ));
        assert_eq!(message.category, Category::Announcement);
        assert_eq!(audience_of(&message), vec![participant]);
    }

    proptest! {
        #[test]
        fn composing_is_deterministic(title in "[A-Za-z ]{1,40}", organizers in 0usize..5) {
            let organizers: Vec<UserId> = (0..organizers).map(|_| UserId::new()).collect();
            let event = DomainEvent::new(
                DomainEventKind::CoOrganizerAssigned {
                    event_id: EventId::new(),
                    event_title: title,
                    user_id: organizers.first().copied().unwrap_or_default(),
                },
                None,
                at(),
            );

            let first = compose(&event);
            prop_assert_eq!(&first, &compose(&event));
            prop_assert_eq!(first.id.as_uuid(), event.id.as_uuid());
            prop_assert_eq!(first.created_at, event.occurred_at);
        }
    }
}
