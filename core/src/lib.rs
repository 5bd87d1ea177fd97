//! # Signup Core
//!
//! Domain model and collaborator traits shared by every crate of the event
//! sign-up platform.
//!
//! ## Core Concepts
//!
//! - **Event**: something users sign up for, with an ordered set of roles
//! - **Role**: a named slot with a fixed capacity
//! - **Registration**: one user holding one role on one event
//! - **Domain event**: a fact emitted after the registration engine commits
//! - **Notification message**: the canonical payload fanned out to users
//!
//! ## Collaborators
//!
//! External systems are reached only through traits defined here, injected
//! as `Arc<dyn Trait>`:
//!
//! - [`environment::Clock`] - time source
//! - [`environment::EmailTransport`] - fire-and-forget outbound email
//! - [`environment::UserDirectory`] - recipient lookup
//! - [`event_bus::EventBus`] - where committed domain events are published
//!
//! ## Example
//!
//! ```
//! use signup_core::types::{Capacity, Event, EventStatus, Role, UserId};
//! use chrono::Utc;
//!
//! let organizer = UserId::new();
//! let event = Event::new(
//!     "Spring Retreat".to_string(),
//!     organizer,
//!     Utc::now() + chrono::Duration::days(7),
//!     vec![Role::new("Greeter".to_string(), Capacity::new(2).unwrap())],
//!     Utc::now(),
//! );
//! assert_eq!(event.status, EventStatus::Open);
//! assert!(event.organizers().contains(&organizer));
//! ```

pub mod environment;
pub mod event;
pub mod event_bus;
pub mod notification;
pub mod types;

// Re-export commonly used types
pub use chrono::{DateTime, Utc};
pub use event::{DomainEvent, DomainEventKind, RegistrationChange};
pub use types::{
    Actor, Capacity, EventId, MAX_ROLES_PER_USER, Registration, RegistrationId, RoleId, RoleTier,
    UserId,
};
