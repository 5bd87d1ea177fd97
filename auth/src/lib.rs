//! # Signup Authorization
//!
//! Computes what an actor may do to an event. Every mutating entry point of
//! the registration engine asks the same [`AuthorizationResolver`] for a
//! [`CapabilitySet`] and checks it; no caller re-implements the rules.
//!
//! ## Rules
//!
//! | Actor                          | Edit | Delete | Manage participants | Force-delete |
//! |--------------------------------|------|--------|---------------------|--------------|
//! | Administrator / super-admin    | yes  | yes    | yes                 | yes          |
//! | Event creator                  | yes  | yes    | yes                 | if tier may delete own events |
//! | Listed co-organizer            | yes  | yes    | yes                 | no (unless admin) |
//! | Anyone else                    | no   | no     | no                  | no           |
//!
//! Co-organizer rights are matched by stable user id and are scoped to the
//! event that lists them.
//!
//! ## Example
//!
//! ```
//! use signup_auth::{AuthorizationResolver, Capability};
//! use signup_core::types::{Actor, Event, RoleTier, UserId};
//! use chrono::Utc;
//!
//! let creator = Actor::new(UserId::new(), RoleTier::Leader);
//! let event = Event::new("Clean-up".to_string(), creator.id, Utc::now(), vec![], Utc::now());
//!
//! let caps = AuthorizationResolver.resolve(&creator, &event);
//! assert!(caps.allows(Capability::ForceDeleteEvent));
//! ```

pub mod error;
pub mod permissions;
pub mod resolver;

pub use error::{AuthError, Result};
pub use permissions::TierPermissions;
pub use resolver::{AuthorizationResolver, Capability, CapabilitySet, Relationship};
