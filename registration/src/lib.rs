//! # Signup Registration
//!
//! The registration engine: lets users claim limited-capacity roles on events
//! and guarantees, under any amount of concurrency, that
//!
//! - no role ever holds more registrations than its capacity
//! - no user holds more than [`MAX_ROLES_PER_USER`] roles on one event
//! - no user holds the same role twice
//! - a move between roles is atomic
//! - deleting an event never leaves registrations behind
//!
//! ## Architecture
//!
//! ```text
//! caller ──▶ RegistrationCoordinator ──▶ AuthorizationResolver (gate)
//!                    │
//!                    ├─▶ EventLocks (one exclusive section per event)
//!                    ├─▶ CapacityLedger (rebuilt from live registrations)
//!                    ├─▶ RegistrationStore (in-memory or PostgreSQL)
//!                    └─▶ EventBus (domain events, after commit)
//! ```
//!
//! ## Example
//!
//! ```
//! use signup_registration::{InMemoryRegistrationStore, RegistrationCoordinator};
//! use signup_testing::{EventFixture, RecordingEventBus, actors, test_clock};
//! use std::sync::Arc;
//!
//! # #[tokio::main]
//! # async fn main() -> Result<(), Box<dyn std::error::Error>> {
//! let clock = test_clock();
//! let bus = RecordingEventBus::new();
//! let coordinator = RegistrationCoordinator::new(
//!     Arc::new(InMemoryRegistrationStore::new()),
//!     Arc::new(bus.clone()),
//!     Arc::new(clock.clone()),
//! );
//!
//! let organizer = actors::leader();
//! let event = coordinator
//!     .create_event(&organizer, EventFixture::new(&clock).role("Greeter", 1).draft())
//!     .await?;
//!
//! let volunteer = actors::participant();
//! coordinator.sign_up(&volunteer, event.id, event.roles[0].id).await?;
//!
//! assert_eq!(bus.names(), vec!["EventCreated", "RegistrationUpdated"]);
//! # Ok(())
//! # }
//! ```

pub mod coordinator;
pub mod error;
pub mod ledger;
pub mod lifecycle;
pub mod locks;
pub mod memory;
pub mod metrics;
pub mod reminder;
pub mod store;

pub use coordinator::RegistrationCoordinator;
pub use error::{RegistrationError, Result, StoreError};
pub use ledger::{CapacityLedger, RoleOccupancy};
pub use locks::EventLocks;
pub use memory::InMemoryRegistrationStore;
pub use reminder::{ReminderScheduler, ReminderSettings};
pub use signup_core::types::MAX_ROLES_PER_USER;
pub use store::{RegistrationStore, StoreResult};
