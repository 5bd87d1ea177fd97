//! # Signup Testing
//!
//! Test doubles and fixtures for the event sign-up platform.
//!
//! This crate provides:
//! - A controllable clock ([`FixedClock`], [`test_clock`])
//! - A recording event bus ([`RecordingEventBus`])
//! - A scripted email transport that can be told to fail ([`ScriptedEmailTransport`])
//! - An in-memory user directory ([`StaticUserDirectory`])
//! - Builders for events and actors ([`EventFixture`], [`actors`])
//!
//! ## Example
//!
//! ```
//! use signup_testing::{EventFixture, actors, test_clock};
//!
//! let clock = test_clock();
//! let organizer = actors::leader();
//! let event = EventFixture::new(&clock)
//!     .created_by(organizer.id)
//!     .role("Usher", 2)
//!     .build();
//!
//! assert_eq!(event.roles.len(), 1);
//! assert_eq!(event.created_by, organizer.id);
//! ```

pub mod directory;
pub mod email;
pub mod event_bus;
pub mod fixtures;

use chrono::{DateTime, Duration, Utc};
use signup_core::environment::Clock;

/// Mock implementations of environment traits.
pub mod mocks {
    use super::{Clock, DateTime, Duration, Utc};
    use std::sync::{Arc, PoisonError, RwLock};

    /// Clock that only moves when told to
    ///
    /// Clones share the same time, so a test can keep a handle and advance
    /// the clock seen by the code under test.
    ///
    /// # Example
    ///
    /// ```
    /// use signup_testing::mocks::FixedClock;
    /// use signup_core::environment::Clock;
    /// use chrono::{Duration, Utc};
    ///
    /// let clock = FixedClock::new(Utc::now());
    /// let time1 = clock.now();
    /// assert_eq!(time1, clock.now());
    ///
    /// clock.advance(Duration::minutes(5));
    /// assert_eq!(clock.now(), time1 + Duration::minutes(5));
    /// ```
    #[derive(Debug, Clone)]
    pub struct FixedClock {
        time: Arc<RwLock<DateTime<Utc>>>,
    }

    impl FixedClock {
        /// Create a new fixed clock with the given time
        #[must_use]
        pub fn new(time: DateTime<Utc>) -> Self {
            Self {
                time: Arc::new(RwLock::new(time)),
            }
        }

        /// Move the clock forward
        pub fn advance(&self, by: Duration) {
            let mut time = self.time.write().unwrap_or_else(PoisonError::into_inner);
            *time += by;
        }

        /// Set the clock to an absolute time
        pub fn set(&self, to: DateTime<Utc>) {
            *self.time.write().unwrap_or_else(PoisonError::into_inner) = to;
        }
    }

    impl Clock for FixedClock {
        fn now(&self) -> DateTime<Utc> {
            *self.time.read().unwrap_or_else(PoisonError::into_inner)
        }
    }

    /// Create a default fixed clock for tests (2025-01-01 00:00:00 UTC)
    ///
    /// # Panics
    ///
    /// This function will panic if the hardcoded timestamp fails to parse,
    /// which should never happen in practice.
    #[must_use]
    #[allow(clippy::expect_used)]
    pub fn test_clock() -> FixedClock {
        FixedClock::new(
            DateTime::parse_from_rfc3339("2025-01-01T00:00:00Z")
                .expect("hardcoded timestamp should always parse")
                .with_timezone(&Utc),
        )
    }
}

// Re-export commonly used items
pub use directory::StaticUserDirectory;
pub use email::{ScriptedEmailTransport, SentEmail};
pub use event_bus::RecordingEventBus;
pub use fixtures::{EventFixture, actors};
pub use mocks::{FixedClock, test_clock};
