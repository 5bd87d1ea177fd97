//! Per-event exclusive sections.
//!
//! Every mutation of an event's registrations runs while holding that event's
//! guard. Guards are owned, so they are released on every exit path when
//! dropped, including early returns on validation failure. Different events
//! have different mutexes and never contend.

use signup_core::types::EventId;
use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

/// Guard proving exclusive access to one event.
pub type EventGuard = OwnedMutexGuard<()>;

/// Table of per-event async mutexes, created on first use.
#[derive(Debug, Default)]
pub struct EventLocks {
    table: Mutex<HashMap<EventId, Arc<AsyncMutex<()>>>>,
}

impl EventLocks {
    /// Create an empty table
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `event_id`.
    pub async fn acquire(&self, event_id: EventId) -> EventGuard {
        let lock = {
            let mut table = self.table.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(table.entry(event_id).or_default())
        };
        lock.lock_owned().await
    }

    /// Drop the mutex of a deleted event.
    ///
    /// Tasks already waiting keep their own handle and will find the event
    /// gone once they get in.
    pub fn forget(&self, event_id: EventId) {
        self.table
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(&event_id);
    }

    /// Number of events with a mutex in the table
    #[must_use]
    pub fn len(&self) -> usize {
        self.table.lock().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Whether the table is empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)] // Test code can use unwrap/expect
mod tests {
    use super::*;
    use std::time::Duration;

    #[tokio::test]
    async fn same_event_is_exclusive() {
        let locks = Arc::new(EventLocks::new());
        let event_id = EventId::new();
        let guard = locks.acquire(event_id).await;

        let contender = {
            let locks = Arc::clone(&locks);
            tokio::spawn(async move {
                let _guard = locks.acquire(event_id).await;
            })
        };
        tokio::time::sleep(Duration::from_millis(20)).await;
        assert!(!contender.is_finished());

        drop(guard);
        contender.await.unwrap();
    }

    #[tokio::test]
    async fn different_events_do_not_contend() {
        let locks = EventLocks::new();
        let _first = locks.acquire(EventId::new()).await;
        let second = tokio::time::timeout(Duration::from_millis(100), locks.acquire(EventId::new())).await;
        assert!(second.is_ok());
        assert_eq!(locks.len(), 2);
    }
}
