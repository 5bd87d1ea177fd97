//! Event bus that records everything published to it.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use async_trait::async_trait;
use signup_core::event::DomainEvent;
use signup_core::event_bus::{EventBus, EventBusError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};

/// In-memory [`EventBus`] that keeps published events in order.
///
/// Can be switched into a failing mode to check that publish errors never
/// roll back committed changes.
#[derive(Clone, Debug, Default)]
pub struct RecordingEventBus {
    events: Arc<Mutex<Vec<DomainEvent>>>,
    failing: Arc<AtomicBool>,
}

impl RecordingEventBus {
    /// Create an empty bus
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Every event published so far, in publish order
    #[must_use]
    pub fn events(&self) -> Vec<DomainEvent> {
        self.events.lock().unwrap().clone()
    }

    /// Names of the published events, in publish order
    #[must_use]
    pub fn names(&self) -> Vec<&'static str> {
        self.events.lock().unwrap().iter().map(DomainEvent::name).collect()
    }

    /// Forget recorded events
    pub fn clear(&self) {
        self.events.lock().unwrap().clear();
    }

    /// Make subsequent publishes fail (events are still recorded)
    pub fn fail_publishes(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }
}

#[async_trait]
impl EventBus for RecordingEventBus {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventBusError> {
        self.events.lock().unwrap().push(event.clone());
        if self.failing.load(Ordering::SeqCst) {
            return Err(EventBusError::PublishFailed {
                event: event.name().to_string(),
                reason: "scripted failure".to_string(),
            });
        }
        Ok(())
    }
}
