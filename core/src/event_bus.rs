//! Event bus abstraction between the registration engine and its consumers.
//!
//! The registration coordinator publishes every committed [`DomainEvent`]
//! through an [`EventBus`]. The production implementation is the
//! notification pipeline (compose, then fan out); tests use a recording bus.
//!
//! # Key Principles
//!
//! - **Commit first**: events are published only after the mutation is stored
//! - **Ordered per event**: the coordinator publishes while it still holds the
//!   event's exclusive section, so consumers see one event's changes in order
//! - **Failures are reported, not rolled back**: a publish error never undoes
//!   the committed registration change

use crate::event::DomainEvent;
use async_trait::async_trait;
use thiserror::Error;

/// Errors that can occur while publishing a domain event.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum EventBusError {
    /// A consumer failed to accept the event
    #[error("Publish failed for '{event}': {reason}")]
    PublishFailed {
        /// Name of the event that failed
        event: String,
        /// The reason for failure
        reason: String,
    },
}

/// Destination for committed domain events.
#[async_trait]
pub trait EventBus: Send + Sync {
    /// Publish one event, returning once durable consumers have processed it.
    ///
    /// # Errors
    ///
    /// Returns [`EventBusError`] if a durable consumer failed.
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventBusError>;
}
