//! The event bus that turns committed domain events into notifications.

use crate::composer::compose;
use crate::dispatcher::FanOutDispatcher;
use async_trait::async_trait;
use signup_core::event::DomainEvent;
use signup_core::event_bus::{EventBus, EventBusError};
use std::sync::Arc;

/// [`EventBus`] that composes each domain event into a message and fans it
/// out.
///
/// `publish` returns once the durable channels are written, so the caller's
/// request is acknowledged only after the feed reflects it. It fails if the
/// audience could not be resolved or any durable write failed; email
/// failures never fail a publish.
#[derive(Clone)]
pub struct NotificationPipeline {
    dispatcher: Arc<FanOutDispatcher>,
}

impl NotificationPipeline {
    /// Create a pipeline on top of a dispatcher
    #[must_use]
    pub const fn new(dispatcher: Arc<FanOutDispatcher>) -> Self {
        Self { dispatcher }
    }
}

#[async_trait]
impl EventBus for NotificationPipeline {
    async fn publish(&self, event: &DomainEvent) -> Result<(), EventBusError> {
        let message = compose(event);
        tracing::debug!(
            event = event.name(),
            message_id = %message.id,
            category = %message.category,
            "Notification composed"
        );

        let outcome = self
            .dispatcher
            .dispatch(&message)
            .await
            .map_err(|error| EventBusError::PublishFailed {
                event: event.name().to_string(),
                reason: error.to_string(),
            })?;

        if outcome.is_durable() {
            Ok(())
        } else {
            Err(EventBusError::PublishFailed {
                event: event.name().to_string(),
                reason: format!(
                    "{} of {} recipients did not receive the message",
                    outcome.system_message.failed, outcome.recipients
                ),
            })
        }
    }
}
