//! Fan-out dispatcher: one composed message, three delivery channels.
//!
//! For every recipient of a message:
//!
//! 1. **System message + bell** (durable): one unread entry and one unread
//!    bell pointer are created together, keyed on `(message id, user id)`, so
//!    dispatching the same message again never duplicates them.
//! 2. **Real-time push**: each newly created bell is pushed to the user's
//!    open connections.
//! 3. **Email** (best effort): recipients who got a new entry (or whose
//!    entry could not be written) are emailed, with retry. Email failures
//!    are counted and logged, never propagated.
//!
//! The durable channels complete before [`FanOutDispatcher::dispatch`]
//! returns. Email runs inline or on a detached task, per
//! [`DispatcherConfig::email_delivery`].

use crate::error::DispatchError;
use crate::feed::BellView;
use crate::metrics;
use crate::realtime::{RealtimeEvent, RealtimeHub};
use crate::retry::{RetryPolicy, retry_with_backoff};
use crate::store::FeedStore;
use serde::Serialize;
use signup_core::environment::{EmailTransport, Recipient, UserDirectory};
use signup_core::notification::{Audience, NotificationMessage};
use signup_core::types::{MessageId, UserId};
use std::collections::HashSet;
use std::sync::Arc;

/// How the email channel runs relative to the dispatch call.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum EmailDelivery {
    /// Emails are sent by a spawned task; the outcome reports them as queued
    #[default]
    Detached,
    /// Emails are sent before `dispatch` returns
    ///
    /// The coordinator publishes while it holds the event's lock, so with
    /// this mode every mutation of an event waits for its emails, retries
    /// included, and a slow relay stalls all other operations on that event.
    /// Meant for tests and single-user tooling; servers use `Detached`.
    Inline,
}

/// Dispatcher configuration.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct DispatcherConfig {
    /// Inline or detached email
    pub email_delivery: EmailDelivery,
    /// Retry policy for each email
    pub retry: RetryPolicy,
}

/// Per-channel delivery counts.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize)]
pub struct ChannelOutcome {
    /// Recipients reached
    pub delivered: usize,
    /// Recipients that already had this message
    pub skipped: usize,
    /// Recipients the channel failed for
    pub failed: usize,
    /// Recipients handed to a detached task
    pub queued: usize,
}

impl ChannelOutcome {
    fn record(&self, channel: &'static str) {
        metrics::record_delivery(channel, "delivered", self.delivered);
        metrics::record_delivery(channel, "skipped", self.skipped);
        metrics::record_delivery(channel, "failed", self.failed);
        metrics::record_delivery(channel, "queued", self.queued);
    }
}

/// Result of dispatching one message.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
pub struct DispatchOutcome {
    /// The dispatched message
    pub message_id: MessageId,
    /// Resolved recipients
    pub recipients: usize,
    /// Email channel
    pub email: ChannelOutcome,
    /// System message channel
    pub system_message: ChannelOutcome,
    /// Bell channel
    pub bell: ChannelOutcome,
    /// Real-time pushes accepted by open connections
    pub pushed: usize,
}

impl DispatchOutcome {
    fn new(message_id: MessageId, recipients: usize) -> Self {
        Self {
            message_id,
            recipients,
            email: ChannelOutcome::default(),
            system_message: ChannelOutcome::default(),
            bell: ChannelOutcome::default(),
            pushed: 0,
        }
    }

    /// Whether every durable write succeeded. Email does not count.
    #[must_use]
    pub const fn is_durable(&self) -> bool {
        self.system_message.failed == 0 && self.bell.failed == 0
    }
}

/// Delivers composed messages to their audience.
pub struct FanOutDispatcher {
    feed: Arc<dyn FeedStore>,
    hub: Arc<RealtimeHub>,
    email: Arc<dyn EmailTransport>,
    directory: Arc<dyn UserDirectory>,
    config: DispatcherConfig,
}

impl FanOutDispatcher {
    /// Create a dispatcher
    #[must_use]
    pub fn new(
        feed: Arc<dyn FeedStore>,
        hub: Arc<RealtimeHub>,
        email: Arc<dyn EmailTransport>,
        directory: Arc<dyn UserDirectory>,
        config: DispatcherConfig,
    ) -> Self {
        Self {
            feed,
            hub,
            email,
            directory,
            config,
        }
    }

    /// Deliver `message` to its audience through every channel.
    ///
    /// Per-recipient failures are counted in the outcome and do not stop the
    /// dispatch.
    ///
    /// # Errors
    ///
    /// [`DispatchError::Audience`] if recipients cannot be resolved,
    /// [`DispatchError::Store`] if the message itself cannot be stored. No
    /// channel is attempted in either case.
    #[tracing::instrument(
        skip(self, message),
        fields(message_id = %message.id, category = %message.category)
    )]
    pub async fn dispatch(&self, message: &NotificationMessage) -> Result<DispatchOutcome, DispatchError> {
        let result = self.fan_out(message).await;
        metrics::record_dispatch(result.as_ref().is_ok_and(DispatchOutcome::is_durable));
        result
    }

    async fn fan_out(&self, message: &NotificationMessage) -> Result<DispatchOutcome, DispatchError> {
        let recipients = self.resolve_audience(&message.audience).await?;
        self.feed.insert_message(message).await?;

        let mut outcome = DispatchOutcome::new(message.id, recipients.len());
        let mut email_targets = Vec::new();

        for recipient in recipients {
            match self
                .feed
                .deliver(message.id, recipient.user_id, message.created_at)
                .await
            {
                Ok(Some(delivery)) => {
                    outcome.system_message.delivered += 1;
                    outcome.bell.delivered += 1;
                    outcome.pushed += self.hub.push(
                        recipient.user_id,
                        RealtimeEvent::NotificationAdded {
                            bell: BellView::new(&delivery.bell, message),
                        },
                    );
                    email_targets.push(recipient);
                }
                Ok(None) => {
                    outcome.system_message.skipped += 1;
                    outcome.bell.skipped += 1;
                    outcome.email.skipped += 1;
                }
                Err(error) => {
                    tracing::error!(
                        user_id = %recipient.user_id,
                        %error,
                        "Failed to store system message and bell"
                    );
                    outcome.system_message.failed += 1;
                    outcome.bell.failed += 1;
                    email_targets.push(recipient);
                }
            }
        }

        let email = self.send_emails(message, email_targets).await;
        outcome.email.delivered = email.delivered;
        outcome.email.failed = email.failed;
        outcome.email.queued = email.queued;

        outcome.system_message.record("system_message");
        outcome.bell.record("bell");
        outcome.email.record("email");

        tracing::info!(
            recipients = outcome.recipients,
            delivered = outcome.system_message.delivered,
            skipped = outcome.system_message.skipped,
            failed = outcome.system_message.failed,
            emails_delivered = outcome.email.delivered,
            emails_failed = outcome.email.failed,
            emails_queued = outcome.email.queued,
            pushed = outcome.pushed,
            "Notification dispatched"
        );
        Ok(outcome)
    }

    async fn resolve_audience(&self, audience: &Audience) -> Result<Vec<Recipient>, DispatchError> {
        let found = match audience {
            Audience::All => self.directory.active_users().await?,
            Audience::Users(ids) if ids.is_empty() => Vec::new(),
            Audience::Users(ids) => {
                let ids: Vec<UserId> = ids.iter().copied().collect();
                let found = self.directory.find_users(&ids).await?;
                if found.len() < ids.len() {
                    tracing::debug!(
                        requested = ids.len(),
                        found = found.len(),
                        "Inactive or unknown users left out of the audience"
                    );
                }
                found
            }
        };

        let mut seen = HashSet::new();
        Ok(found
            .into_iter()
            .filter(|recipient| seen.insert(recipient.user_id))
            .collect())
    }

    async fn send_emails(&self, message: &NotificationMessage, targets: Vec<Recipient>) -> ChannelOutcome {
        if targets.is_empty() {
            return ChannelOutcome::default();
        }
        let transport = Arc::clone(&self.email);
        let policy = self.config.retry;
        let subject = message.title.clone();
        let body = message.body.clone();

        match self.config.email_delivery {
            EmailDelivery::Inline => send_all(transport, policy, subject, body, targets).await,
            EmailDelivery::Detached => {
                let queued = targets.len();
                tokio::spawn(async move {
                    let outcome = send_all(transport, policy, subject, body, targets).await;
                    metrics::record_delivery("email", "delivered", outcome.delivered);
                    metrics::record_delivery("email", "failed", outcome.failed);
                });
                ChannelOutcome {
                    queued,
                    ..ChannelOutcome::default()
                }
            }
        }
    }
}

/// Send one email per target, each with retry.
async fn send_all(
    transport: Arc<dyn EmailTransport>,
    policy: RetryPolicy,
    subject: String,
    body: String,
    targets: Vec<Recipient>,
) -> ChannelOutcome {
    let mut outcome = ChannelOutcome::default();
    for recipient in targets {
        let text = format!("Hi {},\n\n{body}\n", recipient.display_name);
        let sent = retry_with_backoff(&policy, || {
            transport.send(&recipient.email, &subject, &text)
        })
        .await;

        match sent {
            Ok(()) => outcome.delivered += 1,
            Err(error) => {
                tracing::warn!(user_id = %recipient.user_id, %error, "Email delivery failed");
                outcome.failed += 1;
            }
        }
    }
    outcome
}
