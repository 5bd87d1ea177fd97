//! Participant reminders for upcoming events.
//!
//! A reminder is emitted at most once per event: the `reminder_sent` flag is
//! set in the same exclusive section that emits it.

use crate::coordinator::RegistrationCoordinator;
use crate::error::Result;
use crate::metrics;
use signup_core::event::DomainEventKind;
use signup_core::types::{EventStatus, UserId};
use std::future::Future;
use std::sync::Arc;

/// Reminder scheduling settings.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct ReminderSettings {
    /// How long before an event starts its reminder goes out
    pub lead_time: chrono::Duration,
    /// How often due events are looked up
    pub poll_interval: std::time::Duration,
}

impl Default for ReminderSettings {
    fn default() -> Self {
        Self {
            lead_time: chrono::Duration::hours(24),
            poll_interval: std::time::Duration::from_secs(60),
        }
    }
}

impl RegistrationCoordinator {
    /// Emit `EventReminderDue` for every open event starting within
    /// `lead_time` whose reminder has not gone out yet.
    ///
    /// Returns how many reminders were emitted.
    ///
    /// # Errors
    ///
    /// [`crate::RegistrationError::Store`] if due events cannot be listed or
    /// a flag cannot be written.
    #[tracing::instrument(skip(self))]
    pub async fn send_due_reminders(&self, lead_time: chrono::Duration) -> Result<usize> {
        let now = self.clock.now();
        let candidates = self
            .store
            .events_due_for_reminder(now, now + lead_time)
            .await?;

        let mut sent = 0;
        for candidate in candidates {
            let _guard = self.locks.acquire(candidate.id).await;
            // Re-read under the lock: it may have been deleted, closed or reminded meanwhile.
            let Some(mut event) = self.store.get_event(candidate.id).await? else {
                continue;
            };
            if event.reminder_sent || event.status != EventStatus::Open {
                continue;
            }

            let mut participants: Vec<UserId> = Vec::new();
            for registration in self.store.registrations_for_event(event.id).await? {
                if !participants.contains(&registration.user_id) {
                    participants.push(registration.user_id);
                }
            }

            event.reminder_sent = true;
            self.store.update_event(&event).await?;
            metrics::record_reminder();
            tracing::info!(
                event_id = %event.id,
                participants = participants.len(),
                "Event reminder due"
            );

            self.publish(
                DomainEventKind::EventReminderDue {
                    event_id: event.id,
                    event_title: event.title.clone(),
                    starts_at: event.starts_at,
                    participants,
                },
                None,
            )
            .await;
            sent += 1;
        }
        Ok(sent)
    }
}

/// Background loop that periodically emits due reminders.
pub struct ReminderScheduler {
    coordinator: Arc<RegistrationCoordinator>,
    settings: ReminderSettings,
}

impl ReminderScheduler {
    /// Create a scheduler
    #[must_use]
    pub const fn new(coordinator: Arc<RegistrationCoordinator>, settings: ReminderSettings) -> Self {
        Self {
            coordinator,
            settings,
        }
    }

    /// Poll until `shutdown` completes. Errors are logged and retried on the
    /// next tick.
    pub async fn run(self, shutdown: impl Future<Output = ()>) {
        let mut interval = tokio::time::interval(self.settings.poll_interval);
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        tokio::pin!(shutdown);

        tracing::info!(
            lead_time_minutes = self.settings.lead_time.num_minutes(),
            poll_interval_secs = self.settings.poll_interval.as_secs(),
            "Reminder scheduler started"
        );

        loop {
            tokio::select! {
                () = &mut shutdown => {
                    tracing::info!("Reminder scheduler stopped");
                    return;
                }
                _ = interval.tick() => {
                    match self.coordinator.send_due_reminders(self.settings.lead_time).await {
                        Ok(0) => {}
                        Ok(sent) => tracing::debug!(sent, "Reminders emitted"),
                        Err(error) => tracing::error!(%error, "Reminder pass failed"),
                    }
                }
            }
        }
    }
}
