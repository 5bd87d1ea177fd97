//! Business metrics for the registration engine.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `signup_registrations_total{outcome}` - Committed registration changes
//!   (`signed_up`, `cancelled`, `removed`, `moved`)
//! - `signup_rejections_total{reason}` - Refused operations by reason
//! - `signup_events_deleted_total{forced}` - Deleted events
//! - `signup_reminders_total` - Reminders emitted

use crate::error::RegistrationError;
use metrics::{counter, describe_counter};
use signup_core::event::RegistrationChange;

/// Initialize and register the registration metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_registration_metrics() {
    describe_counter!(
        "signup_registrations_total",
        "Total committed registration changes by outcome (signed_up, cancelled, removed, moved)"
    );
    describe_counter!(
        "signup_rejections_total",
        "Total refused registration operations by reason"
    );
    describe_counter!(
        "signup_events_deleted_total",
        "Total deleted events, labelled by whether registrations were cascaded"
    );
    describe_counter!(
        "signup_reminders_total",
        "Total event reminders emitted"
    );

    tracing::info!("Registration metrics registered");
}

pub(crate) fn record_change(change: RegistrationChange) {
    let outcome = match change {
        RegistrationChange::SignedUp => "signed_up",
        RegistrationChange::Cancelled => "cancelled",
        RegistrationChange::Removed => "removed",
        RegistrationChange::Moved => "moved",
    };
    counter!("signup_registrations_total", "outcome" => outcome).increment(1);
}

pub(crate) fn record_rejection(error: &RegistrationError) {
    counter!("signup_rejections_total", "reason" => error.reason()).increment(1);
}

pub(crate) fn record_event_deleted(forced: bool) {
    counter!(
        "signup_events_deleted_total",
        "forced" => if forced { "true" } else { "false" }
    )
    .increment(1);
}

pub(crate) fn record_reminder() {
    counter!("signup_reminders_total").increment(1);
}
