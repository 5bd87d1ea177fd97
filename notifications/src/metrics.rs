//! Delivery metrics for the notification pipeline.
//!
//! # Exported Metrics
//!
//! ## Counters
//! - `signup_notifications_total{channel,result}` - Per-recipient delivery
//!   results. `channel` is `email`, `system_message`, `bell` or `realtime`;
//!   `result` is `delivered`, `skipped`, `failed`, `queued` or `dropped`
//! - `signup_dispatches_total{result}` - Dispatched messages (`ok`, `failed`)

use metrics::{counter, describe_counter};

/// Initialize and register the notification metrics descriptions.
///
/// This should be called once at application startup, before any metrics are recorded.
pub fn register_notification_metrics() {
    describe_counter!(
        "signup_notifications_total",
        "Total per-recipient notification deliveries by channel and result"
    );
    describe_counter!(
        "signup_dispatches_total",
        "Total dispatched notification messages by result"
    );

    tracing::info!("Notification metrics registered");
}

pub(crate) fn record_delivery(channel: &'static str, result: &'static str, count: usize) {
    if count > 0 {
        counter!("signup_notifications_total", "channel" => channel, "result" => result)
            .increment(count as u64);
    }
}

pub(crate) fn record_dispatch(ok: bool) {
    counter!("signup_dispatches_total", "result" => if ok { "ok" } else { "failed" }).increment(1);
}

pub(crate) fn record_realtime_drop() {
    counter!("signup_notifications_total", "channel" => "realtime", "result" => "dropped")
        .increment(1);
}
