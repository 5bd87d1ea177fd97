//! Email transport double.

#![allow(clippy::unwrap_used)] // Test infrastructure uses unwrap for simplicity
#![allow(clippy::missing_panics_doc)] // Panics only on a poisoned lock

use async_trait::async_trait;
use signup_core::environment::{EmailError, EmailTransport};
use std::collections::HashSet;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

/// An email accepted by [`ScriptedEmailTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SentEmail {
    /// Recipient address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Records sent emails and fails on command.
///
/// Failures can be scripted for every send, for particular addresses, or for
/// the next `n` attempts (to exercise retries).
#[derive(Clone, Debug, Default)]
pub struct ScriptedEmailTransport {
    sent: Arc<Mutex<Vec<SentEmail>>>,
    failing_addresses: Arc<Mutex<HashSet<String>>>,
    fail_all: Arc<AtomicBool>,
    fail_next: Arc<AtomicUsize>,
    attempts: Arc<AtomicUsize>,
}

impl ScriptedEmailTransport {
    /// Transport that accepts everything
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Transport that rejects every send
    #[must_use]
    pub fn failing() -> Self {
        let transport = Self::default();
        transport.fail_all.store(true, Ordering::SeqCst);
        transport
    }

    /// Reject every send to `address`
    pub fn fail_for(&self, address: impl Into<String>) {
        self.failing_addresses.lock().unwrap().insert(address.into());
    }

    /// Reject the next `n` sends, whatever the address
    pub fn fail_next(&self, n: usize) {
        self.fail_next.store(n, Ordering::SeqCst);
    }

    /// Successfully sent emails, in send order
    #[must_use]
    pub fn sent(&self) -> Vec<SentEmail> {
        self.sent.lock().unwrap().clone()
    }

    /// Number of send attempts, failed ones included
    #[must_use]
    pub fn attempts(&self) -> usize {
        self.attempts.load(Ordering::SeqCst)
    }

    fn should_fail(&self, to: &str) -> bool {
        if self.fail_all.load(Ordering::SeqCst) {
            return true;
        }
        if self.failing_addresses.lock().unwrap().contains(to) {
            return true;
        }
        self.fail_next
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok()
    }
}

#[async_trait]
impl EmailTransport for ScriptedEmailTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        self.attempts.fetch_add(1, Ordering::SeqCst);
        if self.should_fail(to) {
            return Err(EmailError::Transport(format!("scripted failure for {to}")));
        }
        self.sent.lock().unwrap().push(SentEmail {
            to: to.to_string(),
            subject: subject.to_string(),
            body: body.to_string(),
        });
        Ok(())
    }
}
