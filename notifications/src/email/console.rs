//! Console email transport for development.

use async_trait::async_trait;
use signup_core::environment::{EmailError, EmailTransport};

/// Email transport that writes every email to the log.
///
/// Useful in development: notifications can be followed without an SMTP
/// relay. Never fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct ConsoleEmailTransport;

impl ConsoleEmailTransport {
    /// Create a new console transport.
    #[must_use]
    pub const fn new() -> Self {
        Self
    }
}

#[async_trait]
impl EmailTransport for ConsoleEmailTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        tracing::info!(
            to = %to,
            subject = %subject,
            body_len = body.len(),
            "📧 Email (console transport)"
        );
        tracing::debug!(to = %to, body = %body, "Email body");
        Ok(())
    }
}
