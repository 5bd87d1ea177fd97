//! Email transports for the email channel.
//!
//! - [`ConsoleEmailTransport`]: logs emails instead of sending them (development)
//! - [`SmtpEmailTransport`]: delivers through an SMTP relay (production)
//!
//! Both implement [`signup_core::environment::EmailTransport`] and are
//! selected by the server configuration.

pub mod console;
pub mod smtp;

pub use console::ConsoleEmailTransport;
pub use smtp::{SmtpEmailTransport, SmtpSettings};
