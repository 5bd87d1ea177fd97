//! SMTP email transport using Lettre.

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use signup_core::environment::{EmailError, EmailTransport};

/// Connection settings for [`SmtpEmailTransport`].
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct SmtpSettings {
    /// SMTP relay host (e.g. "smtp.example.com")
    pub host: String,
    /// SMTP port (usually 587 for STARTTLS, 465 for TLS)
    pub port: u16,
    /// Authentication username; no authentication when `None`
    pub username: Option<String>,
    /// Authentication password
    pub password: Option<String>,
    /// Sender address
    pub from_email: String,
    /// Sender display name
    pub from_name: String,
}

/// Email transport that delivers plain-text mail through an SMTP relay.
///
/// # Examples
///
/// ```ignore
/// use signup_notifications::email::{SmtpEmailTransport, SmtpSettings};
///
/// let transport = SmtpEmailTransport::new(&SmtpSettings {
///     host: "smtp.example.com".to_string(),
///     port: 587,
///     username: Some("mailer".to_string()),
///     password: Some("secret".to_string()),
///     from_email: "noreply@example.com".to_string(),
///     from_name: "Sign-up Platform".to_string(),
/// })?;
/// ```
#[derive(Clone)]
pub struct SmtpEmailTransport {
    mailer: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpEmailTransport {
    /// Create a transport for the given relay.
    ///
    /// # Errors
    ///
    /// [`EmailError::InvalidAddress`] if the sender address does not parse,
    /// [`EmailError::Transport`] if the relay cannot be configured.
    pub fn new(settings: &SmtpSettings) -> Result<Self, EmailError> {
        let from: Mailbox = format!("{} <{}>", settings.from_name, settings.from_email)
            .parse()
            .map_err(|e| EmailError::InvalidAddress(format!("from address: {e}")))?;

        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&settings.host)
            .map_err(|e| EmailError::Transport(format!("SMTP relay error: {e}")))?
            .port(settings.port);
        if let (Some(username), Some(password)) = (&settings.username, &settings.password) {
            builder = builder.credentials(Credentials::new(username.clone(), password.clone()));
        }

        Ok(Self {
            mailer: builder.build(),
            from,
        })
    }
}

/// Build a plain-text message.
fn build_message(from: Mailbox, to: &str, subject: &str, body: &str) -> Result<Message, EmailError> {
    let to: Mailbox = to
        .parse()
        .map_err(|e| EmailError::InvalidAddress(format!("{to}: {e}")))?;

    Message::builder()
        .from(from)
        .to(to)
        .subject(subject)
        .header(ContentType::TEXT_PLAIN)
        .body(body.to_string())
        .map_err(|e| EmailError::Build(e.to_string()))
}

#[async_trait]
impl EmailTransport for SmtpEmailTransport {
    async fn send(&self, to: &str, subject: &str, body: &str) -> Result<(), EmailError> {
        let message = build_message(self.from.clone(), to, subject, body)?;
        self.mailer
            .send(message)
            .await
            .map_err(|e| EmailError::Transport(format!("Failed to send email: {e}")))?;
        tracing::debug!(to = %to, "Email handed to SMTP relay");
        Ok(())
    }
}
