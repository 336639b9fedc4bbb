//! SMTP delivery for auto-reply messages.
//!
//! Blocking lettre transport. Port 465 connects with implicit TLS, any other
//! port upgrades with STARTTLS. One message per `send`; no pooling, no retry.

use std::time::Duration;

use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{SmtpTransport, Transport};

use autoreply_recon::{Message, Notifier, SendError};

/// Port that implies TLS from the first byte (SMTPS).
pub const IMPLICIT_TLS_PORT: u16 = 465;

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum MailError {
    /// Sender or recipient is not a valid mailbox
    Address(String),
    /// Message could not be assembled
    Build(String),
    /// Connect, TLS, auth or SMTP-level failure
    Transport(String),
    /// Missing username or password
    NotConfigured(String),
}

impl std::fmt::Display for MailError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MailError::Address(msg) => write!(f, "invalid address: {}", msg),
            MailError::Build(msg) => write!(f, "cannot build message: {}", msg),
            MailError::Transport(msg) => write!(f, "SMTP error: {}", msg),
            MailError::NotConfigured(msg) => write!(f, "mail not configured: {}", msg),
        }
    }
}

impl std::error::Error for MailError {}

impl From<MailError> for SendError {
    fn from(e: MailError) -> Self {
        SendError(e.to_string())
    }
}

/// Connection parameters for [`SmtpNotifier`].
#[derive(Debug, Clone)]
pub struct SmtpOptions {
    pub host: String,
    pub port: u16,
    pub username: String,
    pub password: String,
    /// Sender address; falls back to `username`
    pub from: Option<String>,
    pub timeout: Duration,
}

/// App passwords are displayed in groups ("abcd efgh ijkl mnop") and often
/// pasted with the spaces. SMTP wants them without.
pub fn normalize_password(raw: &str) -> String {
    raw.chars().filter(|c| !c.is_whitespace()).collect()
}

fn mailbox(addr: &str) -> Result<Mailbox, MailError> {
    addr.trim()
        .parse::<Mailbox>()
        .map_err(|e| MailError::Address(format!("{:?}: {}", addr, e)))
}

/// Plain-text email from a rendered [`Message`].
pub fn build_email(from: &Mailbox, message: &Message) -> Result<lettre::Message, MailError> {
    lettre::Message::builder()
        .from(from.clone())
        .to(mailbox(&message.to)?)
        .subject(message.subject.as_str())
        .header(ContentType::TEXT_PLAIN)
        .body(message.body.clone())
        .map_err(|e| MailError::Build(e.to_string()))
}

/// [`Notifier`] that delivers over authenticated SMTP.
pub struct SmtpNotifier {
    transport: SmtpTransport,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(options: &SmtpOptions) -> Result<Self, MailError> {
        if options.username.trim().is_empty() {
            return Err(MailError::NotConfigured("SMTP username is empty".into()));
        }
        let password = normalize_password(&options.password);
        if password.is_empty() {
            return Err(MailError::NotConfigured("SMTP password is empty".into()));
        }

        let from = mailbox(options.from.as_deref().unwrap_or(&options.username))?;

        let builder = if options.port == IMPLICIT_TLS_PORT {
            SmtpTransport::relay(&options.host)
        } else {
            SmtpTransport::starttls_relay(&options.host)
        }
        .map_err(|e| MailError::Transport(e.to_string()))?;

        let transport = builder
            .port(options.port)
            .credentials(Credentials::new(options.username.trim().to_string(), password))
            .timeout(Some(options.timeout))
            .build();

        log::debug!(
            "SMTP transport {}:{} ({}) as {}",
            options.host,
            options.port,
            if options.port == IMPLICIT_TLS_PORT { "tls" } else { "starttls" },
            from,
        );

        Ok(Self { transport, from })
    }

    pub fn from_address(&self) -> &Mailbox {
        &self.from
    }

    /// Open a connection and authenticate without sending anything.
    pub fn test_connection(&self) -> Result<(), MailError> {
        match self.transport.test_connection() {
            Ok(true) => Ok(()),
            Ok(false) => Err(MailError::Transport("server did not accept the connection".into())),
            Err(e) => Err(MailError::Transport(e.to_string())),
        }
    }
}

impl Notifier for SmtpNotifier {
    fn send(&self, message: &Message) -> Result<(), SendError> {
        let email = build_email(&self.from, message)?;
        self.transport
            .send(&email)
            .map_err(|e| MailError::Transport(e.to_string()))?;
        log::info!("email sent to {}", message.to);
        Ok(())
    }
}
