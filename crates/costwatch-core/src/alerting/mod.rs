//! Alerting for Costwatch
//!
//! Threshold breach emails over a single SMTP path.

mod dispatcher;
mod smtp;

pub use dispatcher::{AlertDispatcher, AlertOutcome};
pub use smtp::SmtpMailer;

use async_trait::async_trait;

/// A single outgoing alert email
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutgoingMail {
    /// Sender address
    pub from: String,
    /// Receiver address
    pub to: String,
    /// Subject line
    pub subject: String,
    /// Plain-text body
    pub body: String,
}

/// Delivers one message per call
#[async_trait]
pub trait MailTransport: Send + Sync {
    /// Send `mail`, opening and releasing whatever connection it needs
    async fn send(&self, mail: &OutgoingMail) -> Result<(), NotificationError>;
}

/// Notification errors
#[derive(Debug, thiserror::Error)]
pub enum NotificationError {
    /// Sender or receiver is not a valid mailbox
    #[error("Invalid address: {0}")]
    Address(String),

    /// Message could not be assembled
    #[error("Message error: {0}")]
    Message(String),

    /// Connecting, authenticating or delivering failed
    #[error("SMTP error: {0}")]
    Transport(String),
}
