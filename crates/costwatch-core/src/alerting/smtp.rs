//! SMTP delivery over implicit TLS

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use tracing::debug;

use super::{MailTransport, NotificationError, OutgoingMail};
use crate::config::{EmailConfig, SmtpConfig};

/// Sends mail through an authenticated SMTPS relay.
///
/// A fresh connection is opened for every message and closed when the send
/// completes, whether or not it succeeded.
pub struct SmtpMailer {
    host: String,
    port: u16,
    credentials: Option<Credentials>,
}

impl SmtpMailer {
    /// Create a mailer for `relay`, logging in as the configured sender
    pub fn new(relay: &SmtpConfig, email: &EmailConfig) -> Self {
        let credentials = match (&email.sender, &email.password) {
            (Some(user), Some(password)) => Some(Credentials::new(user.clone(), password.clone())),
            _ => None,
        };

        Self {
            host: relay.host.clone(),
            port: relay.port,
            credentials,
        }
    }

    fn build_message(mail: &OutgoingMail) -> Result<Message, NotificationError> {
        let from = mail
            .from
            .parse()
            .map_err(|e| NotificationError::Address(format!("{}: {e}", mail.from)))?;
        let to = mail
            .to
            .parse()
            .map_err(|e| NotificationError::Address(format!("{}: {e}", mail.to)))?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body.clone())
            .map_err(|e| NotificationError::Message(e.to_string()))
    }

    fn transport(&self) -> Result<AsyncSmtpTransport<Tokio1Executor>, NotificationError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.host)
            .map_err(|e| NotificationError::Transport(e.to_string()))?
            .port(self.port);

        if let Some(credentials) = &self.credentials {
            builder = builder.credentials(credentials.clone());
        }

        Ok(builder.build())
    }
}

#[async_trait]
impl MailTransport for SmtpMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), NotificationError> {
        let message = Self::build_message(mail)?;
        let transport = self.transport()?;

        debug!(host = %self.host, port = self.port, "Connecting to SMTP relay");

        transport
            .send(message)
            .await
            .map_err(|e| NotificationError::Transport(e.to_string()))?;

        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;
    use tokio::io::AsyncReadExt;
    use tokio::net::TcpListener;
    use tokio::time::timeout;

    fn mail(from: &str, to: &str) -> OutgoingMail {
        OutgoingMail {
            from: from.to_string(),
            to: to.to_string(),
            subject: "🚨 Cost Anomaly Alert! Azure Cost: $12.34".to_string(),
            body: "Current Total Cost: $12.34".to_string(),
        }
    }

    #[test]
    fn test_build_message_with_valid_addresses() {
        let message = SmtpMailer::build_message(&mail("alerts@example.com", "ops@example.com"));
        assert!(message.is_ok());
    }

    #[test]
    fn test_build_message_rejects_bad_address() {
        let message = SmtpMailer::build_message(&mail("not an address", "ops@example.com"));
        assert!(matches!(message, Err(NotificationError::Address(_))));
    }

    fn sender() -> EmailConfig {
        EmailConfig {
            sender: Some("alerts@example.com".to_string()),
            password: Some("app-password".to_string()),
            receiver: Some("ops@example.com".to_string()),
        }
    }

    #[tokio::test]
    async fn test_send_fails_cleanly_when_relay_is_unreachable() {
        let relay = SmtpConfig {
            host: "127.0.0.1".to_string(),
            port: 1,
        };
        let mailer = SmtpMailer::new(&relay, &sender());

        let result = mailer.send(&mail("alerts@example.com", "ops@example.com")).await;

        assert!(matches!(result, Err(NotificationError::Transport(_))));
    }

    #[tokio::test]
    async fn test_send_starts_with_tls_handshake() {
        let listener = TcpListener::bind("127.0.0.1:0").await.unwrap();
        let port = listener.local_addr().unwrap().port();

        let relay = tokio::spawn(async move {
            let (mut socket, _) = listener.accept().await.unwrap();
            // No greeting is written; only an implicit-TLS client speaks first
            let mut first = [0u8; 1];
            let read = socket.read(&mut first).await.unwrap();
            (read, first[0])
        });

        let relay_config = SmtpConfig {
            host: "127.0.0.1".to_string(),
            port,
        };
        let mailer = SmtpMailer::new(&relay_config, &sender());
        let result = timeout(
            Duration::from_secs(10),
            mailer.send(&mail("alerts@example.com", "ops@example.com")),
        )
        .await;

        let (read, first_byte) = relay.await.unwrap();
        assert_eq!(read, 1);
        // TLS handshake record
        assert_eq!(first_byte, 0x16);
        assert!(matches!(result, Ok(Err(NotificationError::Transport(_)))));
    }
}
