//! Threshold alert composition and delivery

use std::sync::Arc;

use tracing::{error, info, warn};

use super::{MailTransport, OutgoingMail, SmtpMailer};
use crate::config::{Config, EmailConfig};

/// Result of one alert attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AlertOutcome {
    /// The relay accepted the message
    Sent,
    /// Email settings are incomplete; nothing was attempted
    Skipped(String),
    /// Delivery was attempted and failed
    Failed(String),
}

impl AlertOutcome {
    /// True only when the message went out
    pub fn is_success(&self) -> bool {
        matches!(self, Self::Sent)
    }
}

/// Composes the breach email and hands it to a [`MailTransport`]
pub struct AlertDispatcher {
    email: EmailConfig,
    subscription_id: Option<String>,
    threshold: f64,
    transport: Arc<dyn MailTransport>,
}

impl AlertDispatcher {
    /// Create a dispatcher with an explicit transport
    pub fn new(config: &Config, transport: Arc<dyn MailTransport>) -> Self {
        Self {
            email: config.email.clone(),
            subscription_id: config.azure.subscription_id.clone(),
            threshold: config.threshold,
            transport,
        }
    }

    /// Create a dispatcher that delivers through the configured SMTP relay
    pub fn from_config(config: &Config) -> Self {
        let mailer = SmtpMailer::new(&config.smtp, &config.email);
        Self::new(config, Arc::new(mailer))
    }

    /// Compose the alert for `cost`, or `None` if email settings are incomplete
    pub fn compose(&self, cost: f64) -> Option<OutgoingMail> {
        let (Some(sender), Some(_), Some(receiver)) =
            (&self.email.sender, &self.email.password, &self.email.receiver)
        else {
            return None;
        };

        let subscription = self.subscription_id.as_deref().unwrap_or("None");
        let body = format!(
            "The Azure Month-To-Date cost for subscription '{subscription}' has exceeded the set threshold.\n\
             \n\
             Current Total Cost: ${cost:.2}\n\
             Configured Threshold: ${threshold:.2}\n\
             \n\
             Action required: Check resource usage and identify cost contributors.\n",
            threshold = self.threshold,
        );

        Some(OutgoingMail {
            from: sender.clone(),
            to: receiver.clone(),
            subject: format!("🚨 Cost Anomaly Alert! Azure Cost: ${cost:.2}"),
            body,
        })
    }

    /// Send one alert for `cost`. Never fails; problems become the outcome.
    pub async fn send_alert(&self, cost: f64) -> AlertOutcome {
        let Some(mail) = self.compose(cost) else {
            warn!("Email credentials missing, cannot send alert");
            return AlertOutcome::Skipped("email credentials missing".to_string());
        };

        match self.transport.send(&mail).await {
            Ok(()) => {
                info!(receiver = %mail.to, cost, "Alert email sent");
                AlertOutcome::Sent
            }
            Err(e) => {
                error!(error = %e, "Failed to send email alert, check sender, password and 2FA settings");
                AlertOutcome::Failed(e.to_string())
            }
        }
    }
}
