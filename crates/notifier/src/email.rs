//! SMTP email notifier.
//!
//! Each call opens its own STARTTLS session, logs in, sends one message and
//! closes the session. The transport is built without connection pooling, so
//! nothing outlives a single `notify` call.

use std::time::Duration;

use async_trait::async_trait;
use lettre::message::Mailbox;
use lettre::message::header::ContentType;
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};

use etl_common::config::SmtpConfig;
use etl_common::types::Notification;

use crate::{Notifier, NotifyError};

/// Sends plain-text alerts through an authenticated SMTP submission service.
pub struct EmailNotifier {
    config: SmtpConfig,
}

impl EmailNotifier {
    pub fn new(config: SmtpConfig) -> Self {
        Self { config }
    }

    /// Build the RFC 5322 message for a notification.
    pub fn build_message(&self, notification: &Notification) -> Result<Message, NotifyError> {
        let message = Message::builder()
            .from(parse_mailbox(&self.config.from)?)
            .to(parse_mailbox(&notification.recipient)?)
            .subject(notification.subject.as_str())
            .header(ContentType::TEXT_PLAIN)
            .body(notification.body.clone())?;
        Ok(message)
    }

    /// Send one message over a fresh session, returning any failure.
    pub async fn try_send(&self, notification: &Notification) -> Result<(), NotifyError> {
        let message = self.build_message(notification)?;

        let mailer = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&self.config.host)?
            .port(self.config.port)
            .credentials(Credentials::new(
                self.config.username.clone(),
                self.config.password.clone(),
            ))
            .timeout(Some(Duration::from_secs(self.config.timeout_secs)))
            .build();

        mailer.send(message).await?;
        Ok(())
    }
}

#[async_trait]
impl Notifier for EmailNotifier {
    async fn notify(&self, notification: &Notification) {
        match self.try_send(notification).await {
            Ok(()) => {
                tracing::info!(
                    recipient = %notification.recipient,
                    subject = %notification.subject,
                    "Failure email sent"
                );
            }
            Err(e) => {
                tracing::error!(
                    recipient = %notification.recipient,
                    smtp_host = %self.config.host,
                    error = %e,
                    "Failed to send failure email"
                );
            }
        }
    }
}

fn parse_mailbox(address: &str) -> Result<Mailbox, NotifyError> {
    address.parse().map_err(|source| NotifyError::Address {
        address: address.to_string(),
        source,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    fn smtp_config() -> SmtpConfig {
        SmtpConfig {
            host: "smtp.example.com".to_string(),
            port: 587,
            username: "alerts@example.com".to_string(),
            password: "secret".to_string(),
            from: "alerts@example.com".to_string(),
            timeout_secs: 5,
        }
    }

    #[test]
    fn test_build_message_headers() {
        let notifier = EmailNotifier::new(smtp_config());
        let notification = Notification::new(
            "ETL Pipeline Failure",
            "The ETL pipeline failed with error: boom",
            "ops@example.com",
        );

        let message = notifier.build_message(&notification).unwrap();
        let raw = String::from_utf8(message.formatted()).unwrap();

        assert!(raw.contains("From: alerts@example.com"));
        assert!(raw.contains("To: ops@example.com"));
        assert!(raw.contains("Subject: ETL Pipeline Failure"));
        assert!(raw.contains("Content-Type: text/plain"));
        assert!(raw.contains("The ETL pipeline failed with error: boom"));
    }

    #[test]
    fn test_build_message_rejects_bad_recipient() {
        let notifier = EmailNotifier::new(smtp_config());
        let notification = Notification::new("subject", "body", "not an address");

        let err = notifier.build_message(&notification).unwrap_err();
        assert!(matches!(err, NotifyError::Address { ref address, .. } if address == "not an address"));
    }

    #[tokio::test]
    async fn test_notify_swallows_bad_sender() {
        let mut config = smtp_config();
        config.from = "broken".to_string();
        let notifier = EmailNotifier::new(config);

        // Fails before any network I/O; must return normally.
        notifier
            .notify(&Notification::new("subject", "body", "ops@example.com"))
            .await;
    }
}
