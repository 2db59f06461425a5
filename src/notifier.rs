//! Email notifier using an authenticated STARTTLS relay.

use crate::config::{Config, ConfigError};
use lettre::message::{header::ContentType, Mailbox};
use lettre::transport::smtp::authentication::Credentials;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use std::sync::Arc;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NotifyError {
    #[error("configuration error: {0}")]
    ConfigError(#[from] ConfigError),
    #[error("invalid mailbox address: {0}")]
    Address(#[from] lettre::address::AddressError),
    #[error("failed to build email message: {0}")]
    Message(#[from] lettre::error::Error),
    #[error("SMTP delivery failed: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),
}

/// Mails the summary to the configured account
pub struct Notifier {
    config: Arc<Config>,
}

impl Notifier {
    pub fn new(config: Arc<Config>) -> Self {
        Self { config }
    }

    /// Build the HTML message, addressed from and to the mail account
    pub fn build_message(&self, summary: &str) -> Result<Message, NotifyError> {
        let (user, _) = self.config.credentials.mail_login()?;
        let mailbox: Mailbox = user.parse()?;

        let message = Message::builder()
            .from(mailbox.clone())
            .to(mailbox)
            .subject(self.config.mail.subject.as_str())
            .header(ContentType::TEXT_HTML)
            .body(render_html(summary))?;
        Ok(message)
    }

    /// Connect, upgrade with STARTTLS (unless disabled), authenticate and submit the summary
    pub async fn send(&self, summary: &str) -> Result<(), NotifyError> {
        let (user, password) = self.config.credentials.mail_login()?;
        let message = self.build_message(summary)?;
        let mail = &self.config.mail;

        let builder = if mail.starttls {
            AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&mail.smtp_host)?
        } else {
            AsyncSmtpTransport::<Tokio1Executor>::builder_dangerous(&mail.smtp_host)
        };

        // No pooling: one connection per digest, closed after submission
        let mailer: AsyncSmtpTransport<Tokio1Executor> = builder
            .port(mail.smtp_port)
            .credentials(Credentials::new(user.to_string(), password.to_string()))
            .timeout(Some(mail.timeout()))
            .build();

        mailer.send(message).await?;

        tracing::info!(
            to = user,
            subject = %mail.subject,
            "digest email sent"
        );
        Ok(())
    }

    /// Best-effort send: failures are logged and otherwise ignored
    pub async fn notify(&self, summary: &str) {
        if let Err(err) = self.send(summary).await {
            tracing::error!(
                relay = %self.config.mail.smtp_host,
                port = self.config.mail.smtp_port,
                error = %err,
                "failed to send digest email"
            );
        }
    }
}

/// Render plain summary text as an HTML fragment
pub fn render_html(summary: &str) -> String {
    summary.replace('\n', "<br>")
}
