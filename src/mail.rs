use async_trait::async_trait;
use lettre::{
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
    message::header::ContentType, transport::smtp::authentication::Credentials,
};
use std::sync::Arc;
use thiserror::Error;

use crate::config::SmtpConfig;

#[derive(Debug, Error)]
pub enum MailError {
    #[error("invalid address: {0}")]
    Address(String),
    #[error("message could not be built: {0}")]
    Build(String),
    #[error("smtp delivery failed: {0}")]
    Transport(String),
}

/// Outgoing plain-text mail.
#[derive(Debug, Clone, PartialEq)]
pub struct Mail {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Mailer
///
/// Narrow outbound mail interface. Callers never wait on delivery; see `send_in_background`.
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, mail: Mail) -> Result<(), MailError>;
}

pub type MailerState = Arc<dyn Mailer>;

/// SmtpMailer
///
/// STARTTLS relay through `lettre`'s tokio transport.
pub struct SmtpMailer {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: String,
}

impl SmtpMailer {
    pub fn new(config: &SmtpConfig) -> Result<Self, MailError> {
        let mut builder = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&config.host)
            .map_err(|e| MailError::Transport(e.to_string()))?
            .port(config.port);
        if !config.username.is_empty() {
            builder = builder.credentials(Credentials::new(
                config.username.clone(),
                config.password.clone(),
            ));
        }
        Ok(Self { transport: builder.build(), from: config.from.clone() })
    }
}

#[async_trait]
impl Mailer for SmtpMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        let from = self.from.parse().map_err(|_| MailError::Address(self.from.clone()))?;
        let to = mail.to.parse().map_err(|_| MailError::Address(mail.to.clone()))?;
        let message = Message::builder()
            .from(from)
            .to(to)
            .subject(mail.subject)
            .header(ContentType::TEXT_PLAIN)
            .body(mail.body)
            .map_err(|e| MailError::Build(e.to_string()))?;
        self.transport
            .send(message)
            .await
            .map_err(|e| MailError::Transport(e.to_string()))?;
        Ok(())
    }
}

/// LogMailer
///
/// Stand-in used when SMTP is not configured: the mail is written to the log instead.
#[derive(Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, mail: Mail) -> Result<(), MailError> {
        tracing::info!(
            to = %mail.to,
            subject = %mail.subject,
            "mail delivery skipped (smtp not configured)"
        );
        Ok(())
    }
}

/// Picks the SMTP mailer when configured, falling back to the log mailer.
pub fn build_mailer(smtp: Option<&SmtpConfig>) -> MailerState {
    match smtp.map(SmtpMailer::new) {
        Some(Ok(mailer)) => Arc::new(mailer),
        Some(Err(e)) => {
            tracing::warn!(error = %e, "smtp unavailable, falling back to log mailer");
            Arc::new(LogMailer)
        }
        None => Arc::new(LogMailer),
    }
}

/// Fire-and-forget delivery. Failures are logged, never surfaced to the request.
pub fn send_in_background(mailer: &MailerState, mail: Mail) {
    let mailer = mailer.clone();
    tokio::spawn(async move {
        let to = mail.to.clone();
        if let Err(e) = mailer.send(mail).await {
            tracing::warn!(error = %e, to = %to, "mail delivery failed");
        }
    });
}

pub fn approval_mail(to: &str, name: &str, membership_number: &str) -> Mail {
    Mail {
        to: to.to_string(),
        subject: "Your membership has been approved".to_string(),
        body: format!(
            "Dear {name},\n\nYour membership application has been approved. \
             Your membership number is {membership_number}.\n\nWelcome to the association."
        ),
    }
}

pub fn reset_mail(to: &str, token: &str, expires_in_minutes: i64) -> Mail {
    Mail {
        to: to.to_string(),
        subject: "Password reset request".to_string(),
        body: format!(
            "A password reset was requested for your account.\n\n\
             Reset token: {token}\n\nThe token expires in {expires_in_minutes} minutes. \
             If you did not request this, ignore this message."
        ),
    }
}
