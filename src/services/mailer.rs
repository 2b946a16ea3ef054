//! Approval emails via an authenticated SMTP relay.
//!
//! [`SmtpNotifier`] opens one implicit-TLS connection per dispatch and sends
//! one plain-text message per approver over it. Each message carries the
//! hosted image URL and an approval link addressed to that approver.

use async_trait::async_trait;
use lettre::message::header::ContentType;
use lettre::message::Mailbox;
use lettre::transport::smtp::authentication::Credentials;
use lettre::transport::smtp::PoolConfig;
use lettre::{AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor};
use url::Url;

use crate::models::generation::ApprovalRequest;

/// Delivery of approval requests to approvers.
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Send one message per approver. Returns the number of messages sent.
    async fn send_approval(&self, approval: &ApprovalRequest) -> Result<usize, MailError>;
}

/// Approval link for one approver: the base URL with `key`, `email`,
/// `public_url` and `approver_email` form-encoded in that order.
pub fn approval_link(
    approval_url: &str,
    approval: &ApprovalRequest,
    approver: &str,
) -> Result<Url, MailError> {
    Url::parse_with_params(
        approval_url,
        &[
            ("key", approval.key.as_str()),
            ("email", approval.email.as_str()),
            ("public_url", approval.public_url.as_str()),
            ("approver_email", approver),
        ],
    )
    .map_err(|e| MailError::Build(format!("invalid approval URL: {e}")))
}

/// Plain-text message body.
pub fn email_body(public_url: &str, link: &Url) -> String {
    format!(
        "Please check the following image and click the link to approve it.\n\
         \n\
         {public_url}\n\
         \n\
         Approve:\n\
         \n\
         {link}\n"
    )
}

pub struct SmtpNotifier {
    relay_host: String,
    port: u16,
    sender: String,
    password: String,
    approval_url: String,
}

impl SmtpNotifier {
    pub fn new(relay_host: &str, port: u16, sender: &str, password: &str, approval_url: &str) -> Self {
        Self {
            relay_host: relay_host.to_string(),
            port,
            sender: sender.to_string(),
            password: password.to_string(),
            approval_url: approval_url.to_string(),
        }
    }

    /// Build the message for a single approver.
    pub fn compose(&self, approval: &ApprovalRequest, approver: &str) -> Result<Message, MailError> {
        let from: Mailbox = self.sender.parse()?;
        let to: Mailbox = approver.parse()?;
        let link = approval_link(&self.approval_url, approval, approver)?;

        Message::builder()
            .from(from)
            .to(to)
            .subject(approval.subject.clone())
            .header(ContentType::TEXT_PLAIN)
            .body(email_body(&approval.public_url, &link))
            .map_err(|e| MailError::Build(e.to_string()))
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send_approval(&self, approval: &ApprovalRequest) -> Result<usize, MailError> {
        // Compose first so a bad address fails before connecting.
        let messages = approval
            .approvers
            .iter()
            .map(|approver| self.compose(approval, approver))
            .collect::<Result<Vec<_>, _>>()?;

        // Single pooled connection, closed when the transport drops.
        let transport = AsyncSmtpTransport::<Tokio1Executor>::relay(&self.relay_host)?
            .port(self.port)
            .credentials(Credentials::new(self.sender.clone(), self.password.clone()))
            .pool_config(PoolConfig::new().max_size(1))
            .build();

        let mut sent = 0;
        for (message, approver) in messages.into_iter().zip(&approval.approvers) {
            transport.send(message).await?;
            tracing::info!(to = %approver, email = %approval.email, "Approval email sent");
            sent += 1;
        }

        Ok(sent)
    }
}

#[derive(Debug, thiserror::Error)]
pub enum MailError {
    #[error("SMTP transport error: {0}")]
    Transport(#[from] lettre::transport::smtp::Error),

    #[error("Email address parse error: {0}")]
    Address(#[from] lettre::address::AddressError),

    #[error("Email build error: {0}")]
    Build(String),
}
