use anyhow::Context;
use async_trait::async_trait;
use lettre::{
    message::{header::ContentType, Mailbox},
    transport::smtp::authentication::Credentials,
    AsyncSmtpTransport, AsyncTransport, Message, Tokio1Executor,
};
use tracing::{error, info};

use super::{Notification, Notifier};
use crate::config::SmtpConfig;

/// Sends notifications through an SMTP relay (STARTTLS).
pub struct SmtpNotifier {
    transport: AsyncSmtpTransport<Tokio1Executor>,
    from: Mailbox,
}

impl SmtpNotifier {
    pub fn new(cfg: &SmtpConfig) -> anyhow::Result<Self> {
        let from: Mailbox = cfg.from.parse().context("parse SMTP_FROM")?;
        let transport = AsyncSmtpTransport::<Tokio1Executor>::starttls_relay(&cfg.host)
            .context("build smtp transport")?
            .port(cfg.port)
            .credentials(Credentials::new(cfg.username.clone(), cfg.password.clone()))
            .build();
        Ok(Self { transport, from })
    }

    fn build_message(&self, notification: &Notification) -> anyhow::Result<Message> {
        let to: Mailbox = notification
            .to
            .parse()
            .with_context(|| format!("parse recipient {}", notification.to))?;
        let body = notification.template.render(&notification.variables);
        Message::builder()
            .from(self.from.clone())
            .to(to)
            .subject(notification.subject.clone())
            .header(ContentType::TEXT_HTML)
            .body(body)
            .context("build email")
    }
}

#[async_trait]
impl Notifier for SmtpNotifier {
    async fn send(&self, notification: Notification) -> bool {
        let message = match self.build_message(&notification) {
            Ok(m) => m,
            Err(e) => {
                error!(error = %e, to = %notification.to, "email build failed");
                return false;
            }
        };
        match self.transport.send(message).await {
            Ok(_) => {
                info!(to = %notification.to, template = notification.template.key(), "email sent");
                true
            }
            Err(e) => {
                error!(error = %e, to = %notification.to, "smtp send failed");
                false
            }
        }
    }
}
