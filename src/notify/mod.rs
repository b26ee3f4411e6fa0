use std::collections::BTreeMap;

use async_trait::async_trait;
use tracing::info;

pub mod smtp;
pub mod templates;

pub use templates::Template;

/// One outgoing email, rendered by the notifier from `template` and `variables`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Notification {
    pub to: String,
    pub subject: String,
    pub template: Template,
    pub variables: BTreeMap<String, String>,
}

impl Notification {
    pub fn new(to: &str, template: Template) -> Self {
        Self {
            to: to.to_string(),
            subject: template.subject().to_string(),
            template,
            variables: BTreeMap::new(),
        }
    }

    pub fn var(mut self, key: &str, value: impl Into<String>) -> Self {
        self.variables.insert(key.to_string(), value.into());
        self
    }
}

/// Outbound email channel. Returns whether delivery was accepted; failures are logged
/// by the implementation, never retried.
#[async_trait]
pub trait Notifier: Send + Sync {
    async fn send(&self, notification: Notification) -> bool;
}

/// Used when no SMTP relay is configured: logs the message and reports success.
#[derive(Clone, Default)]
pub struct LogNotifier;

#[async_trait]
impl Notifier for LogNotifier {
    async fn send(&self, notification: Notification) -> bool {
        info!(
            to = %notification.to,
            template = notification.template.key(),
            variables = ?redacted(&notification.variables),
            "email not sent (no SMTP configured)"
        );
        true
    }
}

/// Template variables safe to log. Links carry reset and verification tokens.
fn redacted(variables: &BTreeMap<String, String>) -> BTreeMap<&str, &str> {
    variables
        .iter()
        .map(|(key, value)| {
            let shown = if key.starts_with("link") {
                "[redacted]"
            } else {
                value.as_str()
            };
            (key.as_str(), shown)
        })
        .collect()
}
