use async_trait::async_trait;
use reqwest::Client;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;
use tracing::info;

use crate::config::Config;
use crate::error::{Error, Result};

#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct MailMessage {
    pub to: String,
    pub subject: String,
    pub body: String,
}

/// Out-of-band delivery of account mail.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait Mailer: Send + Sync {
    async fn send(&self, message: MailMessage) -> Result<()>;
}

/// Posts each message as JSON to a mail relay.
#[derive(Clone)]
pub struct WebhookMailer {
    client: Client,
    target_url: String,
}

impl WebhookMailer {
    pub fn new(target_url: String) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(10))
            .build()
            .map_err(|e| Error::Internal(format!("mail client: {}", e)))?;
        Ok(Self { client, target_url })
    }
}

#[async_trait]
impl Mailer for WebhookMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        let resp = self
            .client
            .post(&self.target_url)
            .json(&message)
            .send()
            .await
            .map_err(|e| Error::Internal(format!("mail relay unreachable: {}", e)))?;

        if !resp.status().is_success() {
            let status = resp.status();
            let body = resp.text().await.unwrap_or_default();
            return Err(Error::Internal(format!("mail relay returned {}: {}", status, body)));
        }
        Ok(())
    }
}

/// Writes mail to the log instead of sending it. Used when no relay is configured.
#[derive(Clone, Default)]
pub struct LogMailer;

#[async_trait]
impl Mailer for LogMailer {
    async fn send(&self, message: MailMessage) -> Result<()> {
        info!(to = %message.to, subject = %message.subject, body = %message.body, "Mail not sent, no relay configured");
        Ok(())
    }
}

pub fn mailer_from_config(config: &Config) -> Result<Arc<dyn Mailer>> {
    match &config.mail_webhook_url {
        Some(url) => Ok(Arc::new(WebhookMailer::new(url.clone())?)),
        None => Ok(Arc::new(LogMailer)),
    }
}
