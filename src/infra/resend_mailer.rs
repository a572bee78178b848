use async_trait::async_trait;
use serde::Serialize;
use tracing::debug;

use crate::app::ports::{MailSenderPort, OutgoingMail};
use crate::common::constants::{DEFAULT_ALERT_FROM, DEFAULT_RESEND_BASE_URL, RESEND_API_KEY_VAR};
use crate::common::error::AlertError;

#[derive(Serialize)]
struct ResendEmail<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: &'a str,
    text: &'a str,
}

/// Mail sender backed by the Resend HTTP API
pub struct ResendMailer {
    client: reqwest::Client,
    api_key: Option<String>,
    from: String,
    base_url: String,
}

impl ResendMailer {
    pub fn new(api_key: Option<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            api_key: api_key.filter(|k| !k.trim().is_empty()),
            from: DEFAULT_ALERT_FROM.to_string(),
            base_url: DEFAULT_RESEND_BASE_URL.to_string(),
        }
    }

    pub fn with_from(mut self, from: impl Into<String>) -> Self {
        self.from = from.into();
        self
    }

    pub fn with_base_url(mut self, base_url: impl Into<String>) -> Self {
        self.base_url = base_url.into().trim_end_matches('/').to_string();
        self
    }
}

#[async_trait]
impl MailSenderPort for ResendMailer {
    async fn send(&self, mail: &OutgoingMail) -> Result<(), AlertError> {
        let api_key = self
            .api_key
            .as_deref()
            .ok_or(AlertError::ConfigMissing(RESEND_API_KEY_VAR))?;

        let payload = ResendEmail {
            from: &self.from,
            to: vec![mail.to.as_str()],
            subject: &mail.subject,
            text: &mail.body,
        };

        let url = format!("{}/emails", self.base_url);
        debug!("Posting alert email to {}", url);
        let resp = self
            .client
            .post(&url)
            .bearer_auth(api_key)
            .json(&payload)
            .send()
            .await
            .map_err(|e| AlertError::Transport(e.to_string()))?;

        let status = resp.status();
        if !status.is_success() {
            let body = resp.text().await.unwrap_or_default();
            return Err(AlertError::Transport(format!("HTTP {}: {}", status.as_u16(), body)));
        }
        Ok(())
    }
}
