//! Generic workflow webhook forwarder.

use async_trait::async_trait;
use log::debug;
use serde_json::{json, Value};

use super::{build_http_client, truncate_body, WebhookForwarder};
use crate::errors::OutboundError;

#[derive(Debug, Clone)]
pub struct HttpWebhookForwarder {
    client: reqwest::Client,
    url: String,
}

impl HttpWebhookForwarder {
    pub fn new(url: &str) -> Result<Self, OutboundError> {
        let parsed = reqwest::Url::parse(url)
            .map_err(|e| OutboundError::Invalid(format!("Invalid webhook URL '{}': {}", url, e)))?;
        Ok(Self {
            client: build_http_client()?,
            url: parsed.to_string(),
        })
    }

    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl WebhookForwarder for HttpWebhookForwarder {
    async fn forward(&self, payload: &Value) -> Result<Value, OutboundError> {
        debug!("[Webhook] POST {}", self.url);
        let response = self.client.post(&self.url).json(payload).send().await?;

        let status = response.status();
        let body = response
            .text()
            .await
            .map_err(|e| OutboundError::Invalid(format!("Failed to read response: {}", e)))?;

        if !status.is_success() {
            return Err(OutboundError::Upstream {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }

        // Workflow engines often answer with an empty body or plain text.
        if body.trim().is_empty() {
            return Ok(json!({ "ok": true }));
        }
        Ok(serde_json::from_str(&body).unwrap_or_else(|_| json!({ "ok": true })))
    }
}
