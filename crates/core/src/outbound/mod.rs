//! Clients for the external systems the site hands submissions to.
//!
//! Handlers depend on the [`ContactMailer`] and [`WebhookForwarder`] traits so
//! the concrete HTTP clients can be swapped for test doubles.

mod email;
mod webhook;

use async_trait::async_trait;
use serde_json::Value;

use crate::contact::ContactSubmission;
use crate::errors::OutboundError;

pub use email::{EmailApiClient, EmailSettings, DEFAULT_EMAIL_API_URL};
pub use webhook::HttpWebhookForwarder;

/// Timeout applied to every outbound request.
pub const DEFAULT_TIMEOUT_SECS: u64 = 15;

/// Delivers a contact submission as an e-mail notification.
#[async_trait]
pub trait ContactMailer: Send + Sync {
    async fn send_contact(&self, submission: &ContactSubmission) -> Result<(), OutboundError>;
}

/// Posts a JSON payload to the workflow engine and returns its JSON answer.
#[async_trait]
pub trait WebhookForwarder: Send + Sync {
    async fn forward(&self, payload: &Value) -> Result<Value, OutboundError>;
}

/// Keeps error bodies short enough for a log line.
pub(crate) fn truncate_body(body: &str) -> String {
    body.chars().take(200).collect()
}

pub(crate) fn build_http_client() -> Result<reqwest::Client, OutboundError> {
    reqwest::Client::builder()
        .timeout(std::time::Duration::from_secs(DEFAULT_TIMEOUT_SECS))
        .build()
        .map_err(|e| OutboundError::Invalid(format!("Failed to initialize HTTP client: {}", e)))
}
