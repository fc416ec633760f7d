//! Transactional e-mail API client.

use async_trait::async_trait;
use log::debug;
use reqwest::header::{HeaderMap, HeaderValue, AUTHORIZATION, CONTENT_TYPE};
use serde::Serialize;

use super::{build_http_client, truncate_body, ContactMailer};
use crate::contact::ContactSubmission;
use crate::errors::OutboundError;

/// Default endpoint of the e-mail API.
pub const DEFAULT_EMAIL_API_URL: &str = "https://api.resend.com/emails";

#[derive(Debug, Clone)]
pub struct EmailSettings {
    pub api_url: String,
    pub api_key: String,
    pub from: String,
    pub to: String,
}

#[derive(Serialize)]
struct SendEmailRequest<'a> {
    from: &'a str,
    to: Vec<&'a str>,
    subject: String,
    html: String,
    reply_to: &'a str,
}

/// Sends contact notifications through an HTTP e-mail API (Resend-compatible).
#[derive(Debug, Clone)]
pub struct EmailApiClient {
    client: reqwest::Client,
    settings: EmailSettings,
    auth_header: HeaderValue,
}

impl EmailApiClient {
    pub fn new(settings: EmailSettings) -> Result<Self, OutboundError> {
        let auth_header = HeaderValue::from_str(&format!("Bearer {}", settings.api_key))
            .map_err(|e| OutboundError::Invalid(format!("Invalid e-mail API key format: {}", e)))?;
        Ok(Self {
            client: build_http_client()?,
            settings,
            auth_header,
        })
    }

    fn headers(&self) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        headers.insert(AUTHORIZATION, self.auth_header.clone());
        headers
    }
}

#[async_trait]
impl ContactMailer for EmailApiClient {
    async fn send_contact(&self, submission: &ContactSubmission) -> Result<(), OutboundError> {
        let request = SendEmailRequest {
            from: &self.settings.from,
            to: vec![self.settings.to.as_str()],
            subject: submission.email_subject(),
            html: submission.email_html(),
            reply_to: submission.email.trim(),
        };
        debug!("[EmailApi] POST {}", self.settings.api_url);

        let response = self
            .client
            .post(&self.settings.api_url)
            .headers(self.headers())
            .json(&request)
            .send()
            .await?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(OutboundError::Upstream {
                status: status.as_u16(),
                body: truncate_body(&body),
            });
        }
        Ok(())
    }
}
