use std::sync::Arc;

use anyhow::Context;
use leadrelay_core::{
    events::{EventRelay, EventStore},
    outbound::{ContactMailer, EmailApiClient, HttpWebhookForwarder, WebhookForwarder},
    rate_limit::RateLimiter,
    steps::StepAliases,
    webhook_log::WebhookLogger,
};
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

use crate::config::Config;

/// Process-wide state, built once at startup and shared by every handler.
pub struct AppState {
    pub rate_limiter: RateLimiter,
    pub webhook_log: WebhookLogger,
    pub event_store: EventStore,
    pub relay: EventRelay,
    pub step_aliases: StepAliases,
    /// `None` when e-mail delivery is not configured.
    pub mailer: Option<Arc<dyn ContactMailer>>,
    /// `None` when no workflow webhook URL is configured.
    pub forwarder: Option<Arc<dyn WebhookForwarder>>,
    pub webhook_secret: Option<String>,
}

pub fn init_tracing() {
    let log_format = std::env::var("LR_LOG_FORMAT").unwrap_or_else(|_| "text".to_string());
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    let registry = tracing_subscriber::registry().with(filter);

    if log_format.eq_ignore_ascii_case("json") {
        registry
            .with(fmt::layer().json().with_current_span(false))
            .init();
    } else {
        registry
            .with(fmt::layer().with_target(true).with_line_number(true))
            .init();
    }
}

/// Builds the state with the real outbound clients described by `config`.
pub fn build_state(config: &Config) -> anyhow::Result<Arc<AppState>> {
    let mailer: Option<Arc<dyn ContactMailer>> = match &config.email {
        Some(settings) => Some(Arc::new(
            EmailApiClient::new(settings.clone()).context("Failed to build e-mail client")?,
        )),
        None => {
            tracing::warn!("E-mail delivery is not configured; /contact will answer 503");
            None
        }
    };

    let forwarder: Option<Arc<dyn WebhookForwarder>> = match &config.webhook_url {
        Some(url) => Some(Arc::new(
            HttpWebhookForwarder::new(url).context("Failed to build webhook forwarder")?,
        )),
        None => {
            tracing::warn!("LR_WEBHOOK_URL is not set; /proxy-webhook will answer 503");
            None
        }
    };

    build_state_with(config, mailer, forwarder)
}

/// Builds the state around caller-supplied outbound clients.
pub fn build_state_with(
    config: &Config,
    mailer: Option<Arc<dyn ContactMailer>>,
    forwarder: Option<Arc<dyn WebhookForwarder>>,
) -> anyhow::Result<Arc<AppState>> {
    let step_aliases = match &config.step_aliases_file {
        Some(path) => StepAliases::from_file(path)?,
        None => StepAliases::default(),
    };
    tracing::info!("Loaded {} step aliases", step_aliases.len());

    if config.secret_key.is_none() {
        tracing::warn!("LR_SECRET_KEY is not set; webhook endpoints accept unauthenticated calls");
    }

    Ok(Arc::new(AppState {
        rate_limiter: RateLimiter::new(config.rate_limit_window),
        webhook_log: WebhookLogger::new(config.webhook_log_capacity),
        event_store: EventStore::new(),
        relay: EventRelay::new(config.max_listeners),
        step_aliases,
        mailer,
        forwarder,
        webhook_secret: config.secret_key.clone(),
    }))
}
