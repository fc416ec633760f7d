use std::sync::Arc;

use axum::{body::Bytes, extract::State, routing::post, Json, Router};
use leadrelay_core::{
    contact::{honeypot_filled, ContactSubmission},
    errors::OutboundError,
};
use serde_json::{json, Value};

use crate::{
    api::shared::{parse_json, RequestMeta},
    error::{ApiError, FormResult},
    main_lib::AppState,
};

/// Applies the checks shared by both form endpoints. Returns `None` when the
/// honeypot fired and the caller should be told "ok" without further work.
fn screen_submission(
    state: &AppState,
    meta: &RequestMeta,
    body: &Bytes,
) -> FormResult<Option<(Value, ContactSubmission)>> {
    if !state.rate_limiter.allow(meta.client_key()) {
        tracing::warn!("Rate limited form submission from {}", meta.client_key());
        return Err(ApiError::RateLimited.into());
    }

    let payload = parse_json(body)?;
    if honeypot_filled(&payload) {
        tracing::info!("Honeypot triggered by {}", meta.client_key());
        return Ok(None);
    }
    let submission = ContactSubmission::from_value(&payload)?;
    submission.validate()?;
    Ok(Some((payload, submission)))
}

/// Relay a contact form submission to the e-mail API.
async fn submit_contact(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    body: Bytes,
) -> FormResult<Json<Value>> {
    let Some((_, submission)) = screen_submission(&state, &meta, &body)? else {
        return Ok(Json(json!({ "ok": true })));
    };

    let mailer = state
        .mailer
        .as_ref()
        .ok_or(OutboundError::NotConfigured("E-mail delivery"))?;
    mailer.send_contact(&submission).await?;

    tracing::info!("Contact request from {} delivered", submission.email.trim());
    Ok(Json(json!({ "ok": true })))
}

/// Forward a form payload verbatim to the workflow webhook.
async fn proxy_webhook(
    State(state): State<Arc<AppState>>,
    meta: RequestMeta,
    body: Bytes,
) -> FormResult<Json<Value>> {
    let Some((payload, _)) = screen_submission(&state, &meta, &body)? else {
        return Ok(Json(json!({ "ok": true })));
    };

    let forwarder = state
        .forwarder
        .as_ref()
        .ok_or(OutboundError::NotConfigured("Workflow webhook"))?;
    let upstream = forwarder.forward(&payload).await?;

    tracing::info!("Form payload from {} forwarded to webhook", meta.client_key());
    Ok(Json(upstream))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/contact", post(submit_contact))
        .route("/proxy-webhook", post(proxy_webhook))
}
