use std::sync::Arc;

use axum::{
    body::Bytes,
    extract::{rejection::QueryRejection, Query, State},
    http::HeaderMap,
    routing::get,
    Json, Router,
};
use chrono::{DateTime, Utc};
use leadrelay_core::webhook_log::{ErrorSummary, HealthState, WebhookLogRecord, WebhookMetrics};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

use crate::{
    api::shared::{authorize, parse_json},
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

const DEFAULT_RECENT_LOGS: usize = 20;

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct HealthQuery {
    limit: Option<usize>,
    lead_id: Option<String>,
}

#[derive(Serialize)]
#[serde(rename_all = "camelCase")]
struct WebhookHealthResponse {
    status: HealthState,
    timestamp: DateTime<Utc>,
    metrics: WebhookMetrics,
    active_listeners: usize,
    tracked_leads: usize,
    recent_logs: Vec<WebhookLogRecord>,
    error_summary: Vec<ErrorSummary>,
}

/// Webhook traffic metrics and recent requests.
async fn get_webhook_health(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    query: Result<Query<HealthQuery>, QueryRejection>,
) -> ApiResult<Json<WebhookHealthResponse>> {
    authorize(&state, &headers)?;
    let Query(query) = query.map_err(|e| ApiError::BadRequest(e.body_text()))?;

    let limit = query.limit.unwrap_or(DEFAULT_RECENT_LOGS);
    let recent_logs = match query.lead_id.as_deref().map(str::trim) {
        Some(lead_id) if !lead_id.is_empty() => state
            .webhook_log
            .for_lead(lead_id)
            .into_iter()
            .take(limit)
            .collect(),
        _ => state.webhook_log.recent(limit),
    };
    let metrics = state.webhook_log.metrics();

    Ok(Json(WebhookHealthResponse {
        status: state.webhook_log.health_status(),
        timestamp: Utc::now(),
        metrics,
        active_listeners: state.relay.listener_count(),
        tracked_leads: state.event_store.lead_count(),
        recent_logs,
        error_summary: state.webhook_log.error_summary(),
    }))
}

/// Operator actions on the webhook log.
async fn webhook_health_action(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    body: Bytes,
) -> ApiResult<Json<Value>> {
    authorize(&state, &headers)?;
    let payload = parse_json(&body)?;
    let action = payload.get("action").and_then(Value::as_str).unwrap_or_default();

    match action {
        "clear-logs" => {
            let cleared = state.webhook_log.len();
            state.webhook_log.clear();
            tracing::info!("Webhook log cleared ({} records)", cleared);
            Ok(Json(json!({
                "success": true,
                "message": "Webhook logs cleared",
                "cleared": cleared,
            })))
        }
        "export-logs" => {
            let export = state.webhook_log.export();
            Ok(Json(serde_json::to_value(export).map_err(anyhow::Error::from)?))
        }
        other => Err(ApiError::BadRequest(format!(
            "Unknown action '{}'. Expected 'clear-logs' or 'export-logs'",
            other
        ))),
    }
}

pub async fn healthz() -> &'static str {
    "ok"
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/healthz", get(healthz))
        .route(
            "/webhook/health",
            get(get_webhook_health).post(webhook_health_action),
        )
}
