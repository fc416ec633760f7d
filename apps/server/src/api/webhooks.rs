use std::{collections::HashMap, sync::Arc, time::Instant};

use axum::{
    body::Bytes,
    extract::{Path, State},
    http::{HeaderMap, StatusCode},
    response::{IntoResponse, Response},
    routing::post,
    Json, Router,
};
use chrono::{DateTime, Utc};
use leadrelay_core::{
    errors::ValidationError,
    events::{NewStatusUpdate, RelayEvent, Snapshot},
    steps::StepStatus,
    webhook_log::NewWebhookLog,
};
use serde::Serialize;
use serde_json::Value;

use crate::{
    api::shared::{authorize, body_for_log, header_map, parse_json, RequestMeta},
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Everything about an inbound webhook call that ends up in the request log.
struct WebhookCall {
    endpoint: String,
    lead_id: String,
    headers: HashMap<String, String>,
    body: Value,
    meta: RequestMeta,
    started: Instant,
}

impl WebhookCall {
    fn new(endpoint: &str, lead_id: &str, headers: &HeaderMap, body: &Bytes, meta: RequestMeta) -> Self {
        Self {
            endpoint: format!("{}/{}", endpoint, lead_id),
            lead_id: lead_id.to_string(),
            headers: header_map(headers),
            body: body_for_log(body),
            meta,
            started: Instant::now(),
        }
    }

    /// Logs the outcome and turns it into the HTTP response.
    fn finish<T: Serialize>(self, state: &AppState, outcome: ApiResult<Accepted<T>>) -> Response {
        let processing_time_ms = self.started.elapsed().as_millis() as u64;
        let mut entry = NewWebhookLog {
            endpoint: self.endpoint,
            lead_id: Some(self.lead_id),
            method: "POST".to_string(),
            headers: self.headers,
            body: self.body,
            processing_time_ms,
            user_agent: self.meta.user_agent,
            source_ip: self.meta.source_ip,
            ..Default::default()
        };

        match outcome {
            Ok(accepted) => {
                entry.success = true;
                entry.event_emitted = accepted.event_emitted;
                entry.response_status = StatusCode::OK.as_u16();
                entry.response_body = serde_json::to_value(&accepted.body).ok();
                state.webhook_log.record(entry);
                (StatusCode::OK, Json(accepted.body)).into_response()
            }
            Err(err) => {
                tracing::warn!(
                    "Webhook {} failed for lead {}: {}",
                    entry.endpoint,
                    entry.lead_id.as_deref().unwrap_or_default(),
                    err
                );
                entry.success = false;
                entry.error = Some(err.to_string());
                entry.error_stack = err.diagnostic();
                entry.response_status = err.status_code().as_u16();
                state.webhook_log.record(entry);
                err.into_response()
            }
        }
    }
}

/// A processed webhook: the response body and whether anyone was listening.
struct Accepted<T> {
    body: T,
    event_emitted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct StatusUpdateResponse {
    success: bool,
    lead_id: String,
    step: String,
    status: StepStatus,
    timestamp: DateTime<Utc>,
    event_emitted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct DashboardUpdateResponse {
    success: bool,
    lead_id: String,
    timestamp: DateTime<Utc>,
    event_emitted: bool,
}

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct SnapshotResponse {
    lead_id: String,
    #[serde(flatten)]
    snapshot: Snapshot,
}

fn required_str<'a>(payload: &'a Value, field: &str) -> Option<&'a str> {
    payload
        .get(field)
        .and_then(Value::as_str)
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

fn checked_lead_id(lead_id: &str) -> ApiResult<&str> {
    let lead_id = lead_id.trim();
    if lead_id.is_empty() {
        return Err(ApiError::BadRequest("Missing leadId".to_string()));
    }
    Ok(lead_id)
}

fn apply_status_update(
    state: &AppState,
    lead_id: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> ApiResult<Accepted<StatusUpdateResponse>> {
    authorize(state, headers)?;
    let lead_id = checked_lead_id(lead_id)?;
    let payload = parse_json(body)?;

    let (Some(raw_step), Some(raw_status)) =
        (required_str(&payload, "step"), required_str(&payload, "status"))
    else {
        return Err(ApiError::InvalidPayload {
            message: "Missing required fields: step and status".to_string(),
            received: payload.clone(),
        });
    };
    let status: StepStatus = raw_status.parse().map_err(|e: ValidationError| {
        ApiError::InvalidPayload {
            message: e.to_string(),
            received: payload.clone(),
        }
    })?;

    let step = state.step_aliases.canonicalize(raw_step);
    if step != raw_step {
        tracing::debug!("Step '{}' normalized to '{}'", raw_step, step);
    }
    let message = payload
        .get("message")
        .and_then(Value::as_str)
        .map(str::to_string);

    let (snapshot, delivered) = state.event_store.add_status_update_with(
        lead_id,
        NewStatusUpdate {
            step,
            status,
            message,
            timestamp: None,
        },
        |entry| {
            state
                .relay
                .publish(lead_id, RelayEvent::status_update(lead_id, entry))
        },
    );
    let entry = snapshot
        .status_log
        .last()
        .ok_or_else(|| ApiError::Internal(format!("Status update for {} was not stored", lead_id)))?;
    if delivered == 0 {
        tracing::debug!("No open stream for lead {}; update kept in snapshot", lead_id);
    }

    Ok(Accepted {
        body: StatusUpdateResponse {
            success: true,
            lead_id: lead_id.to_string(),
            step: entry.step.clone(),
            status: entry.status,
            timestamp: entry.timestamp,
            event_emitted: delivered > 0,
        },
        event_emitted: delivered > 0,
    })
}

fn apply_dashboard_update(
    state: &AppState,
    lead_id: &str,
    headers: &HeaderMap,
    body: &Bytes,
) -> ApiResult<Accepted<DashboardUpdateResponse>> {
    authorize(state, headers)?;
    let lead_id = checked_lead_id(lead_id)?;
    let payload = parse_json(body)?;

    // Accept both `{ "data": {...} }` envelopes and bare payloads.
    let data = match payload {
        Value::Object(mut map) if map.len() == 1 && map.contains_key("data") => {
            map.remove("data").unwrap_or(Value::Null)
        }
        other => other,
    };
    if data.is_null() {
        return Err(ApiError::InvalidPayload {
            message: "Dashboard payload must not be null".to_string(),
            received: Value::Null,
        });
    }

    let (snapshot, delivered) =
        state
            .event_store
            .set_dashboard_data_with(lead_id, data, |data, timestamp| {
                state.relay.publish(
                    lead_id,
                    RelayEvent::DashboardUpdate {
                        lead_id: lead_id.to_string(),
                        data: data.clone(),
                        timestamp,
                    },
                )
            });
    let timestamp = snapshot.dashboard_updated_at.unwrap_or_else(Utc::now);

    Ok(Accepted {
        body: DashboardUpdateResponse {
            success: true,
            lead_id: lead_id.to_string(),
            timestamp,
            event_emitted: delivered > 0,
        },
        event_emitted: delivered > 0,
    })
}

/// Receive a step status report from the workflow engine.
async fn receive_status_update(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<String>,
    meta: RequestMeta,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = WebhookCall::new("/webhook/status-update", &lead_id, &headers, &body, meta);
    let outcome = apply_status_update(&state, &lead_id, &headers, &body);
    call.finish(&state, outcome)
}

/// Receive the computed dashboard for a lead.
async fn receive_dashboard_update(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<String>,
    meta: RequestMeta,
    headers: HeaderMap,
    body: Bytes,
) -> Response {
    let call = WebhookCall::new("/webhook/dashboard-update", &lead_id, &headers, &body, meta);
    let outcome = apply_dashboard_update(&state, &lead_id, &headers, &body);
    call.finish(&state, outcome)
}

/// Current snapshot for a lead, for clients that poll instead of streaming.
async fn get_lead_snapshot(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<String>,
) -> ApiResult<Json<SnapshotResponse>> {
    let lead_id = checked_lead_id(&lead_id)?;
    Ok(Json(SnapshotResponse {
        lead_id: lead_id.to_string(),
        snapshot: state.event_store.get_snapshot(lead_id),
    }))
}

/// Forget everything recorded for a lead.
async fn clear_lead(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<String>,
    headers: HeaderMap,
) -> ApiResult<StatusCode> {
    authorize(&state, &headers)?;
    let lead_id = checked_lead_id(&lead_id)?;
    state.event_store.clear(lead_id);
    tracing::info!("Cleared stored events for lead {}", lead_id);
    Ok(StatusCode::NO_CONTENT)
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route(
            "/webhook/status-update/{lead_id}",
            post(receive_status_update)
                .get(get_lead_snapshot)
                .delete(clear_lead),
        )
        .route(
            "/webhook/dashboard-update/{lead_id}",
            post(receive_dashboard_update),
        )
}
