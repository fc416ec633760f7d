use std::{convert::Infallible, sync::Arc, time::Duration};

use axum::{
    extract::{Path, State},
    response::sse::{Event as SseEvent, KeepAlive, Sse},
    routing::get,
    Router,
};
use futures::{future, stream, StreamExt};
use futures_core::stream::Stream;
use leadrelay_core::events::RelayEvent;
use serde_json::json;

use crate::{
    error::{ApiError, ApiResult},
    main_lib::AppState,
};

/// Idle interval after which a `:ping` comment is sent to keep proxies from
/// closing the connection.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(30);

fn to_sse_event(event: &RelayEvent) -> Option<SseEvent> {
    match SseEvent::default().json_data(event) {
        Ok(sse_event) => Some(sse_event),
        Err(err) => {
            tracing::error!(
                "Failed to serialize SSE payload for {} on lead {}: {}",
                event.kind(),
                event.lead_id(),
                err
            );
            None
        }
    }
}

/// Stream a lead's status history followed by live updates.
async fn stream_lead_events(
    State(state): State<Arc<AppState>>,
    Path(lead_id): Path<String>,
) -> ApiResult<Sse<impl Stream<Item = Result<SseEvent, Infallible>>>> {
    let lead_id = lead_id.trim().to_string();
    if lead_id.is_empty() {
        return Err(ApiError::BadRequest("Missing leadId".to_string()));
    }

    // Subscribing while the snapshot is read means every update lands either
    // in the replay or in the live stream, exactly once.
    let (snapshot, subscription) = state
        .event_store
        .get_snapshot_with(&lead_id, || state.relay.subscribe(&lead_id));
    tracing::info!(
        "Stream opened for lead {} ({} events replayed, {} listeners)",
        lead_id,
        snapshot.status_log.len(),
        state.relay.listener_count_for(&lead_id)
    );

    let open = SseEvent::default()
        .event("open")
        .data(json!({ "type": "connected", "leadId": &lead_id }).to_string());
    let replay: Vec<SseEvent> = std::iter::once(open)
        .chain(
            RelayEvent::replay(&lead_id, &snapshot)
                .iter()
                .filter_map(to_sse_event),
        )
        .collect();

    // The subscription lives inside the live stream; when the client goes
    // away the body is dropped and the listener unregisters itself.
    let live = subscription
        .into_stream()
        .filter_map(|event| future::ready(to_sse_event(&event)));

    let events = stream::iter(replay).chain(live).map(Ok::<_, Infallible>);

    Ok(Sse::new(events).keep_alive(
        KeepAlive::new()
            .interval(HEARTBEAT_INTERVAL)
            .text("ping"),
    ))
}

async fn missing_lead_id() -> ApiResult<()> {
    Err(ApiError::BadRequest("Missing leadId".to_string()))
}

pub fn router() -> Router<Arc<AppState>> {
    Router::new()
        .route("/events", get(missing_lead_id))
        .route("/events/{lead_id}", get(stream_lead_events))
}
