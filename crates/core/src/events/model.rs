//! Lead event data structures.

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::steps::StepStatus;

/// One reported step transition. Immutable once appended to a lead's log.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StatusLogEntry {
    pub step: String,
    pub status: StepStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub timestamp: DateTime<Utc>,
}

/// Input for [`EventStore::add_status_update`](super::EventStore::add_status_update).
#[derive(Debug, Clone)]
pub struct NewStatusUpdate {
    pub step: String,
    pub status: StepStatus,
    pub message: Option<String>,
    /// Defaults to the time of insertion.
    pub timestamp: Option<DateTime<Utc>>,
}

impl NewStatusUpdate {
    pub fn new(step: impl Into<String>, status: StepStatus) -> Self {
        Self {
            step: step.into(),
            status,
            message: None,
            timestamp: None,
        }
    }

    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = Some(message.into());
        self
    }
}

/// Read projection of everything known about one lead.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Snapshot {
    /// Latest status per step (last write wins).
    pub statuses: HashMap<String, StepStatus>,
    /// Every update in arrival order.
    pub status_log: Vec<StatusLogEntry>,
    pub dashboard_data: Option<Value>,
    /// When `dashboard_data` was last written.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub dashboard_updated_at: Option<DateTime<Utc>>,
}

impl Snapshot {
    pub fn is_empty(&self) -> bool {
        self.status_log.is_empty() && self.dashboard_data.is_none()
    }
}

/// Payload pushed to stream subscribers.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "kebab-case")]
pub enum RelayEvent {
    #[serde(rename_all = "camelCase")]
    StatusUpdate {
        lead_id: String,
        step: String,
        status: StepStatus,
        #[serde(skip_serializing_if = "Option::is_none")]
        message: Option<String>,
        timestamp: DateTime<Utc>,
    },
    #[serde(rename_all = "camelCase")]
    DashboardUpdate {
        lead_id: String,
        data: Value,
        timestamp: DateTime<Utc>,
    },
}

impl RelayEvent {
    pub fn status_update(lead_id: &str, entry: &StatusLogEntry) -> Self {
        RelayEvent::StatusUpdate {
            lead_id: lead_id.to_string(),
            step: entry.step.clone(),
            status: entry.status,
            message: entry.message.clone(),
            timestamp: entry.timestamp,
        }
    }

    pub fn lead_id(&self) -> &str {
        match self {
            RelayEvent::StatusUpdate { lead_id, .. } => lead_id,
            RelayEvent::DashboardUpdate { lead_id, .. } => lead_id,
        }
    }

    /// Wire name of the event, as carried in the `type` field.
    pub fn kind(&self) -> &'static str {
        match self {
            RelayEvent::StatusUpdate { .. } => "status-update",
            RelayEvent::DashboardUpdate { .. } => "dashboard-update",
        }
    }

    /// Events that reproduce `snapshot` for a subscriber that joined late:
    /// every log entry in order, then the dashboard payload if any.
    pub fn replay(lead_id: &str, snapshot: &Snapshot) -> Vec<RelayEvent> {
        let mut events: Vec<RelayEvent> = snapshot
            .status_log
            .iter()
            .map(|entry| RelayEvent::status_update(lead_id, entry))
            .collect();
        if let Some(data) = &snapshot.dashboard_data {
            events.push(RelayEvent::DashboardUpdate {
                lead_id: lead_id.to_string(),
                data: data.clone(),
                timestamp: snapshot.dashboard_updated_at.unwrap_or_else(Utc::now),
            });
        }
        events
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;
    use serde_json::json;

    #[test]
    fn test_status_update_wire_format() {
        let entry = StatusLogEntry {
            step: "ai-qualification".to_string(),
            status: StepStatus::Complete,
            message: None,
            timestamp: Utc::now(),
        };
        let value = serde_json::to_value(RelayEvent::status_update("lead-1", &entry)).unwrap();
        assert_eq!(value["type"], "status-update");
        assert_eq!(value["leadId"], "lead-1");
        assert_eq!(value["step"], "ai-qualification");
        assert_eq!(value["status"], "complete");
        assert!(value.get("message").is_none());
    }

    #[test]
    fn test_replay_orders_log_before_dashboard() {
        let snapshot = Snapshot {
            statuses: HashMap::new(),
            status_log: vec![
                StatusLogEntry {
                    step: "form-submission".to_string(),
                    status: StepStatus::Complete,
                    message: None,
                    timestamp: Utc::now(),
                },
                StatusLogEntry {
                    step: "ai-qualification".to_string(),
                    status: StepStatus::Processing,
                    message: Some("scoring".to_string()),
                    timestamp: Utc::now(),
                },
            ],
            dashboard_data: Some(json!({"score": 87})),
            dashboard_updated_at: None,
        };

        let events = RelayEvent::replay("lead-1", &snapshot);
        let kinds: Vec<_> = events.iter().map(|e| e.kind()).collect();
        assert_eq!(kinds, vec!["status-update", "status-update", "dashboard-update"]);
    }

    #[test]
    fn test_replayed_dashboard_keeps_its_stored_timestamp() {
        let stored_at = Utc.with_ymd_and_hms(2024, 5, 2, 9, 30, 0).unwrap();
        let snapshot = Snapshot {
            dashboard_data: Some(json!({"score": 87})),
            dashboard_updated_at: Some(stored_at),
            ..Default::default()
        };

        let events = RelayEvent::replay("lead-1", &snapshot);
        match &events[..] {
            [RelayEvent::DashboardUpdate { timestamp, .. }] => assert_eq!(*timestamp, stored_at),
            other => panic!("unexpected replay: {:?}", other),
        }
    }
}
