//! Bounded log of inbound webhook requests and the health figures derived from it.

use std::collections::{HashMap, VecDeque};
use std::sync::Mutex;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use uuid::Uuid;

/// Number of records retained when no capacity is configured.
pub const DEFAULT_CAPACITY: usize = 100;

const UNHEALTHY_ERROR_RATE: f64 = 0.5;
const DEGRADED_ERROR_RATE: f64 = 0.1;
const UNHEALTHY_AVG_MS: f64 = 5000.0;
const DEGRADED_AVG_MS: f64 = 2000.0;

/// Outcome of one webhook request, as captured by the handler.
#[derive(Debug, Clone, Default)]
pub struct NewWebhookLog {
    pub endpoint: String,
    pub lead_id: Option<String>,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
    pub processing_time_ms: u64,
    pub success: bool,
    pub error: Option<String>,
    pub error_stack: Option<String>,
    pub event_emitted: bool,
    pub response_status: u16,
    pub response_body: Option<Value>,
    pub user_agent: Option<String>,
    pub source_ip: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogRecord {
    pub id: String,
    pub timestamp: DateTime<Utc>,
    pub endpoint: String,
    pub lead_id: Option<String>,
    pub method: String,
    pub headers: HashMap<String, String>,
    pub body: Value,
    /// Milliseconds spent in the handler.
    pub processing_time: u64,
    pub success: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error_stack: Option<String>,
    pub event_emitted: bool,
    pub response_status: u16,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub response_body: Option<Value>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub user_agent: Option<String>,
    #[serde(rename = "sourceIP", skip_serializing_if = "Option::is_none")]
    pub source_ip: Option<String>,
}

/// Overall webhook health.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum HealthState {
    Healthy,
    Degraded,
    Unhealthy,
}

impl HealthState {
    pub fn as_str(&self) -> &'static str {
        match self {
            HealthState::Healthy => "healthy",
            HealthState::Degraded => "degraded",
            HealthState::Unhealthy => "unhealthy",
        }
    }
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct WebhookMetrics {
    pub total_requests: usize,
    pub successful_requests: usize,
    pub failed_requests: usize,
    /// Failed over total, 0.0 when the buffer is empty.
    pub error_rate: f64,
    /// Mean processing time in milliseconds.
    pub average_processing_time: f64,
    pub last_activity: Option<DateTime<Utc>>,
    pub uptime_seconds: i64,
}

#[derive(Debug, Clone, Serialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct ErrorSummary {
    pub error: String,
    pub count: usize,
    pub last_occurred: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WebhookLogExport {
    pub exported_at: DateTime<Utc>,
    pub status: HealthState,
    pub metrics: WebhookMetrics,
    pub error_summary: Vec<ErrorSummary>,
    pub logs: Vec<WebhookLogRecord>,
}

/// Most-recent-first ring of [`WebhookLogRecord`]s.
#[derive(Debug)]
pub struct WebhookLogger {
    capacity: usize,
    records: Mutex<VecDeque<WebhookLogRecord>>,
    started_at: DateTime<Utc>,
}

impl Default for WebhookLogger {
    fn default() -> Self {
        Self::new(DEFAULT_CAPACITY)
    }
}

impl WebhookLogger {
    pub fn new(capacity: usize) -> Self {
        Self {
            capacity: capacity.max(1),
            records: Mutex::new(VecDeque::with_capacity(capacity.max(1))),
            started_at: Utc::now(),
        }
    }

    fn records(&self) -> std::sync::MutexGuard<'_, VecDeque<WebhookLogRecord>> {
        self.records.lock().unwrap_or_else(|e| e.into_inner())
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Stores `entry` with a fresh id and timestamp, evicting the oldest
    /// records beyond capacity.
    pub fn record(&self, entry: NewWebhookLog) -> WebhookLogRecord {
        let record = WebhookLogRecord {
            id: Uuid::new_v4().to_string(),
            timestamp: Utc::now(),
            endpoint: entry.endpoint,
            lead_id: entry.lead_id,
            method: entry.method,
            headers: entry.headers,
            body: entry.body,
            processing_time: entry.processing_time_ms,
            success: entry.success,
            error: entry.error,
            error_stack: entry.error_stack,
            event_emitted: entry.event_emitted,
            response_status: entry.response_status,
            response_body: entry.response_body,
            user_agent: entry.user_agent,
            source_ip: entry.source_ip,
        };

        let mut records = self.records();
        records.push_front(record.clone());
        records.truncate(self.capacity);
        record
    }

    /// Up to `limit` records, newest first.
    pub fn recent(&self, limit: usize) -> Vec<WebhookLogRecord> {
        self.records().iter().take(limit).cloned().collect()
    }

    /// Every retained record for `lead_id`, newest first.
    pub fn for_lead(&self, lead_id: &str) -> Vec<WebhookLogRecord> {
        self.records()
            .iter()
            .filter(|r| r.lead_id.as_deref() == Some(lead_id))
            .cloned()
            .collect()
    }

    pub fn len(&self) -> usize {
        self.records().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records().is_empty()
    }

    pub fn metrics(&self) -> WebhookMetrics {
        let records = self.records();
        let total = records.len();
        let successful = records.iter().filter(|r| r.success).count();
        let failed = total - successful;
        let (error_rate, average) = if total == 0 {
            (0.0, 0.0)
        } else {
            let total_ms: u64 = records.iter().map(|r| r.processing_time).sum();
            (failed as f64 / total as f64, total_ms as f64 / total as f64)
        };

        WebhookMetrics {
            total_requests: total,
            successful_requests: successful,
            failed_requests: failed,
            error_rate,
            average_processing_time: average,
            last_activity: records.front().map(|r| r.timestamp),
            uptime_seconds: (Utc::now() - self.started_at).num_seconds(),
        }
    }

    pub fn health_status(&self) -> HealthState {
        classify(&self.metrics())
    }

    /// Failures grouped by message, most frequent first.
    pub fn error_summary(&self) -> Vec<ErrorSummary> {
        let records = self.records();
        let mut grouped: HashMap<&str, ErrorSummary> = HashMap::new();
        for record in records.iter().filter(|r| !r.success) {
            let message = record.error.as_deref().unwrap_or("Unknown error");
            grouped
                .entry(message)
                .and_modify(|summary| {
                    summary.count += 1;
                    if record.timestamp > summary.last_occurred {
                        summary.last_occurred = record.timestamp;
                    }
                })
                .or_insert_with(|| ErrorSummary {
                    error: message.to_string(),
                    count: 1,
                    last_occurred: record.timestamp,
                });
        }

        let mut summary: Vec<ErrorSummary> = grouped.into_values().collect();
        summary.sort_by(|a, b| {
            b.count
                .cmp(&a.count)
                .then_with(|| b.last_occurred.cmp(&a.last_occurred))
        });
        summary
    }

    pub fn export(&self) -> WebhookLogExport {
        let metrics = self.metrics();
        WebhookLogExport {
            exported_at: Utc::now(),
            status: classify(&metrics),
            metrics,
            error_summary: self.error_summary(),
            logs: self.recent(self.capacity),
        }
    }

    pub fn clear(&self) {
        self.records().clear();
    }
}

fn classify(metrics: &WebhookMetrics) -> HealthState {
    if metrics.total_requests == 0 {
        return HealthState::Healthy;
    }
    if metrics.error_rate > UNHEALTHY_ERROR_RATE
        || metrics.average_processing_time > UNHEALTHY_AVG_MS
    {
        HealthState::Unhealthy
    } else if metrics.error_rate > DEGRADED_ERROR_RATE
        || metrics.average_processing_time > DEGRADED_AVG_MS
    {
        HealthState::Degraded
    } else {
        HealthState::Healthy
    }
}
