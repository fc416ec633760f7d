//! Per-lead snapshot cache.

use std::collections::HashMap;
use std::sync::RwLock;

use chrono::{DateTime, Utc};
use serde_json::Value;

use super::{NewStatusUpdate, Snapshot, StatusLogEntry};

/// In-memory map from lead id to its accumulated [`Snapshot`].
///
/// A stream that connects late replays this state before it receives live
/// events, so the store is the authoritative record of a demo session.
#[derive(Debug, Default)]
pub struct EventStore {
    leads: RwLock<HashMap<String, Snapshot>>,
}

impl EventStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `update` to the lead's log and overwrites that step's status.
    pub fn add_status_update(&self, lead_id: &str, update: NewStatusUpdate) -> Snapshot {
        self.add_status_update_with(lead_id, update, |_| ()).0
    }

    /// Same as [`add_status_update`](Self::add_status_update), running
    /// `publish` on the stored entry before the write lock is released.
    ///
    /// Concurrent updates for a lead therefore reach listeners in the same
    /// order as they appear in its log.
    pub fn add_status_update_with<R>(
        &self,
        lead_id: &str,
        update: NewStatusUpdate,
        publish: impl FnOnce(&StatusLogEntry) -> R,
    ) -> (Snapshot, R) {
        let entry = StatusLogEntry {
            step: update.step,
            status: update.status,
            message: update.message,
            timestamp: update.timestamp.unwrap_or_else(Utc::now),
        };

        let mut leads = self.leads.write().unwrap_or_else(|e| e.into_inner());
        let snapshot = leads.entry(lead_id.to_string()).or_default();
        snapshot.statuses.insert(entry.step.clone(), entry.status);
        let published = publish(&entry);
        snapshot.status_log.push(entry);
        (snapshot.clone(), published)
    }

    /// Replaces the lead's cached dashboard payload.
    pub fn set_dashboard_data(&self, lead_id: &str, payload: Value) -> Snapshot {
        self.set_dashboard_data_with(lead_id, payload, |_, _| ()).0
    }

    /// Same as [`set_dashboard_data`](Self::set_dashboard_data), running
    /// `publish` with the stored payload and its timestamp under the write lock.
    pub fn set_dashboard_data_with<R>(
        &self,
        lead_id: &str,
        payload: Value,
        publish: impl FnOnce(&Value, DateTime<Utc>) -> R,
    ) -> (Snapshot, R) {
        let updated_at = Utc::now();
        let mut leads = self.leads.write().unwrap_or_else(|e| e.into_inner());
        let snapshot = leads.entry(lead_id.to_string()).or_default();
        let published = publish(&payload, updated_at);
        snapshot.dashboard_data = Some(payload);
        snapshot.dashboard_updated_at = Some(updated_at);
        (snapshot.clone(), published)
    }

    /// Current state of a lead; unknown leads yield an empty snapshot.
    pub fn get_snapshot(&self, lead_id: &str) -> Snapshot {
        self.get_snapshot_with(lead_id, || ()).0
    }

    /// Reads the snapshot and runs `attach` while writers are held off.
    ///
    /// A listener subscribed inside `attach` sees every later update live and
    /// every earlier one in the snapshot, with no gap and no overlap.
    pub fn get_snapshot_with<R>(&self, lead_id: &str, attach: impl FnOnce() -> R) -> (Snapshot, R) {
        let leads = self.leads.read().unwrap_or_else(|e| e.into_inner());
        let attached = attach();
        (leads.get(lead_id).cloned().unwrap_or_default(), attached)
    }

    pub fn clear(&self, lead_id: &str) {
        let mut leads = self.leads.write().unwrap_or_else(|e| e.into_inner());
        leads.remove(lead_id);
    }

    /// Number of leads with any recorded state.
    pub fn lead_count(&self) -> usize {
        self.leads.read().unwrap_or_else(|e| e.into_inner()).len()
    }
}
