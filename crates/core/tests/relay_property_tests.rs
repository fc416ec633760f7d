//! Property-based tests for the in-memory bookkeeping: snapshot store, request
//! log, rate limiter and step aliases.

use proptest::prelude::*;
use std::collections::HashMap;
use std::time::{Duration, Instant};

use leadrelay_core::events::{EventStore, NewStatusUpdate};
use leadrelay_core::rate_limit::RateLimiter;
use leadrelay_core::steps::{StepAliases, StepStatus};
use leadrelay_core::webhook_log::{NewWebhookLog, WebhookLogger};

// =============================================================================
// Generators
// =============================================================================

fn arb_status() -> impl Strategy<Value = StepStatus> {
    prop_oneof![
        Just(StepStatus::Processing),
        Just(StepStatus::Complete),
        Just(StepStatus::Error),
    ]
}

fn arb_step() -> impl Strategy<Value = String> {
    prop_oneof![
        Just("form-submission".to_string()),
        Just("ai-qualification".to_string()),
        Just("crm-sync".to_string()),
        "[a-z]{3,10}",
    ]
}

fn arb_log_entry() -> impl Strategy<Value = NewWebhookLog> {
    ("[a-z0-9]{1,6}", any::<bool>(), 0u64..10_000).prop_map(|(lead, success, ms)| {
        NewWebhookLog {
            endpoint: format!("/webhook/status-update/{}", lead),
            lead_id: Some(lead),
            method: "POST".to_string(),
            success,
            error: (!success).then(|| "Missing required fields".to_string()),
            processing_time_ms: ms,
            response_status: if success { 200 } else { 400 },
            ..Default::default()
        }
    })
}

// =============================================================================
// Snapshot store
// =============================================================================

proptest! {
    /// The status map holds the last status written for each step, and the
    /// log holds every update in arrival order.
    #[test]
    fn prop_snapshot_is_last_write_wins_with_full_history(
        updates in prop::collection::vec((arb_step(), arb_status()), 1..40)
    ) {
        let store = EventStore::new();
        let mut expected: HashMap<String, StepStatus> = HashMap::new();

        for (step, status) in &updates {
            store.add_status_update("lead", NewStatusUpdate::new(step.clone(), *status));
            expected.insert(step.clone(), *status);
        }

        let snapshot = store.get_snapshot("lead");
        prop_assert_eq!(&snapshot.statuses, &expected);
        prop_assert_eq!(snapshot.status_log.len(), updates.len());
        for (entry, (step, status)) in snapshot.status_log.iter().zip(&updates) {
            prop_assert_eq!(&entry.step, step);
            prop_assert_eq!(entry.status, *status);
        }
        for pair in snapshot.status_log.windows(2) {
            prop_assert!(pair[0].timestamp <= pair[1].timestamp);
        }
    }

    /// Leads never see each other's updates.
    #[test]
    fn prop_leads_are_isolated(
        a in prop::collection::vec((arb_step(), arb_status()), 0..10),
        b in prop::collection::vec((arb_step(), arb_status()), 0..10),
    ) {
        let store = EventStore::new();
        for (step, status) in &a {
            store.add_status_update("a", NewStatusUpdate::new(step.clone(), *status));
        }
        for (step, status) in &b {
            store.add_status_update("b", NewStatusUpdate::new(step.clone(), *status));
        }
        prop_assert_eq!(store.get_snapshot("a").status_log.len(), a.len());
        prop_assert_eq!(store.get_snapshot("b").status_log.len(), b.len());
    }
}

// =============================================================================
// Request log
// =============================================================================

proptest! {
    /// The log never exceeds its capacity, keeps the newest records first and
    /// its metrics add up.
    #[test]
    fn prop_request_log_is_bounded_and_consistent(
        capacity in 1usize..20,
        entries in prop::collection::vec(arb_log_entry(), 0..60)
    ) {
        let logger = WebhookLogger::new(capacity);
        let mut ids = Vec::new();
        for entry in entries.clone() {
            ids.push(logger.record(entry).id);
        }

        prop_assert_eq!(logger.len(), entries.len().min(capacity));

        let recent = logger.recent(capacity);
        let newest: Vec<String> = ids.iter().rev().take(capacity).cloned().collect();
        let kept: Vec<String> = recent.iter().map(|r| r.id.clone()).collect();
        prop_assert_eq!(kept, newest);

        let metrics = logger.metrics();
        prop_assert_eq!(metrics.total_requests, logger.len());
        prop_assert_eq!(
            metrics.successful_requests + metrics.failed_requests,
            metrics.total_requests
        );
        prop_assert!((0.0..=1.0).contains(&metrics.error_rate));

        let summarized: usize = logger.error_summary().iter().map(|s| s.count).sum();
        prop_assert_eq!(summarized, metrics.failed_requests);
    }
}

// =============================================================================
// Rate limiter and aliases
// =============================================================================

proptest! {
    /// Inside one window each address gets exactly one request through.
    #[test]
    fn prop_one_request_per_address_per_window(
        addresses in prop::collection::vec("10\\.0\\.0\\.[0-9]{1,2}", 1..50)
    ) {
        let limiter = RateLimiter::new(Duration::from_secs(60));
        let now = Instant::now();
        let mut allowed: HashMap<String, usize> = HashMap::new();

        for address in &addresses {
            if limiter.allow_at(address, now) {
                *allowed.entry(address.clone()).or_default() += 1;
            }
        }

        for address in &addresses {
            prop_assert_eq!(allowed.get(address).copied(), Some(1));
        }
        prop_assert_eq!(limiter.len(), allowed.len());
        prop_assert_eq!(limiter.sweep_at(now + Duration::from_secs(61)), allowed.len());
        prop_assert!(limiter.is_empty());
    }

    /// Canonical ids are fixed points of the alias table.
    #[test]
    fn prop_canonicalize_is_idempotent(step in "[ ]{0,2}[A-Za-z_-]{1,24}[ ]{0,2}") {
        let aliases = StepAliases::default();
        let once = aliases.canonicalize(&step);
        prop_assert_eq!(aliases.canonicalize(&once), once.clone());
        prop_assert_eq!(once.trim(), once.as_str());
    }
}
