//! Background housekeeping for in-memory state.

use std::sync::Arc;
use std::time::Duration;
use tokio::time::{interval, MissedTickBehavior};
use tracing::{debug, info};

use crate::main_lib::AppState;

/// Starts the task that evicts expired rate-limit entries once per window.
pub fn start_rate_limit_sweeper(state: Arc<AppState>) {
    let period = state.rate_limiter.window().max(Duration::from_secs(1));
    tokio::spawn(async move {
        info!("Rate limit sweeper started ({}s interval)", period.as_secs());

        let mut sweep_interval = interval(period);
        sweep_interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately; nothing to sweep yet.
        sweep_interval.tick().await;

        loop {
            sweep_interval.tick().await;
            let removed = state.rate_limiter.sweep();
            if removed > 0 {
                debug!(
                    "Rate limit sweep evicted {} addresses ({} tracked)",
                    removed,
                    state.rate_limiter.len()
                );
            }
        }
    });
}
