//! Cache sweep loop.
//!
//! Drops expired hotspot and wind entries so idle keys do not hold memory
//! until their next read.

use std::sync::Arc;

use tokio::sync::broadcast;
use tokio::time::{interval, MissedTickBehavior};

use crate::state::AppState;

pub async fn run_cache_sweep_loop(state: Arc<AppState>, mut shutdown: broadcast::Receiver<()>) {
    let period = state.config().cache_sweep_interval();
    let max_entries = state.config().cache_max_entries;
    let mut ticker = interval(period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    tracing::info!(period_s = period.as_secs(), max_entries, "cache sweep loop started");

    loop {
        tokio::select! {
            _ = shutdown.recv() => {
                tracing::info!("Cache sweep loop shutting down");
                break;
            }
            _ = ticker.tick() => {
                let removed = state.cache().sweep(max_entries);
                if removed > 0 {
                    tracing::debug!(removed, remaining = state.cache().len(), "swept hotspot cache");
                }
                let removed = state.wind_cache().sweep(max_entries);
                if removed > 0 {
                    tracing::debug!(removed, remaining = state.wind_cache().len(), "swept wind cache");
                }
            }
        }
    }
}
