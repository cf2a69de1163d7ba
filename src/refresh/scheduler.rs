// src/refresh/scheduler.rs
use chrono::Utc;
use tokio::task::JoinHandle;

use crate::refresh::controller::{RefreshController, RefreshOutcome};

#[derive(Clone, Copy, Debug)]
pub struct RefreshSchedulerCfg {
    pub interval: std::time::Duration,
    pub stale_after: chrono::Duration,
}

/// Spawn a timer that asks the controller to refresh when the feed is stale.
/// Failures are logged; the next tick is the retry.
pub fn spawn_refresh_scheduler(ctl: RefreshController, cfg: RefreshSchedulerCfg) -> JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(cfg.interval);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            ticker.tick().await;
            match ctl.refresh_if_required(cfg.stale_after, Utc::now()).await {
                Ok(RefreshOutcome::Refreshed(snap)) => {
                    tracing::info!(target: "scheduler", events = snap.len(), "scheduled refresh tick");
                }
                Ok(RefreshOutcome::Fresh) => {
                    tracing::trace!(target: "scheduler", "feed still fresh");
                }
                Err(e) => {
                    tracing::warn!(target: "scheduler", error = %e, kind = e.kind(), "scheduled refresh failed");
                }
            }
        }
    })
}
