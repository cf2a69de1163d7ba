//! Activity feed watcher: binary entrypoint.
//! Fetches the configured events feed once, then keeps it fresh on a timer
//! and prints every new snapshot to stdout.

use std::sync::Arc;

use activity_feed::feed::providers::github::GithubEventsProvider;
use activity_feed::{
    logging, spawn_refresh_scheduler, DisplayMux, DisplayPort, FeedConfig, FeedSnapshot,
    LogDisplay, RefreshController, RefreshSchedulerCfg, TimeoutSource,
};
use anyhow::Context;
use chrono::Utc;

/// Plain stdout table, newest first.
struct ConsoleDisplay {
    max_rows: usize,
}

impl DisplayPort for ConsoleDisplay {
    fn display(&self, snapshot: &FeedSnapshot) {
        println!("--- {} events @ {} ---", snapshot.len(), Utc::now().format("%H:%M:%S"));
        for ev in snapshot.iter().take(self.max_rows) {
            println!("{:>20}  {}", ev.occurred_at.format("%Y-%m-%d %H:%M"), ev.summary());
        }
    }
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    // Load .env in local/dev; no-op when absent.
    let _ = dotenvy::dotenv();
    logging::init_tracing();

    let cfg = FeedConfig::load_default().context("loading feed config")?;
    tracing::info!(url = %cfg.url, stale_after_secs = cfg.stale_after_secs, "starting activity feed");

    // Client timeout plus an outer deadline a little past it.
    let provider = GithubEventsProvider::from_url(&cfg.url, &cfg.user_agent, cfg.fetch_timeout())
        .context("building feed http client")?;
    let source = TimeoutSource::new(
        provider,
        cfg.fetch_timeout().saturating_add(std::time::Duration::from_secs(1)),
    );

    let display = DisplayMux::new()
        .with(Arc::new(ConsoleDisplay { max_rows: 20 }))
        .with(Arc::new(LogDisplay::new(0)));

    let controller = RefreshController::new(Arc::new(source), Arc::new(display));

    if let Err(e) = controller.refresh_last_update(Utc::now()).await {
        tracing::warn!(error = %e, "initial refresh failed; scheduler will retry");
    }

    let handle = spawn_refresh_scheduler(
        controller.clone(),
        RefreshSchedulerCfg {
            interval: cfg.poll_interval(),
            stale_after: cfg.stale_after(),
        },
    );

    tokio::signal::ctrl_c().await.context("waiting for ctrl-c")?;
    handle.abort();
    tracing::info!(
        events = controller.current_snapshot().len(),
        last_success_at = ?controller.last_success_at(),
        "shutting down"
    );
    Ok(())
}
