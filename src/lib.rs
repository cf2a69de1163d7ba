// src/lib.rs
// Public library surface for the binary and integration tests.

pub mod config;
pub mod display;
pub mod feed;
pub mod logging;
pub mod refresh;

// ---- Re-exports for stable public API ----
pub use crate::config::FeedConfig;
pub use crate::display::{DisplayMux, DisplayPort, LogDisplay, RecordingDisplay};
pub use crate::feed::{EventKind, EventRecord, FeedSnapshot, FeedSource, FetchError, TimeoutSource};
pub use crate::refresh::{spawn_refresh_scheduler, RefreshController, RefreshOutcome, RefreshSchedulerCfg};
