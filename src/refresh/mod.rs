// src/refresh/mod.rs
pub mod controller;
pub mod scheduler;

pub use controller::{RefreshController, RefreshOutcome};
pub use scheduler::{spawn_refresh_scheduler, RefreshSchedulerCfg};
