// src/logging.rs
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

pub const ENV_LOG_JSON: &str = "FEED_LOG_JSON";
pub const DEFAULT_FILTER: &str = "activity_feed=info,refresh=info,display=info,scheduler=info,warn";

/// Install the global subscriber. Filter comes from `RUST_LOG`; the default
/// is [`DEFAULT_FILTER`] (crate plus the `refresh`, `display` and `scheduler`
/// targets at info, everything else at warn). `FEED_LOG_JSON=1` switches to JSON lines.
/// A second call is a no-op.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let json = std::env::var(ENV_LOG_JSON)
        .ok()
        .is_some_and(|v| v == "1");

    let res = if json {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_current_span(false).with_span_list(false))
            .try_init()
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().compact())
            .try_init()
    };

    if let Err(e) = res {
        tracing::debug!("tracing already initialized: {e}");
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn default_filter_covers_crate_targets() {
        assert!(EnvFilter::try_new(DEFAULT_FILTER).is_ok());
        for target in ["activity_feed=info", "refresh=info", "display=info", "scheduler=info"] {
            assert!(DEFAULT_FILTER.contains(target), "missing {target}");
        }
    }

    #[test]
    fn init_twice_does_not_panic() {
        init_tracing();
        init_tracing();
    }
}
