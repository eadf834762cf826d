//! Tracing subscriber setup
//!
//! `RUST_LOG` overrides [`DEFAULT_FILTER`] when set.

use tracing_subscriber::util::TryInitError;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter used when `RUST_LOG` is not set
pub const DEFAULT_FILTER: &str = "info,visitors_operator=debug,kube=info";

/// Build the env filter, falling back to [`DEFAULT_FILTER`]
pub fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Install the global subscriber
///
/// `json` switches from human-readable lines to one JSON object per event,
/// carrying the current span (app, namespace, tier) on every line.
pub fn init_tracing(json: bool) -> Result<(), TryInitError> {
    let registry = tracing_subscriber::registry().with(env_filter());
    if json {
        let fmt_layer = fmt::layer()
            .json()
            .with_current_span(true)
            .with_span_list(false)
            .with_target(true);
        registry.with(fmt_layer).try_init()
    } else {
        registry.with(fmt::layer()).try_init()
    }
}
