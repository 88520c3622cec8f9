//! Tracing subscriber setup for test harnesses embedding this crate.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

const DEFAULT_FILTER: &str = "knuu=info";

/// Install a global fmt subscriber filtered by `RUST_LOG`.
///
/// Falls back to `knuu=info` when `RUST_LOG` is unset. Returns `false` if a
/// global subscriber was already installed.
pub fn init(json: bool) -> bool {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    let registry = tracing_subscriber::registry().with(filter);
    if json {
        registry.with(fmt::layer().json()).try_init().is_ok()
    } else {
        registry.with(fmt::layer()).try_init().is_ok()
    }
}
