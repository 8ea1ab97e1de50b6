//! Tracing setup for pool and cluster diagnostics.
//!
//! Pools log lifecycle transitions at `info`, per-resource activity at
//! `debug`, and swallowed callback failures (ping, destroy, create during a
//! fill) at `warn`. Every event carries a `pool` field.

use tracing_subscriber::EnvFilter;

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_FILTER: &str = "prometheus_resource_pool=info";

/// Install a fmt subscriber filtered by `RUST_LOG`, falling back to
/// [`DEFAULT_FILTER`]. Does nothing if a global subscriber is already set.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));
    install(filter);
}

/// Install a fmt subscriber with explicit filter directives such as
/// `"prometheus_resource_pool=debug"`. Does nothing if a global subscriber is
/// already set.
pub fn init_tracing_with(directives: &str) {
    install(EnvFilter::new(directives));
}

fn install(filter: EnvFilter) {
    if tracing::dispatcher::has_been_set() {
        return;
    }
    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_is_idempotent() {
        init_tracing_with("prometheus_resource_pool=debug");
        init_tracing();
        assert!(tracing::dispatcher::has_been_set());
    }
}
