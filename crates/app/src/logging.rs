//! Logging setup

use tracing_subscriber::EnvFilter;

/// Initialise logging. The default level is `info`; `RUST_LOG` overrides
/// it per the usual env-filter syntax.
pub fn init() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .try_init();
}
