//! Tracing setup for the sip binary.
//!
//! Diagnostics go to stderr so the rendered reports on stdout stay
//! clean enough to pipe.

use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Filter variable consulted before the conventional `RUST_LOG`
const FILTER_ENV: &str = "SIP_LOG";

/// Initialize tracing with an `info` fallback filter
///
/// Override with `SIP_LOG` or `RUST_LOG`, e.g. `SIP_LOG=caff_core=debug`.
pub fn init() {
    init_with_level("info")
}

/// Initialize tracing with an explicit fallback filter
pub fn init_with_level(default_level: &str) {
    let filter = EnvFilter::try_from_env(FILTER_ENV)
        .or_else(|_| EnvFilter::try_from_default_env())
        .unwrap_or_else(|_| EnvFilter::new(default_level));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt::layer().compact().with_writer(std::io::stderr))
        .init();
}

/// Route captured logs into the test harness output
#[cfg(test)]
pub fn init_test() {
    let _ = tracing_subscriber::fmt()
        .with_test_writer()
        .with_env_filter(EnvFilter::new("debug"))
        .try_init();
}
