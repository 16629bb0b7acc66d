//! Process-wide `tracing` subscriber setup.

use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::{SubscriberInitExt, TryInitError};

/// Installs a formatted subscriber filtered by `RUST_LOG`, defaulting to
/// `info`.
///
/// Returns an error if a global subscriber is already installed, so tests
/// and embedders that set up their own can ignore it.
pub fn init_logging() -> Result<(), TryInitError> {
    init_logging_with("info")
}

/// Like [`init_logging`], with `default_filter` used when `RUST_LOG` is
/// unset or invalid.
pub fn init_logging_with(default_filter: &str) -> Result<(), TryInitError> {
    tracing_subscriber::registry()
        .with(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| default_filter.into()),
        )
        .with(tracing_subscriber::fmt::layer())
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_reports_an_error() {
        let _ = init_logging();
        assert!(init_logging_with("debug").is_err());
    }
}
