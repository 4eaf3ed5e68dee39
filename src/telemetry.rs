//! Telemetry logic.
//! Support logging and metrics descriptions.
use metrics::{Unit, describe_counter};
use tracing_subscriber::EnvFilter;

const DEFAULT_FILTER: &str = "info";

/// Install a `fmt` subscriber filtered by `RUST_LOG`, `info` by default.
///
/// Does nothing if a global subscriber is already set.
pub fn setup_logging() {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(false)
        .try_init();
}

/// Describe metrics emitted by the crate to the installed recorder.
pub fn describe_metrics() {
    describe_counter!(
        "accounts_created_total",
        Unit::Count,
        "Accounts created, labelled by kind (regular, provisioned or privileged)."
    );
    describe_counter!(
        "authentication_attempts_total",
        Unit::Count,
        "Authentication attempts, labelled by outcome."
    );
    describe_counter!(
        "account_flags_changed_total",
        Unit::Count,
        "Status or privilege flag changes, labelled by flag."
    );
}
