//! Structured logging setup for EventShield services.
//!
//! Log level is taken from `RUST_LOG`; when unset the default directive
//! applies. Callers must never pass plaintext, private key components, MAC
//! keys, TOTP secrets or passwords as log fields.

use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Default filter directive when `RUST_LOG` is not set.
pub const DEFAULT_DIRECTIVE: &str = "info";

fn env_filter(default_directive: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_directive))
}

/// Install a human-readable subscriber.
///
/// # Example
/// ```no_run
/// use eventshield_core::logging;
///
/// logging::init();
/// tracing::info!("Key service started");
/// ```
pub fn init() {
    let _ = try_init(DEFAULT_DIRECTIVE);
}

/// Install a JSON subscriber for log aggregation.
///
/// # Example
/// ```no_run
/// use eventshield_core::logging;
///
/// logging::init_json();
/// tracing::info!(component = "keys", "Key service started");
/// ```
pub fn init_json() {
    let _ = try_init_json(DEFAULT_DIRECTIVE);
}

/// Install a human-readable subscriber, failing if one is already set.
pub fn try_init(default_directive: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt::layer().with_target(true).with_thread_ids(true))
        .try_init()
}

/// Install a JSON subscriber, failing if one is already set.
pub fn try_init_json(
    default_directive: &str,
) -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(env_filter(default_directive))
        .with(fmt::layer().json().with_target(true).with_thread_ids(true))
        .try_init()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_second_init_is_rejected() {
        // Only one global subscriber per process; whichever call wins, the
        // second must report an error instead of panicking.
        let first = try_init("debug");
        let second = try_init_json("debug");
        assert!(first.is_err() || second.is_err());
    }
}
