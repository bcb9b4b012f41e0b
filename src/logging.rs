//! Logging initialization and configuration.
//!
//! Log records go to stderr so they never interleave with forwarded
//! command stdout.

use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is not set.
const DEFAULT_FILTER: &str = "shell_capture=info";

fn default_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}

/// Initialize the logging system.
///
/// Uses the `RUST_LOG` environment variable for filtering. If not set,
/// defaults to `shell_capture=info`.
///
/// # Panics
///
/// Panics if called more than once, or if another tracing subscriber
/// has already been set.
pub fn init() {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .init();
}

/// Try to initialize the logging system.
///
/// Returns `Ok(())` if successful, or `Err` if logging has already been
/// initialized.
pub fn try_init() -> Result<(), tracing_subscriber::util::TryInitError> {
    tracing_subscriber::registry()
        .with(default_filter())
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}

/// Try to initialize logging with an explicit filter directive.
///
/// A bare level such as `debug` is scoped to this crate; anything else is
/// passed to [`EnvFilter`] as-is. Invalid directives fall back to the
/// default filter.
pub fn init_with_filter(directive: &str) -> Result<(), tracing_subscriber::util::TryInitError> {
    let directive = scoped_directive(directive);
    let filter = EnvFilter::try_new(&directive).unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER));

    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .compact()
                .with_writer(std::io::stderr),
        )
        .try_init()
}

fn scoped_directive(directive: &str) -> String {
    match directive.trim().to_ascii_lowercase().as_str() {
        level @ ("error" | "warn" | "info" | "debug" | "trace" | "off") => {
            format!("shell_capture={level}")
        }
        _ => directive.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_try_init_idempotent() {
        // First call may or may not succeed depending on test order
        let _ = try_init();
        // Either way, the second call must not panic
        let _ = try_init();
        let _ = init_with_filter("debug");
    }

    #[test]
    fn test_logging_works() {
        let _ = try_init();

        tracing::info!("test info message");
        tracing::debug!("test debug message");
        tracing::warn!("test warn message");
        tracing::error!("test error message");
    }

    #[test]
    fn test_scoped_directive() {
        assert_eq!(scoped_directive("debug"), "shell_capture=debug");
        assert_eq!(scoped_directive(" WARN "), "shell_capture=warn");
        assert_eq!(scoped_directive("tokio=trace"), "tokio=trace");
    }
}
