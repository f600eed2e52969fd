//! Logging setup for hosts that drive provider plugins.
//!
//! Every provider call emits `tracing` events: an `executing` event when the
//! call starts, a `success` or `failed` event when it ends, each labelled
//! `Provider[<pkg>].<Method>(<urn>)`. Output forwarded from plugin processes
//! is logged at `debug` under the plugin's prefix.
//!
//! Logs go to **stderr**, leaving stdout to the host program.
//!
//! # Environment Variables
//!
//! - `RUST_LOG`: Controls log levels (e.g., `info`, `resource_provider_client=debug`)
//!
//! ```bash
//! # Trace every provider call and the plugins' own output
//! RUST_LOG=resource_provider_client=debug ./engine
//!
//! # Only the classification of failed RPCs
//! RUST_LOG=resource_provider_client::status=trace ./engine
//! ```

use tracing_subscriber::{fmt, prelude::*, registry::LookupSpan, EnvFilter, Layer};

fn fmt_layer<S>() -> impl Layer<S>
where
    S: tracing::Subscriber + for<'a> LookupSpan<'a>,
{
    fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_file(false)
        .with_line_number(false)
}

fn env_filter(default_level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default_level))
}

/// Initialize the default logging subscriber.
///
/// Respects `RUST_LOG`, defaulting to `info`.
///
/// # Panics
///
/// Panics if a global subscriber has already been set.
pub fn init_logging() {
    init_logging_with_default("info");
}

/// Initialize logging, using `default_level` when `RUST_LOG` is not set.
///
/// # Example
///
/// ```ignore
/// use resource_provider_client::init_logging_with_default;
///
/// fn main() {
///     init_logging_with_default("resource_provider_client=debug");
/// }
/// ```
pub fn init_logging_with_default(default_level: &str) {
    tracing_subscriber::registry()
        .with(env_filter(default_level))
        .with(fmt_layer())
        .init();
}

/// Try to initialize logging, returning false if a subscriber was already set.
pub fn try_init_logging() -> bool {
    tracing_subscriber::registry()
        .with(env_filter("info"))
        .with(fmt_layer())
        .try_init()
        .is_ok()
}
