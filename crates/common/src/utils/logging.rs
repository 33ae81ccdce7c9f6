use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Default filter when `RUST_LOG` is unset: store lifecycle at info, crates below warn.
pub const DEFAULT_FILTER: &str = "warn,service=info,pet_shelter=info,shelter=info";

/// Initialize tracing subscriber with compact human-readable output.
/// - Respects `RUST_LOG` if set, otherwise [`DEFAULT_FILTER`]
/// - Writes to stderr so stdout stays free for command output
pub fn init_logging_default() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(false)
        .compact()
        .with_writer(io::stderr)
        .try_init();
}

/// Initialize tracing subscriber with JSON structured output.
/// - Respects `RUST_LOG` if set, otherwise [`DEFAULT_FILTER`]
/// - Emits one JSON object per event for machine parsing
pub fn init_logging_json() {
    let _ = fmt()
        .with_env_filter(env_filter())
        .with_target(true)
        .json()
        .with_writer(io::stderr)
        .try_init();
}

/// Pick the JSON or the compact subscriber.
pub fn init_logging(json: bool) {
    if json { init_logging_json() } else { init_logging_default() }
}

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_FILTER))
}
