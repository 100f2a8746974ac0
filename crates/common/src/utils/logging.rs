use std::io;
use tracing_subscriber::{fmt, EnvFilter};

/// Directives used when `RUST_LOG` is not set.
/// Request logging is opt-in; without it only warnings and errors are shown.
pub fn default_directives(enabled: bool) -> &'static str {
    if enabled {
        "info,tower_http=info,axum=info"
    } else {
        "warn"
    }
}

/// Initialize tracing subscriber with sensible defaults and stdout writer.
/// - Respects `RUST_LOG` if set
/// - Falls back to [`default_directives`]
/// - Compact text or JSON lines depending on `json`
pub fn init_logging(enabled: bool, json: bool) {
    let env_filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(default_directives(enabled)));
    let builder = fmt()
        .with_env_filter(env_filter)
        .with_target(false)
        .with_writer(io::stdout);
    let _ = if json {
        builder.json().try_init()
    } else {
        builder.compact().try_init()
    };
}

/// Compact text logs at `info`.
pub fn init_logging_default() {
    init_logging(true, false);
}
