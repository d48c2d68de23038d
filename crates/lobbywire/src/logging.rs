//! Process-wide `tracing` setup.
//!
//! The host may already have a subscriber installed (a Rust game usually
//! does). In that case initialisation is skipped and lobbywire's events go
//! to the host's subscriber.

use std::sync::OnceLock;

use tracing_subscriber::{EnvFilter, fmt, prelude::*};

static LOGGING_INIT: OnceLock<()> = OnceLock::new();

/// Environment variable holding the filter directive.
pub const LOG_ENV: &str = "LOBBYWIRE_LOG";

/// Set to `json` for JSON output.
pub const LOG_FORMAT_ENV: &str = "LOBBYWIRE_LOG_FORMAT";

/// Installs the subscriber once for the process.
///
/// Filter comes from `LOBBYWIRE_LOG`, then `RUST_LOG`, then `info`.
pub fn init() {
    init_with(None);
}

/// Like [`init`], but `filter` (when given) wins over the environment.
pub fn init_with(filter: Option<&str>) {
    LOGGING_INIT.get_or_init(|| {
        let env_filter = build_filter(filter);
        let json = std::env::var(LOG_FORMAT_ENV)
            .map(|v| v.eq_ignore_ascii_case("json"))
            .unwrap_or(false);

        let result = if json {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().json())
                .try_init()
        } else {
            tracing_subscriber::registry()
                .with(env_filter)
                .with(fmt::layer().compact())
                .try_init()
        };

        if let Err(err) = result {
            eprintln!("lobbywire: tracing init skipped: {err}");
        }
    });
}

fn build_filter(explicit: Option<&str>) -> EnvFilter {
    explicit
        .and_then(|directive| EnvFilter::try_new(directive).ok())
        .or_else(|| EnvFilter::try_from_env(LOG_ENV).ok())
        .or_else(|| EnvFilter::try_from_default_env().ok())
        .unwrap_or_else(|| EnvFilter::new("info"))
}
