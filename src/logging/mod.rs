use anyhow::{Result, anyhow};
use tracing_subscriber::EnvFilter;

/// Maps a configured level name to a filter directive; unknown names are `info`.
pub fn level_directive(level: &str) -> &'static str {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => "trace",
        "debug" => "debug",
        "warn" | "warning" => "warn",
        "error" => "error",
        _ => "info",
    }
}

/// Installs the global JSON subscriber on stderr, leaving stdout to the sink.
/// `RUST_LOG` takes precedence over the configured level.
pub fn init(level: &str) -> Result<()> {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(level_directive(level)));
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(filter)
        .with_target(true)
        .with_writer(std::io::stderr)
        .try_init()
        .map_err(|err| anyhow!("initialise logging: {err}"))
}
