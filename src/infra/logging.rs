//! Structured logging setup shared by the binaries
//!
//! Level is configurable via the RUST_LOG env var (default: info).

use std::fs::OpenOptions;
use std::path::Path;
use tracing_subscriber::fmt::time::UtcTime;
use tracing_subscriber::EnvFilter;

fn env_filter() -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"))
}

/// Log to stderr, so stdout stays clean for rendered results
pub fn init_logging() {
    tracing_subscriber::fmt()
        .with_env_filter(env_filter())
        .with_timer(UtcTime::rfc_3339())
        .with_target(false)
        .with_writer(std::io::stderr)
        .init();
}

/// Log JSON lines to a file; used by the TUI, which owns the terminal
pub fn init_file_logging(path: &Path) -> std::io::Result<()> {
    let file = OpenOptions::new().create(true).append(true).open(path)?;
    tracing_subscriber::fmt()
        .json()
        .with_env_filter(env_filter())
        .with_timer(UtcTime::rfc_3339())
        .with_writer(std::sync::Mutex::new(file))
        .init();
    Ok(())
}
