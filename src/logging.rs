//! Tracing subscriber setup for the binaries

use std::io;
use std::path::Path;
use tracing::{debug, info};
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// Filter used when `RUST_LOG` is unset
pub const DEFAULT_FILTER: &str = "wayfare=info";

fn env_filter(default: &str) -> EnvFilter {
    EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(default))
}

/// Human-readable logs on stderr, leaving stdout for command output
pub fn init_stderr() -> anyhow::Result<()> {
    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(io::stderr)
                .with_target(false),
        )
        .try_init()?;
    debug!("Stderr logging initialized");
    Ok(())
}

/// JSON logs in a daily rolling file under `dir`.
///
/// Used by the MCP server, whose stdout carries the protocol.
pub fn init_file(dir: impl AsRef<Path>, file_name: &str) -> anyhow::Result<()> {
    let dir = dir.as_ref();
    std::fs::create_dir_all(dir)?;
    let file_appender = tracing_appender::rolling::daily(dir, file_name);

    tracing_subscriber::registry()
        .with(env_filter(DEFAULT_FILTER))
        .with(
            tracing_subscriber::fmt::layer()
                .with_writer(file_appender)
                .with_ansi(false)
                .with_target(true)
                .with_thread_ids(true)
                .with_file(true)
                .with_line_number(true)
                .json(),
        )
        .try_init()?;

    info!(dir = %dir.display(), file = file_name, "Logging initialized");
    Ok(())
}
