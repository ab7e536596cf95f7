//! Log subscriber setup

use anyhow::Context;
use iconc_core::config::LoggingConfig;
use std::fs::File;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Layer};

/// Install the console and file layers, each with its own level
///
/// `RUST_LOG` overrides the configured levels of both.
pub(crate) fn init(logging: &LoggingConfig, log_file: Option<&Path>) -> anyhow::Result<()> {
    let console = if logging.console {
        Some(
            fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(false)
                .with_filter(layer_filter(logging.console_level())?),
        )
    } else {
        None
    };

    let file = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("failed to create log directory '{}'", parent.display()))?;
            }
            let file = File::create(path).with_context(|| format!("failed to create log file '{}'", path.display()))?;
            Some(
                fmt::layer()
                    .with_ansi(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(layer_filter(logging.file_level())?),
            )
        }
        None => None,
    };

    tracing_subscriber::registry()
        .with(console)
        .with(file)
        .try_init()
        .context("failed to install log subscriber")
}

fn layer_filter(level: &str) -> anyhow::Result<EnvFilter> {
    EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(level))
        .with_context(|| format!("invalid log level '{level}'"))
}
