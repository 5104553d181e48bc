use std::fs;
use std::path::Path;

use anyhow::{Context, Result};
use tracing::level_filters::LevelFilter;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{filter::filter_fn, fmt, prelude::*};

const LOG_FILE: &str = "lobby_host.log";

/// Keeps the file writer alive; drop it last.
pub struct LogGuard {
    _file: Option<WorkerGuard>,
}

/// Console logging, plus a log file when `log_dir` is given.
pub fn init(log_dir: Option<&Path>, verbose: bool) -> Result<LogGuard> {
    #[cfg(debug_assertions)]
    let default_level = LevelFilter::INFO;

    #[cfg(not(debug_assertions))]
    let default_level = LevelFilter::WARN;

    let level = if verbose {
        LevelFilter::DEBUG
    } else {
        default_level
    };

    let (file_layer, guard) = match log_dir {
        Some(dir) => {
            fs::create_dir_all(dir)
                .with_context(|| format!("creating log directory {}", dir.display()))?;
            let file_appender = tracing_appender::rolling::never(dir, LOG_FILE);
            let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
            let layer = fmt::Layer::default()
                .with_target(true)
                .with_ansi(false)
                .with_writer(non_blocking)
                .with_filter(filter_fn(move |metadata| metadata.level() <= &level));
            (Some(layer), Some(guard))
        }
        None => (None, None),
    };

    let console_layer = fmt::Layer::default()
        .with_target(true)
        .with_filter(filter_fn(move |metadata| metadata.level() <= &level));

    tracing_subscriber::registry()
        .with(file_layer)
        .with(console_layer)
        .try_init()
        .context("installing tracing subscriber")?;

    Ok(LogGuard { _file: guard })
}
