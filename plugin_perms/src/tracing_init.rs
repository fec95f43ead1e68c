use std::fs::OpenOptions;
use std::path::PathBuf;

use tracing::Level;
use tracing::level_filters::LevelFilter;
use tracing_subscriber::Layer;
use tracing_subscriber::fmt::format::FmtSpan;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::prelude::*;

const LOG_ENV: &str = "PLUGIN_PERMS_LOG";

/// Log path: $PLUGIN_PERMS_LOG > ~/.plugin-perms/plugin-perms.log.
fn log_path() -> PathBuf {
    std::env::var_os(LOG_ENV)
        .map(PathBuf::from)
        .unwrap_or_else(|| {
            dirs::home_dir()
                .map(|home| home.join(".plugin-perms"))
                .unwrap_or_default()
                .join("plugin-perms.log")
        })
}

pub fn init_tracing(verbose: bool) {
    let log_path = log_path();

    let log_file = log_path
        .parent()
        .and_then(|parent| {
            if parent.as_os_str().is_empty() {
                Some(())
            } else {
                std::fs::create_dir_all(parent).ok()
            }
        })
        .and_then(|_| {
            OpenOptions::new()
                .create(true)
                .append(true)
                .open(&log_path)
                .ok()
        });

    let file_layer = log_file.map(|file| {
        tracing_subscriber::fmt::layer()
            .with_writer(file)
            .with_ansi(false)
            .with_span_events(FmtSpan::CLOSE)
            .with_filter(LevelFilter::from_level(Level::DEBUG))
    });

    // Stderr carries warnings when there is no log file, everything with --verbose.
    let stderr_level = match (verbose, file_layer.is_some()) {
        (true, _) => Some(Level::DEBUG),
        (false, false) => Some(Level::WARN),
        (false, true) => None,
    };
    let stderr_layer = stderr_level.map(|level| {
        tracing_subscriber::fmt::layer()
            .with_writer(std::io::stderr)
            .with_ansi(false)
            .with_filter(LevelFilter::from_level(level))
    });

    tracing_subscriber::registry()
        .with(file_layer)
        .with(stderr_layer)
        .init()
}
