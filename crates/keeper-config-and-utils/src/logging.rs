//! Logging initialization for the session keeper.
//!
//! Human-readable compact output goes to stderr. When a log file is given,
//! every event is also appended there as one JSON object per line.

use crate::CoreResult;
use std::fs::OpenOptions;
use std::io;
use std::path::Path;
use std::sync::Mutex;
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::{EnvFilter, Layer};

/// Initialize the global tracing subscriber.
///
/// `RUST_LOG` takes precedence over `level` when set. Calling this more than
/// once is harmless; later calls leave the first subscriber in place.
///
/// # Example
///
/// ```ignore
/// init_logging("info", Some(&paths.log_file()))?;
/// tracing::info!("session keeper started");
/// ```
pub fn init_logging(level: &str, log_file: Option<&Path>) -> CoreResult<()> {
    let stderr_layer = tracing_subscriber::fmt::layer()
        .with_target(true)
        .with_file(false)
        .with_line_number(false)
        .compact()
        .with_writer(io::stderr)
        .with_filter(env_filter(level));

    let json_layer = match log_file {
        Some(path) => {
            if let Some(parent) = path.parent() {
                std::fs::create_dir_all(parent)?;
            }
            let file = OpenOptions::new().create(true).append(true).open(path)?;
            Some(
                tracing_subscriber::fmt::layer()
                    .json()
                    .with_current_span(false)
                    .with_writer(Mutex::new(file))
                    .with_filter(env_filter(level)),
            )
        }
        None => None,
    };

    let installed = tracing_subscriber::registry()
        .with(stderr_layer)
        .with(json_layer)
        .try_init()
        .is_ok();

    if installed {
        tracing::debug!(
            level = %parse_level(level),
            log_file = ?log_file.map(|p| p.display().to_string()),
            "logging initialized"
        );
    }

    Ok(())
}

fn env_filter(level: &str) -> EnvFilter {
    EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(parse_level(level).as_str().to_lowercase()))
}

/// Parse a log level string into a tracing Level.
pub fn parse_level(level: &str) -> tracing::Level {
    match level.to_lowercase().as_str() {
        "trace" => tracing::Level::TRACE,
        "debug" => tracing::Level::DEBUG,
        "info" => tracing::Level::INFO,
        "warn" | "warning" => tracing::Level::WARN,
        "error" => tracing::Level::ERROR,
        _ => tracing::Level::INFO,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parse_level_all_variants() {
        assert_eq!(parse_level("trace"), tracing::Level::TRACE);
        assert_eq!(parse_level("debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("info"), tracing::Level::INFO);
        assert_eq!(parse_level("warning"), tracing::Level::WARN);
        assert_eq!(parse_level("error"), tracing::Level::ERROR);
    }

    #[test]
    fn parse_level_case_insensitive() {
        assert_eq!(parse_level("Debug"), tracing::Level::DEBUG);
        assert_eq!(parse_level("WARN"), tracing::Level::WARN);
    }

    #[test]
    fn parse_level_unknown_defaults_to_info() {
        assert_eq!(parse_level(""), tracing::Level::INFO);
        assert_eq!(parse_level("verbose"), tracing::Level::INFO);
    }

    #[test]
    fn init_logging_creates_log_file() {
        let dir = tempfile::tempdir().unwrap();
        let log_file = dir.path().join("logs").join("keeper.jsonl");

        init_logging("debug", Some(&log_file)).unwrap();
        init_logging("debug", Some(&log_file)).unwrap();

        assert!(log_file.exists());
    }
}
