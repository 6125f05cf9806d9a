/// Structured logging with tracing
///
/// CLI and server modes log to stderr. The TUI owns the terminal, so in that
/// mode events go to a log file through a non-blocking appender.

use anyhow::{bail, Context, Result};
use std::path::{Path, PathBuf};
use tracing::Level;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter, Registry};

use crate::utils::app_config::LoggingConfig;
use crate::utils::LOG_ENV_VAR;

/// Where log events are written
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LogTarget {
    Stderr,
    File(PathBuf),
}

/// Initialize the global subscriber.
///
/// The returned guard flushes the file writer on drop and must be held for
/// the lifetime of the program.
pub fn init_logging(config: &LoggingConfig, target: LogTarget) -> Result<Option<WorkerGuard>> {
    parse_log_level(&config.level)?;
    let filter = EnvFilter::try_from_env(LOG_ENV_VAR)
        .unwrap_or_else(|_| EnvFilter::new(&config.level));

    match target {
        LogTarget::Stderr => {
            let layer = fmt::layer()
                .with_writer(std::io::stderr)
                .with_target(true);
            Registry::default()
                .with(filter)
                .with(layer)
                .try_init()
                .context("Failed to initialize logging")?;
            Ok(None)
        }
        LogTarget::File(path) => {
            let (dir, file_name) = split_log_path(&path);
            std::fs::create_dir_all(&dir)
                .with_context(|| format!("Failed to create log directory {}", dir.display()))?;

            let appender = tracing_appender::rolling::never(&dir, file_name);
            let (writer, guard) = tracing_appender::non_blocking(appender);
            let layer = fmt::layer()
                .with_writer(writer)
                .with_ansi(false)
                .with_target(true)
                .with_thread_names(true);
            Registry::default()
                .with(filter)
                .with(layer)
                .try_init()
                .context("Failed to initialize logging")?;
            Ok(Some(guard))
        }
    }
}

/// Parse log level string to tracing Level
pub fn parse_log_level(level: &str) -> Result<Level> {
    match level.to_lowercase().as_str() {
        "trace" => Ok(Level::TRACE),
        "debug" => Ok(Level::DEBUG),
        "info" => Ok(Level::INFO),
        "warn" | "warning" => Ok(Level::WARN),
        "error" => Ok(Level::ERROR),
        _ => bail!(
            "Invalid log level: {}. Use trace, debug, info, warn, or error",
            level
        ),
    }
}

fn split_log_path(path: &Path) -> (PathBuf, PathBuf) {
    let dir = path
        .parent()
        .filter(|p| !p.as_os_str().is_empty())
        .map(Path::to_path_buf)
        .unwrap_or_else(|| PathBuf::from("."));
    let file = path
        .file_name()
        .map(PathBuf::from)
        .unwrap_or_else(|| PathBuf::from("gamma.log"));
    (dir, file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_log_level() {
        assert_eq!(parse_log_level("DEBUG").unwrap(), Level::DEBUG);
        assert_eq!(parse_log_level("warning").unwrap(), Level::WARN);
        assert!(parse_log_level("loud").is_err());
    }

    #[test]
    fn test_split_log_path() {
        let (dir, file) = split_log_path(Path::new("/var/log/gamma/gamma.log"));
        assert_eq!(dir, PathBuf::from("/var/log/gamma"));
        assert_eq!(file, PathBuf::from("gamma.log"));

        let (dir, file) = split_log_path(Path::new("debug.log"));
        assert_eq!(dir, PathBuf::from("."));
        assert_eq!(file, PathBuf::from("debug.log"));
    }
}
