//! Console and daily-rotated file logging.

use std::path::Path;

use opsdesk_core::settings::LogLevel;
use tracing_appender::non_blocking::WorkerGuard;
use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::EnvFilter;

/// Overrides the `log_level` setting when set.
pub const LOG_ENV: &str = "OPSDESK_LOG";
const LOG_FILE_PREFIX: &str = "opsdesk";

/// Must be held for the lifetime of the process; dropping it flushes pending
/// file output.
pub struct LoggingGuard {
    _worker_guard: Option<WorkerGuard>,
}

/// Logs to stderr (warnings and above) and to `<log_dir>/opsdesk.<date>.log`.
/// Falls back to stderr only when the log directory cannot be used.
pub fn init_logging(log_dir: &Path, level: LogLevel) -> LoggingGuard {
    match init_file_logging(log_dir, level) {
        Ok(guard) => LoggingGuard {
            _worker_guard: Some(guard),
        },
        Err(error) => {
            eprintln!("warning: file logging unavailable ({error}); logging to console only");
            init_console_logging(level);
            LoggingGuard {
                _worker_guard: None,
            }
        }
    }
}

fn init_console_logging(level: LogLevel) {
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(build_env_filter(level))
        .with_target(false)
        .init();
}

fn init_file_logging(
    log_dir: &Path,
    level: LogLevel,
) -> Result<WorkerGuard, Box<dyn std::error::Error>> {
    std::fs::create_dir_all(log_dir)?;

    let file_appender = RollingFileAppender::builder()
        .rotation(Rotation::DAILY)
        .filename_prefix(LOG_FILE_PREFIX)
        .filename_suffix("log")
        .build(log_dir)?;
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console = std::io::stderr.with_max_level(tracing::Level::WARN);
    tracing_subscriber::fmt()
        .with_writer(console.and(non_blocking))
        .with_env_filter(build_env_filter(level))
        .with_ansi(false)
        .with_target(true)
        .try_init()
        .map_err(|error| error.to_string())?;

    Ok(guard)
}

/// Priority: `OPSDESK_LOG`, then `RUST_LOG`, then the configured level.
fn build_env_filter(level: LogLevel) -> EnvFilter {
    EnvFilter::try_from_env(LOG_ENV)
        .or_else(|_| EnvFilter::try_from_env("RUST_LOG"))
        .unwrap_or_else(|_| EnvFilter::new(default_directive(level)))
}

fn default_directive(level: LogLevel) -> String {
    format!("{},russh=warn,mysql_async=warn", level.as_filter())
}
