//! Logging setup for the chart engine.

use chrono::Local;
use std::fs::OpenOptions;
use std::path::PathBuf;
use tracing::Level;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

use super::setting::SETTINGS;
use super::utility::get_folder_path;

/// Log level constants (compatible with Python logging module)
pub const DEBUG: i32 = 10;
pub const INFO: i32 = 20;
pub const WARNING: i32 = 30;
pub const ERROR: i32 = 40;
pub const CRITICAL: i32 = 50;

/// Convert integer log level to tracing Level
pub fn level_from_int(level: i32) -> Level {
    match level {
        i32::MIN..=10 => Level::DEBUG,
        11..=20 => Level::INFO,
        21..=30 => Level::WARN,
        _ => Level::ERROR,
    }
}

/// Initialize the global tracing subscriber from `log.*` settings.
///
/// Safe to call more than once; later calls are no-ops.
pub fn init_logger() {
    if !SETTINGS.get_bool("log.active").unwrap_or(true) {
        return;
    }

    let log_level = SETTINGS.get_int("log.level").unwrap_or(INFO as i64) as i32;
    let log_console = SETTINGS.get_bool("log.console").unwrap_or(true);
    let log_file = SETTINGS.get_bool("log.file").unwrap_or(false);

    let filter = EnvFilter::from_default_env().add_directive(level_from_int(log_level).into());

    let console_layer = log_console.then(|| {
        fmt::layer()
            .with_target(true)
            .with_thread_ids(false)
            .with_ansi(true)
    });

    let file_layer = if log_file {
        let log_path = get_log_file_path();
        match OpenOptions::new().create(true).append(true).open(&log_path) {
            Ok(file) => Some(
                fmt::layer()
                    .with_writer(std::sync::Mutex::new(file))
                    .with_ansi(false),
            ),
            Err(e) => {
                eprintln!("failed to open log file {}: {}", log_path.display(), e);
                None
            }
        }
    } else {
        None
    };

    let _ = tracing_subscriber::registry()
        .with(filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

/// Get the log file path for today
fn get_log_file_path() -> PathBuf {
    let log_folder = get_folder_path("log");
    let today = Local::now().format("%Y%m%d").to_string();
    log_folder.join(format!("chart_{}.log", today))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_from_int() {
        assert_eq!(level_from_int(DEBUG), Level::DEBUG);
        assert_eq!(level_from_int(INFO), Level::INFO);
        assert_eq!(level_from_int(WARNING), Level::WARN);
        assert_eq!(level_from_int(ERROR), Level::ERROR);
        assert_eq!(level_from_int(CRITICAL), Level::ERROR);
    }

    #[test]
    fn test_init_logger_twice() {
        init_logger();
        init_logger();
        tracing::info!("logger initialized");
    }
}
