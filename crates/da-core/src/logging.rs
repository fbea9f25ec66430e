//! Logging infrastructure

use std::fs::File;

use tracing::Level;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{Config, LogLevel};

/// Map a configured log level to a tracing level, `None` when logging is off
pub fn level_for(level: LogLevel) -> Option<Level> {
    match level {
        LogLevel::Off => None,
        LogLevel::Error => Some(Level::ERROR),
        LogLevel::Warn => Some(Level::WARN),
        LogLevel::Info => Some(Level::INFO),
        LogLevel::Debug => Some(Level::DEBUG),
        LogLevel::Trace => Some(Level::TRACE),
    }
}

/// Open the configured log file. A file that cannot be created is reported
/// on stderr and logging continues on the console only.
fn open_log_file(config: &Config) -> Option<File> {
    if !config.debug.log_to_file {
        return None;
    }
    match File::create(&config.debug.log_path) {
        Ok(file) => Some(file),
        Err(e) => {
            eprintln!(
                "Cannot open log file {}: {}",
                config.debug.log_path.display(),
                e
            );
            None
        }
    }
}

/// Initialize the logging system based on configuration
pub fn init(config: &Config) {
    let Some(level) = level_for(config.debug.log_level) else {
        return;
    };

    let console = fmt::layer()
        .with_target(true)
        .with_thread_ids(true)
        .with_file(true)
        .with_line_number(true);
    let file = open_log_file(config).map(|file| fmt::layer().with_writer(file).with_ansi(false));

    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(level.into()))
        .with(console)
        .with(file)
        .try_init();
}

/// Console-only logging at info level, for tests and quick starts
pub fn init_default() {
    let _ = tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive(Level::INFO.into()))
        .with(fmt::layer())
        .try_init();
}

/// Log an audio debug message
#[macro_export]
macro_rules! audio_debug {
    ($($arg:tt)*) => {
        tracing::debug!(target: "audio", $($arg)*)
    };
}
