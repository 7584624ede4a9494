//! Structured Logger
//!
//! Wraps `tracing` to provide a console layer, an optional daily-rotated
//! NDJSON file layer and `RUST_LOG`-based level control.

use std::path::Path;

use tracing_appender::rolling::{RollingFileAppender, Rotation};
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

/// File name prefix; the appender adds a `.YYYY-MM-DD` suffix.
pub const LOG_FILE_PREFIX: &str = "livetalk.log";

/// Initialize the global logger. `RUST_LOG` wins over `level` when set.
///
/// With no `log_dir` only the console layer is installed. Calling this a
/// second time is a no-op.
pub fn init_logger(log_dir: Option<&Path>, level: &str) {
    let env_filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(level));

    let console_layer = fmt::layer()
        .with_writer(std::io::stdout)
        .with_target(false)
        .with_ansi(true);

    let file_layer = log_dir.map(|dir| {
        let appender = RollingFileAppender::new(Rotation::DAILY, dir, LOG_FILE_PREFIX);
        fmt::layer().json().with_writer(appender).with_ansi(false)
    });

    let _ = tracing_subscriber::registry()
        .with(env_filter)
        .with(console_layer)
        .with(file_layer)
        .try_init();
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn second_init_is_harmless() {
        let dir = tempfile::tempdir().unwrap();
        init_logger(Some(dir.path()), "debug");
        init_logger(None, "info");
        tracing::info!("logger initialized twice");
    }
}
