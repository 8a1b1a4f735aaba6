use crate::commands::LogFormat;
use std::env;
use tracing::info;
use tracing_subscriber::prelude::*;
use tracing_subscriber::{fmt, EnvFilter};

/// `level` takes precedence over `TRACING_LEVEL`. `format` only applies to
/// stdout; the log file is always plain text. Keep the returned guard alive
/// until exit so buffered file output is flushed.
pub fn init_logger(level: Option<&str>, format: LogFormat) -> impl Drop {
    let filter = level
        .map(str::to_string)
        .or_else(|| env::var("TRACING_LEVEL").ok())
        .unwrap_or_else(|| "info".to_string());
    let filter_layer = EnvFilter::new(filter);

    let log_file_path = env::var("LOG_FILE_PATH")
        .unwrap_or_else(|_| "./logs/series-cleanup.log".to_string());

    let file_appender = tracing_appender::rolling::never("./", log_file_path);
    let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);

    let console_layer = (format == LogFormat::Console).then(|| {
        fmt::layer()
            .with_writer(std::io::stdout)
            .pretty()
            .with_file(false)
            .without_time()
            .with_ansi(true)
    });
    let json_layer = (format == LogFormat::Json)
        .then(|| fmt::layer().json().with_writer(std::io::stdout));

    tracing_subscriber::registry()
        .with(console_layer)
        .with(json_layer)
        .with(fmt::layer().with_writer(non_blocking).with_ansi(false))
        .with(filter_layer)
        .init();

    info!(format = ?format, "Tracing is configured for stdout and file logging.");

    guard
}
