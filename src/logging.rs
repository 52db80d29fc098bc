use std::fs;
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

/// Sets up tracing: human-readable console output plus a daily-rotated JSON
/// log file under `logs/`.
pub fn init_logging() {
    let _ = fs::create_dir_all("logs");

    let file_appender = tracing_appender::rolling::daily("logs", "menu-import.log");
    let (non_blocking_writer, _guard) = tracing_appender::non_blocking(file_appender);

    let file_layer = fmt::layer().json().with_writer(non_blocking_writer);
    let console_layer = fmt::layer().with_writer(std::io::stdout);

    tracing_subscriber::registry()
        .with(EnvFilter::from_default_env().add_directive("menu_import=info".parse().unwrap()))
        .with(file_layer)
        .with(console_layer)
        .init();

    // The writer guard must outlive main or buffered lines are lost
    std::mem::forget(_guard);
}
