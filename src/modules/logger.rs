use crate::models::LoggingConfig;
use crate::modules::config::get_data_dir;
use std::fs;
use std::path::PathBuf;
use tracing::info;
use tracing_subscriber::{fmt, layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

pub fn get_log_dir() -> Result<PathBuf, String> {
    let data_dir = get_data_dir().map_err(|e| e.to_string())?;
    let log_dir = data_dir.join("logs");

    if !log_dir.exists() {
        fs::create_dir_all(&log_dir)
            .map_err(|e| format!("Failed to create log directory: {}", e))?;
    }

    Ok(log_dir)
}

/// Console-only logger for the current thread until `init_logger` runs, so
/// warnings raised while loading the config are not lost.
pub fn bootstrap_logger() -> tracing::subscriber::DefaultGuard {
    let subscriber = fmt()
        .with_target(false)
        .with_max_level(tracing::Level::INFO)
        .finish();
    tracing::subscriber::set_default(subscriber)
}

/// Initialize logger system
pub fn init_logger(config: &LoggingConfig) {
    // Capture log macro logs
    let _ = tracing_log::LogTracer::init();

    // Console output layer
    let console_layer = fmt::Layer::new()
        .with_target(false)
        .with_thread_ids(false)
        .with_level(true);

    // RUST_LOG first, then the configured directive
    let filter_layer = EnvFilter::try_from_default_env()
        .or_else(|_| EnvFilter::try_new(&config.filter))
        .unwrap_or_else(|_| EnvFilter::new("info"));

    let file_layer = if config.file {
        match get_log_dir() {
            Ok(log_dir) => {
                let file_appender = tracing_appender::rolling::daily(log_dir, "gateway.log");
                let (non_blocking, guard) = tracing_appender::non_blocking(file_appender);
                // Keep the writer alive until exit
                std::mem::forget(guard);
                Some(
                    fmt::Layer::new()
                        .with_writer(non_blocking)
                        .with_ansi(false)
                        .with_target(true)
                        .with_level(true),
                )
            }
            Err(e) => {
                eprintln!("Failed to initialize log directory: {}", e);
                None
            }
        }
    } else {
        None
    };

    // try_init: a second call (tests, embedding) must not panic
    let _ = tracing_subscriber::registry()
        .with(filter_layer)
        .with(console_layer)
        .with(file_layer)
        .try_init();

    info!("Logger system initialized");
}
