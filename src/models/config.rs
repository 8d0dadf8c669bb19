use crate::proxy::ProxyConfig;
use serde::{Deserialize, Serialize};

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
pub struct AppConfig {
    #[serde(default)]
    pub proxy: ProxyConfig,
    #[serde(default)]
    pub logging: LoggingConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// EnvFilter directive, overridden by RUST_LOG
    #[serde(default = "default_filter")]
    pub filter: String,
    /// Write a daily-rolling file under <data_dir>/logs
    #[serde(default = "default_file_logging")]
    pub file: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            filter: default_filter(),
            file: default_file_logging(),
        }
    }
}

fn default_filter() -> String {
    "info".to_string()
}

fn default_file_logging() -> bool {
    true
}
