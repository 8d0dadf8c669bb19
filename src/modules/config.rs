use std::fs;
use std::path::PathBuf;

use crate::error::{AppError, AppResult};
use crate::models::AppConfig;

const DATA_DIR: &str = ".portal_gateway";
const DATA_DIR_ENV: &str = "PORTAL_GATEWAY_DATA_DIR";
const CONFIG_FILE: &str = "gateway_config.json";

/// Get data directory path
pub fn get_data_dir() -> AppResult<PathBuf> {
    let data_dir = match std::env::var(DATA_DIR_ENV) {
        Ok(dir) if !dir.is_empty() => PathBuf::from(dir),
        _ => dirs::home_dir()
            .ok_or_else(|| AppError::Config("Failed to get user home directory".to_string()))?
            .join(DATA_DIR),
    };

    // Ensure directory exists
    if !data_dir.exists() {
        fs::create_dir_all(&data_dir)?;
    }

    Ok(data_dir)
}

/// Load gateway configuration, writing defaults on first run
pub fn load_app_config() -> AppResult<AppConfig> {
    let config_path = get_data_dir()?.join(CONFIG_FILE);

    let mut config = if config_path.exists() {
        let content = fs::read_to_string(&config_path)?;
        serde_json::from_str(&content)?
    } else {
        let config = AppConfig::default();
        if let Err(e) = save_app_config(&config) {
            tracing::warn!("Failed to write default config: {}", e);
        }
        config
    };

    apply_env_overrides(&mut config, |key| std::env::var(key).ok());
    validate(&config)?;
    Ok(config)
}

/// Save gateway configuration
pub fn save_app_config(config: &AppConfig) -> AppResult<()> {
    let config_path = get_data_dir()?.join(CONFIG_FILE);
    let content = serde_json::to_string_pretty(config)?;
    fs::write(&config_path, content)?;
    Ok(())
}

fn is_truthy(value: &str) -> bool {
    matches!(value, "1" | "true" | "yes" | "on")
}

/// Environment always wins over the file
pub fn apply_env_overrides<F>(config: &mut AppConfig, lookup: F)
where
    F: Fn(&str) -> Option<String>,
{
    let proxy = &mut config.proxy;

    if let Some(url) = lookup("PORTAL_GATEWAY_UPSTREAM") {
        proxy.upstream_base_url = url;
    }

    if let Some(port) = lookup("PORTAL_GATEWAY_PORT") {
        match port.parse::<u16>() {
            Ok(port) => proxy.port = port,
            Err(_) => tracing::warn!("Ignoring invalid PORTAL_GATEWAY_PORT: {}", port),
        }
    }

    if let Some(value) = lookup("PORTAL_GATEWAY_ALLOW_LAN") {
        if is_truthy(&value) {
            proxy.allow_lan_access = true;
        }
    }

    if let Some(addr) = lookup("PORTAL_GATEWAY_BIND") {
        if addr != "127.0.0.1" && addr != "localhost" {
            proxy.allow_lan_access = true;
        }
    }
}

fn validate(config: &AppConfig) -> AppResult<()> {
    let base = url::Url::parse(&config.proxy.upstream_base_url)?;
    if base.scheme() != "http" && base.scheme() != "https" {
        return Err(AppError::Config(format!(
            "Upstream base URL must be http(s): {}",
            config.proxy.upstream_base_url
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn env(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn test_env_overrides() {
        let mut config = AppConfig::default();
        apply_env_overrides(
            &mut config,
            env(&[
                ("PORTAL_GATEWAY_UPSTREAM", "https://api.example.com"),
                ("PORTAL_GATEWAY_PORT", "9100"),
                ("PORTAL_GATEWAY_BIND", "0.0.0.0"),
            ]),
        );
        assert_eq!(config.proxy.upstream_base_url, "https://api.example.com");
        assert_eq!(config.proxy.port, 9100);
        assert!(config.proxy.allow_lan_access);
    }

    #[test]
    fn test_bad_port_is_ignored() {
        let mut config = AppConfig::default();
        apply_env_overrides(&mut config, env(&[("PORTAL_GATEWAY_PORT", "http")]));
        assert_eq!(config.proxy.port, 8046);
        assert!(!config.proxy.allow_lan_access);
    }

    #[test]
    fn test_rejects_non_http_upstream() {
        let mut config = AppConfig::default();
        config.proxy.upstream_base_url = "ftp://files.example.com".to_string();
        assert!(matches!(validate(&config), Err(AppError::Config(_))));

        config.proxy.upstream_base_url = "not a url".to_string();
        assert!(matches!(validate(&config), Err(AppError::Url(_))));
    }
}
