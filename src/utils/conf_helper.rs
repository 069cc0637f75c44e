use anyhow::{anyhow, Context, Result};
use decay_core::IngestMode;
use std::sync::OnceLock;
use tokio::fs;
use tokio::net::TcpListener;
use tracing::info;

use crate::models::service_model::ServiceConfig;

static CONFIG_CACHE: OnceLock<ServiceConfig> = OnceLock::new();

const DEFAULT_CONFIG_PATH: &str = "service.json";
const CONFIG_PATH_ENV: &str = "DECAY_MONITOR_CONFIG";

pub async fn load_config() -> Result<ServiceConfig> {
    let file_path =
        std::env::var(CONFIG_PATH_ENV).unwrap_or_else(|_| DEFAULT_CONFIG_PATH.to_string());

    let data = fs::read_to_string(&file_path)
        .await
        .with_context(|| format!("failed to read config {file_path}"))?;

    let config: ServiceConfig = serde_json::from_str(&data)
        .with_context(|| format!("failed to parse config {file_path}"))?;

    // Fail at startup rather than on the first upload
    ingest_mode_of(&config)?;

    Ok(config)
}

/// Bind the listener, patch the real port into the config and cache it.
pub async fn bind_and_cache(mut config: ServiceConfig) -> Result<TcpListener> {
    let bind_addr = format!("{}:{}", config.connection.ip, config.connection.port);

    let listener = TcpListener::bind(&bind_addr)
        .await
        .with_context(|| format!("bind failed on {bind_addr}"))?;

    let actual_port = listener.local_addr().context("listener address")?.port();
    config.connection.port = actual_port;

    CONFIG_CACHE
        .set(config)
        .map_err(|_| anyhow!("config already initialized"))?;

    info!("Config initialized with port: {}", actual_port);

    Ok(listener)
}

pub fn get_cached_config() -> &'static ServiceConfig {
    CONFIG_CACHE.get().expect("Config not initialized")
}

pub fn ingest_mode_of(config: &ServiceConfig) -> Result<IngestMode> {
    IngestMode::from_name(&config.ingest.mode)
        .ok_or_else(|| anyhow!("unknown ingest mode {:?}", config.ingest.mode))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn config(mode: &str) -> ServiceConfig {
        serde_json::from_str(&format!(
            r#"{{
                "name": "test",
                "version": "0",
                "connection": {{ "ip": "127.0.0.1", "port": 0 }},
                "storage": {{ "data_dir": "d", "upload_dir": "u", "counter_file": "c" }},
                "ingest": {{ "mode": "{mode}" }}
            }}"#
        ))
        .unwrap()
    }

    #[test]
    fn test_ingest_mode_of() {
        assert_eq!(ingest_mode_of(&config("append")).unwrap(), IngestMode::Append);
        assert_eq!(ingest_mode_of(&config("REPLACE")).unwrap(), IngestMode::Replace);
        assert!(ingest_mode_of(&config("merge")).is_err());
    }

    #[test]
    fn test_defaults() {
        let config: ServiceConfig = serde_json::from_str(
            r#"{
                "name": "test",
                "version": "0",
                "connection": { "ip": "127.0.0.1", "port": 0 },
                "storage": { "data_dir": "d", "upload_dir": "u", "counter_file": "c" }
            }"#,
        )
        .unwrap();
        assert_eq!(config.ingest.mode, "append");
        assert_eq!(config.log_level, "info");
    }
}
