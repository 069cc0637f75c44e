use serde::{Deserialize, Serialize};
use std::path::PathBuf;

#[derive(Debug, Serialize, Deserialize)]
pub struct ServiceConfig {
    pub name: String,
    pub version: String,
    pub connection: Connection,
    pub storage: Storage,
    #[serde(default)]
    pub ingest: IngestSettings,
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Connection {
    pub ip: String,
    pub port: u16,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct Storage {
    pub data_dir: PathBuf,
    pub upload_dir: PathBuf,
    pub counter_file: PathBuf,
}

#[derive(Debug, Serialize, Deserialize)]
pub struct IngestSettings {
    pub mode: String, // "append" | "replace"
}

impl Default for IngestSettings {
    fn default() -> Self {
        Self {
            mode: "append".to_string(),
        }
    }
}

fn default_log_level() -> String {
    "info".to_string()
}
