// Constants shared by the ingestion and feature pipeline

use serde::{Deserialize, Serialize};

pub const TIME_COLUMN: &str = "Time";
pub const VOLTAGE_COLUMN: &str = "Voltage";
pub const BD_COLUMN: &str = "BD";
pub const EOL_COLUMN: &str = "EOL";

// Stands in for 0 V wherever an inverse voltage is taken
pub const ZERO_VOLTAGE_SUBSTITUTE: f64 = 0.01;

pub const ALIGNMENT_GRID_POINTS: usize = 500;

pub const SMOOTHING_WINDOW: usize = 3;

// Marker value meaning "not active"
pub const INACTIVE_MARKER: f64 = 0.0;

pub const ARTIFACT_PREFIX: &str = "voltageDecay_";
pub const ARTIFACT_EXTENSION: &str = "csv";

pub const CANONICAL_FILE_NAME: &str = "voltageData.csv";
pub const TIME_DIFFERENCES_FILE_NAME: &str = "timeDifferences.csv";
pub const TIME_DIFFERENCES_INV_FILE_NAME: &str = "timeDifferencesInv.csv";

/// How an incoming batch is folded into a device's canonical series.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IngestMode {
    /// Unique rows are appended to the growing canonical log.
    #[default]
    Append,
    /// The deduplicated batch replaces the canonical log entirely.
    Replace,
}

impl IngestMode {
    pub fn from_name(name: &str) -> Option<Self> {
        match name.trim().to_ascii_lowercase().as_str() {
            "append" => Some(IngestMode::Append),
            "replace" => Some(IngestMode::Replace),
            _ => None,
        }
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            IngestMode::Append => "append",
            IngestMode::Replace => "replace",
        }
    }
}

/// Name of the upload artifact for a batch sequence number.
pub fn artifact_name(sequence: u64) -> String {
    format!("{}{}.{}", ARTIFACT_PREFIX, sequence, ARTIFACT_EXTENSION)
}
