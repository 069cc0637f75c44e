// Data structures shared by the decay pipeline

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    #[serde(rename = "Time")]
    pub time: f64,
    #[serde(rename = "Voltage")]
    pub voltage: f64,
}

impl Sample {
    pub fn new(time: f64, voltage: f64) -> Self {
        Self { time, voltage }
    }

    /// Exact bit-level identity of the (time, voltage) pair.
    pub(crate) fn key(&self) -> (u64, u64) {
        (self.time.to_bits(), self.voltage.to_bits())
    }
}

/// Ordered (Time, Voltage) log of one device.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalSeries {
    pub samples: Vec<Sample>,
}

impl CanonicalSeries {
    pub fn new() -> Self {
        Self {
            samples: Vec::new(),
        }
    }

    pub fn with_capacity(cap: usize) -> Self {
        Self {
            samples: Vec::with_capacity(cap),
        }
    }

    pub fn from_pairs(times: &[f64], voltages: &[f64]) -> Self {
        Self {
            samples: times
                .iter()
                .zip(voltages.iter())
                .map(|(t, v)| Sample::new(*t, *v))
                .collect(),
        }
    }

    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    pub fn times(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.time).collect()
    }

    pub fn voltages(&self) -> Vec<f64> {
        self.samples.iter().map(|s| s.voltage).collect()
    }
}

impl From<Vec<Sample>> for CanonicalSeries {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

/// One uploaded batch, ordered within itself.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RawBatch {
    pub samples: Vec<Sample>,
}

impl RawBatch {
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }
}

impl From<CanonicalSeries> for RawBatch {
    fn from(series: CanonicalSeries) -> Self {
        Self {
            samples: series.samples,
        }
    }
}

impl From<Vec<Sample>> for RawBatch {
    fn from(samples: Vec<Sample>) -> Self {
        Self { samples }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FeaturePoint {
    pub time: f64,
    pub fd: f64,
    pub rul: f64,
    pub ph: f64,
    pub soh: f64,
}

/// Intermediate arrays of the FD computation, kept for plotting.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureTrace {
    pub dt: Vec<f64>,
    pub dv: Vec<f64>,
    pub cum_loss: Vec<f64>,
    pub fd_raw: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct FeatureSeries {
    pub points: Vec<FeaturePoint>,
    pub trace: FeatureTrace,
}

impl FeatureSeries {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn column(&self, metric: Metric) -> Vec<f64> {
        self.points.iter().map(|p| metric.value_of(p)).collect()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    Fd,
    Rul,
    Ph,
    Soh,
}

impl Metric {
    pub const ALL: [Metric; 4] = [Metric::Fd, Metric::Rul, Metric::Ph, Metric::Soh];

    pub fn value_of(&self, point: &FeaturePoint) -> f64 {
        match self {
            Metric::Fd => point.fd,
            Metric::Rul => point.rul,
            Metric::Ph => point.ph,
            Metric::Soh => point.soh,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum EventKind {
    Bd,
    Eol,
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DegradationEvent {
    pub kind: EventKind,
    pub index: usize,
    pub time: f64,
}

/// Pre-computed BD/EOL flag columns arriving alongside feature data.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MarkerSet {
    #[serde(default)]
    pub bd: Vec<f64>,
    #[serde(default)]
    pub eol: Vec<f64>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Annotation {
    pub bd: Option<DegradationEvent>,
    pub eol: Option<DegradationEvent>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct AlignmentResult {
    pub common_voltage_grid: Vec<f64>,
    pub time_difference: Vec<f64>,
    pub common_inverse_voltage_grid: Vec<f64>,
    pub time_difference_inverse: Vec<f64>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct MergeOutcome {
    pub series: CanonicalSeries,
    pub removed: usize,
}

#[derive(Debug, Clone, Serialize)]
pub struct IngestReceipt {
    pub device: String,
    pub batch_sequence_number: u64,
    pub duplicates_removed: usize,
    pub artifact_name: String,
    pub received_at: DateTime<Utc>,
    /// The batch after in-batch deduplication, as written to the artifact.
    #[serde(skip)]
    pub batch: CanonicalSeries,
    #[serde(skip)]
    pub series: CanonicalSeries,
    pub canonical_len: usize,
}
