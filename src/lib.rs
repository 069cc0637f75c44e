// Voltage decay health pipeline
// Main library entry point

pub mod core;

// Re-export main types
pub use crate::core::aligner::{align, LinearInterpolant};
pub use crate::core::constants::{artifact_name, IngestMode};
pub use crate::core::detector::{annotate, detect};
pub use crate::core::error::{DecayError, Result};
pub use crate::core::features::derive;
pub use crate::core::format::{
    AlignmentResult, Annotation, CanonicalSeries, DegradationEvent, EventKind, FeaturePoint,
    FeatureSeries, IngestReceipt, MarkerSet, Metric, RawBatch, Sample,
};
pub use crate::core::ingest::{ArtifactSink, Ingestor, MemoryArtifacts, MemoryStore, SeriesStore};
pub use crate::core::merger::merge;
pub use crate::core::parser::{parse, parse_markers};
pub use crate::core::sequence::{MemorySequence, SequenceCounter};
