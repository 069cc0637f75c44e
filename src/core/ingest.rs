// Serialized ingest: parse, merge, persist and number one upload

use std::collections::HashMap;
use std::sync::{Arc, Mutex, RwLock};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::core::constants::{artifact_name, IngestMode};
use crate::core::error::{DecayError, Result};
use crate::core::format::{CanonicalSeries, IngestReceipt, RawBatch};
use crate::core::merger::{dedup_batch, merge};
use crate::core::parser::parse;
use crate::core::sequence::SequenceCounter;

/// Where canonical series live between ingests.
pub trait SeriesStore: Send + Sync {
    /// Load the canonical series of `device`, empty when the device is new.
    fn load(&self, device: &str) -> Result<CanonicalSeries>;

    fn store(&self, device: &str, series: &CanonicalSeries) -> Result<()>;

    fn devices(&self) -> Result<Vec<String>>;
}

/// Destination of the per-batch `voltageDecay_<n>.csv` artifacts.
pub trait ArtifactSink: Send + Sync {
    fn write(&self, name: &str, batch: &CanonicalSeries) -> Result<()>;

    /// Remove an artifact whose ingest did not commit. Missing is not an error.
    fn discard(&self, name: &str) -> Result<()>;
}

#[derive(Debug, Default)]
pub struct MemoryStore {
    series: RwLock<HashMap<String, CanonicalSeries>>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self::default()
    }
}

impl SeriesStore for MemoryStore {
    fn load(&self, device: &str) -> Result<CanonicalSeries> {
        let series = self
            .series
            .read()
            .map_err(|_| DecayError::LockPoisoned("memory store"))?;
        Ok(series.get(device).cloned().unwrap_or_default())
    }

    fn store(&self, device: &str, series: &CanonicalSeries) -> Result<()> {
        self.series
            .write()
            .map_err(|_| DecayError::LockPoisoned("memory store"))?
            .insert(device.to_string(), series.clone());
        Ok(())
    }

    fn devices(&self) -> Result<Vec<String>> {
        let series = self
            .series
            .read()
            .map_err(|_| DecayError::LockPoisoned("memory store"))?;
        let mut devices: Vec<String> = series.keys().cloned().collect();
        devices.sort();
        Ok(devices)
    }
}

#[derive(Debug, Default)]
pub struct MemoryArtifacts {
    artifacts: RwLock<HashMap<String, CanonicalSeries>>,
}

impl MemoryArtifacts {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, name: &str) -> Result<Option<CanonicalSeries>> {
        let artifacts = self
            .artifacts
            .read()
            .map_err(|_| DecayError::LockPoisoned("memory artifacts"))?;
        Ok(artifacts.get(name).cloned())
    }

    pub fn names(&self) -> Result<Vec<String>> {
        let artifacts = self
            .artifacts
            .read()
            .map_err(|_| DecayError::LockPoisoned("memory artifacts"))?;
        let mut names: Vec<String> = artifacts.keys().cloned().collect();
        names.sort();
        Ok(names)
    }
}

impl ArtifactSink for MemoryArtifacts {
    fn write(&self, name: &str, batch: &CanonicalSeries) -> Result<()> {
        self.artifacts
            .write()
            .map_err(|_| DecayError::LockPoisoned("memory artifacts"))?
            .insert(name.to_string(), batch.clone());
        Ok(())
    }

    fn discard(&self, name: &str) -> Result<()> {
        self.artifacts
            .write()
            .map_err(|_| DecayError::LockPoisoned("memory artifacts"))?
            .remove(name);
        Ok(())
    }
}

/// Runs ingests one at a time against an injected store, counter and sink.
pub struct Ingestor {
    mode: IngestMode,
    store: Arc<dyn SeriesStore>,
    sequence: Arc<dyn SequenceCounter>,
    artifacts: Arc<dyn ArtifactSink>,
    write_lock: Mutex<()>,
}

impl Ingestor {
    pub fn new(
        mode: IngestMode,
        store: Arc<dyn SeriesStore>,
        sequence: Arc<dyn SequenceCounter>,
        artifacts: Arc<dyn ArtifactSink>,
    ) -> Self {
        Self {
            mode,
            store,
            sequence,
            artifacts,
            write_lock: Mutex::new(()),
        }
    }

    pub fn mode(&self) -> IngestMode {
        self.mode
    }

    pub fn store(&self) -> &Arc<dyn SeriesStore> {
        &self.store
    }

    /// Ingest one raw upload for `device`.
    ///
    /// The artifact is written under the next free number before anything
    /// is committed. The merged series and the counter are then committed
    /// together; if either step fails the series is restored and the
    /// artifact discarded, so a failed ingest leaves no trace and burns no
    /// number.
    pub fn ingest(&self, device: &str, raw: &[u8]) -> Result<IngestReceipt> {
        let batch = match parse(raw) {
            Ok(series) => RawBatch::from(series),
            Err(e) => {
                warn!("Rejected upload for {}: {}", device, e);
                return Err(e);
            }
        };

        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| DecayError::LockPoisoned("ingest"))?;

        let existing = self.store.load(device)?;
        let outcome = merge(&existing, &batch, self.mode);
        let artifact_batch = dedup_batch(&batch).series;

        // Only this thread advances the counter while the lock is held
        let sequence = self.sequence.current()? + 1;
        let artifact = artifact_name(sequence);
        self.artifacts.write(&artifact, &artifact_batch)?;

        if let Err(e) = self.commit(device, &existing, &outcome.series, sequence) {
            if let Err(discard) = self.artifacts.discard(&artifact) {
                error!("Could not discard {} after failed ingest: {}", artifact, discard);
            }
            return Err(e);
        }

        info!(
            "Ingested {} rows for {} as {} ({} duplicates removed, {} canonical rows)",
            batch.len(),
            device,
            artifact,
            outcome.removed,
            outcome.series.len()
        );

        Ok(IngestReceipt {
            device: device.to_string(),
            batch_sequence_number: sequence,
            duplicates_removed: outcome.removed,
            artifact_name: artifact,
            received_at: Utc::now(),
            batch: artifact_batch,
            canonical_len: outcome.series.len(),
            series: outcome.series,
        })
    }

    fn commit(
        &self,
        device: &str,
        existing: &CanonicalSeries,
        merged: &CanonicalSeries,
        sequence: u64,
    ) -> Result<()> {
        self.store.store(device, merged)?;

        let failure = match self.sequence.next() {
            Ok(issued) if issued == sequence => return Ok(()),
            Ok(issued) => DecayError::Sequence(format!(
                "counter issued {} while {} was reserved",
                issued, sequence
            )),
            Err(e) => e,
        };

        match self.store.store(device, existing) {
            Ok(()) => warn!(
                "Rolled back {} to {} rows after counter failure: {}",
                device,
                existing.len(),
                failure
            ),
            Err(e) => error!(
                "Counter failed and rollback of {} failed ({}); store holds {} rows: {}",
                device,
                e,
                merged.len(),
                failure
            ),
        }
        Err(failure)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::sequence::MemorySequence;
    use std::thread;

    fn ingestor(mode: IngestMode) -> Ingestor {
        with_parts(mode, Arc::new(MemorySequence::new()), Arc::new(MemoryArtifacts::new()))
    }

    fn with_parts(
        mode: IngestMode,
        sequence: Arc<dyn SequenceCounter>,
        artifacts: Arc<dyn ArtifactSink>,
    ) -> Ingestor {
        Ingestor::new(mode, Arc::new(MemoryStore::new()), sequence, artifacts)
    }

    // Reports 0 and never hands out a number
    struct StuckSequence;

    impl SequenceCounter for StuckSequence {
        fn next(&self) -> Result<u64> {
            Err(DecayError::Sequence("counter file is read-only".into()))
        }

        fn current(&self) -> Result<u64> {
            Ok(0)
        }
    }

    struct FullDisk;

    impl ArtifactSink for FullDisk {
        fn write(&self, _name: &str, _batch: &CanonicalSeries) -> Result<()> {
            Err(DecayError::Storage("no space left on device".into()))
        }

        fn discard(&self, _name: &str) -> Result<()> {
            Ok(())
        }
    }

    #[test]
    fn test_ingest_numbers_and_persists() {
        let ingestor = ingestor(IngestMode::Append);

        let first = ingestor
            .ingest("cap-01", b"Time,Voltage\n0,5.0\n1,5.0\n1,5.0\n2,4.0")
            .unwrap();
        assert_eq!(first.batch_sequence_number, 1);
        assert_eq!(first.artifact_name, "voltageDecay_1.csv");
        assert_eq!(first.duplicates_removed, 1);
        assert_eq!(first.canonical_len, 3);
        assert_eq!(first.batch.len(), 3);

        let second = ingestor.ingest("cap-01", b"Time,Voltage\n3,3.5\n4,3.0\n").unwrap();
        assert_eq!(second.batch_sequence_number, 2);
        assert_eq!(ingestor.store().load("cap-01").unwrap().len(), 5);
        assert_eq!(ingestor.store().devices().unwrap(), vec!["cap-01".to_string()]);
    }

    #[test]
    fn test_artifact_written_under_issued_number() {
        let artifacts = Arc::new(MemoryArtifacts::new());
        let ingestor = with_parts(
            IngestMode::Append,
            Arc::new(MemorySequence::new()),
            artifacts.clone(),
        );

        ingestor.ingest("cap", b"Time,Voltage\n0,5\n1,4\n").unwrap();
        let second = ingestor.ingest("cap", b"Time,Voltage\n0,5\n2,3\n2,3\n").unwrap();

        assert_eq!(
            artifacts.names().unwrap(),
            vec!["voltageDecay_1.csv".to_string(), "voltageDecay_2.csv".to_string()]
        );
        let stored = artifacts.get(&second.artifact_name).unwrap().unwrap();
        assert_eq!(stored, second.batch);
        assert_eq!(stored.times(), vec![0.0, 2.0]);
    }

    #[test]
    fn test_counter_failure_rolls_back_series_and_artifact() {
        let artifacts = Arc::new(MemoryArtifacts::new());
        let ingestor = with_parts(IngestMode::Append, Arc::new(StuckSequence), artifacts.clone());

        let err = ingestor.ingest("cap", b"Time,Voltage\n0,5\n1,4\n").unwrap_err();
        assert!(matches!(err, DecayError::Sequence(_)));
        assert!(!err.is_validation());

        assert!(ingestor.store().load("cap").unwrap().is_empty());
        assert!(artifacts.names().unwrap().is_empty());
    }

    #[test]
    fn test_artifact_failure_commits_nothing() {
        let sequence = Arc::new(MemorySequence::new());
        let ingestor = with_parts(IngestMode::Append, sequence.clone(), Arc::new(FullDisk));

        let err = ingestor.ingest("cap", b"Time,Voltage\n0,5\n").unwrap_err();
        assert!(matches!(err, DecayError::Storage(_)));

        assert!(ingestor.store().load("cap").unwrap().is_empty());
        assert_eq!(sequence.current().unwrap(), 0);
    }

    #[test]
    fn test_number_not_burned_by_failed_artifact() {
        let sequence = Arc::new(MemorySequence::new());
        let store: Arc<dyn SeriesStore> = Arc::new(MemoryStore::new());
        let failing = Ingestor::new(
            IngestMode::Append,
            store.clone(),
            sequence.clone(),
            Arc::new(FullDisk),
        );
        let working = Ingestor::new(
            IngestMode::Append,
            store,
            sequence,
            Arc::new(MemoryArtifacts::new()),
        );

        assert!(failing.ingest("cap", b"Time,Voltage\n0,5\n").is_err());
        let receipt = working.ingest("cap", b"Time,Voltage\n0,5\n").unwrap();
        assert_eq!(receipt.batch_sequence_number, 1);
        assert_eq!(receipt.canonical_len, 1);
    }

    #[test]
    fn test_reingest_is_idempotent() {
        let ingestor = ingestor(IngestMode::Append);
        let payload = b"Time,Voltage\n0,5\n1,4\n2,3\n3,2\n";

        ingestor.ingest("cap", payload).unwrap();
        let again = ingestor.ingest("cap", payload).unwrap();

        assert_eq!(again.duplicates_removed, 3);
        assert_eq!(again.canonical_len, 5);
        // The artifact still carries the full batch
        assert_eq!(again.batch.len(), 4);
    }

    #[test]
    fn test_replace_mode_overrides_series() {
        let ingestor = ingestor(IngestMode::Replace);
        ingestor.ingest("cap", b"Time,Voltage\n0,5\n1,4\n").unwrap();
        let receipt = ingestor.ingest("cap", b"Time,Voltage\n10,3\n").unwrap();
        assert_eq!(receipt.series.times(), vec![10.0]);
    }

    #[test]
    fn test_failed_parse_leaves_state_untouched() {
        let ingestor = ingestor(IngestMode::Append);
        ingestor.ingest("cap", b"Time,Voltage\n0,5\n").unwrap();

        let err = ingestor.ingest("cap", b"Time,Voltage\n1,oops\n").unwrap_err();
        assert!(err.is_validation());
        assert!(matches!(
            ingestor.ingest("cap", b"Time\n1\n"),
            Err(DecayError::Schema { .. })
        ));

        assert_eq!(ingestor.store().load("cap").unwrap().len(), 1);
        let next = ingestor.ingest("cap", b"Time,Voltage\n2,4\n").unwrap();
        assert_eq!(next.batch_sequence_number, 2);
    }

    #[test]
    fn test_concurrent_ingests_do_not_lose_updates() {
        let ingestor = Arc::new(ingestor(IngestMode::Append));
        let handles: Vec<_> = (0..8)
            .map(|i| {
                let ingestor = ingestor.clone();
                thread::spawn(move || {
                    let payload = format!("Time,Voltage\n{i},5\n{i}.5,4\n");
                    ingestor.ingest("shared", payload.as_bytes()).unwrap().batch_sequence_number
                })
            })
            .collect();

        let mut numbers: Vec<u64> = handles.into_iter().map(|h| h.join().unwrap()).collect();
        numbers.sort();
        assert_eq!(numbers, (1..=8).collect::<Vec<_>>());
        assert_eq!(ingestor.store().load("shared").unwrap().len(), 16);
    }
}
