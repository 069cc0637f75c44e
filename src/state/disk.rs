// Disk-backed canonical series store, upload artifacts and batch counter

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Mutex;

use decay_core::core::constants::CANONICAL_FILE_NAME;
use decay_core::core::export::series_to_csv;
use decay_core::{
    parse, ArtifactSink, CanonicalSeries, DecayError, Result, SequenceCounter, SeriesStore,
};
use tracing::{debug, info};

/// Device names become directory names.
pub fn valid_device_name(name: &str) -> bool {
    !name.is_empty()
        && name != "."
        && name != ".."
        && name
            .chars()
            .all(|c| c.is_ascii_alphanumeric() || matches!(c, '-' | '_' | '.'))
}

/// Write through a sibling temp file so readers never see a partial file.
fn write_atomic(path: &Path, contents: &[u8]) -> Result<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let tmp = path.with_extension("tmp");
    fs::write(&tmp, contents)?;
    fs::rename(&tmp, path)?;
    Ok(())
}

/// One `<root>/<device>/voltageData.csv` per device.
pub struct CsvDirectoryStore {
    root: PathBuf,
}

impl CsvDirectoryStore {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn device_dir(&self, device: &str) -> Result<PathBuf> {
        if !valid_device_name(device) {
            return Err(DecayError::Storage(format!("invalid device name {device:?}")));
        }
        Ok(self.root.join(device))
    }

    fn series_path(&self, device: &str) -> Result<PathBuf> {
        Ok(self.device_dir(device)?.join(CANONICAL_FILE_NAME))
    }
}

impl SeriesStore for CsvDirectoryStore {
    fn load(&self, device: &str) -> Result<CanonicalSeries> {
        let path = self.series_path(device)?;
        if !path.exists() {
            return Ok(CanonicalSeries::new());
        }

        let bytes = fs::read(&path)?;
        match parse(&bytes) {
            Ok(series) => Ok(series),
            Err(DecayError::EmptyPayload) => Ok(CanonicalSeries::new()),
            Err(e) => Err(DecayError::Storage(format!("{}: {}", path.display(), e))),
        }
    }

    fn store(&self, device: &str, series: &CanonicalSeries) -> Result<()> {
        let path = self.series_path(device)?;
        write_atomic(&path, &series_to_csv(series)?)?;
        debug!("Stored {} rows to {}", series.len(), path.display());
        Ok(())
    }

    fn devices(&self) -> Result<Vec<String>> {
        if !self.root.exists() {
            return Ok(Vec::new());
        }

        let mut devices = Vec::new();
        for entry in fs::read_dir(&self.root)? {
            let entry = entry?;
            if !entry.path().join(CANONICAL_FILE_NAME).is_file() {
                continue;
            }
            if let Some(name) = entry.file_name().to_str() {
                devices.push(name.to_string());
            }
        }
        devices.sort();
        Ok(devices)
    }
}

/// Flat directory of `voltageDecay_<n>.csv` batch artifacts.
pub struct UploadDirSink {
    root: PathBuf,
}

impl UploadDirSink {
    pub fn new<P: AsRef<Path>>(root: P) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }
}

impl ArtifactSink for UploadDirSink {
    fn write(&self, name: &str, batch: &CanonicalSeries) -> Result<()> {
        let path = self.root.join(name);
        write_atomic(&path, &series_to_csv(batch)?)?;
        info!("Saved upload artifact {}", path.display());
        Ok(())
    }

    fn discard(&self, name: &str) -> Result<()> {
        let path = self.root.join(name);
        match fs::remove_file(&path) {
            Ok(()) => {
                debug!("Discarded upload artifact {}", path.display());
                Ok(())
            }
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// Counter persisted as decimal text. A missing file reads as 0.
pub struct FileSequence {
    path: PathBuf,
    lock: Mutex<()>,
}

impl FileSequence {
    pub fn new<P: AsRef<Path>>(path: P) -> Self {
        Self {
            path: path.as_ref().to_path_buf(),
            lock: Mutex::new(()),
        }
    }

    fn read(&self) -> Result<u64> {
        if !self.path.exists() {
            return Ok(0);
        }
        let text = fs::read_to_string(&self.path)?;
        let text = text.trim();
        if text.is_empty() {
            return Ok(0);
        }
        text.parse::<u64>().map_err(|e| {
            DecayError::Sequence(format!("{}: {:?}: {}", self.path.display(), text, e))
        })
    }
}

impl SequenceCounter for FileSequence {
    fn next(&self) -> Result<u64> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| DecayError::LockPoisoned("file sequence"))?;
        let value = self.read()? + 1;
        write_atomic(&self.path, value.to_string().as_bytes())?;
        Ok(value)
    }

    fn current(&self) -> Result<u64> {
        let _guard = self
            .lock
            .lock()
            .map_err(|_| DecayError::LockPoisoned("file sequence"))?;
        self.read()
    }
}
