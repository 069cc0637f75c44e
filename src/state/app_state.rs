use std::path::PathBuf;
use std::sync::Arc;

use decay_core::{IngestMode, Ingestor, SeriesStore};

use crate::state::disk::{CsvDirectoryStore, FileSequence, UploadDirSink};

#[derive(Clone)]
pub struct AppState {
    pub ingestor: Arc<Ingestor>,
    pub store: Arc<CsvDirectoryStore>,
}

impl AppState {
    pub fn new(
        mode: IngestMode,
        data_dir: PathBuf,
        upload_dir: PathBuf,
        counter_file: PathBuf,
    ) -> Self {
        let store = Arc::new(CsvDirectoryStore::new(data_dir));
        let sequence = Arc::new(FileSequence::new(counter_file));
        let artifacts = Arc::new(UploadDirSink::new(upload_dir));
        let ingestor = Ingestor::new(
            mode,
            store.clone() as Arc<dyn SeriesStore>,
            sequence,
            artifacts,
        );

        Self {
            ingestor: Arc::new(ingestor),
            store,
        }
    }
}
