// Error handling for the decay pipeline

use thiserror::Error;

pub type Result<T> = std::result::Result<T, DecayError>;

#[derive(Error, Debug)]
pub enum DecayError {
    #[error("Empty payload: no data rows received")]
    EmptyPayload,

    #[error("Missing required column: {column}")]
    Schema { column: String },

    #[error("Malformed value in row {row}, column {column}: {value:?}")]
    MalformedValue {
        row: usize,
        column: String,
        value: String,
    },

    #[error("Degenerate curve: {0}")]
    DegenerateCurve(&'static str),

    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Sequence counter error: {0}")]
    Sequence(String),

    #[error("Storage error: {0}")]
    Storage(String),

    #[error("Lock poisoned: {0}")]
    LockPoisoned(&'static str),
}

impl DecayError {
    /// Validation failures are caused by the payload itself and will fail the
    /// same way on every retry.
    pub fn is_validation(&self) -> bool {
        matches!(
            self,
            DecayError::EmptyPayload
                | DecayError::Schema { .. }
                | DecayError::MalformedValue { .. }
                | DecayError::DegenerateCurve(_)
        )
    }
}
