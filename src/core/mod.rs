pub mod aligner;
pub mod constants;
pub mod detector;
pub mod error;
pub mod export;
pub mod features;
pub mod format;
pub mod ingest;
pub mod merger;
pub mod parser;
pub mod sequence;
