use std::path::PathBuf;
use std::time::Duration;

use thiserror::Error;

#[derive(Debug, Error)]
pub enum Error {
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    #[error("Not found: {0}")]
    NotFound(String),

    #[error("Missing data file {0}")]
    MissingData(PathBuf),

    #[error("Corrupt index {path}: {reason}")]
    CorruptIndex { path: PathBuf, reason: String },

    #[error("Corrupt metadata {path}: {reason}")]
    CorruptMetadata { path: PathBuf, reason: String },

    #[error("Embedding dimension mismatch: index has {index}, encoder produces {encoder}")]
    DimensionMismatch { index: usize, encoder: usize },

    #[error("Index/metadata cardinality mismatch: {index_rows} index rows, {metadata_records} metadata records")]
    CardinalityMismatch { index_rows: usize, metadata_records: usize },

    #[error("Backend unavailable: {0}")]
    Backend(String),

    #[error("Request timed out after {0:?}")]
    Timeout(Duration),

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

impl Error {
    /// Errors that abort initialization; the service never runs partially loaded.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            Error::InvalidConfig(_)
                | Error::MissingData(_)
                | Error::CorruptIndex { .. }
                | Error::CorruptMetadata { .. }
                | Error::DimensionMismatch { .. }
                | Error::CardinalityMismatch { .. }
        )
    }

    /// Per-request failures the caller may retry later.
    pub fn is_transient(&self) -> bool {
        matches!(self, Error::Backend(_) | Error::Timeout(_))
    }
}

pub type Result<T> = std::result::Result<T, Error>;
