//! Ingestion error types

use crate::store::DispatchError;
use std::time::Duration;
use thiserror::Error;

/// Error types for stage sources
#[derive(Debug, Error)]
pub enum SourceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Malformed stage records: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Backend error: {0}")]
    Backend(String),
}

/// Why an ingestion did not complete
#[derive(Debug, Error)]
pub enum IngestError {
    #[error("Fetching stage records failed: {0}")]
    Source(#[from] SourceError),

    #[error("Fetching stage records timed out after {0:?}")]
    Timeout(Duration),

    #[error("Ingestion was cancelled")]
    Cancelled,

    #[error(transparent)]
    Store(#[from] DispatchError),
}
