//! stageboard - live status aggregation for CI pipelines

pub mod cli;
pub mod core;
pub mod ingest;
pub mod persistence;
pub mod store;

// Re-export commonly used types
pub use crate::core::{compute_status, LoadState, Pipeline, PipelineStatus, Stage, StageRecord, Step, StepStatus, StepUpdate};
pub use crate::ingest::{IngestError, Ingestor, SourceError, StageSource};
pub use crate::persistence::{PersistenceBackend, PersistenceError};
pub use crate::store::{Command, MergeStrategy, MutationOutcome, PipelineStore, StoreEvent, StoreHandle};
