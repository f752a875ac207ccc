//! Persistence layer for pipeline state
//!
//! Persistence is a side channel: failures are reported to the caller and
//! never change the in-memory store.

#[cfg(feature = "sqlite")]
pub mod store;

#[cfg(feature = "sqlite")]
pub use store::SqliteStageStore;

use crate::core::Pipeline;
use crate::store::PipelineStore;
use thiserror::Error;
use tracing::{error, info};

/// Error types for persistence backends
#[derive(Debug, Error)]
pub enum PersistenceError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Database error: {0}")]
    Database(String),
}

#[cfg(feature = "sqlite")]
impl From<sqlx::Error> for PersistenceError {
    fn from(e: sqlx::Error) -> Self {
        PersistenceError::Database(e.to_string())
    }
}

/// Trait for persistence backends
#[async_trait::async_trait]
pub trait PersistenceBackend: Send + Sync {
    /// Save the given pipelines, upserting by pipeline file, stage and step name.
    ///
    /// Each saved pipeline is stored exactly: stages and steps it no longer has
    /// are deleted. Other pipelines are left alone.
    async fn persist_pipelines(&self, pipelines: &[Pipeline]) -> Result<(), PersistenceError>;

    /// Make the backend hold exactly `pipelines`, deleting every other pipeline
    async fn replace_all(&self, pipelines: &[Pipeline]) -> Result<(), PersistenceError>;
}

/// In-memory persistence (for testing or ephemeral use)
pub struct InMemoryPersistence {
    saved: tokio::sync::RwLock<Vec<Pipeline>>,
    batches: std::sync::atomic::AtomicUsize,
}

impl InMemoryPersistence {
    pub fn new() -> Self {
        Self {
            saved: tokio::sync::RwLock::new(Vec::new()),
            batches: std::sync::atomic::AtomicUsize::new(0),
        }
    }

    /// Pipelines saved so far, latest version per pipeline file
    pub async fn saved(&self) -> Vec<Pipeline> {
        self.saved.read().await.clone()
    }

    /// Number of persist calls received
    pub fn batches(&self) -> usize {
        self.batches.load(std::sync::atomic::Ordering::SeqCst)
    }
}

impl Default for InMemoryPersistence {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait::async_trait]
impl PersistenceBackend for InMemoryPersistence {
    async fn persist_pipelines(&self, pipelines: &[Pipeline]) -> Result<(), PersistenceError> {
        let mut saved = self.saved.write().await;
        for pipeline in pipelines {
            match saved.iter_mut().find(|p| p.pipeline_file == pipeline.pipeline_file) {
                Some(existing) => *existing = pipeline.clone(),
                None => saved.push(pipeline.clone()),
            }
        }
        self.batches.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }

    async fn replace_all(&self, pipelines: &[Pipeline]) -> Result<(), PersistenceError> {
        *self.saved.write().await = pipelines.to_vec();
        self.batches.fetch_add(1, std::sync::atomic::Ordering::SeqCst);
        Ok(())
    }
}

/// Persist pipelines from a store snapshot.
///
/// With `pipeline_id` only that pipeline is saved, and nothing is sent to the
/// backend when the store does not have it. Without it the backend is made to
/// mirror the whole snapshot, so removed pipelines (or a cleared store) are
/// deleted there too. Returns the number of pipelines saved.
pub async fn persist_snapshot(
    store: &PipelineStore,
    backend: &dyn PersistenceBackend,
    pipeline_id: Option<&str>,
) -> Result<usize, PersistenceError> {
    let result = match pipeline_id {
        Some(id) => match store.pipeline(id) {
            Some(pipeline) => backend
                .persist_pipelines(std::slice::from_ref(pipeline))
                .await
                .map(|()| 1),
            None => {
                info!("Pipeline {} is not in the store, nothing to persist", id);
                return Ok(0);
            }
        },
        None => {
            let pipelines: Vec<Pipeline> = store.all_pipelines().iter().map(|p| Pipeline::clone(p)).collect();
            backend.replace_all(&pipelines).await.map(|()| pipelines.len())
        }
    };

    match result {
        Ok(count) => {
            info!("Persisted {} pipelines", count);
            Ok(count)
        }
        Err(e) => {
            error!("Error saving pipelines: {}", e);
            Err(e)
        }
    }
}
