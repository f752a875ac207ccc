//! Ingestion of stage records into the pipeline store

pub mod error;
pub mod source;

use crate::core::{Pipeline, Stage, StageRecord};
use crate::store::{MergeStrategy, StoreHandle};
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use tracing::{error, info, warn};

pub use error::{IngestError, SourceError};
pub use source::{FileStageSource, StaticStageSource};

/// External source of stage records
#[async_trait]
pub trait StageSource: Send + Sync {
    /// Fetch the full current set of stage records
    async fn fetch_stage_records(&self) -> Result<Vec<StageRecord>, SourceError>;
}

#[async_trait]
impl<T: StageSource + ?Sized> StageSource for Arc<T> {
    async fn fetch_stage_records(&self) -> Result<Vec<StageRecord>, SourceError> {
        (**self).fetch_stage_records().await
    }
}

/// Group stage records into pipelines by `pipeline_file`.
///
/// Pipelines appear in order of their first record; stages keep their
/// record order. Each pipeline's status is computed over all its steps.
pub fn group_stages(records: Vec<StageRecord>) -> Vec<Pipeline> {
    let mut order: Vec<String> = Vec::new();
    let mut groups: HashMap<String, Vec<Stage>> = HashMap::new();

    for record in records {
        let stages = groups.entry(record.pipeline_file.clone()).or_insert_with(|| {
            order.push(record.pipeline_file.clone());
            Vec::new()
        });
        stages.push(record);
    }

    order
        .into_iter()
        .filter_map(|file| {
            let stages = groups.remove(&file)?;
            Some(Pipeline::from_stages(file, stages))
        })
        .collect()
}

/// Fetches stage records and merges them into a store
pub struct Ingestor<S> {
    source: S,
    timeout: Duration,
    cancel: CancellationToken,
}

impl<S: StageSource> Ingestor<S> {
    pub fn new(source: S, timeout: Duration) -> Self {
        Self {
            source,
            timeout,
            cancel: CancellationToken::new(),
        }
    }

    /// Use an externally owned cancellation token
    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    /// Token that cancels in-flight fetches of this ingestor
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Fetch and group, bounded by the timeout and the cancellation token
    pub async fn fetch(&self) -> Result<Vec<Pipeline>, IngestError> {
        tokio::select! {
            biased;
            _ = self.cancel.cancelled() => Err(IngestError::Cancelled),
            result = tokio::time::timeout(self.timeout, self.source.fetch_stage_records()) => {
                match result {
                    Ok(Ok(records)) => {
                        info!("Fetched {} stage records", records.len());
                        Ok(group_stages(records))
                    }
                    Ok(Err(e)) => Err(IngestError::Source(e)),
                    Err(_) => Err(IngestError::Timeout(self.timeout)),
                }
            }
        }
    }

    /// Run one ingestion against the store.
    ///
    /// With [`MergeStrategy::Replace`] this is a full resync: the store goes
    /// through `Loading` and ends `Loaded` or `Failed`. With
    /// [`MergeStrategy::Union`] the fetched pipelines are merged into the
    /// current ones and a failed fetch leaves the store untouched.
    ///
    /// Returns the number of pipelines fetched.
    pub async fn run(&self, store: &StoreHandle, strategy: MergeStrategy) -> Result<usize, IngestError> {
        match strategy {
            MergeStrategy::Replace => {
                store.begin_load().await?;
                match self.fetch().await {
                    Ok(pipelines) => {
                        let count = pipelines.len();
                        store.load_succeeded(pipelines).await?;
                        Ok(count)
                    }
                    Err(e) => {
                        error!("Pipeline ingestion failed: {}", e);
                        store.load_failed().await?;
                        Err(e)
                    }
                }
            }
            MergeStrategy::Union => match self.fetch().await {
                Ok(pipelines) => {
                    let count = pipelines.len();
                    store.merge_pipelines(pipelines, MergeStrategy::Union).await?;
                    Ok(count)
                }
                Err(e) => {
                    warn!("Incremental ingestion failed, store left unchanged: {}", e);
                    Err(e)
                }
            },
        }
    }
}
