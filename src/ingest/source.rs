//! Built-in stage sources

use crate::core::StageRecord;
use crate::ingest::{SourceError, StageSource};
use async_trait::async_trait;
use std::path::{Path, PathBuf};
use tracing::debug;

/// Reads a JSON array of stage records from a file
#[derive(Debug, Clone)]
pub struct FileStageSource {
    path: PathBuf,
}

impl FileStageSource {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

#[async_trait]
impl StageSource for FileStageSource {
    async fn fetch_stage_records(&self) -> Result<Vec<StageRecord>, SourceError> {
        debug!("Reading stage records from {}", self.path.display());
        let content = tokio::fs::read_to_string(&self.path).await?;
        let records: Vec<StageRecord> = serde_json::from_str(&content)?;
        Ok(records)
    }
}

/// Serves a fixed set of stage records from memory
#[derive(Debug, Clone, Default)]
pub struct StaticStageSource {
    records: Vec<StageRecord>,
}

impl StaticStageSource {
    pub fn new(records: Vec<StageRecord>) -> Self {
        Self { records }
    }
}

#[async_trait]
impl StageSource for StaticStageSource {
    async fn fetch_stage_records(&self) -> Result<Vec<StageRecord>, SourceError> {
        Ok(self.records.clone())
    }
}
