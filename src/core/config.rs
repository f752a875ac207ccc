//! Store configuration from YAML

use crate::store::MergeStrategy;
use anyhow::Result;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Top-level configuration loaded from YAML
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StoreConfig {
    /// Where stage records are fetched from
    #[serde(default)]
    pub source: SourceConfig,

    /// Ingestion behaviour
    #[serde(default)]
    pub ingest: IngestConfig,

    /// Where pipelines are persisted
    #[serde(default)]
    pub persistence: PersistenceConfig,

    /// Capacity of the command channel in front of the store
    #[serde(default = "default_channel_capacity")]
    pub channel_capacity: usize,
}

/// Stage source configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SourceConfig {
    /// Source kind
    #[serde(default)]
    pub kind: SourceKind,

    /// Path of the JSON file or SQLite database
    #[serde(default = "default_source_path")]
    pub path: PathBuf,
}

/// Kind of stage source
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum SourceKind {
    /// JSON array of stage records
    #[default]
    File,
    /// SQLite database written by the persistence layer
    Sqlite,
}

/// Ingestion configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestConfig {
    /// Upper bound on a single fetch, in seconds
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    /// How fetched pipelines are merged into the store
    #[serde(default)]
    pub merge: MergeStrategy,
}

/// Persistence configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Backend kind
    #[serde(default)]
    pub kind: PersistenceKind,

    /// Database path (SQLite only); defaults to the local data directory
    #[serde(default)]
    pub path: Option<PathBuf>,
}

/// Kind of persistence backend
#[derive(Debug, Clone, Copy, Default, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum PersistenceKind {
    /// Keep pipelines in memory only
    #[default]
    None,
    /// SQLite database
    Sqlite,
}

fn default_channel_capacity() -> usize {
    64
}

fn default_source_path() -> PathBuf {
    PathBuf::from("stages.json")
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            source: SourceConfig::default(),
            ingest: IngestConfig::default(),
            persistence: PersistenceConfig::default(),
            channel_capacity: default_channel_capacity(),
        }
    }
}

impl Default for SourceConfig {
    fn default() -> Self {
        Self {
            kind: SourceKind::default(),
            path: default_source_path(),
        }
    }
}

impl Default for IngestConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
            merge: MergeStrategy::default(),
        }
    }
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            kind: PersistenceKind::default(),
            path: None,
        }
    }
}

impl IngestConfig {
    /// Fetch timeout as a duration
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl StoreConfig {
    /// Load configuration from a YAML file
    pub fn from_file<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path)?;
        Self::from_yaml(&content)
    }

    /// Parse configuration from a YAML string
    pub fn from_yaml(yaml: &str) -> Result<Self> {
        let config: StoreConfig = serde_yaml::from_str(yaml)?;
        config.validate()?;
        Ok(config)
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.ingest.timeout_secs == 0 {
            anyhow::bail!("ingest.timeout_secs must be greater than zero");
        }

        if self.channel_capacity == 0 {
            anyhow::bail!("channel_capacity must be greater than zero");
        }

        if self.source.path.as_os_str().is_empty() {
            anyhow::bail!("source.path must not be empty");
        }

        if let Some(path) = &self.persistence.path {
            if self.persistence.kind == PersistenceKind::None {
                tracing::warn!(
                    "persistence.path {} is ignored because persistence.kind is none",
                    path.display()
                );
            }
        }

        Ok(())
    }
}
