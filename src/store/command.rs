//! Dispatchable mutation commands
//!
//! Every store mutation has a named command with a JSON envelope of the form
//! `{"type": "applyStepUpdate", "payload": {"pipelineId": "a.yml", "step": {...}}}`,
//! so event feeds and UI actions can address the store over any transport.

use crate::core::{Pipeline, StepUpdate};
use crate::store::merge::MergeStrategy;
use serde::{Deserialize, Serialize};

/// A named store mutation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    tag = "type",
    content = "payload",
    rename_all = "camelCase",
    rename_all_fields = "camelCase"
)]
pub enum Command {
    /// Enter `Loading` and clear the pipelines
    BeginLoad,

    /// Replace the pipelines with a freshly ingested batch
    LoadSucceeded { pipelines: Vec<Pipeline> },

    /// Enter `Failed` and clear the pipelines
    LoadFailed,

    /// Merge a batch with an explicit strategy
    MergePipelines {
        pipelines: Vec<Pipeline>,
        #[serde(default)]
        strategy: MergeStrategy,
    },

    /// Set the status of one step
    ApplyStepUpdate { pipeline_id: String, step: StepUpdate },

    /// Remove one step
    RemoveStep { pipeline_id: String, step_name: String },

    /// Remove pipelines by file name
    RemovePipelines { file_names: Vec<String> },

    /// Reset all steps of a pipeline to not started
    ResetStatus { pipeline_id: String },

    /// Recompute the aggregate of a pipeline
    SetPipelineStatus { pipeline_id: String },

    /// Drop everything and return to `Idle`
    Clear,
}

impl Command {
    /// The command's wire name
    pub fn name(&self) -> &'static str {
        match self {
            Command::BeginLoad => "beginLoad",
            Command::LoadSucceeded { .. } => "loadSucceeded",
            Command::LoadFailed => "loadFailed",
            Command::MergePipelines { .. } => "mergePipelines",
            Command::ApplyStepUpdate { .. } => "applyStepUpdate",
            Command::RemoveStep { .. } => "removeStep",
            Command::RemovePipelines { .. } => "removePipelines",
            Command::ResetStatus { .. } => "resetStatus",
            Command::SetPipelineStatus { .. } => "setPipelineStatus",
            Command::Clear => "clear",
        }
    }

    /// Pipeline addressed by this command, if it targets exactly one
    pub fn pipeline_id(&self) -> Option<&str> {
        match self {
            Command::ApplyStepUpdate { pipeline_id, .. }
            | Command::RemoveStep { pipeline_id, .. }
            | Command::ResetStatus { pipeline_id }
            | Command::SetPipelineStatus { pipeline_id } => Some(pipeline_id.as_str()),
            _ => None,
        }
    }

    /// Parse a JSON-lines document of commands, skipping blank lines and `#` comments
    pub fn parse_lines(input: &str) -> Result<Vec<Command>, serde_json::Error> {
        input
            .lines()
            .map(str::trim)
            .filter(|line| !line.is_empty() && !line.starts_with('#'))
            .map(|line| serde_json::from_str::<Command>(line))
            .collect()
    }
}
