//! The authoritative pipeline store and its mutations

use crate::core::{LoadState, Pipeline, PipelineStatus, StepUpdate};
use crate::store::{
    command::Command,
    merge::{merge, MergeStrategy},
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;
use tracing::{debug, info};

/// Result of applying a mutation.
///
/// Lookup misses are not errors; they are reported here so callers and tests
/// can tell an applied mutation from a silent no-op.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "camelCase")]
pub enum MutationOutcome {
    /// The mutation changed (or re-derived) store state
    Applied,
    /// No pipeline with this file path
    PipelineNotFound { pipeline_file: String },
    /// The pipeline exists but has no such step
    StepNotFound { pipeline_file: String, step: String },
}

impl MutationOutcome {
    pub fn is_applied(&self) -> bool {
        matches!(self, MutationOutcome::Applied)
    }

    pub fn is_not_found(&self) -> bool {
        !self.is_applied()
    }
}

/// In-memory collection of pipelines keyed by pipeline file.
///
/// Pipelines are shared behind `Arc`, so cloning the store for a snapshot is
/// cheap and a mutation copies only the pipeline it touches. Only mutations
/// build a store, which keeps every aggregate in step with its steps.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PipelineStore {
    load_state: LoadState,
    pipelines: Vec<Arc<Pipeline>>,
}

impl PipelineStore {
    /// Create an empty, idle store
    pub fn new() -> Self {
        Self::default()
    }

    /// Current load state
    pub fn load_state(&self) -> LoadState {
        self.load_state
    }

    /// All pipelines in insertion order
    pub fn all_pipelines(&self) -> &[Arc<Pipeline>] {
        &self.pipelines
    }

    /// Look up a pipeline by file path
    pub fn pipeline(&self, pipeline_file: &str) -> Option<&Pipeline> {
        self.pipelines
            .iter()
            .find(|p| p.pipeline_file == pipeline_file)
            .map(|p| p.as_ref())
    }

    /// Aggregate status of a pipeline
    pub fn pipeline_status(&self, pipeline_file: &str) -> Option<PipelineStatus> {
        self.pipeline(pipeline_file).map(|p| p.status)
    }

    // copy-on-write: a pipeline still shared with a snapshot is cloned here
    fn pipeline_mut(&mut self, pipeline_file: &str) -> Option<&mut Pipeline> {
        self.pipelines
            .iter_mut()
            .find(|p| p.pipeline_file == pipeline_file)
            .map(Arc::make_mut)
    }

    /// Apply a command to the store
    pub fn apply(&mut self, command: Command) -> MutationOutcome {
        match command {
            Command::BeginLoad => self.begin_load(),
            Command::LoadSucceeded { pipelines } => self.load_succeeded(pipelines),
            Command::LoadFailed => self.load_failed(),
            Command::MergePipelines { pipelines, strategy } => self.merge_pipelines(pipelines, strategy),
            Command::ApplyStepUpdate { pipeline_id, step } => self.apply_step_update(&pipeline_id, &step),
            Command::RemoveStep { pipeline_id, step_name } => self.remove_step(&pipeline_id, &step_name),
            Command::RemovePipelines { file_names } => self.remove_pipelines(&file_names),
            Command::ResetStatus { pipeline_id } => self.reset_status(&pipeline_id),
            Command::SetPipelineStatus { pipeline_id } => self.set_pipeline_status(&pipeline_id),
            Command::Clear => self.clear(),
        }
    }

    /// Start an ingestion: `Loading`, pipelines cleared
    pub fn begin_load(&mut self) -> MutationOutcome {
        info!("Loading pipelines");
        self.load_state = LoadState::Loading;
        self.pipelines.clear();
        MutationOutcome::Applied
    }

    /// Finish an ingestion by replacing the pipelines
    pub fn load_succeeded(&mut self, pipelines: Vec<Pipeline>) -> MutationOutcome {
        self.merge_pipelines(pipelines, MergeStrategy::Replace)
    }

    /// Fail an ingestion: `Failed`, pipelines cleared
    pub fn load_failed(&mut self) -> MutationOutcome {
        info!("Pipeline load failed, clearing {} pipelines", self.pipelines.len());
        self.load_state = LoadState::Failed;
        self.pipelines.clear();
        MutationOutcome::Applied
    }

    /// Merge a batch of pipelines with an explicit strategy and mark the store loaded
    pub fn merge_pipelines(&mut self, pipelines: Vec<Pipeline>, strategy: MergeStrategy) -> MutationOutcome {
        let incoming: Vec<Arc<Pipeline>> = pipelines
            .into_iter()
            .map(|mut p| {
                p.recompute();
                Arc::new(p)
            })
            .collect();

        let existing = std::mem::take(&mut self.pipelines);
        self.pipelines = merge(existing, incoming, strategy);
        self.load_state = LoadState::Loaded;

        info!("Loaded {} pipelines ({:?} merge)", self.pipelines.len(), strategy);
        MutationOutcome::Applied
    }

    /// Set the status of a named step and recompute its pipeline
    pub fn apply_step_update(&mut self, pipeline_id: &str, update: &StepUpdate) -> MutationOutcome {
        let Some(pipeline) = self.pipeline_mut(pipeline_id) else {
            debug!("Step update for unknown pipeline {}", pipeline_id);
            return not_found_pipeline(pipeline_id);
        };

        if pipeline.apply_update(update) {
            debug!(
                "Step {} of {} is now {} ({:?})",
                update.name, pipeline_id, update.status, pipeline.status
            );
            MutationOutcome::Applied
        } else {
            debug!("Step update for unknown step {} in {}", update.name, pipeline_id);
            not_found_step(pipeline_id, &update.name)
        }
    }

    /// Remove a named step; the aggregate is recomputed so `total` stays consistent
    pub fn remove_step(&mut self, pipeline_id: &str, step_name: &str) -> MutationOutcome {
        let Some(pipeline) = self.pipeline_mut(pipeline_id) else {
            return not_found_pipeline(pipeline_id);
        };

        if pipeline.remove_step(step_name) {
            debug!("Removed step {} from {}", step_name, pipeline_id);
            MutationOutcome::Applied
        } else {
            not_found_step(pipeline_id, step_name)
        }
    }

    /// Remove every pipeline whose file is listed, keeping the order of the rest
    pub fn remove_pipelines<S: AsRef<str>>(&mut self, file_names: &[S]) -> MutationOutcome {
        let doomed: HashSet<&str> = file_names.iter().map(AsRef::as_ref).collect();
        let before = self.pipelines.len();
        self.pipelines.retain(|p| !doomed.contains(p.pipeline_file.as_str()));
        info!("Removed {} pipelines", before - self.pipelines.len());
        MutationOutcome::Applied
    }

    /// Reset every step of a pipeline to not started
    pub fn reset_status(&mut self, pipeline_id: &str) -> MutationOutcome {
        match self.pipeline_mut(pipeline_id) {
            Some(pipeline) => {
                pipeline.reset();
                debug!("Reset status of {}", pipeline_id);
                MutationOutcome::Applied
            }
            None => not_found_pipeline(pipeline_id),
        }
    }

    /// Recompute the aggregate of one pipeline from its current steps
    pub fn set_pipeline_status(&mut self, pipeline_id: &str) -> MutationOutcome {
        match self.pipeline_mut(pipeline_id) {
            Some(pipeline) => {
                let status = pipeline.recompute();
                debug!("Recomputed status of {}: {:?}", pipeline_id, status);
                MutationOutcome::Applied
            }
            None => not_found_pipeline(pipeline_id),
        }
    }

    /// Drop every pipeline and return to `Idle`
    pub fn clear(&mut self) -> MutationOutcome {
        info!("Clearing all pipelines");
        self.pipelines.clear();
        self.load_state = LoadState::Idle;
        MutationOutcome::Applied
    }
}

fn not_found_pipeline(pipeline_file: &str) -> MutationOutcome {
    MutationOutcome::PipelineNotFound {
        pipeline_file: pipeline_file.to_string(),
    }
}

fn not_found_step(pipeline_file: &str, step: &str) -> MutationOutcome {
    MutationOutcome::StepNotFound {
        pipeline_file: pipeline_file.to_string(),
        step: step.to_string(),
    }
}
