//! Pipeline and stage domain models

use crate::core::{
    aggregate::compute_status,
    state::{PipelineStatus, StepStatus},
    step::{Step, StepUpdate},
};
use serde::{Deserialize, Serialize};

/// A named group of steps belonging to one pipeline file.
///
/// This is also the wire shape of a stage record fetched from a source:
/// `{ "pipelineFile": ..., "name": ..., "status": ..., "steps": [...] }`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Stage {
    /// Pipeline file this stage belongs to
    pub pipeline_file: String,

    /// Stage name
    pub name: String,

    /// Status reported for the stage as a whole
    #[serde(default)]
    pub status: StepStatus,

    /// Steps of the stage, in execution order
    #[serde(default)]
    pub steps: Vec<Step>,
}

/// Raw stage record as delivered by a stage source
pub type StageRecord = Stage;

impl Stage {
    pub fn new(pipeline_file: impl Into<String>, name: impl Into<String>, steps: Vec<Step>) -> Self {
        Self {
            pipeline_file: pipeline_file.into(),
            name: name.into(),
            status: StepStatus::NotStarted,
            steps,
        }
    }
}

/// A pipeline: its stages plus the aggregate status of all their steps
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Pipeline {
    /// Path of the pipeline file, the primary key
    pub pipeline_file: String,

    /// Stages in ingestion order
    #[serde(default)]
    pub stages: Vec<Stage>,

    /// Last computed aggregate status
    #[serde(default)]
    pub status: PipelineStatus,
}

impl Pipeline {
    /// Build a pipeline from its stages and compute its status
    pub fn from_stages(pipeline_file: impl Into<String>, stages: Vec<Stage>) -> Self {
        let mut pipeline = Self {
            pipeline_file: pipeline_file.into(),
            stages,
            status: PipelineStatus::default(),
        };
        pipeline.recompute();
        pipeline
    }

    /// All steps across all stages
    pub fn steps(&self) -> impl Iterator<Item = &Step> {
        self.stages.iter().flat_map(|stage| stage.steps.iter())
    }

    /// Find a step by name, optionally restricted to one stage
    pub fn step(&self, name: &str, stage_name: Option<&str>) -> Option<&Step> {
        self.stages
            .iter()
            .filter(|stage| stage_name.map_or(true, |s| stage.name == s))
            .flat_map(|stage| stage.steps.iter())
            .find(|step| step.name == name)
    }

    /// Mutable variant of [`Pipeline::step`]
    pub fn step_mut(&mut self, name: &str, stage_name: Option<&str>) -> Option<&mut Step> {
        self.stages
            .iter_mut()
            .filter(|stage| stage_name.map_or(true, |s| stage.name == s))
            .flat_map(|stage| stage.steps.iter_mut())
            .find(|step| step.name == name)
    }

    /// Recompute the aggregate status from the current steps
    pub fn recompute(&mut self) -> PipelineStatus {
        self.status = compute_status(self.steps());
        self.status
    }

    /// Apply a status update to the named step.
    ///
    /// Returns `false` when no such step exists.
    pub fn apply_update(&mut self, update: &StepUpdate) -> bool {
        match self.step_mut(&update.name, update.stage_name.as_deref()) {
            Some(step) => {
                step.status = update.status;
                self.recompute();
                true
            }
            None => false,
        }
    }

    /// Remove the first step with the given name.
    ///
    /// Returns `false` when no such step exists.
    pub fn remove_step(&mut self, name: &str) -> bool {
        let found = self.stages.iter().enumerate().find_map(|(stage_idx, stage)| {
            stage
                .steps
                .iter()
                .position(|s| s.name == name)
                .map(|step_idx| (stage_idx, step_idx))
        });

        match found {
            Some((stage_idx, step_idx)) => {
                self.stages[stage_idx].steps.remove(step_idx);
                self.recompute();
                true
            }
            None => false,
        }
    }

    /// Reset every step to not started
    pub fn reset(&mut self) {
        for stage in &mut self.stages {
            for step in &mut stage.steps {
                step.reset();
            }
        }
        self.recompute();
    }
}
