//! Step domain model

use crate::core::state::StepStatus;
use serde::{Deserialize, Serialize};

/// A single step in a pipeline stage
///
/// Steps are identified by `name` within their pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Step {
    /// Step name, unique within the owning pipeline
    pub name: String,

    /// Current execution status
    #[serde(default)]
    pub status: StepStatus,

    /// Container image the step runs in, passed through untouched
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub image: Option<String>,
}

impl Step {
    /// Create a step with the given status
    pub fn new(name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            name: name.into(),
            status,
            image: None,
        }
    }

    /// Builder-style image setter
    pub fn with_image(mut self, image: impl Into<String>) -> Self {
        self.image = Some(image.into());
        self
    }

    /// Reset the step back to not started
    pub fn reset(&mut self) {
        self.status = StepStatus::NotStarted;
    }
}

/// A status event for one step, as delivered by the event feed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct StepUpdate {
    /// Name of the step to update
    pub name: String,

    /// New status
    #[serde(default)]
    pub status: StepStatus,

    /// Restrict the lookup to this stage
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub stage_name: Option<String>,
}

impl StepUpdate {
    pub fn new(name: impl Into<String>, status: StepStatus) -> Self {
        Self {
            name: name.into(),
            status,
            stage_name: None,
        }
    }

    /// Scope the update to a single stage
    pub fn in_stage(mut self, stage_name: impl Into<String>) -> Self {
        self.stage_name = Some(stage_name.into());
        self
    }
}
