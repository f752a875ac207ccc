//! Status models for steps, pipelines and the store

use serde::de::{self, IgnoredAny, MapAccess, SeqAccess, Visitor};
use serde::{Deserialize, Deserializer, Serialize};
use std::fmt;

/// Execution status of a single step
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepStatus {
    /// Step has not started (also the fallback for unknown values)
    #[default]
    NotStarted,
    /// Step is currently running
    Running,
    /// Step finished with an error
    Error,
    /// Step finished successfully
    Done,
}

impl StepStatus {
    /// Normalize a raw status string.
    ///
    /// Matching ignores case and surrounding whitespace. Anything that is not
    /// a known spelling degrades to [`StepStatus::NotStarted`].
    pub fn normalize(raw: &str) -> Self {
        let raw = raw.trim();
        if let Ok(code) = raw.parse::<i64>() {
            return StepStatus::from_code(code);
        }
        match raw.to_ascii_lowercase().as_str() {
            "running" | "start" | "started" => StepStatus::Running,
            "error" | "failure" | "failing" | "failed" => StepStatus::Error,
            "done" | "success" | "passed" => StepStatus::Done,
            _ => StepStatus::NotStarted,
        }
    }

    /// Map a numeric backend status code.
    ///
    /// 1 is success, 2 running, 3 error. Everything else (0 none, 4 killed,
    /// unknown codes) is not started.
    pub fn from_code(code: i64) -> Self {
        match code {
            1 => StepStatus::Done,
            2 => StepStatus::Running,
            3 => StepStatus::Error,
            _ => StepStatus::NotStarted,
        }
    }

    /// Canonical lowercase name
    pub fn as_str(&self) -> &'static str {
        match self {
            StepStatus::NotStarted => "not_started",
            StepStatus::Running => "running",
            StepStatus::Error => "error",
            StepStatus::Done => "done",
        }
    }
}

impl fmt::Display for StepStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl From<&str> for StepStatus {
    fn from(raw: &str) -> Self {
        StepStatus::normalize(raw)
    }
}

// Inbound statuses come from an unreliable source, so deserialization never
// fails: strings and numeric codes are normalized, any other value is NotStarted.
impl<'de> Deserialize<'de> for StepStatus {
    fn deserialize<D>(deserializer: D) -> Result<Self, D::Error>
    where
        D: Deserializer<'de>,
    {
        deserializer.deserialize_any(StepStatusVisitor)
    }
}

struct StepStatusVisitor;

impl<'de> Visitor<'de> for StepStatusVisitor {
    type Value = StepStatus;

    fn expecting(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("a step status")
    }

    fn visit_str<E: de::Error>(self, v: &str) -> Result<StepStatus, E> {
        Ok(StepStatus::normalize(v))
    }

    fn visit_i64<E: de::Error>(self, v: i64) -> Result<StepStatus, E> {
        Ok(StepStatus::from_code(v))
    }

    fn visit_u64<E: de::Error>(self, v: u64) -> Result<StepStatus, E> {
        Ok(i64::try_from(v).map(StepStatus::from_code).unwrap_or_default())
    }

    fn visit_f64<E: de::Error>(self, v: f64) -> Result<StepStatus, E> {
        if v.fract() == 0.0 && v.abs() < i64::MAX as f64 {
            Ok(StepStatus::from_code(v as i64))
        } else {
            Ok(StepStatus::NotStarted)
        }
    }

    fn visit_bool<E: de::Error>(self, _: bool) -> Result<StepStatus, E> {
        Ok(StepStatus::NotStarted)
    }

    fn visit_unit<E: de::Error>(self) -> Result<StepStatus, E> {
        Ok(StepStatus::NotStarted)
    }

    fn visit_none<E: de::Error>(self) -> Result<StepStatus, E> {
        Ok(StepStatus::NotStarted)
    }

    fn visit_some<D: Deserializer<'de>>(self, deserializer: D) -> Result<StepStatus, D::Error> {
        deserializer.deserialize_any(self)
    }

    // Containers are drained so the surrounding document stays readable.
    fn visit_seq<A: SeqAccess<'de>>(self, mut seq: A) -> Result<StepStatus, A::Error> {
        while seq.next_element::<IgnoredAny>()?.is_some() {}
        Ok(StepStatus::NotStarted)
    }

    fn visit_map<A: MapAccess<'de>>(self, mut map: A) -> Result<StepStatus, A::Error> {
        while map.next_entry::<IgnoredAny, IgnoredAny>()?.is_some() {}
        Ok(StepStatus::NotStarted)
    }
}

/// Aggregate step counts of a pipeline
///
/// Always satisfies `running + error + done <= total`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PipelineStatus {
    /// Number of steps across all stages
    pub total: usize,

    /// Steps currently running
    pub running: usize,

    /// Steps finished with an error
    pub error: usize,

    /// Steps finished successfully
    pub done: usize,
}

impl PipelineStatus {
    /// Steps that have not started yet
    pub fn not_started(&self) -> usize {
        self.total.saturating_sub(self.running + self.error + self.done)
    }

    /// Whether every step is done
    pub fn is_complete(&self) -> bool {
        self.total > 0 && self.done == self.total
    }

    /// Progress as a fraction of finished steps (0.0 to 1.0)
    pub fn progress(&self) -> f64 {
        if self.total == 0 {
            return 0.0;
        }
        (self.done + self.error) as f64 / self.total as f64
    }
}

/// Lifecycle of the pipeline store
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoadState {
    /// Nothing loaded yet
    #[default]
    Idle,
    /// An ingestion is in flight
    Loading,
    /// Pipelines are loaded
    Loaded,
    /// The last ingestion failed
    Failed,
}

impl fmt::Display for LoadState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            LoadState::Idle => "idle",
            LoadState::Loading => "loading",
            LoadState::Loaded => "loaded",
            LoadState::Failed => "failed",
        };
        f.write_str(s)
    }
}
