//! Build run result aggregation.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use serde::{Serialize, Serializer};

use crate::output::ErrorMessage;

/// Process exit code of a failed build.
pub const BUILD_FAILED_EXIT_CODE: i32 = 1;

/// Final status of one step invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StepRunStatus {
    Success,
    Failed,
    /// Failed, but the step is marked skippable so the build continues.
    FailedSkippable,
    /// Not run because an earlier step failed the build.
    Skipped,
    /// Killed after producing no output for too long.
    TimedOut,
}

impl StepRunStatus {
    /// Whether this status fails the build.
    pub fn is_failure(&self) -> bool {
        matches!(self, StepRunStatus::Failed | StepRunStatus::TimedOut)
    }

    pub fn display_char(&self) -> char {
        match self {
            StepRunStatus::Success => '✓',
            StepRunStatus::Failed => '✗',
            StepRunStatus::FailedSkippable => '!',
            StepRunStatus::Skipped => '⊘',
            StepRunStatus::TimedOut => '⧗',
        }
    }
}

impl fmt::Display for StepRunStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StepRunStatus::Success => "success",
            StepRunStatus::Failed => "failed",
            StepRunStatus::FailedSkippable => "failed (skippable)",
            StepRunStatus::Skipped => "skipped",
            StepRunStatus::TimedOut => "timed out",
        };
        write!(f, "{}", s)
    }
}

/// Outcome of one step invocation.
#[derive(Debug, Clone, Serialize)]
pub struct StepRunResult {
    pub uuid: String,
    pub step_id: String,
    pub title: String,
    pub status: StepRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(rename = "run_time_in_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub error_messages: Vec<ErrorMessage>,
    pub started_at: DateTime<Utc>,
}

impl StepRunResult {
    /// A successful, zero-length result; callers fill in the rest.
    pub fn new(uuid: &str, step_id: &str) -> Self {
        Self {
            uuid: uuid.to_string(),
            step_id: step_id.to_string(),
            title: step_id.to_string(),
            status: StepRunStatus::Success,
            exit_code: None,
            duration: Duration::ZERO,
            error_messages: Vec::new(),
            started_at: Utc::now(),
        }
    }

    /// A step that never ran because the build had already failed.
    pub fn skipped(uuid: &str, step_id: &str, title: &str) -> Self {
        Self {
            title: title.to_string(),
            status: StepRunStatus::Skipped,
            ..Self::new(uuid, step_id)
        }
    }
}

/// Outcome of one workflow invocation.
#[derive(Debug, Clone, Serialize)]
pub struct WorkflowRunResult {
    pub uuid: String,
    pub workflow_id: String,
    pub title: String,
    pub steps: Vec<StepRunResult>,
}

/// Accumulated outcome of a whole run.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRunResults {
    pub workflow_id: String,
    pub start_time: DateTime<Utc>,
    pub step_lib_updates: HashMap<String, i32>,
    pub project_type: String,
    pub workflows: Vec<WorkflowRunResult>,
    pub event_name: String,
}

impl BuildRunResults {
    pub fn new(workflow_id: &str, project_type: &str) -> Self {
        Self {
            workflow_id: workflow_id.to_string(),
            start_time: Utc::now(),
            step_lib_updates: HashMap::new(),
            project_type: project_type.to_string(),
            workflows: Vec::new(),
            event_name: String::new(),
        }
    }

    /// Append a finished workflow, keeping run order.
    pub fn record_workflow_outcome(&mut self, outcome: WorkflowRunResult) {
        self.workflows.push(outcome);
    }

    fn steps(&self) -> impl Iterator<Item = &StepRunResult> {
        self.workflows.iter().flat_map(|w| w.steps.iter())
    }

    fn steps_with(&self, status: StepRunStatus) -> Vec<&StepRunResult> {
        self.steps().filter(|s| s.status == status).collect()
    }

    /// True iff any recorded step failed or timed out.
    pub fn is_build_failed(&self) -> bool {
        self.steps().any(|s| s.status.is_failure())
    }

    /// Process exit code for this run.
    pub fn exit_code(&self) -> i32 {
        if self.is_build_failed() {
            BUILD_FAILED_EXIT_CODE
        } else {
            0
        }
    }

    pub fn step_count(&self) -> usize {
        self.steps().count()
    }

    pub fn success_steps(&self) -> Vec<&StepRunResult> {
        self.steps_with(StepRunStatus::Success)
    }

    /// Failed and timed-out steps.
    pub fn failed_steps(&self) -> Vec<&StepRunResult> {
        self.steps().filter(|s| s.status.is_failure()).collect()
    }

    pub fn failed_skippable_steps(&self) -> Vec<&StepRunResult> {
        self.steps_with(StepRunStatus::FailedSkippable)
    }

    pub fn skipped_steps(&self) -> Vec<&StepRunResult> {
        self.steps_with(StepRunStatus::Skipped)
    }

    /// Sum of step run times.
    pub fn total_duration(&self) -> Duration {
        self.steps().map(|s| s.duration).sum()
    }
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}
