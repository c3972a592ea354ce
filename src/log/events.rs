//! Lifecycle events rendered by loggers.

use std::time::Duration;

use serde::{Serialize, Serializer};

use super::{ansi, Level};
use crate::output::ErrorMessage;
use crate::plan::ExecutionPlan;
use crate::runner::results::StepRunStatus;

/// An event a logger can render.
#[derive(Debug, Clone, Copy)]
pub enum LogEvent<'a> {
    /// The plan is ready and the first workflow is about to start.
    RelayStarted(&'a ExecutionPlan),
    StepStarted(&'a StepStartedParams),
    StepFinished(&'a StepFinishedParams),
}

impl LogEvent<'_> {
    /// Event type tag used in JSON records.
    pub fn event_type(&self) -> &'static str {
        match self {
            LogEvent::RelayStarted(_) => "relay_started",
            LogEvent::StepStarted(_) => "step_started",
            LogEvent::StepFinished(_) => "step_finished",
        }
    }
}

/// Data for a step-started event.
#[derive(Debug, Clone, Serialize)]
pub struct StepStartedParams {
    pub uuid: String,
    /// Zero-based index of the step within its workflow.
    pub position: usize,
    pub step_id: String,
    pub title: String,
}

/// Data for a step-finished event.
#[derive(Debug, Clone, Serialize)]
pub struct StepFinishedParams {
    pub uuid: String,
    pub step_id: String,
    pub title: String,
    pub status: StepRunStatus,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub exit_code: Option<i32>,
    #[serde(rename = "run_time_in_ms", serialize_with = "serialize_millis")]
    pub duration: Duration,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<ErrorMessage>,
}

fn serialize_millis<S: Serializer>(duration: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
    serializer.serialize_u64(duration.as_millis() as u64)
}

const BANNER: &str = "
██████╗ ███████╗██╗      █████╗ ██╗   ██╗
██╔══██╗██╔════╝██║     ██╔══██╗╚██╗ ██╔╝
██████╔╝█████╗  ██║     ███████║ ╚████╔╝
██╔══██╗██╔══╝  ██║     ██╔══██║  ╚██╔╝
██║  ██║███████╗███████╗██║  ██║   ██║
╚═╝  ╚═╝╚══════╝╚══════╝╚═╝  ╚═╝   ╚═╝
";

/// Console messages announcing a run: banner, version, modes and the
/// workflow order with the target highlighted.
pub fn started_messages(plan: &ExecutionPlan) -> Vec<(String, Level)> {
    let mut messages = vec![
        (BANNER.to_string(), Level::Normal),
        (
            format!("version: {}\n", ansi::paint(ansi::GREEN, &plan.version)),
            Level::Normal,
        ),
        ("\n".to_string(), Level::Normal),
    ];

    let modes = [
        ("CI mode", plan.ci_mode),
        ("PR mode", plan.pr_mode),
        ("Debug mode", plan.debug_mode),
        ("Secret filtering mode", plan.secret_filtering_mode),
        ("Secret Envs filtering mode", plan.secret_envs_filtering_mode),
        ("No output timeout mode", plan.no_output_timeout_mode),
    ];
    for (name, enabled) in modes {
        messages.push((format!("{}: {}\n", name, enabled), Level::Warn));
    }
    messages.push(("\n".to_string(), Level::Normal));

    let workflow_ids: Vec<String> = plan
        .execution_plan
        .iter()
        .map(|w| {
            if w.workflow_id == plan.target_workflow_id {
                ansi::paint(ansi::GREEN, &w.workflow_id)
            } else {
                w.workflow_id.clone()
            }
        })
        .collect();
    let label = if workflow_ids.len() == 1 {
        "Running workflow"
    } else {
        "Running workflows"
    };
    messages.push((
        format!(
            "{}: {}\n",
            ansi::paint(ansi::BLUE, label),
            workflow_ids.join(" -->  ")
        ),
        Level::Normal,
    ));

    messages
}
