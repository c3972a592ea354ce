//! Workflow run planning.
//!
//! - [`walk_workflows`] flattens the before/after-run graph
//! - [`build_plan`] turns the flattened list into an [`ExecutionPlan`] with a
//!   unique identifier for every workflow and step invocation
//!
//! # Example
//!
//! ```
//! use relay::config::{StepReference, WorkflowConfig};
//! use relay::modes::RunModes;
//! use relay::plan::build_plan;
//! use std::collections::HashMap;
//!
//! let mut workflows = HashMap::new();
//! workflows.insert(
//!     "primary".to_string(),
//!     WorkflowConfig {
//!         before_run: vec!["setup".to_string()],
//!         steps: vec![StepReference::new("stepA")],
//!         ..Default::default()
//!     },
//! );
//! workflows.insert(
//!     "setup".to_string(),
//!     WorkflowConfig {
//!         steps: vec![StepReference::new("stepB")],
//!         ..Default::default()
//!     },
//! );
//!
//! let mut next = 0;
//! let mut ids = || {
//!     next += 1;
//!     format!("id-{}", next)
//! };
//! let plan = build_plan(&RunModes::default(), "primary", &workflows, &mut ids).unwrap();
//! let order: Vec<_> = plan.execution_plan.iter().map(|w| w.workflow_id.as_str()).collect();
//! assert_eq!(order, vec!["setup", "primary"]);
//! ```

pub mod walk;

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::WorkflowConfig;
use crate::error::{RelayError, Result};
use crate::modes::RunModes;

pub use walk::walk_workflows;

/// Version of the structured log format.
pub const LOG_FORMAT_VERSION: &str = "1";

/// Source of unique plan entry identifiers.
pub trait IdProvider {
    /// Return an identifier never returned before by this provider.
    fn next_id(&mut self) -> String;
}

/// Random UUID v4 identifiers.
#[derive(Debug, Default, Clone, Copy)]
pub struct UuidProvider;

impl IdProvider for UuidProvider {
    fn next_id(&mut self) -> String {
        Uuid::new_v4().to_string()
    }
}

impl<F> IdProvider for F
where
    F: FnMut() -> String,
{
    fn next_id(&mut self) -> String {
        self()
    }
}

/// One step invocation in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StepExecutionPlan {
    pub uuid: String,
    pub step_id: String,
}

/// One workflow invocation in the plan.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorkflowExecutionPlan {
    pub uuid: String,
    pub workflow_id: String,
    pub steps: Vec<StepExecutionPlan>,
}

/// The flattened, ordered plan for one invocation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExecutionPlan {
    pub version: String,
    pub log_format_version: String,
    pub ci_mode: bool,
    pub pr_mode: bool,
    pub debug_mode: bool,
    pub no_output_timeout_mode: bool,
    pub secret_filtering_mode: bool,
    pub secret_envs_filtering_mode: bool,
    pub target_workflow_id: String,
    /// Execution order.
    pub execution_plan: Vec<WorkflowExecutionPlan>,
}

impl ExecutionPlan {
    /// Total number of step invocations.
    pub fn step_count(&self) -> usize {
        self.execution_plan.iter().map(|w| w.steps.len()).sum()
    }

    /// Workflow IDs in execution order.
    pub fn workflow_ids(&self) -> Vec<&str> {
        self.execution_plan
            .iter()
            .map(|w| w.workflow_id.as_str())
            .collect()
    }
}

/// Build the execution plan for `target`.
///
/// Workflows reached by the walk but missing from `workflows` get no plan
/// entry, so an absent target yields an empty plan and fails with
/// `NothingToRun` instead of planning a workflow that does not exist.
/// Configuration validation reports missing references before a real run.
///
/// # Errors
///
/// Returns `WorkflowCycle` if the references form a cycle and
/// `NothingToRun` if the plan comes out empty.
pub fn build_plan(
    modes: &RunModes,
    target: &str,
    workflows: &HashMap<String, WorkflowConfig>,
    ids: &mut dyn IdProvider,
) -> Result<ExecutionPlan> {
    let mut execution_plan = Vec::new();

    for workflow_id in walk_workflows(target, workflows)? {
        let Some(workflow) = workflows.get(&workflow_id) else {
            tracing::warn!("Skipping undefined workflow '{}' while planning", workflow_id);
            continue;
        };

        let steps = workflow
            .steps
            .iter()
            .map(|step| StepExecutionPlan {
                uuid: ids.next_id(),
                step_id: step.id.clone(),
            })
            .collect();

        execution_plan.push(WorkflowExecutionPlan {
            uuid: ids.next_id(),
            workflow_id,
            steps,
        });
    }

    if execution_plan.is_empty() {
        return Err(RelayError::NothingToRun);
    }

    Ok(ExecutionPlan {
        version: env!("CARGO_PKG_VERSION").to_string(),
        log_format_version: LOG_FORMAT_VERSION.to_string(),
        ci_mode: modes.ci_mode,
        pr_mode: modes.pr_mode,
        debug_mode: modes.debug_mode,
        no_output_timeout_mode: modes.has_no_output_timeout(),
        secret_filtering_mode: modes.secret_filtering_mode,
        secret_envs_filtering_mode: modes.secret_envs_filtering_mode,
        target_workflow_id: target.to_string(),
        execution_plan,
    })
}
