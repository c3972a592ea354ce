//! Workflow graph expansion.

use std::collections::HashMap;

use crate::config::WorkflowConfig;
use crate::error::{RelayError, Result};

/// Expand `workflow_id` into the ordered list of workflow IDs to run.
///
/// Depth-first: every `before_run` reference (in order), the workflow
/// itself, then every `after_run` reference (in order). A workflow reached
/// from several places appears once per visit. A reference to an unknown
/// workflow expands to just its ID.
///
/// # Errors
///
/// Returns `WorkflowCycle` when a workflow is reached again while it is
/// still being expanded.
pub fn walk_workflows(
    workflow_id: &str,
    workflows: &HashMap<String, WorkflowConfig>,
) -> Result<Vec<String>> {
    let mut order = Vec::new();
    let mut active = Vec::new();
    walk(workflow_id, workflows, &mut active, &mut order)?;
    Ok(order)
}

fn walk(
    workflow_id: &str,
    workflows: &HashMap<String, WorkflowConfig>,
    active: &mut Vec<String>,
    order: &mut Vec<String>,
) -> Result<()> {
    if let Some(start) = active.iter().position(|id| id == workflow_id) {
        let mut cycle: Vec<&str> = active[start..].iter().map(String::as_str).collect();
        cycle.push(workflow_id);
        return Err(RelayError::WorkflowCycle {
            cycle: cycle.join(" -> "),
        });
    }

    let Some(workflow) = workflows.get(workflow_id) else {
        tracing::debug!("Workflow '{}' is not defined, expanding as empty", workflow_id);
        order.push(workflow_id.to_string());
        return Ok(());
    };

    active.push(workflow_id.to_string());

    for before in &workflow.before_run {
        walk(before, workflows, active, order)?;
    }

    order.push(workflow_id.to_string());

    for after in &workflow.after_run {
        walk(after, workflows, active, order)?;
    }

    active.pop();
    Ok(())
}
