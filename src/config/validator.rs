//! Configuration validation rules.
//!
//! This module validates configuration for correctness:
//! - before_run / after_run must reference existing workflows
//! - Workflow steps must resolve to a library step or carry an inline script
//! - Library steps must have a script
//! - No cycles through before_run / after_run references

use crate::config::schema::RelayConfig;
use crate::error::{RelayError, Result};
use std::collections::HashSet;

/// Validation error with context.
#[derive(Debug, Clone)]
pub struct ValidationError {
    /// Rule identifier
    pub rule: String,
    /// Human-readable error message
    pub message: String,
    /// Step ID if error is step-specific
    pub step: Option<String>,
    /// Workflow ID if error is workflow-specific
    pub workflow: Option<String>,
}

/// Validate a configuration and return all errors.
///
/// This function collects all validation errors rather than stopping
/// at the first one, allowing users to fix multiple issues at once.
pub fn validate_config(config: &RelayConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();

    errors.extend(validate_library(config));
    errors.extend(validate_workflows(config));
    errors.extend(validate_references(config));

    errors
}

fn validate_library(config: &RelayConfig) -> Vec<ValidationError> {
    let mut ids: Vec<_> = config.steps.keys().collect();
    ids.sort();

    ids.into_iter()
        .filter(|id| config.steps[*id].script.is_none())
        .map(|id| ValidationError {
            rule: "missing-script".to_string(),
            message: format!("Step '{}' must have a 'script'", id),
            step: Some(id.clone()),
            workflow: None,
        })
        .collect()
}

fn validate_workflows(config: &RelayConfig) -> Vec<ValidationError> {
    let mut errors = Vec::new();
    let mut ids: Vec<_> = config.workflows.keys().collect();
    ids.sort();

    for id in ids {
        let workflow = &config.workflows[id];

        for reference in workflow.before_run.iter().chain(&workflow.after_run) {
            if !config.workflows.contains_key(reference) {
                errors.push(ValidationError {
                    rule: "unknown-workflow".to_string(),
                    message: format!(
                        "Workflow '{}' references workflow '{}' which does not exist",
                        id, reference
                    ),
                    step: None,
                    workflow: Some(id.clone()),
                });
            }
        }

        for step in &workflow.steps {
            if step.overrides.script.is_none() && !config.steps.contains_key(&step.id) {
                errors.push(ValidationError {
                    rule: "unknown-step".to_string(),
                    message: format!(
                        "Workflow '{}' references step '{}' which is not in the step library and has no inline script",
                        id, step.id
                    ),
                    step: Some(step.id.clone()),
                    workflow: Some(id.clone()),
                });
            }
        }
    }

    errors
}

/// Report the first before_run / after_run cycle, if any.
fn validate_references(config: &RelayConfig) -> Vec<ValidationError> {
    let mut visited = HashSet::new();
    let mut rec_stack = HashSet::new();
    let mut path = Vec::new();

    let mut ids: Vec<_> = config.workflows.keys().collect();
    ids.sort();

    for id in ids {
        if let Some(cycle) = detect_cycle(id, config, &mut visited, &mut rec_stack, &mut path) {
            return vec![ValidationError {
                rule: "workflow-cycle".to_string(),
                message: format!("Workflow cycle detected: {}", cycle),
                step: None,
                workflow: Some(id.clone()),
            }];
        }
    }

    Vec::new()
}

fn detect_cycle(
    workflow: &str,
    config: &RelayConfig,
    visited: &mut HashSet<String>,
    rec_stack: &mut HashSet<String>,
    path: &mut Vec<String>,
) -> Option<String> {
    if rec_stack.contains(workflow) {
        let cycle_start = path.iter().position(|s| s == workflow).unwrap_or(0);
        let cycle: Vec<_> = path[cycle_start..].to_vec();
        return Some(format!("{} -> {}", cycle.join(" -> "), workflow));
    }

    if visited.contains(workflow) {
        return None;
    }

    visited.insert(workflow.to_string());
    rec_stack.insert(workflow.to_string());
    path.push(workflow.to_string());

    if let Some(config_entry) = config.workflows.get(workflow) {
        for next in config_entry.before_run.iter().chain(&config_entry.after_run) {
            if let Some(cycle) = detect_cycle(next, config, visited, rec_stack, path) {
                return Some(cycle);
            }
        }
    }

    path.pop();
    rec_stack.remove(workflow);
    None
}

/// Validate and return Result (for convenience).
///
/// # Errors
///
/// Returns `ConfigValidationError` if any validation rules fail.
pub fn validate(config: &RelayConfig) -> Result<()> {
    let errors = validate_config(config);

    if errors.is_empty() {
        Ok(())
    } else {
        let messages: Vec<_> = errors.iter().map(|e| e.message.clone()).collect();
        Err(RelayError::ConfigValidationError {
            message: messages.join("; "),
        })
    }
}
