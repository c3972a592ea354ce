//! Resolved step ready for execution.
//!
//! A ResolvedStep combines the step library definition with the inline
//! data of a workflow's step reference.

use crate::config::{EnvItem, StepDefinition, StepReference};
use crate::error::{RelayError, Result};
use std::collections::HashMap;
use std::time::Duration;

/// A fully resolved step ready for execution.
#[derive(Debug, Clone, PartialEq)]
pub struct ResolvedStep {
    /// Step ID (from the workflow's step list).
    pub id: String,

    /// Display title.
    pub title: String,

    /// Shell script to execute.
    pub script: String,

    /// Run even when the build already failed.
    pub is_always_run: bool,

    /// Failures don't fail the build.
    pub is_skippable: bool,

    /// Hard timeout.
    pub timeout: Option<Duration>,

    /// Step environment, library entries first.
    pub envs: Vec<EnvItem>,
}

impl ResolvedStep {
    /// Resolve a step reference against the step library.
    ///
    /// Inline data wins field by field; environment lists are concatenated
    /// so inline entries shadow library entries with the same key.
    ///
    /// # Errors
    ///
    /// Returns `StepExecutionError` when neither the library nor the inline
    /// data provides a script.
    pub fn resolve(
        reference: &StepReference,
        library: &HashMap<String, StepDefinition>,
    ) -> Result<Self> {
        let (id, inline) = reference.id_and_override();
        let base = library.get(id).cloned().unwrap_or_default();

        let script = inline
            .script
            .clone()
            .or(base.script)
            .filter(|s| !s.trim().is_empty())
            .ok_or_else(|| RelayError::StepExecutionError {
                step: id.to_string(),
                message: "no script defined".to_string(),
            })?;

        let title = inline
            .title
            .clone()
            .or(base.title)
            .filter(|t| !t.is_empty())
            .unwrap_or_else(|| id.to_string());

        let mut envs = base.envs;
        envs.extend(inline.envs.iter().cloned());

        Ok(Self {
            id: id.to_string(),
            title,
            script,
            is_always_run: inline.is_always_run.unwrap_or(base.is_always_run),
            is_skippable: inline.is_skippable.unwrap_or(base.is_skippable),
            timeout: inline
                .timeout
                .or(base.timeout)
                .filter(|secs| *secs > 0)
                .map(Duration::from_secs),
            envs,
        })
    }

    /// Values of this step's sensitive environment entries.
    pub fn sensitive_values(&self) -> Vec<String> {
        self.envs
            .iter()
            .filter(|e| e.opts.is_sensitive && !e.value.is_empty())
            .map(|e| e.value.clone())
            .collect()
    }
}
