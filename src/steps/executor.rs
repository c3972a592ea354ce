//! Step execution engine.

use crate::config::EnvItem;
use crate::error::{RelayError, Result};
use crate::output::StepOutputWriter;
use crate::shell::{execute_streaming, CommandOptions, TimeoutKind};
use crate::steps::resolved::ResolvedStep;
use std::collections::HashMap;
use std::io::Write;
use std::path::PathBuf;
use std::time::Duration;

/// Environment a step runs in.
#[derive(Debug, Clone, Default)]
pub struct StepEnv {
    /// Ordered declarations; later entries win.
    pub vars: Vec<EnvItem>,

    /// Working directory (inherited when `None`).
    pub cwd: Option<PathBuf>,

    /// Kill the step after this long without output.
    pub no_output_timeout: Option<Duration>,
}

impl StepEnv {
    /// Flatten declarations into a map, later entries shadowing earlier ones.
    pub fn to_map(&self) -> HashMap<String, String> {
        self.vars
            .iter()
            .map(|item| (item.key.clone(), item.value.clone()))
            .collect()
    }
}

/// How a step process ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StepOutcome {
    pub exit_code: Option<i32>,
    pub success: bool,
    pub timed_out: bool,
    pub duration: Duration,
}

/// Runs a resolved step, streaming its output into a writer.
pub trait StepExecutor {
    fn execute(
        &self,
        step: &ResolvedStep,
        env: &StepEnv,
        output: &mut StepOutputWriter,
    ) -> Result<StepOutcome>;
}

/// Runs steps as `sh -c <script>`.
#[derive(Debug, Default, Clone, Copy)]
pub struct ShellStepExecutor;

impl StepExecutor for ShellStepExecutor {
    fn execute(
        &self,
        step: &ResolvedStep,
        env: &StepEnv,
        output: &mut StepOutputWriter,
    ) -> Result<StepOutcome> {
        let mut vars = env.to_map();
        for item in &step.envs {
            vars.insert(item.key.clone(), item.value.clone());
        }

        let options = CommandOptions {
            cwd: env.cwd.clone(),
            env: vars,
            no_output_timeout: env.no_output_timeout,
            timeout: step.timeout,
        };

        let mut write_failed = false;
        let result = execute_streaming(&step.script, &options, &mut |chunk| {
            if let Err(err) = output.write_all(chunk.bytes()) {
                if !write_failed {
                    tracing::warn!("Failed to write output of step '{}': {}", step.id, err);
                    write_failed = true;
                }
            }
        })
        .map_err(|err| RelayError::StepExecutionError {
            step: step.id.clone(),
            message: err.to_string(),
        })?;

        if let Some(kind) = result.timed_out {
            let reason = match kind {
                TimeoutKind::NoOutput => "no output",
                TimeoutKind::Total => "step timeout",
            };
            tracing::debug!("Step '{}' stopped ({})", step.id, reason);
        }

        Ok(StepOutcome {
            exit_code: result.exit_code,
            success: result.success,
            timed_out: result.timed_out.is_some(),
            duration: result.duration,
        })
    }
}
