//! Workflow execution orchestration.

use std::path::PathBuf;

use chrono::Utc;

use crate::config::{validate, EnvItem, RelayConfig, StepReference};
use crate::error::{RelayError, Result};
use crate::log::events::{LogEvent, StepFinishedParams, StepStartedParams};
use crate::log::summary::summary_lines;
use crate::log::{new_logger, Logger, LoggerOpts};
use crate::modes::RunModes;
use crate::output::{ErrorMessage, PipelineSpec, StepOutputWriter};
use crate::plan::{build_plan, IdProvider, StepExecutionPlan, UuidProvider};
use crate::steps::{ResolvedStep, StepEnv, StepExecutor};

use super::events::{BuildRunStart, EventBus, EventHandler, RunEvent, RunEventKind};
use super::results::{BuildRunResults, StepRunResult, StepRunStatus, WorkflowRunResult};
use super::telemetry::{default_sink, TelemetryEvent, TelemetrySink, Tracker};

pub const TRIGGERED_WORKFLOW_ID_KEY: &str = "RELAY_TRIGGERED_WORKFLOW_ID";
pub const TRIGGERED_WORKFLOW_TITLE_KEY: &str = "RELAY_TRIGGERED_WORKFLOW_TITLE";

/// Everything one run needs, resolved up front.
#[derive(Debug, Clone)]
pub struct RunConfig {
    pub modes: RunModes,
    pub config: RelayConfig,
    /// Secrets inventory entries.
    pub secrets: Vec<EnvItem>,
    /// Target workflow ID.
    pub workflow: String,
    /// Working directory for steps.
    pub cwd: Option<PathBuf>,
}

/// Runs a target workflow together with its before/after-run workflows.
pub struct WorkflowRunner {
    run_config: RunConfig,
    executor: Box<dyn StepExecutor>,
    logger_opts: LoggerOpts,
    events: EventBus,
    telemetry_sink: Option<Box<dyn TelemetrySink>>,
    ids: Box<dyn IdProvider>,
}

impl WorkflowRunner {
    pub fn new(
        run_config: RunConfig,
        executor: Box<dyn StepExecutor>,
        logger_opts: LoggerOpts,
    ) -> Self {
        Self {
            run_config,
            executor,
            logger_opts,
            events: EventBus::new(),
            telemetry_sink: None,
            ids: Box::new(UuidProvider),
        }
    }

    pub fn with_event_handler(mut self, handler: Box<dyn EventHandler>) -> Self {
        self.events.register(handler);
        self
    }

    /// Replace the telemetry sink chosen from the environment.
    pub fn with_telemetry_sink(mut self, sink: Box<dyn TelemetrySink>) -> Self {
        self.telemetry_sink = Some(sink);
        self
    }

    /// Replace the UUID generator used for plan entries.
    pub fn with_id_provider(mut self, ids: Box<dyn IdProvider>) -> Self {
        self.ids = ids;
        self
    }

    /// Run and convert the outcome into a process exit code.
    ///
    /// # Errors
    ///
    /// Any error from [`run`](Self::run), and `RunFailed` when a step
    /// failed the build.
    pub fn run_workflows_with_setup(&mut self) -> Result<i32> {
        let results = self.run()?;
        match results.exit_code() {
            0 => Ok(0),
            exit_code => Err(RelayError::RunFailed { exit_code }),
        }
    }

    /// Run the target workflow and return the aggregated results.
    ///
    /// Step failures are recorded in the results; errors are returned only
    /// for problems that stop the run before its first step.
    pub fn run(&mut self) -> Result<BuildRunResults> {
        let target = self.run_config.workflow.clone();
        if target.is_empty() {
            return Err(RelayError::WorkflowNotSpecified);
        }
        let Some(target_workflow) = self.run_config.config.workflows.get(&target) else {
            return Err(RelayError::WorkflowNotFound { workflow: target });
        };
        let target_title = target_workflow.title_or(&target).to_string();

        validate(&self.run_config.config)?;

        let sink = self.telemetry_sink.take().unwrap_or_else(default_sink);
        let mut tracker = Tracker::start(sink);
        let mut logger = new_logger(&self.logger_opts.for_cli());

        let modes = self.run_config.modes;
        let project_type = self.run_config.config.project_type.clone();

        self.events
            .emit(&RunEvent::WillStartRun(BuildRunStart::new(&target, &project_type)));
        tracker.send(
            TelemetryEvent::new("run_started")
                .with("workflow", target.as_str())
                .with("ci_mode", modes.ci_mode)
                .with("pr_mode", modes.pr_mode),
        );

        let plan = build_plan(
            &modes,
            &target,
            &self.run_config.config.workflows,
            self.ids.as_mut(),
        )?;
        logger.report_event(&LogEvent::RelayStarted(&plan));

        let mut env = self.run_config.secrets.clone();
        env.extend(self.run_config.config.app.envs.iter().cloned());
        env.push(EnvItem::new(TRIGGERED_WORKFLOW_ID_KEY, target.as_str()));
        env.push(EnvItem::new(TRIGGERED_WORKFLOW_TITLE_KEY, target_title));
        env.extend(modes.step_env());

        let mut results = BuildRunResults::new(&target, &project_type);

        for workflow_plan in &plan.execution_plan {
            let Some(workflow) = self.run_config.config.workflows.get(&workflow_plan.workflow_id)
            else {
                continue;
            };
            env.extend(workflow.envs.iter().cloned());

            let mut outcome = WorkflowRunResult {
                uuid: workflow_plan.uuid.clone(),
                workflow_id: workflow_plan.workflow_id.clone(),
                title: workflow.title_or(&workflow_plan.workflow_id).to_string(),
                steps: Vec::new(),
            };
            tracing::debug!("Running workflow '{}'", workflow_plan.workflow_id);

            for (position, (step_plan, reference)) in
                workflow_plan.steps.iter().zip(&workflow.steps).enumerate()
            {
                let build_failed = results.is_build_failed()
                    || outcome.steps.iter().any(|s| s.status.is_failure());
                let step_result = self.run_step(
                    logger.as_mut(),
                    StepInvocation {
                        position,
                        plan: step_plan,
                        reference,
                        env: &env,
                        build_failed,
                    },
                );
                tracker.send(
                    TelemetryEvent::new("step_finished")
                        .with("step", step_result.step_id.as_str())
                        .with("status", step_result.status.to_string())
                        .with("duration_ms", step_result.duration.as_millis() as u64),
                );
                outcome.steps.push(step_result);
            }

            results.record_workflow_outcome(outcome);
        }

        for line in summary_lines(&results) {
            logger.print(&line);
        }
        if results.is_build_failed() {
            logger.error(&format!(
                "relay build failed (exit code: {})",
                results.exit_code()
            ));
        } else {
            logger.done("relay build successful");
        }
        if let Err(err) = logger.flush() {
            tracing::warn!("Failed to flush log output: {}", err);
        }

        tracker.send(
            TelemetryEvent::new("run_finished")
                .with("workflow", target.as_str())
                .with("exit_code", results.exit_code())
                .with("steps", results.step_count() as u64),
        );
        results.event_name = RunEventKind::DidFinishRun.to_string();
        self.events.emit(&RunEvent::DidFinishRun(results.clone()));
        tracker.wait();

        Ok(results)
    }

    fn run_step(&self, logger: &mut dyn Logger, invocation: StepInvocation<'_>) -> StepRunResult {
        let StepInvocation {
            position,
            plan,
            reference,
            env,
            build_failed,
        } = invocation;
        let started_at = Utc::now();

        let step = match ResolvedStep::resolve(reference, &self.run_config.config.steps) {
            Ok(step) => step,
            Err(err) => {
                logger.error(&err.to_string());
                let result = StepRunResult {
                    status: StepRunStatus::Failed,
                    error_messages: vec![ErrorMessage {
                        timestamp: Utc::now(),
                        message: err.to_string(),
                    }],
                    started_at,
                    ..StepRunResult::new(&plan.uuid, &plan.step_id)
                };
                self.log_finished(logger, &result);
                return result;
            }
        };

        if build_failed && !step.is_always_run {
            let result = StepRunResult {
                started_at,
                ..StepRunResult::skipped(&plan.uuid, &plan.step_id, &step.title)
            };
            self.log_finished(logger, &result);
            return result;
        }

        logger.report_event(&LogEvent::StepStarted(&StepStartedParams {
            uuid: plan.uuid.clone(),
            position,
            step_id: step.id.clone(),
            title: step.title.clone(),
        }));

        let modes = &self.run_config.modes;
        let spec = PipelineSpec::new(
            self.secret_values(env, &step),
            modes.secret_filtering_mode,
        );
        let mut writer = StepOutputWriter::new(&spec, &self.logger_opts.for_step(&plan.uuid));
        let step_env = StepEnv {
            vars: env.to_vec(),
            cwd: self.run_config.cwd.clone(),
            no_output_timeout: modes
                .has_no_output_timeout()
                .then_some(modes.no_output_timeout),
        };

        let executed = self.executor.execute(&step, &step_env, &mut writer);
        if let Err(err) = writer.close() {
            tracing::warn!("Failed to flush output of step '{}': {}", step.id, err);
        }
        let mut error_messages = writer.error_messages().to_vec();
        drop(writer);

        let failed_status = if step.is_skippable {
            StepRunStatus::FailedSkippable
        } else {
            StepRunStatus::Failed
        };

        let (status, exit_code, duration) = match executed {
            Ok(outcome) => {
                let status = if outcome.success {
                    StepRunStatus::Success
                } else if outcome.timed_out && !step.is_skippable {
                    StepRunStatus::TimedOut
                } else {
                    failed_status
                };
                (status, outcome.exit_code, outcome.duration)
            }
            Err(err) => {
                logger.error(&err.to_string());
                error_messages.push(ErrorMessage {
                    timestamp: Utc::now(),
                    message: err.to_string(),
                });
                let elapsed = (Utc::now() - started_at).to_std().unwrap_or_default();
                (failed_status, None, elapsed)
            }
        };

        let result = StepRunResult {
            uuid: plan.uuid.clone(),
            step_id: plan.step_id.clone(),
            title: step.title.clone(),
            status,
            exit_code,
            duration,
            error_messages,
            started_at,
        };
        self.log_finished(logger, &result);
        result
    }

    fn log_finished(&self, logger: &mut dyn Logger, result: &StepRunResult) {
        logger.report_event(&LogEvent::StepFinished(&StepFinishedParams {
            uuid: result.uuid.clone(),
            step_id: result.step_id.clone(),
            title: result.title.clone(),
            status: result.status,
            exit_code: result.exit_code,
            duration: result.duration,
            errors: result.error_messages.clone(),
        }));
    }

    /// Literals redacted from one step's output.
    ///
    /// Inventory values always count; values declared `is_sensitive` in the
    /// config count when secret envs filtering is on.
    fn secret_values(&self, env: &[EnvItem], step: &ResolvedStep) -> Vec<String> {
        let mut values: Vec<String> = self
            .run_config
            .secrets
            .iter()
            .filter(|item| !item.value.is_empty())
            .map(|item| item.value.clone())
            .collect();

        if self.run_config.modes.secret_envs_filtering_mode {
            values.extend(
                env.iter()
                    .filter(|item| item.opts.is_sensitive && !item.value.is_empty())
                    .map(|item| item.value.clone()),
            );
            values.extend(step.sensitive_values());
        }

        values.sort();
        values.dedup();
        values
    }
}

struct StepInvocation<'a> {
    position: usize,
    plan: &'a StepExecutionPlan,
    reference: &'a StepReference,
    env: &'a [EnvItem],
    build_failed: bool,
}
