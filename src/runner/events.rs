//! Run lifecycle events and their handlers.
//!
//! The runner emits [`RunEvent::WillStartRun`] before planning and
//! [`RunEvent::DidFinishRun`] after the summary. Handlers never affect the
//! run: a failing handler is reported as a warning and the run goes on.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::results::BuildRunResults;
use crate::config::PluginConfig;
use crate::error::{RelayError, Result};
use crate::shell::{execute, CommandOptions};

pub const PLUGIN_EVENT_ENV_KEY: &str = "RELAY_PLUGIN_EVENT";
pub const PLUGIN_PAYLOAD_ENV_KEY: &str = "RELAY_PLUGIN_PAYLOAD";

/// Event kinds handlers can subscribe to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RunEventKind {
    WillStartRun,
    DidFinishRun,
}

impl RunEventKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            RunEventKind::WillStartRun => "will_start_run",
            RunEventKind::DidFinishRun => "did_finish_run",
        }
    }
}

impl fmt::Display for RunEventKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Payload of the run-start event.
#[derive(Debug, Clone, Serialize)]
pub struct BuildRunStart {
    pub start_time: DateTime<Utc>,
    pub workflow_id: String,
    pub project_type: String,
    pub event_name: String,
}

impl BuildRunStart {
    /// A start payload stamped now.
    pub fn new(workflow_id: &str, project_type: &str) -> Self {
        Self {
            start_time: Utc::now(),
            workflow_id: workflow_id.to_string(),
            project_type: project_type.to_string(),
            event_name: RunEventKind::WillStartRun.to_string(),
        }
    }
}

/// A lifecycle event.
#[derive(Debug, Clone)]
pub enum RunEvent {
    WillStartRun(BuildRunStart),
    DidFinishRun(BuildRunResults),
}

impl RunEvent {
    pub fn kind(&self) -> RunEventKind {
        match self {
            RunEvent::WillStartRun(_) => RunEventKind::WillStartRun,
            RunEvent::DidFinishRun(_) => RunEventKind::DidFinishRun,
        }
    }

    /// The event payload as JSON.
    pub fn payload(&self) -> Result<String> {
        let json = match self {
            RunEvent::WillStartRun(start) => serde_json::to_string(start)?,
            RunEvent::DidFinishRun(results) => serde_json::to_string(results)?,
        };
        Ok(json)
    }
}

/// Reacts to lifecycle events.
pub trait EventHandler {
    /// Name used in diagnostics.
    fn name(&self) -> &str;

    /// Whether this handler wants events of `kind`.
    fn is_subscribed(&self, _kind: RunEventKind) -> bool {
        true
    }

    fn handle(&self, event: &RunEvent) -> Result<()>;
}

/// Dispatches events to registered handlers.
#[derive(Default)]
pub struct EventBus {
    handlers: Vec<Box<dyn EventHandler>>,
}

impl EventBus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn register(&mut self, handler: Box<dyn EventHandler>) {
        self.handlers.push(handler);
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Deliver `event` to every subscribed handler, in registration order.
    pub fn emit(&self, event: &RunEvent) {
        let kind = event.kind();
        for handler in &self.handlers {
            if !handler.is_subscribed(kind) {
                continue;
            }
            if let Err(err) = handler.handle(event) {
                tracing::warn!("Event handler '{}' failed on {}: {}", handler.name(), kind, err);
            }
        }
    }
}

/// Runs a configured shell command for subscribed events.
///
/// The command sees the event kind in `RELAY_PLUGIN_EVENT` and the JSON
/// payload in `RELAY_PLUGIN_PAYLOAD`.
#[derive(Debug, Clone)]
pub struct PluginHook {
    config: PluginConfig,
}

impl PluginHook {
    pub fn new(config: PluginConfig) -> Self {
        Self { config }
    }

    /// One boxed hook per configured plugin.
    pub fn from_configs(configs: &[PluginConfig]) -> Vec<Box<dyn EventHandler>> {
        configs
            .iter()
            .cloned()
            .map(|config| Box::new(PluginHook::new(config)) as Box<dyn EventHandler>)
            .collect()
    }
}

impl EventHandler for PluginHook {
    fn name(&self) -> &str {
        &self.config.name
    }

    fn is_subscribed(&self, kind: RunEventKind) -> bool {
        self.config.events.is_empty() || self.config.events.contains(&kind)
    }

    fn handle(&self, event: &RunEvent) -> Result<()> {
        let mut options = CommandOptions::default();
        options
            .env
            .insert(PLUGIN_EVENT_ENV_KEY.to_string(), event.kind().to_string());
        options
            .env
            .insert(PLUGIN_PAYLOAD_ENV_KEY.to_string(), event.payload()?);

        let result = execute(&self.config.command, &options)?;
        for line in result.stdout.lines() {
            tracing::debug!("[plugin {}] {}", self.config.name, line);
        }
        if !result.success {
            return Err(RelayError::CommandFailed {
                command: self.config.command.clone(),
                code: result.exit_code,
            });
        }
        Ok(())
    }
}
