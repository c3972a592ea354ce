//! Configuration schema definitions for relay.
//!
//! This module contains all the struct definitions that map to
//! the `relay.yml` configuration file and the secrets inventory.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};

use super::environment::EnvItem;
use crate::runner::events::RunEventKind;

/// Config format version this build writes and understands.
pub const CURRENT_FORMAT_VERSION: &str = "1";

/// Prefix marking a workflow as usable only from before_run / after_run.
pub const UTILITY_WORKFLOW_PREFIX: &str = "_";

/// Check whether a workflow ID names a utility workflow.
pub fn is_utility_workflow(id: &str) -> bool {
    id.starts_with(UTILITY_WORKFLOW_PREFIX)
}

/// Root configuration structure for relay.yml
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Config format version (informational)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub format_version: Option<String>,

    /// Project type tag, reported to event handlers
    #[serde(skip_serializing_if = "String::is_empty")]
    pub project_type: String,

    /// App-level settings shared by every workflow
    pub app: AppConfig,

    /// Step library: reusable step definitions by ID
    #[serde(default)]
    pub steps: HashMap<String, StepDefinition>,

    /// Workflow definitions
    #[serde(default)]
    pub workflows: HashMap<String, WorkflowConfig>,

    /// Commands notified about run lifecycle events
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub plugins: Vec<PluginConfig>,
}

impl RelayConfig {
    /// Workflow IDs split into (runnable, utility), each sorted.
    pub fn workflow_ids(&self) -> (Vec<&str>, Vec<&str>) {
        let (mut utility, mut runnable): (Vec<&str>, Vec<&str>) = self
            .workflows
            .keys()
            .map(String::as_str)
            .partition(|id| is_utility_workflow(id));
        runnable.sort_unstable();
        utility.sort_unstable();
        (runnable, utility)
    }
}

/// App-level settings
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    /// Environment variables available to every step
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvItem>,
}

/// A reusable step definition from the step library
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepDefinition {
    /// Step title (for display)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Shell script to execute
    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    /// Run even when an earlier step already failed the build
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_always_run: bool,

    /// A failure of this step does not fail the build
    #[serde(default, skip_serializing_if = "is_false")]
    pub is_skippable: bool,

    /// Hard timeout in seconds
    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    /// Step-level environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvItem>,
}

/// Inline data attached to a step reference inside a workflow.
///
/// Every field overrides the library definition when present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StepOverride {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub script: Option<String>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_always_run: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub is_skippable: Option<bool>,

    #[serde(skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvItem>,
}

/// A step entry in a workflow's `steps` list.
///
/// Written either as a bare ID (`- hello`) or as a single-key map carrying
/// inline overrides (`- hello: { title: Hi }`).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "RawStepReference", into = "RawStepReference")]
pub struct StepReference {
    /// Step ID (library key or inline identity)
    pub id: String,
    /// Inline override data
    pub overrides: StepOverride,
}

impl StepReference {
    /// Reference a library step without overrides.
    pub fn new(id: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            overrides: StepOverride::default(),
        }
    }

    /// Reference a step with inline overrides.
    pub fn with_overrides(id: impl Into<String>, overrides: StepOverride) -> Self {
        Self {
            id: id.into(),
            overrides,
        }
    }

    /// The step ID and its inline data (default when none was given).
    pub fn id_and_override(&self) -> (&str, &StepOverride) {
        (&self.id, &self.overrides)
    }
}

#[derive(Serialize, Deserialize)]
#[serde(untagged)]
enum RawStepReference {
    Id(String),
    Inline(BTreeMap<String, Option<StepOverride>>),
}

impl TryFrom<RawStepReference> for StepReference {
    type Error = String;

    fn try_from(raw: RawStepReference) -> std::result::Result<Self, Self::Error> {
        match raw {
            RawStepReference::Id(id) => Ok(StepReference::new(id)),
            RawStepReference::Inline(map) => {
                if map.len() != 1 {
                    return Err(format!(
                        "step reference must name exactly one step, found {}",
                        map.len()
                    ));
                }
                let (id, overrides) = map.into_iter().next().ok_or("empty step reference")?;
                Ok(StepReference {
                    id,
                    overrides: overrides.unwrap_or_default(),
                })
            }
        }
    }
}

impl From<StepReference> for RawStepReference {
    fn from(step: StepReference) -> Self {
        if step.overrides == StepOverride::default() {
            RawStepReference::Id(step.id)
        } else {
            RawStepReference::Inline(BTreeMap::from([(step.id, Some(step.overrides))]))
        }
    }
}

/// Configuration for a named workflow
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct WorkflowConfig {
    /// Display title; the workflow ID is used when empty
    #[serde(skip_serializing_if = "String::is_empty")]
    pub title: String,

    /// One-line description
    #[serde(skip_serializing_if = "Option::is_none")]
    pub summary: Option<String>,

    /// Workflows expanded before this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub before_run: Vec<String>,

    /// Workflows expanded after this one
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub after_run: Vec<String>,

    /// Workflow-level environment variables
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub envs: Vec<EnvItem>,

    /// Ordered step references
    #[serde(default)]
    pub steps: Vec<StepReference>,
}

impl WorkflowConfig {
    /// The title to display, falling back to the workflow ID.
    pub fn title_or<'a>(&'a self, id: &'a str) -> &'a str {
        if self.title.is_empty() {
            id
        } else {
            &self.title
        }
    }
}

/// A command notified about run lifecycle events
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginConfig {
    /// Plugin name (for logs)
    pub name: String,

    /// Shell command to run
    pub command: String,

    /// Events the plugin subscribes to (all when empty)
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub events: Vec<RunEventKind>,
}

/// Secrets inventory file (`.relay.secrets.yml`)
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SecretsInventory {
    pub envs: Vec<EnvItem>,
}

fn is_false(v: &bool) -> bool {
    !v
}
