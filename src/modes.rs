//! Run mode resolution.
//!
//! Every mode is resolved on its own: an explicit CLI flag wins, otherwise
//! the environment (secrets inventory first, then the process environment),
//! otherwise the compiled-in default. The resolved [`RunModes`] value is
//! passed explicitly to every component that needs it.

use std::collections::HashMap;
use std::time::Duration;

use serde::Serialize;

use crate::config::environment::{lookup, EnvItem};
use crate::error::{RelayError, Result};

pub const CI_MODE_KEY: &str = "CI";
pub const PR_MODE_KEY: &str = "PR";
pub const PULL_REQUEST_ID_KEY: &str = "PULL_REQUEST_ID";
pub const DEBUG_MODE_KEY: &str = "RELAY_DEBUG";
pub const SECRET_FILTERING_KEY: &str = "RELAY_SECRET_FILTERING";
pub const SECRET_ENVS_FILTERING_KEY: &str = "RELAY_SECRET_ENVS_FILTERING";
pub const NO_OUTPUT_TIMEOUT_KEY: &str = "RELAY_NO_OUTPUT_TIMEOUT";

const DEFAULT_SECRET_FILTERING: bool = true;
const DEFAULT_SECRET_ENVS_FILTERING: bool = true;

/// Explicit mode flags from the command line. `None` means "not given".
#[derive(Debug, Clone, Copy, Default)]
pub struct ModeFlags {
    pub ci: Option<bool>,
    pub pr: Option<bool>,
    pub debug: Option<bool>,
    pub secret_filtering: Option<bool>,
}

/// Environment view used for mode fallbacks.
///
/// The secrets inventory shadows the process environment.
#[derive(Debug, Clone, Default)]
pub struct EnvLookup {
    inventory: Vec<EnvItem>,
    process: HashMap<String, String>,
}

impl EnvLookup {
    /// Lookup over the inventory and the real process environment.
    pub fn from_process(inventory: &[EnvItem]) -> Self {
        Self {
            inventory: inventory.to_vec(),
            process: std::env::vars().collect(),
        }
    }

    /// Lookup over explicit values (for testing).
    pub fn with_vars(inventory: &[EnvItem], process: HashMap<String, String>) -> Self {
        Self {
            inventory: inventory.to_vec(),
            process,
        }
    }

    /// Get a value, inventory first.
    pub fn get(&self, key: &str) -> Option<&str> {
        lookup(&self.inventory, key).or_else(|| self.process.get(key).map(String::as_str))
    }
}

/// Resolved run modes for one invocation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RunModes {
    pub ci_mode: bool,
    pub pr_mode: bool,
    pub debug_mode: bool,
    pub secret_filtering_mode: bool,
    pub secret_envs_filtering_mode: bool,
    /// Zero disables the timeout.
    pub no_output_timeout: Duration,
}

impl Default for RunModes {
    fn default() -> Self {
        Self {
            ci_mode: false,
            pr_mode: false,
            debug_mode: false,
            secret_filtering_mode: DEFAULT_SECRET_FILTERING,
            secret_envs_filtering_mode: DEFAULT_SECRET_ENVS_FILTERING,
            no_output_timeout: Duration::ZERO,
        }
    }
}

impl RunModes {
    /// Resolve all modes.
    ///
    /// # Errors
    ///
    /// Returns `InvalidRunMode` when an environment fallback holds a value
    /// that cannot be parsed.
    pub fn resolve(flags: &ModeFlags, env: &EnvLookup) -> Result<Self> {
        let defaults = Self::default();

        let ci_mode = resolve_bool(flags.ci, env, CI_MODE_KEY, defaults.ci_mode)?;
        let pr_mode = match flags.pr {
            Some(explicit) => explicit,
            None => match env.get(PR_MODE_KEY) {
                Some(value) => parse_bool(PR_MODE_KEY, value)?,
                None => env
                    .get(PULL_REQUEST_ID_KEY)
                    .map(|id| !id.trim().is_empty())
                    .unwrap_or(defaults.pr_mode),
            },
        };
        let debug_mode = resolve_bool(flags.debug, env, DEBUG_MODE_KEY, defaults.debug_mode)?;
        let secret_filtering_mode = resolve_bool(
            flags.secret_filtering,
            env,
            SECRET_FILTERING_KEY,
            defaults.secret_filtering_mode,
        )?;
        let secret_envs_filtering_mode = resolve_bool(
            None,
            env,
            SECRET_ENVS_FILTERING_KEY,
            defaults.secret_envs_filtering_mode,
        )?;
        let no_output_timeout = match env.get(NO_OUTPUT_TIMEOUT_KEY) {
            Some(value) => parse_timeout(NO_OUTPUT_TIMEOUT_KEY, value)?,
            None => defaults.no_output_timeout,
        };

        let modes = Self {
            ci_mode,
            pr_mode,
            debug_mode,
            secret_filtering_mode,
            secret_envs_filtering_mode,
            no_output_timeout,
        };
        tracing::debug!("Resolved run modes: {:?}", modes);
        Ok(modes)
    }

    /// Whether the no-output timeout is active.
    pub fn has_no_output_timeout(&self) -> bool {
        !self.no_output_timeout.is_zero()
    }

    /// Environment exported to every step so child tools see the same modes.
    pub fn step_env(&self) -> Vec<EnvItem> {
        vec![
            EnvItem::new(CI_MODE_KEY, self.ci_mode.to_string()),
            EnvItem::new(PR_MODE_KEY, self.pr_mode.to_string()),
            EnvItem::new(DEBUG_MODE_KEY, self.debug_mode.to_string()),
            EnvItem::new(SECRET_FILTERING_KEY, self.secret_filtering_mode.to_string()),
            EnvItem::new(
                SECRET_ENVS_FILTERING_KEY,
                self.secret_envs_filtering_mode.to_string(),
            ),
        ]
    }
}

fn resolve_bool(flag: Option<bool>, env: &EnvLookup, key: &str, default: bool) -> Result<bool> {
    match flag {
        Some(explicit) => Ok(explicit),
        None => match env.get(key) {
            Some(value) => parse_bool(key, value),
            None => Ok(default),
        },
    }
}

fn parse_bool(key: &str, value: &str) -> Result<bool> {
    match value.trim().to_lowercase().as_str() {
        "true" | "1" | "yes" => Ok(true),
        "false" | "0" | "no" => Ok(false),
        _ => Err(RelayError::InvalidRunMode {
            key: key.to_string(),
            value: value.to_string(),
        }),
    }
}

fn parse_timeout(key: &str, value: &str) -> Result<Duration> {
    let trimmed = value.trim();
    if trimmed.is_empty() {
        return Ok(Duration::ZERO);
    }
    trimmed
        .parse::<u64>()
        .map(Duration::from_secs)
        .map_err(|_| RelayError::InvalidRunMode {
            key: key.to_string(),
            value: value.to_string(),
        })
}
