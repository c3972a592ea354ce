//! Configuration file discovery and loading.
//!
//! Reads the workflow config (`relay.yml` by default) and the optional
//! secrets inventory (`.relay.secrets.yml` by default).

use crate::config::schema::{RelayConfig, SecretsInventory};
use crate::config::EnvItem;
use crate::error::{RelayError, Result};
use std::fs;
use std::path::{Path, PathBuf};

/// Default workflow config file name.
pub const DEFAULT_CONFIG_FILE: &str = "relay.yml";

/// Default secrets inventory file name.
pub const DEFAULT_SECRETS_FILE: &str = ".relay.secrets.yml";

/// Resolved locations of the config and inventory files.
#[derive(Debug, Clone)]
pub struct ConfigPaths {
    /// Workflow config file (required).
    pub config: PathBuf,

    /// Secrets inventory (optional).
    pub inventory: Option<PathBuf>,
}

impl ConfigPaths {
    /// Resolve paths relative to `project_root`.
    ///
    /// Explicit paths always win. Without an explicit inventory the default
    /// inventory is used only if it exists.
    pub fn discover(
        project_root: &Path,
        config: Option<&Path>,
        inventory: Option<&Path>,
    ) -> Self {
        let config = match config {
            Some(path) => project_root.join(path),
            None => project_root.join(DEFAULT_CONFIG_FILE),
        };

        let inventory = match inventory {
            Some(path) => Some(project_root.join(path)),
            None => {
                let default = project_root.join(DEFAULT_SECRETS_FILE);
                default.exists().then_some(default)
            }
        };

        Self { config, inventory }
    }
}

fn read_file(path: &Path) -> Result<String> {
    fs::read_to_string(path).map_err(|e| {
        if e.kind() == std::io::ErrorKind::NotFound {
            RelayError::ConfigNotFound {
                path: path.to_path_buf(),
            }
        } else {
            RelayError::Io(e)
        }
    })
}

/// Load a config file and parse it into [`RelayConfig`].
///
/// # Errors
///
/// Returns `ConfigNotFound` if the file doesn't exist.
/// Returns `ConfigParseError` if the YAML is invalid.
pub fn load_config_file(path: &Path) -> Result<RelayConfig> {
    let content = read_file(path)?;
    parse_config(&content, path)
}

/// Parse YAML content into [`RelayConfig`].
///
/// # Arguments
///
/// * `content` - The YAML content to parse
/// * `source_path` - Path for error reporting
pub fn parse_config(content: &str, source_path: &Path) -> Result<RelayConfig> {
    serde_yaml::from_str(content).map_err(|e| RelayError::ConfigParseError {
        path: source_path.to_path_buf(),
        message: e.to_string(),
    })
}

/// Load the secrets inventory and return its env items.
pub fn load_inventory_file(path: &Path) -> Result<Vec<EnvItem>> {
    let content = read_file(path)?;
    parse_inventory(&content, path)
}

/// Parse secrets inventory YAML.
///
/// An empty document is an empty inventory.
pub fn parse_inventory(content: &str, source_path: &Path) -> Result<Vec<EnvItem>> {
    if content.trim().is_empty() {
        return Ok(Vec::new());
    }

    let inventory: SecretsInventory =
        serde_yaml::from_str(content).map_err(|e| RelayError::ConfigParseError {
            path: source_path.to_path_buf(),
            message: e.to_string(),
        })?;
    Ok(inventory.envs)
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn discover_uses_defaults() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::discover(temp.path(), None, None);
        assert_eq!(paths.config, temp.path().join(DEFAULT_CONFIG_FILE));
        assert!(paths.inventory.is_none());
    }

    #[test]
    fn discover_picks_up_existing_default_inventory() {
        let temp = TempDir::new().unwrap();
        fs::write(temp.path().join(DEFAULT_SECRETS_FILE), "envs: []").unwrap();
        let paths = ConfigPaths::discover(temp.path(), None, None);
        assert_eq!(paths.inventory, Some(temp.path().join(DEFAULT_SECRETS_FILE)));
    }

    #[test]
    fn discover_prefers_explicit_paths() {
        let temp = TempDir::new().unwrap();
        let paths = ConfigPaths::discover(
            temp.path(),
            Some(Path::new("ci/relay.yml")),
            Some(Path::new("ci/secrets.yml")),
        );
        assert_eq!(paths.config, temp.path().join("ci/relay.yml"));
        assert_eq!(paths.inventory, Some(temp.path().join("ci/secrets.yml")));
    }

    #[test]
    fn missing_config_is_config_not_found() {
        let temp = TempDir::new().unwrap();
        let result = load_config_file(&temp.path().join("relay.yml"));
        assert!(matches!(result, Err(RelayError::ConfigNotFound { .. })));
    }

    #[test]
    fn invalid_yaml_is_parse_error() {
        let result = parse_config("workflows: [unclosed", Path::new("relay.yml"));
        assert!(matches!(result, Err(RelayError::ConfigParseError { .. })));
    }

    #[test]
    fn loads_config_from_disk() {
        let temp = TempDir::new().unwrap();
        let path = temp.path().join("relay.yml");
        fs::write(&path, "workflows:\n  primary:\n    steps: [hello]\n").unwrap();
        let config = load_config_file(&path).unwrap();
        assert!(config.workflows.contains_key("primary"));
    }

    #[test]
    fn parses_inventory() {
        let envs = parse_inventory(
            "envs:\n  - API_TOKEN: s3cr3t\n  - USER: me\n",
            Path::new(DEFAULT_SECRETS_FILE),
        )
        .unwrap();
        assert_eq!(envs.len(), 2);
        assert_eq!(envs[0].value, "s3cr3t");
    }

    #[test]
    fn empty_inventory_is_empty() {
        let envs = parse_inventory("\n", Path::new(DEFAULT_SECRETS_FILE)).unwrap();
        assert!(envs.is_empty());
    }
}
