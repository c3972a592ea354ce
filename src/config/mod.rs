//! Configuration loading, parsing, and validation for relay.
//!
//! This module handles all aspects of configuration:
//! - Schema definitions in [`schema`]
//! - File discovery and loading in [`loader`]
//! - Environment declarations in [`environment`]
//! - Validation in [`validator`]
//!
//! # Example
//!
//! ```
//! use relay::config::{parse_config, validate};
//! use std::path::Path;
//!
//! let yaml = r#"
//! workflows:
//!   primary:
//!     steps:
//!       - hello:
//!           script: echo hello
//! "#;
//! let config = parse_config(yaml, Path::new("relay.yml")).unwrap();
//! validate(&config).unwrap();
//! assert_eq!(config.workflows["primary"].steps[0].id, "hello");
//! ```

pub mod environment;
pub mod loader;
pub mod schema;
pub mod validator;

pub use environment::{EnvItem, EnvOpts};
pub use loader::{
    load_config_file, load_inventory_file, parse_config, parse_inventory, ConfigPaths,
    DEFAULT_CONFIG_FILE, DEFAULT_SECRETS_FILE,
};
pub use schema::{
    is_utility_workflow, AppConfig, PluginConfig, RelayConfig, SecretsInventory,
    StepDefinition, StepOverride, StepReference, WorkflowConfig, CURRENT_FORMAT_VERSION,
    UTILITY_WORKFLOW_PREFIX,
};
pub use validator::{validate, validate_config, ValidationError};
