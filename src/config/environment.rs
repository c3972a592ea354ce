//! Environment variable declarations.
//!
//! Config files declare environment variables as an ordered list of
//! single-key maps, optionally with an `opts` entry:
//!
//! ```yaml
//! envs:
//!   - PROJECT: demo
//!   - API_TOKEN: abc123
//!     opts:
//!       is_sensitive: true
//! ```

use serde::{Deserialize, Serialize};
use serde_yaml::Value;
use std::collections::BTreeMap;

const OPTS_KEY: &str = "opts";

/// Options attached to an environment declaration.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EnvOpts {
    /// Value must be redacted from step output.
    pub is_sensitive: bool,
}

/// A single `KEY: value` environment declaration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(
    try_from = "BTreeMap<String, Value>",
    into = "BTreeMap<String, Value>"
)]
pub struct EnvItem {
    pub key: String,
    pub value: String,
    pub opts: EnvOpts,
}

impl EnvItem {
    /// Create a plain environment item.
    pub fn new(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            opts: EnvOpts::default(),
        }
    }

    /// Create an environment item whose value is redacted from output.
    pub fn sensitive(key: impl Into<String>, value: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            value: value.into(),
            opts: EnvOpts { is_sensitive: true },
        }
    }
}

impl TryFrom<BTreeMap<String, Value>> for EnvItem {
    type Error = String;

    fn try_from(mut map: BTreeMap<String, Value>) -> std::result::Result<Self, Self::Error> {
        let opts = match map.remove(OPTS_KEY) {
            Some(value) => serde_yaml::from_value(value)
                .map_err(|e| format!("invalid env opts: {}", e))?,
            None => EnvOpts::default(),
        };

        if map.len() != 1 {
            return Err(format!(
                "env item must have exactly one key besides '{}', found {}",
                OPTS_KEY,
                map.len()
            ));
        }

        let (key, value) = map.into_iter().next().ok_or("empty env item")?;
        if key.is_empty() {
            return Err("env item key must not be empty".to_string());
        }

        Ok(EnvItem {
            key,
            value: scalar_to_string(value)?,
            opts,
        })
    }
}

impl From<EnvItem> for BTreeMap<String, Value> {
    fn from(item: EnvItem) -> Self {
        let mut map = BTreeMap::new();
        map.insert(item.key, Value::String(item.value));
        if item.opts != EnvOpts::default() {
            if let Ok(opts) = serde_yaml::to_value(item.opts) {
                map.insert(OPTS_KEY.to_string(), opts);
            }
        }
        map
    }
}

fn scalar_to_string(value: Value) -> std::result::Result<String, String> {
    match value {
        Value::Null => Ok(String::new()),
        Value::Bool(b) => Ok(b.to_string()),
        Value::Number(n) => Ok(n.to_string()),
        Value::String(s) => Ok(s),
        other => Err(format!("env value must be a scalar, got {:?}", other)),
    }
}

/// Look up the last declaration of `key` (later declarations win).
pub fn lookup<'a>(items: &'a [EnvItem], key: &str) -> Option<&'a str> {
    items
        .iter()
        .rev()
        .find(|item| item.key == key)
        .map(|item| item.value.as_str())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_simple_item() {
        let items: Vec<EnvItem> = serde_yaml::from_str("- FOO: bar").unwrap();
        assert_eq!(items, vec![EnvItem::new("FOO", "bar")]);
    }

    #[test]
    fn parses_item_with_opts() {
        let yaml = "- TOKEN: abc\n  opts:\n    is_sensitive: true\n";
        let items: Vec<EnvItem> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(items, vec![EnvItem::sensitive("TOKEN", "abc")]);
    }

    #[test]
    fn stringifies_scalars() {
        let yaml = "- COUNT: 3\n- ENABLED: true\n- EMPTY:\n";
        let items: Vec<EnvItem> = serde_yaml::from_str(yaml).unwrap();
        assert_eq!(items[0].value, "3");
        assert_eq!(items[1].value, "true");
        assert_eq!(items[2].value, "");
    }

    #[test]
    fn rejects_two_keys() {
        let result: std::result::Result<Vec<EnvItem>, _> =
            serde_yaml::from_str("- A: 1\n  B: 2\n");
        assert!(result.is_err());
    }

    #[test]
    fn rejects_nested_values() {
        let result: std::result::Result<Vec<EnvItem>, _> =
            serde_yaml::from_str("- A: [1, 2]\n");
        assert!(result.is_err());
    }

    #[test]
    fn lookup_prefers_later_declarations() {
        let items = vec![EnvItem::new("CI", "false"), EnvItem::new("CI", "true")];
        assert_eq!(lookup(&items, "CI"), Some("true"));
        assert_eq!(lookup(&items, "PR"), None);
    }
}
