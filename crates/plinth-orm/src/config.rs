//! Flat key/value environment configuration.
//!
//! Modules and the schema composer read their settings from an
//! [`Environment`]: a flat string map with dotted keys. A TOML file can be
//! loaded by flattening nested tables with `.` separators, so
//! `[datasource] url = "..."` becomes the key `datasource.url`.

use std::collections::BTreeMap;
use std::path::Path;

use thiserror::Error;

/// Errors that can occur when loading an environment from a file.
#[derive(Debug, Error)]
pub enum ConfigError {
    /// Failed to read the configuration file.
    #[error("failed to read config file: {0}")]
    FileRead(#[from] std::io::Error),

    /// Failed to parse the configuration file.
    #[error("failed to parse config file: {0}")]
    Parse(#[from] toml::de::Error),
}

/// A flat, read-only key/value configuration lookup.
#[derive(Debug, Clone, Default)]
pub struct Environment {
    props: BTreeMap<String, String>,
}

impl Environment {
    /// Builds an environment from explicit key/value pairs.
    pub fn from_pairs<I, K, V>(pairs: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        Self {
            props: pairs
                .into_iter()
                .map(|(k, v)| (k.into(), v.into()))
                .collect(),
        }
    }

    /// Loads an environment from a TOML file, flattening nested tables
    /// into dotted keys.
    ///
    /// # Errors
    ///
    /// Returns `ConfigError` if the file cannot be read or parsed.
    pub fn from_toml_file(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let text = std::fs::read_to_string(path)?;
        let value: toml::Value = toml::from_str(&text)?;

        let mut props = BTreeMap::new();
        flatten("", &value, &mut props);
        Ok(Self { props })
    }

    /// Looks up a single configuration value.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.props.get(key).map(String::as_str)
    }

    /// Iterates over all entries whose key starts with `prefix`, yielding
    /// the key with the prefix stripped alongside the value.
    pub fn keys_with_prefix<'a>(
        &'a self,
        prefix: &'a str,
    ) -> impl Iterator<Item = (&'a str, &'a str)> {
        self.props.iter().filter_map(move |(key, value)| {
            key.strip_prefix(prefix)
                .map(|stripped| (stripped, value.as_str()))
        })
    }
}

fn flatten(prefix: &str, value: &toml::Value, out: &mut BTreeMap<String, String>) {
    match value {
        toml::Value::Table(table) => {
            for (key, nested) in table {
                let full = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten(&full, nested, out);
            }
        }
        toml::Value::String(text) => {
            out.insert(prefix.to_string(), text.clone());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}
