//! YAML settings file for the command line runner.
//!
//! ```yaml
//! endpoint: http://localhost:8080
//! headers:
//!   Authorization: Bearer abc
//! world:
//!   apiKey: ${env:API_KEY}
//! store:
//!   tenant: acme
//! retry:
//!   enabled: true
//!   initialDelay: 250
//!   maxDelay: 5000
//!   failAfter: 3
//! ```

use std::{
    fs,
    path::{Path, PathBuf},
};

use indexmap::IndexMap;
use once_cell::sync::Lazy;
use regex::{Captures, Regex};
use serde::Deserialize;
use serde_json::{Map as JsonMap, Value};
use stepwise_engine::RetryPolicy;
use stepwise_types::{RetryConfiguration, Store, World};
use thiserror::Error;
use tracing::debug;

static ENV_PLACEHOLDER: Lazy<Regex> = Lazy::new(|| Regex::new(r"\$\{env:([\w+_-]*)}").expect("valid env placeholder pattern"));

#[derive(Debug, Error)]
pub enum SettingsError {
    #[error("failed to read settings file {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },
    #[error("invalid settings file {path}: {source}")]
    Yaml {
        path: PathBuf,
        #[source]
        source: serde_yaml::Error,
    },
    #[error("environment variable {name} referenced by world value '{key}' is not set")]
    MissingEnvVar { key: String, name: String },
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct RetrySettings {
    #[serde(default = "enabled_by_default")]
    pub enabled: bool,
    pub initial_delay: Option<u64>,
    pub max_delay: Option<u64>,
    pub fail_after: Option<u32>,
}

fn enabled_by_default() -> bool {
    true
}

#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase", deny_unknown_fields)]
pub struct Settings {
    /// Base URL for relative request paths.
    pub endpoint: Option<String>,
    /// Headers sent with every request.
    #[serde(default)]
    pub headers: IndexMap<String, String>,
    #[serde(default)]
    pub world: JsonMap<String, Value>,
    #[serde(default)]
    pub store: JsonMap<String, Value>,
    pub retry: Option<RetrySettings>,
}

impl Settings {
    /// Reads `path` and expands `${env:NAME}` in world strings.
    pub fn load(path: &Path) -> Result<Self, SettingsError> {
        let text = fs::read_to_string(path).map_err(|source| SettingsError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        let settings = Self::from_yaml(&text).map_err(|source| SettingsError::Yaml {
            path: path.to_path_buf(),
            source,
        })?;
        debug!(path = %path.display(), world_keys = settings.world.len(), "loaded settings");
        settings.expand_world(|name| std::env::var(name).ok())
    }

    pub fn from_yaml(text: &str) -> Result<Self, serde_yaml::Error> {
        if text.trim().is_empty() {
            return Ok(Self::default());
        }
        serde_yaml::from_str(text)
    }

    /// Replaces `${env:NAME}` placeholders in world strings using `lookup`.
    pub fn expand_world<F>(mut self, lookup: F) -> Result<Self, SettingsError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut expanded = JsonMap::with_capacity(self.world.len());
        for (key, value) in std::mem::take(&mut self.world) {
            let value = expand_value(&key, value, &lookup)?;
            expanded.insert(key, value);
        }
        self.world = expanded;
        Ok(self)
    }

    pub fn world(&self) -> World {
        World::new(self.world.clone())
    }

    pub fn store(&self) -> Store {
        Store::from(self.store.clone())
    }

    /// Retry policy for the run; `no_retry` wins over the file.
    pub fn retry_policy(&self, no_retry: bool) -> RetryPolicy {
        if no_retry {
            return RetryPolicy::disabled();
        }
        let Some(retry) = &self.retry else {
            return RetryPolicy::default();
        };
        let configured = retry.initial_delay.is_some() || retry.max_delay.is_some() || retry.fail_after.is_some();
        let default = configured.then(|| {
            let fallback = RetryConfiguration::default();
            RetryConfiguration {
                initial_delay: retry.initial_delay.unwrap_or(fallback.initial_delay),
                max_delay: retry.max_delay.unwrap_or(fallback.max_delay),
                fail_after: retry.fail_after.unwrap_or(fallback.fail_after),
            }
        });
        RetryPolicy {
            enabled: retry.enabled,
            default,
        }
    }
}

fn expand_value<F>(key: &str, value: Value, lookup: &F) -> Result<Value, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    match value {
        Value::String(text) => expand_string(key, &text, lookup).map(Value::String),
        Value::Array(items) => items
            .into_iter()
            .map(|item| expand_value(key, item, lookup))
            .collect::<Result<Vec<_>, _>>()
            .map(Value::Array),
        Value::Object(map) => {
            let mut expanded = JsonMap::with_capacity(map.len());
            for (child, value) in map {
                let value = expand_value(key, value, lookup)?;
                expanded.insert(child, value);
            }
            Ok(Value::Object(expanded))
        }
        other => Ok(other),
    }
}

fn expand_string<F>(key: &str, text: &str, lookup: &F) -> Result<String, SettingsError>
where
    F: Fn(&str) -> Option<String>,
{
    let mut missing = None;
    let expanded = ENV_PLACEHOLDER.replace_all(text, |captures: &Captures| {
        let name = &captures[1];
        match lookup(name) {
            Some(value) => {
                debug!("Interpolated env var: {} -> [REDACTED]", name);
                value
            }
            None => {
                missing.get_or_insert_with(|| name.to_string());
                String::new()
            }
        }
    });
    match missing {
        Some(name) => Err(SettingsError::MissingEnvVar {
            key: key.to_string(),
            name,
        }),
        None => Ok(expanded.into_owned()),
    }
}
