//! Declarative breaker configuration
//!
//! Loads the numeric part of a [`Policy`] from TOML, JSON or environment
//! variables. Callbacks (custom trip predicate, classifier, observer) cannot
//! be expressed in a file; attach them to the [`PolicyBuilder`] returned by
//! [`BreakerConfig::into_builder`].
//!
//! ## File Format
//! ```toml
//! name = "billing-api"
//! max_requests = 3
//! interval_ms = 30000
//! timeout_ms = 90000
//! consecutive_failures = 5
//! ```
//!
//! Every field is optional. Zero values normalize exactly as they do on the
//! builder, and unknown fields are rejected.
//!
//! ## Environment Variables
//! With prefix `BILLING_BREAKER`:
//! - `BILLING_BREAKER_NAME`
//! - `BILLING_BREAKER_MAX_REQUESTS`
//! - `BILLING_BREAKER_INTERVAL_MS`
//! - `BILLING_BREAKER_TIMEOUT_MS`
//! - `BILLING_BREAKER_CONSECUTIVE_FAILURES`

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::{ConfigError, ConfigResult};
use crate::policy::{Policy, PolicyBuilder};
use crate::utils::duration_millis;

/// Serializable breaker settings
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BreakerConfig {
    /// Name used to tag tracing events
    pub name: String,

    /// Half-open admission limit; 0 means the default of 1
    pub max_requests: u32,

    /// Closed-state count reset period; 0 disables it
    #[serde(rename = "interval_ms", with = "duration_millis")]
    pub interval: Duration,

    /// Open-state cooldown; 0 means the default of 60s
    #[serde(rename = "timeout_ms", with = "duration_millis")]
    pub timeout: Duration,

    /// Trip once consecutive failures exceed this; unset keeps the default
    #[serde(skip_serializing_if = "Option::is_none")]
    pub consecutive_failures: Option<u32>,
}

impl BreakerConfig {
    /// Parse a TOML document
    ///
    /// # Errors
    /// Returns `ConfigError::Toml` if the document is malformed.
    pub fn from_toml_str(contents: &str) -> ConfigResult<Self> {
        Ok(toml::from_str(contents)?)
    }

    /// Parse a JSON document
    ///
    /// # Errors
    /// Returns `ConfigError::Json` if the document is malformed.
    pub fn from_json_str(contents: &str) -> ConfigResult<Self> {
        Ok(serde_json::from_str(contents)?)
    }

    /// Load a `.toml` or `.json` file, detected by extension
    ///
    /// # Errors
    /// Returns `ConfigError` if the file cannot be read, has another
    /// extension, or fails to parse.
    pub fn from_file(path: impl AsRef<Path>) -> ConfigResult<Self> {
        let path = path.as_ref();
        let extension = path.extension().and_then(|e| e.to_str()).unwrap_or_default();
        if !matches!(extension, "toml" | "json") {
            return Err(ConfigError::UnsupportedFormat(extension.to_string()));
        }

        tracing::info!(path = %path.display(), "Loading breaker configuration from file");

        let contents = std::fs::read_to_string(path)
            .map_err(|source| ConfigError::Io { path: path.display().to_string(), source })?;

        if extension == "toml" {
            Self::from_toml_str(&contents)
        } else {
            Self::from_json_str(&contents)
        }
    }

    /// Start from the defaults and apply environment overrides under `prefix`
    ///
    /// # Errors
    /// Returns `ConfigError::Env` if a variable is set but malformed.
    pub fn from_env(prefix: &str) -> ConfigResult<Self> {
        let mut config = Self::default();
        config.apply_env_overrides(prefix)?;
        Ok(config)
    }

    /// Override fields from `<PREFIX>_*` environment variables that are set
    ///
    /// # Errors
    /// Returns `ConfigError::Env` if a variable is set but malformed.
    pub fn apply_env_overrides(&mut self, prefix: &str) -> ConfigResult<()> {
        self.apply_overrides(prefix, |key| std::env::var(key).ok())
    }

    fn apply_overrides<F>(&mut self, prefix: &str, lookup: F) -> ConfigResult<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        let key = |suffix: &str| format!("{prefix}_{suffix}");

        if let Some(name) = lookup(&key("NAME")) {
            self.name = name;
        }
        if let Some(max_requests) = parse_override(&lookup, &key("MAX_REQUESTS"))? {
            self.max_requests = max_requests;
        }
        if let Some(millis) = parse_override(&lookup, &key("INTERVAL_MS"))? {
            self.interval = Duration::from_millis(millis);
        }
        if let Some(millis) = parse_override(&lookup, &key("TIMEOUT_MS"))? {
            self.timeout = Duration::from_millis(millis);
        }
        if let Some(limit) = parse_override(&lookup, &key("CONSECUTIVE_FAILURES"))? {
            self.consecutive_failures = Some(limit);
        }

        Ok(())
    }

    /// Policy builder preloaded with these settings
    pub fn into_builder(self) -> PolicyBuilder {
        PolicyBuilder::from(self)
    }

    /// Resolve directly into a policy with default callbacks
    pub fn into_policy(self) -> Policy {
        self.into_builder().build()
    }
}

impl From<BreakerConfig> for PolicyBuilder {
    fn from(config: BreakerConfig) -> Self {
        let builder = Self::new()
            .name(config.name)
            .max_requests(config.max_requests)
            .interval(config.interval)
            .timeout(config.timeout);

        match config.consecutive_failures {
            Some(limit) => builder.trip_after_consecutive_failures(limit),
            None => builder,
        }
    }
}

fn parse_override<T, F>(lookup: &F, key: &str) -> ConfigResult<Option<T>>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|raw| {
            raw.trim().parse::<T>().map_err(|e| ConfigError::Env {
                key: key.to_string(),
                message: format!("{raw:?}: {e}"),
            })
        })
        .transpose()
}
