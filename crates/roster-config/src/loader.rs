//! Layered loading: defaults, then an optional YAML file, then `ROSTER_*`
//! environment overrides, then validation.
//!
//! # Design
//! - The environment is captured once into a map so tests can inject values
//!   without touching the process environment.
//! - Unknown `ROSTER_*` variables are ignored; malformed values are errors.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::str::FromStr;

use tracing::{debug, info};

use crate::error::{ConfigError, ConfigResult};
use crate::model::RosterConfig;
use crate::validate::validate;

/// Prefix shared by every environment override.
pub const ENV_PREFIX: &str = "ROSTER_";

/// Builder for a validated [`RosterConfig`].
#[derive(Debug, Clone, Default)]
pub struct ConfigLoader {
    path: Option<PathBuf>,
    env: BTreeMap<String, String>,
}

impl ConfigLoader {
    /// Loader reading overrides from the process environment.
    #[must_use]
    pub fn from_process_env() -> Self {
        Self::default().with_env(std::env::vars())
    }

    /// Read the YAML file at `path` between defaults and overrides.
    #[must_use]
    pub fn with_file(mut self, path: impl Into<PathBuf>) -> Self {
        self.path = Some(path.into());
        self
    }

    /// Replace the environment used for overrides. Only `ROSTER_*` keys are
    /// kept.
    #[must_use]
    pub fn with_env<I, K, V>(mut self, vars: I) -> Self
    where
        I: IntoIterator<Item = (K, V)>,
        K: Into<String>,
        V: Into<String>,
    {
        self.env = vars
            .into_iter()
            .map(|(key, value)| (key.into(), value.into()))
            .filter(|(key, _)| key.starts_with(ENV_PREFIX))
            .collect();
        self
    }

    /// Produce the layered, validated configuration.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] or [`ConfigError::Parse`] for file
    /// problems and [`ConfigError::InvalidField`] for bad overrides or values
    /// failing validation.
    pub fn load(&self) -> ConfigResult<RosterConfig> {
        let mut config = match &self.path {
            Some(path) => read_file(path)?,
            None => RosterConfig::default(),
        };
        self.apply_env(&mut config)?;
        validate(&config)?;
        Ok(config)
    }

    fn apply_env(&self, config: &mut RosterConfig) -> ConfigResult<()> {
        for (key, value) in &self.env {
            let name = &key[ENV_PREFIX.len()..];
            match name {
                "API_URL" => config.api.url.clone_from(value),
                "API_KEY" => config.api.api_key = non_empty(value),
                "HTTP_TIMEOUT_SECS" => config.api.timeout_secs = parse_number(key, value)?,
                "POLL_INTERVAL_MS" => config.polling.interval_ms = parse_number(key, value)?,
                "POLL_FAILURE_THRESHOLD" => {
                    config.polling.failure_threshold = parse_number(key, value)?;
                }
                "LOG_LEVEL" => config.logging.level.clone_from(value),
                "LOG_FORMAT" => config.logging.format = non_empty(value),
                _ => continue,
            }
            debug!(variable = %key, "configuration override applied");
        }
        Ok(())
    }
}

fn read_file(path: &Path) -> ConfigResult<RosterConfig> {
    let raw = fs::read_to_string(path).map_err(|source| ConfigError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    if raw.trim().is_empty() {
        info!(path = %path.display(), "configuration file empty; using defaults");
        return Ok(RosterConfig::default());
    }
    let config = serde_yaml::from_str(&raw).map_err(|source| ConfigError::Parse {
        path: path.to_path_buf(),
        source,
    })?;
    info!(path = %path.display(), "configuration file loaded");
    Ok(config)
}

fn parse_number<T: FromStr>(key: &str, value: &str) -> ConfigResult<T> {
    value
        .trim()
        .parse()
        .map_err(|_| ConfigError::invalid("env", key, Some(value), "must be an unsigned integer"))
}

fn non_empty(value: &str) -> Option<String> {
    let trimmed = value.trim();
    (!trimmed.is_empty()).then(|| trimmed.to_string())
}
