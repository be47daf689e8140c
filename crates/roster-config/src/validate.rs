//! Validation of a loaded configuration.

use url::Url;

use crate::error::{ConfigError, ConfigResult};
use crate::model::RosterConfig;

const LOG_LEVELS: [&str; 5] = ["trace", "debug", "info", "warn", "error"];
const LOG_FORMATS: [&str; 2] = ["json", "pretty"];
const MAX_TIMEOUT_SECS: u64 = 300;
const MIN_POLL_INTERVAL_MS: u64 = 100;
const MAX_POLL_INTERVAL_MS: u64 = 3_600_000;

/// Parse and check the catalog base URL.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidField`] when the URL does not parse or is not
/// http(s).
pub fn parse_api_url(value: &str) -> ConfigResult<Url> {
    let url = Url::parse(value.trim())
        .map_err(|_| ConfigError::invalid("api", "url", Some(value), "must be an absolute URL"))?;
    if !matches!(url.scheme(), "http" | "https") {
        return Err(ConfigError::invalid(
            "api",
            "url",
            Some(value),
            "scheme must be http or https",
        ));
    }
    Ok(url)
}

/// Check every section of `config`.
///
/// # Errors
///
/// Returns the first [`ConfigError::InvalidField`] encountered.
pub fn validate(config: &RosterConfig) -> ConfigResult<()> {
    parse_api_url(&config.api.url)?;

    if let Some(key) = &config.api.api_key {
        let valid = key
            .split_once(':')
            .is_some_and(|(id, secret)| !id.trim().is_empty() && !secret.trim().is_empty());
        if !valid {
            return Err(ConfigError::invalid(
                "api",
                "api_key",
                None,
                "must be formatted as key_id:secret",
            ));
        }
    }

    if !(1..=MAX_TIMEOUT_SECS).contains(&config.api.timeout_secs) {
        return Err(ConfigError::invalid(
            "api",
            "timeout_secs",
            Some(&config.api.timeout_secs.to_string()),
            "must be between 1 and 300",
        ));
    }

    if !(MIN_POLL_INTERVAL_MS..=MAX_POLL_INTERVAL_MS).contains(&config.polling.interval_ms) {
        return Err(ConfigError::invalid(
            "polling",
            "interval_ms",
            Some(&config.polling.interval_ms.to_string()),
            "must be between 100 and 3600000",
        ));
    }

    let level = config.logging.level.trim().to_ascii_lowercase();
    if !LOG_LEVELS.contains(&level.as_str()) {
        return Err(ConfigError::invalid(
            "logging",
            "level",
            Some(&config.logging.level),
            "must be one of trace, debug, info, warn, error",
        ));
    }

    if let Some(format) = &config.logging.format
        && !LOG_FORMATS.contains(&format.trim().to_ascii_lowercase().as_str())
    {
        return Err(ConfigError::invalid(
            "logging",
            "format",
            Some(format),
            "must be json or pretty",
        ));
    }

    Ok(())
}
