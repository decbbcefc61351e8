//! Client configuration.
//!
//! Resolved from environment variables (optionally seeded by a `.env` file in
//! the binaries) with defaults suitable for a single till talking to a
//! backend on the same machine.

use std::collections::HashMap;
use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::{Error, Result};
use crate::gateway::normalize_base_url;
use crate::util::normalize_text_option;

pub const DEFAULT_API_URL: &str = "http://127.0.0.1:8080";
const DEFAULT_HTTP_TIMEOUT_SECS: u64 = 10;
const DEFAULT_PROBE_INTERVAL_SECS: u64 = 15;
const DB_FILE_NAME: &str = "till.db";

/// Settings shared by every Till client
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientConfig {
    /// Backend base URL
    pub api_url: String,
    /// Local store file
    pub db_path: PathBuf,
    /// Per-request timeout
    pub http_timeout: Duration,
    /// How often connectivity is re-probed
    pub probe_interval: Duration,
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            api_url: DEFAULT_API_URL.to_string(),
            db_path: default_db_path(),
            http_timeout: Duration::from_secs(DEFAULT_HTTP_TIMEOUT_SECS),
            probe_interval: Duration::from_secs(DEFAULT_PROBE_INTERVAL_SECS),
        }
    }
}

impl ClientConfig {
    pub fn from_env() -> Result<Self> {
        let values: HashMap<String, String> = env::vars().collect();
        Self::from_lookup(|name| values.get(name).cloned())
    }

    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        let defaults = Self::default();

        let api_url = match optional_trimmed(&lookup, "TILL_API_URL") {
            Some(url) => normalize_base_url(url)?,
            None => defaults.api_url,
        };

        let db_path = optional_trimmed(&lookup, "TILL_DB_PATH")
            .map_or(defaults.db_path, PathBuf::from);

        let timeout_secs =
            parse_secs(&lookup, "TILL_HTTP_TIMEOUT_SECS", DEFAULT_HTTP_TIMEOUT_SECS)?;
        if !(1..=120).contains(&timeout_secs) {
            return Err(Error::Config(
                "TILL_HTTP_TIMEOUT_SECS must be in [1, 120]".to_string(),
            ));
        }

        let probe_secs =
            parse_secs(&lookup, "TILL_PROBE_INTERVAL_SECS", DEFAULT_PROBE_INTERVAL_SECS)?;
        if probe_secs == 0 {
            return Err(Error::Config(
                "TILL_PROBE_INTERVAL_SECS must be >= 1".to_string(),
            ));
        }

        Ok(Self {
            api_url,
            db_path,
            http_timeout: Duration::from_secs(timeout_secs),
            probe_interval: Duration::from_secs(probe_secs),
        })
    }
}

/// Platform data directory, falling back to the working directory.
pub fn default_db_path() -> PathBuf {
    dirs::data_dir().map_or_else(
        || PathBuf::from(DB_FILE_NAME),
        |dir| dir.join("till").join(DB_FILE_NAME),
    )
}

fn optional_trimmed(lookup: &impl Fn(&str) -> Option<String>, name: &str) -> Option<String> {
    normalize_text_option(lookup(name))
}

fn parse_secs(
    lookup: &impl Fn(&str) -> Option<String>,
    name: &str,
    default: u64,
) -> Result<u64> {
    optional_trimmed(lookup, name).map_or(Ok(default), |value| {
        value
            .parse::<u64>()
            .map_err(|_| Error::Config(format!("{name} must be a whole number of seconds")))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;

    fn lookup(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let values: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |name| values.get(name).cloned()
    }

    #[test]
    fn defaults_apply_when_unset() {
        let config = ClientConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.http_timeout, Duration::from_secs(10));
        assert_eq!(config.probe_interval, Duration::from_secs(15));
        assert!(config.db_path.ends_with(DB_FILE_NAME));
    }

    #[test]
    fn explicit_values_override_defaults() {
        let config = ClientConfig::from_lookup(lookup(&[
            ("TILL_API_URL", " https://shop.example.com/ "),
            ("TILL_DB_PATH", "/tmp/till-test.db"),
            ("TILL_HTTP_TIMEOUT_SECS", "30"),
            ("TILL_PROBE_INTERVAL_SECS", "2"),
        ]))
        .unwrap();

        assert_eq!(config.api_url, "https://shop.example.com");
        assert_eq!(config.db_path, PathBuf::from("/tmp/till-test.db"));
        assert_eq!(config.http_timeout, Duration::from_secs(30));
        assert_eq!(config.probe_interval, Duration::from_secs(2));
    }

    #[test]
    fn invalid_values_are_rejected() {
        assert!(ClientConfig::from_lookup(lookup(&[("TILL_API_URL", "shop.local")])).is_err());
        assert!(
            ClientConfig::from_lookup(lookup(&[("TILL_HTTP_TIMEOUT_SECS", "0")])).is_err()
        );
        assert!(
            ClientConfig::from_lookup(lookup(&[("TILL_HTTP_TIMEOUT_SECS", "soon")])).is_err()
        );
        assert!(
            ClientConfig::from_lookup(lookup(&[("TILL_PROBE_INTERVAL_SECS", "0")])).is_err()
        );
    }

    #[test]
    fn blank_values_count_as_unset() {
        let config = ClientConfig::from_lookup(lookup(&[("TILL_API_URL", "   ")])).unwrap();
        assert_eq!(config.api_url, DEFAULT_API_URL);
    }
}
