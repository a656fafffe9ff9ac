//! Runtime configuration read from environment variables.
//!
//! | variable | default | meaning |
//! |---|---|---|
//! | `TALLY_INITIAL_COUNT` | `0` | count at startup |
//! | `TALLY_HISTORY_CAPACITY` | `64` | snapshots kept (`0` disables) |
//! | `TALLY_SHUTDOWN_TIMEOUT_MS` | `5000` | graceful shutdown timeout |
//! | `TALLY_METRICS_ADDR` | unset | Prometheus listener address, e.g. `127.0.0.1:9000` |

use std::net::SocketAddr;
use std::str::FromStr;
use std::time::Duration;
use tally_runtime::StoreConfig;
use thiserror::Error;

/// Variable holding the initial count
pub const INITIAL_COUNT: &str = "TALLY_INITIAL_COUNT";
/// Variable holding the history capacity
pub const HISTORY_CAPACITY: &str = "TALLY_HISTORY_CAPACITY";
/// Variable holding the shutdown timeout in milliseconds
pub const SHUTDOWN_TIMEOUT_MS: &str = "TALLY_SHUTDOWN_TIMEOUT_MS";
/// Variable holding the metrics listener address
pub const METRICS_ADDR: &str = "TALLY_METRICS_ADDR";

/// Configuration errors
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    /// A variable was set to a value that does not parse
    #[error("{key}={value:?} is invalid: {reason}")]
    Invalid {
        /// Variable name
        key: &'static str,
        /// Raw value
        value: String,
        /// Parser message
        reason: String,
    },
}

/// Counter application configuration
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CounterConfig {
    /// Count at startup
    pub initial_count: i64,
    /// Store settings
    pub store: StoreConfig,
    /// Prometheus listener address, if metrics are exported
    pub metrics_addr: Option<SocketAddr>,
}

impl Default for CounterConfig {
    fn default() -> Self {
        Self {
            initial_count: 0,
            store: StoreConfig::default(),
            metrics_addr: None,
        }
    }
}

impl CounterConfig {
    /// Read the configuration from the process environment
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but does not parse.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Read the configuration through a lookup function
    ///
    /// Unset and empty variables fall back to their defaults.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] if a variable is set but does not parse.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        let initial_count = parse_var(&lookup, INITIAL_COUNT)?.unwrap_or(defaults.initial_count);
        let history_capacity = parse_var(&lookup, HISTORY_CAPACITY)?
            .unwrap_or(defaults.store.history_capacity);
        let shutdown_timeout = parse_var::<u64, _>(&lookup, SHUTDOWN_TIMEOUT_MS)?
            .map_or(defaults.store.default_shutdown_timeout, Duration::from_millis);
        let metrics_addr = parse_var(&lookup, METRICS_ADDR)?;

        Ok(Self {
            initial_count,
            store: StoreConfig::new(history_capacity, shutdown_timeout),
            metrics_addr,
        })
    }
}

fn parse_var<T, F>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    T: FromStr,
    T::Err: std::fmt::Display,
    F: Fn(&str) -> Option<String>,
{
    let Some(value) = lookup(key).filter(|v| !v.trim().is_empty()) else {
        return Ok(None);
    };

    let parsed = value.trim().parse::<T>();
    match parsed {
        Ok(parsed) => Ok(Some(parsed)),
        Err(e) => Err(ConfigError::Invalid {
            key,
            reason: e.to_string(),
            value,
        }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup(vars: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| ((*k).to_string(), (*v).to_string()))
            .collect();
        move |key: &str| vars.get(key).cloned()
    }

    #[test]
    fn test_defaults() {
        let config = CounterConfig::from_lookup(lookup(&[])).unwrap();
        assert_eq!(config, CounterConfig::default());
        assert_eq!(config.initial_count, 0);
        assert_eq!(config.store.history_capacity, 64);
        assert!(config.metrics_addr.is_none());
    }

    #[test]
    fn test_all_variables() {
        let config = CounterConfig::from_lookup(lookup(&[
            (INITIAL_COUNT, "-7"),
            (HISTORY_CAPACITY, "3"),
            (SHUTDOWN_TIMEOUT_MS, "250"),
            (METRICS_ADDR, "127.0.0.1:9000"),
        ]))
        .unwrap();

        assert_eq!(config.initial_count, -7);
        assert_eq!(config.store.history_capacity, 3);
        assert_eq!(config.store.default_shutdown_timeout, Duration::from_millis(250));
        assert_eq!(config.metrics_addr, Some("127.0.0.1:9000".parse().unwrap()));
    }

    #[test]
    fn test_blank_values_use_defaults() {
        let config =
            CounterConfig::from_lookup(lookup(&[(INITIAL_COUNT, "  "), (METRICS_ADDR, "")]))
                .unwrap();
        assert_eq!(config, CounterConfig::default());
    }

    #[test]
    fn test_invalid_value() {
        let err = CounterConfig::from_lookup(lookup(&[(HISTORY_CAPACITY, "-1")])).unwrap_err();
        assert!(matches!(
            &err,
            ConfigError::Invalid { key: HISTORY_CAPACITY, value, .. } if value == "-1"
        ));
        assert!(err.to_string().starts_with("TALLY_HISTORY_CAPACITY=\"-1\" is invalid"));
    }

    #[test]
    fn test_invalid_metrics_addr() {
        let result = CounterConfig::from_lookup(lookup(&[(METRICS_ADDR, "localhost")]));
        assert!(matches!(result, Err(ConfigError::Invalid { key: METRICS_ADDR, .. })));
    }
}
