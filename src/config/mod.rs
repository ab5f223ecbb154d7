//! Configuration module - environment variable parsing

use std::env;
use std::net::SocketAddr;
use std::path::PathBuf;
use std::time::Duration;

/// Default listening address of the battle server
pub const DEFAULT_SERVER_ADDR: &str = "0.0.0.0:12345";

/// Log output format
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum LogFormat {
    /// Human readable lines
    Text,
    /// One JSON object per event
    Json,
}

/// Application configuration loaded from environment variables
#[derive(Clone, Debug)]
pub struct Config {
    /// Server binding address
    pub server_addr: SocketAddr,
    /// Log level (trace, debug, info, warn, error)
    pub log_level: String,
    /// Log output format
    pub log_format: LogFormat,

    /// Optional JSON catalog replacing the built-in one
    pub catalog_path: Option<PathBuf>,

    /// How long a receive loop waits for a frame before pinging
    pub read_timeout: Duration,
    /// Consecutive silent read timeouts tolerated before the peer is dead
    pub max_missed_pings: u32,
    /// Longest accepted line, in bytes
    pub max_line_length: usize,
    /// Inbound messages per second accepted from one connection
    pub input_rate_limit: u32,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_addr: DEFAULT_SERVER_ADDR
                .parse()
                .unwrap_or_else(|_| SocketAddr::from(([0, 0, 0, 0], 12345))),
            log_level: "info".to_string(),
            log_format: LogFormat::Text,
            catalog_path: None,
            read_timeout: Duration::from_secs(60),
            max_missed_pings: 3,
            max_line_length: 8 * 1024,
            input_rate_limit: 20,
        }
    }
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Build a configuration from an arbitrary key lookup.
    ///
    /// Unset keys fall back to [`Config::default`].
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let defaults = Self::default();

        // PORT wins over SERVER_ADDR, matching hosted deployments
        let server_addr = match (lookup("PORT"), lookup("SERVER_ADDR")) {
            (Some(port), _) => format!("0.0.0.0:{}", port)
                .parse()
                .map_err(|_| ConfigError::InvalidAddress)?,
            (None, Some(addr)) => addr.parse().map_err(|_| ConfigError::InvalidAddress)?,
            (None, None) => defaults.server_addr,
        };

        let log_format = match lookup("LOG_FORMAT").as_deref() {
            None | Some("text") => LogFormat::Text,
            Some("json") => LogFormat::Json,
            Some(_) => return Err(ConfigError::Invalid("LOG_FORMAT")),
        };

        let read_timeout_secs: u64 =
            parse_or(&lookup, "READ_TIMEOUT_SECS", defaults.read_timeout.as_secs())?;
        if read_timeout_secs == 0 {
            return Err(ConfigError::Invalid("READ_TIMEOUT_SECS"));
        }

        let max_line_length = parse_or(&lookup, "MAX_LINE_LENGTH", defaults.max_line_length)?;
        if max_line_length == 0 {
            return Err(ConfigError::Invalid("MAX_LINE_LENGTH"));
        }

        Ok(Self {
            server_addr,
            log_level: lookup("LOG_LEVEL").unwrap_or(defaults.log_level),
            log_format,
            catalog_path: lookup("CATALOG_PATH").map(PathBuf::from),
            read_timeout: Duration::from_secs(read_timeout_secs),
            max_missed_pings: parse_or(&lookup, "MAX_MISSED_PINGS", defaults.max_missed_pings)?,
            max_line_length,
            input_rate_limit: parse_or(&lookup, "INPUT_RATE_LIMIT", defaults.input_rate_limit)?,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &'static str, default: T) -> Result<T, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: std::str::FromStr,
{
    match lookup(key) {
        Some(raw) => raw.trim().parse().map_err(|_| ConfigError::Invalid(key)),
        None => Ok(default),
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Invalid value for environment variable: {0}")]
    Invalid(&'static str),

    #[error("Invalid server address format")]
    InvalidAddress,
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn lookup_from(pairs: &[(&str, &str)]) -> impl Fn(&str) -> Option<String> {
        let map: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        move |key| map.get(key).cloned()
    }

    #[test]
    fn defaults_when_nothing_is_set() {
        let config = Config::from_lookup(lookup_from(&[])).unwrap();
        assert_eq!(config.server_addr.port(), 12345);
        assert_eq!(config.log_level, "info");
        assert_eq!(config.log_format, LogFormat::Text);
        assert_eq!(config.read_timeout, Duration::from_secs(60));
        assert_eq!(config.max_missed_pings, 3);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn port_overrides_server_addr() {
        let config = Config::from_lookup(lookup_from(&[
            ("PORT", "4000"),
            ("SERVER_ADDR", "127.0.0.1:9999"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr, "0.0.0.0:4000".parse().unwrap());
    }

    #[test]
    fn reads_tuning_values() {
        let config = Config::from_lookup(lookup_from(&[
            ("SERVER_ADDR", "127.0.0.1:7000"),
            ("LOG_FORMAT", "json"),
            ("READ_TIMEOUT_SECS", "5"),
            ("MAX_MISSED_PINGS", "1"),
            ("CATALOG_PATH", "data/catalog.json"),
        ]))
        .unwrap();
        assert_eq!(config.server_addr, "127.0.0.1:7000".parse().unwrap());
        assert_eq!(config.log_format, LogFormat::Json);
        assert_eq!(config.read_timeout, Duration::from_secs(5));
        assert_eq!(config.max_missed_pings, 1);
        assert_eq!(
            config.catalog_path.as_deref(),
            Some(std::path::Path::new("data/catalog.json"))
        );
    }

    #[test]
    fn rejects_bad_values() {
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("SERVER_ADDR", "nowhere")])),
            Err(ConfigError::InvalidAddress)
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("READ_TIMEOUT_SECS", "0")])),
            Err(ConfigError::Invalid("READ_TIMEOUT_SECS"))
        ));
        assert!(matches!(
            Config::from_lookup(lookup_from(&[("LOG_FORMAT", "xml")])),
            Err(ConfigError::Invalid("LOG_FORMAT"))
        ));
    }
}
