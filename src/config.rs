//! Configuration module for LiveCheck.
//!
//! Loads configuration from environment variables with sensible defaults.

use std::env;
use std::str::FromStr;
use std::time::Duration;
use thiserror::Error;

/// Configuration error types.
#[derive(Error, Debug, PartialEq, Eq)]
pub enum ConfigError {
    #[error("invalid value for {key}: {value:?}")]
    InvalidValue { key: &'static str, value: String },
    #[error("worker count must be at least 1")]
    ZeroWorkers,
    #[error("check interval must be at least 1s, got {0:?}")]
    IntervalTooShort(Duration),
    #[error("{0} must be greater than zero")]
    ZeroTimeout(&'static str),
    #[error("task queue capacity must be at least 1")]
    ZeroQueueCapacity,
}

/// Monitoring engine configuration.
#[derive(Debug, Clone)]
pub struct MonitorConfig {
    /// Number of concurrent probe workers (default: 10)
    pub workers: usize,
    /// Time between scheduling ticks (default: 60s)
    pub interval: Duration,
    /// Whole-request timeout for a single probe (default: 10s)
    pub probe_timeout: Duration,
    /// TCP connect timeout (default: 5s)
    pub dial_timeout: Duration,
    /// TCP keep-alive for probe connections (default: 30s)
    pub keep_alive: Duration,
    /// Bound of the shared task queue (default: 100)
    pub queue_capacity: usize,
}

impl Default for MonitorConfig {
    fn default() -> Self {
        Self {
            workers: 10,
            interval: Duration::from_secs(60),
            probe_timeout: Duration::from_secs(10),
            dial_timeout: Duration::from_secs(5),
            keep_alive: Duration::from_secs(30),
            queue_capacity: 100,
        }
    }
}

impl MonitorConfig {
    /// Check the configuration before any worker is started.
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.workers == 0 {
            return Err(ConfigError::ZeroWorkers);
        }
        if self.interval < Duration::from_secs(1) {
            return Err(ConfigError::IntervalTooShort(self.interval));
        }
        if self.probe_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("probe timeout"));
        }
        if self.dial_timeout.is_zero() {
            return Err(ConfigError::ZeroTimeout("dial timeout"));
        }
        if self.queue_capacity == 0 {
            return Err(ConfigError::ZeroQueueCapacity);
        }

        // A site can be probed again before its previous probe has finished.
        if self.interval <= self.probe_timeout {
            tracing::warn!(
                "Check interval {:?} does not exceed probe timeout {:?}; probes of a slow site may overlap",
                self.interval,
                self.probe_timeout
            );
        }

        Ok(())
    }
}

/// Server configuration loaded from environment variables.
#[derive(Debug, Clone)]
pub struct ServerConfig {
    /// HTTP port for the web server (default: 8080)
    pub http_port: u16,
    /// Path to the SQLite database file (default: "livecheck.db")
    pub db_path: String,
    pub monitor: MonitorConfig,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            http_port: 8080,
            db_path: "livecheck.db".to_string(),
            monitor: MonitorConfig::default(),
        }
    }
}

impl ServerConfig {
    /// Load configuration from environment variables.
    ///
    /// Environment variables:
    /// - `LIVECHECK_HTTP_PORT`: HTTP port (default: 8080)
    /// - `LIVECHECK_DB_PATH`: Database file path (default: "livecheck.db")
    /// - `LIVECHECK_WORKERS`: probe workers (default: 10)
    /// - `LIVECHECK_INTERVAL_SECS`: check interval (default: 60)
    /// - `LIVECHECK_PROBE_TIMEOUT_SECS`: per-probe timeout (default: 10)
    /// - `LIVECHECK_DIAL_TIMEOUT_SECS`: connect timeout (default: 5)
    /// - `LIVECHECK_KEEPALIVE_SECS`: TCP keep-alive (default: 30)
    /// - `LIVECHECK_QUEUE_CAPACITY`: task queue bound (default: 100)
    ///
    /// Unparsable values are rejected rather than silently defaulted.
    pub fn load() -> Result<Self, ConfigError> {
        Self::load_from(|key| env::var(key).ok())
    }

    fn load_from<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut cfg = Self::default();

        if let Some(port) = parse_var(&lookup, "LIVECHECK_HTTP_PORT")? {
            cfg.http_port = port;
        }
        if let Some(db_path) = lookup("LIVECHECK_DB_PATH") {
            cfg.db_path = db_path;
        }
        if let Some(workers) = parse_var(&lookup, "LIVECHECK_WORKERS")? {
            cfg.monitor.workers = workers;
        }
        if let Some(secs) = parse_var(&lookup, "LIVECHECK_INTERVAL_SECS")? {
            cfg.monitor.interval = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "LIVECHECK_PROBE_TIMEOUT_SECS")? {
            cfg.monitor.probe_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "LIVECHECK_DIAL_TIMEOUT_SECS")? {
            cfg.monitor.dial_timeout = Duration::from_secs(secs);
        }
        if let Some(secs) = parse_var(&lookup, "LIVECHECK_KEEPALIVE_SECS")? {
            cfg.monitor.keep_alive = Duration::from_secs(secs);
        }
        if let Some(capacity) = parse_var(&lookup, "LIVECHECK_QUEUE_CAPACITY")? {
            cfg.monitor.queue_capacity = capacity;
        }

        Ok(cfg)
    }
}

fn parse_var<F, T>(lookup: &F, key: &'static str) -> Result<Option<T>, ConfigError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
{
    match lookup(key) {
        None => Ok(None),
        Some(value) => value
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| ConfigError::InvalidValue { key, value }),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    fn load_with(vars: &[(&str, &str)]) -> Result<ServerConfig, ConfigError> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        ServerConfig::load_from(|key| vars.get(key).cloned())
    }

    #[test]
    fn test_default_config() {
        let cfg = ServerConfig::default();
        assert_eq!(cfg.http_port, 8080);
        assert_eq!(cfg.db_path, "livecheck.db");
        assert_eq!(cfg.monitor.workers, 10);
        assert_eq!(cfg.monitor.interval, Duration::from_secs(60));
        assert_eq!(cfg.monitor.probe_timeout, Duration::from_secs(10));
        assert_eq!(cfg.monitor.dial_timeout, Duration::from_secs(5));
        assert!(cfg.monitor.validate().is_ok());
    }

    #[test]
    fn test_load_overrides() {
        let cfg = load_with(&[
            ("LIVECHECK_HTTP_PORT", "9090"),
            ("LIVECHECK_DB_PATH", "/tmp/x.db"),
            ("LIVECHECK_WORKERS", "3"),
            ("LIVECHECK_INTERVAL_SECS", "30"),
        ])
        .unwrap();
        assert_eq!(cfg.http_port, 9090);
        assert_eq!(cfg.db_path, "/tmp/x.db");
        assert_eq!(cfg.monitor.workers, 3);
        assert_eq!(cfg.monitor.interval, Duration::from_secs(30));
    }

    #[test]
    fn test_load_rejects_garbage() {
        let err = load_with(&[("LIVECHECK_WORKERS", "many")]).unwrap_err();
        assert_eq!(
            err,
            ConfigError::InvalidValue {
                key: "LIVECHECK_WORKERS",
                value: "many".to_string()
            }
        );
    }

    #[test]
    fn test_validate_rejects_bad_values() {
        let cfg = MonitorConfig {
            workers: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroWorkers));

        let cfg = MonitorConfig {
            interval: Duration::from_millis(500),
            ..Default::default()
        };
        assert!(matches!(cfg.validate(), Err(ConfigError::IntervalTooShort(_))));

        let cfg = MonitorConfig {
            queue_capacity: 0,
            ..Default::default()
        };
        assert_eq!(cfg.validate(), Err(ConfigError::ZeroQueueCapacity));
    }

    #[test]
    fn test_overlapping_interval_is_only_a_warning() {
        let cfg = MonitorConfig {
            interval: Duration::from_secs(5),
            probe_timeout: Duration::from_secs(10),
            ..Default::default()
        };
        assert!(cfg.validate().is_ok());
    }
}
