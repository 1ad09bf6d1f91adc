use std::path::PathBuf;
use std::time::Duration;

use crate::coordinator::RetryPolicy;

/// Runtime settings, read from `STAYLINE_*` environment variables.
/// Unset or unparsable values fall back to the defaults.
#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub data_dir: PathBuf,
    /// JSON array of properties registered at startup, if set.
    pub catalog: Option<PathBuf>,
    /// Keep everything in memory; no WAL is written.
    pub in_memory: bool,
    pub compact_threshold: u64,
    pub compact_interval: Duration,
    pub retry: RetryPolicy,
    pub request_timeout: Option<Duration>,
    pub max_in_flight: usize,
    pub metrics_port: Option<u16>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from("./data"),
            catalog: None,
            in_memory: false,
            compact_threshold: 1000,
            compact_interval: Duration::from_secs(30),
            retry: RetryPolicy::default(),
            request_timeout: Some(Duration::from_secs(5)),
            max_in_flight: 256,
            metrics_port: None,
        }
    }
}

impl Config {
    pub fn from_env() -> Self {
        Self::from_vars(|key| std::env::var(key).ok())
    }

    pub fn from_vars(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let parse = |key: &str| lookup(key).and_then(|s| s.trim().parse::<u64>().ok());
        let defaults = Self::default();

        let retry = RetryPolicy {
            max_attempts: lookup("STAYLINE_RETRY_ATTEMPTS")
                .and_then(|s| s.trim().parse().ok())
                .unwrap_or(defaults.retry.max_attempts),
            base_backoff: parse("STAYLINE_RETRY_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.base_backoff),
            max_backoff: parse("STAYLINE_RETRY_MAX_BACKOFF_MS")
                .map(Duration::from_millis)
                .unwrap_or(defaults.retry.max_backoff),
        };

        // 0 disables the per-request deadline
        let request_timeout = match parse("STAYLINE_REQUEST_TIMEOUT_MS") {
            Some(0) => None,
            Some(ms) => Some(Duration::from_millis(ms)),
            None => defaults.request_timeout,
        };

        Self {
            data_dir: lookup("STAYLINE_DATA_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.data_dir),
            catalog: lookup("STAYLINE_CATALOG")
                .filter(|s| !s.is_empty())
                .map(PathBuf::from),
            in_memory: lookup("STAYLINE_IN_MEMORY")
                .is_some_and(|s| matches!(s.trim(), "1" | "true" | "yes")),
            compact_threshold: parse("STAYLINE_COMPACT_THRESHOLD")
                .unwrap_or(defaults.compact_threshold),
            compact_interval: parse("STAYLINE_COMPACT_INTERVAL_SECS")
                .filter(|&s| s > 0)
                .map(Duration::from_secs)
                .unwrap_or(defaults.compact_interval),
            retry,
            request_timeout,
            max_in_flight: parse("STAYLINE_MAX_IN_FLIGHT")
                .filter(|&n| n > 0)
                .and_then(|n| usize::try_from(n).ok())
                .unwrap_or(defaults.max_in_flight),
            metrics_port: lookup("STAYLINE_METRICS_PORT").and_then(|s| s.trim().parse().ok()),
        }
    }

    pub fn wal_path(&self) -> PathBuf {
        self.data_dir.join("stayline.wal")
    }
}
