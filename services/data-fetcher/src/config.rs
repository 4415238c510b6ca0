//! Fetcher configuration
//!
//! All knobs default to values sized for the upstream provider's free-tier
//! rate ceiling and can be overridden from a TOML file passed on the command
//! line. Missing fields fall back to the defaults, so a partial file is fine.

use std::path::Path;
use std::time::Duration;

use serde::Deserialize;
use thiserror::Error;

use crate::client::{LimiterConfig, RetryPolicy};

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("cannot read config file '{path}': {source}")]
    Io {
        path: String,
        source: std::io::Error,
    },

    #[error("cannot parse config file '{path}': {source}")]
    Parse {
        path: String,
        source: toml::de::Error,
    },
}

/// Configuration for the fetcher service.
#[derive(Debug, Clone, Deserialize)]
#[serde(default)]
pub struct FetcherConfig {
    /// API credential injected into every outbound call
    pub api_token: String,
    /// Upstream API base URL (overridable for tests)
    pub base_url: String,

    /// Historical backfill window, in hours (Total mode)
    pub mode_total_hours: i64,
    /// Steady-state incremental window, in hours (Current mode)
    pub mode_current_hours: i64,

    /// Stored tickers whose bars are refreshed before discovery on each pass
    pub priority_tickers: Vec<String>,

    /// Token bucket capacity (requests per refill period)
    pub reqs_limit: u32,
    /// Token bucket refill period, in seconds
    pub reqs_per_secs: u64,
    /// Sleep between limiter acquire attempts, in seconds
    pub limiter_wait_secs: u64,
    /// Absolute deadline for a single limiter acquire, in seconds
    pub limiter_deadline_secs: u64,
    /// Per-call HTTP timeout, in seconds
    pub call_timeout_secs: u64,

    /// Per-request retry count for retryable client errors
    pub request_retry_count: u32,
    /// Sleep between per-request retries, in seconds
    pub request_retry_wait_secs: u64,

    /// Retry budget of the continuous loop (fatal once exhausted)
    pub fetch_retry_count: u32,
    /// Backoff after a failed fetch pass, in seconds
    pub error_sleep_secs: u64,
    /// How long a finished pass counts as "recent", in seconds
    pub recently_threshold_secs: u64,
    /// Sleep when a pass finished recently, in seconds
    pub recently_sleep_secs: u64,
}

impl Default for FetcherConfig {
    fn default() -> Self {
        Self {
            api_token: String::new(),
            base_url: "https://api.polygon.io".to_string(),
            mode_total_hours: 2 * 365 * 24,
            mode_current_hours: 72,
            priority_tickers: Vec::new(),
            reqs_limit: 5,
            reqs_per_secs: 60,
            limiter_wait_secs: 15,
            limiter_deadline_secs: 300,
            call_timeout_secs: 30,
            request_retry_count: 5,
            request_retry_wait_secs: 3,
            fetch_retry_count: 3,
            error_sleep_secs: 60,
            recently_threshold_secs: 12 * 60 * 60,
            recently_sleep_secs: 10 * 60,
        }
    }
}

impl FetcherConfig {
    /// Load configuration from a TOML file.
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        let display = path.display().to_string();
        let raw = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: display.clone(),
            source,
        })?;
        toml::from_str(&raw).map_err(|source| ConfigError::Parse {
            path: display,
            source,
        })
    }

    pub fn limiter_config(&self) -> LimiterConfig {
        LimiterConfig {
            reqs_count: self.reqs_limit,
            per: Duration::from_secs(self.reqs_per_secs),
            wait: Duration::from_secs(self.limiter_wait_secs),
            deadline: Duration::from_secs(self.limiter_deadline_secs),
        }
    }

    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy {
            count: self.request_retry_count,
            wait: Duration::from_secs(self.request_retry_wait_secs),
        }
    }

    pub fn call_timeout(&self) -> Duration {
        Duration::from_secs(self.call_timeout_secs)
    }

    pub fn error_sleep(&self) -> Duration {
        Duration::from_secs(self.error_sleep_secs)
    }

    pub fn recently_threshold(&self) -> chrono::Duration {
        chrono::Duration::seconds(self.recently_threshold_secs as i64)
    }

    pub fn recently_sleep(&self) -> Duration {
        Duration::from_secs(self.recently_sleep_secs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_are_sane() {
        let config = FetcherConfig::default();
        assert_eq!(config.reqs_limit, 5);
        assert!(config.mode_total_hours > config.mode_current_hours);
        assert!(config.priority_tickers.is_empty());
    }

    #[test]
    fn test_partial_toml_falls_back_to_defaults() {
        let config: FetcherConfig = toml::from_str(
            r#"
            api_token = "secret"
            priority_tickers = ["AAPL", "MSFT"]
            "#,
        )
        .expect("valid toml");
        assert_eq!(config.api_token, "secret");
        assert_eq!(config.priority_tickers, vec!["AAPL", "MSFT"]);
        assert_eq!(config.base_url, "https://api.polygon.io");
        assert_eq!(config.fetch_retry_count, 3);
    }
}
