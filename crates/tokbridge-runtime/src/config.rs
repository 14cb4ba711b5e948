//! Supervisor and facade configuration.
//!
//! Defaults mirror a fast-starting native engine. Engines with slow warm-up
//! (a JVM, large dictionaries) should raise the health budget instead of
//! retrying `setup`.

use std::time::Duration;

use thiserror::Error;

/// Environment variable: health check interval in milliseconds.
pub const ENV_HEALTH_INTERVAL_MS: &str = "TOKBRIDGE_HEALTH_INTERVAL_MS";
/// Environment variable: number of health checks before giving up.
pub const ENV_HEALTH_ATTEMPTS: &str = "TOKBRIDGE_HEALTH_ATTEMPTS";
/// Environment variable: seconds `cleanup_and_wait` waits for exit.
pub const ENV_STOP_GRACE_SECS: &str = "TOKBRIDGE_STOP_GRACE_SECS";
/// Environment variable: per-request timeout in seconds for `/tokenize`.
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "TOKBRIDGE_REQUEST_TIMEOUT_SECS";

/// Errors from reading configuration values.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    #[error("{key} must be a non-negative integer, got {value:?}")]
    InvalidNumber { key: String, value: String },

    #[error("{0} must be greater than zero")]
    Zero(String),
}

/// Fixed-interval health polling budget.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct HealthPolicy {
    /// Sleep before each check.
    pub interval: Duration,
    /// Checks before the start is considered failed.
    pub max_attempts: u32,
}

impl HealthPolicy {
    pub const fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
        }
    }

    /// Upper bound on time spent polling.
    pub fn budget(&self) -> Duration {
        self.interval * self.max_attempts
    }
}

impl Default for HealthPolicy {
    fn default() -> Self {
        Self::new(Duration::from_millis(200), 15)
    }
}

/// Configuration for [`CmdTokenizerServer`](crate::CmdTokenizerServer) and
/// [`ServerTokenizer`](crate::ServerTokenizer).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TokenizerConfig {
    /// Readiness polling budget for `start`.
    pub health: HealthPolicy,
    /// How long `cleanup_and_wait` waits for the process to exit.
    pub stop_grace: Duration,
    /// Interval of "still running" warnings after a non-blocking `cleanup`.
    pub stop_warning_interval: Duration,
    /// After a non-blocking `cleanup`, force stop once this has elapsed.
    pub force_stop_after: Duration,
    /// SIGTERM to SIGKILL escalation delay for forced stops.
    pub kill_grace: Duration,
    /// Timeout for each `/tokenize` request. `None` waits indefinitely.
    pub request_timeout: Option<Duration>,
}

impl Default for TokenizerConfig {
    fn default() -> Self {
        let stop_warning_interval = Duration::from_secs(15);
        Self {
            health: HealthPolicy::default(),
            stop_grace: Duration::from_secs(15),
            stop_warning_interval,
            force_stop_after: stop_warning_interval * 10,
            kill_grace: Duration::from_secs(5),
            request_timeout: None,
        }
    }
}

impl TokenizerConfig {
    #[must_use]
    pub const fn with_health(mut self, health: HealthPolicy) -> Self {
        self.health = health;
        self
    }

    #[must_use]
    pub const fn with_stop_grace(mut self, grace: Duration) -> Self {
        self.stop_grace = grace;
        self
    }

    #[must_use]
    pub const fn with_stop_warning_interval(mut self, interval: Duration) -> Self {
        self.stop_warning_interval = interval;
        self
    }

    #[must_use]
    pub const fn with_force_stop_after(mut self, after: Duration) -> Self {
        self.force_stop_after = after;
        self
    }

    #[must_use]
    pub const fn with_kill_grace(mut self, grace: Duration) -> Self {
        self.kill_grace = grace;
        self
    }

    #[must_use]
    pub const fn with_request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = Some(timeout);
        self
    }

    /// Defaults overridden by `TOKBRIDGE_*` environment variables.
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Defaults overridden by values from `lookup`.
    ///
    /// Split out from [`from_env`](Self::from_env) so tests never touch the
    /// process environment.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self, ConfigError> {
        let mut config = Self::default();

        if let Some(ms) = read_number(&lookup, ENV_HEALTH_INTERVAL_MS)? {
            config.health.interval = Duration::from_millis(ms);
        }
        if let Some(attempts) = read_number(&lookup, ENV_HEALTH_ATTEMPTS)? {
            if attempts == 0 {
                return Err(ConfigError::Zero(ENV_HEALTH_ATTEMPTS.to_string()));
            }
            config.health.max_attempts = u32::try_from(attempts).unwrap_or(u32::MAX);
        }
        if let Some(secs) = read_number(&lookup, ENV_STOP_GRACE_SECS)? {
            config.stop_grace = Duration::from_secs(secs);
        }
        if let Some(secs) = read_number(&lookup, ENV_REQUEST_TIMEOUT_SECS)? {
            if secs == 0 {
                return Err(ConfigError::Zero(ENV_REQUEST_TIMEOUT_SECS.to_string()));
            }
            config.request_timeout = Some(Duration::from_secs(secs));
        }

        Ok(config)
    }
}

fn read_number(
    lookup: &impl Fn(&str) -> Option<String>,
    key: &str,
) -> Result<Option<u64>, ConfigError> {
    let Some(raw) = lookup(key) else {
        return Ok(None);
    };
    let trimmed = raw.trim();
    if trimmed.is_empty() {
        return Ok(None);
    }
    trimmed
        .parse()
        .map(Some)
        .map_err(|_| ConfigError::InvalidNumber {
            key: key.to_string(),
            value: raw,
        })
}
