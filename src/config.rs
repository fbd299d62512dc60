//! Configuration Module
//!
//! Scheduler options with validated ranges, plus the gateway's environment
//! configuration.

use std::env;
use std::str::FromStr;
use std::time::Duration;

use crate::error::ConfigError;
use crate::retry::{RetryGate, RetryPolicy, DEFAULT_BASE_DELAY, DEFAULT_MAX_RETRIES};
use crate::scheduler::OverflowPolicy;

/// Accepted range for `concurrency_limit`.
pub const CONCURRENCY_LIMIT_RANGE: (u64, u64) = (1, 1024);

/// Accepted range for `default_max_retries`.
pub const MAX_RETRIES_RANGE: (u64, u64) = (0, 10);

/// Longest accepted cache TTL, configured or per request.
pub const MAX_TTL: Duration = Duration::from_secs(365 * 24 * 60 * 60);

/// Longest accepted request deadline.
pub const MAX_DEADLINE: Duration = Duration::from_secs(24 * 60 * 60);

// == Scheduler Config ==
/// Options recognised by the scheduler.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SchedulerConfig {
    /// Maximum underlying executions running at once
    pub concurrency_limit: usize,
    /// TTL applied when a request does not specify one; None = no caching
    pub default_ttl: Option<Duration>,
    /// Retries applied when a request does not specify its own
    pub default_max_retries: u32,
    /// Backoff base; the wait after failed attempt `i` is `2^i * base`
    pub retry_base_delay: Duration,
    /// Which failures may be retried
    pub retry_gate: RetryGate,
    /// Queue depth beyond which the overflow policy applies; None = unbounded
    pub max_queue_depth: Option<usize>,
    pub overflow_policy: OverflowPolicy,
    /// Deadline applied when a request does not specify one
    pub default_deadline: Option<Duration>,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            concurrency_limit: 5,
            default_ttl: None,
            default_max_retries: DEFAULT_MAX_RETRIES,
            retry_base_delay: DEFAULT_BASE_DELAY,
            retry_gate: RetryGate::default(),
            max_queue_depth: None,
            overflow_policy: OverflowPolicy::default(),
            default_deadline: None,
        }
    }
}

impl SchedulerConfig {
    pub fn with_concurrency_limit(mut self, limit: usize) -> Self {
        self.concurrency_limit = limit;
        self
    }

    pub fn with_default_ttl(mut self, ttl: Duration) -> Self {
        self.default_ttl = Some(ttl).filter(|ttl| !ttl.is_zero());
        self
    }

    pub fn with_default_max_retries(mut self, retries: u32) -> Self {
        self.default_max_retries = retries;
        self
    }

    pub fn with_retry_base_delay(mut self, delay: Duration) -> Self {
        self.retry_base_delay = delay;
        self
    }

    pub fn with_retry_gate(mut self, gate: RetryGate) -> Self {
        self.retry_gate = gate;
        self
    }

    pub fn with_max_queue_depth(mut self, depth: usize, policy: OverflowPolicy) -> Self {
        self.max_queue_depth = Some(depth);
        self.overflow_policy = policy;
        self
    }

    pub fn with_default_deadline(mut self, deadline: Duration) -> Self {
        self.default_deadline = Some(deadline).filter(|d| !d.is_zero());
        self
    }

    /// Retry policy for a request asking for `max_retries` (or the default).
    pub fn retry_policy(&self, max_retries: Option<u32>) -> RetryPolicy {
        RetryPolicy::new(max_retries.unwrap_or(self.default_max_retries))
            .with_base_delay(self.retry_base_delay)
            .with_gate(self.retry_gate)
    }

    // == Validate ==
    /// Checks every option against its accepted range.
    pub fn validate(&self) -> Result<(), ConfigError> {
        check_range(
            "CONCURRENCY_LIMIT",
            self.concurrency_limit as u64,
            CONCURRENCY_LIMIT_RANGE,
        )?;
        check_range(
            "DEFAULT_MAX_RETRIES",
            u64::from(self.default_max_retries),
            MAX_RETRIES_RANGE,
        )?;
        if self.max_queue_depth == Some(0) {
            return Err(ConfigError::OutOfRange {
                name: "MAX_QUEUE_DEPTH",
                value: 0,
                min: 1,
                max: u64::MAX,
            });
        }
        if let Some(ttl) = self.default_ttl {
            check_range("DEFAULT_TTL", ttl.as_secs(), (0, MAX_TTL.as_secs()))?;
        }
        if let Some(deadline) = self.default_deadline {
            check_range(
                "REQUEST_TIMEOUT",
                deadline.as_secs(),
                (0, MAX_DEADLINE.as_secs()),
            )?;
        }
        Ok(())
    }
}

fn check_range(name: &'static str, value: u64, (min, max): (u64, u64)) -> Result<(), ConfigError> {
    if value < min || value > max {
        return Err(ConfigError::OutOfRange {
            name,
            value,
            min,
            max,
        });
    }
    Ok(())
}

// == Gateway Config ==
/// Gateway configuration loaded from the environment.
#[derive(Debug, Clone)]
pub struct Config {
    pub scheduler: SchedulerConfig,
    /// Interval between proactive cache sweeps
    pub sweep_interval: Duration,
    /// HTTP server port
    pub server_port: u16,
    /// Base URL requests under `/proxy` are forwarded to
    pub upstream_url: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            scheduler: SchedulerConfig::default(),
            sweep_interval: Duration::from_secs(1),
            server_port: 3000,
            upstream_url: "http://127.0.0.1:8080".to_string(),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables and validates it.
    ///
    /// # Environment Variables
    /// - `CONCURRENCY_LIMIT` - Concurrent executions (default: 5, 1..=1024)
    /// - `DEFAULT_TTL` - Cache TTL in seconds for GETs (default: 0, no caching; at most one year)
    /// - `DEFAULT_MAX_RETRIES` - Retries per request (default: 3, 0..=10)
    /// - `RETRY_BASE_DELAY_MS` - Backoff base in milliseconds (default: 1000)
    /// - `RETRY_GATE` - `retryable` or `always` (default: retryable)
    /// - `MAX_QUEUE_DEPTH` - Queue bound (default: unbounded)
    /// - `OVERFLOW_POLICY` - `reject-newest` or `drop-oldest` (default: reject-newest)
    /// - `REQUEST_TIMEOUT` - Per-request deadline in seconds (default: 0, none; at most one day)
    /// - `SWEEP_INTERVAL` - Cache sweep frequency in seconds (default: 1)
    /// - `SERVER_PORT` - HTTP server port (default: 3000)
    /// - `UPSTREAM_URL` - Backend base URL (default: http://127.0.0.1:8080)
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Config::default();
        let scheduler = SchedulerConfig {
            concurrency_limit: env_or("CONCURRENCY_LIMIT", defaults.scheduler.concurrency_limit)?,
            default_ttl: non_zero_secs(env_or("DEFAULT_TTL", 0u64)?),
            default_max_retries: env_or("DEFAULT_MAX_RETRIES", DEFAULT_MAX_RETRIES)?,
            retry_base_delay: Duration::from_millis(env_or(
                "RETRY_BASE_DELAY_MS",
                DEFAULT_BASE_DELAY.as_millis() as u64,
            )?),
            retry_gate: match env::var("RETRY_GATE").ok().as_deref() {
                None | Some("retryable") => RetryGate::RetryableOnly,
                Some("always") => RetryGate::Always,
                Some(other) => return Err(invalid("RETRY_GATE", other)),
            },
            max_queue_depth: env::var("MAX_QUEUE_DEPTH")
                .ok()
                .map(|v| v.parse().map_err(|_| invalid("MAX_QUEUE_DEPTH", &v)))
                .transpose()?,
            overflow_policy: match env::var("OVERFLOW_POLICY").ok().as_deref() {
                None => OverflowPolicy::default(),
                Some(value) => value.parse()?,
            },
            default_deadline: non_zero_secs(env_or("REQUEST_TIMEOUT", 0u64)?),
        };
        scheduler.validate()?;

        Ok(Self {
            scheduler,
            sweep_interval: Duration::from_secs(env_or("SWEEP_INTERVAL", 1u64)?.max(1)),
            server_port: env_or("SERVER_PORT", defaults.server_port)?,
            upstream_url: env::var("UPSTREAM_URL").unwrap_or(defaults.upstream_url),
        })
    }
}

/// Reads `name`, falling back to `default` when unset.
fn env_or<T: FromStr>(name: &'static str, default: T) -> Result<T, ConfigError> {
    match env::var(name) {
        Ok(value) => value.trim().parse().map_err(|_| invalid(name, &value)),
        Err(_) => Ok(default),
    }
}

fn non_zero_secs(value: u64) -> Option<Duration> {
    Some(Duration::from_secs(value)).filter(|d| !d.is_zero())
}

fn invalid(name: &'static str, value: &str) -> ConfigError {
    ConfigError::Invalid {
        name,
        value: value.to_string(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_scheduler_config_default() {
        let config = SchedulerConfig::default();
        assert_eq!(config.concurrency_limit, 5);
        assert_eq!(config.default_ttl, None);
        assert_eq!(config.default_max_retries, 3);
        assert_eq!(config.retry_base_delay, Duration::from_secs(1));
        assert_eq!(config.retry_gate, RetryGate::RetryableOnly);
        assert_eq!(config.max_queue_depth, None);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_rejects_zero_concurrency() {
        let config = SchedulerConfig::default().with_concurrency_limit(0);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { name: "CONCURRENCY_LIMIT", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_excessive_retries() {
        let config = SchedulerConfig::default().with_default_max_retries(11);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_zero_queue_depth() {
        let config = SchedulerConfig::default().with_max_queue_depth(0, OverflowPolicy::RejectNewest);
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_rejects_ttl_beyond_max() {
        let config = SchedulerConfig::default().with_default_ttl(MAX_TTL);
        assert!(config.validate().is_ok());

        let config = SchedulerConfig::default().with_default_ttl(Duration::from_secs(u64::MAX));
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { name: "DEFAULT_TTL", .. })
        ));
    }

    #[test]
    fn test_validate_rejects_deadline_beyond_max() {
        let config = SchedulerConfig::default().with_default_deadline(MAX_DEADLINE);
        assert!(config.validate().is_ok());

        let config = SchedulerConfig::default().with_default_deadline(Duration::MAX);
        assert!(matches!(
            config.validate(),
            Err(ConfigError::OutOfRange { name: "REQUEST_TIMEOUT", .. })
        ));
    }

    #[test]
    fn test_zero_ttl_disables_caching() {
        let config = SchedulerConfig::default().with_default_ttl(Duration::ZERO);
        assert_eq!(config.default_ttl, None);
    }

    #[test]
    fn test_retry_policy_uses_defaults() {
        let config = SchedulerConfig::default()
            .with_default_max_retries(2)
            .with_retry_base_delay(Duration::from_millis(10));

        let policy = config.retry_policy(None);
        assert_eq!(policy.max_retries, 2);
        assert_eq!(policy.base_delay, Duration::from_millis(10));

        assert_eq!(config.retry_policy(Some(0)).max_retries, 0);
    }

    // Env-driven cases share process state, so they run in one test.
    #[test]
    fn test_config_from_env() {
        for name in [
            "CONCURRENCY_LIMIT",
            "DEFAULT_TTL",
            "DEFAULT_MAX_RETRIES",
            "RETRY_BASE_DELAY_MS",
            "RETRY_GATE",
            "MAX_QUEUE_DEPTH",
            "OVERFLOW_POLICY",
            "REQUEST_TIMEOUT",
            "SWEEP_INTERVAL",
            "SERVER_PORT",
            "UPSTREAM_URL",
        ] {
            env::remove_var(name);
        }

        let config = Config::from_env().unwrap();
        assert_eq!(config.scheduler, SchedulerConfig::default());
        assert_eq!(config.server_port, 3000);
        assert_eq!(config.sweep_interval, Duration::from_secs(1));

        env::set_var("CONCURRENCY_LIMIT", "8");
        env::set_var("DEFAULT_TTL", "30");
        env::set_var("MAX_QUEUE_DEPTH", "100");
        env::set_var("OVERFLOW_POLICY", "drop-oldest");
        env::set_var("RETRY_GATE", "always");
        let config = Config::from_env().unwrap();
        assert_eq!(config.scheduler.concurrency_limit, 8);
        assert_eq!(config.scheduler.default_ttl, Some(Duration::from_secs(30)));
        assert_eq!(config.scheduler.max_queue_depth, Some(100));
        assert_eq!(config.scheduler.overflow_policy, OverflowPolicy::DropOldest);
        assert_eq!(config.scheduler.retry_gate, RetryGate::Always);

        env::set_var("CONCURRENCY_LIMIT", "0");
        assert!(Config::from_env().is_err());

        env::set_var("CONCURRENCY_LIMIT", "8");
        env::set_var("DEFAULT_TTL", u64::MAX.to_string());
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::OutOfRange { name: "DEFAULT_TTL", .. })
        ));
        env::set_var("DEFAULT_TTL", "30");

        env::set_var("CONCURRENCY_LIMIT", "lots");
        assert!(matches!(
            Config::from_env(),
            Err(ConfigError::Invalid { name: "CONCURRENCY_LIMIT", .. })
        ));

        for name in [
            "CONCURRENCY_LIMIT",
            "DEFAULT_TTL",
            "MAX_QUEUE_DEPTH",
            "OVERFLOW_POLICY",
            "RETRY_GATE",
        ] {
            env::remove_var(name);
        }
    }
}
