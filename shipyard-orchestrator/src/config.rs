//! Orchestrator configuration
//!
//! Defines all configurable parameters for the orchestrator including
//! the listen address, storage backend, stream sampling interval and the
//! stage retry policy.

use std::time::Duration;

/// Orchestrator configuration
///
/// All timeouts and intervals are configurable to allow tuning
/// for different deployment scenarios (dev vs prod, fast vs slow agents).
#[derive(Debug, Clone)]
pub struct Config {
    /// Address the HTTP API binds to
    pub bind_addr: String,

    /// PostgreSQL URL; the in-memory store is used when unset
    pub database_url: Option<String>,

    /// Base URL of the external agent runners
    pub agent_base_url: String,

    /// How often a stream subscription samples the pipeline record
    pub poll_interval: Duration,

    /// Upper bound on every store read, write and lock wait
    pub store_timeout: Duration,

    /// Upper bound on a single agent attempt
    pub stage_timeout: Duration,

    /// Retries of a recoverable stage failure before it is escalated
    pub max_stage_retries: u32,

    /// Delay before the first retry; doubles on each further retry
    pub retry_backoff: Duration,
}

impl Config {
    /// Creates a new configuration with defaults
    pub fn new(bind_addr: String, agent_base_url: String) -> Self {
        Self {
            bind_addr,
            database_url: None,
            agent_base_url,
            poll_interval: Duration::from_secs(1),
            store_timeout: Duration::from_secs(5),
            stage_timeout: Duration::from_secs(300), // 5 minutes
            max_stage_retries: 3,
            retry_backoff: Duration::from_secs(1),
        }
    }

    /// Creates configuration from environment variables
    ///
    /// Expected environment variables (all optional):
    /// - SHIPYARD_BIND_ADDR (default: 0.0.0.0:8080)
    /// - DATABASE_URL (default: unset, in-memory store)
    /// - AGENT_BASE_URL (default: http://localhost:9000/agents)
    /// - STREAM_POLL_INTERVAL_MS (default: 1000)
    /// - STORE_TIMEOUT_MS (default: 5000)
    /// - STAGE_TIMEOUT_SECS (default: 300)
    /// - MAX_STAGE_RETRIES (default: 3)
    /// - RETRY_BACKOFF_MS (default: 1000)
    pub fn from_env() -> Self {
        let defaults = Self::default();

        let bind_addr = std::env::var("SHIPYARD_BIND_ADDR").unwrap_or(defaults.bind_addr);
        let agent_base_url = std::env::var("AGENT_BASE_URL").unwrap_or(defaults.agent_base_url);
        let database_url = std::env::var("DATABASE_URL")
            .ok()
            .filter(|s| !s.trim().is_empty());

        let poll_interval = env_parse::<u64>("STREAM_POLL_INTERVAL_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.poll_interval);

        let store_timeout = env_parse::<u64>("STORE_TIMEOUT_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.store_timeout);

        let stage_timeout = env_parse::<u64>("STAGE_TIMEOUT_SECS")
            .map(Duration::from_secs)
            .unwrap_or(defaults.stage_timeout);

        let max_stage_retries =
            env_parse::<u32>("MAX_STAGE_RETRIES").unwrap_or(defaults.max_stage_retries);

        let retry_backoff = env_parse::<u64>("RETRY_BACKOFF_MS")
            .map(Duration::from_millis)
            .unwrap_or(defaults.retry_backoff);

        Self {
            bind_addr,
            database_url,
            agent_base_url,
            poll_interval,
            store_timeout,
            stage_timeout,
            max_stage_retries,
            retry_backoff,
        }
    }

    /// Validates the configuration
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.bind_addr.is_empty() {
            anyhow::bail!("bind_addr cannot be empty");
        }

        if !self.agent_base_url.starts_with("http://")
            && !self.agent_base_url.starts_with("https://")
        {
            anyhow::bail!("agent_base_url must start with http:// or https://");
        }

        if self.poll_interval.is_zero() {
            anyhow::bail!("poll_interval must be greater than 0");
        }

        if self.store_timeout.is_zero() {
            anyhow::bail!("store_timeout must be greater than 0");
        }

        if self.stage_timeout.is_zero() {
            anyhow::bail!("stage_timeout must be greater than 0");
        }

        Ok(())
    }
}

impl Default for Config {
    fn default() -> Self {
        Self::new(
            "0.0.0.0:8080".to_string(),
            "http://localhost:9000/agents".to_string(),
        )
    }
}

fn env_parse<T: std::str::FromStr>(name: &str) -> Option<T> {
    std::env::var(name).ok().and_then(|s| s.parse::<T>().ok())
}
