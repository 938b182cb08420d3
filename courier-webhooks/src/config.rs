//! Configuration for webhook registration and delivery

use std::time::Duration;

use courier_config::{ConfigManager, ConfigValidator, Validate};

use crate::RetryPolicy;

/// Default durable-queue job name for delivery jobs
pub const DEFAULT_JOB_NAME: &str = "webhook.deliver";

/// Configuration shared by the registrar, the delivery engine and the dispatcher
#[derive(Debug, Clone, PartialEq)]
pub struct DeliveryConfig {
    /// Timeout for a single outbound request
    pub request_timeout: Duration,

    /// Total attempts per subscription and event, the first included
    pub max_attempts: u32,

    /// Backoff unit; attempt `k` waits `base * 2^k` plus jitter
    pub backoff_base: Duration,

    /// Cap on simultaneously in-flight outbound requests, across all events
    pub max_in_flight: usize,

    /// Minimum accepted subscriber secret length, in characters
    pub min_secret_length: usize,

    /// User-Agent header for outgoing requests
    pub user_agent: String,

    /// Job name used when handing deliveries to a durable queue
    pub job_name: String,
}

impl Default for DeliveryConfig {
    fn default() -> Self {
        Self {
            request_timeout: Duration::from_secs(10),
            max_attempts: 5,
            backoff_base: Duration::from_secs(1),
            max_in_flight: 32,
            min_secret_length: 32,
            user_agent: format!("courier-webhooks/{}", env!("CARGO_PKG_VERSION")),
            job_name: DEFAULT_JOB_NAME.to_string(),
        }
    }
}

impl DeliveryConfig {
    /// Create a new configuration with defaults
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a builder for custom configuration
    pub fn builder() -> DeliveryConfigBuilder {
        DeliveryConfigBuilder::new()
    }

    /// Read overrides from a [`ConfigManager`]; absent keys keep their defaults.
    ///
    /// Keys: `webhook_timeout_ms`, `webhook_max_attempts`,
    /// `webhook_backoff_base_ms`, `webhook_max_in_flight`,
    /// `webhook_min_secret_length`, `webhook_user_agent`, `webhook_job_name`.
    pub fn from_config(manager: &ConfigManager) -> courier_config::Result<Self> {
        let mut config = Self::default();

        if let Some(ms) = manager.get_parsed_opt::<u64>("webhook_timeout_ms")? {
            config.request_timeout = Duration::from_millis(ms);
        }
        if let Some(attempts) = manager.get_parsed_opt("webhook_max_attempts")? {
            config.max_attempts = attempts;
        }
        if let Some(ms) = manager.get_parsed_opt::<u64>("webhook_backoff_base_ms")? {
            config.backoff_base = Duration::from_millis(ms);
        }
        if let Some(cap) = manager.get_parsed_opt("webhook_max_in_flight")? {
            config.max_in_flight = cap;
        }
        if let Some(min) = manager.get_parsed_opt("webhook_min_secret_length")? {
            config.min_secret_length = min;
        }
        if let Some(agent) = manager.get_parsed_opt("webhook_user_agent")? {
            config.user_agent = agent;
        }
        if let Some(name) = manager.get_parsed_opt("webhook_job_name")? {
            config.job_name = name;
        }

        config.validate()?;
        Ok(config)
    }

    /// Retry policy derived from this configuration
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(self.max_attempts, self.backoff_base)
    }
}

impl Validate for DeliveryConfig {
    fn validate(&self) -> courier_config::Result<()> {
        ConfigValidator::in_range(self.max_attempts, 1, 20, "webhook_max_attempts")?;
        ConfigValidator::at_least(self.max_in_flight, 1, "webhook_max_in_flight")?;
        ConfigValidator::at_least(self.min_secret_length, 16, "webhook_min_secret_length")?;
        ConfigValidator::at_least(
            self.request_timeout.as_millis(),
            1,
            "webhook_timeout_ms",
        )?;
        ConfigValidator::at_least(
            self.backoff_base.as_millis(),
            1,
            "webhook_backoff_base_ms",
        )?;
        ConfigValidator::not_empty(&self.user_agent, "webhook_user_agent")?;
        ConfigValidator::not_empty(&self.job_name, "webhook_job_name")
    }
}

/// Builder for DeliveryConfig
#[derive(Debug, Clone, Default)]
pub struct DeliveryConfigBuilder {
    config: DeliveryConfig,
}

impl DeliveryConfigBuilder {
    /// Create a new builder with default settings
    pub fn new() -> Self {
        Self {
            config: DeliveryConfig::default(),
        }
    }

    /// Set the request timeout
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout = timeout;
        self
    }

    /// Set the total number of attempts
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.config.max_attempts = attempts;
        self
    }

    /// Set the backoff unit
    pub fn backoff_base(mut self, base: Duration) -> Self {
        self.config.backoff_base = base;
        self
    }

    /// Set the in-flight request cap
    pub fn max_in_flight(mut self, cap: usize) -> Self {
        self.config.max_in_flight = cap;
        self
    }

    /// Set the minimum secret length
    pub fn min_secret_length(mut self, len: usize) -> Self {
        self.config.min_secret_length = len;
        self
    }

    /// Set the User-Agent header
    pub fn user_agent(mut self, user_agent: impl Into<String>) -> Self {
        self.config.user_agent = user_agent.into();
        self
    }

    /// Set the durable queue job name
    pub fn job_name(mut self, name: impl Into<String>) -> Self {
        self.config.job_name = name.into();
        self
    }

    /// Build the configuration
    pub fn build(self) -> DeliveryConfig {
        self.config
    }
}
