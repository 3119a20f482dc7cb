//! Type-safe builder for `DispatchConfig` using the typestate pattern
//!
//! Credentials are the only required input: `build()` exists once either an
//! API key (hosted endpoint) or a custom endpoint (self-hosted) is supplied.

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::marker::PhantomData;
use std::time::Duration;
use url::Url;

use crate::operation::{OperationKind, WebhookSpec};
use crate::utils::{
    DEFAULT_API_URL, DEFAULT_BACKOFF_FACTOR, DEFAULT_CREDIT_CRITICAL_THRESHOLD,
    DEFAULT_CREDIT_WARNING_THRESHOLD, DEFAULT_INITIAL_DELAY_MS, DEFAULT_JOB_RETENTION_SECS,
    DEFAULT_MAX_ATTEMPTS, DEFAULT_MAX_DELAY_MS, DEFAULT_OPERATION_DEADLINE_SECS,
    DEFAULT_POLL_DEADLINE_SECS, DEFAULT_POLL_INTERVAL_MS, DEFAULT_RATE_LIMIT_REQUESTS,
    DEFAULT_RATE_LIMIT_WINDOW_SECS, DEFAULT_REQUEST_TIMEOUT_SECS,
};

use super::types::DispatchConfig;

// Type states for the builder
pub struct WithApiKey;
pub struct WithEndpoint;

pub struct DispatchConfigBuilder<State = ()> {
    pub(crate) api_key: Option<String>,
    pub(crate) api_url: Option<String>,
    pub(crate) rate_limit_requests: u32,
    pub(crate) rate_limit_window: Duration,
    pub(crate) operation_weights: HashMap<OperationKind, u32>,
    pub(crate) credit_budget: Option<u64>,
    pub(crate) credit_window: Option<Duration>,
    pub(crate) credit_warning_threshold: u64,
    pub(crate) credit_critical_threshold: u64,
    pub(crate) max_attempts: u32,
    pub(crate) initial_delay: Duration,
    pub(crate) max_delay: Duration,
    pub(crate) backoff_factor: f64,
    pub(crate) operation_deadline: Duration,
    pub(crate) request_timeout: Duration,
    pub(crate) poll_interval: Duration,
    pub(crate) poll_deadline: Duration,
    pub(crate) job_retention: Duration,
    pub(crate) webhook: Option<WebhookSpec>,
    pub(crate) _phantom: PhantomData<State>,
}

impl Default for DispatchConfigBuilder<()> {
    fn default() -> Self {
        Self {
            api_key: None,
            api_url: None,
            rate_limit_requests: DEFAULT_RATE_LIMIT_REQUESTS,
            rate_limit_window: Duration::from_secs(DEFAULT_RATE_LIMIT_WINDOW_SECS),
            operation_weights: HashMap::new(),
            credit_budget: None,
            credit_window: None,
            credit_warning_threshold: DEFAULT_CREDIT_WARNING_THRESHOLD,
            credit_critical_threshold: DEFAULT_CREDIT_CRITICAL_THRESHOLD,
            max_attempts: DEFAULT_MAX_ATTEMPTS,
            initial_delay: Duration::from_millis(DEFAULT_INITIAL_DELAY_MS),
            max_delay: Duration::from_millis(DEFAULT_MAX_DELAY_MS),
            backoff_factor: DEFAULT_BACKOFF_FACTOR,
            operation_deadline: Duration::from_secs(DEFAULT_OPERATION_DEADLINE_SECS),
            request_timeout: Duration::from_secs(DEFAULT_REQUEST_TIMEOUT_SECS),
            poll_interval: Duration::from_millis(DEFAULT_POLL_INTERVAL_MS),
            poll_deadline: Duration::from_secs(DEFAULT_POLL_DEADLINE_SECS),
            job_retention: Duration::from_secs(DEFAULT_JOB_RETENTION_SECS),
            webhook: None,
            _phantom: PhantomData,
        }
    }
}

impl DispatchConfig {
    /// Create a builder for configuring a `DispatchConfig` with a fluent interface
    #[must_use]
    pub fn builder() -> DispatchConfigBuilder<()> {
        DispatchConfigBuilder::default()
    }
}

impl<State> DispatchConfigBuilder<State> {
    fn transition<Next>(self) -> DispatchConfigBuilder<Next> {
        DispatchConfigBuilder {
            api_key: self.api_key,
            api_url: self.api_url,
            rate_limit_requests: self.rate_limit_requests,
            rate_limit_window: self.rate_limit_window,
            operation_weights: self.operation_weights,
            credit_budget: self.credit_budget,
            credit_window: self.credit_window,
            credit_warning_threshold: self.credit_warning_threshold,
            credit_critical_threshold: self.credit_critical_threshold,
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_factor: self.backoff_factor,
            operation_deadline: self.operation_deadline,
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            poll_deadline: self.poll_deadline,
            job_retention: self.job_retention,
            webhook: self.webhook,
            _phantom: PhantomData,
        }
    }

    fn finish(self) -> Result<DispatchConfig> {
        let api_key = match self.api_key {
            Some(key) if key.trim().is_empty() => bail!("API key must not be empty"),
            other => other,
        };

        let raw_url = self.api_url.as_deref().unwrap_or(DEFAULT_API_URL);
        let api_url =
            Url::parse(raw_url).with_context(|| format!("Invalid API URL '{raw_url}'"))?;
        if !matches!(api_url.scheme(), "http" | "https") {
            bail!("API URL must use http or https, got '{}'", api_url.scheme());
        }
        // The hosted endpoint refuses anonymous calls
        if api_key.is_none() && api_url.host_str() == Url::parse(DEFAULT_API_URL)?.host_str() {
            bail!("An API key is required for the hosted Firecrawl endpoint");
        }

        if self.rate_limit_requests == 0 {
            bail!("rate_limit_requests must be at least 1");
        }
        if self.rate_limit_window.is_zero() {
            bail!("rate_limit_window must be greater than zero");
        }
        if let Some((kind, _)) = self.operation_weights.iter().find(|(_, w)| **w == 0) {
            bail!("Rate weight for {kind} must be at least 1");
        }
        if self.max_attempts == 0 {
            bail!("max_attempts must be at least 1");
        }
        if self.initial_delay > self.max_delay {
            bail!(
                "initial_delay ({:?}) must not exceed max_delay ({:?})",
                self.initial_delay,
                self.max_delay
            );
        }
        if !self.backoff_factor.is_finite() || self.backoff_factor < 1.0 {
            bail!(
                "backoff_factor must be a finite number >= 1.0, got {}",
                self.backoff_factor
            );
        }
        if self.credit_window.is_some_and(|w| w.is_zero()) {
            bail!("credit_window must be greater than zero");
        }
        for (name, value) in [
            ("operation_deadline", self.operation_deadline),
            ("request_timeout", self.request_timeout),
            ("poll_interval", self.poll_interval),
            ("poll_deadline", self.poll_deadline),
        ] {
            if value.is_zero() {
                bail!("{name} must be greater than zero");
            }
        }
        if let Some(hook) = &self.webhook {
            Url::parse(&hook.url)
                .map_err(|e| anyhow!("Invalid webhook URL '{}': {e}", hook.url))?;
        }

        Ok(DispatchConfig {
            api_key,
            api_url,
            rate_limit_requests: self.rate_limit_requests,
            rate_limit_window: self.rate_limit_window,
            operation_weights: self.operation_weights,
            credit_budget: self.credit_budget,
            credit_window: self.credit_window,
            credit_warning_threshold: self.credit_warning_threshold,
            credit_critical_threshold: self.credit_critical_threshold,
            max_attempts: self.max_attempts,
            initial_delay: self.initial_delay,
            max_delay: self.max_delay,
            backoff_factor: self.backoff_factor,
            operation_deadline: self.operation_deadline,
            request_timeout: self.request_timeout,
            poll_interval: self.poll_interval,
            poll_deadline: self.poll_deadline,
            job_retention: self.job_retention,
            webhook: self.webhook,
        })
    }
}

impl DispatchConfigBuilder<()> {
    /// Authenticate against the hosted endpoint (or a custom one set later)
    pub fn api_key(self, key: impl Into<String>) -> DispatchConfigBuilder<WithApiKey> {
        let mut next = self.transition::<WithApiKey>();
        next.api_key = Some(key.into());
        next
    }

    /// Target a self-hosted deployment; the key becomes optional
    pub fn api_url(self, url: impl Into<String>) -> DispatchConfigBuilder<WithEndpoint> {
        let mut next = self.transition::<WithEndpoint>();
        next.api_url = Some(url.into());
        next
    }
}

impl DispatchConfigBuilder<WithApiKey> {
    #[must_use]
    pub fn api_url(mut self, url: impl Into<String>) -> Self {
        self.api_url = Some(url.into());
        self
    }

    pub fn build(self) -> Result<DispatchConfig> {
        self.finish()
    }
}

impl DispatchConfigBuilder<WithEndpoint> {
    #[must_use]
    pub fn api_key(mut self, key: impl Into<String>) -> Self {
        self.api_key = Some(key.into());
        self
    }

    pub fn build(self) -> Result<DispatchConfig> {
        self.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn defaults_with_api_key() {
        let config = DispatchConfig::builder().api_key("fc-test").build().unwrap();
        assert_eq!(config.api_url().as_str(), "https://api.firecrawl.dev/");
        assert_eq!(config.max_attempts(), DEFAULT_MAX_ATTEMPTS);
        assert_eq!(config.credit_budget(), None);
        assert_eq!(config.operation_weight(OperationKind::Scrape), 1);
    }

    #[test]
    fn self_hosted_without_key() {
        let config = DispatchConfig::builder()
            .api_url("http://localhost:3002")
            .build()
            .unwrap();
        assert!(config.api_key().is_none());
    }

    #[test]
    fn hosted_endpoint_requires_key() {
        let result = DispatchConfig::builder()
            .api_url("https://api.firecrawl.dev")
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_inverted_delays() {
        let result = DispatchConfig::builder()
            .api_key("fc-test")
            .initial_delay(Duration::from_secs(20))
            .max_delay(Duration::from_secs(1))
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn rejects_shrinking_backoff() {
        let result = DispatchConfig::builder()
            .api_key("fc-test")
            .backoff_factor(0.5)
            .build();
        assert!(result.is_err());
    }

    #[test]
    fn debug_redacts_key() {
        let config = DispatchConfig::builder().api_key("fc-secret").build().unwrap();
        let rendered = format!("{config:?}");
        assert!(!rendered.contains("fc-secret"));
    }
}
