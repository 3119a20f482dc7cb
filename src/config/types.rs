//! Core configuration types for the dispatch engine
//!
//! `DispatchConfig` holds every tunable that governs how operations reach
//! the upstream: credentials, rate ceiling, credit budget, retry backoff,
//! deadlines and async job handling.

use std::collections::HashMap;
use std::fmt;
use std::time::Duration;

use url::Url;

use crate::operation::{OperationKind, WebhookSpec};

/// Main configuration struct for the Firecrawl dispatch engine
#[derive(Clone)]
pub struct DispatchConfig {
    /// Bearer credential. Optional only for self-hosted endpoints.
    pub(crate) api_key: Option<String>,
    /// Base URL every upstream path is joined onto
    pub(crate) api_url: Url,

    pub(crate) rate_limit_requests: u32,
    pub(crate) rate_limit_window: Duration,
    /// Limiter cost per operation kind; kinds not listed cost 1
    pub(crate) operation_weights: HashMap<OperationKind, u32>,

    /// Credit ceiling; `None` means unlimited
    pub(crate) credit_budget: Option<u64>,
    /// Rolling window for the ceiling; `None` means lifetime
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

    /// Webhook attached to crawl and batch submissions
    pub(crate) webhook: Option<WebhookSpec>,
}

// Hand-written so the API key never lands in logs
impl fmt::Debug for DispatchConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DispatchConfig")
            .field("api_key", &self.api_key.as_ref().map(|_| "<redacted>"))
            .field("api_url", &self.api_url.as_str())
            .field("rate_limit_requests", &self.rate_limit_requests)
            .field("rate_limit_window", &self.rate_limit_window)
            .field("operation_weights", &self.operation_weights)
            .field("credit_budget", &self.credit_budget)
            .field("credit_window", &self.credit_window)
            .field("credit_warning_threshold", &self.credit_warning_threshold)
            .field("credit_critical_threshold", &self.credit_critical_threshold)
            .field("max_attempts", &self.max_attempts)
            .field("initial_delay", &self.initial_delay)
            .field("max_delay", &self.max_delay)
            .field("backoff_factor", &self.backoff_factor)
            .field("operation_deadline", &self.operation_deadline)
            .field("request_timeout", &self.request_timeout)
            .field("poll_interval", &self.poll_interval)
            .field("poll_deadline", &self.poll_deadline)
            .field("job_retention", &self.job_retention)
            .field("webhook", &self.webhook.as_ref().map(|w| w.url.as_str()))
            .finish()
    }
}
