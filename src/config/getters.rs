//! Getter methods for `DispatchConfig`

use std::time::Duration;
use url::Url;

use super::types::DispatchConfig;
use crate::operation::{OperationKind, WebhookSpec};

impl DispatchConfig {
    #[must_use]
    pub fn api_key(&self) -> Option<&str> {
        self.api_key.as_deref()
    }

    #[must_use]
    pub fn api_url(&self) -> &Url {
        &self.api_url
    }

    #[must_use]
    pub fn rate_limit_requests(&self) -> u32 {
        self.rate_limit_requests
    }

    #[must_use]
    pub fn rate_limit_window(&self) -> Duration {
        self.rate_limit_window
    }

    /// Limiter cost of one call of `kind`
    #[must_use]
    pub fn operation_weight(&self, kind: OperationKind) -> u32 {
        self.operation_weights.get(&kind).copied().unwrap_or(1)
    }

    #[must_use]
    pub fn credit_budget(&self) -> Option<u64> {
        self.credit_budget
    }

    #[must_use]
    pub fn credit_window(&self) -> Option<Duration> {
        self.credit_window
    }

    #[must_use]
    pub fn credit_warning_threshold(&self) -> u64 {
        self.credit_warning_threshold
    }

    #[must_use]
    pub fn credit_critical_threshold(&self) -> u64 {
        self.credit_critical_threshold
    }

    #[must_use]
    pub fn max_attempts(&self) -> u32 {
        self.max_attempts
    }

    #[must_use]
    pub fn initial_delay(&self) -> Duration {
        self.initial_delay
    }

    #[must_use]
    pub fn max_delay(&self) -> Duration {
        self.max_delay
    }

    #[must_use]
    pub fn backoff_factor(&self) -> f64 {
        self.backoff_factor
    }

    #[must_use]
    pub fn operation_deadline(&self) -> Duration {
        self.operation_deadline
    }

    #[must_use]
    pub fn request_timeout(&self) -> Duration {
        self.request_timeout
    }

    #[must_use]
    pub fn poll_interval(&self) -> Duration {
        self.poll_interval
    }

    #[must_use]
    pub fn poll_deadline(&self) -> Duration {
        self.poll_deadline
    }

    #[must_use]
    pub fn job_retention(&self) -> Duration {
        self.job_retention
    }

    #[must_use]
    pub fn webhook(&self) -> Option<&WebhookSpec> {
        self.webhook.as_ref()
    }
}
