//! Builder methods available for all states
//!
//! This module contains methods that can be called on the builder
//! regardless of its current type state.

use std::time::Duration;

use super::builder::DispatchConfigBuilder;
use crate::operation::{OperationKind, WebhookSpec};

impl<State> DispatchConfigBuilder<State> {
    /// Allow at most `requests` weighted calls in any rolling `window`
    #[must_use]
    pub fn rate_limit(mut self, requests: u32, window: Duration) -> Self {
        self.rate_limit_requests = requests;
        self.rate_limit_window = window;
        self
    }

    /// Limiter cost for one kind of operation (default 1)
    #[must_use]
    pub fn operation_weight(mut self, kind: OperationKind, weight: u32) -> Self {
        self.operation_weights.insert(kind, weight);
        self
    }

    #[must_use]
    pub fn credit_budget(mut self, budget: Option<u64>) -> Self {
        self.credit_budget = budget;
        self
    }

    /// Make the credit budget apply to a rolling window instead of the
    /// lifetime of the process.
    #[must_use]
    pub fn credit_window(mut self, window: Option<Duration>) -> Self {
        self.credit_window = window;
        self
    }

    #[must_use]
    pub fn credit_thresholds(mut self, warning: u64, critical: u64) -> Self {
        self.credit_warning_threshold = warning;
        self.credit_critical_threshold = critical;
        self
    }

    /// Total attempts per logical call, first try included
    #[must_use]
    pub fn max_attempts(mut self, attempts: u32) -> Self {
        self.max_attempts = attempts;
        self
    }

    #[must_use]
    pub fn initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    #[must_use]
    pub fn max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    #[must_use]
    pub fn backoff_factor(mut self, factor: f64) -> Self {
        self.backoff_factor = factor;
        self
    }

    #[must_use]
    pub fn operation_deadline(mut self, deadline: Duration) -> Self {
        self.operation_deadline = deadline;
        self
    }

    #[must_use]
    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.request_timeout = timeout;
        self
    }

    #[must_use]
    pub fn poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = interval;
        self
    }

    #[must_use]
    pub fn poll_deadline(mut self, deadline: Duration) -> Self {
        self.poll_deadline = deadline;
        self
    }

    /// How long terminal job records stay queryable
    #[must_use]
    pub fn job_retention(mut self, retention: Duration) -> Self {
        self.job_retention = retention;
        self
    }

    #[must_use]
    pub fn webhook(mut self, webhook: Option<WebhookSpec>) -> Self {
        self.webhook = webhook;
        self
    }
}
