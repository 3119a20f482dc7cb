//! Loading `DispatchConfig` from environment variables

use anyhow::{anyhow, bail, Context, Result};
use std::collections::HashMap;
use std::fmt::Display;
use std::str::FromStr;
use std::time::Duration;

use super::builder::DispatchConfigBuilder;
use super::types::DispatchConfig;
use crate::operation::WebhookSpec;

pub const ENV_API_KEY: &str = "FIRECRAWL_API_KEY";
pub const ENV_API_URL: &str = "FIRECRAWL_API_URL";
pub const ENV_RETRY_MAX_ATTEMPTS: &str = "FIRECRAWL_RETRY_MAX_ATTEMPTS";
pub const ENV_RETRY_INITIAL_DELAY: &str = "FIRECRAWL_RETRY_INITIAL_DELAY";
pub const ENV_RETRY_MAX_DELAY: &str = "FIRECRAWL_RETRY_MAX_DELAY";
pub const ENV_RETRY_BACKOFF_FACTOR: &str = "FIRECRAWL_RETRY_BACKOFF_FACTOR";
pub const ENV_RATE_LIMIT_REQUESTS: &str = "FIRECRAWL_RATE_LIMIT_REQUESTS";
pub const ENV_RATE_LIMIT_WINDOW_SECS: &str = "FIRECRAWL_RATE_LIMIT_WINDOW_SECS";
pub const ENV_CREDIT_BUDGET: &str = "FIRECRAWL_CREDIT_BUDGET";
pub const ENV_CREDIT_WINDOW_SECS: &str = "FIRECRAWL_CREDIT_WINDOW_SECS";
pub const ENV_CREDIT_WARNING_THRESHOLD: &str = "FIRECRAWL_CREDIT_WARNING_THRESHOLD";
pub const ENV_CREDIT_CRITICAL_THRESHOLD: &str = "FIRECRAWL_CREDIT_CRITICAL_THRESHOLD";
pub const ENV_OPERATION_DEADLINE_SECS: &str = "FIRECRAWL_OPERATION_DEADLINE_SECS";
pub const ENV_REQUEST_TIMEOUT_SECS: &str = "FIRECRAWL_REQUEST_TIMEOUT_SECS";
pub const ENV_POLL_INTERVAL_MS: &str = "FIRECRAWL_POLL_INTERVAL_MS";
pub const ENV_POLL_DEADLINE_SECS: &str = "FIRECRAWL_POLL_DEADLINE_SECS";
pub const ENV_JOB_RETENTION_SECS: &str = "FIRECRAWL_JOB_RETENTION_SECS";
pub const ENV_WEBHOOK_URL: &str = "FIRECRAWL_WEBHOOK_URL";
pub const ENV_WEBHOOK_HEADERS: &str = "FIRECRAWL_WEBHOOK_HEADERS";

impl DispatchConfig {
    /// Build a configuration from the process environment
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Build a configuration from any key/value source.
    ///
    /// Unset or blank variables fall back to defaults; malformed values are
    /// errors.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        match (get(ENV_API_KEY), get(ENV_API_URL)) {
            (Some(key), Some(url)) => {
                apply_env(DispatchConfig::builder().api_key(key).api_url(url), &get)?.build()
            }
            (Some(key), None) => apply_env(DispatchConfig::builder().api_key(key), &get)?.build(),
            (None, Some(url)) => apply_env(DispatchConfig::builder().api_url(url), &get)?.build(),
            (None, None) => bail!("{ENV_API_KEY} is required unless {ENV_API_URL} is set"),
        }
    }
}

fn apply_env<S, F>(
    mut builder: DispatchConfigBuilder<S>,
    get: &F,
) -> Result<DispatchConfigBuilder<S>>
where
    F: Fn(&str) -> Option<String>,
{
    if let Some(attempts) = parse_var::<u32, _>(get, ENV_RETRY_MAX_ATTEMPTS)? {
        builder = builder.max_attempts(attempts);
    }
    if let Some(ms) = parse_var::<u64, _>(get, ENV_RETRY_INITIAL_DELAY)? {
        builder = builder.initial_delay(Duration::from_millis(ms));
    }
    if let Some(ms) = parse_var::<u64, _>(get, ENV_RETRY_MAX_DELAY)? {
        builder = builder.max_delay(Duration::from_millis(ms));
    }
    if let Some(factor) = parse_var::<f64, _>(get, ENV_RETRY_BACKOFF_FACTOR)? {
        builder = builder.backoff_factor(factor);
    }

    let requests = parse_var::<u32, _>(get, ENV_RATE_LIMIT_REQUESTS)?
        .unwrap_or(builder.rate_limit_requests);
    let window = parse_var::<u64, _>(get, ENV_RATE_LIMIT_WINDOW_SECS)?
        .map(Duration::from_secs)
        .unwrap_or(builder.rate_limit_window);
    builder = builder.rate_limit(requests, window);

    if let Some(budget) = parse_var::<u64, _>(get, ENV_CREDIT_BUDGET)? {
        builder = builder.credit_budget(Some(budget));
    }
    if let Some(secs) = parse_var::<u64, _>(get, ENV_CREDIT_WINDOW_SECS)? {
        builder = builder.credit_window(Some(Duration::from_secs(secs)));
    }
    let warning = parse_var::<u64, _>(get, ENV_CREDIT_WARNING_THRESHOLD)?
        .unwrap_or(builder.credit_warning_threshold);
    let critical = parse_var::<u64, _>(get, ENV_CREDIT_CRITICAL_THRESHOLD)?
        .unwrap_or(builder.credit_critical_threshold);
    builder = builder.credit_thresholds(warning, critical);

    if let Some(secs) = parse_var::<u64, _>(get, ENV_OPERATION_DEADLINE_SECS)? {
        builder = builder.operation_deadline(Duration::from_secs(secs));
    }
    if let Some(secs) = parse_var::<u64, _>(get, ENV_REQUEST_TIMEOUT_SECS)? {
        builder = builder.request_timeout(Duration::from_secs(secs));
    }
    if let Some(ms) = parse_var::<u64, _>(get, ENV_POLL_INTERVAL_MS)? {
        builder = builder.poll_interval(Duration::from_millis(ms));
    }
    if let Some(secs) = parse_var::<u64, _>(get, ENV_POLL_DEADLINE_SECS)? {
        builder = builder.poll_deadline(Duration::from_secs(secs));
    }
    if let Some(secs) = parse_var::<u64, _>(get, ENV_JOB_RETENTION_SECS)? {
        builder = builder.job_retention(Duration::from_secs(secs));
    }

    match (get(ENV_WEBHOOK_URL), get(ENV_WEBHOOK_HEADERS)) {
        (Some(url), headers) => {
            let headers = headers
                .map(|raw| {
                    serde_json::from_str::<HashMap<String, String>>(&raw).with_context(|| {
                        format!("{ENV_WEBHOOK_HEADERS} must be a JSON object of strings")
                    })
                })
                .transpose()?;
            builder = builder.webhook(Some(WebhookSpec {
                url,
                headers,
                ..Default::default()
            }));
        }
        (None, Some(_)) => bail!("{ENV_WEBHOOK_HEADERS} requires {ENV_WEBHOOK_URL}"),
        (None, None) => {}
    }

    Ok(builder)
}

fn parse_var<T, F>(get: &F, key: &str) -> Result<Option<T>>
where
    T: FromStr,
    T::Err: Display,
    F: Fn(&str) -> Option<String>,
{
    get(key)
        .map(|raw| {
            raw.trim()
                .parse::<T>()
                .map_err(|e| anyhow!("Invalid value '{raw}' for {key}: {e}"))
        })
        .transpose()
}
