//! Shared configuration constants for the Firecrawl tools
//!
//! This module contains default values and configuration constants used
//! throughout the codebase to ensure consistency and avoid magic numbers.

/// Hosted Firecrawl endpoint used when no custom endpoint is configured
pub const DEFAULT_API_URL: &str = "https://api.firecrawl.dev";

/// Default maximum attempts per logical call (first try included)
pub const DEFAULT_MAX_ATTEMPTS: u32 = 3;

/// Default base delay for retry backoff, in milliseconds
pub const DEFAULT_INITIAL_DELAY_MS: u64 = 1_000;

/// Default cap for retry backoff, in milliseconds
pub const DEFAULT_MAX_DELAY_MS: u64 = 10_000;

/// Default exponential factor for retry backoff
pub const DEFAULT_BACKOFF_FACTOR: f64 = 2.0;

/// Fraction of the computed delay used as the jitter band (±50%)
pub const JITTER_RATIO: f64 = 0.5;

/// Default request ceiling per rate window
///
/// Raise it for higher plans or self-hosted deployments.
pub const DEFAULT_RATE_LIMIT_REQUESTS: u32 = 100;

/// Default rate window length in seconds
pub const DEFAULT_RATE_LIMIT_WINDOW_SECS: u64 = 60;

/// Remaining credits at which a warning is logged
pub const DEFAULT_CREDIT_WARNING_THRESHOLD: u64 = 1_000;

/// Remaining credits at which a critical alert is logged
pub const DEFAULT_CREDIT_CRITICAL_THRESHOLD: u64 = 100;

/// Overall deadline for a synchronous operation, in seconds
pub const DEFAULT_OPERATION_DEADLINE_SECS: u64 = 120;

/// Timeout for a single HTTP round-trip, in seconds
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 60;

/// Initial poll cadence for async jobs, in milliseconds
pub const DEFAULT_POLL_INTERVAL_MS: u64 = 2_000;

/// Poll cadence growth per poll
pub const POLL_INTERVAL_GROWTH: f64 = 1.5;

/// Poll cadence never grows beyond this multiple of the initial interval
pub const POLL_INTERVAL_MAX_MULTIPLIER: u32 = 4;

/// Overall deadline for polling one async job, in seconds
pub const DEFAULT_POLL_DEADLINE_SECS: u64 = 600;

/// Retention of terminal job records, in seconds (30 minutes)
pub const DEFAULT_JOB_RETENTION_SECS: u64 = 30 * 60;

/// How often the job cleanup task sweeps expired records
pub const JOB_CLEANUP_INTERVAL_SECS: u64 = 60;

/// User agent sent with every upstream call
pub const USER_AGENT: &str = concat!("kodegen-firecrawl/", env!("CARGO_PKG_VERSION"));
