//! Error types for dispatched operations
//!
//! Every failure a caller can see is one `DispatchError`; each maps to a
//! named `FailureKind` so tool output can state what went wrong without
//! leaking transport internals.

use serde::Serialize;
use std::fmt;
use thiserror::Error;

use super::job_tracker::JobNotFound;
use crate::operation::{JobStatus, ValidationError};
use crate::transport::TransportError;

/// Result type alias for dispatched operations
pub type DispatchResult<T> = Result<T, DispatchError>;

/// Named failure categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub enum FailureKind {
    ValidationFailure,
    RateLimited,
    TransientFailure,
    BudgetExceeded,
    PermanentFailure,
    PollTimedOut,
    PollFailed,
    Cancelled,
    NotFound,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::ValidationFailure => "ValidationFailure",
            Self::RateLimited => "RateLimited",
            Self::TransientFailure => "TransientFailure",
            Self::BudgetExceeded => "BudgetExceeded",
            Self::PermanentFailure => "PermanentFailure",
            Self::PollTimedOut => "PollTimedOut",
            Self::PollFailed => "PollFailed",
            Self::Cancelled => "Cancelled",
            Self::NotFound => "NotFound",
        };
        f.write_str(label)
    }
}

#[derive(Debug, Clone, Error)]
pub enum DispatchError {
    /// Rejected locally before any upstream traffic
    #[error("Invalid request: {0}")]
    Validation(#[from] ValidationError),

    /// Upstream kept answering 429, or no rate slot opened before the deadline
    #[error("Rate limited after {attempts} attempt(s): {detail}")]
    RateLimited { attempts: u32, detail: String },

    /// Retries exhausted (or deadline reached) on transient failures
    #[error("Transient failure after {attempts} attempt(s): {detail}")]
    Transient { attempts: u32, detail: String },

    /// Refused before sending because the credit budget would be exceeded
    #[error(
        "Credit budget exceeded: {counted} of {budget} credit(s) used, operation needs about {requested}"
    )]
    BudgetExceeded {
        counted: u64,
        budget: u64,
        requested: u64,
    },

    /// Upstream rejected the request; retrying cannot help
    #[error("Upstream rejected the request: {detail}")]
    Permanent { status: Option<u16>, detail: String },

    /// Polling deadline passed; the job stays queryable
    #[error("Job {job_id} still {last_status} when polling stopped at its deadline")]
    PollTimedOut {
        job_id: String,
        last_status: JobStatus,
    },

    /// The job itself failed, or its status could not be obtained
    #[error("Job {job_id} failed: {detail}")]
    PollFailed { job_id: String, detail: String },

    #[error("Operation was cancelled")]
    Cancelled,

    #[error("Job {0} not found")]
    JobNotFound(String),
}

impl DispatchError {
    pub fn kind(&self) -> FailureKind {
        match self {
            Self::Validation(_) => FailureKind::ValidationFailure,
            Self::RateLimited { .. } => FailureKind::RateLimited,
            Self::Transient { .. } => FailureKind::TransientFailure,
            Self::BudgetExceeded { .. } => FailureKind::BudgetExceeded,
            Self::Permanent { .. } => FailureKind::PermanentFailure,
            Self::PollTimedOut { .. } => FailureKind::PollTimedOut,
            Self::PollFailed { .. } => FailureKind::PollFailed,
            Self::Cancelled => FailureKind::Cancelled,
            Self::JobNotFound(_) => FailureKind::NotFound,
        }
    }

    /// Final error for a call that will not be retried again
    pub(crate) fn from_transport(err: TransportError, attempts: u32) -> Self {
        match err {
            TransportError::RateLimited { detail, .. } => Self::RateLimited { attempts, detail },
            TransportError::Server { status, detail } => Self::Transient {
                attempts,
                detail: format!("HTTP {status}: {detail}"),
            },
            TransportError::Network(detail) | TransportError::Unknown(detail) => {
                Self::Transient { attempts, detail }
            }
            TransportError::Rejected { status, detail } => Self::Permanent { status, detail },
        }
    }

    pub(crate) fn internal(detail: impl Into<String>) -> Self {
        Self::Permanent {
            status: None,
            detail: detail.into(),
        }
    }
}

impl From<JobNotFound> for DispatchError {
    fn from(err: JobNotFound) -> Self {
        Self::JobNotFound(err.0)
    }
}
