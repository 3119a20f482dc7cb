//! The seam between the dispatcher and the upstream API
//!
//! The dispatcher only ever talks to a `Transport`. The production
//! implementation is [`HttpTransport`]; tests substitute scripted doubles.

pub mod decode;
pub mod http;
pub mod webhook;

pub use http::HttpTransport;
pub use webhook::WebhookEvent;

use futures::future::BoxFuture;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

use crate::dispatch_engine::{CreditLedger, ErrorClass};
use crate::operation::{
    Document, JobKind, JobSnapshot, JobSubmission, OperationKind, OperationRequest, SearchHit,
};

/// One upstream round-trip
#[derive(Debug, Clone, PartialEq)]
pub enum UpstreamCall {
    /// Execute an operation (submission for async kinds)
    Operation(OperationRequest),
    /// Fetch the status of an async job
    JobStatus { kind: JobKind, id: String },
}

impl UpstreamCall {
    /// Rate-limiter key of this call
    pub fn operation_kind(&self) -> OperationKind {
        match self {
            UpstreamCall::Operation(request) => request.kind(),
            UpstreamCall::JobStatus { kind, .. } => kind.poll_kind(),
        }
    }

    pub fn is_status_poll(&self) -> bool {
        matches!(self, UpstreamCall::JobStatus { .. })
    }

    /// Upstream path segments, relative to the API base URL.
    /// Job ids are kept as single segments.
    pub fn path_segments(&self) -> Vec<&str> {
        let (kind, id) = match self {
            UpstreamCall::JobStatus { kind, id } => (*kind, id.as_str()),
            UpstreamCall::Operation(request) => match request {
                OperationRequest::Scrape(_) => return vec!["v1", "scrape"],
                OperationRequest::Map(_) => return vec!["v1", "map"],
                OperationRequest::Crawl(_) => return vec!["v1", "crawl"],
                OperationRequest::BatchScrape(_) => return vec!["v1", "batch", "scrape"],
                OperationRequest::Search(_) => return vec!["v1", "search"],
                OperationRequest::Extract(_) => return vec!["v1", "extract"],
                OperationRequest::DeepResearch(_) => return vec!["v1", "deep-research"],
                OperationRequest::GenerateLlmsText(_) => return vec!["v1", "llmstxt"],
                OperationRequest::CheckCrawlStatus(p) => (JobKind::Crawl, p.id.as_str()),
                OperationRequest::CheckBatchStatus(p) => (JobKind::BatchScrape, p.id.as_str()),
            },
        };
        let mut segments: Vec<&str> = kind.status_segments().to_vec();
        segments.push(id);
        segments
    }
}

impl std::fmt::Display for UpstreamCall {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            UpstreamCall::Operation(request) => {
                write!(f, "{} {}", request.kind(), request.target())
            }
            UpstreamCall::JobStatus { kind, id } => write!(f, "{kind} status {id}"),
        }
    }
}

/// Decoded successful reply
#[derive(Debug, Clone, PartialEq)]
pub enum ReplyPayload {
    Scraped(Document),
    Mapped(Vec<String>),
    Searched(Vec<SearchHit>),
    Submitted(JobSubmission),
    Status(JobSnapshot),
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpstreamReply {
    pub payload: ReplyPayload,
    /// Credits the upstream reported for this call (cumulative for status polls)
    pub credits_used: Option<u64>,
}

impl UpstreamReply {
    pub fn new(payload: ReplyPayload) -> Self {
        Self {
            payload,
            credits_used: None,
        }
    }

    #[must_use]
    pub fn with_credits(mut self, credits: u64) -> Self {
        self.credits_used = Some(credits);
        self
    }
}

/// Classified upstream failure
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TransportError {
    #[error("upstream rate limit hit: {detail}")]
    RateLimited {
        detail: String,
        retry_after: Option<Duration>,
    },

    #[error("upstream server error (HTTP {status}): {detail}")]
    Server { status: u16, detail: String },

    #[error("network failure: {0}")]
    Network(String),

    #[error("request failed: {0}")]
    Unknown(String),

    #[error("upstream rejected the request: {detail}")]
    Rejected { status: Option<u16>, detail: String },
}

impl TransportError {
    /// Backoff class, or `None` when the failure is permanent
    pub fn error_class(&self) -> Option<ErrorClass> {
        match self {
            Self::RateLimited { .. } => Some(ErrorClass::RateLimited),
            Self::Server { .. } => Some(ErrorClass::ServerError),
            Self::Network(_) => Some(ErrorClass::NetworkTimeout),
            Self::Unknown(_) => Some(ErrorClass::Unknown),
            Self::Rejected { .. } => None,
        }
    }

    pub fn retry_after(&self) -> Option<Duration> {
        match self {
            Self::RateLimited { retry_after, .. } => *retry_after,
            _ => None,
        }
    }

    pub fn status(&self) -> Option<u16> {
        match self {
            Self::RateLimited { .. } => Some(429),
            Self::Server { status, .. } => Some(*status),
            Self::Rejected { status, .. } => *status,
            Self::Network(_) | Self::Unknown(_) => None,
        }
    }
}

/// Executes upstream calls
pub trait Transport: Send + Sync {
    fn execute<'a>(
        &'a self,
        call: &'a UpstreamCall,
    ) -> BoxFuture<'a, Result<UpstreamReply, TransportError>>;
}

/// Transport plus usage accounting.
///
/// Usage reported by operation calls is recorded in the ledger as soon as
/// the reply arrives, even if the caller has since gone away. Status polls
/// report cumulative usage, which the dispatcher charges as a delta.
#[derive(Clone)]
pub struct TransportClient {
    transport: Arc<dyn Transport>,
    ledger: Arc<CreditLedger>,
}

impl TransportClient {
    pub fn new(transport: Arc<dyn Transport>, ledger: Arc<CreditLedger>) -> Self {
        Self { transport, ledger }
    }

    pub async fn call(&self, call: &UpstreamCall) -> Result<UpstreamReply, TransportError> {
        let reply = self.transport.execute(call).await?;
        if !call.is_status_poll() {
            if let Some(units) = reply.credits_used {
                self.ledger.record_usage(units);
            }
        }
        Ok(reply)
    }
}
