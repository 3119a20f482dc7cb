//! Test utilities shared by the integration suite

#![allow(dead_code)]

use futures::future::BoxFuture;
use parking_lot::Mutex;
use std::collections::VecDeque;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;
use tokio::time::Instant;

use kodegen_tools_firecrawl::config::DispatchConfig;
use kodegen_tools_firecrawl::dispatch_engine::Dispatcher;
use kodegen_tools_firecrawl::operation::{
    Document, DocumentMetadata, JobOutput, JobSnapshot, JobStatus, JobSubmission, ScrapeParams,
};
use kodegen_tools_firecrawl::operation::OperationRequest;
use kodegen_tools_firecrawl::transport::{
    ReplyPayload, Transport, TransportError, UpstreamCall, UpstreamReply,
};

pub type Scripted = Result<UpstreamReply, TransportError>;

/// In-memory transport answering calls from a script, in order
#[derive(Default)]
pub struct ScriptedTransport {
    script: Mutex<VecDeque<Scripted>>,
    calls: Mutex<Vec<UpstreamCall>>,
    sent_at: Mutex<Vec<Instant>>,
    count: AtomicUsize,
    latency: Option<Duration>,
}

impl ScriptedTransport {
    pub fn new(script: impl IntoIterator<Item = Scripted>) -> Self {
        Self {
            script: Mutex::new(script.into_iter().collect()),
            ..Default::default()
        }
    }

    /// Each call takes `latency` of (tokio) time before answering
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    pub fn push(&self, reply: Scripted) {
        self.script.lock().push_back(reply);
    }

    pub fn call_count(&self) -> usize {
        self.count.load(Ordering::SeqCst)
    }

    pub fn calls(&self) -> Vec<UpstreamCall> {
        self.calls.lock().clone()
    }

    /// When each call reached the transport
    pub fn sent_at(&self) -> Vec<Instant> {
        self.sent_at.lock().clone()
    }
}

impl Transport for ScriptedTransport {
    fn execute<'a>(&'a self, call: &'a UpstreamCall) -> BoxFuture<'a, Scripted> {
        Box::pin(async move {
            self.count.fetch_add(1, Ordering::SeqCst);
            self.calls.lock().push(call.clone());
            self.sent_at.lock().push(Instant::now());
            if let Some(latency) = self.latency {
                tokio::time::sleep(latency).await;
            }
            self.script.lock().pop_front().unwrap_or_else(|| {
                Err(TransportError::Rejected {
                    status: None,
                    detail: format!("script exhausted at {call}"),
                })
            })
        })
    }
}

/// Config with fast, deterministic defaults for dispatcher tests
pub fn test_config() -> DispatchConfig {
    DispatchConfig::builder()
        .api_key("fc-test")
        .rate_limit(100, Duration::from_secs(60))
        .max_attempts(3)
        .initial_delay(Duration::from_millis(100))
        .max_delay(Duration::from_secs(1))
        .backoff_factor(2.0)
        .operation_deadline(Duration::from_secs(60))
        .poll_interval(Duration::from_secs(2))
        .poll_deadline(Duration::from_secs(120))
        .build()
        .unwrap()
}

pub fn dispatcher(config: &DispatchConfig, transport: Arc<ScriptedTransport>) -> Arc<Dispatcher> {
    Arc::new(Dispatcher::new(config, transport))
}

pub fn scrape(url: &str) -> OperationRequest {
    OperationRequest::Scrape(ScrapeParams {
        url: url.to_string(),
        ..Default::default()
    })
}

pub fn page(url: &str) -> Document {
    Document {
        markdown: Some(format!("content of {url}")),
        metadata: DocumentMetadata {
            source_url: Some(url.to_string()),
            status_code: Some(200),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn failed_page(url: &str, code: u16) -> Document {
    Document {
        metadata: DocumentMetadata {
            source_url: Some(url.to_string()),
            status_code: Some(code),
            ..Default::default()
        },
        ..Default::default()
    }
}

pub fn scraped(url: &str) -> Scripted {
    Ok(UpstreamReply::new(ReplyPayload::Scraped(page(url))).with_credits(1))
}

pub fn submitted(id: &str) -> Scripted {
    Ok(UpstreamReply::new(ReplyPayload::Submitted(JobSubmission {
        id: id.to_string(),
        url: None,
        invalid_urls: Vec::new(),
    })))
}

pub fn snapshot(status: JobStatus, completed: u64, total: u64) -> JobSnapshot {
    JobSnapshot {
        status,
        completed: Some(completed),
        total: Some(total),
        credits_used: Some(completed),
        output: None,
        error: None,
        expires_at: None,
    }
}

pub fn status_reply(snapshot: JobSnapshot) -> Scripted {
    let credits = snapshot.credits_used;
    let reply = UpstreamReply::new(ReplyPayload::Status(snapshot));
    Ok(match credits {
        Some(units) => reply.with_credits(units),
        None => reply,
    })
}

pub fn documents_status(status: JobStatus, docs: Vec<Document>, total: u64) -> Scripted {
    let mut snap = snapshot(status, docs.len() as u64, total);
    snap.output = Some(JobOutput::Documents(docs));
    status_reply(snap)
}

pub fn server_error(status: u16) -> Scripted {
    Err(TransportError::Server {
        status,
        detail: "upstream unavailable".to_string(),
    })
}

pub fn rate_limited(retry_after: Option<Duration>) -> Scripted {
    Err(TransportError::RateLimited {
        detail: "Too Many Requests".to_string(),
        retry_after,
    })
}

pub fn rejected(status: u16, detail: &str) -> Scripted {
    Err(TransportError::Rejected {
        status: Some(status),
        detail: detail.to_string(),
    })
}
