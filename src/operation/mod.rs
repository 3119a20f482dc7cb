//! Operation requests accepted by the dispatcher

pub mod output;
pub mod params;

pub use output::*;
pub use params::*;

use serde::{Deserialize, Serialize};
use url::Url;

/// Every operation the tool surface exposes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum OperationKind {
    Scrape,
    Map,
    Crawl,
    BatchScrape,
    Search,
    Extract,
    CheckBatchStatus,
    CheckCrawlStatus,
    DeepResearch,
    GenerateLlmsText,
}

impl OperationKind {
    pub const ALL: [OperationKind; 10] = [
        OperationKind::Scrape,
        OperationKind::Map,
        OperationKind::Crawl,
        OperationKind::BatchScrape,
        OperationKind::Search,
        OperationKind::Extract,
        OperationKind::CheckBatchStatus,
        OperationKind::CheckCrawlStatus,
        OperationKind::DeepResearch,
        OperationKind::GenerateLlmsText,
    ];

    /// Name of the MCP tool serving this operation
    pub fn tool_name(&self) -> &'static str {
        match self {
            OperationKind::Scrape => "firecrawl_scrape",
            OperationKind::Map => "firecrawl_map",
            OperationKind::Crawl => "firecrawl_crawl",
            OperationKind::BatchScrape => "firecrawl_batch_scrape",
            OperationKind::Search => "firecrawl_search",
            OperationKind::Extract => "firecrawl_extract",
            OperationKind::CheckBatchStatus => "firecrawl_check_batch_status",
            OperationKind::CheckCrawlStatus => "firecrawl_check_crawl_status",
            OperationKind::DeepResearch => "firecrawl_deep_research",
            OperationKind::GenerateLlmsText => "firecrawl_generate_llmstxt",
        }
    }

    /// Status checks are free and bypass the budget gate
    pub fn is_status_check(&self) -> bool {
        matches!(
            self,
            OperationKind::CheckBatchStatus | OperationKind::CheckCrawlStatus
        )
    }
}

impl std::fmt::Display for OperationKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.tool_name())
    }
}

/// Kinds of long-running upstream jobs
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobKind {
    Crawl,
    BatchScrape,
    Extract,
    DeepResearch,
    LlmsText,
}

impl JobKind {
    /// Path segments of the endpoint serving status polls for this kind.
    /// The job id is appended as one more segment.
    pub fn status_segments(&self) -> &'static [&'static str] {
        match self {
            JobKind::Crawl => &["v1", "crawl"],
            JobKind::BatchScrape => &["v1", "batch", "scrape"],
            JobKind::Extract => &["v1", "extract"],
            JobKind::DeepResearch => &["v1", "deep-research"],
            JobKind::LlmsText => &["v1", "llmstxt"],
        }
    }

    /// Jobs the dispatcher polls inline before answering the caller.
    /// Crawls and batches return their id immediately instead.
    pub fn is_awaited(&self) -> bool {
        matches!(
            self,
            JobKind::Extract | JobKind::DeepResearch | JobKind::LlmsText
        )
    }

    /// Rate-limiter weight key for status polls of this kind
    pub fn poll_kind(&self) -> OperationKind {
        match self {
            JobKind::Crawl => OperationKind::CheckCrawlStatus,
            JobKind::BatchScrape => OperationKind::CheckBatchStatus,
            JobKind::Extract => OperationKind::Extract,
            JobKind::DeepResearch => OperationKind::DeepResearch,
            JobKind::LlmsText => OperationKind::GenerateLlmsText,
        }
    }
}

impl std::fmt::Display for JobKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobKind::Crawl => "crawl",
            JobKind::BatchScrape => "batch_scrape",
            JobKind::Extract => "extract",
            JobKind::DeepResearch => "deep_research",
            JobKind::LlmsText => "llmstxt",
        };
        f.write_str(label)
    }
}

/// A request rejected before any upstream traffic
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("{field}: {reason}")]
pub struct ValidationError {
    pub field: &'static str,
    pub reason: String,
}

impl ValidationError {
    pub fn new(field: &'static str, reason: impl Into<String>) -> Self {
        Self {
            field,
            reason: reason.into(),
        }
    }
}

/// A fully-typed operation request
#[derive(Debug, Clone, PartialEq)]
pub enum OperationRequest {
    Scrape(ScrapeParams),
    Map(MapParams),
    Crawl(CrawlParams),
    BatchScrape(BatchScrapeParams),
    Search(SearchParams),
    Extract(ExtractParams),
    CheckBatchStatus(StatusParams),
    CheckCrawlStatus(StatusParams),
    DeepResearch(DeepResearchParams),
    GenerateLlmsText(LlmsTextParams),
}

impl OperationRequest {
    pub fn kind(&self) -> OperationKind {
        match self {
            OperationRequest::Scrape(_) => OperationKind::Scrape,
            OperationRequest::Map(_) => OperationKind::Map,
            OperationRequest::Crawl(_) => OperationKind::Crawl,
            OperationRequest::BatchScrape(_) => OperationKind::BatchScrape,
            OperationRequest::Search(_) => OperationKind::Search,
            OperationRequest::Extract(_) => OperationKind::Extract,
            OperationRequest::CheckBatchStatus(_) => OperationKind::CheckBatchStatus,
            OperationRequest::CheckCrawlStatus(_) => OperationKind::CheckCrawlStatus,
            OperationRequest::DeepResearch(_) => OperationKind::DeepResearch,
            OperationRequest::GenerateLlmsText(_) => OperationKind::GenerateLlmsText,
        }
    }

    /// The async job kind this request submits, if any
    pub fn job_kind(&self) -> Option<JobKind> {
        match self {
            OperationRequest::Crawl(_) => Some(JobKind::Crawl),
            OperationRequest::BatchScrape(_) => Some(JobKind::BatchScrape),
            OperationRequest::Extract(_) => Some(JobKind::Extract),
            OperationRequest::DeepResearch(_) => Some(JobKind::DeepResearch),
            OperationRequest::GenerateLlmsText(_) => Some(JobKind::LlmsText),
            _ => None,
        }
    }

    /// Credits charged up front when checking the budget
    pub fn estimated_credits(&self) -> u64 {
        match self {
            OperationRequest::BatchScrape(p) => p.urls.len() as u64,
            OperationRequest::CheckBatchStatus(_) | OperationRequest::CheckCrawlStatus(_) => 0,
            _ => 1,
        }
    }

    /// Short description of what the request targets, for logs
    pub fn target(&self) -> String {
        match self {
            OperationRequest::Scrape(p) => p.url.clone(),
            OperationRequest::Map(p) => p.url.clone(),
            OperationRequest::Crawl(p) => p.url.clone(),
            OperationRequest::BatchScrape(p) => format!("{} url(s)", p.urls.len()),
            OperationRequest::Search(p) => p.query.clone(),
            OperationRequest::Extract(p) => format!("{} url(s)", p.urls.len()),
            OperationRequest::CheckBatchStatus(p) | OperationRequest::CheckCrawlStatus(p) => {
                p.id.clone()
            }
            OperationRequest::DeepResearch(p) => p.query.clone(),
            OperationRequest::GenerateLlmsText(p) => p.url.clone(),
        }
    }

    /// Check the request locally before it is admitted anywhere
    pub fn validate(&self) -> Result<(), ValidationError> {
        match self {
            OperationRequest::Scrape(p) => validate_url("url", &p.url),
            OperationRequest::Map(p) => {
                validate_url("url", &p.url)?;
                validate_positive("limit", p.limit)
            }
            OperationRequest::Crawl(p) => {
                validate_url("url", &p.url)?;
                validate_positive("limit", p.limit)?;
                if let Some(hook) = &p.webhook {
                    validate_url("webhook.url", &hook.url)?;
                }
                Ok(())
            }
            OperationRequest::BatchScrape(p) => {
                if p.urls.is_empty() {
                    return Err(ValidationError::new("urls", "at least one URL is required"));
                }
                // Upstream drops malformed entries itself when asked to
                if !p.ignore_invalid_urls.unwrap_or(false) {
                    for url in &p.urls {
                        validate_url("urls", url)?;
                    }
                }
                if let Some(hook) = &p.webhook {
                    validate_url("webhook.url", &hook.url)?;
                }
                Ok(())
            }
            OperationRequest::Search(p) => {
                validate_non_empty("query", &p.query)?;
                validate_positive("limit", p.limit)
            }
            OperationRequest::Extract(p) => {
                if p.urls.is_empty() {
                    return Err(ValidationError::new("urls", "at least one URL is required"));
                }
                if p.urls.iter().any(|u| u.trim().is_empty()) {
                    return Err(ValidationError::new("urls", "URLs must not be empty"));
                }
                if p.prompt.is_none() && p.schema.is_none() {
                    return Err(ValidationError::new(
                        "prompt",
                        "either a prompt or a schema is required",
                    ));
                }
                Ok(())
            }
            OperationRequest::CheckBatchStatus(p) | OperationRequest::CheckCrawlStatus(p) => {
                validate_job_id("id", &p.id)
            }
            OperationRequest::DeepResearch(p) => {
                validate_non_empty("query", &p.query)?;
                validate_range("maxDepth", p.max_depth, 1, 10)?;
                validate_range("timeLimit", p.time_limit, 30, 300)?;
                validate_range("maxUrls", p.max_urls, 1, 1000)
            }
            OperationRequest::GenerateLlmsText(p) => {
                validate_url("url", &p.url)?;
                validate_positive("maxUrls", p.max_urls)
            }
        }
    }
}

fn validate_non_empty(field: &'static str, value: &str) -> Result<(), ValidationError> {
    if value.trim().is_empty() {
        return Err(ValidationError::new(field, "must not be empty"));
    }
    Ok(())
}

/// Job ids are opaque upstream tokens (UUIDs in practice)
pub fn validate_job_id(field: &'static str, value: &str) -> Result<(), ValidationError> {
    validate_non_empty(field, value)?;
    if value
        .chars()
        .all(|c| c.is_ascii_alphanumeric() || c == '-' || c == '_')
    {
        return Ok(());
    }
    Err(ValidationError::new(
        field,
        format!("'{value}' is not a job id (letters, digits, '-' and '_' only)"),
    ))
}

fn validate_url(field: &'static str, value: &str) -> Result<(), ValidationError> {
    validate_non_empty(field, value)?;
    let parsed = Url::parse(value)
        .map_err(|e| ValidationError::new(field, format!("invalid URL '{value}': {e}")))?;
    match parsed.scheme() {
        "http" | "https" => Ok(()),
        other => Err(ValidationError::new(
            field,
            format!("unsupported scheme '{other}' in '{value}'"),
        )),
    }
}

fn validate_positive(field: &'static str, value: Option<u32>) -> Result<(), ValidationError> {
    match value {
        Some(0) => Err(ValidationError::new(field, "must be greater than zero")),
        _ => Ok(()),
    }
}

fn validate_range(
    field: &'static str,
    value: Option<u32>,
    min: u32,
    max: u32,
) -> Result<(), ValidationError> {
    match value {
        Some(v) if v < min || v > max => Err(ValidationError::new(
            field,
            format!("must be between {min} and {max}, got {v}"),
        )),
        _ => Ok(()),
    }
}
