//! Typed per-operation results

use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::dispatch_engine::JobRecord;

/// Page metadata reported alongside a scraped document
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DocumentMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub language: Option<String>,
    #[serde(
        default,
        rename = "sourceURL",
        skip_serializing_if = "Option::is_none"
    )]
    pub source_url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub status_code: Option<u16>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Everything else the upstream reports (og tags, scrape id, ...)
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

/// One scraped page
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Document {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub raw_html: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub screenshot: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json: Option<Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub warning: Option<String>,
    #[serde(default)]
    pub metadata: DocumentMetadata,
}

impl Document {
    /// URL the document was fetched from, if the upstream reported one
    pub fn source_url(&self) -> Option<&str> {
        self.metadata
            .source_url
            .as_deref()
            .or(self.metadata.url.as_deref())
    }

    /// Why this page failed, when the upstream reported a per-page error
    /// or an HTTP status of 400 and above.
    pub fn failure_reason(&self) -> Option<String> {
        if let Some(error) = &self.metadata.error {
            return Some(error.clone());
        }
        match self.metadata.status_code {
            Some(code) if code >= 400 => Some(format!("page returned HTTP {code}")),
            _ => None,
        }
    }

    /// Credits the upstream attributed to this scrape, if reported inline
    pub(crate) fn inline_credits(&self) -> Option<u64> {
        self.metadata.extra.get("creditsUsed").and_then(Value::as_u64)
    }
}

/// A page within a batch or crawl that did not scrape cleanly
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedItem {
    pub url: Option<String>,
    pub reason: String,
}

/// One search result
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SearchHit {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub markdown: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub links: Option<Vec<String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<DocumentMetadata>,
}

/// Acknowledgement of an accepted async job
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct JobSubmission {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// URLs the upstream refused at submission time
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub invalid_urls: Vec<String>,
}

/// Lifecycle of an async upstream job
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum JobStatus {
    Pending,
    Processing,
    Completed,
    Failed,
}

impl JobStatus {
    /// Map an upstream status string. Unknown strings count as in progress.
    pub fn from_upstream(status: &str) -> Self {
        match status.to_ascii_lowercase().as_str() {
            "pending" | "queued" => JobStatus::Pending,
            "completed" => JobStatus::Completed,
            "failed" | "cancelled" => JobStatus::Failed,
            _ => JobStatus::Processing,
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, JobStatus::Completed | JobStatus::Failed)
    }
}

impl std::fmt::Display for JobStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let label = match self {
            JobStatus::Pending => "pending",
            JobStatus::Processing => "processing",
            JobStatus::Completed => "completed",
            JobStatus::Failed => "failed",
        };
        f.write_str(label)
    }
}

/// Source consulted during deep research
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchSource {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResearchOutput {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub final_analysis: Option<String>,
    #[serde(default)]
    pub sources: Vec<ResearchSource>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub activities: Vec<Value>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LlmsTextOutput {
    #[serde(default)]
    pub llmstxt: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub llmsfulltxt: Option<String>,
}

/// Payload carried by a job status response
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum JobOutput {
    Documents(Vec<Document>),
    Extracted(Value),
    Research(ResearchOutput),
    LlmsText(LlmsTextOutput),
}

/// One observation of an async job, as reported by a status poll or webhook
#[derive(Debug, Clone, PartialEq)]
pub struct JobSnapshot {
    pub status: JobStatus,
    pub completed: Option<u64>,
    pub total: Option<u64>,
    /// Cumulative credits the upstream charged to this job so far
    pub credits_used: Option<u64>,
    pub output: Option<JobOutput>,
    pub error: Option<String>,
    pub expires_at: Option<String>,
}

/// Result of a successfully dispatched operation
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum OperationOutput {
    Scrape(Document),
    Map { links: Vec<String> },
    Search(Vec<SearchHit>),
    JobStarted(JobSubmission),
    JobStatus(JobRecord),
    Extract(Value),
    DeepResearch(ResearchOutput),
    LlmsText(LlmsTextOutput),
}

impl OperationOutput {
    /// One-line headline for tool output
    pub fn summary(&self) -> String {
        match self {
            OperationOutput::Scrape(doc) => match doc.source_url() {
                Some(url) => format!("Scraped {url}"),
                None => "Scraped 1 page".to_string(),
            },
            OperationOutput::Map { links } => format!("Discovered {} URL(s)", links.len()),
            OperationOutput::Search(hits) => format!("Found {} result(s)", hits.len()),
            OperationOutput::JobStarted(sub) => {
                let mut line = format!("Started job {}", sub.id);
                if !sub.invalid_urls.is_empty() {
                    line.push_str(&format!(
                        " ({} invalid URL(s) skipped)",
                        sub.invalid_urls.len()
                    ));
                }
                line
            }
            OperationOutput::JobStatus(record) => {
                let mut line = format!("Job {} is {}", record.id, record.status);
                if let (Some(done), Some(total)) = (record.completed, record.total) {
                    line.push_str(&format!(" ({done}/{total})"));
                }
                if record.status == JobStatus::Completed && !record.failed_items.is_empty() {
                    line.push_str(&format!(
                        "; partial failure: {} succeeded, {} failed",
                        record.documents.len(),
                        record.failed_items.len()
                    ));
                }
                if record.poll_timed_out {
                    line.push_str("; polling stopped at deadline");
                }
                line
            }
            OperationOutput::Extract(_) => "Extraction completed".to_string(),
            OperationOutput::DeepResearch(out) => {
                format!("Research completed with {} source(s)", out.sources.len())
            }
            OperationOutput::LlmsText(_) => "Generated llms.txt".to_string(),
        }
    }
}
