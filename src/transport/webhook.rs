//! Decoding of webhook events pushed by the upstream

use serde::Deserialize;
use serde_json::Value;

use crate::dispatch_engine::JobUpdate;
use crate::operation::{Document, JobKind, JobOutput, JobStatus};

/// One webhook delivery, e.g. `crawl.page` or `batch_scrape.completed`
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct WebhookEvent {
    #[serde(default = "default_success")]
    pub success: bool,
    #[serde(rename = "type")]
    pub event_type: String,
    pub id: String,
    #[serde(default)]
    pub data: Vec<Document>,
    #[serde(default)]
    pub error: Option<String>,
    #[serde(default)]
    pub metadata: Option<Value>,
}

fn default_success() -> bool {
    true
}

impl WebhookEvent {
    pub fn from_slice(body: &[u8]) -> Result<Self, serde_json::Error> {
        serde_json::from_slice(body)
    }

    /// Kind of job the event belongs to, if recognised
    pub fn job_kind(&self) -> Option<JobKind> {
        match self.event_type.split_once('.')?.0 {
            "crawl" => Some(JobKind::Crawl),
            "batch_scrape" => Some(JobKind::BatchScrape),
            _ => None,
        }
    }

    /// Translate into a job update, or `None` for unrecognised event types
    pub fn to_update(&self) -> Option<JobUpdate> {
        let (_, phase) = self.event_type.split_once('.')?;
        let status = match phase {
            "started" | "page" => JobStatus::Processing,
            "completed" => JobStatus::Completed,
            "failed" => JobStatus::Failed,
            _ => return None,
        };
        let mut update = JobUpdate::status(status);
        if !self.data.is_empty() {
            update.output = Some(JobOutput::Documents(self.data.clone()));
        }
        if status == JobStatus::Failed || !self.success {
            update.error = self
                .error
                .clone()
                .or_else(|| Some(format!("{} reported failure", self.event_type)));
        }
        Some(update)
    }
}
