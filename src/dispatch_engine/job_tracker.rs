//! Registry of async upstream jobs
//!
//! Mirrors the latest known state of every crawl, batch scrape, extraction,
//! research and llms.txt job so status queries can be answered without
//! another upstream round-trip. Updates arrive from pollers and webhooks in
//! any order; a terminal status is sticky once recorded.

use chrono::{DateTime, Utc};
use dashmap::DashMap;
use serde::Serialize;
use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use super::cancel::CancelFlag;
use crate::operation::{Document, FailedItem, JobKind, JobOutput, JobSnapshot, JobStatus};
use crate::utils::JOB_CLEANUP_INTERVAL_SECS;

/// Everything known about one async job
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct JobRecord {
    pub id: String,
    pub kind: JobKind,
    pub status: JobStatus,
    pub submitted_at: DateTime<Utc>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub last_polled: Option<DateTime<Utc>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub completed: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub total: Option<u64>,
    /// Cumulative credits the upstream charged to this job
    pub credits_used: u64,
    /// Pages scraped successfully (crawl and batch jobs)
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub documents: Vec<Document>,
    /// Pages that came back with an error
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub failed_items: Vec<FailedItem>,
    /// Final payload of extract, research and llms.txt jobs
    #[serde(skip_serializing_if = "Option::is_none")]
    pub result: Option<JobOutput>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub expires_at: Option<String>,
    /// A poller is currently mirroring this job
    pub polling: bool,
    /// Polling stopped at its deadline before the job finished
    pub poll_timed_out: bool,
    #[serde(skip)]
    finished_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    seen_urls: HashSet<String>,
}

impl JobRecord {
    fn new(id: String, kind: JobKind) -> Self {
        Self {
            id,
            kind,
            status: JobStatus::Pending,
            submitted_at: Utc::now(),
            last_polled: None,
            completed: None,
            total: None,
            credits_used: 0,
            documents: Vec::new(),
            failed_items: Vec::new(),
            result: None,
            error: None,
            expires_at: None,
            polling: false,
            poll_timed_out: false,
            finished_at: None,
            seen_urls: HashSet::new(),
        }
    }

    /// Fold document fragments in, skipping pages already recorded
    fn absorb_documents(&mut self, docs: Vec<Document>) {
        for doc in docs {
            if let Some(url) = doc.source_url() {
                if !self.seen_urls.insert(url.to_string()) {
                    continue;
                }
            }
            match doc.failure_reason() {
                Some(reason) => self.failed_items.push(FailedItem {
                    url: doc.source_url().map(str::to_string),
                    reason,
                }),
                None => self.documents.push(doc),
            }
        }
    }

    /// Finished jobs age from completion. Unfinished jobs nobody is polling
    /// (timed out, cancelled, failed to poll, or looked up once) age from
    /// their last observation.
    fn is_expired(&self, now: DateTime<Utc>, retention: Duration) -> bool {
        let reference = match self.finished_at {
            Some(finished) => finished,
            None if self.polling => return false,
            None => self.last_polled.unwrap_or(self.submitted_at),
        };
        now.signed_duration_since(reference)
            .to_std()
            .unwrap_or(Duration::ZERO)
            >= retention
    }
}

/// A partial observation of a job
#[derive(Debug, Clone, PartialEq)]
pub struct JobUpdate {
    pub status: JobStatus,
    pub completed: Option<u64>,
    pub total: Option<u64>,
    pub output: Option<JobOutput>,
    pub error: Option<String>,
    pub expires_at: Option<String>,
}

impl JobUpdate {
    pub fn status(status: JobStatus) -> Self {
        Self {
            status,
            completed: None,
            total: None,
            output: None,
            error: None,
            expires_at: None,
        }
    }
}

impl From<JobSnapshot> for JobUpdate {
    fn from(snapshot: JobSnapshot) -> Self {
        Self {
            status: snapshot.status,
            completed: snapshot.completed,
            total: snapshot.total,
            output: snapshot.output,
            error: snapshot.error,
            expires_at: snapshot.expires_at,
        }
    }
}

/// Lookup for an id the tracker has never seen or already evicted
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
#[error("job {0} not found")]
pub struct JobNotFound(pub String);

/// Concurrent job registry
#[derive(Debug)]
pub struct JobTracker {
    jobs: DashMap<String, JobRecord>,
    pollers: DashMap<String, Arc<CancelFlag>>,
    retention: Duration,
}

impl JobTracker {
    pub fn new(retention: Duration) -> Self {
        Self {
            jobs: DashMap::new(),
            pollers: DashMap::new(),
            retention,
        }
    }

    /// Register a freshly submitted job. An existing record is kept as is.
    pub fn create(&self, id: &str, kind: JobKind) -> JobRecord {
        self.jobs
            .entry(id.to_string())
            .or_insert_with(|| {
                log::debug!("Tracking {kind} job {id}");
                JobRecord::new(id.to_string(), kind)
            })
            .clone()
    }

    /// Apply an observation. Updates to a terminal job are ignored.
    pub fn update(&self, id: &str, update: JobUpdate) -> Result<JobRecord, JobNotFound> {
        let mut record = self
            .jobs
            .get_mut(id)
            .ok_or_else(|| JobNotFound(id.to_string()))?;

        if record.status.is_terminal() {
            log::debug!(
                "Ignoring {} update for job {id}, already {}",
                update.status,
                record.status
            );
            return Ok(record.clone());
        }

        record.status = update.status;
        if update.completed.is_some() {
            record.completed = update.completed;
        }
        if update.total.is_some() {
            record.total = update.total;
        }
        if update.expires_at.is_some() {
            record.expires_at = update.expires_at;
        }
        if update.error.is_some() {
            record.error = update.error;
        }
        match update.output {
            Some(JobOutput::Documents(docs)) => record.absorb_documents(docs),
            Some(other) => record.result = Some(other),
            None => {}
        }
        if record.status.is_terminal() {
            record.finished_at = Some(Utc::now());
            record.polling = false;
            log::info!("Job {id} finished as {}", record.status);
        }
        Ok(record.clone())
    }

    pub fn get(&self, id: &str) -> Option<JobRecord> {
        self.jobs.get(id).map(|r| r.clone())
    }

    pub fn contains(&self, id: &str) -> bool {
        self.jobs.contains_key(id)
    }

    pub fn len(&self) -> usize {
        self.jobs.len()
    }

    pub fn is_empty(&self) -> bool {
        self.jobs.is_empty()
    }

    pub(crate) fn mark_polled(&self, id: &str) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.last_polled = Some(Utc::now());
        }
    }

    pub(crate) fn set_polling(&self, id: &str, polling: bool) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.polling = polling && !record.status.is_terminal();
        }
        if !polling {
            self.pollers.remove(id);
        }
    }

    pub(crate) fn mark_poll_timed_out(&self, id: &str) {
        if let Some(mut record) = self.jobs.get_mut(id) {
            record.poll_timed_out = true;
            record.polling = false;
        }
    }

    /// Record a cumulative usage figure and return the part not yet charged
    pub(crate) fn charge(&self, id: &str, cumulative: u64) -> u64 {
        match self.jobs.get_mut(id) {
            Some(mut record) if cumulative > record.credits_used => {
                let delta = cumulative - record.credits_used;
                record.credits_used = cumulative;
                delta
            }
            _ => 0,
        }
    }

    pub(crate) fn attach_poller(&self, id: &str, flag: Arc<CancelFlag>) {
        self.pollers.insert(id.to_string(), flag);
    }

    /// Stop the background poller of `id`, if any
    pub(crate) fn stop_poller(&self, id: &str) {
        if let Some((_, flag)) = self.pollers.remove(id) {
            flag.cancel();
        }
    }

    /// Drop a job once its result has been consumed
    pub fn acknowledge(&self, id: &str) -> Option<JobRecord> {
        self.stop_poller(id);
        self.jobs.remove(id).map(|(_, record)| record)
    }

    /// Evict finished jobs older than the retention window
    pub fn cleanup_expired(&self) -> usize {
        self.cleanup_expired_at(Utc::now())
    }

    pub fn cleanup_expired_at(&self, now: DateTime<Utc>) -> usize {
        let initial_count = self.jobs.len();
        self.jobs.retain(|id, record| {
            let expired = record.is_expired(now, self.retention);
            if expired {
                log::debug!("Evicting {} job {id} ({})", record.kind, record.status);
            }
            !expired
        });
        let cleaned = initial_count.saturating_sub(self.jobs.len());
        if cleaned > 0 {
            log::debug!("Cleaned up {cleaned} job record(s)");
        }
        cleaned
    }

    /// Start background cleanup task (call once at initialization)
    ///
    /// Spawns a tokio task that evicts expired jobs every 60 seconds.
    pub fn start_cleanup_task(self: Arc<Self>) -> tokio::task::JoinHandle<()> {
        tokio::spawn(async move {
            let mut interval =
                tokio::time::interval(Duration::from_secs(JOB_CLEANUP_INTERVAL_SECS));
            loop {
                interval.tick().await;
                self.cleanup_expired();
            }
        })
    }
}
