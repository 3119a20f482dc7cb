//! Status polling for async jobs
//!
//! A poll step fetches one status snapshot through the same limiter and
//! retry machinery as any other call, charges newly reported usage, and
//! mirrors the result into the job tracker. The poll loop repeats steps on
//! a growing cadence until the job is terminal, the deadline passes, the
//! job is evicted, or the loop is cancelled.

use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};

use super::cancel::CancelFlag;
use super::dispatcher::{DispatchState, Dispatcher, OpContext};
use super::errors::{DispatchError, DispatchResult, FailureKind};
use super::job_tracker::{JobRecord, JobUpdate};
use crate::operation::{JobKind, JobStatus};
use crate::transport::{ReplyPayload, UpstreamCall};
use crate::utils::{POLL_INTERVAL_GROWTH, POLL_INTERVAL_MAX_MULTIPLIER};

/// Outcome of a single poll
#[derive(Debug, Clone, PartialEq)]
pub enum PollStep {
    /// Job still running; poll again later
    Continue(JobStatus),
    /// Job reached Completed or Failed
    Terminal(JobRecord),
}

/// Poll interval that grows ×1.5 per poll up to 4× the initial interval
#[derive(Debug, Clone)]
pub struct PollCadence {
    current: Duration,
    max: Duration,
}

impl PollCadence {
    pub fn new(initial: Duration) -> Self {
        Self {
            current: initial,
            max: initial * POLL_INTERVAL_MAX_MULTIPLIER,
        }
    }

    /// Wait before the next poll
    pub fn next_interval(&mut self) -> Duration {
        let wait = self.current;
        self.current = self.current.mul_f64(POLL_INTERVAL_GROWTH).min(self.max);
        wait
    }
}

impl Dispatcher {
    /// Poll the upstream once for job `id` and record what it reports
    pub async fn poll_once(&self, kind: JobKind, id: &str) -> DispatchResult<PollStep> {
        let op = OpContext::new(kind.poll_kind());
        let cancel = CancelFlag::new();
        let deadline = Instant::now() + self.operation_deadline;
        let record = self.poll_step(&op, kind, id, deadline, &cancel).await?;
        if record.status.is_terminal() {
            Ok(PollStep::Terminal(record))
        } else {
            Ok(PollStep::Continue(record.status))
        }
    }

    pub(crate) async fn poll_step(
        &self,
        op: &OpContext,
        kind: JobKind,
        id: &str,
        deadline: Instant,
        cancel: &CancelFlag,
    ) -> DispatchResult<JobRecord> {
        let call = UpstreamCall::JobStatus {
            kind,
            id: id.to_string(),
        };
        let reply = self.execute_call(op, &call, deadline, cancel).await?;
        let ReplyPayload::Status(snapshot) = reply.payload else {
            return Err(DispatchError::internal(
                "upstream answered a status poll with something else",
            ));
        };

        self.jobs.create(id, kind);
        // Status replies carry the job's cumulative usage
        let delta = self.jobs.charge(id, snapshot.credits_used.unwrap_or(0));
        if delta > 0 {
            self.ledger.record_usage(delta);
        }
        self.jobs.mark_polled(id);
        let record = self.jobs.update(id, JobUpdate::from(snapshot))?;
        debug!(
            op = %op.id(),
            job = %id,
            status = %record.status,
            completed = ?record.completed,
            total = ?record.total,
            "job polled"
        );
        Ok(record)
    }

    /// Poll until the job is terminal.
    ///
    /// Transient poll failures are tolerated until the deadline; a permanent
    /// failure to read the status ends polling with `PollFailed`.
    pub(crate) async fn poll_until_terminal(
        &self,
        op: &OpContext,
        kind: JobKind,
        id: &str,
        deadline: Instant,
        cancel: &CancelFlag,
    ) -> DispatchResult<JobRecord> {
        self.jobs.set_polling(id, true);
        op.enter(DispatchState::Polling);
        let mut cadence = PollCadence::new(self.poll_interval);

        let outcome = loop {
            let Some(current) = self.jobs.get(id) else {
                break Err(DispatchError::JobNotFound(id.to_string()));
            };
            if current.status.is_terminal() {
                break Ok(current);
            }
            let now = Instant::now();
            if now >= deadline {
                self.jobs.mark_poll_timed_out(id);
                break Err(DispatchError::PollTimedOut {
                    job_id: id.to_string(),
                    last_status: current.status,
                });
            }

            let wake = (now + cadence.next_interval()).min(deadline);
            let woke = cancel.sleep_until(wake).await;
            // A webhook may have finished or an acknowledge evicted the job
            match self.jobs.get(id) {
                None => break Err(DispatchError::JobNotFound(id.to_string())),
                Some(record) if record.status.is_terminal() => break Ok(record),
                Some(_) => {}
            }
            if !woke {
                break Err(DispatchError::Cancelled);
            }
            if Instant::now() >= deadline {
                continue;
            }

            match self.poll_step(op, kind, id, deadline, cancel).await {
                Ok(record) if record.status.is_terminal() => break Ok(record),
                Ok(_) => {}
                Err(DispatchError::Cancelled) => break Err(DispatchError::Cancelled),
                Err(DispatchError::JobNotFound(job)) => {
                    break Err(DispatchError::JobNotFound(job));
                }
                Err(err)
                    if matches!(
                        err.kind(),
                        FailureKind::TransientFailure | FailureKind::RateLimited
                    ) =>
                {
                    warn!(
                        op = %op.id(),
                        job = %id,
                        error = %err,
                        "status poll failed, polling continues"
                    );
                }
                Err(err) => {
                    break Err(DispatchError::PollFailed {
                        job_id: id.to_string(),
                        detail: err.to_string(),
                    });
                }
            }
        };

        self.jobs.set_polling(id, false);
        match &outcome {
            Ok(record) if record.status == JobStatus::Completed => {
                op.enter(DispatchState::Completed)
            }
            Ok(_) => op.enter(DispatchState::PollFailed),
            Err(DispatchError::PollTimedOut { .. }) => op.enter(DispatchState::PollTimedOut),
            Err(DispatchError::Cancelled) => op.enter(DispatchState::Cancelled),
            Err(_) => op.enter(DispatchState::PollFailed),
        }
        outcome
    }

    /// Mirror a crawl or batch job in the background until it finishes
    pub(crate) fn spawn_poller(self: &Arc<Self>, kind: JobKind, id: String) {
        let flag = Arc::new(CancelFlag::new());
        self.jobs.attach_poller(&id, Arc::clone(&flag));
        // Visible before the task first runs so status checks do not poll too
        self.jobs.set_polling(&id, true);

        let this = Arc::clone(self);
        tokio::spawn(async move {
            let op = OpContext::new(kind.poll_kind());
            let deadline = Instant::now() + this.poll_deadline;
            match this
                .poll_until_terminal(&op, kind, &id, deadline, &flag)
                .await
            {
                Ok(record) => info!(
                    job = %id,
                    status = %record.status,
                    documents = record.documents.len(),
                    failed = record.failed_items.len(),
                    "background polling finished"
                ),
                Err(err) => warn!(job = %id, error = %err, "background polling stopped"),
            }
        });
    }
}
