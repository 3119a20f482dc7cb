//! Request dispatcher
//!
//! Drives one operation from request to result:
//!
//! ```text
//! Queued -> Admitted -> InFlight -> Succeeded
//!                          |    -> Failed (permanent, attempts or deadline exhausted)
//!                          `--> RetryScheduled -> Queued
//! Succeeded (async kinds) -> Submitted -> Polling -> Completed | PollFailed | PollTimedOut
//! ```
//!
//! Validation and the credit budget are checked before the first admission,
//! so refused operations never reach the upstream. The estimated cost stays
//! reserved in the ledger until the upstream has answered. Every upstream call,
//! status polls included, goes through the shared rate limiter. Each
//! dispatched operation runs in its own task with a cancellation flag that
//! is raised when the caller goes away.

use std::fmt;
use std::sync::Arc;
use tokio::time::{Duration, Instant};
use tracing::{debug, info, warn};
use uuid::Uuid;

use super::backoff::{BackoffPolicy, ErrorClass};
use super::cancel::{CancelFlag, CancelOnDrop};
use super::credit_ledger::{CreditLedger, CreditReservation};
use super::errors::{DispatchError, DispatchResult};
use super::job_tracker::{JobRecord, JobTracker};
use super::rate_limiter::{Admission, RateLimiter};
use crate::config::DispatchConfig;
use crate::operation::{
    JobKind, JobOutput, JobStatus, OperationKind, OperationOutput, OperationRequest,
    ValidationError,
};
use crate::transport::{
    ReplyPayload, Transport, TransportClient, TransportError, UpstreamCall, UpstreamReply,
    WebhookEvent,
};

/// Lifecycle states of a dispatched operation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DispatchState {
    Queued,
    Admitted,
    InFlight,
    RetryScheduled,
    Succeeded,
    Failed,
    Submitted,
    Polling,
    Completed,
    PollTimedOut,
    PollFailed,
    Cancelled,
}

impl fmt::Display for DispatchState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        fmt::Debug::fmt(self, f)
    }
}

/// Retry bookkeeping for one logical upstream call
#[derive(Debug, Clone, Default)]
pub struct RetryState {
    pub attempts: u32,
    pub last_class: Option<ErrorClass>,
    pub next_attempt_at: Option<Instant>,
}

/// Identity of one dispatched operation, carried through its log events
#[derive(Debug, Clone, Copy)]
pub(crate) struct OpContext {
    id: Uuid,
    kind: OperationKind,
}

impl OpContext {
    pub(crate) fn new(kind: OperationKind) -> Self {
        Self {
            id: Uuid::new_v4(),
            kind,
        }
    }

    pub(crate) fn id(&self) -> Uuid {
        self.id
    }

    pub(crate) fn enter(&self, state: DispatchState) {
        debug!(op = %self.id, kind = %self.kind, state = %state, "state transition");
    }
}

pub struct Dispatcher {
    pub(super) limiter: Arc<RateLimiter>,
    pub(super) backoff: BackoffPolicy,
    pub(super) ledger: Arc<CreditLedger>,
    pub(super) jobs: Arc<JobTracker>,
    pub(super) client: TransportClient,
    pub(super) operation_deadline: Duration,
    pub(super) poll_interval: Duration,
    pub(super) poll_deadline: Duration,
}

impl Dispatcher {
    pub fn new(config: &DispatchConfig, transport: Arc<dyn Transport>) -> Self {
        Self::from_parts(
            config,
            transport,
            Arc::new(RateLimiter::from_config(config)),
            Arc::new(CreditLedger::from_config(config)),
            Arc::new(JobTracker::new(config.job_retention())),
        )
    }

    /// Build around existing shared components
    pub fn from_parts(
        config: &DispatchConfig,
        transport: Arc<dyn Transport>,
        limiter: Arc<RateLimiter>,
        ledger: Arc<CreditLedger>,
        jobs: Arc<JobTracker>,
    ) -> Self {
        Self {
            client: TransportClient::new(transport, Arc::clone(&ledger)),
            limiter,
            backoff: BackoffPolicy::from_config(config),
            ledger,
            jobs,
            operation_deadline: config.operation_deadline(),
            poll_interval: config.poll_interval(),
            poll_deadline: config.poll_deadline(),
        }
    }

    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    pub fn ledger(&self) -> &Arc<CreditLedger> {
        &self.ledger
    }

    pub fn jobs(&self) -> &Arc<JobTracker> {
        &self.jobs
    }

    pub fn backoff(&self) -> &BackoffPolicy {
        &self.backoff
    }

    /// Run one operation to completion
    pub async fn dispatch(
        self: &Arc<Self>,
        request: OperationRequest,
    ) -> DispatchResult<OperationOutput> {
        self.dispatch_with_cancel(request, Arc::new(CancelFlag::new()))
            .await
    }

    /// Run one operation, stopping early once `cancel` is raised.
    ///
    /// Dropping the returned future raises `cancel` as well. An upstream
    /// call already in flight is allowed to finish and its usage is still
    /// recorded; nothing further is scheduled.
    pub async fn dispatch_with_cancel(
        self: &Arc<Self>,
        request: OperationRequest,
        cancel: Arc<CancelFlag>,
    ) -> DispatchResult<OperationOutput> {
        let guard = CancelOnDrop::new(Arc::clone(&cancel));
        let this = Arc::clone(self);
        let handle = tokio::spawn(async move { this.run(request, &cancel).await });
        let result = handle.await.unwrap_or_else(|e| {
            Err(DispatchError::internal(format!("dispatch task failed: {e}")))
        });
        guard.disarm();
        result
    }

    async fn run(
        self: &Arc<Self>,
        request: OperationRequest,
        cancel: &CancelFlag,
    ) -> DispatchResult<OperationOutput> {
        let op = OpContext::new(request.kind());
        op.enter(DispatchState::Queued);
        info!(op = %op.id, kind = %op.kind, target = %request.target(), "dispatching operation");

        let result = self.drive(&op, request, cancel).await;
        match &result {
            Ok(output) => info!(op = %op.id, kind = %op.kind, "{}", output.summary()),
            Err(DispatchError::Cancelled) => op.enter(DispatchState::Cancelled),
            Err(err) => warn!(
                op = %op.id,
                kind = %op.kind,
                failure = %err.kind(),
                error = %err,
                "operation failed"
            ),
        }
        result
    }

    async fn drive(
        self: &Arc<Self>,
        op: &OpContext,
        request: OperationRequest,
        cancel: &CancelFlag,
    ) -> DispatchResult<OperationOutput> {
        request.validate()?;
        let reservation = if request.kind().is_status_check() {
            None
        } else {
            Some(self.preflight(&request)?)
        };

        match request {
            OperationRequest::CheckCrawlStatus(params) => {
                self.check_status(op, JobKind::Crawl, &params.id, cancel)
                    .await
            }
            OperationRequest::CheckBatchStatus(params) => {
                self.check_status(op, JobKind::BatchScrape, &params.id, cancel)
                    .await
            }
            request => {
                let job_kind = request.job_kind();
                let call = UpstreamCall::Operation(request);
                let deadline = Instant::now() + self.operation_deadline;
                let reply = self.execute_call(op, &call, deadline, cancel).await;
                // Reported usage is in the ledger by now
                drop(reservation);
                self.settle(op, job_kind, reply?, cancel).await
            }
        }
    }

    /// Reserve the estimated cost, or refuse work the budget cannot cover
    fn preflight(&self, request: &OperationRequest) -> DispatchResult<CreditReservation> {
        let requested = request.estimated_credits();
        if let Some(reservation) = self.ledger.reserve(requested) {
            return Ok(reservation);
        }
        let snapshot = self.ledger.snapshot();
        Err(DispatchError::BudgetExceeded {
            counted: snapshot.counted.saturating_add(snapshot.reserved),
            budget: snapshot.budget.unwrap_or(0),
            requested,
        })
    }

    /// Send one logical call, retrying transient failures with backoff
    pub(crate) async fn execute_call(
        &self,
        op: &OpContext,
        call: &UpstreamCall,
        deadline: Instant,
        cancel: &CancelFlag,
    ) -> DispatchResult<UpstreamReply> {
        let weight = self.limiter.weight_for(call.operation_kind());
        let mut retry = RetryState::default();

        loop {
            if cancel.is_cancelled() {
                return Err(DispatchError::Cancelled);
            }
            self.admit(op, weight, deadline, cancel, retry.attempts)
                .await?;
            op.enter(DispatchState::Admitted);

            retry.attempts += 1;
            debug!(
                op = %op.id,
                attempt = retry.attempts,
                call = %call,
                state = %DispatchState::InFlight,
                "sending"
            );
            let err = match self.client.call(call).await {
                Ok(reply) => {
                    op.enter(DispatchState::Succeeded);
                    return Ok(reply);
                }
                Err(err) => err,
            };

            let Some(class) = err.error_class() else {
                op.enter(DispatchState::Failed);
                return Err(DispatchError::from_transport(err, retry.attempts));
            };
            if self.backoff.is_exhausted(retry.attempts) {
                op.enter(DispatchState::Failed);
                return Err(DispatchError::from_transport(err, retry.attempts));
            }

            let delay = self
                .backoff
                .next_delay(retry.attempts - 1, class, err.retry_after());
            let resume = Instant::now() + delay;
            if resume > deadline {
                op.enter(DispatchState::Failed);
                return Err(deadline_reached(class, retry.attempts, &err));
            }
            retry.last_class = Some(class);
            retry.next_attempt_at = Some(resume);
            warn!(
                op = %op.id,
                attempt = retry.attempts,
                class = %class,
                delay_ms = delay.as_millis() as u64,
                error = %err,
                state = %DispatchState::RetryScheduled,
                "retrying upstream call"
            );
            if !cancel.sleep_until(resume).await {
                return Err(DispatchError::Cancelled);
            }
            op.enter(DispatchState::Queued);
        }
    }

    async fn admit(
        &self,
        op: &OpContext,
        weight: u32,
        deadline: Instant,
        cancel: &CancelFlag,
        attempts: u32,
    ) -> DispatchResult<()> {
        match self.limiter.admit(weight) {
            Admission::Admitted => Ok(()),
            Admission::MustWaitUntil(slot) => {
                if slot > deadline {
                    self.limiter.release(slot, weight);
                    return Err(DispatchError::RateLimited {
                        attempts,
                        detail: "no rate slot opens before the operation deadline".to_string(),
                    });
                }
                debug!(
                    op = %op.id,
                    wait_ms = slot.saturating_duration_since(Instant::now()).as_millis() as u64,
                    "waiting for rate slot"
                );
                if !cancel.sleep_until(slot).await {
                    self.limiter.release(slot, weight);
                    return Err(DispatchError::Cancelled);
                }
                Ok(())
            }
        }
    }

    async fn settle(
        self: &Arc<Self>,
        op: &OpContext,
        job_kind: Option<JobKind>,
        reply: UpstreamReply,
        cancel: &CancelFlag,
    ) -> DispatchResult<OperationOutput> {
        match reply.payload {
            ReplyPayload::Scraped(doc) => Ok(OperationOutput::Scrape(doc)),
            ReplyPayload::Mapped(links) => Ok(OperationOutput::Map { links }),
            ReplyPayload::Searched(hits) => Ok(OperationOutput::Search(hits)),
            ReplyPayload::Submitted(submission) => {
                let Some(kind) = job_kind else {
                    return Err(DispatchError::internal(
                        "upstream returned a job id for a synchronous operation",
                    ));
                };
                self.jobs.create(&submission.id, kind);
                // Already recorded on submission; later polls charge only beyond it
                if let Some(units) = reply.credits_used {
                    self.jobs.charge(&submission.id, units);
                }
                op.enter(DispatchState::Submitted);
                info!(op = %op.id, job = %submission.id, kind = %kind, "job submitted");

                if !kind.is_awaited() {
                    self.spawn_poller(kind, submission.id.clone());
                    return Ok(OperationOutput::JobStarted(submission));
                }

                let deadline = Instant::now() + self.poll_deadline;
                let record = self
                    .poll_until_terminal(op, kind, &submission.id, deadline, cancel)
                    .await?;
                let output = awaited_output(record);
                self.jobs.acknowledge(&submission.id);
                output
            }
            ReplyPayload::Status(_) => Err(DispatchError::internal(
                "upstream returned a job status for a new operation",
            )),
        }
    }

    async fn check_status(
        &self,
        op: &OpContext,
        kind: JobKind,
        id: &str,
        cancel: &CancelFlag,
    ) -> DispatchResult<OperationOutput> {
        if let Some(record) = self.jobs.get(id) {
            // A finished job, or one a poller keeps current, needs no upstream call
            if record.status.is_terminal() || record.polling {
                return Ok(OperationOutput::JobStatus(record));
            }
        }
        let deadline = Instant::now() + self.operation_deadline;
        match self.poll_step(op, kind, id, deadline, cancel).await {
            Ok(record) => Ok(OperationOutput::JobStatus(record)),
            Err(DispatchError::Permanent {
                status: Some(404), ..
            }) => Err(DispatchError::JobNotFound(id.to_string())),
            Err(err) => Err(err),
        }
    }

    /// Apply a webhook event pushed by the upstream
    pub fn accept_webhook(&self, event: &WebhookEvent) -> DispatchResult<JobRecord> {
        let Some(update) = event.to_update() else {
            return Err(ValidationError::new(
                "type",
                format!("unsupported webhook event '{}'", event.event_type),
            )
            .into());
        };
        let record = self.jobs.update(&event.id, update)?;
        debug!(
            job = %event.id,
            event = %event.event_type,
            status = %record.status,
            "webhook applied"
        );
        if record.status.is_terminal() {
            self.jobs.stop_poller(&event.id);
        }
        Ok(record)
    }
}

fn deadline_reached(class: ErrorClass, attempts: u32, err: &TransportError) -> DispatchError {
    let detail = format!("operation deadline reached before the next retry; last error: {err}");
    match class {
        ErrorClass::RateLimited => DispatchError::RateLimited { attempts, detail },
        _ => DispatchError::Transient { attempts, detail },
    }
}

/// Final answer of an extract, research or llms.txt job
fn awaited_output(record: JobRecord) -> DispatchResult<OperationOutput> {
    if record.status == JobStatus::Failed {
        return Err(DispatchError::PollFailed {
            detail: record.error.unwrap_or_else(|| "job failed".to_string()),
            job_id: record.id,
        });
    }
    match record.result {
        Some(JobOutput::Extracted(value)) => Ok(OperationOutput::Extract(value)),
        Some(JobOutput::Research(research)) => Ok(OperationOutput::DeepResearch(research)),
        Some(JobOutput::LlmsText(text)) => Ok(OperationOutput::LlmsText(text)),
        Some(JobOutput::Documents(_)) | None => Err(DispatchError::PollFailed {
            job_id: record.id,
            detail: "job completed without a result".to_string(),
        }),
    }
}
