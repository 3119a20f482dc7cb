//! Request dispatch and resilience engine
//!
//! Sits between the tool surface and the upstream API: rate limiting,
//! retry with backoff, credit budgeting, async job tracking and polling.

pub mod backoff;
pub mod cancel;
pub mod credit_ledger;
pub mod dispatcher;
pub mod errors;
pub mod job_tracker;
pub mod polling;
pub mod rate_limiter;

pub use backoff::{BackoffPolicy, ErrorClass};
pub use cancel::{CancelFlag, CancelOnDrop};
pub use credit_ledger::{CreditAlert, CreditLedger, CreditReservation, LedgerSnapshot};
pub use dispatcher::{DispatchState, Dispatcher, RetryState};
pub use errors::{DispatchError, DispatchResult, FailureKind};
pub use job_tracker::{JobNotFound, JobRecord, JobTracker, JobUpdate};
pub use polling::{PollCadence, PollStep};
pub use rate_limiter::{Admission, RateLimiter};
