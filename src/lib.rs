pub mod config;
pub mod dispatch_engine;
pub mod mcp;
pub mod operation;
pub mod transport;
pub mod utils;

pub use config::{DispatchConfig, DispatchConfigBuilder};
pub use dispatch_engine::{
    BackoffPolicy, CreditAlert, CreditLedger, DispatchError, DispatchResult, Dispatcher,
    FailureKind, JobRecord, JobTracker, RateLimiter,
};
pub use mcp::FirecrawlServer;
pub use operation::{OperationKind, OperationOutput, OperationRequest};
pub use transport::{HttpTransport, Transport, TransportError, WebhookEvent};
