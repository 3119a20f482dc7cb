//! Error context builder for structured, actionable error messages
//!
//! Provides consistent error formatting across MCP tools with:
//! - Operation that failed
//! - Details about what was checked
//! - Actionable suggestions for resolution

use crate::dispatch_engine::{DispatchError, FailureKind};

/// Builder for structured error messages with context and suggestions
#[derive(Debug, Clone)]
pub struct ErrorContext {
    operation: String,
    details: Vec<String>,
    suggestions: Vec<String>,
}

impl ErrorContext {
    /// Create new error context for an operation
    ///
    /// # Example
    /// ```
    /// use kodegen_tools_firecrawl::mcp::ErrorContext;
    /// let ctx = ErrorContext::new("firecrawl_scrape");
    /// ```
    pub fn new(operation: impl Into<String>) -> Self {
        Self {
            operation: operation.into(),
            details: Vec::new(),
            suggestions: Vec::new(),
        }
    }

    /// Add detail about what was checked or why it failed
    pub fn detail(mut self, detail: impl Into<String>) -> Self {
        self.details.push(detail.into());
        self
    }

    /// Add actionable suggestion for resolution
    pub fn suggest(mut self, suggestion: impl Into<String>) -> Self {
        self.suggestions.push(suggestion.into());
        self
    }

    /// Build formatted error message
    ///
    /// Format:
    /// ```text
    /// Operation failed: {operation}
    ///
    /// Details:
    ///   - {detail1}
    ///
    /// Suggestions:
    ///   - {suggestion1}
    /// ```
    #[must_use]
    pub fn build(self) -> String {
        let mut msg = format!("Operation failed: {}\n", self.operation);

        if !self.details.is_empty() {
            msg.push_str("\nDetails:\n");
            for detail in &self.details {
                msg.push_str(&format!("  - {detail}\n"));
            }
        }

        if !self.suggestions.is_empty() {
            msg.push_str("\nSuggestions:\n");
            for suggestion in &self.suggestions {
                msg.push_str(&format!("  - {suggestion}\n"));
            }
        }

        msg
    }
}

/// Render a dispatch failure as the error text of a tool result
pub fn render_failure(tool: &str, err: &DispatchError) -> String {
    let ctx = ErrorContext::new(tool)
        .detail(format!("failure: {}", err.kind()))
        .detail(err.to_string());

    let ctx = match err.kind() {
        FailureKind::ValidationFailure => {
            ctx.suggest("Fix the named argument and call the tool again")
        }
        FailureKind::RateLimited => ctx
            .suggest("Wait a minute before retrying")
            .suggest("Lower FIRECRAWL_RATE_LIMIT_REQUESTS if this keeps happening"),
        FailureKind::TransientFailure => ctx
            .suggest("The upstream service is unavailable or slow; retry later")
            .suggest("Raise FIRECRAWL_RETRY_MAX_ATTEMPTS to retry more often"),
        FailureKind::BudgetExceeded => ctx
            .suggest("Wait for the credit window to roll over")
            .suggest("Raise FIRECRAWL_CREDIT_BUDGET or unset it to remove the cap"),
        FailureKind::PermanentFailure => match err {
            DispatchError::Permanent {
                status: Some(401 | 403),
                ..
            } => ctx.suggest("Check that FIRECRAWL_API_KEY is valid"),
            DispatchError::Permanent {
                status: Some(402), ..
            } => ctx.suggest("The account is out of credits; top up or upgrade the plan"),
            _ => ctx.suggest("Check the request arguments; retrying unchanged will not help"),
        },
        FailureKind::PollTimedOut => ctx
            .suggest("The job is still running upstream")
            .suggest("Call the matching status tool with the job id to keep checking"),
        FailureKind::PollFailed => {
            ctx.suggest("Inspect the job error; resubmit once the cause is fixed")
        }
        FailureKind::Cancelled => ctx.suggest("The request was cancelled by the client"),
        FailureKind::NotFound => ctx
            .suggest("Verify the job id is correct")
            .suggest("Finished jobs expire after their retention period"),
    };
    ctx.build()
}
