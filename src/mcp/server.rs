//! Firecrawl tools served over MCP
//!
//! Each tool turns its arguments into an `OperationRequest` and hands it to
//! the shared `Dispatcher`. Results come back as pretty JSON text headed by
//! a one-line summary; failures come back as error results naming the
//! failure kind.

use std::sync::Arc;

use rmcp::{
    ErrorData as McpError,
    handler::server::router::tool::ToolRouter,
    handler::server::wrapper::Parameters,
    model::{CallToolResult, Content, ServerCapabilities, ServerInfo},
    tool, tool_handler, tool_router,
};

use super::validation::render_failure;
use crate::dispatch_engine::{Dispatcher, DispatchResult};
use crate::operation::{
    BatchScrapeParams, CrawlParams, DeepResearchParams, ExtractParams, LlmsTextParams, MapParams,
    OperationKind, OperationOutput, OperationRequest, ScrapeParams, SearchParams, StatusParams,
};

const INSTRUCTIONS: &str = "Web scraping, crawling, search and extraction backed by Firecrawl. \
Scrape, map and search answer directly. Crawl and batch scrape return a job id at once; \
use the matching status tool to follow them. Extract, deep research and llms.txt \
generation wait for their job and return its result.";

#[derive(Clone)]
pub struct FirecrawlServer {
    dispatcher: Arc<Dispatcher>,
    tool_router: ToolRouter<Self>,
}

#[tool_router]
impl FirecrawlServer {
    pub fn new(dispatcher: Arc<Dispatcher>) -> Self {
        Self {
            dispatcher,
            tool_router: Self::tool_router(),
        }
    }

    #[tool(
        description = "Scrape a single page and return its content in the requested formats (markdown by default)."
    )]
    async fn firecrawl_scrape(
        &self,
        Parameters(params): Parameters<ScrapeParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::Scrape(params)).await
    }

    #[tool(description = "Discover the URLs of a site, optionally filtered by a search term.")]
    async fn firecrawl_map(
        &self,
        Parameters(params): Parameters<MapParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::Map(params)).await
    }

    #[tool(
        description = "Start an asynchronous crawl of a site. Returns a job id; follow it with firecrawl_check_crawl_status."
    )]
    async fn firecrawl_crawl(
        &self,
        Parameters(params): Parameters<CrawlParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::Crawl(params)).await
    }

    #[tool(
        description = "Scrape many URLs as one asynchronous job. Returns a job id; follow it with firecrawl_check_batch_status."
    )]
    async fn firecrawl_batch_scrape(
        &self,
        Parameters(params): Parameters<BatchScrapeParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::BatchScrape(params)).await
    }

    #[tool(
        description = "Report progress and collected documents of a batch scrape job, including per-URL failures."
    )]
    async fn firecrawl_check_batch_status(
        &self,
        Parameters(params): Parameters<StatusParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::CheckBatchStatus(params)).await
    }

    #[tool(description = "Report progress and collected pages of a crawl job.")]
    async fn firecrawl_check_crawl_status(
        &self,
        Parameters(params): Parameters<StatusParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::CheckCrawlStatus(params)).await
    }

    #[tool(
        description = "Search the web, optionally scraping each result page with scrapeOptions."
    )]
    async fn firecrawl_search(
        &self,
        Parameters(params): Parameters<SearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::Search(params)).await
    }

    #[tool(
        description = "Extract structured data from one or more pages using a prompt and/or a JSON schema. Waits for the result."
    )]
    async fn firecrawl_extract(
        &self,
        Parameters(params): Parameters<ExtractParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::Extract(params)).await
    }

    #[tool(
        description = "Research a question across the web and return a final analysis with its sources. Waits for the result."
    )]
    async fn firecrawl_deep_research(
        &self,
        Parameters(params): Parameters<DeepResearchParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::DeepResearch(params)).await
    }

    #[tool(
        description = "Generate an llms.txt (and optionally llms-full.txt) for a site. Waits for the result."
    )]
    async fn firecrawl_generate_llmstxt(
        &self,
        Parameters(params): Parameters<LlmsTextParams>,
    ) -> Result<CallToolResult, McpError> {
        self.run(OperationRequest::GenerateLlmsText(params)).await
    }
}

impl FirecrawlServer {
    pub fn dispatcher(&self) -> &Arc<Dispatcher> {
        &self.dispatcher
    }

    /// Dispatch one request and render the outcome.
    ///
    /// rmcp drops the handler future when the client cancels, which raises
    /// the operation's cancel flag.
    async fn run(&self, request: OperationRequest) -> Result<CallToolResult, McpError> {
        let kind = request.kind();
        let result = self.dispatcher.dispatch(request).await;
        render_result(kind, result)
    }
}

/// Turn a dispatch outcome into a tool result
pub fn render_result(
    kind: OperationKind,
    result: DispatchResult<OperationOutput>,
) -> Result<CallToolResult, McpError> {
    match result {
        Ok(output) => {
            let body = serde_json::to_string_pretty(&output).map_err(|e| {
                McpError::internal_error(format!("failed to serialize result: {e}"), None)
            })?;
            Ok(CallToolResult::success(vec![Content::text(format!(
                "{}\n\n{body}",
                output.summary()
            ))]))
        }
        Err(err) => Ok(CallToolResult::error(vec![Content::text(render_failure(
            kind.tool_name(),
            &err,
        ))])),
    }
}

#[tool_handler]
impl rmcp::ServerHandler for FirecrawlServer {
    fn get_info(&self) -> ServerInfo {
        ServerInfo {
            instructions: Some(INSTRUCTIONS.to_string()),
            capabilities: ServerCapabilities::builder().enable_tools().build(),
            ..Default::default()
        }
    }
}
