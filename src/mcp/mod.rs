//! MCP (Model Context Protocol) tools for Firecrawl
//!
//! ## Tools
//!
//! | Tool | Behaviour |
//! |---|---|
//! | `firecrawl_scrape` | one page, answered directly |
//! | `firecrawl_map` | URL discovery, answered directly |
//! | `firecrawl_search` | web search, answered directly |
//! | `firecrawl_crawl` | returns a job id, polled in the background |
//! | `firecrawl_batch_scrape` | returns a job id, polled in the background |
//! | `firecrawl_check_crawl_status` | latest state of a crawl job |
//! | `firecrawl_check_batch_status` | latest state of a batch job |
//! | `firecrawl_extract` | waits for the extract job's result |
//! | `firecrawl_deep_research` | waits for the research job's result |
//! | `firecrawl_generate_llmstxt` | waits for the llms.txt job's result |
//!
//! ## Error Handling
//!
//! Dispatch failures never surface as protocol errors. They come back as
//! tool results flagged `isError`, rendered by [`ErrorContext`]:
//!
//! ```text
//! Operation failed: firecrawl_scrape
//!
//! Details:
//!   - failure: RateLimited
//!   - Rate limited after 3 attempt(s): ...
//!
//! Suggestions:
//!   - Wait a minute before retrying
//! ```

pub mod server;
pub mod validation;

pub use server::{FirecrawlServer, render_result};
pub use validation::{ErrorContext, render_failure};
