//! Parameter payloads for every operation
//!
//! The same structs describe the MCP tool arguments (via `schemars`) and the
//! upstream request bodies (via `serde`), so field names follow the upstream
//! camelCase wire names.

use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// Output formats a scrape can produce
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, JsonSchema)]
pub enum ScrapeFormat {
    #[serde(rename = "markdown")]
    Markdown,
    #[serde(rename = "html")]
    Html,
    #[serde(rename = "rawHtml")]
    RawHtml,
    #[serde(rename = "screenshot")]
    Screenshot,
    #[serde(rename = "screenshot@fullPage")]
    ScreenshotFullPage,
    #[serde(rename = "links")]
    Links,
    #[serde(rename = "json")]
    Json,
}

/// Geographic hints for the upstream browser
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LocationOptions {
    /// ISO 3166-1 alpha-2 country code
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Preferred languages, e.g. `["en-US"]`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub languages: Option<Vec<String>>,
}

/// Structured extraction attached to a scrape (`json` format)
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct JsonOptions {
    /// JSON schema the extracted object must follow
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    /// Instruction for the extraction model
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
}

/// Page-level scrape options shared by scrape, crawl, batch scrape and search
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeOptions {
    /// Content formats to return (default: markdown)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub formats: Option<Vec<ScrapeFormat>>,
    /// Strip navigation, headers and footers
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub only_main_content: Option<bool>,
    /// HTML tags to keep
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_tags: Option<Vec<String>>,
    /// HTML tags to drop
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_tags: Option<Vec<String>>,
    /// Milliseconds to wait for dynamic content
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub wait_for: Option<u64>,
    /// Upstream page timeout in milliseconds
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub timeout: Option<u64>,
    /// Emulate a mobile device
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mobile: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub skip_tls_verification: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub remove_base64_images: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<LocationOptions>,
    /// Options for the `json` format
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub json_options: Option<JsonOptions>,
}

/// Webhook the upstream calls while an async job progresses
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct WebhookSpec {
    pub url: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub headers: Option<HashMap<String, String>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub metadata: Option<serde_json::Value>,
    /// Subset of `started`, `page`, `completed`, `failed`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub events: Option<Vec<String>>,
}

/// Arguments for `firecrawl_scrape`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ScrapeParams {
    /// The URL to scrape
    pub url: String,
    #[serde(flatten)]
    pub options: ScrapeOptions,
}

/// Arguments for `firecrawl_map`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct MapParams {
    /// Starting URL for URL discovery
    pub url: String,
    /// Only return URLs matching this search term
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub search: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_sitemap: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub sitemap_only: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_subdomains: Option<bool>,
    /// Maximum number of URLs to return
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
}

/// Arguments for `firecrawl_crawl`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct CrawlParams {
    /// Starting URL for the crawl
    pub url: String,
    /// URL path patterns to skip
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exclude_paths: Option<Vec<String>>,
    /// URL path patterns to restrict the crawl to
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_paths: Option<Vec<String>>,
    /// Maximum link depth from the starting URL
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_sitemap: Option<bool>,
    /// Maximum number of pages to crawl
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_backward_links: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_external_links: Option<bool>,
    #[serde(
        default,
        rename = "deduplicateSimilarURLs",
        skip_serializing_if = "Option::is_none"
    )]
    pub deduplicate_similar_urls: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub ignore_query_parameters: Option<bool>,
    /// Webhook override; the configured webhook is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookSpec>,
    /// Options applied to every crawled page
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_options: Option<ScrapeOptions>,
}

/// Arguments for `firecrawl_batch_scrape`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct BatchScrapeParams {
    /// URLs to scrape as one batch
    pub urls: Vec<String>,
    /// Skip malformed URLs instead of rejecting the whole batch
    #[serde(
        default,
        rename = "ignoreInvalidURLs",
        skip_serializing_if = "Option::is_none"
    )]
    pub ignore_invalid_urls: Option<bool>,
    /// Webhook override; the configured webhook is used when absent
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub webhook: Option<WebhookSpec>,
    #[serde(flatten)]
    pub options: ScrapeOptions,
}

/// Arguments for the status-check tools
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
pub struct StatusParams {
    /// Job identifier returned when the job was started
    pub id: String,
}

/// Arguments for `firecrawl_search`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct SearchParams {
    /// Search query
    pub query: String,
    /// Maximum number of results (default 5)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub limit: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub lang: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub country: Option<String>,
    /// Time-based search filter, e.g. `qdr:w`
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tbs: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub filter: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<String>,
    /// Scrape each result with these options
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scrape_options: Option<ScrapeOptions>,
}

/// Arguments for `firecrawl_extract`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct ExtractParams {
    /// URLs to extract from (wildcards such as `example.com/*` allowed)
    pub urls: Vec<String>,
    /// What to extract
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub prompt: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub system_prompt: Option<String>,
    /// JSON schema for the extracted data
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub schema: Option<serde_json::Value>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub allow_external_links: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub enable_web_search: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub include_subdomains: Option<bool>,
}

/// Arguments for `firecrawl_deep_research`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct DeepResearchParams {
    /// Research question
    pub query: String,
    /// Maximum research depth (1-10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_depth: Option<u32>,
    /// Time limit in seconds (30-300)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub time_limit: Option<u32>,
    /// Maximum URLs to analyze (1-1000)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_urls: Option<u32>,
}

/// Arguments for `firecrawl_generate_llmstxt`
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "camelCase")]
pub struct LlmsTextParams {
    /// Site to generate llms.txt for
    pub url: String,
    /// Maximum URLs to include (default 10)
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_urls: Option<u32>,
    /// Also produce llms-full.txt
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub show_full_text: Option<bool>,
}
