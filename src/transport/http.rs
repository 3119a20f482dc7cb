//! HTTP transport against the Firecrawl v1 API

use anyhow::{Context, Result};
use futures::future::BoxFuture;
use reqwest::header::{HeaderMap, RETRY_AFTER};
use serde_json::Value;
use std::time::Duration;
use url::Url;

use super::decode::decode_reply;
use super::{Transport, TransportError, UpstreamCall, UpstreamReply};
use crate::config::DispatchConfig;
use crate::operation::{OperationRequest, WebhookSpec};
use crate::utils::USER_AGENT;

/// `reqwest`-backed transport
#[derive(Debug, Clone)]
pub struct HttpTransport {
    client: reqwest::Client,
    base_url: Url,
    api_key: Option<String>,
    webhook: Option<WebhookSpec>,
}

impl HttpTransport {
    pub fn new(config: &DispatchConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(config.request_timeout())
            .user_agent(USER_AGENT)
            .build()
            .context("Failed to build HTTP client")?;
        Ok(Self {
            client,
            base_url: config.api_url().clone(),
            api_key: config.api_key().map(str::to_string),
            webhook: config.webhook().cloned(),
        })
    }

    /// Full URL of `call`, keeping any path prefix of the base URL.
    /// Each segment is percent-encoded, so an id cannot escape its path.
    fn url_for(&self, call: &UpstreamCall) -> Result<Url, TransportError> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|()| TransportError::Rejected {
                status: None,
                detail: format!("API URL '{}' cannot carry a path", self.base_url),
            })?
            .pop_if_empty()
            .extend(call.path_segments());
        Ok(url)
    }

    /// JSON body of `call`, or `None` for GET requests
    fn body_for(&self, call: &UpstreamCall) -> Result<Option<Value>, TransportError> {
        let UpstreamCall::Operation(request) = call else {
            return Ok(None);
        };
        let encoded = match request {
            OperationRequest::Scrape(p) => serde_json::to_value(p),
            OperationRequest::Map(p) => serde_json::to_value(p),
            OperationRequest::Crawl(p) => serde_json::to_value(p),
            OperationRequest::BatchScrape(p) => serde_json::to_value(p),
            OperationRequest::Search(p) => serde_json::to_value(p),
            OperationRequest::Extract(p) => serde_json::to_value(p),
            OperationRequest::DeepResearch(p) => serde_json::to_value(p),
            OperationRequest::GenerateLlmsText(p) => serde_json::to_value(p),
            OperationRequest::CheckCrawlStatus(_) | OperationRequest::CheckBatchStatus(_) => {
                return Ok(None);
            }
        };
        let mut body = encoded.map_err(|e| TransportError::Rejected {
            status: None,
            detail: format!("could not encode request: {e}"),
        })?;

        let takes_webhook = matches!(
            request,
            OperationRequest::Crawl(_) | OperationRequest::BatchScrape(_)
        );
        if let (true, Some(hook), Some(object)) =
            (takes_webhook, &self.webhook, body.as_object_mut())
        {
            if !object.contains_key("webhook") {
                let hook = serde_json::to_value(hook).map_err(|e| TransportError::Rejected {
                    status: None,
                    detail: format!("could not encode webhook: {e}"),
                })?;
                object.insert("webhook".to_string(), hook);
            }
        }
        Ok(Some(body))
    }
}

impl Transport for HttpTransport {
    fn execute<'a>(
        &'a self,
        call: &'a UpstreamCall,
    ) -> BoxFuture<'a, Result<UpstreamReply, TransportError>> {
        Box::pin(async move {
            let url = self.url_for(call)?;
            let mut request = match self.body_for(call)? {
                Some(body) => self.client.post(url).json(&body),
                None => self.client.get(url),
            };
            if let Some(key) = &self.api_key {
                request = request.bearer_auth(key);
            }

            let response = request.send().await.map_err(classify_request_error)?;
            let status = response.status().as_u16();
            let retry_after = parse_retry_after(response.headers());
            let bytes = response.bytes().await.map_err(classify_request_error)?;
            log::debug!("{call} -> HTTP {status} ({} bytes)", bytes.len());

            decode_reply(call, status, retry_after, &bytes)
        })
    }
}

fn classify_request_error(err: reqwest::Error) -> TransportError {
    if err.is_timeout() || err.is_connect() {
        TransportError::Network(err.to_string())
    } else if err.is_builder() {
        TransportError::Rejected {
            status: None,
            detail: err.to_string(),
        }
    } else {
        TransportError::Unknown(err.to_string())
    }
}

/// `Retry-After` in delta-seconds form; HTTP dates are ignored
fn parse_retry_after(headers: &HeaderMap) -> Option<Duration> {
    headers
        .get(RETRY_AFTER)?
        .to_str()
        .ok()?
        .trim()
        .parse::<u64>()
        .ok()
        .map(Duration::from_secs)
}
