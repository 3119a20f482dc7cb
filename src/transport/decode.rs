//! Response classification and decoding
//!
//! Turns an HTTP status plus body into either a typed reply or a classified
//! `TransportError`. Kept free of any HTTP client so it can be exercised
//! directly.

use serde::Deserialize;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::time::Duration;

use super::{ReplyPayload, TransportError, UpstreamCall, UpstreamReply};
use crate::operation::{
    Document, JobKind, JobOutput, JobSnapshot, JobStatus, JobSubmission, OperationRequest,
    SearchHit,
};

/// Longest slice of a non-JSON error body kept in error details
const MAX_DETAIL_LEN: usize = 300;

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SubmitBody {
    id: String,
    #[serde(default)]
    url: Option<String>,
    #[serde(default, rename = "invalidURLs")]
    invalid_urls: Option<Vec<String>>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct StatusBody {
    status: String,
    #[serde(default)]
    completed: Option<u64>,
    #[serde(default)]
    total: Option<u64>,
    #[serde(default)]
    credits_used: Option<u64>,
    #[serde(default)]
    expires_at: Option<String>,
    #[serde(default)]
    data: Value,
    #[serde(default)]
    error: Option<String>,
}

/// Classify and decode one upstream response
pub fn decode_reply(
    call: &UpstreamCall,
    status: u16,
    retry_after: Option<Duration>,
    body: &[u8],
) -> Result<UpstreamReply, TransportError> {
    match status {
        429 => {
            return Err(TransportError::RateLimited {
                detail: error_detail(body).unwrap_or_else(|| "too many requests".to_string()),
                retry_after,
            });
        }
        408 | 500..=599 => {
            return Err(TransportError::Server {
                status,
                detail: error_detail(body).unwrap_or_else(|| "no details".to_string()),
            });
        }
        200..=299 => {}
        _ => {
            return Err(TransportError::Rejected {
                status: Some(status),
                detail: error_detail(body).unwrap_or_else(|| format!("HTTP {status}")),
            });
        }
    }

    let value: Value = serde_json::from_slice(body).map_err(|e| TransportError::Rejected {
        status: Some(status),
        detail: format!("undecodable response body: {e}"),
    })?;

    // A failed job still reports `success: false` alongside its status
    if let Some(kind) = status_kind(call) {
        if value.get("status").is_some_and(Value::is_string) {
            return decode_status(kind, value);
        }
    }

    if value.get("success").and_then(Value::as_bool) == Some(false) {
        return Err(TransportError::Rejected {
            status: Some(status),
            detail: value
                .get("error")
                .and_then(Value::as_str)
                .unwrap_or("upstream reported failure")
                .to_string(),
        });
    }

    let credits = value.get("creditsUsed").and_then(Value::as_u64);
    match call {
        UpstreamCall::JobStatus { kind, .. } => decode_status(*kind, value),
        UpstreamCall::Operation(request) => match request {
            OperationRequest::Scrape(_) => {
                let doc: Document = field(&value, "data")?;
                let credits = credits.or_else(|| doc.inline_credits());
                Ok(reply(ReplyPayload::Scraped(doc), credits))
            }
            OperationRequest::Map(_) => {
                let links: Vec<String> = field(&value, "links")?;
                Ok(reply(ReplyPayload::Mapped(links), credits))
            }
            OperationRequest::Search(_) => {
                let hits: Vec<SearchHit> = field(&value, "data")?;
                Ok(reply(ReplyPayload::Searched(hits), credits))
            }
            OperationRequest::Crawl(_)
            | OperationRequest::BatchScrape(_)
            | OperationRequest::Extract(_)
            | OperationRequest::DeepResearch(_)
            | OperationRequest::GenerateLlmsText(_) => {
                let body: SubmitBody = from_value(value)?;
                let submission = JobSubmission {
                    id: body.id,
                    url: body.url,
                    invalid_urls: body.invalid_urls.unwrap_or_default(),
                };
                Ok(reply(ReplyPayload::Submitted(submission), credits))
            }
            OperationRequest::CheckCrawlStatus(_) => decode_status(JobKind::Crawl, value),
            OperationRequest::CheckBatchStatus(_) => decode_status(JobKind::BatchScrape, value),
        },
    }
}

fn status_kind(call: &UpstreamCall) -> Option<JobKind> {
    match call {
        UpstreamCall::JobStatus { kind, .. } => Some(*kind),
        UpstreamCall::Operation(OperationRequest::CheckCrawlStatus(_)) => Some(JobKind::Crawl),
        UpstreamCall::Operation(OperationRequest::CheckBatchStatus(_)) => {
            Some(JobKind::BatchScrape)
        }
        UpstreamCall::Operation(_) => None,
    }
}

fn decode_status(kind: JobKind, value: Value) -> Result<UpstreamReply, TransportError> {
    let body: StatusBody = from_value(value)?;
    let status = JobStatus::from_upstream(&body.status);
    let output = decode_job_output(kind, body.data)?;
    let error = match (status, body.error) {
        (JobStatus::Failed, None) => Some(format!("job {}", body.status.to_ascii_lowercase())),
        (_, error) => error,
    };
    let snapshot = JobSnapshot {
        status,
        completed: body.completed,
        total: body.total,
        credits_used: body.credits_used,
        output,
        error,
        expires_at: body.expires_at,
    };
    Ok(reply(ReplyPayload::Status(snapshot), body.credits_used))
}

/// Decode the `data` member of a status response for a job of `kind`
pub(crate) fn decode_job_output(
    kind: JobKind,
    data: Value,
) -> Result<Option<JobOutput>, TransportError> {
    if data.is_null() {
        return Ok(None);
    }
    let output = match kind {
        JobKind::Crawl | JobKind::BatchScrape => JobOutput::Documents(from_value(data)?),
        JobKind::Extract => JobOutput::Extracted(data),
        JobKind::DeepResearch => JobOutput::Research(from_value(data)?),
        JobKind::LlmsText => JobOutput::LlmsText(from_value(data)?),
    };
    Ok(Some(output))
}

fn reply(payload: ReplyPayload, credits: Option<u64>) -> UpstreamReply {
    UpstreamReply {
        payload,
        credits_used: credits,
    }
}

fn field<T: DeserializeOwned>(value: &Value, name: &str) -> Result<T, TransportError> {
    let member = value.get(name).cloned().unwrap_or(Value::Null);
    serde_json::from_value(member).map_err(|e| TransportError::Rejected {
        status: None,
        detail: format!("unexpected '{name}' in response: {e}"),
    })
}

fn from_value<T: DeserializeOwned>(value: Value) -> Result<T, TransportError> {
    serde_json::from_value(value).map_err(|e| TransportError::Rejected {
        status: None,
        detail: format!("unexpected response shape: {e}"),
    })
}

/// Best human-readable error text from a failure body
fn error_detail(body: &[u8]) -> Option<String> {
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        for key in ["error", "message", "details"] {
            if let Some(text) = value.get(key).and_then(Value::as_str) {
                return Some(text.to_string());
            }
        }
    }
    let text = String::from_utf8_lossy(body);
    let text = text.trim();
    if text.is_empty() {
        return None;
    }
    Some(text.chars().take(MAX_DETAIL_LEN).collect())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::operation::{ScrapeParams, StatusParams};
    use serde_json::json;

    fn scrape_call() -> UpstreamCall {
        UpstreamCall::Operation(OperationRequest::Scrape(ScrapeParams {
            url: "https://a.example".into(),
            ..Default::default()
        }))
    }

    fn body(value: Value) -> Vec<u8> {
        serde_json::to_vec(&value).unwrap()
    }

    #[test]
    fn rate_limit_carries_hint() {
        let err = decode_reply(
            &scrape_call(),
            429,
            Some(Duration::from_secs(7)),
            &body(json!({"error": "Rate limit exceeded"})),
        )
        .unwrap_err();
        assert_eq!(err.retry_after(), Some(Duration::from_secs(7)));
        assert_eq!(err.to_string(), "upstream rate limit hit: Rate limit exceeded");
    }

    #[test]
    fn status_codes_classify() {
        let call = scrape_call();
        assert!(
            decode_reply(&call, 503, None, b"")
                .unwrap_err()
                .error_class()
                .is_some()
        );
        assert!(
            decode_reply(&call, 408, None, b"")
                .unwrap_err()
                .error_class()
                .is_some()
        );
        for status in [400, 401, 402, 403, 404] {
            let err = decode_reply(&call, status, None, b"{}").unwrap_err();
            assert!(err.error_class().is_none(), "{status} should be permanent");
        }
    }

    #[test]
    fn success_false_is_permanent() {
        let err = decode_reply(
            &scrape_call(),
            200,
            None,
            &body(json!({"success": false, "error": "blocked site"})),
        )
        .unwrap_err();
        assert_eq!(
            err,
            TransportError::Rejected {
                status: Some(200),
                detail: "blocked site".into()
            }
        );
    }

    #[test]
    fn garbage_body_is_permanent() {
        let err = decode_reply(&scrape_call(), 200, None, b"<html>").unwrap_err();
        assert!(err.error_class().is_none());
    }

    #[test]
    fn scrape_reply_decodes_document() {
        let reply = decode_reply(
            &scrape_call(),
            200,
            None,
            &body(json!({
                "success": true,
                "data": {
                    "markdown": "# Hello",
                    "metadata": {"title": "Hello", "sourceURL": "https://a.example", "statusCode": 200}
                },
                "creditsUsed": 1
            })),
        )
        .unwrap();
        assert_eq!(reply.credits_used, Some(1));
        let ReplyPayload::Scraped(doc) = reply.payload else {
            panic!("expected a document");
        };
        assert_eq!(doc.markdown.as_deref(), Some("# Hello"));
        assert_eq!(doc.metadata.title.as_deref(), Some("Hello"));
    }

    #[test]
    fn failed_job_status_is_a_snapshot() {
        let call = UpstreamCall::JobStatus {
            kind: JobKind::Extract,
            id: "x1".into(),
        };
        let reply = decode_reply(
            &call,
            200,
            None,
            &body(json!({"success": false, "status": "failed", "error": "no content"})),
        )
        .unwrap();
        let ReplyPayload::Status(snapshot) = reply.payload else {
            panic!("expected a status snapshot");
        };
        assert_eq!(snapshot.status, JobStatus::Failed);
        assert_eq!(snapshot.error.as_deref(), Some("no content"));
    }

    #[test]
    fn crawl_status_decodes_pages() {
        let call = UpstreamCall::Operation(OperationRequest::CheckCrawlStatus(StatusParams {
            id: "c1".into(),
        }));
        let reply = decode_reply(
            &call,
            200,
            None,
            &body(json!({
                "status": "scraping",
                "completed": 1,
                "total": 4,
                "creditsUsed": 1,
                "data": [{"markdown": "a", "metadata": {"sourceURL": "https://a.example/1"}}]
            })),
        )
        .unwrap();
        let ReplyPayload::Status(snapshot) = reply.payload else {
            panic!("expected a status snapshot");
        };
        assert_eq!(snapshot.status, JobStatus::Processing);
        assert_eq!(snapshot.total, Some(4));
        assert!(matches!(snapshot.output, Some(JobOutput::Documents(ref d)) if d.len() == 1));
    }
}
