//! Dispatcher behaviour against a scripted upstream, on paused tokio time

use std::sync::Arc;
use std::time::Duration;

use kodegen_tools_firecrawl::config::DispatchConfig;
use kodegen_tools_firecrawl::dispatch_engine::{
    CancelFlag, DispatchError, FailureKind, PollStep,
};
use kodegen_tools_firecrawl::operation::{
    BatchScrapeParams, CrawlParams, Document, ExtractParams, JobKind, JobOutput, JobStatus,
    OperationOutput, OperationRequest, StatusParams,
};
use kodegen_tools_firecrawl::transport::{UpstreamCall, WebhookEvent};
use serde_json::json;
use tokio::time::Instant;

mod common;
use common::*;

fn crawl(url: &str) -> OperationRequest {
    OperationRequest::Crawl(CrawlParams {
        url: url.to_string(),
        ..Default::default()
    })
}

fn batch(urls: &[&str]) -> OperationRequest {
    OperationRequest::BatchScrape(BatchScrapeParams {
        urls: urls.iter().map(|u| u.to_string()).collect(),
        ..Default::default()
    })
}

fn extract(url: &str) -> OperationRequest {
    OperationRequest::Extract(ExtractParams {
        urls: vec![url.to_string()],
        prompt: Some("list the product names".to_string()),
        ..Default::default()
    })
}

fn batch_status(id: &str) -> OperationRequest {
    OperationRequest::CheckBatchStatus(StatusParams { id: id.to_string() })
}

fn crawl_status(id: &str) -> OperationRequest {
    OperationRequest::CheckCrawlStatus(StatusParams { id: id.to_string() })
}

#[tokio::test(start_paused = true)]
async fn scrape_succeeds_and_records_usage() {
    let transport = Arc::new(ScriptedTransport::new([scraped("https://a.example/")]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let output = dispatcher.dispatch(scrape("https://a.example/")).await.unwrap();

    let OperationOutput::Scrape(doc) = output else {
        panic!("expected a scrape result");
    };
    assert_eq!(doc.source_url(), Some("https://a.example/"));
    assert_eq!(transport.call_count(), 1);
    assert_eq!(dispatcher.ledger().consumed(), 1);
}

#[tokio::test(start_paused = true)]
async fn transient_failures_exhaust_attempts() {
    let transport = Arc::new(ScriptedTransport::new([
        server_error(503),
        server_error(503),
        server_error(503),
        scraped("https://a.example/"),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let err = dispatcher
        .dispatch(scrape("https://a.example/"))
        .await
        .unwrap_err();

    assert!(matches!(err, DispatchError::Transient { attempts: 3, .. }));
    assert_eq!(err.kind(), FailureKind::TransientFailure);
    assert_eq!(transport.call_count(), 3);
    assert_eq!(dispatcher.ledger().consumed(), 0);
}

#[tokio::test(start_paused = true)]
async fn transient_failure_then_success() {
    let transport = Arc::new(ScriptedTransport::new([
        server_error(502),
        scraped("https://a.example/"),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    assert!(dispatcher.dispatch(scrape("https://a.example/")).await.is_ok());
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn permanent_failure_is_not_retried() {
    let transport = Arc::new(ScriptedTransport::new([
        rejected(401, "Unauthorized"),
        scraped("https://a.example/"),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let err = dispatcher
        .dispatch(scrape("https://a.example/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::Permanent {
            status: Some(401),
            ..
        }
    ));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn invalid_request_never_reaches_upstream() {
    let transport = Arc::new(ScriptedTransport::new([]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let err = dispatcher.dispatch(scrape("not a url")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::ValidationFailure);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn retry_after_hint_is_honoured() {
    let transport = Arc::new(ScriptedTransport::new([
        rate_limited(Some(Duration::from_secs(5))),
        scraped("https://a.example/"),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    dispatcher.dispatch(scrape("https://a.example/")).await.unwrap();

    let sent = transport.sent_at();
    assert_eq!(sent.len(), 2);
    assert!(sent[1] - sent[0] >= Duration::from_secs(5));
}

#[tokio::test(start_paused = true)]
async fn rate_limited_until_attempts_run_out() {
    let transport = Arc::new(ScriptedTransport::new([
        rate_limited(None),
        rate_limited(None),
        rate_limited(None),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let err = dispatcher
        .dispatch(scrape("https://a.example/"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::RateLimited);
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn retry_past_deadline_fails_early() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .operation_deadline(Duration::from_secs(2))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new([
        rate_limited(Some(Duration::from_secs(30))),
        scraped("https://a.example/"),
    ]));
    let dispatcher = dispatcher(&config, transport.clone());

    let started = Instant::now();
    let err = dispatcher
        .dispatch(scrape("https://a.example/"))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::RateLimited);
    assert_eq!(transport.call_count(), 1);
    assert!(started.elapsed() < Duration::from_secs(2));
}

#[tokio::test(start_paused = true)]
async fn exhausted_budget_refuses_without_calling() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .credit_budget(Some(1))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new([
        scraped("https://a.example/"),
        scraped("https://b.example/"),
    ]));
    let dispatcher = dispatcher(&config, transport.clone());

    dispatcher.dispatch(scrape("https://a.example/")).await.unwrap();
    let err = dispatcher
        .dispatch(scrape("https://b.example/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::BudgetExceeded {
            counted: 1,
            budget: 1,
            requested: 1
        }
    ));
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn concurrent_operations_cannot_overspend_the_budget() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .credit_budget(Some(1))
        .build()
        .unwrap();
    let transport = Arc::new(
        ScriptedTransport::new((0..5).map(|i| scraped(&format!("https://{i}.example/"))))
            .with_latency(Duration::from_millis(500)),
    );
    let dispatcher = dispatcher(&config, transport.clone());

    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .dispatch(scrape(&format!("https://{i}.example/")))
                    .await
            })
        })
        .collect();
    let mut succeeded = 0;
    let mut refused = 0;
    for task in tasks {
        match task.await.unwrap() {
            Ok(_) => succeeded += 1,
            Err(err) => {
                assert_eq!(err.kind(), FailureKind::BudgetExceeded);
                refused += 1;
            }
        }
    }

    assert_eq!((succeeded, refused), (1, 4));
    assert_eq!(transport.call_count(), 1);
    assert_eq!(dispatcher.ledger().consumed(), 1);
    assert_eq!(dispatcher.ledger().snapshot().reserved, 0);
}

#[tokio::test(start_paused = true)]
async fn batch_larger_than_remaining_budget_is_refused() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .credit_budget(Some(2))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new([]));
    let dispatcher = dispatcher(&config, transport.clone());

    let err = dispatcher
        .dispatch(batch(&["https://a.example/", "https://b.example/", "https://c.example/"]))
        .await
        .unwrap_err();

    assert_eq!(err.kind(), FailureKind::BudgetExceeded);
    assert_eq!(transport.call_count(), 0);
}

#[tokio::test(start_paused = true)]
async fn concurrent_calls_are_spaced_by_the_limiter() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .rate_limit(2, Duration::from_secs(1))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new(
        (0..5).map(|i| scraped(&format!("https://{i}.example/"))),
    ));
    let dispatcher = dispatcher(&config, transport.clone());

    let start = Instant::now();
    let tasks: Vec<_> = (0..5)
        .map(|i| {
            let dispatcher = Arc::clone(&dispatcher);
            tokio::spawn(async move {
                dispatcher
                    .dispatch(scrape(&format!("https://{i}.example/")))
                    .await
            })
        })
        .collect();
    for task in tasks {
        assert!(task.await.unwrap().is_ok());
    }

    let mut offsets: Vec<u64> = transport
        .sent_at()
        .iter()
        .map(|at| (*at - start).as_secs())
        .collect();
    offsets.sort_unstable();
    assert_eq!(offsets, vec![0, 0, 1, 1, 2]);
}

#[tokio::test(start_paused = true)]
async fn status_polls_progress_to_completion() {
    let transport = Arc::new(ScriptedTransport::new([
        status_reply(snapshot(JobStatus::Pending, 0, 3)),
        status_reply(snapshot(JobStatus::Processing, 1, 3)),
        documents_status(
            JobStatus::Completed,
            vec![
                page("https://a.example/1"),
                page("https://a.example/2"),
                page("https://a.example/3"),
            ],
            3,
        ),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let first = dispatcher.poll_once(JobKind::Crawl, "J1").await.unwrap();
    assert_eq!(first, PollStep::Continue(JobStatus::Pending));
    let second = dispatcher.poll_once(JobKind::Crawl, "J1").await.unwrap();
    assert_eq!(second, PollStep::Continue(JobStatus::Processing));
    assert_eq!(dispatcher.jobs().get("J1").unwrap().status, JobStatus::Processing);
    let PollStep::Terminal(record) = dispatcher.poll_once(JobKind::Crawl, "J1").await.unwrap()
    else {
        panic!("expected the job to finish");
    };

    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.documents.len(), 3);
    assert_eq!(record.completed, Some(3));
    // Cumulative usage 0, 1, 3 is charged once
    assert_eq!(dispatcher.ledger().consumed(), 3);
    assert_eq!(dispatcher.jobs().get("J1").unwrap().status, JobStatus::Completed);
}

#[tokio::test(start_paused = true)]
async fn crawl_returns_id_and_polls_in_background() {
    let transport = Arc::new(ScriptedTransport::new([
        submitted("J1"),
        status_reply(snapshot(JobStatus::Processing, 1, 2)),
        documents_status(
            JobStatus::Completed,
            vec![page("https://a.example/"), page("https://a.example/b")],
            2,
        ),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let output = dispatcher.dispatch(crawl("https://a.example/")).await.unwrap();
    let OperationOutput::JobStarted(submission) = output else {
        panic!("expected a job id");
    };
    assert_eq!(submission.id, "J1");
    assert!(dispatcher.jobs().get("J1").unwrap().polling);

    tokio::time::sleep(Duration::from_secs(30)).await;

    let record = dispatcher.jobs().get("J1").unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.documents.len(), 2);
    assert!(!record.polling);
    assert_eq!(transport.call_count(), 3);
    assert!(matches!(
        transport.calls()[1],
        UpstreamCall::JobStatus {
            kind: JobKind::Crawl,
            ..
        }
    ));

    // Answered from the tracker, no further upstream traffic
    let status = dispatcher.dispatch(crawl_status("J1")).await.unwrap();
    let OperationOutput::JobStatus(seen) = status else {
        panic!("expected a job status");
    };
    assert_eq!(seen.status, JobStatus::Completed);
    let again = dispatcher.dispatch(crawl_status("J1")).await.unwrap();
    assert_eq!(again, OperationOutput::JobStatus(seen));
    assert_eq!(transport.call_count(), 3);
}

#[tokio::test(start_paused = true)]
async fn submission_usage_is_not_charged_again_by_polls() {
    let transport = Arc::new(ScriptedTransport::new([
        submitted("J2").map(|reply| reply.with_credits(2)),
        status_reply(snapshot(JobStatus::Processing, 2, 3)),
        status_reply(snapshot(JobStatus::Completed, 3, 3)),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    dispatcher.dispatch(crawl("https://a.example/")).await.unwrap();
    assert_eq!(dispatcher.ledger().consumed(), 2);

    tokio::time::sleep(Duration::from_secs(30)).await;

    let record = dispatcher.jobs().get("J2").unwrap();
    assert_eq!(record.status, JobStatus::Completed);
    assert_eq!(record.credits_used, 3);
    assert_eq!(transport.call_count(), 3);
    assert_eq!(dispatcher.ledger().consumed(), 3);
}

#[tokio::test(start_paused = true)]
async fn batch_partial_failure_keeps_both_sides() {
    let transport = Arc::new(ScriptedTransport::new([
        submitted("B1"),
        documents_status(
            JobStatus::Completed,
            vec![page("https://a.example/"), failed_page("https://b.example/", 500)],
            2,
        ),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    dispatcher
        .dispatch(batch(&["https://a.example/", "https://b.example/"]))
        .await
        .unwrap();
    tokio::time::sleep(Duration::from_secs(10)).await;

    let output = dispatcher.dispatch(batch_status("B1")).await.unwrap();
    assert!(output.summary().contains("partial failure: 1 succeeded, 1 failed"));
    let OperationOutput::JobStatus(record) = output else {
        panic!("expected a job status");
    };
    assert_eq!(record.documents.len(), 1);
    assert_eq!(record.failed_items.len(), 1);
    assert_eq!(
        record.failed_items[0].url.as_deref(),
        Some("https://b.example/")
    );
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn unknown_job_status_is_not_found() {
    let transport = Arc::new(ScriptedTransport::new([rejected(404, "Job not found")]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let err = dispatcher.dispatch(crawl_status("nope")).await.unwrap_err();

    assert_eq!(err.kind(), FailureKind::NotFound);
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn looked_up_job_is_evicted_after_retention() {
    let transport = Arc::new(ScriptedTransport::new([status_reply(snapshot(
        JobStatus::Processing,
        1,
        4,
    ))]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let output = dispatcher.dispatch(crawl_status("ext")).await.unwrap();
    let OperationOutput::JobStatus(record) = output else {
        panic!("expected a job status");
    };
    assert_eq!(record.status, JobStatus::Processing);
    assert!(!record.polling);

    let much_later = chrono::Utc::now() + chrono::Duration::days(3650);
    assert_eq!(dispatcher.jobs().cleanup_expired_at(much_later), 1);
    assert!(!dispatcher.jobs().contains("ext"));
}

#[tokio::test(start_paused = true)]
async fn status_checks_ignore_the_budget() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .credit_budget(Some(1))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new([
        scraped("https://a.example/"),
        status_reply(snapshot(JobStatus::Processing, 0, 4)),
    ]));
    let dispatcher = dispatcher(&config, transport.clone());

    dispatcher.dispatch(scrape("https://a.example/")).await.unwrap();
    let output = dispatcher.dispatch(crawl_status("J9")).await.unwrap();

    assert!(matches!(
        output,
        OperationOutput::JobStatus(ref r) if r.status == JobStatus::Processing
    ));
    assert_eq!(transport.call_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn extract_waits_for_its_result() {
    let transport = Arc::new(ScriptedTransport::new([
        submitted("E1"),
        status_reply(snapshot(JobStatus::Processing, 0, 1)),
        status_reply({
            let mut snap = snapshot(JobStatus::Completed, 1, 1);
            snap.output = Some(JobOutput::Extracted(json!({"products": ["a", "b"]})));
            snap
        }),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let output = dispatcher.dispatch(extract("https://shop.example/")).await.unwrap();

    assert_eq!(output, OperationOutput::Extract(json!({"products": ["a", "b"]})));
    assert_eq!(transport.call_count(), 3);
    // Consumed results are not kept around
    assert!(!dispatcher.jobs().contains("E1"));
}

#[tokio::test(start_paused = true)]
async fn failed_extract_job_reports_poll_failure() {
    let transport = Arc::new(ScriptedTransport::new([
        submitted("E2"),
        status_reply({
            let mut snap = snapshot(JobStatus::Failed, 0, 1);
            snap.error = Some("page blocked".to_string());
            snap
        }),
    ]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let err = dispatcher
        .dispatch(extract("https://shop.example/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::PollFailed { ref detail, .. } if detail == "page blocked"
    ));
}

#[tokio::test(start_paused = true)]
async fn polling_stops_at_deadline() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .poll_interval(Duration::from_secs(2))
        .poll_deadline(Duration::from_secs(10))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new(
        std::iter::once(submitted("E3"))
            .chain((0..10).map(|_| status_reply(snapshot(JobStatus::Processing, 0, 1)))),
    ));
    let dispatcher = dispatcher(&config, transport.clone());

    let err = dispatcher
        .dispatch(extract("https://shop.example/"))
        .await
        .unwrap_err();

    assert!(matches!(
        err,
        DispatchError::PollTimedOut {
            last_status: JobStatus::Processing,
            ..
        }
    ));
    // The job stays queryable
    let record = dispatcher.jobs().get("E3").unwrap();
    assert!(record.poll_timed_out);
    assert!(!record.polling);
}

#[tokio::test(start_paused = true)]
async fn cancel_during_backoff_stops_retries() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .initial_delay(Duration::from_secs(10))
        .max_delay(Duration::from_secs(20))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new([
        server_error(503),
        scraped("https://a.example/"),
    ]));
    let dispatcher = dispatcher(&config, transport.clone());
    let cancel = Arc::new(CancelFlag::new());

    let task = {
        let dispatcher = Arc::clone(&dispatcher);
        let cancel = Arc::clone(&cancel);
        tokio::spawn(async move {
            dispatcher
                .dispatch_with_cancel(scrape("https://a.example/"), cancel)
                .await
        })
    };
    tokio::time::sleep(Duration::from_secs(1)).await;
    cancel.cancel();

    let err = task.await.unwrap().unwrap_err();
    assert_eq!(err.kind(), FailureKind::Cancelled);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn dropping_the_caller_cancels_the_operation() {
    let config = DispatchConfig::builder()
        .api_key("fc-test")
        .initial_delay(Duration::from_secs(10))
        .max_delay(Duration::from_secs(20))
        .build()
        .unwrap();
    let transport = Arc::new(ScriptedTransport::new([
        server_error(503),
        scraped("https://a.example/"),
    ]));
    let dispatcher = dispatcher(&config, transport.clone());

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        dispatcher.dispatch(scrape("https://a.example/")),
    )
    .await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(transport.call_count(), 1);
}

#[tokio::test(start_paused = true)]
async fn in_flight_usage_is_recorded_after_cancel() {
    let transport = Arc::new(
        ScriptedTransport::new([scraped("https://a.example/")])
            .with_latency(Duration::from_secs(5)),
    );
    let dispatcher = dispatcher(&test_config(), transport.clone());

    let outcome = tokio::time::timeout(
        Duration::from_secs(1),
        dispatcher.dispatch(scrape("https://a.example/")),
    )
    .await;
    assert!(outcome.is_err());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(transport.call_count(), 1);
    assert_eq!(dispatcher.ledger().consumed(), 1);
}

#[tokio::test(start_paused = true)]
async fn webhook_completion_stops_the_poller() {
    let transport = Arc::new(ScriptedTransport::new([submitted("C2")]));
    let dispatcher = dispatcher(&test_config(), transport.clone());

    dispatcher.dispatch(crawl("https://a.example/")).await.unwrap();

    let page_event = WebhookEvent::from_slice(
        br#"{"success":true,"type":"crawl.page","id":"C2",
            "data":[{"markdown":"a","metadata":{"sourceURL":"https://a.example/"}}]}"#,
    )
    .unwrap();
    let record = dispatcher.accept_webhook(&page_event).unwrap();
    assert_eq!(record.status, JobStatus::Processing);
    assert_eq!(record.documents.len(), 1);

    let done = WebhookEvent::from_slice(br#"{"success":true,"type":"crawl.completed","id":"C2"}"#)
        .unwrap();
    let record = dispatcher.accept_webhook(&done).unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    // A late page event does not reopen the job
    let record = dispatcher.accept_webhook(&page_event).unwrap();
    assert_eq!(record.status, JobStatus::Completed);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(transport.call_count(), 1);
    assert!(!dispatcher.jobs().get("C2").unwrap().polling);
}

#[tokio::test(start_paused = true)]
async fn webhook_for_unknown_job_is_rejected() {
    let transport = Arc::new(ScriptedTransport::new([]));
    let dispatcher = dispatcher(&test_config(), transport);

    let event = WebhookEvent::from_slice(br#"{"type":"crawl.completed","id":"ghost"}"#).unwrap();
    let err = dispatcher.accept_webhook(&event).unwrap_err();
    assert_eq!(err.kind(), FailureKind::NotFound);

    let odd = WebhookEvent::from_slice(br#"{"type":"crawl.paused","id":"ghost"}"#).unwrap();
    let err = dispatcher.accept_webhook(&odd).unwrap_err();
    assert_eq!(err.kind(), FailureKind::ValidationFailure);
}

#[tokio::test(start_paused = true)]
async fn duplicate_pages_are_kept_once() {
    let transport = Arc::new(ScriptedTransport::new([
        status_reply({
            let mut snap = snapshot(JobStatus::Processing, 1, 2);
            snap.output = Some(JobOutput::Documents(vec![page("https://a.example/")]));
            snap
        }),
        documents_status(
            JobStatus::Completed,
            vec![page("https://a.example/"), page("https://a.example/b")],
            2,
        ),
    ]));
    let dispatcher = dispatcher(&test_config(), transport);

    dispatcher.poll_once(JobKind::Crawl, "J5").await.unwrap();
    let PollStep::Terminal(record) = dispatcher.poll_once(JobKind::Crawl, "J5").await.unwrap()
    else {
        panic!("expected the job to finish");
    };
    let urls: Vec<_> = record.documents.iter().filter_map(Document::source_url).collect();
    assert_eq!(urls, vec!["https://a.example/", "https://a.example/b"]);
}
