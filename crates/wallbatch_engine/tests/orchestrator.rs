use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use wallbatch_core::{
    BatchParams, FailureKind, JobHandle, JobOutcome, Operation, PollSettings, ProgressSnapshot,
};
use wallbatch_engine::{
    BatchEvent, BatchObserver, BatchOrchestrator, BatchRejected, EngineSettings, ReqwestService,
};
use wiremock::matchers::{method, path, path_regex};
use wiremock::{Mock, MockServer, Request, Respond, ResponseTemplate};

const TWO_POSTS: &str = "https://vk.com/wall-1_1 https://vk.com/wall-1_2";

#[derive(Default)]
struct TestObserver {
    events: Arc<Mutex<Vec<BatchEvent>>>,
}

impl TestObserver {
    fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    fn take(&self) -> Vec<BatchEvent> {
        self.events.lock().unwrap().drain(..).collect()
    }

    fn progress(&self) -> Vec<u32> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                BatchEvent::Progress(snapshot) => Some(snapshot.processed),
                BatchEvent::Finished(_) => None,
            })
            .collect()
    }

    fn outcomes(&self) -> Vec<JobOutcome> {
        self.events
            .lock()
            .unwrap()
            .iter()
            .filter_map(|event| match event {
                BatchEvent::Finished(outcome) => Some(outcome.clone()),
                BatchEvent::Progress(_) => None,
            })
            .collect()
    }
}

impl BatchObserver for TestObserver {
    fn on_progress(&self, snapshot: ProgressSnapshot) {
        self.events.lock().unwrap().push(BatchEvent::Progress(snapshot));
    }

    fn on_result(&self, outcome: JobOutcome) {
        self.events.lock().unwrap().push(BatchEvent::Finished(outcome));
    }
}

/// Replies from a script, repeating the last entry once exhausted.
struct Script {
    replies: Vec<ResponseTemplate>,
    next: AtomicUsize,
}

impl Script {
    fn new(replies: Vec<ResponseTemplate>) -> Self {
        Self {
            replies,
            next: AtomicUsize::new(0),
        }
    }
}

impl Respond for Script {
    fn respond(&self, _request: &Request) -> ResponseTemplate {
        let index = self.next.fetch_add(1, Ordering::SeqCst);
        self.replies[index.min(self.replies.len() - 1)].clone()
    }
}

fn json_reply(body: Value) -> ResponseTemplate {
    ResponseTemplate::new(200).set_body_json(body)
}

fn fast_poll() -> PollSettings {
    PollSettings {
        initial_delay: Duration::from_millis(1),
        interval: Duration::from_millis(1),
        max_attempts: 120,
    }
}

fn orchestrator(server: &MockServer, poll: PollSettings) -> BatchOrchestrator {
    engine_logging::initialize_for_tests();
    let settings = EngineSettings {
        base_url: format!("{}/api", server.uri()),
        poll,
        ..EngineSettings::default()
    };
    let service = ReqwestService::new(&settings).expect("service");
    BatchOrchestrator::with_service(Arc::new(service), poll)
}

async fn mount_accepted(server: &MockServer, submit_path: &str, job_id: &str) {
    Mock::given(method("POST"))
        .and(path(submit_path))
        .respond_with(json_reply(json!({ "status": "processing", "requestId": job_id })))
        .mount(server)
        .await;
}

async fn status_requests(server: &MockServer) -> usize {
    server
        .received_requests()
        .await
        .unwrap_or_default()
        .iter()
        .filter(|request| request.url.path().contains("/status/"))
        .count()
}

async fn wait_until(mut condition: impl FnMut() -> bool) {
    for _ in 0..500 {
        if condition() {
            return;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    panic!("condition not reached in time");
}

#[tokio::test]
async fn synchronous_reply_completes_without_polling() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/like/posts"))
        .respond_with(json_reply(json!({
            "success": true,
            "posts": [
                { "postUrl": "https://vk.com/wall-1_1", "success": true,
                  "summary": { "totalAccounts": 2, "successfulLikes": 2, "failedLikes": 0 } },
                { "postUrl": "https://vk.com/wall-1_2", "success": false, "error": "post deleted" }
            ]
        })))
        .expect(1)
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    let outcome = orchestrator
        .execute(TWO_POSTS, BatchParams::like(5), observer.as_ref())
        .await
        .expect("not busy")
        .expect("delivered");

    let JobOutcome::Completed(summary) = &outcome else {
        panic!("expected completion, got {outcome:?}");
    };
    assert_eq!(summary.total_items(), 2);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(summary.failed(), 1);
    assert_eq!(summary.actions().succeeded, 2);
    assert_eq!(observer.take(), vec![BatchEvent::Finished(outcome.clone())]);
    assert_eq!(status_requests(&server).await, 0);
    assert!(!orchestrator.is_busy());
}

#[tokio::test]
async fn progress_is_monotonic_and_result_comes_last() {
    let server = MockServer::start().await;
    mount_accepted(&server, "/api/share/posts", "req-1").await;
    Mock::given(method("GET"))
        .and(path("/api/share/status/req-1"))
        .respond_with(Script::new(vec![
            json_reply(json!({ "status": "processing", "processedPosts": 1, "currentPost": "https://vk.com/wall-1_1" })),
            json_reply(json!({ "status": "processing", "processedPosts": 2 })),
            json_reply(json!({ "status": "processing", "processedPosts": 1 })),
            json_reply(json!({ "status": "processing", "processedPosts": 9 })),
            json_reply(json!({
                "status": "completed",
                "result": { "success": true, "items": [{ "success": true }, { "success": true }] }
            })),
        ]))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    let outcome = orchestrator
        .execute(TWO_POSTS, BatchParams::share(), observer.as_ref())
        .await
        .unwrap()
        .unwrap();

    assert!(outcome.is_success(), "{outcome:?}");
    assert_eq!(observer.progress(), vec![1, 2, 2]);
    let events = observer.take();
    assert_eq!(events.last(), Some(&BatchEvent::Finished(outcome)));
    assert_eq!(
        events
            .iter()
            .filter(|event| matches!(event, BatchEvent::Finished(_)))
            .count(),
        1
    );
    assert_eq!(status_requests(&server).await, 5);
}

#[tokio::test]
async fn polling_gives_up_after_max_attempts() {
    let server = MockServer::start().await;
    mount_accepted(&server, "/api/like/posts", "req-slow").await;
    Mock::given(method("GET"))
        .and(path("/api/like/status/req-slow"))
        .respond_with(json_reply(json!({ "status": "processing", "processedPosts": 0 })))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    let outcome = orchestrator
        .execute(TWO_POSTS, BatchParams::like(10), observer.as_ref())
        .await
        .unwrap()
        .unwrap();

    assert_eq!(
        outcome,
        JobOutcome::TimedOut {
            job_id: "req-slow".into(),
            attempts: 120
        }
    );
    assert_eq!(status_requests(&server).await, 120);
    assert_eq!(observer.outcomes().len(), 1);
}

#[tokio::test]
async fn transient_status_errors_are_retried() {
    let server = MockServer::start().await;
    mount_accepted(&server, "/api/like/posts", "req-2").await;
    Mock::given(method("GET"))
        .and(path("/api/like/status/req-2"))
        .respond_with(Script::new(vec![
            ResponseTemplate::new(503),
            ResponseTemplate::new(200).set_body_raw("<html>wait</html>", "text/html"),
            json_reply(json!({ "status": "queued" })),
            json_reply(json!({
                "status": "completed",
                "result": { "success": true, "summary": { "totalAccounts": 1, "successfulLikes": 1 } }
            })),
        ]))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    let outcome = orchestrator
        .execute("https://vk.com/wall-1_1", BatchParams::like(1), observer.as_ref())
        .await
        .unwrap()
        .unwrap();

    let JobOutcome::Completed(summary) = outcome else {
        panic!("expected completion");
    };
    assert_eq!(summary.total_items(), 1);
    assert_eq!(summary.succeeded(), 1);
    assert_eq!(status_requests(&server).await, 4);
}

#[tokio::test]
async fn failed_job_reports_service_error() {
    let server = MockServer::start().await;
    mount_accepted(&server, "/api/subscribe/public", "req-3").await;
    Mock::given(method("GET"))
        .and(path("/api/subscribe/status/req-3"))
        .respond_with(json_reply(json!({ "status": "failed", "error": "community is closed" })))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    let outcome = orchestrator
        .execute("https://vk.com/closedclub", BatchParams::subscribe(), observer.as_ref())
        .await
        .unwrap()
        .unwrap();

    let JobOutcome::Failed(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::Service { status: None });
    assert_eq!(failure.reason, "community is closed");
}

#[tokio::test]
async fn empty_input_fails_validation_without_requests() {
    let server = MockServer::start().await;
    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();

    let outcome = orchestrator
        .execute("nothing to see, https://example.com/x", BatchParams::like(10), observer.as_ref())
        .await
        .unwrap()
        .unwrap();

    let JobOutcome::Failed(failure) = &outcome else {
        panic!("expected validation failure");
    };
    assert_eq!(failure.kind, FailureKind::Validation);
    assert_eq!(observer.take(), vec![BatchEvent::Finished(outcome.clone())]);
    assert!(server.received_requests().await.unwrap_or_default().is_empty());
    assert!(!orchestrator.is_busy());
}

#[tokio::test]
async fn html_success_page_is_a_transport_failure() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/share/posts"))
        .respond_with(ResponseTemplate::new(200).set_body_raw("<html>login</html>", "text/html"))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    let outcome = orchestrator
        .execute(TWO_POSTS, BatchParams::share(), observer.as_ref())
        .await
        .unwrap()
        .unwrap();

    let JobOutcome::Failed(failure) = outcome else {
        panic!("expected failure");
    };
    assert_eq!(failure.kind, FailureKind::Transport);
    assert!(failure.reason.contains("non-JSON"), "{}", failure.reason);
}

#[tokio::test]
async fn http_error_reason_reaches_the_observer() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/share/posts"))
        .respond_with(ResponseTemplate::new(400).set_body_json(json!({ "error": "no tokens configured" })))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    orchestrator
        .execute(TWO_POSTS, BatchParams::share(), observer.as_ref())
        .await
        .unwrap();

    let outcomes = observer.outcomes();
    let [JobOutcome::Failed(failure)] = outcomes.as_slice() else {
        panic!("expected one failure, got {outcomes:?}");
    };
    assert_eq!(failure.kind, FailureKind::Service { status: Some(400) });
    assert_eq!(failure.reason, "no tokens configured");
}

#[tokio::test]
async fn second_batch_is_rejected_while_polling() {
    let server = MockServer::start().await;
    mount_accepted(&server, "/api/like/posts", "req-busy").await;
    Mock::given(method("GET"))
        .and(path_regex("^/api/like/status/.*$"))
        .respond_with(json_reply(json!({ "status": "processing" })))
        .mount(&server)
        .await;

    let slow = PollSettings {
        interval: Duration::from_millis(50),
        ..fast_poll()
    };
    let orchestrator = orchestrator(&server, slow);
    let observer = TestObserver::new();
    orchestrator
        .run_batch(TWO_POSTS, BatchParams::like(10), observer.clone())
        .unwrap();

    let probe = orchestrator.clone();
    wait_until(move || probe.active_job().is_some()).await;
    assert_eq!(
        orchestrator.active_job(),
        Some(JobHandle {
            job_id: "req-busy".into(),
            total_items: 2
        })
    );

    let second = TestObserver::new();
    let rejected = orchestrator.run_batch("https://vk.com/wall1_9", BatchParams::like(10), second.clone());
    assert_eq!(
        rejected,
        Err(BatchRejected::Busy {
            job_id: Some("req-busy".into())
        })
    );
    assert!(second.take().is_empty());

    assert!(orchestrator.cancel());
    assert!(!orchestrator.is_busy());
    let checks_at_cancel = status_requests(&server).await;
    tokio::time::sleep(Duration::from_millis(200)).await;
    assert!(observer.outcomes().is_empty());
    // At most the check already in flight completes after cancellation.
    assert!(status_requests(&server).await <= checks_at_cancel + 1);
}

#[tokio::test]
async fn cancelled_submission_delivers_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/api/share/posts"))
        .respond_with(
            json_reply(json!({ "success": true, "items": [] })).set_delay(Duration::from_millis(300)),
        )
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let observer = TestObserver::new();
    orchestrator
        .run_batch(TWO_POSTS, BatchParams::share(), observer.clone())
        .unwrap();

    assert!(orchestrator.is_busy());
    assert_eq!(orchestrator.active_job(), None);
    assert_eq!(
        orchestrator.run_batch(TWO_POSTS, BatchParams::share(), TestObserver::new()),
        Err(BatchRejected::Busy { job_id: None })
    );

    assert!(orchestrator.cancel());
    tokio::time::sleep(Duration::from_millis(500)).await;
    assert!(observer.take().is_empty());

    // The slot is free again and a new run goes through.
    let next = TestObserver::new();
    let outcome = orchestrator
        .execute(TWO_POSTS, BatchParams::share(), next.as_ref())
        .await
        .unwrap();
    assert!(outcome.is_some_and(|outcome| outcome.is_success()));
    assert!(observer.take().is_empty());
}

#[tokio::test]
async fn replaced_job_never_delivers_its_late_reply() {
    let server = MockServer::start().await;
    mount_accepted(&server, "/api/like/posts", "req-old").await;
    Mock::given(method("GET"))
        .and(path("/api/like/status/req-old"))
        .respond_with(
            json_reply(json!({
                "status": "completed",
                "result": { "success": true, "posts": [{ "success": true }, { "success": true }] }
            }))
            .set_delay(Duration::from_millis(400)),
        )
        .mount(&server)
        .await;
    mount_accepted(&server, "/api/share/posts", "req-new").await;
    Mock::given(method("GET"))
        .and(path("/api/share/status/req-new"))
        .respond_with(json_reply(json!({
            "status": "completed",
            "result": { "success": false, "items": [{ "success": false, "error": "flood control" }] }
        })))
        .mount(&server)
        .await;

    let orchestrator = orchestrator(&server, fast_poll());
    let first = TestObserver::new();
    orchestrator
        .run_batch(TWO_POSTS, BatchParams::like(10), first.clone())
        .unwrap();

    // Wait for the first job's slow status check to be in flight.
    for _ in 0..500 {
        if status_requests(&server).await >= 1 {
            break;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    assert_eq!(status_requests(&server).await, 1);
    assert!(orchestrator.cancel());

    let second = TestObserver::new();
    orchestrator
        .run_batch("https://vk.com/wall7_7", BatchParams::share(), second.clone())
        .unwrap();
    let probe = second.clone();
    wait_until(move || !probe.outcomes().is_empty()).await;

    // Let the first job's reply arrive after the replacement finished.
    tokio::time::sleep(Duration::from_millis(600)).await;

    assert!(first.take().is_empty());
    let outcomes = second.outcomes();
    let [JobOutcome::Completed(summary)] = outcomes.as_slice() else {
        panic!("expected one completion, got {outcomes:?}");
    };
    assert_eq!(summary.operation(), Operation::Share);
    assert_eq!(summary.total_items(), 1);
    assert_eq!(summary.succeeded(), 0);
    assert!(!orchestrator.is_busy());
    assert_eq!(status_requests(&server).await, 2);
}

#[test]
fn run_batch_outside_a_runtime_is_rejected() {
    let settings = EngineSettings::default();
    let orchestrator = BatchOrchestrator::new(&settings).unwrap();
    assert_eq!(
        orchestrator.run_batch(TWO_POSTS, BatchParams::share(), TestObserver::new()),
        Err(BatchRejected::NoRuntime)
    );
    assert!(!orchestrator.is_busy());
}
