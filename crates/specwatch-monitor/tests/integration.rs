//! # Integration Tests
//!
//! End-to-end scan behaviour with an in-memory specification source, a
//! recording sink and a temporary Sled database.
//!
//! These tests verify that fetching, change detection, persistence and
//! delivery work together, and that failures stay contained to the endpoint
//! or channel where they happen.

use async_trait::async_trait;
use serde_json::{json, Map, Value};
use specwatch_monitor::{
    BatchOutcome, BatchReport, CheckOutcome, DiffFailurePolicy, EndpointChecker, FetchError,
    ScanConfig, ScanScheduler, ScanState, SpecSource,
};
use specwatch_notify::{
    Attachment, DeliveryError, MessageRef, NotificationPayload, NotificationSink, PayloadKind,
};
use specwatch_registry::{digest::digest, Database, EndpointRegistry, Unsubscribed, VersionStore};
use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::Semaphore;

const API_A: &str = "https://a.example.com/openapi.json";
const API_B: &str = "https://b.example.com/openapi.json";

// ============================================================================
// Test doubles
// ============================================================================

#[derive(Clone)]
enum Stub {
    Document(Value),
    Status(u16),
    Panic,
}

#[derive(Default)]
struct StubSource {
    stubs: Mutex<HashMap<String, Stub>>,
    gate: Option<Arc<Semaphore>>,
    started: AtomicUsize,
}

impl StubSource {
    fn gated(gate: Arc<Semaphore>) -> Self {
        Self {
            gate: Some(gate),
            ..Self::default()
        }
    }

    /// Number of fetches that have begun, including ones parked on the gate.
    fn started(&self) -> usize {
        self.started.load(Ordering::SeqCst)
    }

    fn serve(&self, url: &str, stub: Stub) {
        self.stubs.lock().unwrap().insert(url.to_string(), stub);
    }
}

#[async_trait]
impl SpecSource for StubSource {
    async fn fetch(&self, url: &str) -> Result<Value, FetchError> {
        self.started.fetch_add(1, Ordering::SeqCst);
        if let Some(gate) = &self.gate {
            let _permit = gate.acquire().await.unwrap();
        }
        let stub = self.stubs.lock().unwrap().get(url).cloned();
        match stub {
            Some(Stub::Document(document)) => Ok(document),
            Some(Stub::Status(status)) => Err(FetchError::Status {
                status,
                message: "stubbed failure".to_string(),
            }),
            Some(Stub::Panic) => panic!("stub source exploded for {url}"),
            None => Err(FetchError::Status {
                status: 404,
                message: "Not Found".to_string(),
            }),
        }
    }
}

#[derive(Default)]
struct RecordingSink {
    posts: Mutex<Vec<(String, NotificationPayload, MessageRef)>>,
    uploads: Mutex<Vec<(String, Attachment, MessageRef)>>,
    failing: Mutex<HashSet<String>>,
    failing_uploads: Mutex<HashSet<String>>,
}

impl RecordingSink {
    fn fail_channel(&self, channel: &str) {
        self.failing.lock().unwrap().insert(channel.to_string());
    }

    fn fail_uploads(&self, channel: &str) {
        self.failing_uploads.lock().unwrap().insert(channel.to_string());
    }

    fn posts(&self) -> Vec<(String, NotificationPayload, MessageRef)> {
        self.posts.lock().unwrap().clone()
    }

    fn uploads(&self) -> Vec<(String, Attachment, MessageRef)> {
        self.uploads.lock().unwrap().clone()
    }
}

#[async_trait]
impl NotificationSink for RecordingSink {
    fn name(&self) -> &str {
        "recording"
    }

    async fn post(
        &self,
        channel: &str,
        payload: &NotificationPayload,
    ) -> Result<MessageRef, DeliveryError> {
        if self.failing.lock().unwrap().contains(channel) {
            return Err(DeliveryError::Rejected {
                channel: channel.to_string(),
                status: 500,
            });
        }
        let mut posts = self.posts.lock().unwrap();
        let message = MessageRef::new(format!("msg-{}", posts.len()));
        posts.push((channel.to_string(), payload.clone(), message.clone()));
        Ok(message)
    }

    async fn upload_attachment(
        &self,
        channel: &str,
        attachment: &Attachment,
        thread: &MessageRef,
    ) -> Result<(), DeliveryError> {
        if self.failing_uploads.lock().unwrap().contains(channel) {
            return Err(DeliveryError::Rejected {
                channel: channel.to_string(),
                status: 413,
            });
        }
        self.uploads
            .lock()
            .unwrap()
            .push((channel.to_string(), attachment.clone(), thread.clone()));
        Ok(())
    }
}

struct Harness {
    registry: EndpointRegistry,
    versions: VersionStore,
    source: Arc<StubSource>,
    sink: Arc<RecordingSink>,
    scheduler: Arc<ScanScheduler>,
}

impl Harness {
    fn new(config: ScanConfig) -> Self {
        Self::with_source(config, StubSource::default())
    }

    fn with_source(config: ScanConfig, source: StubSource) -> Self {
        let db = Database::temporary().unwrap();
        let registry = db.endpoint_registry();
        let versions = db.version_store();
        let source = Arc::new(source);
        let sink = Arc::new(RecordingSink::default());

        let checker = EndpointChecker::new(
            source.clone(),
            sink.clone(),
            registry.clone(),
            versions.clone(),
            config,
        );

        Self {
            registry,
            versions,
            source,
            sink,
            scheduler: Arc::new(ScanScheduler::new(checker)),
        }
    }

    async fn scan(&self) -> BatchReport {
        match self.scheduler.run_batch().await {
            BatchOutcome::Completed(report) => report,
            BatchOutcome::Skipped => panic!("batch unexpectedly skipped"),
        }
    }
}

fn many_paths(count: usize) -> Value {
    let paths: Map<String, Value> = (0..count)
        .map(|n| (format!("/resource/{n:04}"), json!({ "get": { "responses": { "200": {} } } })))
        .collect();
    json!({ "openapi": "3.0.3", "paths": paths })
}

// ============================================================================
// Scenario: first fetch
// ============================================================================

#[tokio::test]
async fn test_first_fetch_establishes_baseline() {
    let h = Harness::new(ScanConfig::new());
    let endpoint = h.registry.subscribe(API_A, "C1").unwrap();
    h.registry.subscribe(API_A, "C2").unwrap();

    let document = json!({ "a": 1 });
    h.source.serve(API_A, Stub::Document(document.clone()));

    let report = h.scan().await;
    assert_eq!(report.for_url(API_A).unwrap().outcome, CheckOutcome::Baseline);

    let posts = h.sink.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[0].0, "C1");
    assert_eq!(posts[1].0, "C2");
    assert!(posts.iter().all(|(_, p, _)| p.kind == PayloadKind::Baseline));
    assert!(h.sink.uploads().is_empty());

    assert_eq!(h.versions.count(endpoint.id).unwrap(), 1);
    let stored = h.registry.get(endpoint.id).unwrap().unwrap();
    assert_eq!(stored.last_digest, Some(digest(&document)));
}

// ============================================================================
// Scenario: unchanged document
// ============================================================================

#[tokio::test]
async fn test_unchanged_document_is_silent() {
    let h = Harness::new(ScanConfig::new());
    let endpoint = h.registry.subscribe(API_A, "C1").unwrap();
    h.source.serve(API_A, Stub::Document(json!({ "a": 1 })));

    h.scan().await;
    let report = h.scan().await;
    let third = h.scan().await;

    assert_eq!(report.for_url(API_A).unwrap().outcome, CheckOutcome::Unchanged);
    assert_eq!(third.for_url(API_A).unwrap().outcome, CheckOutcome::Unchanged);
    assert!(report.for_url(API_A).unwrap().deliveries.is_empty());
    assert_eq!(h.sink.posts().len(), 1);
    assert_eq!(h.versions.count(endpoint.id).unwrap(), 1);
}

// ============================================================================
// Scenario: breaking removal
// ============================================================================

#[tokio::test]
async fn test_removed_path_reports_breaking_change() {
    let h = Harness::new(ScanConfig::new());
    let endpoint = h.registry.subscribe(API_A, "C1").unwrap();

    h.source.serve(API_A, Stub::Document(json!({ "paths": { "/x": {}, "/y": {} } })));
    h.scan().await;

    h.source.serve(API_A, Stub::Document(json!({ "paths": { "/y": {} } })));
    let report = h.scan().await;

    let CheckOutcome::Changed {
        diff_available,
        summary,
        notified,
    } = report.for_url(API_A).unwrap().outcome.clone()
    else {
        panic!("expected a change");
    };
    assert!(diff_available);
    assert!(notified);
    let summary = summary.unwrap();
    assert_eq!((summary.breaking, summary.added, summary.removed, summary.deprecated), (1, 0, 1, 0));

    let posts = h.sink.posts();
    assert_eq!(posts.len(), 2);
    let text = posts[1].1.text();
    assert!(text.contains("breaking: 1 • removed: 1"));
    assert!(text.contains("```json"));
    assert!(text.contains("path.remove"));
    assert!(h.sink.uploads().is_empty());

    assert_eq!(h.versions.count(endpoint.id).unwrap(), 2);
}

// ============================================================================
// Scenario: oversized diff
// ============================================================================

#[tokio::test]
async fn test_large_diff_uploads_one_attachment_per_channel() {
    let h = Harness::new(ScanConfig::new());
    h.registry.subscribe(API_A, "C1").unwrap();
    h.registry.subscribe(API_A, "C2").unwrap();

    h.source.serve(API_A, Stub::Document(many_paths(120)));
    h.scan().await;
    assert!(h.sink.uploads().is_empty());

    h.source.serve(API_A, Stub::Document(many_paths(0)));
    h.scan().await;

    let posts = h.sink.posts();
    assert_eq!(posts.len(), 4);
    let change_posts = &posts[2..];
    assert!(change_posts.iter().all(|(_, p, _)| p.overflowed()));
    assert!(change_posts.iter().all(|(_, p, _)| !p.text().contains("```json")));

    let uploads = h.sink.uploads();
    assert_eq!(uploads.len(), 2);
    for ((post_channel, _, message), (upload_channel, attachment, thread)) in
        change_posts.iter().zip(uploads.iter())
    {
        assert_eq!(post_channel, upload_channel);
        assert_eq!(message, thread);
        assert_eq!(attachment.title, format!("Full diff for {API_A}"));
        assert!(attachment.content.chars().count() >= 3500);
    }
}

// ============================================================================
// Failure isolation
// ============================================================================

#[tokio::test]
async fn test_fetch_failure_is_isolated() {
    let h = Harness::new(ScanConfig::new());
    let a = h.registry.subscribe(API_A, "C1").unwrap();
    h.registry.subscribe(API_B, "C1").unwrap();

    h.source.serve(API_A, Stub::Status(500));
    h.source.serve(API_B, Stub::Document(json!({ "b": true })));

    let report = h.scan().await;
    assert!(matches!(
        report.for_url(API_A).unwrap().outcome,
        CheckOutcome::FetchFailed { .. }
    ));
    assert_eq!(report.for_url(API_B).unwrap().outcome, CheckOutcome::Baseline);
    assert_eq!(report.failed(), 1);

    assert_eq!(h.versions.count(a.id).unwrap(), 0);
    assert!(h.registry.get(a.id).unwrap().unwrap().last_digest.is_none());
    assert_eq!(h.sink.posts().len(), 1);
}

#[tokio::test]
async fn test_panicking_check_is_isolated() {
    let h = Harness::new(ScanConfig::new());
    h.registry.subscribe(API_A, "C1").unwrap();
    h.registry.subscribe(API_B, "C1").unwrap();

    h.source.serve(API_A, Stub::Panic);
    h.source.serve(API_B, Stub::Document(json!({ "b": true })));

    let report = h.scan().await;
    assert!(matches!(
        report.for_url(API_A).unwrap().outcome,
        CheckOutcome::Panicked { .. }
    ));
    assert_eq!(report.for_url(API_B).unwrap().outcome, CheckOutcome::Baseline);
    assert_eq!(h.scheduler.state(), ScanState::Idle);

    // The scheduler keeps working after a panicking check.
    h.source.serve(API_A, Stub::Document(json!({ "a": 1 })));
    let report = h.scan().await;
    assert_eq!(report.for_url(API_A).unwrap().outcome, CheckOutcome::Baseline);
}

#[tokio::test]
async fn test_delivery_failure_on_one_channel() {
    let h = Harness::new(ScanConfig::new());
    h.registry.subscribe(API_A, "C1").unwrap();
    h.registry.subscribe(API_A, "C2").unwrap();
    h.sink.fail_channel("C1");
    h.source.serve(API_A, Stub::Document(json!({ "a": 1 })));

    let report = h.scan().await;
    let deliveries = &report.for_url(API_A).unwrap().deliveries;
    assert_eq!(deliveries.len(), 2);
    assert!(!deliveries[0].posted);
    assert!(deliveries[0].error.as_deref().unwrap().contains("C1"));
    assert!(deliveries[1].posted);
    assert!(deliveries[1].error.is_none());

    let posts = h.sink.posts();
    assert_eq!(posts.len(), 1);
    assert_eq!(posts[0].0, "C2");
}

#[tokio::test]
async fn test_upload_failure_on_one_channel() {
    let h = Harness::new(ScanConfig::new());
    h.registry.subscribe(API_A, "C1").unwrap();
    h.registry.subscribe(API_A, "C2").unwrap();
    h.sink.fail_uploads("C1");

    h.source.serve(API_A, Stub::Document(many_paths(120)));
    h.scan().await;
    h.source.serve(API_A, Stub::Document(many_paths(0)));
    let report = h.scan().await;

    let deliveries = &report.for_url(API_A).unwrap().deliveries;
    assert_eq!(deliveries.len(), 2);
    assert_eq!(deliveries[0].channel, "C1");
    assert!(deliveries[0].posted);
    assert!(!deliveries[0].attachment_uploaded);
    assert!(deliveries[0].error.as_deref().unwrap().contains("C1"));
    assert!(deliveries[1].posted);
    assert!(deliveries[1].attachment_uploaded);
    assert!(deliveries[1].error.is_none());

    let uploads = h.sink.uploads();
    assert_eq!(uploads.len(), 1);
    assert_eq!(uploads[0].0, "C2");
    assert_eq!(h.sink.posts().len(), 4);
}

// ============================================================================
// Diff failure policy
// ============================================================================

async fn run_diff_failure(policy: DiffFailurePolicy) -> (Harness, BatchReport) {
    let h = Harness::new(ScanConfig::new().with_diff_failure_policy(policy));
    h.registry.subscribe(API_A, "C1").unwrap();

    // An object the fetcher accepts but the diff engine cannot walk.
    h.source.serve(API_A, Stub::Document(json!({ "paths": [] })));
    h.scan().await;

    h.source.serve(API_A, Stub::Document(json!({ "paths": {} })));
    let report = h.scan().await;
    (h, report)
}

#[tokio::test]
async fn test_diff_failure_notifies_by_default() {
    let (h, report) = run_diff_failure(DiffFailurePolicy::Notify).await;

    assert_eq!(
        report.for_url(API_A).unwrap().outcome,
        CheckOutcome::Changed {
            diff_available: false,
            summary: None,
            notified: true,
        }
    );
    let posts = h.sink.posts();
    assert_eq!(posts.len(), 2);
    assert_eq!(posts[1].1.kind, PayloadKind::DiffUnavailable);
}

#[tokio::test]
async fn test_diff_failure_skip_policy_stores_silently() {
    let (h, report) = run_diff_failure(DiffFailurePolicy::Skip).await;

    assert_eq!(
        report.for_url(API_A).unwrap().outcome,
        CheckOutcome::Changed {
            diff_available: false,
            summary: None,
            notified: false,
        }
    );
    assert_eq!(h.sink.posts().len(), 1);

    let endpoint = h.registry.find_by_url(API_A).unwrap().unwrap();
    assert_eq!(h.versions.count(endpoint.id).unwrap(), 2);
    assert_eq!(endpoint.last_digest, Some(digest(&json!({ "paths": {} }))));
}

// ============================================================================
// History
// ============================================================================

#[tokio::test]
async fn test_missing_history_rebaselines_silently() {
    let h = Harness::new(ScanConfig::new());
    let endpoint = h.registry.subscribe(API_A, "C1").unwrap();

    h.source.serve(API_A, Stub::Document(json!({ "v": 1 })));
    h.scan().await;
    h.versions.delete_all(endpoint.id).unwrap();

    h.source.serve(API_A, Stub::Document(json!({ "v": 2 })));
    let report = h.scan().await;

    assert_eq!(report.for_url(API_A).unwrap().outcome, CheckOutcome::Rebaselined);
    assert_eq!(h.sink.posts().len(), 1);
    assert_eq!(h.versions.count(endpoint.id).unwrap(), 1);
}

#[tokio::test]
async fn test_retention_is_enforced_each_cycle() {
    let h = Harness::new(ScanConfig::new().with_retention_limit(3));
    let endpoint = h.registry.subscribe(API_A, "C1").unwrap();

    for n in 0..6 {
        h.source.serve(API_A, Stub::Document(json!({ "info": { "version": n } })));
        h.scan().await;
        assert!(h.versions.count(endpoint.id).unwrap() <= 3);
    }

    let history = h.versions.history(endpoint.id).unwrap();
    let versions: Vec<&Value> = history.iter().map(|s| &s.document["info"]["version"]).collect();
    assert_eq!(versions, vec![&json!(3), &json!(4), &json!(5)]);
}

#[tokio::test]
async fn test_endpoint_deleted_mid_check_leaves_no_snapshots() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::with_source(ScanConfig::new(), StubSource::gated(gate.clone()));
    let endpoint = h.registry.subscribe(API_A, "C1").unwrap();
    h.source.serve(API_A, Stub::Document(json!({ "a": 1 })));

    let scheduler = Arc::clone(&h.scheduler);
    let batch = tokio::spawn(async move { scheduler.run_batch().await });
    while h.source.started() == 0 {
        tokio::task::yield_now().await;
    }

    // Last subscriber leaves while the fetch is parked.
    assert_eq!(
        h.registry.unsubscribe(API_A, "C1").unwrap(),
        Unsubscribed::EndpointDeleted(endpoint.id)
    );
    h.versions.delete_all(endpoint.id).unwrap();

    gate.add_permits(1);
    let outcome = batch.await.unwrap();
    assert!(matches!(
        outcome.report().unwrap().for_url(API_A).unwrap().outcome,
        CheckOutcome::PersistFailed { .. }
    ));

    assert!(h.registry.get(endpoint.id).unwrap().is_none());
    assert_eq!(h.versions.count(endpoint.id).unwrap(), 0);
    assert!(h.sink.posts().is_empty());
}

#[tokio::test]
async fn test_disabled_endpoint_is_not_scanned() {
    let h = Harness::new(ScanConfig::new());
    let endpoint = h.registry.subscribe(API_A, "C1").unwrap();
    h.registry.set_enabled(endpoint.id, false).unwrap();
    h.source.serve(API_A, Stub::Document(json!({ "a": 1 })));

    let report = h.scan().await;
    assert_eq!(report.checked(), 0);
    assert!(h.sink.posts().is_empty());
}

// ============================================================================
// Scheduling
// ============================================================================

#[tokio::test]
async fn test_overlapping_batch_is_skipped() {
    let gate = Arc::new(Semaphore::new(0));
    let h = Harness::with_source(ScanConfig::new(), StubSource::gated(gate.clone()));
    h.registry.subscribe(API_A, "C1").unwrap();
    h.source.serve(API_A, Stub::Document(json!({ "a": 1 })));

    let scheduler = Arc::clone(&h.scheduler);
    let first = tokio::spawn(async move { scheduler.run_batch().await });

    while h.scheduler.state() != ScanState::Scanning {
        tokio::task::yield_now().await;
    }
    assert_eq!(h.scheduler.run_batch().await, BatchOutcome::Skipped);

    gate.add_permits(1);
    let outcome = first.await.unwrap();
    assert_eq!(outcome.report().unwrap().checked(), 1);
    assert_eq!(h.scheduler.state(), ScanState::Idle);
    assert_eq!(h.sink.posts().len(), 1);
}

#[tokio::test]
async fn test_run_scans_until_shutdown() {
    let h = Harness::new(ScanConfig::new().with_interval(Duration::from_millis(20)));
    h.registry.subscribe(API_A, "C1").unwrap();
    h.source.serve(API_A, Stub::Document(json!({ "a": 1 })));

    let scheduler = Arc::clone(&h.scheduler);
    scheduler
        .run(tokio::time::sleep(Duration::from_millis(100)))
        .await;

    assert_eq!(h.scheduler.state(), ScanState::Idle);
    // Repeated ticks saw the same document: exactly one baseline notification.
    assert_eq!(h.sink.posts().len(), 1);
}
