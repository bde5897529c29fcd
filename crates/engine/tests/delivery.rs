use std::collections::{HashSet, VecDeque};
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use parking_lot::Mutex;
use serde_json::json;
use tokio::sync::mpsc;

use hookwire_core::{
    Backoff, DeliveryFilter, DeliveryStatus, NewEndpoint, RetryPolicy, TenantId, WebhookEndpoint,
};
use hookwire_engine::{
    EngineConfig, EngineError, ProcessOutcome, QueueWorker, STALE_CLAIM_ERROR, WebhookEngine,
    WebhookEngineBuilder, WorkerConfig,
};
use hookwire_sender::{OutboundRequest, SendError, SendResponse, Sender};
use hookwire_store::{DeliveryStore, StoreError};
use hookwire_store_memory::MemoryStore;

/// Answers with scripted status codes, then with `default_status`.
struct ScriptedSender {
    default_status: u16,
    script: Mutex<VecDeque<u16>>,
    delay: Duration,
    calls: Mutex<Vec<OutboundRequest>>,
    in_flight: AtomicUsize,
    peak_in_flight: AtomicUsize,
}

impl ScriptedSender {
    fn new(statuses: &[u16], then: u16, delay: Duration) -> Arc<Self> {
        Arc::new(Self {
            default_status: then,
            script: Mutex::new(statuses.iter().copied().collect()),
            delay,
            calls: Mutex::new(Vec::new()),
            in_flight: AtomicUsize::new(0),
            peak_in_flight: AtomicUsize::new(0),
        })
    }

    fn always(status: u16) -> Arc<Self> {
        Self::new(&[], status, Duration::ZERO)
    }

    fn slow(status: u16, delay: Duration) -> Arc<Self> {
        Self::new(&[], status, delay)
    }

    fn scripted(statuses: &[u16], then: u16) -> Arc<Self> {
        Self::new(statuses, then, Duration::ZERO)
    }

    fn call_count(&self) -> usize {
        self.calls.lock().len()
    }

    async fn wait_for_calls(&self, n: usize) {
        for _ in 0..500 {
            if self.call_count() >= n {
                return;
            }
            tokio::time::sleep(Duration::from_millis(2)).await;
        }
        panic!("sender saw {} calls, expected {n}", self.call_count());
    }
}

#[async_trait]
impl Sender for ScriptedSender {
    async fn send(&self, request: &OutboundRequest) -> Result<SendResponse, SendError> {
        self.calls.lock().push(request.clone());
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.peak_in_flight.fetch_max(now, Ordering::SeqCst);
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        let status = self.script.lock().pop_front().unwrap_or(self.default_status);
        let body = if status >= 300 { "upstream unavailable" } else { "" };
        Ok(SendResponse {
            status,
            body: body.to_owned(),
        })
    }
}

fn sweep_only() -> EngineConfig {
    EngineConfig::default().with_immediate_delivery(false)
}

fn build(store: &Arc<MemoryStore>, sender: &Arc<ScriptedSender>, config: EngineConfig) -> WebhookEngine {
    WebhookEngineBuilder::new()
        .store(Arc::clone(store))
        .sender(sender.clone())
        .config(config)
        .build()
        .unwrap()
}

async fn register(engine: &WebhookEngine, tenant: &str, patterns: &[&str]) -> WebhookEndpoint {
    engine
        .register_endpoint(NewEndpoint::new(
            tenant,
            "https://receiver.example.com/hooks",
            patterns.iter().copied(),
        ))
        .await
        .unwrap()
}

#[tokio::test]
async fn failed_send_schedules_first_retry() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(500);
    let engine = build(&store, &sender, sweep_only());
    let tenant = TenantId::new("lab-1");

    let endpoint = register(&engine, "lab-1", &["bio.*"]).await;
    let data = json!({"sample_id": "S-100", "volume_ml": 4.5});
    let ids = engine
        .dispatch(&tenant, "bio.sample.created", &data)
        .await
        .unwrap();
    assert_eq!(ids.len(), 1);

    let pending = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(pending.status, DeliveryStatus::Pending);
    assert_eq!(pending.attempts, 0);
    assert_eq!(pending.endpoint_id, endpoint.id);
    assert_eq!(pending.payload, serde_json::to_string(&data).unwrap());

    let before = Utc::now();
    let report = engine.process_queue(100).await.unwrap();
    let after = Utc::now();
    assert_eq!(report.scanned, 1);
    assert_eq!(report.claimed, 1);
    assert_eq!(report.retried, 1);

    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.last_status_code, Some(500));
    assert_eq!(
        delivery.last_error.as_deref(),
        Some("HTTP 500: upstream unavailable")
    );
    let next = delivery.next_attempt_at.unwrap();
    assert!(next >= before + chrono::Duration::seconds(30));
    assert!(next <= after + chrono::Duration::seconds(30));

    let calls = sender.calls.lock();
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0].delivery_id, ids[0]);
    assert_eq!(calls[0].event_type, "bio.sample.created");
    assert_eq!(calls[0].payload, delivery.payload);
    assert_eq!(calls[0].secret.expose(), endpoint.secret.expose());
    drop(calls);

    let metrics = engine.metrics();
    assert_eq!(metrics.events_dispatched, 1);
    assert_eq!(metrics.deliveries_created, 1);
    assert_eq!(metrics.claimed, 1);
    assert_eq!(metrics.retried, 1);

    // Not due again until the backoff elapses.
    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report.scanned, 0);
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn unmatched_event_creates_nothing() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(200);
    let engine = build(&store, &sender, sweep_only());
    let tenant = TenantId::new("lab-1");
    register(&engine, "lab-1", &["bio.*"]).await;
    register(&engine, "lab-2", &["order.created"]).await;

    let ids = engine
        .dispatch(&tenant, "order.created", &json!({}))
        .await
        .unwrap();
    assert!(ids.is_empty());
    assert_eq!(store.delivery_count(), 0);

    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report, Default::default());
    assert_eq!(sender.call_count(), 0);
}

#[tokio::test]
async fn dispatch_rejects_bad_event_type() {
    let store = Arc::new(MemoryStore::new());
    let engine = build(&store, &ScriptedSender::always(200), sweep_only());
    register(&engine, "lab-1", &["*"]).await;

    let err = engine
        .dispatch(&TenantId::new("lab-1"), "bad event", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));

    let err = engine
        .dispatch(&TenantId::new(""), "bio.sample.created", &json!({}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Validation(_)));
    assert_eq!(store.delivery_count(), 0);
}

#[tokio::test]
async fn dispatch_is_all_or_nothing() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(200);
    let engine = build(&store, &sender, sweep_only());
    let tenant = TenantId::new("lab-1");
    for _ in 0..3 {
        register(&engine, "lab-1", &["bio.*"]).await;
    }

    store.fail_next_commit();
    let err = engine
        .dispatch(&tenant, "bio.sample.created", &json!({"n": 1}))
        .await
        .unwrap_err();
    assert!(matches!(err, EngineError::Store(_)));
    assert_eq!(store.delivery_count(), 0);
    assert_eq!(engine.process_queue(100).await.unwrap().scanned, 0);
    assert_eq!(sender.call_count(), 0);

    let ids = engine
        .dispatch(&tenant, "bio.sample.created", &json!({"n": 1}))
        .await
        .unwrap();
    assert_eq!(ids.len(), 3);
    assert_eq!(store.delivery_count(), 3);
}

#[tokio::test]
async fn retry_ceiling_ends_in_failed() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(503);
    let policy = RetryPolicy::new(Backoff::Constant(Duration::ZERO), 5).unwrap();
    let engine = build(&store, &sender, sweep_only().with_retry_policy(policy));
    let tenant = TenantId::new("lab-1");
    register(&engine, "lab-1", &["bio.sample.created"]).await;

    let ids = engine
        .dispatch(&tenant, "bio.sample.created", &json!({}))
        .await
        .unwrap();

    for attempt in 1..=4u32 {
        let report = engine.process_queue(100).await.unwrap();
        assert_eq!(report.retried, 1, "attempt {attempt}");
        let delivery = engine.get_delivery(ids[0]).await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Retrying);
        assert_eq!(delivery.attempts, attempt);
    }

    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report.failed, 1);

    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Failed);
    assert_eq!(delivery.attempts, 5);
    assert!(delivery.next_attempt_at.is_none());
    assert!(delivery.processed_at.is_some());
    assert_eq!(delivery.last_status_code, Some(503));

    assert_eq!(engine.process_queue(100).await.unwrap().scanned, 0);
    assert_eq!(sender.call_count(), 5);
    assert_eq!(engine.metrics().failed, 1);
}

#[tokio::test]
async fn recovers_after_transient_failures() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::scripted(&[500, 502], 204);
    let policy = RetryPolicy::new(Backoff::Constant(Duration::ZERO), 5).unwrap();
    let engine = build(&store, &sender, sweep_only().with_retry_policy(policy));
    let tenant = TenantId::new("lab-1");
    let endpoint = register(&engine, "lab-1", &["bio.*"]).await;

    let ids = engine
        .dispatch(&tenant, "bio.run.finished", &json!({"run": 7}))
        .await
        .unwrap();

    engine.process_queue(100).await.unwrap();
    engine.process_queue(100).await.unwrap();
    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report.delivered, 1);

    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Success);
    assert_eq!(delivery.attempts, 3);
    assert_eq!(delivery.last_status_code, Some(204));
    assert!(delivery.last_error.is_none());
    assert!(delivery.next_attempt_at.is_none());

    let stats = engine.delivery_stats(endpoint.id).await.unwrap();
    assert_eq!(stats.total, 1);
    assert_eq!(stats.success, 1);
    assert_eq!(stats.outstanding(), 0);
}

#[tokio::test]
async fn deactivation_cancels_without_sending() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(200);
    let engine = build(&store, &sender, sweep_only());
    let tenant = TenantId::new("lab-1");
    let endpoint = register(&engine, "lab-1", &["bio.*"]).await;

    let ids = engine
        .dispatch(&tenant, "bio.sample.created", &json!({}))
        .await
        .unwrap();
    let deactivated = engine.deactivate_endpoint(endpoint.id).await.unwrap();
    assert!(!deactivated.active);
    assert!(deactivated.revoked_at.is_some());

    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.claimed, 0);
    assert_eq!(sender.call_count(), 0);

    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Cancelled);
    assert_eq!(delivery.attempts, 0);
    assert!(delivery.next_attempt_at.is_none());

    // Deactivated endpoints no longer receive new events.
    let ids = engine
        .dispatch(&tenant, "bio.sample.created", &json!({}))
        .await
        .unwrap();
    assert!(ids.is_empty());
}

#[tokio::test]
async fn deactivation_does_not_interrupt_queued_attempt() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::slow(500, Duration::from_millis(100));
    let policy = RetryPolicy::new(Backoff::Constant(Duration::ZERO), 5).unwrap();
    let engine = build(&store, &sender, sweep_only().with_retry_policy(policy));
    let tenant = TenantId::new("lab-1");
    let endpoint = register(&engine, "lab-1", &["bio.*"]).await;

    let ids = engine
        .dispatch(&tenant, "bio.sample.created", &json!({}))
        .await
        .unwrap();

    let sweep = tokio::spawn({
        let engine = engine.clone();
        async move { engine.process_queue(100).await }
    });
    sender.wait_for_calls(1).await;
    assert_eq!(
        engine.get_delivery(ids[0]).await.unwrap().status,
        DeliveryStatus::Queued
    );
    engine.deactivate_endpoint(endpoint.id).await.unwrap();

    // The in-flight attempt finishes and is recorded as usual.
    let report = sweep.await.unwrap().unwrap();
    assert_eq!(report.retried, 1);
    assert_eq!(report.cancelled, 0);
    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.last_status_code, Some(500));

    // The retry is cancelled at its next claim without another send.
    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report.cancelled, 1);
    assert_eq!(report.claimed, 0);
    assert_eq!(sender.call_count(), 1);
    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Cancelled);
    assert_eq!(delivery.attempts, 1);
    assert!(delivery.next_attempt_at.is_none());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn concurrent_sweeps_send_each_delivery_once() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::slow(200, Duration::from_millis(5));
    let engine = build(&store, &sender, sweep_only().with_max_concurrent_sends(4));
    let tenant = TenantId::new("lab-1");
    for _ in 0..5 {
        register(&engine, "lab-1", &["bio.*"]).await;
    }

    let mut expected = HashSet::new();
    for n in 0..4 {
        let ids = engine
            .dispatch(&tenant, "bio.sample.created", &json!({"n": n}))
            .await
            .unwrap();
        expected.extend(ids);
    }
    assert_eq!(expected.len(), 20);

    let sweeps: Vec<_> = (0..8)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.process_queue(100).await })
        })
        .collect();

    let mut claimed = 0;
    for sweep in sweeps {
        claimed += sweep.await.unwrap().unwrap().claimed;
    }
    assert_eq!(claimed, 20);

    let sent: Vec<_> = sender.calls.lock().iter().map(|r| r.delivery_id).collect();
    assert_eq!(sent.len(), 20);
    let unique: HashSet<_> = sent.into_iter().collect();
    assert_eq!(unique, expected);

    let delivered = engine
        .list_deliveries(&DeliveryFilter::default().with_status(DeliveryStatus::Success))
        .await
        .unwrap();
    assert_eq!(delivered.len(), 20);
}

#[tokio::test]
async fn send_timeout_counts_as_failed_attempt() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::slow(200, Duration::from_millis(500));
    let config = sweep_only()
        .with_send_timeout(Duration::from_millis(20))
        .with_stale_claim_after(Duration::from_secs(5));
    let engine = build(&store, &sender, config);
    register(&engine, "lab-1", &["bio.*"]).await;

    let ids = engine
        .dispatch(&TenantId::new("lab-1"), "bio.sample.created", &json!({}))
        .await
        .unwrap();

    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report.retried, 1);

    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert_eq!(delivery.attempts, 1);
    assert!(delivery.last_status_code.is_none());
    assert!(delivery.last_error.unwrap().contains("timed out"));
}

#[tokio::test]
async fn stale_claim_is_recovered_as_failed_attempt() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(200);
    let config = sweep_only()
        .with_send_timeout(Duration::from_millis(10))
        .with_stale_claim_after(Duration::from_millis(50));
    let engine = build(&store, &sender, config);
    register(&engine, "lab-1", &["bio.*"]).await;

    let ids = engine
        .dispatch(&TenantId::new("lab-1"), "bio.sample.created", &json!({}))
        .await
        .unwrap();

    // A worker claims the row and then disappears.
    let claim = store.claim_delivery(ids[0], Utc::now()).await.unwrap();
    assert!(claim.is_claimed());
    let orphan = store.get_delivery(ids[0]).await.unwrap().unwrap();
    let orphan_claim = orphan.claimed_at.unwrap();

    tokio::time::sleep(Duration::from_millis(100)).await;

    let report = engine.process_queue(100).await.unwrap();
    assert_eq!(report.recovered, 1);
    assert_eq!(report.scanned, 0);
    assert_eq!(sender.call_count(), 0);

    let delivery = engine.get_delivery(ids[0]).await.unwrap();
    assert_eq!(delivery.status, DeliveryStatus::Retrying);
    assert_eq!(delivery.attempts, 1);
    assert_eq!(delivery.last_error.as_deref(), Some(STALE_CLAIM_ERROR));
    assert!(delivery.next_attempt_at.is_some());
    assert_eq!(engine.metrics().stale_recovered, 1);

    // The vanished worker can no longer record its outcome.
    let late = orphan
        .resolve_outcome(
            &hookwire_core::DeliveryOutcome::Delivered { status_code: 200 },
            &RetryPolicy::default(),
            Utc::now(),
        )
        .unwrap();
    let err = store
        .record_outcome(ids[0], orphan_claim, &late)
        .await
        .unwrap_err();
    assert!(matches!(err, StoreError::NotQueued { .. }));
}

#[tokio::test]
async fn process_delivery_skips_rows_not_due() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(500);
    let engine = build(&store, &sender, sweep_only());
    register(&engine, "lab-1", &["bio.*"]).await;

    let ids = engine
        .dispatch(&TenantId::new("lab-1"), "bio.sample.created", &json!({}))
        .await
        .unwrap();

    let first = engine.process_delivery(ids[0]).await.unwrap();
    assert!(matches!(first, ProcessOutcome::Retrying { attempts: 1, .. }));

    let second = engine.process_delivery(ids[0]).await.unwrap();
    assert!(matches!(second, ProcessOutcome::Skipped(_)));
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn immediate_delivery_sends_after_dispatch() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(200);
    let engine = build(&store, &sender, EngineConfig::default());
    register(&engine, "lab-1", &["bio.*"]).await;
    register(&engine, "lab-1", &["*"]).await;

    let ids = engine
        .dispatch(&TenantId::new("lab-1"), "bio.sample.created", &json!({"id": 1}))
        .await
        .unwrap();
    assert_eq!(ids.len(), 2);

    engine.shutdown().await;

    for id in ids {
        let delivery = engine.get_delivery(id).await.unwrap();
        assert_eq!(delivery.status, DeliveryStatus::Success);
        assert_eq!(delivery.attempts, 1);
    }
    assert_eq!(sender.call_count(), 2);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn immediate_delivery_is_bounded_by_max_concurrent_sends() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::slow(200, Duration::from_millis(20));
    let engine = build(
        &store,
        &sender,
        EngineConfig::default().with_max_concurrent_sends(2),
    );
    let tenant = TenantId::new("lab-1");
    for _ in 0..3 {
        register(&engine, "lab-1", &["bio.*"]).await;
    }

    let mut ids = Vec::new();
    for n in 0..4 {
        ids.extend(
            engine
                .dispatch(&tenant, "bio.sample.created", &json!({"n": n}))
                .await
                .unwrap(),
        );
    }
    assert_eq!(ids.len(), 12);

    engine.shutdown().await;

    assert_eq!(sender.call_count(), 12);
    assert!(sender.peak_in_flight.load(Ordering::SeqCst) <= 2);
    for id in ids {
        assert_eq!(
            engine.get_delivery(id).await.unwrap().status,
            DeliveryStatus::Success
        );
    }
}

#[tokio::test]
async fn worker_sweeps_until_shutdown() {
    let store = Arc::new(MemoryStore::new());
    let sender = ScriptedSender::always(200);
    let engine = build(&store, &sender, sweep_only());
    register(&engine, "lab-1", &["bio.*"]).await;

    let ids = engine
        .dispatch(&TenantId::new("lab-1"), "bio.sample.created", &json!({}))
        .await
        .unwrap();

    let (shutdown_tx, shutdown_rx) = mpsc::channel(1);
    let mut worker = QueueWorker::new(
        engine.clone(),
        WorkerConfig::default().with_poll_interval(Duration::from_millis(10)),
        shutdown_rx,
    );
    let handle = tokio::spawn(async move { worker.run().await });

    let mut delivered = false;
    for _ in 0..200 {
        if engine.get_delivery(ids[0]).await.unwrap().status == DeliveryStatus::Success {
            delivered = true;
            break;
        }
        tokio::time::sleep(Duration::from_millis(10)).await;
    }
    assert!(delivered);

    shutdown_tx.send(()).await.unwrap();
    tokio::time::timeout(Duration::from_secs(5), handle)
        .await
        .unwrap()
        .unwrap();
    assert_eq!(sender.call_count(), 1);
}

#[tokio::test]
async fn invalid_endpoints_are_rejected() {
    let store = Arc::new(MemoryStore::new());
    let engine = build(&store, &ScriptedSender::always(200), sweep_only());

    let cases = [
        NewEndpoint::new("lab-1", "ftp://receiver.example.com", ["bio.*"]),
        NewEndpoint::new("lab-1", "https://receiver.example.com", Vec::<String>::new()),
        NewEndpoint::new("lab-1", "https://receiver.example.com", ["bio.*.created"]),
        NewEndpoint::new("", "https://receiver.example.com", ["bio.*"]),
    ];
    for request in cases {
        let err = engine.register_endpoint(request).await.unwrap_err();
        assert!(matches!(err, EngineError::Validation(_)), "{err}");
    }
    assert!(
        engine
            .list_endpoints(&TenantId::new("lab-1"))
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn registered_endpoint_carries_fresh_secret() {
    let store = Arc::new(MemoryStore::new());
    let engine = build(&store, &ScriptedSender::always(200), sweep_only());

    let a = register(&engine, "lab-1", &["bio.*"]).await;
    let b = register(&engine, "lab-1", &["bio.*"]).await;
    assert_eq!(a.secret.expose().len(), 64);
    assert_ne!(a.secret.expose(), b.secret.expose());

    let fetched = engine.get_endpoint(a.id).await.unwrap();
    assert_eq!(fetched.secret.expose(), a.secret.expose());
    assert_eq!(engine.list_endpoints(&TenantId::new("lab-1")).await.unwrap().len(), 2);
}

#[test]
fn builder_requires_components() {
    let err = WebhookEngineBuilder::new()
        .store(Arc::new(MemoryStore::new()))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::Configuration(_)));

    let err = WebhookEngineBuilder::new()
        .store(Arc::new(MemoryStore::new()))
        .sender(ScriptedSender::always(200))
        .config(EngineConfig::default().with_batch_size(0))
        .build()
        .err()
        .unwrap();
    assert!(matches!(err, EngineError::Configuration(_)));
}
