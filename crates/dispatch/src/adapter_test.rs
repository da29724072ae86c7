//! Tests for the batch submission adapter

use std::sync::atomic::{AtomicBool, Ordering};

use herald_protocol::{ChangeEvent, encode};
use herald_sources::{AckLedger, AckOutcome, MemoryMessage};
use parking_lot::Mutex;

use super::*;
use crate::batch::ChangeEventInspector;
use crate::error::DispatchError;

/// Sink that records requests and never completes them on its own
#[derive(Default)]
struct RecordingSink {
    submitted: Mutex<Vec<IdentityKey>>,
    closed: AtomicBool,
}

impl RecordingSink {
    fn submitted(&self) -> Vec<IdentityKey> {
        self.submitted.lock().clone()
    }
}

#[async_trait]
impl BatchSink<IdentityKey> for RecordingSink {
    async fn submit(&self, request: IdentityKey) -> Result<(), DispatchError> {
        if self.closed.load(Ordering::SeqCst) {
            return Err(DispatchError::SinkClosed("recording".into()));
        }
        self.submitted.lock().push(request);
        Ok(())
    }

    async fn close(&self) {
        self.closed.store(true, Ordering::SeqCst);
    }
}

struct Fixture {
    adapter: BulkAdapter<MemoryMessage, IdentityKey>,
    sink: Arc<RecordingSink>,
    metrics: Arc<DispatchMetrics>,
    ledger: AckLedger,
}

fn fixture() -> Fixture {
    let resolver: Arc<dyn KeyResolver<IdentityKey>> =
        Arc::new(|r: &IdentityKey| (r.as_str() != "ghost").then(|| r.clone()));
    fixture_with(resolver)
}

fn fixture_with(resolver: Arc<dyn KeyResolver<IdentityKey>>) -> Fixture {
    let sink = Arc::new(RecordingSink::default());
    let metrics = Arc::new(DispatchMetrics::new());
    let adapter = BulkAdapter::new(
        "test",
        Arc::clone(&sink) as Arc<dyn BatchSink<IdentityKey>>,
        resolver,
        16,
        Arc::clone(&metrics),
    );
    Fixture {
        adapter,
        sink,
        metrics,
        ledger: AckLedger::new(),
    }
}

impl Fixture {
    fn message(&self, offset: i64) -> MemoryMessage {
        MemoryMessage::new(0, offset, b"payload".to_vec(), self.ledger.clone())
    }

    async fn submit(&self, key: &str, offset: i64) {
        self.adapter
            .submit(IdentityKey::new(key), IdentityKey::new(key), self.message(offset))
            .await;
    }

    fn complete(&self, execution_id: u64, keys: &[&str], statuses: &[u16]) {
        let requests: Vec<IdentityKey> = keys.iter().map(|k| IdentityKey::new(*k)).collect();
        let response =
            BatchResponse::new(statuses.iter().map(|s| BatchResultItem::new(*s)).collect());
        self.adapter.on_batch_start(execution_id, &requests);
        self.adapter
            .on_batch_complete(execution_id, &requests, Ok(&response));
    }

    fn fail(&self, execution_id: u64, keys: &[&str], err: BatchError) {
        let requests: Vec<IdentityKey> = keys.iter().map(|k| IdentityKey::new(*k)).collect();
        self.adapter
            .on_batch_complete(execution_id, &requests, Err(&err));
    }
}

#[tokio::test]
async fn test_submit_forwards_and_success_acks() {
    let f = fixture();
    f.submit("a", 0).await;

    assert_eq!(f.sink.submitted(), vec![IdentityKey::new("a")]);
    assert_eq!(f.adapter.pending(), 1);
    assert!(f.ledger.outcome(0, 0).is_none());

    f.complete(1, &["a"], &[201]);

    assert_eq!(f.ledger.outcome(0, 0), Some(AckOutcome::Acked));
    assert_eq!(f.adapter.pending(), 0);
    let s = f.metrics.snapshot();
    assert_eq!(s.acked, 1);
    assert_eq!(s.batch_requests, 1);
    assert_eq!(s.latency_count, 1);
}

#[tokio::test]
async fn test_duplicate_acked_without_sink() {
    let f = fixture();
    f.submit("a", 0).await;
    f.submit("a", 1).await;

    assert_eq!(f.sink.submitted().len(), 1);
    assert_eq!(f.ledger.outcome(0, 1), Some(AckOutcome::Acked));
    assert!(f.ledger.outcome(0, 0).is_none());
    assert!(f.adapter.is_pending(&IdentityKey::new("a")));
    assert_eq!(f.metrics.snapshot().duplicates, 1);

    // completion settles the original, not the duplicate again
    f.complete(1, &["a"], &[200]);
    assert_eq!(f.ledger.outcome(0, 0), Some(AckOutcome::Acked));
    assert!(!f.ledger.has_duplicates());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_same_key_submits_once() {
    const SUBMITTERS: i64 = 8;
    let f = Arc::new(fixture());

    let mut tasks = tokio::task::JoinSet::new();
    for offset in 0..SUBMITTERS {
        let f = Arc::clone(&f);
        tasks.spawn(async move { f.submit("same", offset).await });
    }
    while tasks.join_next().await.is_some() {}

    assert_eq!(f.sink.submitted().len(), 1);
    assert_eq!(f.adapter.pending(), 1);
    assert_eq!(f.ledger.acked_count(), (SUBMITTERS - 1) as usize);
    assert_eq!(f.metrics.snapshot().duplicates, (SUBMITTERS - 1) as u64);
}

#[tokio::test]
async fn test_closed_sink_nacks_and_removes() {
    let f = fixture();
    f.sink.close().await;

    f.submit("a", 0).await;

    assert_eq!(f.ledger.outcome(0, 0), Some(AckOutcome::Nacked));
    assert_eq!(f.adapter.pending(), 0);
}

#[tokio::test]
async fn test_permanent_item_nacks_and_removes() {
    let f = fixture();
    let adapter = f.adapter;
    let adapter = adapter.with_inspector(Arc::new(ChangeEventInspector));

    let payload = encode(&ChangeEvent::index("d1", "wf-1", "r1"));
    adapter
        .submit(
            IdentityKey::new("c"),
            IdentityKey::new("c"),
            MemoryMessage::new(0, 0, payload, f.ledger.clone()),
        )
        .await;

    let requests = vec![IdentityKey::new("c")];
    let response = BatchResponse::new(vec![BatchResultItem::with_error(400, "mapper_parsing_exception")]);
    adapter.on_batch_complete(7, &requests, Ok(&response));

    assert_eq!(f.ledger.outcome(0, 0), Some(AckOutcome::Nacked));
    assert_eq!(adapter.pending(), 0);
    assert_eq!(f.metrics.snapshot().nacked, 1);
}

#[tokio::test]
async fn test_retryable_item_stays_pending_until_resolved() {
    let f = fixture();
    f.submit("b", 0).await;

    f.complete(1, &["b"], &[503]);
    f.complete(2, &["b"], &[429]);

    assert!(f.ledger.outcome(0, 0).is_none());
    assert_eq!(f.adapter.pending(), 1);
    assert_eq!(f.metrics.snapshot().retries, 2);

    f.complete(3, &["b"], &[200]);
    assert_eq!(f.ledger.outcomes(0, 0), vec![AckOutcome::Acked]);
    assert_eq!(f.adapter.pending(), 0);
}

#[tokio::test]
async fn test_mixed_batch_settles_each_position() {
    let f = fixture();
    f.submit("a", 0).await;
    f.submit("b", 1).await;
    f.submit("c", 2).await;
    f.submit("d", 3).await;

    f.complete(1, &["a", "b", "c", "d"], &[409, 503, 400, 404]);

    assert_eq!(f.ledger.outcome(0, 0), Some(AckOutcome::Acked));
    assert!(f.ledger.outcome(0, 1).is_none());
    assert_eq!(f.ledger.outcome(0, 2), Some(AckOutcome::Nacked));
    assert_eq!(f.ledger.outcome(0, 3), Some(AckOutcome::Acked));
    assert_eq!(f.adapter.pending(), 1);
    assert!(f.adapter.is_pending(&IdentityKey::new("b")));
}

#[tokio::test]
async fn test_permanent_batch_error_nacks_items() {
    let f = fixture();
    f.submit("a", 0).await;
    f.submit("b", 1).await;

    f.fail(1, &["a", "b"], BatchError::new(400, "malformed bulk body", true));

    assert_eq!(f.ledger.nacked_count(), 2);
    assert_eq!(f.adapter.pending(), 0);
    assert_eq!(f.metrics.snapshot().failures, 2);
}

#[tokio::test]
async fn test_non_retryable_batch_error_nacks_items() {
    let f = fixture();
    f.submit("a", 0).await;

    f.fail(1, &["a"], BatchError::new(503, "rejected", false));

    assert_eq!(f.ledger.outcome(0, 0), Some(AckOutcome::Nacked));
    assert_eq!(f.adapter.pending(), 0);
}

#[tokio::test]
async fn test_retryable_batch_error_keeps_entries() {
    let f = fixture();
    f.submit("a", 0).await;
    f.submit("b", 1).await;

    f.fail(1, &["a", "b"], BatchError::new(503, "cluster unavailable", true));
    f.fail(2, &["a"], BatchError::new(0, "connection refused", true));

    assert_eq!(f.ledger.settled_count(), 0);
    assert_eq!(f.adapter.pending(), 2);
    assert_eq!(f.metrics.snapshot().failures, 3);
}

#[tokio::test]
async fn test_unresolvable_results_are_skipped() {
    let f = fixture();
    f.submit("a", 0).await;
    f.submit("b", 1).await;

    // "ghost" has no key, "stale" has no entry, "b" has no positional result
    f.complete(1, &["ghost", "a", "stale", "b"], &[200, 200, 200]);

    assert_eq!(f.ledger.outcome(0, 0), Some(AckOutcome::Acked));
    assert!(f.ledger.outcome(0, 1).is_none());
    assert_eq!(f.adapter.pending(), 1);
    assert_eq!(f.metrics.snapshot().unresolved, 3);
}

#[tokio::test]
async fn test_resolver_without_keys_never_settles() {
    let resolver: Arc<dyn KeyResolver<IdentityKey>> = Arc::new(|_: &IdentityKey| -> Option<IdentityKey> { None });
    let f = fixture_with(resolver);
    f.submit("a", 0).await;

    f.complete(1, &["a"], &[200]);
    f.fail(2, &["a"], BatchError::new(400, "bad", false));

    assert_eq!(f.ledger.settled_count(), 0);
    assert_eq!(f.metrics.snapshot().unresolved, 2);
}

#[tokio::test]
async fn test_many_successes_ack_each_once() {
    const N: i64 = 100;
    let f = fixture();
    let keys: Vec<String> = (0..N).map(|i| format!("0-{i}")).collect();
    for (offset, key) in keys.iter().enumerate() {
        f.submit(key, offset as i64).await;
    }

    let refs: Vec<&str> = keys.iter().map(String::as_str).collect();
    let statuses = vec![201u16; N as usize];
    f.complete(1, &refs, &statuses);

    assert_eq!(f.ledger.acked_count(), N as usize);
    assert!(!f.ledger.has_duplicates());
    assert_eq!(f.adapter.pending(), 0);
}

#[tokio::test]
async fn test_release_pending_drops_without_settling() {
    let f = fixture();
    f.submit("a", 0).await;
    f.submit("b", 1).await;

    assert_eq!(f.adapter.release_pending(), 2);
    assert_eq!(f.adapter.pending(), 0);
    assert_eq!(f.ledger.settled_count(), 0);

    // late completions find nothing
    f.complete(1, &["a"], &[200]);
    assert_eq!(f.ledger.settled_count(), 0);
}

#[tokio::test]
async fn test_shutdown_closes_sink() {
    let f = fixture();
    Delivery::<MemoryMessage, IdentityKey>::shutdown(&f.adapter).await;
    assert!(f.sink.closed.load(Ordering::SeqCst));
}
