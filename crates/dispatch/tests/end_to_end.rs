//! End-to-end engine scenarios against a scripted batched sink
//!
//! Payloads are the identity key itself, so redelivering a payload is a
//! duplicate of the same logical item.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use herald_dispatch::{
    BatchObserver, BatchResponse, BatchResultItem, BatchSink, BuildOutcome, BulkAdapter,
    DecodeError, DispatchError, DispatchMetrics, Engine, ItemBuilder, KeyResolver, StopOutcome,
};
use herald_protocol::IdentityKey;
use herald_sources::{AckLedger, AckOutcome, MemoryMessage, MemoryProducer, MemoryStream, SourceMessage, memory_log};
use parking_lot::Mutex;

#[derive(Debug, Clone)]
struct Request {
    key: IdentityKey,
}

struct KeyFromPayload;

impl ItemBuilder<MemoryMessage> for KeyFromPayload {
    type Request = Request;

    fn build(&self, message: &MemoryMessage) -> Result<BuildOutcome<Request>, DecodeError> {
        let key = std::str::from_utf8(message.value())
            .map_err(|_| DecodeError::invalid("payload is not utf-8"))?;
        let key = IdentityKey::new(key);
        Ok(BuildOutcome::Deliver {
            key: key.clone(),
            request: Request { key },
        })
    }
}

/// Queues requests until the test executes them as a batch
#[derive(Default)]
struct ScriptedSink {
    queued: Mutex<Vec<Request>>,
    submits: Mutex<usize>,
}

impl ScriptedSink {
    fn queued_len(&self) -> usize {
        self.queued.lock().len()
    }

    fn take(&self) -> Vec<Request> {
        std::mem::take(&mut *self.queued.lock())
    }
}

#[async_trait]
impl BatchSink<Request> for ScriptedSink {
    async fn submit(&self, request: Request) -> Result<(), DispatchError> {
        *self.submits.lock() += 1;
        self.queued.lock().push(request);
        Ok(())
    }
}

type TestAdapter = BulkAdapter<MemoryMessage, Request>;

struct Harness {
    producer: MemoryProducer,
    ledger: AckLedger,
    sink: Arc<ScriptedSink>,
    adapter: Arc<TestAdapter>,
    metrics: Arc<DispatchMetrics>,
    engine: Engine<MemoryStream, KeyFromPayload, TestAdapter>,
}

fn harness() -> Harness {
    let (producer, stream) = memory_log("events", 64);
    let ledger = producer.ledger().clone();
    let sink = Arc::new(ScriptedSink::default());
    let metrics = Arc::new(DispatchMetrics::new());
    let resolver: Arc<dyn KeyResolver<Request>> = Arc::new(|r: &Request| Some(r.key.clone()));
    let adapter = Arc::new(BulkAdapter::new(
        "scripted",
        Arc::clone(&sink) as Arc<dyn BatchSink<Request>>,
        resolver,
        64,
        Arc::clone(&metrics),
    ));
    let engine = Engine::new(
        "app",
        Arc::new(stream),
        Arc::new(KeyFromPayload),
        Arc::clone(&adapter),
        Arc::clone(&metrics),
    )
    .with_concurrency(4)
    .with_shutdown_timeout(Duration::from_secs(2));

    Harness {
        producer,
        ledger,
        sink,
        adapter,
        metrics,
        engine,
    }
}

impl Harness {
    /// Execute every queued request as one batch, status chosen per key
    fn execute(&self, execution_id: u64, status_of: impl Fn(&str) -> u16) -> usize {
        let batch = self.sink.take();
        let response = BatchResponse::new(
            batch
                .iter()
                .map(|r| BatchResultItem::new(status_of(r.key.as_str())))
                .collect(),
        );
        self.adapter.on_batch_start(execution_id, &batch);
        self.adapter
            .on_batch_complete(execution_id, &batch, Ok(&response));
        batch.len()
    }

    fn requeue(&self, keys: &[&str]) {
        let mut queued = self.sink.queued.lock();
        for key in keys {
            queued.push(Request {
                key: IdentityKey::new(*key),
            });
        }
    }
}

async fn wait_until(mut done: impl FnMut() -> bool) {
    tokio::time::timeout(Duration::from_secs(5), async {
        while !done() {
            tokio::time::sleep(Duration::from_millis(5)).await;
        }
    })
    .await
    .expect("condition not reached");
}

#[tokio::test]
async fn test_conflict_retryable_and_permanent_statuses() {
    let h = harness();
    h.engine.start().await.unwrap();

    // offsets 0, 1, 2
    for key in ["A", "B", "C"] {
        h.producer.publish(0, key).await.unwrap();
    }
    wait_until(|| h.sink.queued_len() == 3).await;

    let executed = h.execute(1, |key| match key {
        "A" => 409,
        "B" => 503,
        _ => 400,
    });
    assert_eq!(executed, 3);

    assert_eq!(h.ledger.outcome(0, 0), Some(AckOutcome::Acked));
    assert_eq!(h.ledger.outcome(0, 1), None);
    assert_eq!(h.ledger.outcome(0, 2), Some(AckOutcome::Nacked));
    assert_eq!(h.adapter.pending(), 1);

    // the sink retries B and it succeeds
    h.requeue(&["B"]);
    h.execute(2, |_| 200);

    assert_eq!(h.ledger.outcome(0, 1), Some(AckOutcome::Acked));
    assert_eq!(h.adapter.pending(), 0);
    assert!(!h.ledger.has_duplicates());

    assert_eq!(h.engine.stop().await, StopOutcome::Completed);
    let s = h.metrics.snapshot();
    assert_eq!(s.submitted, 3);
    assert_eq!(s.acked, 2);
    assert_eq!(s.nacked, 1);
    assert_eq!(s.retries, 1);
    assert_eq!(s.batch_requests, 4);
    assert_eq!(s.abandoned, 0);
}

#[tokio::test]
async fn test_redelivered_item_reaches_backend_once() {
    let h = harness();
    h.engine.start().await.unwrap();

    h.producer.publish(0, "X").await.unwrap();
    h.producer.publish(0, "X").await.unwrap();
    wait_until(|| h.ledger.acked_count() == 1 && h.sink.queued_len() == 1).await;

    assert_eq!(*h.sink.submits.lock(), 1);
    assert_eq!(h.metrics.snapshot().duplicates, 1);
    assert_eq!(h.ledger.acked_count(), 1);

    h.execute(1, |_| 201);

    assert_eq!(h.ledger.acked_count(), 2);
    assert!(!h.ledger.has_duplicates());
    assert_eq!(h.adapter.pending(), 0);

    h.engine.stop().await;
}

#[tokio::test]
async fn test_every_success_acked_once() {
    const N: usize = 200;
    let h = harness();
    h.engine.start().await.unwrap();

    for i in 0..N {
        h.producer.publish(0, format!("item-{i}")).await.unwrap();
    }
    wait_until(|| h.sink.queued_len() == N).await;

    h.execute(1, |_| 200);

    assert_eq!(h.ledger.acked_count(), N);
    assert_eq!(h.ledger.nacked_count(), 0);
    assert!(!h.ledger.has_duplicates());
    assert_eq!(h.adapter.pending(), 0);

    h.engine.stop().await;
}

#[tokio::test]
async fn test_unresolved_retryable_is_never_settled() {
    let h = harness();
    h.engine.start().await.unwrap();

    h.producer.publish(0, "B").await.unwrap();
    wait_until(|| h.sink.queued_len() == 1).await;
    h.execute(1, |_| 503);

    assert_eq!(h.engine.stop().await, StopOutcome::Completed);

    assert_eq!(h.ledger.settled_count(), 0);
    assert_eq!(h.metrics.snapshot().abandoned, 1);
    assert_eq!(h.adapter.pending(), 0);
}
