//! In-memory ordered log
//!
//! A bounded tokio channel standing in for a partitioned log. The producer
//! half assigns per-partition offsets; the stream half is shared by workers.
//! Every ack/nack lands in the shared `AckLedger`.

use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use async_trait::async_trait;
use tokio::sync::{Mutex, mpsc};
use tokio_util::sync::CancellationToken;
use tracing::debug;

use crate::{AckLedger, AckOutcome, InboundStream, SourceError, SourceMessage};

/// Create a connected producer/stream pair
pub fn memory_log(name: impl Into<String>, capacity: usize) -> (MemoryProducer, MemoryStream) {
    let name = name.into();
    let (tx, rx) = mpsc::channel(capacity.max(1));
    let ledger = AckLedger::new();

    let producer = MemoryProducer {
        name: name.clone(),
        tx,
        offsets: Arc::new(parking_lot::Mutex::new(HashMap::new())),
        ledger: ledger.clone(),
    };
    let stream = MemoryStream {
        name,
        rx: Mutex::new(rx),
        cancel: CancellationToken::new(),
        started: AtomicBool::new(false),
        ledger,
    };
    (producer, stream)
}

/// Writer half of a memory log
#[derive(Clone)]
pub struct MemoryProducer {
    name: String,
    tx: mpsc::Sender<MemoryMessage>,
    offsets: Arc<parking_lot::Mutex<HashMap<i32, i64>>>,
    ledger: AckLedger,
}

impl MemoryProducer {
    /// Append a payload to a partition, returning its offset
    ///
    /// Waits for capacity when the log is full.
    pub async fn publish(&self, partition: i32, payload: impl Into<Vec<u8>>) -> Result<i64, SourceError> {
        let offset = {
            let mut offsets = self.offsets.lock();
            let next = offsets.entry(partition).or_insert(0);
            let offset = *next;
            *next += 1;
            offset
        };

        let message = MemoryMessage {
            partition,
            offset,
            value: payload.into(),
            ledger: self.ledger.clone(),
        };
        self.tx
            .send(message)
            .await
            .map_err(|_| SourceError::Closed(self.name.clone()))?;
        Ok(offset)
    }

    /// Close the writer. The stream ends once buffered messages are read.
    pub fn close(self) {
        drop(self);
    }

    /// Shared acknowledgment ledger
    pub fn ledger(&self) -> &AckLedger {
        &self.ledger
    }
}

/// Reader half of a memory log
pub struct MemoryStream {
    name: String,
    rx: Mutex<mpsc::Receiver<MemoryMessage>>,
    cancel: CancellationToken,
    started: AtomicBool,
    ledger: AckLedger,
}

impl MemoryStream {
    /// Shared acknowledgment ledger
    pub fn ledger(&self) -> &AckLedger {
        &self.ledger
    }

    /// Check if `start` was called
    pub fn is_started(&self) -> bool {
        self.started.load(Ordering::Acquire)
    }
}

#[async_trait]
impl InboundStream for MemoryStream {
    type Message = MemoryMessage;

    fn name(&self) -> &str {
        &self.name
    }

    async fn start(&self) -> Result<(), SourceError> {
        if self.cancel.is_cancelled() {
            return Err(SourceError::Closed(self.name.clone()));
        }
        self.started.store(true, Ordering::Release);
        debug!(stream = %self.name, "memory stream started");
        Ok(())
    }

    async fn stop(&self) {
        self.cancel.cancel();
        debug!(stream = %self.name, "memory stream stopped");
    }

    async fn next_message(&self) -> Option<MemoryMessage> {
        if self.cancel.is_cancelled() {
            return None;
        }
        let mut rx = tokio::select! {
            _ = self.cancel.cancelled() => return None,
            rx = self.rx.lock() => rx,
        };
        tokio::select! {
            _ = self.cancel.cancelled() => None,
            msg = rx.recv() => msg,
        }
    }
}

/// Message read from a memory log
#[derive(Debug)]
pub struct MemoryMessage {
    partition: i32,
    offset: i64,
    value: Vec<u8>,
    ledger: AckLedger,
}

impl MemoryMessage {
    /// Create a detached message recording into the given ledger
    pub fn new(partition: i32, offset: i64, value: impl Into<Vec<u8>>, ledger: AckLedger) -> Self {
        Self {
            partition,
            offset,
            value: value.into(),
            ledger,
        }
    }
}

impl SourceMessage for MemoryMessage {
    fn value(&self) -> &[u8] {
        &self.value
    }

    fn partition(&self) -> i32 {
        self.partition
    }

    fn offset(&self) -> i64 {
        self.offset
    }

    fn ack(self) -> Result<(), SourceError> {
        self.ledger.record(self.partition, self.offset, AckOutcome::Acked);
        Ok(())
    }

    fn nack(self) -> Result<(), SourceError> {
        self.ledger.record(self.partition, self.offset, AckOutcome::Nacked);
        Ok(())
    }
}

#[cfg(test)]
#[path = "memory_test.rs"]
mod memory_test;
