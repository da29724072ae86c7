//! File-backed ordered log
//!
//! Reads a newline-delimited file where each line is one payload. The line
//! index is the offset (single partition 0).
//!
//! # Offsets
//!
//! On start the log resumes from the committed offset stored next to the
//! file in `<path>.offset`. On stop it persists the contiguous watermark of
//! settled lines: everything before the watermark has been acked or nacked,
//! so anything still in flight is read again after a restart.
//!
//! # Dead letters
//!
//! When `dlq_path` is set, nacked payloads are appended to that file before
//! the nack is recorded. A failed dead-letter write leaves the line unsettled.

use std::io::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::{Mutex, mpsc};
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use crate::{AckLedger, AckOutcome, DEFAULT_QUEUE_SIZE, InboundStream, InitialOffset, SourceError, SourceMessage};

/// Partition reported by every file message
pub const FILE_PARTITION: i32 = 0;

/// Default interval between polls for new lines in follow mode
pub const DEFAULT_POLL_INTERVAL: Duration = Duration::from_millis(200);

/// File log configuration
#[derive(Debug, Clone)]
pub struct FileLogConfig {
    /// Stream name, used in logs
    pub name: String,
    /// Log file to read
    pub path: PathBuf,
    /// Dead-letter file for nacked payloads
    pub dlq_path: Option<PathBuf>,
    /// Start position when nothing is committed yet
    pub initial_offset: InitialOffset,
    /// Keep polling for appended lines at end of file
    pub follow: bool,
    /// Poll interval in follow mode
    pub poll_interval: Duration,
    /// Buffered lines between the reader task and workers
    pub queue_size: usize,
}

impl FileLogConfig {
    /// Create a config for a path with defaults
    pub fn new(name: impl Into<String>, path: impl Into<PathBuf>) -> Self {
        Self {
            name: name.into(),
            path: path.into(),
            dlq_path: None,
            initial_offset: InitialOffset::default(),
            follow: false,
            poll_interval: DEFAULT_POLL_INTERVAL,
            queue_size: DEFAULT_QUEUE_SIZE,
        }
    }

    /// Set the dead-letter file
    pub fn with_dlq_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.dlq_path = Some(path.into());
        self
    }

    /// Set the initial offset
    pub fn with_initial_offset(mut self, initial_offset: InitialOffset) -> Self {
        self.initial_offset = initial_offset;
        self
    }

    /// Enable follow mode
    pub fn with_follow(mut self, follow: bool) -> Self {
        self.follow = follow;
        self
    }

    /// Path of the committed offset file
    pub fn offset_path(&self) -> PathBuf {
        let mut path = self.path.as_os_str().to_owned();
        path.push(".offset");
        PathBuf::from(path)
    }
}

/// State shared between the log and the messages it hands out
#[derive(Debug)]
struct Shared {
    ledger: AckLedger,
    dlq: Option<DeadLetterFile>,
}

#[derive(Debug)]
struct DeadLetterFile {
    path: PathBuf,
    lock: parking_lot::Mutex<()>,
}

impl DeadLetterFile {
    fn append(&self, payload: &[u8]) -> Result<(), SourceError> {
        let _guard = self.lock.lock();
        let mut file = std::fs::OpenOptions::new()
            .create(true)
            .append(true)
            .open(&self.path)
            .map_err(|e| SourceError::dead_letter(self.path.display().to_string(), e))?;
        file.write_all(payload)
            .and_then(|_| file.write_all(b"\n"))
            .map_err(|e| SourceError::dead_letter(self.path.display().to_string(), e))
    }
}

/// Newline-delimited file log
pub struct FileLog {
    config: FileLogConfig,
    shared: Arc<Shared>,
    tx: parking_lot::Mutex<Option<mpsc::Sender<FileMessage>>>,
    rx: Mutex<mpsc::Receiver<FileMessage>>,
    reader: parking_lot::Mutex<Option<JoinHandle<()>>>,
    start_offset: AtomicI64,
    cancel: CancellationToken,
}

impl FileLog {
    /// Create a file log. Nothing is opened until `start`.
    pub fn new(config: FileLogConfig) -> Self {
        let (tx, rx) = mpsc::channel(config.queue_size.max(1));
        let dlq = config.dlq_path.clone().map(|path| DeadLetterFile {
            path,
            lock: parking_lot::Mutex::new(()),
        });

        Self {
            shared: Arc::new(Shared {
                ledger: AckLedger::new(),
                dlq,
            }),
            tx: parking_lot::Mutex::new(Some(tx)),
            rx: Mutex::new(rx),
            reader: parking_lot::Mutex::new(None),
            start_offset: AtomicI64::new(0),
            cancel: CancellationToken::new(),
            config,
        }
    }

    /// Acknowledgment ledger for lines read by this log
    pub fn ledger(&self) -> &AckLedger {
        &self.shared.ledger
    }

    /// Offset the log resumed from
    pub fn start_offset(&self) -> i64 {
        self.start_offset.load(Ordering::Acquire)
    }

    /// Current contiguous watermark of settled lines
    pub fn watermark(&self) -> i64 {
        self.shared.ledger.watermark(FILE_PARTITION, self.start_offset())
    }

    /// Persist the current watermark to the offset file
    pub async fn commit(&self) -> Result<i64, SourceError> {
        let watermark = self.watermark();
        let path = self.config.offset_path();
        tokio::fs::write(&path, format!("{watermark}\n"))
            .await
            .map_err(|e| SourceError::io(path.display().to_string(), e))?;
        Ok(watermark)
    }

    /// Read the committed offset, if one was persisted
    pub async fn committed_offset(&self) -> Result<Option<i64>, SourceError> {
        read_offset_file(&self.config.offset_path()).await
    }

    async fn resolve_start_offset(&self) -> Result<i64, SourceError> {
        if let Some(offset) = self.committed_offset().await? {
            return Ok(offset);
        }
        match self.config.initial_offset {
            InitialOffset::Oldest => Ok(0),
            InitialOffset::Newest => {
                let contents = tokio::fs::read(&self.config.path)
                    .await
                    .map_err(|e| SourceError::io(self.config.path.display().to_string(), e))?;
                Ok(contents.iter().filter(|b| **b == b'\n').count() as i64)
            }
        }
    }
}

#[async_trait]
impl InboundStream for FileLog {
    type Message = FileMessage;

    fn name(&self) -> &str {
        &self.config.name
    }

    async fn start(&self) -> Result<(), SourceError> {
        if self.cancel.is_cancelled() {
            return Err(SourceError::Closed(self.config.name.clone()));
        }
        if self.tx.lock().is_none() {
            // Already started
            return Ok(());
        }

        let file = tokio::fs::File::open(&self.config.path)
            .await
            .map_err(|e| SourceError::io(self.config.path.display().to_string(), e))?;
        let start_offset = self.resolve_start_offset().await?;

        let Some(tx) = self.tx.lock().take() else {
            return Ok(());
        };
        self.start_offset.store(start_offset, Ordering::Release);

        info!(
            stream = %self.config.name,
            path = %self.config.path.display(),
            start_offset,
            follow = self.config.follow,
            "file log started"
        );

        let reader = LineReader {
            name: self.config.name.clone(),
            path: self.config.path.clone(),
            start_offset,
            follow: self.config.follow,
            poll_interval: self.config.poll_interval,
            shared: Arc::clone(&self.shared),
            tx,
            cancel: self.cancel.child_token(),
        };
        let handle = tokio::spawn(reader.run(BufReader::new(file)));
        *self.reader.lock() = Some(handle);
        Ok(())
    }

    async fn stop(&self) {
        self.cancel.cancel();
        self.tx.lock().take();

        let handle = self.reader.lock().take();
        let Some(handle) = handle else {
            return;
        };
        if let Err(e) = handle.await {
            warn!(stream = %self.config.name, error = %e, "file reader task failed");
        }

        match self.commit().await {
            Ok(watermark) => {
                info!(stream = %self.config.name, watermark, "file log stopped");
            }
            Err(e) => {
                warn!(stream = %self.config.name, error = %e, "failed to commit offset");
            }
        }
    }

    async fn next_message(&self) -> Option<FileMessage> {
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

/// Reader task feeding lines into the worker channel
struct LineReader {
    name: String,
    path: PathBuf,
    start_offset: i64,
    follow: bool,
    poll_interval: Duration,
    shared: Arc<Shared>,
    tx: mpsc::Sender<FileMessage>,
    cancel: CancellationToken,
}

impl LineReader {
    async fn run(self, mut reader: BufReader<tokio::fs::File>) {
        let mut offset: i64 = 0;
        let mut line = Vec::new();

        loop {
            // raw bytes: a line that is not UTF-8 still reaches the decoder
            let read = tokio::select! {
                _ = self.cancel.cancelled() => break,
                read = reader.read_until(b'\n', &mut line) => read,
            };
            let n = match read {
                Ok(n) => n,
                Err(e) => {
                    warn!(stream = %self.name, path = %self.path.display(), error = %e, "failed to read log");
                    break;
                }
            };

            if n > 0 && line.ends_with(b"\n") {
                if !self.emit(offset, &line).await {
                    break;
                }
                offset += 1;
                line.clear();
                continue;
            }
            if n > 0 {
                // Partial line, wait for the rest
                continue;
            }

            // End of file
            if !self.follow {
                if !line.is_empty() {
                    self.emit(offset, &line).await;
                }
                break;
            }
            tokio::select! {
                _ = self.cancel.cancelled() => break,
                _ = tokio::time::sleep(self.poll_interval) => {}
            }
        }
        debug!(stream = %self.name, lines = offset, "file reader finished");
    }

    /// Send one line; returns false once nobody is receiving
    async fn emit(&self, offset: i64, line: &[u8]) -> bool {
        if offset < self.start_offset {
            return true;
        }
        let end = line
            .iter()
            .rposition(|b| !matches!(b, b'\n' | b'\r'))
            .map_or(0, |i| i + 1);
        let payload = &line[..end];
        if payload.iter().all(u8::is_ascii_whitespace) {
            // Blank lines carry nothing but still advance the watermark
            self.shared.ledger.record(FILE_PARTITION, offset, AckOutcome::Acked);
            return true;
        }

        let message = FileMessage {
            offset,
            value: payload.to_vec(),
            shared: Arc::clone(&self.shared),
        };
        tokio::select! {
            _ = self.cancel.cancelled() => false,
            sent = self.tx.send(message) => sent.is_ok(),
        }
    }
}

/// Line read from a file log
#[derive(Debug)]
pub struct FileMessage {
    offset: i64,
    value: Vec<u8>,
    shared: Arc<Shared>,
}

impl SourceMessage for FileMessage {
    fn value(&self) -> &[u8] {
        &self.value
    }

    fn partition(&self) -> i32 {
        FILE_PARTITION
    }

    fn offset(&self) -> i64 {
        self.offset
    }

    fn ack(self) -> Result<(), SourceError> {
        self.shared
            .ledger
            .record(FILE_PARTITION, self.offset, AckOutcome::Acked);
        Ok(())
    }

    fn nack(self) -> Result<(), SourceError> {
        if let Some(dlq) = &self.shared.dlq {
            dlq.append(&self.value)?;
        }
        self.shared
            .ledger
            .record(FILE_PARTITION, self.offset, AckOutcome::Nacked);
        Ok(())
    }
}

async fn read_offset_file(path: &Path) -> Result<Option<i64>, SourceError> {
    match tokio::fs::read_to_string(path).await {
        Ok(contents) => {
            let value = contents.trim();
            value
                .parse::<i64>()
                .ok()
                .filter(|offset| *offset >= 0)
                .map(Some)
                .ok_or_else(|| SourceError::InvalidOffset {
                    path: path.display().to_string(),
                    value: value.to_string(),
                })
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(SourceError::io(path.display().to_string(), e)),
    }
}

#[cfg(test)]
#[path = "file_test.rs"]
mod file_test;
