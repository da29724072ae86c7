//! Tests for the file-backed log

use std::io::Write;
use std::time::Duration;

use tempfile::TempDir;

use super::*;

fn write_log(dir: &TempDir, lines: &[&str]) -> PathBuf {
    let path = dir.path().join("events.jsonl");
    let mut contents = lines.join("\n");
    contents.push('\n');
    std::fs::write(&path, contents).unwrap();
    path
}

async fn collect(log: &FileLog) -> Vec<FileMessage> {
    let mut messages = Vec::new();
    while let Ok(Some(msg)) =
        tokio::time::timeout(Duration::from_millis(500), log.next_message()).await
    {
        messages.push(msg);
    }
    messages
}

#[test]
fn test_offset_path_appends_suffix() {
    let config = FileLogConfig::new("events", "/data/events.jsonl");
    assert_eq!(config.offset_path(), PathBuf::from("/data/events.jsonl.offset"));
}

#[test]
fn test_config_defaults() {
    let config = FileLogConfig::new("events", "events.jsonl");
    assert_eq!(config.initial_offset, InitialOffset::Oldest);
    assert!(!config.follow);
    assert!(config.dlq_path.is_none());
    assert_eq!(config.queue_size, DEFAULT_QUEUE_SIZE);
}

#[tokio::test]
async fn test_reads_lines_with_offsets() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["a", "b", "c"]);

    let log = FileLog::new(FileLogConfig::new("events", &path));
    log.start().await.unwrap();

    let messages = collect(&log).await;
    let offsets: Vec<i64> = messages.iter().map(|m| m.offset()).collect();
    assert_eq!(offsets, vec![0, 1, 2]);
    assert_eq!(messages[1].value(), b"b");
    assert!(messages.iter().all(|m| m.partition() == FILE_PARTITION));
}

#[tokio::test]
async fn test_missing_file_fails_start() {
    let dir = TempDir::new().unwrap();
    let log = FileLog::new(FileLogConfig::new("events", dir.path().join("missing.jsonl")));

    let err = log.start().await.unwrap_err();
    assert!(matches!(err, SourceError::Io { .. }));
}

#[tokio::test]
async fn test_stop_commits_contiguous_watermark() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["a", "b", "c", "d"]);
    let config = FileLogConfig::new("events", &path);

    let log = FileLog::new(config.clone());
    log.start().await.unwrap();
    let mut messages = collect(&log).await.into_iter();

    // settle 0, 1 and 3; leave 2 in flight
    messages.next().unwrap().ack().unwrap();
    messages.next().unwrap().nack().unwrap();
    let in_flight = messages.next().unwrap();
    messages.next().unwrap().ack().unwrap();

    log.stop().await;
    assert_eq!(log.watermark(), 2);
    let committed = std::fs::read_to_string(config.offset_path()).unwrap();
    assert_eq!(committed.trim(), "2");
    drop(in_flight);

    // restart redelivers from the first unsettled line
    let log = FileLog::new(config);
    log.start().await.unwrap();
    assert_eq!(log.start_offset(), 2);
    let offsets: Vec<i64> = collect(&log).await.iter().map(|m| m.offset()).collect();
    assert_eq!(offsets, vec![2, 3]);
}

#[tokio::test]
async fn test_nack_appends_to_dead_letter_file() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["good", "bad"]);
    let dlq = dir.path().join("events.dlq");

    let log = FileLog::new(FileLogConfig::new("events", &path).with_dlq_path(&dlq));
    log.start().await.unwrap();
    let mut messages = collect(&log).await.into_iter();

    messages.next().unwrap().ack().unwrap();
    messages.next().unwrap().nack().unwrap();

    assert_eq!(std::fs::read_to_string(&dlq).unwrap(), "bad\n");
    assert_eq!(log.ledger().outcome(FILE_PARTITION, 1), Some(AckOutcome::Nacked));
}

#[tokio::test]
async fn test_dead_letter_failure_leaves_line_unsettled() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["bad"]);
    let dlq = dir.path().join("no-such-dir").join("events.dlq");

    let log = FileLog::new(FileLogConfig::new("events", &path).with_dlq_path(&dlq));
    log.start().await.unwrap();
    let msg = collect(&log).await.pop().unwrap();

    let err = msg.nack().unwrap_err();
    assert!(matches!(err, SourceError::DeadLetter { .. }));
    assert_eq!(log.ledger().settled_count(), 0);
    assert_eq!(log.watermark(), 0);
}

#[tokio::test]
async fn test_newest_skips_existing_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["old-1", "old-2"]);

    let log = FileLog::new(
        FileLogConfig::new("events", &path).with_initial_offset(InitialOffset::Newest),
    );
    log.start().await.unwrap();

    assert_eq!(log.start_offset(), 2);
    assert!(collect(&log).await.is_empty());
}

#[tokio::test]
async fn test_invalid_offset_file_fails_start() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["a"]);
    let config = FileLogConfig::new("events", &path);
    std::fs::write(config.offset_path(), "not-a-number").unwrap();

    let err = FileLog::new(config).start().await.unwrap_err();
    assert!(matches!(err, SourceError::InvalidOffset { .. }));
}

#[tokio::test]
async fn test_blank_lines_advance_watermark() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["a", "", "b"]);

    let log = FileLog::new(FileLogConfig::new("events", &path));
    log.start().await.unwrap();
    let messages = collect(&log).await;
    assert_eq!(messages.len(), 2);
    for msg in messages {
        msg.ack().unwrap();
    }
    assert_eq!(log.watermark(), 3);
}

#[tokio::test]
async fn test_non_utf8_line_is_delivered_raw() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("events.jsonl");
    std::fs::write(&path, b"a\n\xff\xfe\nc\nd\n").unwrap();
    let config = FileLogConfig::new("events", &path);

    let log = FileLog::new(config.clone());
    log.start().await.unwrap();
    let messages = collect(&log).await;

    let offsets: Vec<i64> = messages.iter().map(|m| m.offset()).collect();
    assert_eq!(offsets, vec![0, 1, 2, 3]);
    assert_eq!(messages[1].value(), b"\xff\xfe");
    assert_eq!(messages[3].value(), b"d");
    for msg in messages {
        msg.ack().unwrap();
    }

    log.stop().await;
    let committed = std::fs::read_to_string(config.offset_path()).unwrap();
    assert_eq!(committed.trim(), "4");
}

#[tokio::test]
async fn test_follow_picks_up_appended_lines() {
    let dir = TempDir::new().unwrap();
    let path = write_log(&dir, &["first"]);

    let mut config = FileLogConfig::new("events", &path).with_follow(true);
    config.poll_interval = Duration::from_millis(10);
    let log = FileLog::new(config);
    log.start().await.unwrap();

    let first = log.next_message().await.unwrap();
    assert_eq!(first.value(), b"first");

    {
        let mut file = std::fs::OpenOptions::new().append(true).open(&path).unwrap();
        file.write_all(b"second\n").unwrap();
    }

    let second = tokio::time::timeout(Duration::from_secs(2), log.next_message())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(second.offset(), 1);
    assert_eq!(second.value(), b"second");

    log.stop().await;
    assert!(log.next_message().await.is_none());
}
