//! Tests for the in-memory log

use std::sync::Arc;
use std::time::Duration;

use super::*;

#[tokio::test]
async fn test_publish_assigns_per_partition_offsets() {
    let (producer, stream) = memory_log("events", 16);
    stream.start().await.unwrap();

    assert_eq!(producer.publish(0, "a").await.unwrap(), 0);
    assert_eq!(producer.publish(0, "b").await.unwrap(), 1);
    assert_eq!(producer.publish(1, "c").await.unwrap(), 0);

    let first = stream.next_message().await.unwrap();
    assert_eq!((first.partition(), first.offset()), (0, 0));
    assert_eq!(first.value(), b"a");

    let second = stream.next_message().await.unwrap();
    assert_eq!((second.partition(), second.offset()), (0, 1));

    let third = stream.next_message().await.unwrap();
    assert_eq!((third.partition(), third.offset()), (1, 0));
}

#[tokio::test]
async fn test_ack_and_nack_recorded_in_ledger() {
    let (producer, stream) = memory_log("events", 16);
    stream.start().await.unwrap();
    producer.publish(0, "a").await.unwrap();
    producer.publish(0, "b").await.unwrap();

    stream.next_message().await.unwrap().ack().unwrap();
    stream.next_message().await.unwrap().nack().unwrap();

    let ledger = stream.ledger();
    assert_eq!(ledger.outcome(0, 0), Some(AckOutcome::Acked));
    assert_eq!(ledger.outcome(0, 1), Some(AckOutcome::Nacked));
    assert_eq!(producer.ledger().settled_count(), 2);
}

#[tokio::test]
async fn test_stream_ends_when_producer_closed() {
    let (producer, stream) = memory_log("events", 16);
    stream.start().await.unwrap();
    producer.publish(0, "last").await.unwrap();
    producer.close();

    assert!(stream.next_message().await.is_some());
    assert!(stream.next_message().await.is_none());
}

#[tokio::test]
async fn test_stop_unblocks_waiting_readers() {
    let (_producer, stream) = memory_log("events", 16);
    let stream = Arc::new(stream);
    stream.start().await.unwrap();

    let reader = {
        let stream = Arc::clone(&stream);
        tokio::spawn(async move { stream.next_message().await.is_none() })
    };

    tokio::time::sleep(Duration::from_millis(20)).await;
    stream.stop().await;

    let ended = tokio::time::timeout(Duration::from_secs(1), reader)
        .await
        .expect("reader should return after stop")
        .unwrap();
    assert!(ended);
}

#[tokio::test]
async fn test_start_after_stop_fails() {
    let (_producer, stream) = memory_log("events", 16);
    stream.stop().await;

    let err = stream.start().await.unwrap_err();
    assert!(matches!(err, SourceError::Closed(name) if name == "events"));
    assert!(!stream.is_started());
}

#[tokio::test]
async fn test_publish_after_stream_dropped_fails() {
    let (producer, stream) = memory_log("events", 16);
    drop(stream);

    let err = producer.publish(0, "x").await.unwrap_err();
    assert!(matches!(err, SourceError::Closed(_)));
}

#[tokio::test]
async fn test_concurrent_readers_each_message_once() {
    let (producer, stream) = memory_log("events", 128);
    let stream = Arc::new(stream);
    stream.start().await.unwrap();

    for i in 0..100 {
        producer.publish(0, format!("m{i}")).await.unwrap();
    }
    producer.close();

    let mut readers = Vec::new();
    for _ in 0..4 {
        let stream = Arc::clone(&stream);
        readers.push(tokio::spawn(async move {
            let mut n = 0;
            while let Some(msg) = stream.next_message().await {
                msg.ack().unwrap();
                n += 1;
            }
            n
        }));
    }

    let mut total = 0;
    for reader in readers {
        total += reader.await.unwrap();
    }
    assert_eq!(total, 100);
    assert_eq!(stream.ledger().acked_count(), 100);
    assert!(!stream.ledger().has_duplicates());
}
