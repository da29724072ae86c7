//! Tests for the dispatch table

use std::sync::Arc;
use std::sync::Barrier;
use std::sync::atomic::{AtomicUsize, Ordering};

use super::*;

fn key(s: &str) -> IdentityKey {
    IdentityKey::new(s)
}

#[test]
fn test_insert_then_duplicate() {
    let table = DispatchTable::new(16);

    assert_eq!(
        table.put_if_absent(key("a"), 1, |_, _, _| panic!("not a duplicate")),
        PutOutcome::Inserted
    );

    let mut seen = None;
    let outcome = table.put_if_absent(key("a"), 2, |k, existing, rejected| {
        seen = Some((k.clone(), *existing, rejected));
    });

    assert_eq!(outcome, PutOutcome::Duplicate);
    assert_eq!(seen, Some((key("a"), 1, 2)));
    // existing entry untouched
    assert_eq!(table.get(&key("a"), |v| *v), Some(1));
    assert_eq!(table.len(), 1);
}

#[test]
fn test_get_contains_remove() {
    let table = DispatchTable::new(4);
    table.put_if_absent(key("x"), "value".to_string(), |_, _, _| {});

    assert!(table.contains(&key("x")));
    assert_eq!(table.get(&key("x"), |v| v.len()), Some(5));
    assert_eq!(table.get(&key("y"), |v| v.len()), None);

    assert_eq!(table.remove(&key("x")), Some("value".to_string()));
    assert_eq!(table.remove(&key("x")), None);
    assert!(!table.contains(&key("x")));
    assert!(table.is_empty());
}

#[test]
fn test_zero_shards_clamped_to_one() {
    let table: DispatchTable<u32> = DispatchTable::new(0);
    assert_eq!(table.shard_count(), 1);

    table.put_if_absent(key("a"), 1, |_, _, _| {});
    table.put_if_absent(key("b"), 2, |_, _, _| {});
    assert_eq!(table.len(), 2);
}

#[test]
fn test_shard_index_is_deterministic() {
    let a: DispatchTable<()> = DispatchTable::new(1024);
    let b: DispatchTable<()> = DispatchTable::new(1024);

    for i in 0..100 {
        let k = IdentityKey::from_location(0, i);
        assert_eq!(a.shard_index(&k), b.shard_index(&k));
        assert!(a.shard_index(&k) < 1024);
    }
}

#[test]
fn test_keys_spread_across_shards() {
    let table: DispatchTable<()> = DispatchTable::new(8);
    let used: std::collections::HashSet<usize> = (0..200)
        .map(|i| table.shard_index(&IdentityKey::from_location(0, i)))
        .collect();
    assert!(used.len() > 1);
}

#[test]
fn test_drain_empties_table() {
    let table = DispatchTable::new(8);
    for i in 0..50 {
        table.put_if_absent(IdentityKey::from_location(1, i), i, |_, _, _| {});
    }

    let mut drained = table.drain();
    drained.sort_by_key(|(_, v)| *v);

    assert_eq!(drained.len(), 50);
    assert_eq!(drained[0].1, 0);
    assert_eq!(drained[49].0, IdentityKey::from_location(1, 49));
    assert!(table.is_empty());
}

#[test]
fn test_concurrent_put_same_key_inserts_once() {
    const THREADS: usize = 16;

    let table = Arc::new(DispatchTable::new(64));
    let duplicates = Arc::new(AtomicUsize::new(0));
    let inserts = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    std::thread::scope(|s| {
        for t in 0..THREADS {
            let table = Arc::clone(&table);
            let duplicates = Arc::clone(&duplicates);
            let inserts = Arc::clone(&inserts);
            let barrier = Arc::clone(&barrier);
            s.spawn(move || {
                barrier.wait();
                let outcome = table.put_if_absent(key("shared"), t, |_, _, _| {
                    duplicates.fetch_add(1, Ordering::SeqCst);
                });
                if outcome == PutOutcome::Inserted {
                    inserts.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(inserts.load(Ordering::SeqCst), 1);
    assert_eq!(duplicates.load(Ordering::SeqCst), THREADS - 1);
    assert_eq!(table.len(), 1);
}

#[test]
fn test_concurrent_remove_single_winner() {
    const THREADS: usize = 8;

    let table = Arc::new(DispatchTable::new(4));
    table.put_if_absent(key("k"), 7, |_, _, _| {});
    let winners = Arc::new(AtomicUsize::new(0));
    let barrier = Arc::new(Barrier::new(THREADS));

    std::thread::scope(|s| {
        for _ in 0..THREADS {
            let table = Arc::clone(&table);
            let winners = Arc::clone(&winners);
            let barrier = Arc::clone(&barrier);
            s.spawn(move || {
                barrier.wait();
                if table.remove(&key("k")).is_some() {
                    winners.fetch_add(1, Ordering::SeqCst);
                }
            });
        }
    });

    assert_eq!(winners.load(Ordering::SeqCst), 1);
}

#[test]
fn test_concurrent_distinct_keys() {
    let table = Arc::new(DispatchTable::new(32));

    std::thread::scope(|s| {
        for t in 0..8i32 {
            let table = Arc::clone(&table);
            s.spawn(move || {
                for offset in 0..250 {
                    let outcome =
                        table.put_if_absent(IdentityKey::from_location(t, offset), (), |_, _, _| {});
                    assert_eq!(outcome, PutOutcome::Inserted);
                }
            });
        }
    });

    assert_eq!(table.len(), 2000);
}
