//! Integration tests for MemoryStore
//!
//! Random workloads are checked against a plain `BTreeMap` model:
//! - committed writes are visible, aborted ones vanish
//! - scans walk each partition in key order in both directions
//! - partitions can be written concurrently

use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use std::thread;

use partis_core::{
    Key, PartitionId, PartitionMap, ScanOrder, StorageFault, Timestamp, Transaction,
};
use partis_storage::MemoryStore;
use proptest::prelude::*;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

// ============================================================================
// Helper Functions
// ============================================================================

fn key(path: &str) -> Key {
    Key::parse(path).unwrap()
}

fn split_store() -> MemoryStore {
    MemoryStore::new(PartitionMap::from_split_points(vec![key("h"), key("p")]).unwrap())
}

fn random_key(rng: &mut StdRng) -> Key {
    let depth = rng.gen_range(1..=3);
    let components: Vec<String> = (0..depth)
        .map(|_| {
            let c = rng.gen_range(b'a'..=b'z') as char;
            c.to_string()
        })
        .collect();
    Key::new(components).unwrap()
}

/// Every live key of `partition`, walked one `scan_next` at a time
fn walk(store: &MemoryStore, partition: PartitionId, order: ScanOrder) -> Vec<Key> {
    let mut txn = store.begin(partition).unwrap();
    let mut out = Vec::new();
    let mut last: Option<Key> = None;
    loop {
        let next = match (order, last.as_ref()) {
            (_, None) => txn.scan_next(Bound::Unbounded, Bound::Unbounded, order),
            (ScanOrder::Ascending, Some(k)) => {
                txn.scan_next(Bound::Excluded(k), Bound::Unbounded, order)
            }
            (ScanOrder::Descending, Some(k)) => {
                txn.scan_next(Bound::Unbounded, Bound::Excluded(k), order)
            }
        };
        match next.unwrap() {
            Some((k, _)) => {
                out.push(k.clone());
                last = Some(k);
            }
            None => return out,
        }
    }
}

// ============================================================================
// Randomized Model Tests
// ============================================================================

#[test]
fn test_random_workload_matches_model() {
    let store = split_store();
    let mut model: BTreeMap<Key, Vec<u8>> = BTreeMap::new();
    let mut rng = StdRng::seed_from_u64(0x5eed);

    for round in 0..200 {
        let k = random_key(&mut rng);
        let partition = store.partition_map().partition_for(&k);
        let mut txn = store.begin(partition).unwrap();
        let mut staged = model.clone();

        match rng.gen_range(0..3) {
            0 => {
                let value = vec![round as u8; rng.gen_range(0..8)];
                txn.put(&k, value.clone(), Timestamp::NEVER).unwrap();
                staged.insert(k.clone(), value);
            }
            1 => {
                let removed = txn.delete(&k).unwrap();
                assert_eq!(removed.map(|r| r.value), staged.remove(&k));
            }
            _ => {
                assert_eq!(txn.get(&k).unwrap().map(|r| r.value), staged.get(&k).cloned());
            }
        }

        if rng.gen_bool(0.8) {
            txn.commit().unwrap();
            model = staged;
        } else {
            txn.abort();
        }
    }

    assert_eq!(store.total_entries(), model.len());
    for (id, bounds) in store.partition_map().partitions() {
        let expected: Vec<Key> = model.keys().filter(|k| bounds.contains(k)).cloned().collect();
        assert_eq!(walk(&store, id, ScanOrder::Ascending), expected);
        let mut reversed = expected;
        reversed.reverse();
        assert_eq!(walk(&store, id, ScanOrder::Descending), reversed);
    }
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    #[test]
    fn prop_ascending_walk_is_sorted_and_complete(
        paths in prop::collection::btree_set("[a-z]{1,2}(/[a-z]{1,2}){0,2}", 0..24)
    ) {
        let store = MemoryStore::single();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        for path in &paths {
            txn.put(&key(path), Vec::new(), Timestamp::NEVER).unwrap();
        }
        txn.commit().unwrap();

        let expected: std::collections::BTreeSet<Key> = paths.iter().map(|p| key(p)).collect();
        let walked = walk(&store, PartitionId::new(1), ScanOrder::Ascending);
        prop_assert_eq!(walked, expected.into_iter().collect::<Vec<_>>());
    }
}

// ============================================================================
// Boundaries
// ============================================================================

#[test]
fn test_partition_boundaries_are_enforced() {
    let store = split_store();
    let mut txn = store.begin(PartitionId::new(2)).unwrap();
    txn.put(&key("h"), b"x".to_vec(), Timestamp::NEVER).unwrap();
    txn.put(&key("o/z"), b"x".to_vec(), Timestamp::NEVER).unwrap();
    assert!(matches!(
        txn.put(&key("p"), b"x".to_vec(), Timestamp::NEVER),
        Err(StorageFault::KeyOutsidePartition { .. })
    ));
    assert!(matches!(
        txn.put_tombstone(&key("g/z")),
        Err(StorageFault::KeyOutsidePartition { .. })
    ));
    txn.commit().unwrap();

    assert_eq!(store.shard(PartitionId::new(2)).unwrap().len(), 2);
    assert!(store.shard(PartitionId::new(1)).unwrap().is_empty());
}

// ============================================================================
// Concurrency
// ============================================================================

#[test]
fn test_partitions_written_concurrently() {
    let store = Arc::new(split_store());
    let handles: Vec<_> = ["a", "i", "q"]
        .into_iter()
        .map(|prefix| {
            let store = Arc::clone(&store);
            thread::spawn(move || {
                let partition = store.partition_map().partition_for(&key(prefix));
                for i in 0..100 {
                    let mut txn = store.begin(partition).unwrap();
                    txn.put(
                        &key(&format!("{}/{:03}", prefix, i)),
                        vec![i as u8],
                        Timestamp::NEVER,
                    )
                    .unwrap();
                    txn.commit().unwrap();
                }
            })
        })
        .collect();
    for handle in handles {
        handle.join().unwrap();
    }

    assert_eq!(store.total_entries(), 300);
    assert_eq!(store.version().as_u64(), 300);
    for id in 1..=3 {
        assert_eq!(walk(&store, PartitionId::new(id), ScanOrder::Ascending).len(), 100);
    }
}
