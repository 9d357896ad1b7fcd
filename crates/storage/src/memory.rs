//! MemoryStore: in-memory, range-partitioned storage
//!
//! # Design
//!
//! - One shard per partition, each a `BTreeMap<Key, StoredRecord>` behind a
//!   `parking_lot::RwLock`
//! - DashMap from `PartitionId` to shard, so transactions on different
//!   partitions never contend on a shared lock
//! - `AtomicU64` version counter shared by all partitions
//!
//! # Expiration
//!
//! Expired records are filtered at read time, not deleted. The store's
//! [`Clock`] decides what "now" is.

use dashmap::DashMap;
use parking_lot::RwLock;
use partis_core::{
    Clock, Key, PartitionBounds, PartitionId, PartitionMap, StorageFault, StorageResult,
    StoredRecord, SystemClock, Timestamp, Version,
};
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use tracing::debug;

use crate::transaction::MemTransaction;

/// Records of a single partition
#[derive(Debug)]
pub struct PartitionShard {
    pub(crate) id: PartitionId,
    pub(crate) bounds: PartitionBounds,
    pub(crate) data: RwLock<BTreeMap<Key, StoredRecord>>,
}

impl PartitionShard {
    fn new(id: PartitionId, bounds: PartitionBounds) -> Self {
        PartitionShard {
            id,
            bounds,
            data: RwLock::new(BTreeMap::new()),
        }
    }

    /// Number of stored records, tombstones and expired records included
    pub fn len(&self) -> usize {
        self.data.read().len()
    }

    /// Check if shard is empty
    pub fn is_empty(&self) -> bool {
        self.data.read().is_empty()
    }
}

/// In-memory storage engine
///
/// Thread-safe: share it behind an `Arc` and open one [`MemTransaction`] per
/// request.
pub struct MemoryStore {
    map: PartitionMap,
    shards: DashMap<PartitionId, Arc<PartitionShard>>,
    version: AtomicU64,
    clock: Arc<dyn Clock>,
}

impl MemoryStore {
    /// Create a store laid out according to `map`, using the system clock
    pub fn new(map: PartitionMap) -> Self {
        MemoryStore::with_clock(map, Arc::new(SystemClock))
    }

    /// A store with a single partition covering the whole keyspace
    pub fn single() -> Self {
        MemoryStore::new(PartitionMap::single())
    }

    /// Create a store with an explicit clock
    pub fn with_clock(map: PartitionMap, clock: Arc<dyn Clock>) -> Self {
        let shards = DashMap::with_capacity(map.len());
        for (id, bounds) in map.partitions() {
            shards.insert(id, Arc::new(PartitionShard::new(id, bounds.clone())));
        }
        debug!(partitions = map.len(), "memory store created");
        MemoryStore {
            map,
            shards,
            version: AtomicU64::new(0),
            clock,
        }
    }

    /// Partition layout
    pub fn partition_map(&self) -> &PartitionMap {
        &self.map
    }

    /// Highest version assigned so far
    pub fn version(&self) -> Version {
        Version::new(self.version.load(Ordering::Acquire))
    }

    /// Allocate the next version
    ///
    /// Versions are strictly increasing across every partition of the store.
    pub fn next_version(&self) -> Version {
        Version::new(self.version.fetch_add(1, Ordering::AcqRel) + 1)
    }

    /// Current time according to the store's clock
    pub fn now(&self) -> Timestamp {
        self.clock.now()
    }

    /// Shard of a partition
    pub fn shard(&self, partition: PartitionId) -> StorageResult<Arc<PartitionShard>> {
        self.shards
            .get(&partition)
            .map(|entry| Arc::clone(entry.value()))
            .ok_or(StorageFault::UnknownPartition { partition })
    }

    /// Open a transaction against one partition
    pub fn begin(&self, partition: PartitionId) -> StorageResult<MemTransaction<'_>> {
        let shard = self.shard(partition)?;
        Ok(MemTransaction::new(self, shard))
    }

    /// Total stored records across all partitions
    pub fn total_entries(&self) -> usize {
        self.shards.iter().map(|entry| entry.value().len()).sum()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        MemoryStore::single()
    }
}

impl std::fmt::Debug for MemoryStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemoryStore")
            .field("partitions", &self.map.len())
            .field("version", &self.version.load(Ordering::Relaxed))
            .field("total_entries", &self.total_entries())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_versions_strictly_increase() {
        let store = MemoryStore::single();
        assert_eq!(store.version(), Version::ZERO);
        assert_eq!(store.next_version(), Version::new(1));
        assert_eq!(store.next_version(), Version::new(2));
        assert_eq!(store.version(), Version::new(2));
    }

    #[test]
    fn test_concurrent_version_allocation() {
        let store = Arc::new(MemoryStore::single());
        let handles: Vec<_> = (0..4)
            .map(|_| {
                let store = Arc::clone(&store);
                std::thread::spawn(move || {
                    (0..250).map(|_| store.next_version()).collect::<Vec<_>>()
                })
            })
            .collect();
        let mut all: Vec<Version> = handles
            .into_iter()
            .flat_map(|h| h.join().unwrap())
            .collect();
        all.sort();
        all.dedup();
        assert_eq!(all.len(), 1000);
    }

    #[test]
    fn test_shards_follow_partition_map() {
        let map = PartitionMap::from_split_points(vec![Key::parse("m").unwrap()]).unwrap();
        let store = MemoryStore::new(map);
        let p1 = store.shard(PartitionId::new(1)).unwrap();
        assert_eq!(p1.id, PartitionId::new(1));
        assert_eq!(p1.bounds.upper, Some(Key::parse("m").unwrap()));
        assert!(store.shard(PartitionId::new(2)).is_ok());
        assert_eq!(
            store.shard(PartitionId::new(3)).unwrap_err(),
            StorageFault::UnknownPartition {
                partition: PartitionId::new(3)
            }
        );
    }

    #[test]
    fn test_begin_unknown_partition() {
        let store = MemoryStore::single();
        assert!(store.begin(PartitionId::new(9)).is_err());
    }
}
