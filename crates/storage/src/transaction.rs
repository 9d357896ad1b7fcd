//! Transactions over a MemoryStore partition
//!
//! Writes are applied to the shard immediately and recorded in an undo log.
//! `commit` discards the log; `abort` (or dropping the transaction without
//! committing) replays it in reverse, restoring every touched key.
//!
//! There is no isolation between concurrent transactions on the same
//! partition. Each individual call takes the shard lock only for its own
//! duration.

use partis_core::{
    Key, PartitionBounds, PartitionId, ScanOrder, StorageFault, StorageResult, StoredRecord,
    Timestamp, Transaction,
};
use std::collections::BTreeMap;
use std::ops::Bound;
use std::sync::Arc;
use tracing::{debug, trace};

use crate::memory::{MemoryStore, PartitionShard};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum TxnState {
    Active,
    Committed,
    Aborted,
}

/// A transaction scoped to one partition of a [`MemoryStore`]
pub struct MemTransaction<'a> {
    store: &'a MemoryStore,
    shard: Arc<PartitionShard>,
    undo: Vec<(Key, Option<StoredRecord>)>,
    state: TxnState,
}

impl<'a> MemTransaction<'a> {
    pub(crate) fn new(store: &'a MemoryStore, shard: Arc<PartitionShard>) -> Self {
        MemTransaction {
            store,
            shard,
            undo: Vec::new(),
            state: TxnState::Active,
        }
    }

    /// Make every write permanent
    pub fn commit(mut self) -> StorageResult<()> {
        self.ensure_active()?;
        trace!(partition = %self.shard.id, writes = self.undo.len(), "commit");
        self.undo.clear();
        self.state = TxnState::Committed;
        Ok(())
    }

    /// Undo every write made through this transaction
    pub fn abort(mut self) {
        self.rollback();
    }

    /// Number of writes made so far
    pub fn write_count(&self) -> usize {
        self.undo.len()
    }

    fn rollback(&mut self) {
        if self.state != TxnState::Active {
            return;
        }
        if !self.undo.is_empty() {
            debug!(partition = %self.shard.id, writes = self.undo.len(), "rolling back");
            let mut data = self.shard.data.write();
            for (key, previous) in self.undo.drain(..).rev() {
                match previous {
                    Some(record) => {
                        data.insert(key, record);
                    }
                    None => {
                        data.remove(&key);
                    }
                }
            }
        }
        self.state = TxnState::Aborted;
    }

    fn ensure_active(&self) -> StorageResult<()> {
        match self.state {
            TxnState::Active => Ok(()),
            _ => Err(StorageFault::Closed),
        }
    }

    fn ensure_owned(&self, key: &Key) -> StorageResult<()> {
        if self.shard.bounds.contains(key) {
            Ok(())
        } else {
            Err(StorageFault::KeyOutsidePartition {
                key: key.to_string(),
                partition: self.shard.id,
            })
        }
    }

    fn write(&mut self, key: &Key, record: StoredRecord) -> StoredRecord {
        let previous = self.shard.data.write().insert(key.clone(), record.clone());
        self.undo.push((key.clone(), previous));
        record
    }

    fn live(&self, record: &StoredRecord, now: Timestamp) -> bool {
        !record.is_expired_at(now)
    }
}

impl Drop for MemTransaction<'_> {
    fn drop(&mut self) {
        self.rollback();
    }
}

impl Transaction for MemTransaction<'_> {
    fn partition(&self) -> PartitionId {
        self.shard.id
    }

    fn bounds(&self) -> &PartitionBounds {
        &self.shard.bounds
    }

    fn get(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>> {
        self.ensure_active()?;
        self.ensure_owned(key)?;
        let now = self.store.now();
        let data = self.shard.data.read();
        Ok(data.get(key).filter(|r| self.live(r, now)).cloned())
    }

    fn put(
        &mut self,
        key: &Key,
        value: Vec<u8>,
        expiration: Timestamp,
    ) -> StorageResult<StoredRecord> {
        self.ensure_active()?;
        self.ensure_owned(key)?;
        let storage_size = (key.byte_len() + value.len()) as u64;
        let record = StoredRecord {
            value,
            version: self.store.next_version(),
            expiration_time: expiration,
            modification_time: self.store.now(),
            storage_size,
            tombstone: false,
        };
        Ok(self.write(key, record))
    }

    fn put_tombstone(&mut self, key: &Key) -> StorageResult<StoredRecord> {
        self.ensure_active()?;
        self.ensure_owned(key)?;
        let record = StoredRecord {
            value: Vec::new(),
            version: self.store.next_version(),
            expiration_time: Timestamp::NEVER,
            modification_time: self.store.now(),
            storage_size: key.byte_len() as u64,
            tombstone: true,
        };
        Ok(self.write(key, record))
    }

    fn delete(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>> {
        self.ensure_active()?;
        self.ensure_owned(key)?;
        let now = self.store.now();
        let removed = self.shard.data.write().remove(key);
        match removed {
            Some(record) => {
                self.undo.push((key.clone(), Some(record.clone())));
                Ok(Some(record).filter(|r| self.live(r, now)))
            }
            None => Ok(None),
        }
    }

    fn scan_next(
        &mut self,
        lower: Bound<&Key>,
        upper: Bound<&Key>,
        order: ScanOrder,
    ) -> StorageResult<Option<(Key, StoredRecord)>> {
        self.ensure_active()?;
        if is_empty_interval(lower, upper) {
            return Ok(None);
        }
        let now = self.store.now();
        let data = self.shard.data.read();
        let found = first_live(&data, (lower, upper), order, now);
        Ok(found.map(|(k, r)| (k.clone(), r.clone())))
    }
}

fn first_live<'m>(
    data: &'m BTreeMap<Key, StoredRecord>,
    range: (Bound<&Key>, Bound<&Key>),
    order: ScanOrder,
    now: Timestamp,
) -> Option<(&'m Key, &'m StoredRecord)> {
    let mut iter = data
        .range::<Key, _>(range)
        .filter(|(_, r)| !r.is_expired_at(now));
    match order {
        ScanOrder::Ascending => iter.next(),
        ScanOrder::Descending => iter.next_back(),
    }
}

/// `BTreeMap::range` panics on inverted bounds and on `(Excluded(k), Excluded(k))`
fn is_empty_interval(lower: Bound<&Key>, upper: Bound<&Key>) -> bool {
    match (lower, upper) {
        (
            Bound::Included(l) | Bound::Excluded(l),
            Bound::Included(u) | Bound::Excluded(u),
        ) => {
            let both_inclusive =
                matches!(lower, Bound::Included(_)) && matches!(upper, Bound::Included(_));
            l > u || (l == u && !both_inclusive)
        }
        _ => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partis_core::{ManualClock, PartitionMap, Version};
    use std::time::Duration;

    fn key(path: &str) -> Key {
        Key::parse(path).unwrap()
    }

    fn split_store() -> MemoryStore {
        MemoryStore::new(PartitionMap::from_split_points(vec![key("m")]).unwrap())
    }

    fn ascending(txn: &mut MemTransaction<'_>) -> Vec<String> {
        let mut out = Vec::new();
        let mut lower_key: Option<Key> = None;
        loop {
            let lower = lower_key.as_ref().map_or(Bound::Unbounded, Bound::Excluded);
            match txn.scan_next(lower, Bound::Unbounded, ScanOrder::Ascending).unwrap() {
                Some((k, _)) => {
                    out.push(k.to_string());
                    lower_key = Some(k);
                }
                None => return out,
            }
        }
    }

    #[test]
    fn test_put_get() {
        let store = MemoryStore::single();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        let written = txn.put(&key("a/b"), b"hello".to_vec(), Timestamp::NEVER).unwrap();
        assert_eq!(written.version, Version::new(1));
        assert_eq!(written.storage_size, 3 + 5);
        let read = txn.get(&key("a/b")).unwrap().unwrap();
        assert_eq!(read, written);
        txn.commit().unwrap();
    }

    #[test]
    fn test_overwrite_gets_newer_version() {
        let store = MemoryStore::single();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        let v1 = txn.put(&key("a"), b"1".to_vec(), Timestamp::NEVER).unwrap().version;
        let v2 = txn.put(&key("a"), b"2".to_vec(), Timestamp::NEVER).unwrap().version;
        assert!(v2 > v1);
    }

    #[test]
    fn test_rejects_foreign_key() {
        let store = split_store();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        let err = txn.put(&key("z"), Vec::new(), Timestamp::NEVER).unwrap_err();
        assert!(matches!(err, StorageFault::KeyOutsidePartition { .. }));
        assert!(txn.get(&key("m")).is_err());
        assert!(txn.get(&key("l/zz")).is_ok());
    }

    #[test]
    fn test_abort_restores_previous_state() {
        let store = MemoryStore::single();
        let mut setup = store.begin(PartitionId::new(1)).unwrap();
        setup.put(&key("a"), b"old".to_vec(), Timestamp::NEVER).unwrap();
        setup.commit().unwrap();

        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        txn.put(&key("a"), b"new".to_vec(), Timestamp::NEVER).unwrap();
        txn.put(&key("b"), b"x".to_vec(), Timestamp::NEVER).unwrap();
        txn.put_tombstone(&key("a")).unwrap();
        assert_eq!(txn.write_count(), 3);
        txn.abort();

        let mut check = store.begin(PartitionId::new(1)).unwrap();
        assert_eq!(check.get(&key("a")).unwrap().unwrap().value, b"old");
        assert!(check.get(&key("b")).unwrap().is_none());
    }

    #[test]
    fn test_drop_without_commit_rolls_back() {
        let store = MemoryStore::single();
        {
            let mut txn = store.begin(PartitionId::new(1)).unwrap();
            txn.put(&key("a"), b"x".to_vec(), Timestamp::NEVER).unwrap();
        }
        assert_eq!(store.total_entries(), 0);
    }

    #[test]
    fn test_delete_restored_on_abort() {
        let store = MemoryStore::single();
        let mut setup = store.begin(PartitionId::new(1)).unwrap();
        setup.put(&key("a"), b"x".to_vec(), Timestamp::NEVER).unwrap();
        setup.commit().unwrap();

        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        assert!(txn.delete(&key("a")).unwrap().is_some());
        assert!(txn.delete(&key("a")).unwrap().is_none());
        txn.abort();
        assert_eq!(store.total_entries(), 1);
    }

    #[test]
    fn test_tombstone_is_visible() {
        let store = MemoryStore::single();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        txn.put_tombstone(&key("a")).unwrap();
        let record = txn.get(&key("a")).unwrap().unwrap();
        assert!(record.tombstone);
        assert!(record.value.is_empty());
    }

    #[test]
    fn test_expired_records_hidden() {
        let clock = Arc::new(ManualClock::new(Timestamp::from_secs(100)));
        let store = MemoryStore::with_clock(PartitionMap::single(), clock.clone());
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        txn.put(&key("a"), b"x".to_vec(), Timestamp::from_secs(101)).unwrap();
        txn.put(&key("b"), b"y".to_vec(), Timestamp::NEVER).unwrap();
        assert!(txn.get(&key("a")).unwrap().is_some());

        clock.advance(Duration::from_secs(1));
        assert!(txn.get(&key("a")).unwrap().is_none());
        assert_eq!(ascending(&mut txn), vec!["b"]);
        assert!(txn.delete(&key("a")).unwrap().is_none());
    }

    #[test]
    fn test_scan_order_and_bounds() {
        let store = MemoryStore::single();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        for path in ["ab", "a/c/d", "a", "a/b", "a/c"] {
            txn.put(&key(path), Vec::new(), Timestamp::NEVER).unwrap();
        }
        assert_eq!(ascending(&mut txn), vec!["a", "a/b", "a/c", "a/c/d", "ab"]);

        let a = key("a");
        let end = a.subtree_end().unwrap();
        let last = txn
            .scan_next(Bound::Excluded(&a), Bound::Excluded(&end), ScanOrder::Descending)
            .unwrap()
            .unwrap();
        assert_eq!(last.0, key("a/c/d"));
    }

    #[test]
    fn test_scan_empty_intervals_do_not_panic() {
        let store = MemoryStore::single();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        txn.put(&key("a"), Vec::new(), Timestamp::NEVER).unwrap();
        let a = key("a");
        let b = key("b");
        for order in [ScanOrder::Ascending, ScanOrder::Descending] {
            assert!(txn
                .scan_next(Bound::Excluded(&a), Bound::Excluded(&a), order)
                .unwrap()
                .is_none());
            assert!(txn
                .scan_next(Bound::Included(&b), Bound::Excluded(&a), order)
                .unwrap()
                .is_none());
            assert!(txn
                .scan_next(Bound::Included(&a), Bound::Included(&a), order)
                .unwrap()
                .is_some());
        }
    }

    #[test]
    fn test_commit_keeps_writes() {
        let store = MemoryStore::single();
        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        txn.put(&key("a"), b"x".to_vec(), Timestamp::NEVER).unwrap();
        txn.commit().unwrap();

        let mut txn = store.begin(PartitionId::new(1)).unwrap();
        assert_eq!(txn.get(&key("a")).unwrap().unwrap().value, b"x");
        assert_eq!(store.total_entries(), 1);
    }
}
