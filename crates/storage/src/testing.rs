//! Testing utilities for code that drives a [`Transaction`]
//!
//! - [`CountingTransaction`] records how many storage calls were made, so
//!   tests can assert that a rejected operation never reached storage
//! - [`FailingTransaction`] injects a [`StorageFault`] after a given number of
//!   calls
//!
//! # Example
//!
//! ```
//! use partis_core::{Key, PartitionId, Transaction};
//! use partis_storage::testing::CountingTransaction;
//! use partis_storage::MemoryStore;
//!
//! let store = MemoryStore::single();
//! let mut txn = CountingTransaction::new(store.begin(PartitionId::new(1)).unwrap());
//! txn.get(&Key::parse("a").unwrap()).unwrap();
//! assert_eq!(txn.calls().gets, 1);
//! ```

use partis_core::{
    Key, PartitionBounds, PartitionId, ScanOrder, StorageFault, StorageResult, StoredRecord,
    Timestamp, Transaction,
};
use std::ops::Bound;

/// Number of storage calls per kind
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct StorageCalls {
    /// `get` calls
    pub gets: usize,
    /// `put` calls
    pub puts: usize,
    /// `put_tombstone` calls
    pub tombstones: usize,
    /// `delete` calls
    pub deletes: usize,
    /// `scan_next` calls
    pub scans: usize,
}

impl StorageCalls {
    /// All calls of any kind
    pub fn total(&self) -> usize {
        self.gets + self.puts + self.tombstones + self.deletes + self.scans
    }

    /// Calls that modify data
    pub fn writes(&self) -> usize {
        self.puts + self.tombstones + self.deletes
    }
}

/// Wraps a transaction and counts the calls made through it
pub struct CountingTransaction<T> {
    inner: T,
    calls: StorageCalls,
}

impl<T: Transaction> CountingTransaction<T> {
    /// Wrap `inner`
    pub fn new(inner: T) -> Self {
        CountingTransaction {
            inner,
            calls: StorageCalls::default(),
        }
    }

    /// Calls made so far
    pub fn calls(&self) -> StorageCalls {
        self.calls
    }

    /// Unwrap the inner transaction
    pub fn into_inner(self) -> T {
        self.inner
    }
}

impl<T: Transaction> Transaction for CountingTransaction<T> {
    fn partition(&self) -> PartitionId {
        self.inner.partition()
    }

    fn bounds(&self) -> &PartitionBounds {
        self.inner.bounds()
    }

    fn get(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>> {
        self.calls.gets += 1;
        self.inner.get(key)
    }

    fn put(
        &mut self,
        key: &Key,
        value: Vec<u8>,
        expiration: Timestamp,
    ) -> StorageResult<StoredRecord> {
        self.calls.puts += 1;
        self.inner.put(key, value, expiration)
    }

    fn put_tombstone(&mut self, key: &Key) -> StorageResult<StoredRecord> {
        self.calls.tombstones += 1;
        self.inner.put_tombstone(key)
    }

    fn delete(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>> {
        self.calls.deletes += 1;
        self.inner.delete(key)
    }

    fn scan_next(
        &mut self,
        lower: Bound<&Key>,
        upper: Bound<&Key>,
        order: ScanOrder,
    ) -> StorageResult<Option<(Key, StoredRecord)>> {
        self.calls.scans += 1;
        self.inner.scan_next(lower, upper, order)
    }
}

/// Wraps a transaction and fails every call after the first `succeed` ones
pub struct FailingTransaction<T> {
    inner: T,
    fault: StorageFault,
    remaining: usize,
}

impl<T: Transaction> FailingTransaction<T> {
    /// Fail every call with `fault`
    pub fn new(inner: T, fault: StorageFault) -> Self {
        FailingTransaction::after(inner, 0, fault)
    }

    /// Let `succeed` calls through, then fail with `fault`
    pub fn after(inner: T, succeed: usize, fault: StorageFault) -> Self {
        FailingTransaction {
            inner,
            fault,
            remaining: succeed,
        }
    }

    /// Unwrap the inner transaction
    pub fn into_inner(self) -> T {
        self.inner
    }

    fn check(&mut self) -> StorageResult<()> {
        if self.remaining == 0 {
            return Err(self.fault.clone());
        }
        self.remaining -= 1;
        Ok(())
    }
}

impl<T: Transaction> Transaction for FailingTransaction<T> {
    fn partition(&self) -> PartitionId {
        self.inner.partition()
    }

    fn bounds(&self) -> &PartitionBounds {
        self.inner.bounds()
    }

    fn get(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>> {
        self.check()?;
        self.inner.get(key)
    }

    fn put(
        &mut self,
        key: &Key,
        value: Vec<u8>,
        expiration: Timestamp,
    ) -> StorageResult<StoredRecord> {
        self.check()?;
        self.inner.put(key, value, expiration)
    }

    fn put_tombstone(&mut self, key: &Key) -> StorageResult<StoredRecord> {
        self.check()?;
        self.inner.put_tombstone(key)
    }

    fn delete(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>> {
        self.check()?;
        self.inner.delete(key)
    }

    fn scan_next(
        &mut self,
        lower: Bound<&Key>,
        upper: Bound<&Key>,
        order: ScanOrder,
    ) -> StorageResult<Option<(Key, StoredRecord)>> {
        self.check()?;
        self.inner.scan_next(lower, upper, order)
    }
}
