//! The storage boundary
//!
//! Handlers talk to storage exclusively through [`Transaction`]. A transaction
//! is scoped to exactly one partition and is created, committed and aborted by
//! the caller; handlers only read and write through it.

use std::ops::Bound;

use crate::contract::Timestamp;
use crate::error::StorageResult;
use crate::key::{Key, ScanOrder};
use crate::partition::{PartitionBounds, PartitionId};
use crate::record::StoredRecord;

/// A transaction against one partition
///
/// Implementations must:
/// - reject keys outside [`Transaction::bounds`] with
///   `StorageFault::KeyOutsidePartition`
/// - assign a fresh, strictly greater [`Version`](crate::Version) to every write
/// - hide expired records from every read
///
/// Tombstones are visible to reads; it is up to the caller to decide what a
/// tombstone means.
pub trait Transaction {
    /// Partition this transaction is scoped to
    fn partition(&self) -> PartitionId;

    /// Key bounds of that partition
    fn bounds(&self) -> &PartitionBounds;

    /// Read the record stored at `key`, tombstones included
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn get(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>>;

    /// Write a value, replacing whatever is stored at `key`
    ///
    /// Returns the record as stored, with its newly assigned version.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put(&mut self, key: &Key, value: Vec<u8>, expiration: Timestamp)
        -> StorageResult<StoredRecord>;

    /// Replace whatever is stored at `key` with a tombstone
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn put_tombstone(&mut self, key: &Key) -> StorageResult<StoredRecord>;

    /// Remove `key` entirely, returning the removed record
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn delete(&mut self, key: &Key) -> StorageResult<Option<StoredRecord>>;

    /// First record inside `(lower, upper)` in the given order
    ///
    /// `Ascending` returns the smallest key in range, `Descending` the largest.
    /// The range is intersected with the partition bounds. An empty or inverted
    /// range yields `None`.
    ///
    /// # Errors
    ///
    /// Returns an error if the storage operation fails.
    fn scan_next(
        &mut self,
        lower: Bound<&Key>,
        upper: Bound<&Key>,
        order: ScanOrder,
    ) -> StorageResult<Option<(Key, StoredRecord)>>;
}
