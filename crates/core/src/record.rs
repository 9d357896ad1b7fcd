//! Records as returned by the storage boundary

use crate::contract::{Timestamp, Version};
use serde::{Deserialize, Serialize};

/// A record as stored in one partition
///
/// Tombstones are records too: they carry a version and modification time but
/// no value. Expired records are never handed out by storage.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StoredRecord {
    /// Value bytes (empty for tombstones)
    pub value: Vec<u8>,
    /// Version assigned by the write that produced this record
    pub version: Version,
    /// When the record expires ([`Timestamp::NEVER`] = never)
    pub expiration_time: Timestamp,
    /// When the record was last written
    pub modification_time: Timestamp,
    /// Bytes occupied in storage (key plus value)
    pub storage_size: u64,
    /// True for deletion markers
    pub tombstone: bool,
}

impl StoredRecord {
    /// A live record is anything that is not a tombstone
    #[inline]
    pub fn is_live(&self) -> bool {
        !self.tombstone
    }

    /// Has this record expired at `now`?
    pub fn is_expired_at(&self, now: Timestamp) -> bool {
        !self.expiration_time.is_never() && self.expiration_time <= now
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(expiration: u64) -> StoredRecord {
        StoredRecord {
            value: b"v".to_vec(),
            version: Version::new(1),
            expiration_time: Timestamp::from_millis(expiration),
            modification_time: Timestamp::from_millis(10),
            storage_size: 2,
            tombstone: false,
        }
    }

    #[test]
    fn test_never_expires() {
        assert!(!record(0).is_expired_at(Timestamp::MAX));
    }

    #[test]
    fn test_expiration_boundary() {
        let r = record(100);
        assert!(!r.is_expired_at(Timestamp::from_millis(99)));
        assert!(r.is_expired_at(Timestamp::from_millis(100)));
    }

    #[test]
    fn test_tombstone_not_live() {
        let mut r = record(0);
        assert!(r.is_live());
        r.tombstone = true;
        assert!(!r.is_live());
    }
}
