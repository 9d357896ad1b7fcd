//! Operation results
//!
//! Results are immutable once handed to the caller. Records are built in two
//! phases: a crate-private [`ProvisionalValueVersion`] is created from the
//! stored record, may have its value replaced once (the registry's value
//! transform), and is then finalized into a [`ResultValueVersion`], which only
//! exposes getters.

use partis_core::{Key, ResumeToken, StoredRecord, Timestamp, Version};
use serde::{Deserialize, Serialize};

use crate::error::Error;
use crate::opcode::OpCode;
use crate::throughput::Throughput;
use crate::Result;

/// A record as returned to the caller
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ResultValueVersion {
    value: Vec<u8>,
    version: Version,
    expiration_time: Timestamp,
    modification_time: Timestamp,
    storage_size: u64,
}

impl ResultValueVersion {
    /// Value bytes
    pub fn value(&self) -> &[u8] {
        &self.value
    }

    /// Version of the write that produced the record
    pub fn version(&self) -> Version {
        self.version
    }

    /// Expiration time ([`Timestamp::NEVER`] = never)
    pub fn expiration_time(&self) -> Timestamp {
        self.expiration_time
    }

    /// Last modification time
    pub fn modification_time(&self) -> Timestamp {
        self.modification_time
    }

    /// Bytes occupied in storage
    pub fn storage_size(&self) -> u64 {
        self.storage_size
    }

    /// Take the value bytes
    pub fn into_value(self) -> Vec<u8> {
        self.value
    }

    pub(crate) fn from_parts(
        value: Vec<u8>,
        version: Version,
        expiration_time: Timestamp,
        modification_time: Timestamp,
        storage_size: u64,
    ) -> Self {
        ResultValueVersion {
            value,
            version,
            expiration_time,
            modification_time,
            storage_size,
        }
    }
}

/// A result record still under construction
#[derive(Debug)]
pub(crate) struct ProvisionalValueVersion {
    inner: ResultValueVersion,
    replaced: bool,
}

impl ProvisionalValueVersion {
    pub(crate) fn from_record(record: &StoredRecord) -> Self {
        ProvisionalValueVersion {
            inner: ResultValueVersion::from_parts(
                record.value.clone(),
                record.version,
                record.expiration_time,
                record.modification_time,
                record.storage_size,
            ),
            replaced: false,
        }
    }

    /// Substitute the value. Allowed once.
    pub(crate) fn replace_value(&mut self, value: Vec<u8>) -> Result<()> {
        if self.replaced {
            return Err(Error::internal("result value replaced twice"));
        }
        self.inner.value = value;
        self.replaced = true;
        Ok(())
    }

    pub(crate) fn finalize(self) -> ResultValueVersion {
        self.inner
    }
}

/// What is returned about a record an operation replaced or removed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum PreviousRecord {
    /// Its version only
    Version(Version),
    /// Its value only
    Value(Vec<u8>),
    /// The whole record
    All(ResultValueVersion),
}

/// A scan result entry with its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyValueEntry {
    /// Key
    pub key: Key,
    /// Record (empty value for tombstones)
    pub record: ResultValueVersion,
    /// True for tombstones
    pub tombstone: bool,
}

/// A scan result entry without its value
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct KeyEntry {
    /// Key
    pub key: Key,
    /// Version
    pub version: Version,
    /// Expiration time
    pub expiration_time: Timestamp,
    /// Last modification time
    pub modification_time: Timestamp,
    /// Bytes occupied in storage
    pub storage_size: u64,
    /// True for tombstones
    pub tombstone: bool,
}

/// One call's worth of scan results
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationBatch<T> {
    /// Entries in scan order
    pub entries: Vec<T>,
    /// Where the next call continues; `None` once the range is exhausted
    pub resume: Option<ResumeToken>,
}

impl<T> IterationBatch<T> {
    /// Has the whole requested range been visited?
    pub fn is_exhausted(&self) -> bool {
        self.resume.is_none()
    }
}

/// Typed result of a successful operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OpResult {
    /// Nop completed
    Nop,
    /// Live record, if any
    Get(Option<ResultValueVersion>),
    /// Write outcome
    Put {
        /// Version written; `None` when the condition failed
        new_version: Option<Version>,
        /// Expiration of the written record
        expiration_time: Timestamp,
        /// Previous record, per the return choice
        previous: Option<PreviousRecord>,
    },
    /// Delete outcome
    Delete {
        /// Whether a live record was deleted
        deleted: bool,
        /// Previous record, per the return choice
        previous: Option<PreviousRecord>,
    },
    /// Number of records removed
    MultiDelete {
        /// Count
        deleted: u32,
    },
    /// Scan with values
    Iterate(IterationBatch<KeyValueEntry>),
    /// Scan without values
    KeysIterate(IterationBatch<KeyEntry>),
    /// Charge recorded
    TableCharged,
}

impl OpResult {
    /// Can this result have been produced by `opcode`?
    pub fn matches(&self, opcode: OpCode) -> bool {
        matches!(
            (self, opcode),
            (OpResult::Nop, OpCode::Nop)
                | (OpResult::Get(_), OpCode::Get)
                | (
                    OpResult::Put { .. },
                    OpCode::Put | OpCode::PutIfAbsent | OpCode::PutIfPresent | OpCode::PutIfVersion
                )
                | (OpResult::Delete { .. }, OpCode::Delete | OpCode::DeleteIfVersion)
                | (OpResult::MultiDelete { .. }, OpCode::MultiDelete)
                | (OpResult::Iterate(_), OpCode::StoreIterate)
                | (OpResult::KeysIterate(_), OpCode::StoreKeysIterate)
                | (OpResult::TableCharged, OpCode::TableCharge)
        )
    }
}

/// A result plus the throughput the operation consumed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Response {
    /// Opcode of the operation that produced the result
    pub opcode: OpCode,
    /// Result
    pub result: OpResult,
    /// Units consumed
    pub throughput: Throughput,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record() -> StoredRecord {
        StoredRecord {
            value: b"stored".to_vec(),
            version: Version::new(4),
            expiration_time: Timestamp::NEVER,
            modification_time: Timestamp::from_millis(99),
            storage_size: 12,
            tombstone: false,
        }
    }

    #[test]
    fn test_provisional_without_replacement() {
        let rvv = ProvisionalValueVersion::from_record(&record()).finalize();
        assert_eq!(rvv.value(), b"stored");
        assert_eq!(rvv.version(), Version::new(4));
        assert_eq!(rvv.modification_time(), Timestamp::from_millis(99));
        assert_eq!(rvv.storage_size(), 12);
    }

    #[test]
    fn test_replace_value_once() {
        let mut provisional = ProvisionalValueVersion::from_record(&record());
        provisional.replace_value(b"decoded".to_vec()).unwrap();
        let err = provisional.replace_value(b"again".to_vec()).unwrap_err();
        assert!(matches!(err, Error::Internal { .. }));
        let rvv = provisional.finalize();
        assert_eq!(rvv.value(), b"decoded");
        // Metadata is untouched by a value replacement
        assert_eq!(rvv.version(), Version::new(4));
    }

    #[test]
    fn test_result_matches_opcode() {
        assert!(OpResult::Nop.matches(OpCode::Nop));
        assert!(OpResult::Get(None).matches(OpCode::Get));
        assert!(!OpResult::Get(None).matches(OpCode::StoreIterate));
        let put = OpResult::Put {
            new_version: None,
            expiration_time: Timestamp::NEVER,
            previous: None,
        };
        assert!(put.matches(OpCode::PutIfVersion));
        assert!(!put.matches(OpCode::Delete));
    }

    #[test]
    fn test_batch_exhaustion() {
        let batch: IterationBatch<KeyEntry> = IterationBatch {
            entries: vec![],
            resume: None,
        };
        assert!(batch.is_exhausted());
    }
}
