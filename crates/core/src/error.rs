//! Error types for the storage boundary
//!
//! Storage engines report failures through [`StorageFault`]. The execution
//! layer never retries or reinterprets these: it wraps them and hands them back
//! to the caller, who owns retry policy.

use crate::partition::PartitionId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Result type alias for storage calls
pub type StorageResult<T> = std::result::Result<T, StorageFault>;

/// Failure reported by a storage transaction
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum StorageFault {
    /// Transaction conflicted with a concurrent writer
    #[error("Transaction conflict: {reason}")]
    Conflict {
        /// Conflict description
        reason: String,
    },

    /// Storage did not answer in time
    #[error("Storage timeout after {elapsed_ms}ms")]
    Timeout {
        /// Time spent before giving up
        elapsed_ms: u64,
    },

    /// Stored data failed an integrity check
    #[error("Data corruption: {reason}")]
    Corruption {
        /// What was found to be corrupt
        reason: String,
    },

    /// No such partition on this node
    #[error("Unknown partition: {partition}")]
    UnknownPartition {
        /// The partition that was asked for
        partition: PartitionId,
    },

    /// Key is not owned by the transaction's partition
    #[error("Key {key} is outside partition {partition}")]
    KeyOutsidePartition {
        /// Rendered key
        key: String,
        /// The transaction's partition
        partition: PartitionId,
    },

    /// Transaction is no longer usable
    #[error("Transaction closed")]
    Closed,
}

impl StorageFault {
    /// Whether the caller may reasonably retry the whole operation
    pub fn is_retryable(&self) -> bool {
        matches!(self, StorageFault::Conflict { .. } | StorageFault::Timeout { .. })
    }
}
