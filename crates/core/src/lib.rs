//! Core types and the storage boundary for Partis
//!
//! This crate defines the foundational types shared by every layer:
//! - Key: Hierarchical key, plus the KeyRange/Depth/Direction scan selectors
//! - Partition: PartitionId, PartitionBounds and the PartitionMap used for routing
//! - ResumeToken: Continuation point of a paged scan
//! - StoredRecord: A record as handed out by storage
//! - Limits / CostModel: Size limits and throughput unit conversion
//! - Transaction: The trait storage engines implement
//! - Clock: Time source used for expiration
//! - Contract types: Version, Timestamp

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod clock;
pub mod contract;
pub mod error;
pub mod key;
pub mod limits;
pub mod partition;
pub mod record;
pub mod resume;
pub mod traits;

pub use clock::{Clock, ManualClock, SystemClock};
pub use contract::{Timestamp, Version};
pub use error::{StorageFault, StorageResult};
pub use key::{Depth, Direction, Key, KeyError, KeyRange, ScanOrder};
pub use limits::{CostModel, LimitError, Limits, MIN_READ_UNITS};
pub use partition::{PartitionBounds, PartitionError, PartitionId, PartitionMap};
pub use record::StoredRecord;
pub use resume::ResumeToken;
pub use traits::Transaction;
