//! Reference storage engine for Partis
//!
//! This crate implements the [`Transaction`](partis_core::Transaction) boundary
//! with:
//! - MemoryStore: one `BTreeMap` shard per range partition behind a `RwLock`
//! - MemTransaction: immediate writes with an undo log for abort
//! - Version management with AtomicU64
//! - Read-time expiration against an injectable clock
//! - Testing wrappers that count calls or inject faults

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod memory;
pub mod testing;
pub mod transaction;

pub use memory::{MemoryStore, PartitionShard};
pub use transaction::MemTransaction;
