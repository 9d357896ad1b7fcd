//! # Partis Executor
//!
//! The operation execution layer of a partitioned key/value store node.
//!
//! This crate turns requests into effects on one partition's storage
//! transaction. It provides:
//! - [`Executor`] - authorization, dispatch and throughput rollback
//! - [`HandlerRegistry`] - one [`OperationHandler`] per [`OpCode`]
//! - [`Operation`]/[`OpResult`] - typed requests and results
//! - [`wire`] - the versioned binary codec for both
//! - [`ResumableScan`] - paged iteration across partitions
//!
//! ## Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use partis_core::{Key, PartitionId};
//! use partis_executor::{Executor, ExecutorConfig, IterationRequest, OpResult, Operation, PutOp};
//! use partis_security::{GrantAuthorizer, Subject};
//! use partis_storage::MemoryStore;
//!
//! let executor = Executor::new(ExecutorConfig::default(), Arc::new(GrantAuthorizer::default())).unwrap();
//! let store = MemoryStore::single();
//! let partition = PartitionId::new(1);
//! let admin = Subject::superuser("admin");
//!
//! let mut txn = store.begin(partition).unwrap();
//! for name in ["a", "b", "c"] {
//!     let key = Key::parse(&format!("users/{}", name)).unwrap();
//!     let mut op = Operation::put(PutOp::new(key, name.as_bytes().to_vec()));
//!     executor.execute(&admin, &mut op, &mut txn, partition).unwrap();
//! }
//!
//! let request = IterationRequest::new(Key::parse("users").unwrap()).batch_size(2);
//! let mut op = Operation::keys_iterate(request);
//! match executor.execute(&admin, &mut op, &mut txn, partition).unwrap() {
//!     OpResult::KeysIterate(batch) => {
//!         assert_eq!(batch.entries.len(), 2);
//!         assert!(batch.resume.is_some());
//!     }
//!     other => panic!("unexpected {:?}", other),
//! }
//! txn.commit().unwrap();
//! ```
//!
//! ## Protocol Versions
//!
//! | Version | Adds |
//! |---------|------|
//! | V1 | baseline opcodes |
//! | V2 | TTL on puts, modification times |
//! | V3 | tombstones, storage sizes, `TableCharge` |

#![warn(missing_docs)]
#![warn(clippy::all)]

mod config;
mod error;
mod executor;
mod handlers;
pub mod iteration;
mod opcode;
mod operation;
mod registry;
mod result;
mod throughput;
pub mod wire;

// Test modules
#[cfg(test)]
mod tests;

// =============================================================================
// Public API
// =============================================================================

pub use config::{ConfigError, ExecutorConfig, CONFIG_FILE_NAME};
pub use error::{Error, ErrorKind, IterationError, ProtocolError};
pub use executor::Executor;
pub use handlers::OperationHandler;
pub use iteration::{IterationState, ResumableScan};
pub use opcode::OpCode;
pub use operation::{
    DeleteCondition, DeleteOp, GetOp, IterationRequest, MultiDeleteOp, Operation, OperationBody,
    PutCondition, PutOp, ReturnChoice, TableChargeOp, TimeToLive, TtlUnit,
};
pub use registry::{HandlerRegistry, HandlerRegistryBuilder, IdentityTransform, ValueTransform};
pub use result::{
    IterationBatch, KeyEntry, KeyValueEntry, OpResult, PreviousRecord, Response,
    ResultValueVersion,
};
pub use throughput::{Accountant, Throughput};
pub use wire::{ProtocolVersion, WireField};

// Re-export security types so users don't need partis-security directly
pub use partis_security::{AccessMode, Authorizer, GrantAuthorizer, Subject};

/// Result type for executor operations
pub type Result<T> = std::result::Result<T, Error>;
