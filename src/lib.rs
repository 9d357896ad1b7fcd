//! Partis - operation execution layer for a partitioned key/value store
//!
//! A node receives operations for the partitions it owns, checks them against
//! the caller's privileges, runs them inside the partition's storage
//! transaction and meters the work done.
//!
//! # Quick Start
//!
//! ```
//! use std::sync::Arc;
//! use partis::{Executor, ExecutorConfig, GrantAuthorizer, OpResult, Operation, PutOp, Subject};
//! use partis::core::{Key, PartitionId};
//! use partis::storage::MemoryStore;
//!
//! let executor = Executor::new(ExecutorConfig::default(), Arc::new(GrantAuthorizer::default())).unwrap();
//! let store = MemoryStore::single();
//! let partition = PartitionId::new(1);
//!
//! let mut txn = store.begin(partition).unwrap();
//! let mut op = Operation::put(PutOp::new(Key::parse("users/1").unwrap(), b"ada".to_vec()));
//! let result = executor.execute(&Subject::superuser("admin"), &mut op, &mut txn, partition).unwrap();
//! assert!(matches!(result, OpResult::Put { new_version: Some(_), .. }));
//! txn.commit().unwrap();
//! ```
//!
//! # Architecture
//!
//! - [`core`]: keys, partitions, records and the storage transaction boundary
//! - [`security`]: privileges and the authorizer
//! - [`storage`]: an in-memory range-partitioned store
//! - the executor itself, re-exported at the crate root

pub use partis_executor::*;

pub use partis_core as core;
pub use partis_security as security;
pub use partis_storage as storage;
