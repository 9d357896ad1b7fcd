//! The Executor - single entry point for running operations.
//!
//! The Executor looks up the handler for an operation, checks the subject's
//! privileges, and runs the handler inside the caller's transaction. It owns
//! no transaction state: committing or aborting is the caller's decision.

use std::sync::Arc;

use partis_core::{PartitionId, Transaction};
use partis_security::{Authorizer, Subject};
use tracing::{debug, warn};

use crate::config::{ConfigError, ExecutorConfig};
use crate::error::{Error, ProtocolError};
use crate::operation::Operation;
use crate::registry::HandlerRegistry;
use crate::result::{OpResult, Response};
use crate::wire::{self, ProtocolVersion};
use crate::Result;

/// The operation executor.
///
/// # Guarantees
///
/// - Privileges are checked before the handler runs. A refused operation
///   makes no storage call and charges nothing.
/// - If the handler fails, the operation's throughput is put back to what it
///   was before dispatch.
///
/// # Thread Safety
///
/// Executor is `Send + Sync` and can be shared across threads.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use partis_core::{Key, PartitionId};
/// use partis_executor::{Executor, ExecutorConfig, OpResult, Operation, PutOp};
/// use partis_security::{GrantAuthorizer, Subject};
/// use partis_storage::MemoryStore;
///
/// let executor = Executor::new(ExecutorConfig::default(), Arc::new(GrantAuthorizer::default())).unwrap();
/// let store = MemoryStore::single();
/// let partition = PartitionId::new(1);
/// let subject = Subject::superuser("admin");
///
/// let mut txn = store.begin(partition).unwrap();
/// let key = Key::parse("users/1").unwrap();
/// let mut put = Operation::put(PutOp::new(key.clone(), b"ada".to_vec()));
/// executor.execute(&subject, &mut put, &mut txn, partition).unwrap();
///
/// let mut get = Operation::get(key);
/// match executor.execute(&subject, &mut get, &mut txn, partition).unwrap() {
///     OpResult::Get(Some(record)) => assert_eq!(record.value(), b"ada"),
///     other => panic!("unexpected {:?}", other),
/// }
/// txn.commit().unwrap();
/// ```
#[derive(Clone)]
pub struct Executor {
    registry: Arc<HandlerRegistry>,
    authorizer: Arc<dyn Authorizer>,
}

impl Executor {
    /// Build a registry from `config` and wrap it
    pub fn new(
        config: ExecutorConfig,
        authorizer: Arc<dyn Authorizer>,
    ) -> std::result::Result<Self, ConfigError> {
        let registry = HandlerRegistry::new(config)?;
        Ok(Executor::with_registry(Arc::new(registry), authorizer))
    }

    /// Share an existing registry
    pub fn with_registry(registry: Arc<HandlerRegistry>, authorizer: Arc<dyn Authorizer>) -> Self {
        Executor {
            registry,
            authorizer,
        }
    }

    /// The handler registry
    pub fn registry(&self) -> &HandlerRegistry {
        &self.registry
    }

    /// Execute `op` on behalf of `subject` inside `txn`.
    ///
    /// The operation's throughput counters are charged in place.
    pub fn execute(
        &self,
        subject: &Subject,
        op: &mut Operation,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<OpResult> {
        let opcode = op.opcode();
        let handler = self.registry.handler(opcode)?;
        let required = handler.required_privileges(op)?;

        if let Err(denied) = self.authorizer.authorize(subject, &required) {
            warn!(
                principal = %denied.principal,
                opcode = %opcode,
                reason = %denied.reason,
                "operation refused"
            );
            return Err(denied.into());
        }

        let snapshot = *op.throughput();
        match handler.execute(op, txn, partition) {
            Ok(result) => {
                debug!(
                    opcode = %opcode,
                    partition = %partition,
                    read_units = op.throughput().read_units(),
                    write_units = op.throughput().write_units(),
                    "operation executed"
                );
                Ok(result)
            }
            Err(e) => {
                op.throughput_mut().restore(snapshot);
                if let Error::Storage(fault) = &e {
                    warn!(opcode = %opcode, partition = %partition, error = %fault, "storage fault");
                } else {
                    debug!(opcode = %opcode, partition = %partition, error = %e, "operation failed");
                }
                Err(e)
            }
        }
    }

    /// Decode an operation, execute it, and encode the response.
    ///
    /// `version` is the protocol version negotiated with the peer; versions
    /// older than the configured minimum are refused before decoding.
    pub fn execute_bytes(
        &self,
        subject: &Subject,
        request: &[u8],
        version: ProtocolVersion,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<Vec<u8>> {
        let min = self
            .registry
            .config()
            .min_protocol()
            .map_err(|e| Error::internal(e.to_string()))?;
        if version < min {
            return Err(ProtocolError::UnsupportedVersion {
                version: version.as_u8(),
            }
            .into());
        }

        let mut op = wire::decode_operation(request, version)?;
        let result = self.execute(subject, &mut op, txn, partition)?;
        let response = Response {
            opcode: op.opcode(),
            result,
            throughput: *op.throughput(),
        };
        Ok(wire::encode_response(&response, version)?)
    }
}

impl std::fmt::Debug for Executor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Executor")
            .field("registry", &self.registry)
            .finish_non_exhaustive()
    }
}
