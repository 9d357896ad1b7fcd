//! Operation handlers, one per opcode family.
//!
//! | Module | Opcodes |
//! |--------|---------|
//! | `nop` | Nop |
//! | `get` | Get |
//! | `put` | Put, PutIfAbsent, PutIfPresent, PutIfVersion |
//! | `delete` | Delete, DeleteIfVersion |
//! | `multi_delete` | MultiDelete |
//! | `iterate` | StoreIterate, StoreKeysIterate |
//! | `table_charge` | TableCharge |
//!
//! Handlers never authorize and never commit. The executor checks the
//! privileges a handler reports before calling [`OperationHandler::execute`],
//! and the caller owns the transaction.

mod delete;
mod get;
mod iterate;
mod multi_delete;
mod nop;
mod put;
mod table_charge;

pub(crate) use delete::DeleteHandler;
pub(crate) use get::GetHandler;
pub(crate) use iterate::{IterateHandler, KeysIterateHandler};
pub(crate) use multi_delete::MultiDeleteHandler;
pub(crate) use nop::NopHandler;
pub(crate) use put::PutHandler;
pub(crate) use table_charge::TableChargeHandler;

use std::sync::Arc;

use partis_core::{Clock, CostModel, Key, Limits, PartitionId, StoredRecord, Transaction};
use partis_security::PrivilegeSet;

use crate::error::Error;
use crate::opcode::OpCode;
use crate::operation::{Operation, OperationBody, ReturnChoice};
use crate::registry::ValueTransform;
use crate::result::{OpResult, PreviousRecord, ProvisionalValueVersion, ResultValueVersion};
use crate::Result;

/// Executes one opcode
///
/// Implementations are stateless apart from the shared [`HandlerContext`] and
/// are shared across threads.
pub trait OperationHandler: Send + Sync {
    /// The opcode this handler serves
    fn opcode(&self) -> OpCode;

    /// Privileges the subject needs to run `op`
    ///
    /// Pure: depends only on the operation's content.
    fn required_privileges(&self, op: &Operation) -> Result<PrivilegeSet>;

    /// Run `op` inside `txn`, charging its throughput
    fn execute(
        &self,
        op: &mut Operation,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<OpResult>;
}

/// Settings and hooks shared by every handler
#[derive(Clone)]
pub(crate) struct HandlerContext {
    pub(crate) cost: CostModel,
    pub(crate) limits: Limits,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) transform: Arc<dyn ValueTransform>,
}

impl HandlerContext {
    /// Build a result record, passing the value through the transform hook
    pub(crate) fn build_rvv(&self, key: &Key, record: &StoredRecord) -> Result<ResultValueVersion> {
        let mut provisional = ProvisionalValueVersion::from_record(record);
        if record.tombstone {
            return Ok(provisional.finalize());
        }
        if let Some(value) = self.transform.transform(key, &record.value) {
            provisional.replace_value(value)?;
        }
        Ok(provisional.finalize())
    }

    /// What to hand back about `record` under `choice`
    pub(crate) fn previous_record(
        &self,
        key: &Key,
        record: Option<&StoredRecord>,
        choice: ReturnChoice,
    ) -> Result<Option<PreviousRecord>> {
        let Some(record) = record else {
            return Ok(None);
        };
        let previous = match choice {
            ReturnChoice::None => return Ok(None),
            ReturnChoice::Version => PreviousRecord::Version(record.version),
            ReturnChoice::Value => PreviousRecord::Value(self.build_rvv(key, record)?.into_value()),
            ReturnChoice::All => PreviousRecord::All(self.build_rvv(key, record)?),
        };
        Ok(Some(previous))
    }

    /// Reject malformed keys and keys over the configured limits
    pub(crate) fn validate_key(&self, key: &Key) -> Result<()> {
        if key.is_root() {
            return Err(Error::invalid_input("the root key cannot hold a record"));
        }
        key.validate(&self.limits)?;
        Ok(())
    }
}

// =============================================================================
// Preconditions
// =============================================================================

/// The transaction must belong to the partition the operation was sent to
pub(crate) fn ensure_scope(txn: &dyn Transaction, partition: PartitionId) -> Result<()> {
    if txn.partition() != partition {
        return Err(Error::internal(format!(
            "transaction for partition {} used to execute on partition {}",
            txn.partition(),
            partition
        )));
    }
    Ok(())
}

/// Single-key operations must target a key the partition owns
pub(crate) fn ensure_owned(txn: &dyn Transaction, key: &Key) -> Result<()> {
    if !txn.bounds().contains(key) {
        return Err(Error::WrongPartition {
            key: key.to_string(),
            partition: txn.partition(),
        });
    }
    Ok(())
}

/// Called when the registry routes an operation to a handler for another
/// opcode family
pub(crate) fn mismatched(expected: OpCode, body: &OperationBody) -> Error {
    Error::internal(format!(
        "{} handler received a {} operation",
        expected,
        body.opcode()
    ))
}

/// Live record at `key`, with expired records and tombstones read as absent
pub(crate) fn live_record(txn: &mut dyn Transaction, key: &Key) -> Result<Option<StoredRecord>> {
    Ok(txn.get(key)?.filter(StoredRecord::is_live))
}
