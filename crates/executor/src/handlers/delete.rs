//! Delete handlers

use partis_core::{PartitionId, Transaction};
use partis_security::{KeyScope, Privilege, PrivilegeSet};

use super::{ensure_owned, ensure_scope, live_record, mismatched, HandlerContext, OperationHandler};
use crate::opcode::OpCode;
use crate::operation::{DeleteCondition, DeleteOp, Operation, OperationBody, ReturnChoice};
use crate::result::OpResult;
use crate::throughput::Accountant;
use crate::Result;

/// Removes a live record, or replaces it with a tombstone
pub(crate) struct DeleteHandler {
    opcode: OpCode,
    ctx: HandlerContext,
}

impl DeleteHandler {
    pub(crate) fn new(opcode: OpCode, ctx: HandlerContext) -> Self {
        DeleteHandler { opcode, ctx }
    }
}

fn reads_previous(delete: &DeleteOp) -> bool {
    delete.is_conditional() || delete.return_choice != ReturnChoice::None
}

impl OperationHandler for DeleteHandler {
    fn opcode(&self) -> OpCode {
        self.opcode
    }

    fn required_privileges(&self, op: &Operation) -> Result<PrivilegeSet> {
        let OperationBody::Delete(delete) = op.body() else {
            return Err(mismatched(self.opcode, op.body()));
        };
        let scope = KeyScope::of(&delete.key);
        let mut required = PrivilegeSet::new().with(Privilege::delete(&scope));
        if reads_previous(delete) {
            required.insert(Privilege::read(&scope));
        }
        Ok(required)
    }

    fn execute(
        &self,
        op: &mut Operation,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<OpResult> {
        let (body, throughput) = op.split();
        let OperationBody::Delete(delete) = body else {
            return Err(mismatched(self.opcode, body));
        };
        ensure_scope(txn, partition)?;
        self.ctx.validate_key(&delete.key)?;
        ensure_owned(txn, &delete.key)?;

        let mut acct = Accountant::new(&self.ctx.cost, throughput);
        let existing = live_record(txn, &delete.key)?;
        match &existing {
            Some(old) if delete.return_choice.includes_value() => {
                acct.read_record(old.storage_size)
            }
            _ => acct.min_read(),
        }

        let previous = self
            .ctx
            .previous_record(&delete.key, existing.as_ref(), delete.return_choice)?;
        let Some(old) = existing else {
            return Ok(OpResult::Delete {
                deleted: false,
                previous,
            });
        };
        if let DeleteCondition::IfVersion(version) = delete.condition {
            if old.version != version {
                return Ok(OpResult::Delete {
                    deleted: false,
                    previous,
                });
            }
        }

        if delete.tombstone {
            let tombstone = txn.put_tombstone(&delete.key)?;
            acct.write_record(tombstone.storage_size);
        } else {
            txn.delete(&delete.key)?;
            acct.write_record(old.storage_size);
        }
        Ok(OpResult::Delete {
            deleted: true,
            previous,
        })
    }
}
