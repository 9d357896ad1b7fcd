//! Get handler

use partis_core::{PartitionId, Transaction};
use partis_security::{KeyScope, Privilege, PrivilegeSet};

use super::{ensure_owned, ensure_scope, live_record, mismatched, HandlerContext, OperationHandler};
use crate::opcode::OpCode;
use crate::operation::{Operation, OperationBody};
use crate::result::OpResult;
use crate::throughput::Accountant;
use crate::Result;

/// Point read of the live record at a key
pub(crate) struct GetHandler {
    ctx: HandlerContext,
}

impl GetHandler {
    pub(crate) fn new(ctx: HandlerContext) -> Self {
        GetHandler { ctx }
    }
}

impl OperationHandler for GetHandler {
    fn opcode(&self) -> OpCode {
        OpCode::Get
    }

    fn required_privileges(&self, op: &Operation) -> Result<PrivilegeSet> {
        match op.body() {
            OperationBody::Get(get) => {
                Ok(PrivilegeSet::new().with(Privilege::read(&KeyScope::of(&get.key))))
            }
            other => Err(mismatched(self.opcode(), other)),
        }
    }

    fn execute(
        &self,
        op: &mut Operation,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<OpResult> {
        let (body, throughput) = op.split();
        let OperationBody::Get(get) = body else {
            return Err(mismatched(self.opcode(), body));
        };
        ensure_scope(txn, partition)?;
        self.ctx.validate_key(&get.key)?;
        ensure_owned(txn, &get.key)?;

        let mut acct = Accountant::new(&self.ctx.cost, throughput);
        match live_record(txn, &get.key)? {
            Some(record) => {
                acct.read_record(record.storage_size);
                Ok(OpResult::Get(Some(self.ctx.build_rvv(&get.key, &record)?)))
            }
            None => {
                acct.min_read();
                Ok(OpResult::Get(None))
            }
        }
    }
}
