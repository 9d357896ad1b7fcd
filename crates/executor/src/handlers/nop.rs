//! Nop handler

use partis_core::{PartitionId, Transaction};
use partis_security::PrivilegeSet;

use super::{ensure_scope, OperationHandler};
use crate::opcode::OpCode;
use crate::operation::Operation;
use crate::result::OpResult;
use crate::Result;

/// Does nothing: no privileges, no storage access, no charge
pub(crate) struct NopHandler;

impl OperationHandler for NopHandler {
    fn opcode(&self) -> OpCode {
        OpCode::Nop
    }

    fn required_privileges(&self, _op: &Operation) -> Result<PrivilegeSet> {
        Ok(PrivilegeSet::new())
    }

    fn execute(
        &self,
        _op: &mut Operation,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<OpResult> {
        ensure_scope(txn, partition)?;
        Ok(OpResult::Nop)
    }
}
