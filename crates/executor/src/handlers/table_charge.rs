//! TableCharge handler

use partis_core::{PartitionId, Transaction};
use partis_security::{Privilege, PrivilegeSet};
use tracing::debug;

use super::{ensure_scope, mismatched, HandlerContext, OperationHandler};
use crate::opcode::OpCode;
use crate::operation::{Operation, OperationBody};
use crate::result::OpResult;
use crate::throughput::Accountant;
use crate::Result;

/// Charges caller-supplied read units against a table without touching
/// storage
pub(crate) struct TableChargeHandler {
    ctx: HandlerContext,
}

impl TableChargeHandler {
    pub(crate) fn new(ctx: HandlerContext) -> Self {
        TableChargeHandler { ctx }
    }
}

impl OperationHandler for TableChargeHandler {
    fn opcode(&self) -> OpCode {
        OpCode::TableCharge
    }

    fn required_privileges(&self, _op: &Operation) -> Result<PrivilegeSet> {
        Ok(PrivilegeSet::new().with(Privilege::InternalOperation))
    }

    fn execute(
        &self,
        op: &mut Operation,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<OpResult> {
        let (body, throughput) = op.split();
        let OperationBody::TableCharge(charge) = body else {
            return Err(mismatched(self.opcode(), body));
        };
        // partition metadata only; the storage engine is never read or written
        ensure_scope(txn, partition)?;
        debug!(namespace = %charge.namespace, units = charge.read_units, "table charge");
        Accountant::new(&self.ctx.cost, throughput).read_units(charge.read_units);
        Ok(OpResult::TableCharged)
    }
}
