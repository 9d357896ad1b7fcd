//! MultiDelete handler

use partis_core::{PartitionId, ScanOrder, Transaction};
use partis_security::{KeyScope, Privilege, PrivilegeSet};
use tracing::debug;

use super::{ensure_scope, mismatched, HandlerContext, OperationHandler};
use crate::iteration::{ScanCursor, ScanPlan};
use crate::opcode::OpCode;
use crate::operation::{Operation, OperationBody};
use crate::result::OpResult;
use crate::throughput::Accountant;
use crate::Result;

/// Deletes every live record under a parent that this partition holds
///
/// Tombstones are left in place. The operation is not resumable: it covers
/// the partition's share of the range in one call.
pub(crate) struct MultiDeleteHandler {
    ctx: HandlerContext,
}

impl MultiDeleteHandler {
    pub(crate) fn new(ctx: HandlerContext) -> Self {
        MultiDeleteHandler { ctx }
    }
}

impl OperationHandler for MultiDeleteHandler {
    fn opcode(&self) -> OpCode {
        OpCode::MultiDelete
    }

    fn required_privileges(&self, op: &Operation) -> Result<PrivilegeSet> {
        let OperationBody::MultiDelete(md) = op.body() else {
            return Err(mismatched(self.opcode(), op.body()));
        };
        let scope = KeyScope::of(&md.parent);
        Ok(PrivilegeSet::new()
            .with(Privilege::delete(&scope))
            .with(Privilege::read(&scope)))
    }

    fn execute(
        &self,
        op: &mut Operation,
        txn: &mut dyn Transaction,
        partition: PartitionId,
    ) -> Result<OpResult> {
        let (body, throughput) = op.split();
        let OperationBody::MultiDelete(md) = body else {
            return Err(mismatched(self.opcode(), body));
        };
        ensure_scope(txn, partition)?;
        md.parent.validate(&self.ctx.limits)?;

        let mut acct = Accountant::new(&self.ctx.cost, throughput);
        let plan = ScanPlan::new(&md.parent, md.range.as_ref(), md.depth)?;
        let bounds = txn.bounds().clone();
        let mut cursor = ScanCursor::new(plan, ScanOrder::Ascending, None, &bounds);

        let mut deleted: u32 = 0;
        while let Some(visit) = cursor.next(txn)? {
            acct.min_read();
            if !visit.selected || visit.record.tombstone {
                continue;
            }
            txn.delete(&visit.key)?;
            acct.write_record(visit.record.storage_size);
            deleted = deleted.saturating_add(1);
        }
        acct.ensure_min_read();

        debug!(parent = %md.parent, partition = %partition, deleted, "multi-delete");
        Ok(OpResult::MultiDelete { deleted })
    }
}
