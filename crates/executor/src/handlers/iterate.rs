//! StoreIterate and StoreKeysIterate handlers

use partis_core::{PartitionId, Transaction};
use partis_security::{KeyScope, Privilege, PrivilegeSet};

use super::{ensure_scope, mismatched, HandlerContext, OperationHandler};
use crate::iteration::{run_scan, ScanCharge};
use crate::opcode::OpCode;
use crate::operation::{IterationRequest, Operation, OperationBody};
use crate::result::{KeyEntry, KeyValueEntry, OpResult};
use crate::throughput::Accountant;
use crate::Result;

fn scan_privileges(request: &IterationRequest) -> PrivilegeSet {
    PrivilegeSet::new().with(Privilege::read(&KeyScope::of(&request.parent)))
}

/// Resumable scan returning keys and values
pub(crate) struct IterateHandler {
    ctx: HandlerContext,
}

impl IterateHandler {
    pub(crate) fn new(ctx: HandlerContext) -> Self {
        IterateHandler { ctx }
    }
}

impl OperationHandler for IterateHandler {
    fn opcode(&self) -> OpCode {
        OpCode::StoreIterate
    }

    fn required_privileges(&self, op: &Operation) -> Result<PrivilegeSet> {
        match op.body() {
            OperationBody::Iterate(request) => Ok(scan_privileges(request)),
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
        let OperationBody::Iterate(request) = body else {
            return Err(mismatched(self.opcode(), body));
        };
        ensure_scope(txn, partition)?;
        request.parent.validate(&self.ctx.limits)?;

        let ctx = &self.ctx;
        let batch_size = ctx.limits.effective_batch_size(request.batch_size);
        let mut acct = Accountant::new(&ctx.cost, throughput);
        let batch = run_scan(
            request,
            txn,
            batch_size,
            ScanCharge::Values,
            &mut acct,
            |key, record| {
                Ok(KeyValueEntry {
                    key: key.clone(),
                    record: ctx.build_rvv(key, &record)?,
                    tombstone: record.tombstone,
                })
            },
        )?;
        Ok(OpResult::Iterate(batch))
    }
}

/// Resumable scan returning keys and metadata only
pub(crate) struct KeysIterateHandler {
    ctx: HandlerContext,
}

impl KeysIterateHandler {
    pub(crate) fn new(ctx: HandlerContext) -> Self {
        KeysIterateHandler { ctx }
    }
}

impl OperationHandler for KeysIterateHandler {
    fn opcode(&self) -> OpCode {
        OpCode::StoreKeysIterate
    }

    fn required_privileges(&self, op: &Operation) -> Result<PrivilegeSet> {
        match op.body() {
            OperationBody::KeysIterate(request) => Ok(scan_privileges(request)),
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
        let OperationBody::KeysIterate(request) = body else {
            return Err(mismatched(self.opcode(), body));
        };
        ensure_scope(txn, partition)?;
        request.parent.validate(&self.ctx.limits)?;

        let batch_size = self.ctx.limits.effective_batch_size(request.batch_size);
        let mut acct = Accountant::new(&self.ctx.cost, throughput);
        let batch = run_scan(
            request,
            txn,
            batch_size,
            ScanCharge::KeysOnly,
            &mut acct,
            |key, record| {
                Ok(KeyEntry {
                    key: key.clone(),
                    version: record.version,
                    expiration_time: record.expiration_time,
                    modification_time: record.modification_time,
                    storage_size: record.storage_size,
                    tombstone: record.tombstone,
                })
            },
        )?;
        Ok(OpResult::KeysIterate(batch))
    }
}
