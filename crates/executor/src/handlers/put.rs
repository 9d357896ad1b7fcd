//! Put handlers
//!
//! One [`PutHandler`] instance serves each of the four put opcodes; the
//! condition itself travels in the [`PutOp`].

use partis_core::{PartitionId, Timestamp, Transaction};
use partis_security::{KeyScope, Privilege, PrivilegeSet};
use tracing::trace;

use super::{ensure_owned, ensure_scope, live_record, mismatched, HandlerContext, OperationHandler};
use crate::opcode::OpCode;
use crate::operation::{Operation, OperationBody, PutCondition, PutOp, ReturnChoice};
use crate::result::OpResult;
use crate::throughput::Accountant;
use crate::Result;

/// Writes a record, subject to the operation's condition
pub(crate) struct PutHandler {
    opcode: OpCode,
    ctx: HandlerContext,
}

impl PutHandler {
    pub(crate) fn new(opcode: OpCode, ctx: HandlerContext) -> Self {
        PutHandler { opcode, ctx }
    }
}

/// Does the put read the current record on behalf of the caller?
fn reads_previous(put: &PutOp) -> bool {
    put.is_conditional() || put.return_choice != ReturnChoice::None
}

impl OperationHandler for PutHandler {
    fn opcode(&self) -> OpCode {
        self.opcode
    }

    fn required_privileges(&self, op: &Operation) -> Result<PrivilegeSet> {
        let OperationBody::Put(put) = op.body() else {
            return Err(mismatched(self.opcode, op.body()));
        };
        let scope = KeyScope::of(&put.key);
        let mut required = PrivilegeSet::new().with(Privilege::insert(&scope));
        if reads_previous(put) {
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
        let OperationBody::Put(put) = body else {
            return Err(mismatched(self.opcode, body));
        };
        ensure_scope(txn, partition)?;
        self.ctx.validate_key(&put.key)?;
        self.ctx.limits.validate_value(&put.value)?;
        ensure_owned(txn, &put.key)?;

        let mut acct = Accountant::new(&self.ctx.cost, throughput);
        let existing = live_record(txn, &put.key)?;
        if reads_previous(put) {
            match &existing {
                Some(old) if put.return_choice.includes_value() => {
                    acct.read_record(old.storage_size)
                }
                _ => acct.min_read(),
            }
        }

        let allowed = match put.condition {
            PutCondition::Always => true,
            PutCondition::IfAbsent => existing.is_none(),
            PutCondition::IfPresent => existing.is_some(),
            PutCondition::IfVersion(version) => {
                existing.as_ref().map(|old| old.version) == Some(version)
            }
        };
        let previous = self
            .ctx
            .previous_record(&put.key, existing.as_ref(), put.return_choice)?;
        if !allowed {
            trace!(key = %put.key, opcode = %self.opcode, "put condition not met");
            return Ok(OpResult::Put {
                new_version: None,
                expiration_time: Timestamp::NEVER,
                previous,
            });
        }

        let expiration = match (&existing, put.update_ttl) {
            (Some(old), false) => old.expiration_time,
            _ => put
                .ttl
                .map_or(Timestamp::NEVER, |ttl| ttl.expiration_from(self.ctx.clock.now())),
        };
        let written = txn.put(&put.key, put.value.clone(), expiration)?;
        acct.write_record(written.storage_size);
        if let Some(old) = &existing {
            acct.write_record(old.storage_size);
        }

        Ok(OpResult::Put {
            new_version: Some(written.version),
            expiration_time: written.expiration_time,
            previous,
        })
    }
}
