//! Operations
//!
//! An [`Operation`] is a decoded request plus the throughput it has consumed.
//! The body is a closed enum over operation families; the [`OpCode`] is derived
//! from it, so a body and its tag can never disagree.
//!
//! ```
//! use partis_core::Key;
//! use partis_executor::{OpCode, Operation, PutOp};
//!
//! let key = Key::parse("users/42").unwrap();
//! let op = Operation::put(PutOp::new(key, b"alice".to_vec()).if_absent());
//! assert_eq!(op.opcode(), OpCode::PutIfAbsent);
//! assert!(op.throughput().is_zero());
//! ```

use partis_core::{Depth, Direction, Key, KeyRange, ResumeToken, Timestamp, Version};
use serde::{Deserialize, Serialize};
use std::time::Duration;

use crate::opcode::OpCode;
use crate::throughput::Throughput;
use crate::wire::{ProtocolVersion, WireField};

/// A request being executed
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Operation {
    body: OperationBody,
    throughput: Throughput,
}

/// Opcode-specific payload of an operation
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum OperationBody {
    /// Diagnostic no-op
    Nop,
    /// Point read
    Get(GetOp),
    /// Write, conditional or not
    Put(PutOp),
    /// Delete, conditional or not
    Delete(DeleteOp),
    /// Range delete within one partition
    MultiDelete(MultiDeleteOp),
    /// Scan returning values
    Iterate(IterationRequest),
    /// Scan returning keys and metadata only
    KeysIterate(IterationRequest),
    /// Accounting-only charge
    TableCharge(TableChargeOp),
}

impl OperationBody {
    /// Opcode implied by this body
    pub fn opcode(&self) -> OpCode {
        match self {
            OperationBody::Nop => OpCode::Nop,
            OperationBody::Get(_) => OpCode::Get,
            OperationBody::Put(put) => match put.condition {
                PutCondition::Always => OpCode::Put,
                PutCondition::IfAbsent => OpCode::PutIfAbsent,
                PutCondition::IfPresent => OpCode::PutIfPresent,
                PutCondition::IfVersion(_) => OpCode::PutIfVersion,
            },
            OperationBody::Delete(delete) => match delete.condition {
                DeleteCondition::Always => OpCode::Delete,
                DeleteCondition::IfVersion(_) => OpCode::DeleteIfVersion,
            },
            OperationBody::MultiDelete(_) => OpCode::MultiDelete,
            OperationBody::Iterate(_) => OpCode::StoreIterate,
            OperationBody::KeysIterate(_) => OpCode::StoreKeysIterate,
            OperationBody::TableCharge(_) => OpCode::TableCharge,
        }
    }

    /// Gated fields this body sets to a non-default value
    pub fn gated_fields(&self) -> Vec<WireField> {
        let mut fields = Vec::new();
        match self {
            OperationBody::Put(put) => {
                if put.ttl.is_some() {
                    fields.push(WireField::PutTtl);
                }
                if put.update_ttl {
                    fields.push(WireField::PutUpdateTtl);
                }
            }
            OperationBody::Delete(delete) if delete.tombstone => {
                fields.push(WireField::DeleteTombstone);
            }
            OperationBody::Iterate(req) | OperationBody::KeysIterate(req)
                if req.exclude_tombstones =>
            {
                fields.push(WireField::IterExcludeTombstones);
            }
            _ => {}
        }
        fields
    }
}

impl Operation {
    /// Wrap a body with zeroed counters
    pub fn new(body: OperationBody) -> Self {
        Operation {
            body,
            throughput: Throughput::default(),
        }
    }

    /// Diagnostic no-op
    pub fn nop() -> Self {
        Operation::new(OperationBody::Nop)
    }

    /// Point read of `key`
    pub fn get(key: Key) -> Self {
        Operation::new(OperationBody::Get(GetOp { key }))
    }

    /// Write
    pub fn put(put: PutOp) -> Self {
        Operation::new(OperationBody::Put(put))
    }

    /// Delete
    pub fn delete(delete: DeleteOp) -> Self {
        Operation::new(OperationBody::Delete(delete))
    }

    /// Range delete
    pub fn multi_delete(parent: Key, range: Option<KeyRange>, depth: Depth) -> Self {
        Operation::new(OperationBody::MultiDelete(MultiDeleteOp {
            parent,
            range,
            depth,
        }))
    }

    /// Scan returning values
    pub fn iterate(request: IterationRequest) -> Self {
        Operation::new(OperationBody::Iterate(request))
    }

    /// Scan returning keys only
    pub fn keys_iterate(request: IterationRequest) -> Self {
        Operation::new(OperationBody::KeysIterate(request))
    }

    /// Charge `read_units` against `namespace` without touching storage
    pub fn table_charge(namespace: impl Into<String>, read_units: u32) -> Self {
        Operation::new(OperationBody::TableCharge(TableChargeOp {
            namespace: namespace.into(),
            read_units,
        }))
    }

    /// Opcode of this operation
    pub fn opcode(&self) -> OpCode {
        self.body.opcode()
    }

    /// The request payload
    pub fn body(&self) -> &OperationBody {
        &self.body
    }

    /// Units consumed so far
    pub fn throughput(&self) -> &Throughput {
        &self.throughput
    }

    /// Borrow the payload and the counters at the same time
    ///
    /// This is how handlers charge: the counters are reachable mutably only
    /// while the operation itself is borrowed mutably.
    pub fn split(&mut self) -> (&OperationBody, &mut Throughput) {
        (&self.body, &mut self.throughput)
    }

    /// Oldest protocol version able to carry this operation unchanged
    pub fn min_protocol_version(&self) -> ProtocolVersion {
        self.body
            .gated_fields()
            .into_iter()
            .map(WireField::introduced_in)
            .chain(std::iter::once(self.opcode().introduced_in()))
            .max()
            .unwrap_or(ProtocolVersion::MIN)
    }

    pub(crate) fn throughput_mut(&mut self) -> &mut Throughput {
        &mut self.throughput
    }
}

/// Point read
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GetOp {
    /// Key to read
    pub key: Key,
}

/// What to hand back about the record an operation replaced or removed
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ReturnChoice {
    /// Nothing
    #[default]
    None,
    /// Only its version
    Version,
    /// Only its value
    Value,
    /// Value, version and metadata
    All,
}

impl ReturnChoice {
    /// Does the choice include the value bytes?
    pub fn includes_value(&self) -> bool {
        matches!(self, ReturnChoice::Value | ReturnChoice::All)
    }
}

/// When a put is allowed to write
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum PutCondition {
    /// Always
    #[default]
    Always,
    /// Only if no live record exists
    IfAbsent,
    /// Only if a live record exists
    IfPresent,
    /// Only if the live record has this version
    IfVersion(Version),
}

/// Unit of a time-to-live
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum TtlUnit {
    /// Hours
    Hours,
    /// Days
    Days,
}

impl TtlUnit {
    /// Length of one unit
    pub fn duration(self) -> Duration {
        match self {
            TtlUnit::Hours => Duration::from_secs(60 * 60),
            TtlUnit::Days => Duration::from_secs(24 * 60 * 60),
        }
    }
}

/// Time-to-live of a written record
///
/// A value of zero means the record does not expire.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct TimeToLive {
    /// Number of units
    pub value: u32,
    /// Unit
    pub unit: TtlUnit,
}

impl TimeToLive {
    /// `value` hours
    pub fn hours(value: u32) -> Self {
        TimeToLive {
            value,
            unit: TtlUnit::Hours,
        }
    }

    /// `value` days
    pub fn days(value: u32) -> Self {
        TimeToLive {
            value,
            unit: TtlUnit::Days,
        }
    }

    /// Expiration time for a record written at `now`
    ///
    /// `now + ttl`, rounded up to the next unit boundary, so that expiration
    /// times are always whole hours or days.
    pub fn expiration_from(&self, now: Timestamp) -> Timestamp {
        if self.value == 0 {
            return Timestamp::NEVER;
        }
        let unit = self.unit.duration();
        now.saturating_add(unit * self.value).round_up_to(unit)
    }
}

/// Write
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PutOp {
    /// Key to write
    pub key: Key,
    /// Value bytes
    pub value: Vec<u8>,
    /// Write condition
    pub condition: PutCondition,
    /// What to return about the previous record
    pub return_choice: ReturnChoice,
    /// Time-to-live of the new record
    pub ttl: Option<TimeToLive>,
    /// Apply `ttl` even when overwriting a live record
    pub update_ttl: bool,
}

impl PutOp {
    /// Unconditional write with no TTL
    pub fn new(key: Key, value: Vec<u8>) -> Self {
        PutOp {
            key,
            value,
            condition: PutCondition::Always,
            return_choice: ReturnChoice::None,
            ttl: None,
            update_ttl: false,
        }
    }

    /// Write only if absent
    pub fn if_absent(mut self) -> Self {
        self.condition = PutCondition::IfAbsent;
        self
    }

    /// Write only if present
    pub fn if_present(mut self) -> Self {
        self.condition = PutCondition::IfPresent;
        self
    }

    /// Write only if the live record has `version`
    pub fn if_version(mut self, version: Version) -> Self {
        self.condition = PutCondition::IfVersion(version);
        self
    }

    /// Return the previous record
    pub fn returning(mut self, choice: ReturnChoice) -> Self {
        self.return_choice = choice;
        self
    }

    /// Set a time-to-live
    pub fn with_ttl(mut self, ttl: TimeToLive) -> Self {
        self.ttl = Some(ttl);
        self
    }

    /// Also apply the TTL when overwriting
    pub fn update_ttl(mut self, update: bool) -> Self {
        self.update_ttl = update;
        self
    }

    /// Does the write depend on the current record?
    pub fn is_conditional(&self) -> bool {
        self.condition != PutCondition::Always
    }
}

/// When a delete is allowed to remove
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DeleteCondition {
    /// Whenever a live record exists
    #[default]
    Always,
    /// Only if the live record has this version
    IfVersion(Version),
}

/// Delete
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DeleteOp {
    /// Key to delete
    pub key: Key,
    /// Delete condition
    pub condition: DeleteCondition,
    /// What to return about the removed record
    pub return_choice: ReturnChoice,
    /// Leave a tombstone instead of removing the key
    pub tombstone: bool,
}

impl DeleteOp {
    /// Unconditional delete
    pub fn new(key: Key) -> Self {
        DeleteOp {
            key,
            condition: DeleteCondition::Always,
            return_choice: ReturnChoice::None,
            tombstone: false,
        }
    }

    /// Delete only if the live record has `version`
    pub fn if_version(mut self, version: Version) -> Self {
        self.condition = DeleteCondition::IfVersion(version);
        self
    }

    /// Return the removed record
    pub fn returning(mut self, choice: ReturnChoice) -> Self {
        self.return_choice = choice;
        self
    }

    /// Leave a tombstone
    pub fn with_tombstone(mut self) -> Self {
        self.tombstone = true;
        self
    }

    /// Does the delete depend on the current record?
    pub fn is_conditional(&self) -> bool {
        self.condition != DeleteCondition::Always
    }
}

/// Range delete within one partition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MultiDeleteOp {
    /// Parent key
    pub parent: Key,
    /// Constraint on the component below the parent
    pub range: Option<KeyRange>,
    /// How deep below the parent to delete
    pub depth: Depth,
}

/// Resumable scan request
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct IterationRequest {
    /// Parent key (the root scans the whole store)
    pub parent: Key,
    /// Constraint on the component below the parent
    pub range: Option<KeyRange>,
    /// How deep below the parent to go
    pub depth: Depth,
    /// Result order
    pub direction: Direction,
    /// Entries per call (0 = configured default)
    pub batch_size: u32,
    /// Where to continue from
    pub resume: Option<ResumeToken>,
    /// Skip tombstones instead of returning them flagged
    pub exclude_tombstones: bool,
}

impl IterationRequest {
    /// Forward scan of the whole subtree of `parent`
    pub fn new(parent: Key) -> Self {
        IterationRequest {
            parent,
            range: None,
            depth: Depth::ParentAndDescendants,
            direction: Direction::Forward,
            batch_size: 0,
            resume: None,
            exclude_tombstones: false,
        }
    }

    /// Restrict the component below the parent
    pub fn range(mut self, range: KeyRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Set the depth
    pub fn depth(mut self, depth: Depth) -> Self {
        self.depth = depth;
        self
    }

    /// Set the direction
    pub fn direction(mut self, direction: Direction) -> Self {
        self.direction = direction;
        self
    }

    /// Set the batch size
    pub fn batch_size(mut self, batch_size: u32) -> Self {
        self.batch_size = batch_size;
        self
    }

    /// Continue from `token`
    pub fn resume_from(mut self, token: ResumeToken) -> Self {
        self.resume = Some(token);
        self
    }

    /// Skip tombstones
    pub fn exclude_tombstones(mut self, exclude: bool) -> Self {
        self.exclude_tombstones = exclude;
        self
    }
}

/// Accounting-only charge
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TableChargeOp {
    /// Table being charged
    pub namespace: String,
    /// Read units to charge
    pub read_units: u32,
}
