//! Request encoding
//!
//! ```text
//! Get              := key
//! Put*             := key, bytes value, u8 return_choice,
//!                     [PutIfVersion: u64 version],
//!                     [V2: option<u32 ttl, u8 unit>, bool update_ttl]
//! Delete*          := key, u8 return_choice,
//!                     [DeleteIfVersion: u64 version], [V3: bool tombstone]
//! MultiDelete      := key parent, option<range>, u8 depth
//! Store(Keys)Iterate := key parent, option<range>, u8 depth, u8 direction,
//!                     u32 batch_size, option<resume>, [V3: bool exclude_tombstones]
//! TableCharge      := string namespace, u32 read_units
//! ```

use super::buf::{WireReader, WireWriter};
use super::{
    depth_from_u8, depth_to_u8, direction_from_u8, direction_to_u8, opcode_at,
    return_choice_from_u8, return_choice_to_u8, ttl_unit_from_u8, ttl_unit_to_u8, ProtocolVersion,
    WireField, WireResult,
};
use crate::error::ProtocolError;
use crate::opcode::OpCode;
use crate::operation::{
    DeleteCondition, DeleteOp, GetOp, IterationRequest, MultiDeleteOp, Operation, OperationBody,
    PutCondition, PutOp, TableChargeOp, TimeToLive,
};

/// Encode `op` for a peer speaking `version`
///
/// Fails if the opcode or any field the operation sets is unknown at
/// `version`.
pub fn encode_operation(op: &Operation, version: ProtocolVersion) -> WireResult<Vec<u8>> {
    let opcode = op.opcode();
    if opcode.introduced_in() > version {
        return Err(ProtocolError::UnknownOpcode {
            opcode: opcode.as_u8(),
            version: version.as_u8(),
        });
    }
    if let Some(field) = op
        .body()
        .gated_fields()
        .into_iter()
        .find(|f| !version.supports(*f))
    {
        return Err(ProtocolError::FieldNotSupported {
            field: field.name().to_string(),
            version: version.as_u8(),
            introduced_in: field.introduced_in().as_u8(),
        });
    }

    let mut w = WireWriter::new();
    w.u8(opcode.as_u8());
    match op.body() {
        OperationBody::Nop => {}
        OperationBody::Get(get) => w.key("key", &get.key)?,
        OperationBody::Put(put) => encode_put(&mut w, put, version)?,
        OperationBody::Delete(delete) => encode_delete(&mut w, delete, version)?,
        OperationBody::MultiDelete(md) => {
            w.key("parent", &md.parent)?;
            w.option(md.range.as_ref(), |w, r| w.key_range(r))?;
            w.u8(depth_to_u8(md.depth));
        }
        OperationBody::Iterate(req) | OperationBody::KeysIterate(req) => {
            encode_iteration(&mut w, req, version)?
        }
        OperationBody::TableCharge(charge) => {
            w.string("namespace", &charge.namespace)?;
            w.u32(charge.read_units)?;
        }
    }
    Ok(w.finish())
}

fn encode_put(w: &mut WireWriter, put: &PutOp, version: ProtocolVersion) -> WireResult<()> {
    w.key("key", &put.key)?;
    w.bytes("value", &put.value)?;
    w.u8(return_choice_to_u8(put.return_choice));
    if let PutCondition::IfVersion(v) = put.condition {
        w.version(v)?;
    }
    if version.supports(WireField::PutTtl) {
        w.option(put.ttl.as_ref(), |w, ttl| {
            w.u32(ttl.value)?;
            w.u8(ttl_unit_to_u8(ttl.unit));
            Ok(())
        })?;
    }
    if version.supports(WireField::PutUpdateTtl) {
        w.bool(put.update_ttl);
    }
    Ok(())
}

fn encode_delete(w: &mut WireWriter, delete: &DeleteOp, version: ProtocolVersion) -> WireResult<()> {
    w.key("key", &delete.key)?;
    w.u8(return_choice_to_u8(delete.return_choice));
    if let DeleteCondition::IfVersion(v) = delete.condition {
        w.version(v)?;
    }
    if version.supports(WireField::DeleteTombstone) {
        w.bool(delete.tombstone);
    }
    Ok(())
}

fn encode_iteration(
    w: &mut WireWriter,
    req: &IterationRequest,
    version: ProtocolVersion,
) -> WireResult<()> {
    w.key("parent", &req.parent)?;
    w.option(req.range.as_ref(), |w, r| w.key_range(r))?;
    w.u8(depth_to_u8(req.depth));
    w.u8(direction_to_u8(req.direction));
    w.u32(req.batch_size)?;
    w.option(req.resume.as_ref(), |w, t| w.resume_token(t))?;
    if version.supports(WireField::IterExcludeTombstones) {
        w.bool(req.exclude_tombstones);
    }
    Ok(())
}

/// Decode an operation sent by a peer speaking `version`
///
/// The returned operation has zeroed throughput.
pub fn decode_operation(bytes: &[u8], version: ProtocolVersion) -> WireResult<Operation> {
    let mut r = WireReader::new(bytes);
    let opcode = opcode_at(r.u8("opcode")?, version)?;
    let body = match opcode {
        OpCode::Nop => OperationBody::Nop,
        OpCode::Get => OperationBody::Get(GetOp { key: r.key("key")? }),
        OpCode::Put | OpCode::PutIfAbsent | OpCode::PutIfPresent | OpCode::PutIfVersion => {
            OperationBody::Put(decode_put(&mut r, opcode, version)?)
        }
        OpCode::Delete | OpCode::DeleteIfVersion => {
            OperationBody::Delete(decode_delete(&mut r, opcode, version)?)
        }
        OpCode::MultiDelete => {
            let parent = r.key("parent")?;
            let range = r.option("range", |r| r.key_range())?;
            let depth = depth_from_u8(r.u8("depth")?)?;
            OperationBody::MultiDelete(MultiDeleteOp {
                parent,
                range,
                depth,
            })
        }
        OpCode::StoreIterate => OperationBody::Iterate(decode_iteration(&mut r, version)?),
        OpCode::StoreKeysIterate => OperationBody::KeysIterate(decode_iteration(&mut r, version)?),
        OpCode::TableCharge => {
            let namespace = r.string("namespace")?;
            let read_units = r.u32("read_units")?;
            OperationBody::TableCharge(TableChargeOp {
                namespace,
                read_units,
            })
        }
    };
    r.finish()?;
    Ok(Operation::new(body))
}

fn decode_put(r: &mut WireReader<'_>, opcode: OpCode, version: ProtocolVersion) -> WireResult<PutOp> {
    let key = r.key("key")?;
    let value = r.bytes("value")?;
    let return_choice = return_choice_from_u8(r.u8("return_choice")?)?;
    let condition = match opcode {
        OpCode::PutIfAbsent => PutCondition::IfAbsent,
        OpCode::PutIfPresent => PutCondition::IfPresent,
        OpCode::PutIfVersion => PutCondition::IfVersion(r.version("match_version")?),
        _ => PutCondition::Always,
    };
    let ttl = if version.supports(WireField::PutTtl) {
        r.option("ttl", |r| {
            let value = r.u32("ttl.value")?;
            let unit = ttl_unit_from_u8(r.u8("ttl.unit")?)?;
            Ok(TimeToLive { value, unit })
        })?
    } else {
        None
    };
    let update_ttl = version.supports(WireField::PutUpdateTtl) && r.bool("update_ttl")?;
    Ok(PutOp {
        key,
        value,
        condition,
        return_choice,
        ttl,
        update_ttl,
    })
}

fn decode_delete(
    r: &mut WireReader<'_>,
    opcode: OpCode,
    version: ProtocolVersion,
) -> WireResult<DeleteOp> {
    let key = r.key("key")?;
    let return_choice = return_choice_from_u8(r.u8("return_choice")?)?;
    let condition = match opcode {
        OpCode::DeleteIfVersion => DeleteCondition::IfVersion(r.version("match_version")?),
        _ => DeleteCondition::Always,
    };
    let tombstone = version.supports(WireField::DeleteTombstone) && r.bool("tombstone")?;
    Ok(DeleteOp {
        key,
        condition,
        return_choice,
        tombstone,
    })
}

fn decode_iteration(r: &mut WireReader<'_>, version: ProtocolVersion) -> WireResult<IterationRequest> {
    let parent = r.key("parent")?;
    let range = r.option("range", |r| r.key_range())?;
    let depth = depth_from_u8(r.u8("depth")?)?;
    let direction = direction_from_u8(r.u8("direction")?)?;
    let batch_size = r.u32("batch_size")?;
    let resume = r.option("resume", |r| r.resume_token())?;
    let exclude_tombstones =
        version.supports(WireField::IterExcludeTombstones) && r.bool("exclude_tombstones")?;
    Ok(IterationRequest {
        parent,
        range,
        depth,
        direction,
        batch_size,
        resume,
        exclude_tombstones,
    })
}
