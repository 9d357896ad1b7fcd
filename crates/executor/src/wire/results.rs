//! Response encoding
//!
//! ```text
//! response    := u8 opcode, u32 read_units, u32 write_units, body
//! record      := bytes value, u64 version, u64 expiration,
//!                [V2: u64 modification_time], [V3: u64 storage_size]
//! previous    := u8 tag (0 none, 1 version, 2 value, 3 all), then the field
//! Get         := option<record>
//! Put*        := option<u64 new_version>, u64 expiration, previous
//! Delete*     := bool deleted, previous
//! MultiDelete := u32 deleted
//! StoreIterate     := u32 count, count * (key, record, [V3: bool tombstone]), option<resume>
//! StoreKeysIterate := u32 count, count * (key, u64 version, u64 expiration,
//!                     [V2: u64 modification_time], [V3: u64 storage_size],
//!                     [V3: bool tombstone]), option<resume>
//! Nop, TableCharge := empty
//! ```
//!
//! Fields an older peer does not know are left out. Decoding at that version
//! yields zero for the missing times and sizes and `false` for tombstone flags.

use partis_core::Timestamp;

use super::buf::{WireReader, WireWriter};
use super::{opcode_at, ProtocolVersion, WireField, WireResult};
use crate::error::ProtocolError;
use crate::opcode::OpCode;
use crate::result::{
    IterationBatch, KeyEntry, KeyValueEntry, OpResult, PreviousRecord, Response,
    ResultValueVersion,
};
use crate::throughput::Throughput;

/// Encode a response for a peer speaking `version`
pub fn encode_response(response: &Response, version: ProtocolVersion) -> WireResult<Vec<u8>> {
    let opcode = response.opcode;
    if opcode.introduced_in() > version {
        return Err(ProtocolError::UnknownOpcode {
            opcode: opcode.as_u8(),
            version: version.as_u8(),
        });
    }
    if !response.result.matches(opcode) {
        return Err(ProtocolError::invalid(
            "result",
            format!("result does not belong to opcode {}", opcode),
        ));
    }

    let mut w = WireWriter::new();
    w.u8(opcode.as_u8());
    w.u32(response.throughput.read_units())?;
    w.u32(response.throughput.write_units())?;
    match &response.result {
        OpResult::Nop | OpResult::TableCharged => {}
        OpResult::Get(record) => w.option(record.as_ref(), |w, rvv| write_record(w, rvv, version))?,
        OpResult::Put {
            new_version,
            expiration_time,
            previous,
        } => {
            w.option(new_version.as_ref(), |w, v| {
                w.version(*v)?;
                Ok(())
            })?;
            w.timestamp(*expiration_time)?;
            write_previous(&mut w, previous.as_ref(), version)?;
        }
        OpResult::Delete { deleted, previous } => {
            w.bool(*deleted);
            write_previous(&mut w, previous.as_ref(), version)?;
        }
        OpResult::MultiDelete { deleted } => w.u32(*deleted)?,
        OpResult::Iterate(batch) => {
            write_count(&mut w, batch.entries.len())?;
            for entry in &batch.entries {
                w.key("entry.key", &entry.key)?;
                write_record(&mut w, &entry.record, version)?;
                if version.supports(WireField::ResultTombstone) {
                    w.bool(entry.tombstone);
                }
            }
            w.option(batch.resume.as_ref(), |w, t| w.resume_token(t))?;
        }
        OpResult::KeysIterate(batch) => {
            write_count(&mut w, batch.entries.len())?;
            for entry in &batch.entries {
                w.key("entry.key", &entry.key)?;
                w.version(entry.version)?;
                w.timestamp(entry.expiration_time)?;
                if version.supports(WireField::ResultModificationTime) {
                    w.timestamp(entry.modification_time)?;
                }
                if version.supports(WireField::ResultStorageSize) {
                    w.u64(entry.storage_size)?;
                }
                if version.supports(WireField::ResultTombstone) {
                    w.bool(entry.tombstone);
                }
            }
            w.option(batch.resume.as_ref(), |w, t| w.resume_token(t))?;
        }
    }
    Ok(w.finish())
}

fn write_count(w: &mut WireWriter, len: usize) -> WireResult<()> {
    let count =
        u32::try_from(len).map_err(|_| ProtocolError::invalid("entries", "too many entries"))?;
    w.u32(count)?;
    Ok(())
}

fn write_record(
    w: &mut WireWriter,
    rvv: &ResultValueVersion,
    version: ProtocolVersion,
) -> WireResult<()> {
    w.bytes("record.value", rvv.value())?;
    w.version(rvv.version())?;
    w.timestamp(rvv.expiration_time())?;
    if version.supports(WireField::ResultModificationTime) {
        w.timestamp(rvv.modification_time())?;
    }
    if version.supports(WireField::ResultStorageSize) {
        w.u64(rvv.storage_size())?;
    }
    Ok(())
}

fn write_previous(
    w: &mut WireWriter,
    previous: Option<&PreviousRecord>,
    version: ProtocolVersion,
) -> WireResult<()> {
    match previous {
        None => w.u8(0),
        Some(PreviousRecord::Version(v)) => {
            w.u8(1);
            w.version(*v)?;
        }
        Some(PreviousRecord::Value(value)) => {
            w.u8(2);
            w.bytes("previous.value", value)?;
        }
        Some(PreviousRecord::All(rvv)) => {
            w.u8(3);
            write_record(w, rvv, version)?;
        }
    }
    Ok(())
}

/// Decode a response from a peer speaking `version`
pub fn decode_response(bytes: &[u8], version: ProtocolVersion) -> WireResult<Response> {
    let mut r = WireReader::new(bytes);
    let opcode = opcode_at(r.u8("opcode")?, version)?;
    let throughput = Throughput::new(r.u32("read_units")?, r.u32("write_units")?);
    let result = match opcode {
        OpCode::Nop => OpResult::Nop,
        OpCode::TableCharge => OpResult::TableCharged,
        OpCode::Get => OpResult::Get(r.option("record", |r| read_record(r, version))?),
        OpCode::Put | OpCode::PutIfAbsent | OpCode::PutIfPresent | OpCode::PutIfVersion => {
            let new_version = r.option("new_version", |r| r.version("new_version"))?;
            let expiration_time = r.timestamp("expiration_time")?;
            let previous = read_previous(&mut r, version)?;
            OpResult::Put {
                new_version,
                expiration_time,
                previous,
            }
        }
        OpCode::Delete | OpCode::DeleteIfVersion => {
            let deleted = r.bool("deleted")?;
            let previous = read_previous(&mut r, version)?;
            OpResult::Delete { deleted, previous }
        }
        OpCode::MultiDelete => OpResult::MultiDelete {
            deleted: r.u32("deleted")?,
        },
        OpCode::StoreIterate => {
            let count = r.u32("entries")? as usize;
            let mut entries = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let key = r.key("entry.key")?;
                let record = read_record(&mut r, version)?;
                let tombstone =
                    version.supports(WireField::ResultTombstone) && r.bool("entry.tombstone")?;
                entries.push(KeyValueEntry {
                    key,
                    record,
                    tombstone,
                });
            }
            let resume = r.option("resume", |r| r.resume_token())?;
            OpResult::Iterate(IterationBatch { entries, resume })
        }
        OpCode::StoreKeysIterate => {
            let count = r.u32("entries")? as usize;
            let mut entries = Vec::with_capacity(count.min(1024));
            for _ in 0..count {
                let key = r.key("entry.key")?;
                let version_field = r.version("entry.version")?;
                let expiration_time = r.timestamp("entry.expiration_time")?;
                let modification_time = read_modification_time(&mut r, version)?;
                let storage_size = read_storage_size(&mut r, version)?;
                let tombstone =
                    version.supports(WireField::ResultTombstone) && r.bool("entry.tombstone")?;
                entries.push(KeyEntry {
                    key,
                    version: version_field,
                    expiration_time,
                    modification_time,
                    storage_size,
                    tombstone,
                });
            }
            let resume = r.option("resume", |r| r.resume_token())?;
            OpResult::KeysIterate(IterationBatch { entries, resume })
        }
    };
    r.finish()?;
    Ok(Response {
        opcode,
        result,
        throughput,
    })
}

fn read_modification_time(
    r: &mut WireReader<'_>,
    version: ProtocolVersion,
) -> WireResult<Timestamp> {
    if version.supports(WireField::ResultModificationTime) {
        r.timestamp("modification_time")
    } else {
        Ok(Timestamp::EPOCH)
    }
}

fn read_storage_size(r: &mut WireReader<'_>, version: ProtocolVersion) -> WireResult<u64> {
    if version.supports(WireField::ResultStorageSize) {
        r.u64("storage_size")
    } else {
        Ok(0)
    }
}

fn read_record(r: &mut WireReader<'_>, version: ProtocolVersion) -> WireResult<ResultValueVersion> {
    let value = r.bytes("record.value")?;
    let record_version = r.version("record.version")?;
    let expiration_time = r.timestamp("record.expiration_time")?;
    let modification_time = read_modification_time(r, version)?;
    let storage_size = read_storage_size(r, version)?;
    Ok(ResultValueVersion::from_parts(
        value,
        record_version,
        expiration_time,
        modification_time,
        storage_size,
    ))
}

fn read_previous(
    r: &mut WireReader<'_>,
    version: ProtocolVersion,
) -> WireResult<Option<PreviousRecord>> {
    match r.u8("previous")? {
        0 => Ok(None),
        1 => Ok(Some(PreviousRecord::Version(r.version("previous.version")?))),
        2 => Ok(Some(PreviousRecord::Value(r.bytes("previous.value")?))),
        3 => Ok(Some(PreviousRecord::All(read_record(r, version)?))),
        other => Err(ProtocolError::invalid(
            "previous",
            format!("unknown previous-record tag {}", other),
        )),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use partis_core::{Key, ResumeToken, Version};

    fn rvv(value: &[u8]) -> ResultValueVersion {
        ResultValueVersion::from_parts(
            value.to_vec(),
            Version::new(7),
            Timestamp::from_millis(3_600_000),
            Timestamp::from_millis(1_234),
            40,
        )
    }

    fn response(opcode: OpCode, result: OpResult) -> Response {
        Response {
            opcode,
            result,
            throughput: Throughput::new(2, 3),
        }
    }

    #[test]
    fn test_header_layout() {
        let bytes = encode_response(&response(OpCode::Nop, OpResult::Nop), ProtocolVersion::V1)
            .unwrap();
        assert_eq!(bytes, vec![0, 0, 0, 0, 2, 0, 0, 0, 3]);
    }

    #[test]
    fn test_put_result_round_trip() {
        let resp = response(
            OpCode::PutIfVersion,
            OpResult::Put {
                new_version: Some(Version::new(8)),
                expiration_time: Timestamp::NEVER,
                previous: Some(PreviousRecord::All(rvv(b"old"))),
            },
        );
        let bytes = encode_response(&resp, ProtocolVersion::V3).unwrap();
        assert_eq!(decode_response(&bytes, ProtocolVersion::V3).unwrap(), resp);
    }

    #[test]
    fn test_old_peer_loses_metadata() {
        let resp = response(OpCode::Get, OpResult::Get(Some(rvv(b"v"))));
        let bytes = encode_response(&resp, ProtocolVersion::V1).unwrap();
        let decoded = decode_response(&bytes, ProtocolVersion::V1).unwrap();
        match decoded.result {
            OpResult::Get(Some(record)) => {
                assert_eq!(record.value(), b"v");
                assert_eq!(record.version(), Version::new(7));
                assert_eq!(record.modification_time(), Timestamp::EPOCH);
                assert_eq!(record.storage_size(), 0);
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_tombstone_flag_dropped_before_v3() {
        let batch = IterationBatch {
            entries: vec![KeyEntry {
                key: Key::parse("t/a").unwrap(),
                version: Version::new(2),
                expiration_time: Timestamp::NEVER,
                modification_time: Timestamp::from_millis(5),
                storage_size: 3,
                tombstone: true,
            }],
            resume: Some(ResumeToken::after(Key::parse("t/a").unwrap())),
        };
        let resp = response(OpCode::StoreKeysIterate, OpResult::KeysIterate(batch));

        let v3 = encode_response(&resp, ProtocolVersion::V3).unwrap();
        assert_eq!(decode_response(&v3, ProtocolVersion::V3).unwrap(), resp);

        let v2 = encode_response(&resp, ProtocolVersion::V2).unwrap();
        match decode_response(&v2, ProtocolVersion::V2).unwrap().result {
            OpResult::KeysIterate(batch) => {
                assert!(!batch.entries[0].tombstone);
                assert_eq!(batch.entries[0].modification_time, Timestamp::from_millis(5));
                assert_eq!(batch.entries[0].storage_size, 0);
                assert!(!batch.is_exhausted());
            }
            other => panic!("unexpected {:?}", other),
        }
    }

    #[test]
    fn test_mismatched_result_is_refused() {
        let resp = response(OpCode::Get, OpResult::MultiDelete { deleted: 1 });
        assert!(matches!(
            encode_response(&resp, ProtocolVersion::V3),
            Err(ProtocolError::InvalidField { .. })
        ));
    }

    #[test]
    fn test_bad_previous_tag() {
        // Delete response: header, deleted=1, tag 9
        let bytes = vec![6, 0, 0, 0, 1, 0, 0, 0, 1, 1, 9];
        assert!(matches!(
            decode_response(&bytes, ProtocolVersion::V1),
            Err(ProtocolError::InvalidField { .. })
        ));
    }
}
