//! Primitive field encoding
//!
//! All integers are big-endian. Composite layouts:
//!
//! ```text
//! key    := u16 count, then per component: u16 len, UTF-8 bytes
//! string := u16 len, UTF-8 bytes
//! bytes  := u32 len, bytes
//! option := u8 flag (0 = absent, 1 = present), then the field
//! bool   := u8 (0 or 1)
//! ```

use byteorder::{BigEndian, ReadBytesExt, WriteBytesExt};
use partis_core::{Key, KeyRange, ResumeToken, Timestamp, Version};
use std::io::{Cursor, Read};

use crate::error::ProtocolError;

type WireResult<T> = std::result::Result<T, ProtocolError>;

fn write_failed(e: std::io::Error) -> ProtocolError {
    ProtocolError::invalid("buffer", e.to_string())
}

/// Appends encoded fields to a buffer
#[derive(Debug, Default)]
pub(crate) struct WireWriter {
    buf: Vec<u8>,
}

impl WireWriter {
    pub(crate) fn new() -> Self {
        WireWriter::default()
    }

    pub(crate) fn finish(self) -> Vec<u8> {
        self.buf
    }

    pub(crate) fn u8(&mut self, v: u8) {
        self.buf.push(v);
    }

    pub(crate) fn u16(&mut self, v: u16) -> WireResult<()> {
        self.buf.write_u16::<BigEndian>(v).map_err(write_failed)
    }

    pub(crate) fn u32(&mut self, v: u32) -> WireResult<()> {
        self.buf.write_u32::<BigEndian>(v).map_err(write_failed)
    }

    pub(crate) fn u64(&mut self, v: u64) -> WireResult<()> {
        self.buf.write_u64::<BigEndian>(v).map_err(write_failed)
    }

    pub(crate) fn bool(&mut self, v: bool) {
        self.u8(u8::from(v));
    }

    pub(crate) fn string(&mut self, field: &str, s: &str) -> WireResult<()> {
        let len = u16::try_from(s.len())
            .map_err(|_| ProtocolError::invalid(field, "string longer than 65535 bytes"))?;
        self.u16(len)?;
        self.buf.extend_from_slice(s.as_bytes());
        Ok(())
    }

    pub(crate) fn bytes(&mut self, field: &str, b: &[u8]) -> WireResult<()> {
        let len = u32::try_from(b.len())
            .map_err(|_| ProtocolError::invalid(field, "byte string longer than 4GiB"))?;
        self.u32(len)?;
        self.buf.extend_from_slice(b);
        Ok(())
    }

    pub(crate) fn version(&mut self, v: Version) -> WireResult<()> {
        self.u64(v.as_u64())
    }

    pub(crate) fn timestamp(&mut self, t: Timestamp) -> WireResult<()> {
        self.u64(t.as_millis())
    }

    pub(crate) fn key(&mut self, field: &str, key: &Key) -> WireResult<()> {
        let count = u16::try_from(key.len())
            .map_err(|_| ProtocolError::invalid(field, "too many key components"))?;
        self.u16(count)?;
        for component in key.components() {
            self.string(field, component)?;
        }
        Ok(())
    }

    /// Presence flag, then the value if present
    pub(crate) fn option<T: ?Sized>(
        &mut self,
        value: Option<&T>,
        write: impl FnOnce(&mut Self, &T) -> WireResult<()>,
    ) -> WireResult<()> {
        match value {
            None => {
                self.u8(0);
                Ok(())
            }
            Some(v) => {
                self.u8(1);
                write(self, v)
            }
        }
    }

    pub(crate) fn key_range(&mut self, range: &KeyRange) -> WireResult<()> {
        self.option(range.start(), |w, s| w.string("range.start", s))?;
        self.bool(range.start_inclusive());
        self.option(range.end(), |w, s| w.string("range.end", s))?;
        self.bool(range.end_inclusive());
        Ok(())
    }

    pub(crate) fn resume_token(&mut self, token: &ResumeToken) -> WireResult<()> {
        self.key("resume.key", &token.key)?;
        self.bool(token.inclusive);
        Ok(())
    }
}

/// Reads encoded fields from a byte slice
pub(crate) struct WireReader<'a> {
    cursor: Cursor<&'a [u8]>,
}

impl<'a> WireReader<'a> {
    pub(crate) fn new(bytes: &'a [u8]) -> Self {
        WireReader {
            cursor: Cursor::new(bytes),
        }
    }

    fn remaining(&self) -> usize {
        let len = self.cursor.get_ref().len() as u64;
        len.saturating_sub(self.cursor.position()) as usize
    }

    /// Fail unless every byte was consumed
    pub(crate) fn finish(self) -> WireResult<()> {
        match self.remaining() {
            0 => Ok(()),
            count => Err(ProtocolError::TrailingBytes { count }),
        }
    }

    pub(crate) fn u8(&mut self, field: &str) -> WireResult<u8> {
        self.cursor
            .read_u8()
            .map_err(|_| ProtocolError::truncated(field))
    }

    pub(crate) fn u16(&mut self, field: &str) -> WireResult<u16> {
        self.cursor
            .read_u16::<BigEndian>()
            .map_err(|_| ProtocolError::truncated(field))
    }

    pub(crate) fn u32(&mut self, field: &str) -> WireResult<u32> {
        self.cursor
            .read_u32::<BigEndian>()
            .map_err(|_| ProtocolError::truncated(field))
    }

    pub(crate) fn u64(&mut self, field: &str) -> WireResult<u64> {
        self.cursor
            .read_u64::<BigEndian>()
            .map_err(|_| ProtocolError::truncated(field))
    }

    pub(crate) fn bool(&mut self, field: &str) -> WireResult<bool> {
        match self.u8(field)? {
            0 => Ok(false),
            1 => Ok(true),
            other => Err(ProtocolError::invalid(
                field,
                format!("boolean must be 0 or 1, got {}", other),
            )),
        }
    }

    fn take(&mut self, field: &str, len: usize) -> WireResult<Vec<u8>> {
        if len > self.remaining() {
            return Err(ProtocolError::truncated(field));
        }
        let mut out = vec![0u8; len];
        self.cursor
            .read_exact(&mut out)
            .map_err(|_| ProtocolError::truncated(field))?;
        Ok(out)
    }

    pub(crate) fn string(&mut self, field: &str) -> WireResult<String> {
        let len = self.u16(field)? as usize;
        let raw = self.take(field, len)?;
        String::from_utf8(raw).map_err(|_| ProtocolError::invalid(field, "invalid UTF-8"))
    }

    pub(crate) fn bytes(&mut self, field: &str) -> WireResult<Vec<u8>> {
        let len = self.u32(field)? as usize;
        self.take(field, len)
    }

    pub(crate) fn version(&mut self, field: &str) -> WireResult<Version> {
        self.u64(field).map(Version::new)
    }

    pub(crate) fn timestamp(&mut self, field: &str) -> WireResult<Timestamp> {
        self.u64(field).map(Timestamp::from_millis)
    }

    pub(crate) fn key(&mut self, field: &str) -> WireResult<Key> {
        let count = self.u16(field)? as usize;
        let mut components = Vec::with_capacity(count.min(64));
        for _ in 0..count {
            components.push(self.string(field)?);
        }
        Key::new(components).map_err(|e| ProtocolError::invalid(field, e.to_string()))
    }

    pub(crate) fn option<T>(
        &mut self,
        field: &str,
        read: impl FnOnce(&mut Self) -> WireResult<T>,
    ) -> WireResult<Option<T>> {
        if self.bool(field)? {
            read(self).map(Some)
        } else {
            Ok(None)
        }
    }

    pub(crate) fn key_range(&mut self) -> WireResult<KeyRange> {
        let start = self.option("range.start", |r| r.string("range.start"))?;
        let start_inclusive = self.bool("range.start_inclusive")?;
        let end = self.option("range.end", |r| r.string("range.end"))?;
        let end_inclusive = self.bool("range.end_inclusive")?;
        KeyRange::new(
            start.as_deref(),
            start_inclusive,
            end.as_deref(),
            end_inclusive,
        )
        .map_err(|e| ProtocolError::invalid("range", e.to_string()))
    }

    pub(crate) fn resume_token(&mut self) -> WireResult<ResumeToken> {
        let key = self.key("resume.key")?;
        let inclusive = self.bool("resume.inclusive")?;
        Ok(ResumeToken { key, inclusive })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_key_layout() {
        let mut w = WireWriter::new();
        w.key("key", &Key::parse("ab/c").unwrap()).unwrap();
        assert_eq!(w.finish(), vec![0, 2, 0, 2, b'a', b'b', 0, 1, b'c']);
    }

    #[test]
    fn test_resume_token_is_key_plus_flag() {
        let key = Key::parse("a/b").unwrap();
        let mut plain = WireWriter::new();
        plain.key("key", &key).unwrap();
        let mut token = WireWriter::new();
        token.resume_token(&ResumeToken::after(key)).unwrap();

        let mut expected = plain.finish();
        expected.push(0);
        assert_eq!(token.finish(), expected);
    }

    #[test]
    fn test_key_range_layout() {
        let range = KeyRange::new(Some("b"), true, None, false).unwrap();
        let mut w = WireWriter::new();
        w.key_range(&range).unwrap();
        let bytes = w.finish();
        assert_eq!(bytes, vec![1, 0, 1, b'b', 1, 0, 0]);

        let mut r = WireReader::new(&bytes);
        assert_eq!(r.key_range().unwrap(), range);
        r.finish().unwrap();
    }

    #[test]
    fn test_truncated_reads() {
        let mut r = WireReader::new(&[0, 5, b'a']);
        assert_eq!(
            r.string("name"),
            Err(ProtocolError::Truncated {
                field: "name".into()
            })
        );

        let mut r = WireReader::new(&[0xFF, 0xFF, 0xFF, 0xFF]);
        assert!(matches!(r.bytes("value"), Err(ProtocolError::Truncated { .. })));
    }

    #[test]
    fn test_invalid_bool_and_utf8() {
        let mut r = WireReader::new(&[2]);
        assert!(matches!(r.bool("flag"), Err(ProtocolError::InvalidField { .. })));

        let mut r = WireReader::new(&[0, 1, 0xFF]);
        assert!(matches!(r.string("s"), Err(ProtocolError::InvalidField { .. })));
    }

    #[test]
    fn test_invalid_key_component() {
        // One empty component
        let mut r = WireReader::new(&[0, 1, 0, 0]);
        assert!(matches!(r.key("key"), Err(ProtocolError::InvalidField { .. })));
    }

    #[test]
    fn test_trailing_bytes() {
        let mut r = WireReader::new(&[1, 2, 3]);
        r.u8("x").unwrap();
        assert_eq!(r.finish(), Err(ProtocolError::TrailingBytes { count: 2 }));
    }

    #[test]
    fn test_integers_are_big_endian() {
        let mut w = WireWriter::new();
        w.u32(0x0102_0304).unwrap();
        w.u64(5).unwrap();
        let bytes = w.finish();
        assert_eq!(&bytes[..4], &[1, 2, 3, 4]);
        let mut r = WireReader::new(&bytes);
        assert_eq!(r.u32("a").unwrap(), 0x0102_0304);
        assert_eq!(r.u64("b").unwrap(), 5);
        r.finish().unwrap();
    }
}
