//! Protocol versions and the version-gated field table
//!
//! | Version | Adds |
//! |---------|------|
//! | V1 | baseline |
//! | V2 | TTL on puts, modification time in results |
//! | V3 | tombstones (delete flag, iteration filter, result flags), storage size in results, `TableCharge` |
//!
//! Every field that did not exist in V1 is listed exactly once in
//! [`WireField`]. The encoder and the decoder both ask
//! [`WireField::introduced_in`] whether a field is present at a version, so
//! they cannot disagree about the layout.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::error::ProtocolError;

/// Negotiated protocol version
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ProtocolVersion {
    /// Baseline protocol
    V1 = 1,
    /// Adds TTL and modification times
    V2 = 2,
    /// Adds tombstones, storage sizes and table charges
    V3 = 3,
}

impl ProtocolVersion {
    /// Newest version this build speaks
    pub const CURRENT: ProtocolVersion = ProtocolVersion::V3;

    /// Oldest version this build speaks
    pub const MIN: ProtocolVersion = ProtocolVersion::V1;

    /// All versions, oldest first
    pub const ALL: [ProtocolVersion; 3] =
        [ProtocolVersion::V1, ProtocolVersion::V2, ProtocolVersion::V3];

    /// Parse a version number
    pub fn from_u8(raw: u8) -> Result<Self, ProtocolError> {
        match raw {
            1 => Ok(ProtocolVersion::V1),
            2 => Ok(ProtocolVersion::V2),
            3 => Ok(ProtocolVersion::V3),
            other => Err(ProtocolError::UnsupportedVersion { version: other }),
        }
    }

    /// Version number as carried in handshakes
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// Is `field` part of the layout at this version?
    pub fn supports(self, field: WireField) -> bool {
        self >= field.introduced_in()
    }
}

impl fmt::Display for ProtocolVersion {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "V{}", self.as_u8())
    }
}

/// Fields added after V1
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireField {
    /// `PutOp::ttl`
    PutTtl,
    /// `PutOp::update_ttl`
    PutUpdateTtl,
    /// `DeleteOp::tombstone`
    DeleteTombstone,
    /// `IterationRequest::exclude_tombstones`
    IterExcludeTombstones,
    /// Modification time in returned records
    ResultModificationTime,
    /// Storage size in returned records
    ResultStorageSize,
    /// Tombstone flag on iteration entries
    ResultTombstone,
}

impl WireField {
    /// Every gated field
    pub const ALL: [WireField; 7] = [
        WireField::PutTtl,
        WireField::PutUpdateTtl,
        WireField::DeleteTombstone,
        WireField::IterExcludeTombstones,
        WireField::ResultModificationTime,
        WireField::ResultStorageSize,
        WireField::ResultTombstone,
    ];

    /// First protocol version carrying this field
    pub fn introduced_in(self) -> ProtocolVersion {
        match self {
            WireField::PutTtl => ProtocolVersion::V2,
            WireField::PutUpdateTtl => ProtocolVersion::V2,
            WireField::ResultModificationTime => ProtocolVersion::V2,
            WireField::DeleteTombstone => ProtocolVersion::V3,
            WireField::IterExcludeTombstones => ProtocolVersion::V3,
            WireField::ResultStorageSize => ProtocolVersion::V3,
            WireField::ResultTombstone => ProtocolVersion::V3,
        }
    }

    /// Name used in error messages
    pub fn name(self) -> &'static str {
        match self {
            WireField::PutTtl => "put.ttl",
            WireField::PutUpdateTtl => "put.update_ttl",
            WireField::DeleteTombstone => "delete.tombstone",
            WireField::IterExcludeTombstones => "iterate.exclude_tombstones",
            WireField::ResultModificationTime => "result.modification_time",
            WireField::ResultStorageSize => "result.storage_size",
            WireField::ResultTombstone => "result.tombstone",
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_version_parse() {
        for v in ProtocolVersion::ALL {
            assert_eq!(ProtocolVersion::from_u8(v.as_u8()).unwrap(), v);
        }
        assert_eq!(
            ProtocolVersion::from_u8(0),
            Err(ProtocolError::UnsupportedVersion { version: 0 })
        );
        assert!(ProtocolVersion::from_u8(4).is_err());
    }

    #[test]
    fn test_version_ordering() {
        assert!(ProtocolVersion::MIN < ProtocolVersion::CURRENT);
        assert_eq!(ProtocolVersion::CURRENT.to_string(), "V3");
    }

    #[test]
    fn test_field_table() {
        assert!(!ProtocolVersion::V1.supports(WireField::PutTtl));
        assert!(ProtocolVersion::V2.supports(WireField::PutTtl));
        assert!(!ProtocolVersion::V2.supports(WireField::DeleteTombstone));
        for field in WireField::ALL {
            assert!(ProtocolVersion::CURRENT.supports(field), "{}", field.name());
            assert!(field.introduced_in() > ProtocolVersion::V1);
        }
    }
}
