//! Operation codes
//!
//! Opcodes are dense, starting at zero, so the handler registry can be a
//! plain array indexed by `OpCode as usize`.

use serde::{Deserialize, Serialize};
use std::fmt;

use crate::wire::ProtocolVersion;

/// Identifies an operation type on the wire and in the registry
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[repr(u8)]
pub enum OpCode {
    /// Diagnostic no-op
    Nop = 0,
    /// Point read
    Get = 1,
    /// Unconditional write
    Put = 2,
    /// Write if no live record exists
    PutIfAbsent = 3,
    /// Write if a live record exists
    PutIfPresent = 4,
    /// Write if the live record has a given version
    PutIfVersion = 5,
    /// Remove a record
    Delete = 6,
    /// Remove a record if it has a given version
    DeleteIfVersion = 7,
    /// Remove every record under a parent within one partition
    MultiDelete = 8,
    /// Paged scan returning keys and values
    StoreIterate = 9,
    /// Paged scan returning keys and metadata
    StoreKeysIterate = 10,
    /// Accounting-only read charge against a table
    TableCharge = 11,
}

impl OpCode {
    /// Number of opcodes
    pub const COUNT: usize = 12;

    /// Every opcode, in numeric order
    pub const ALL: [OpCode; OpCode::COUNT] = [
        OpCode::Nop,
        OpCode::Get,
        OpCode::Put,
        OpCode::PutIfAbsent,
        OpCode::PutIfPresent,
        OpCode::PutIfVersion,
        OpCode::Delete,
        OpCode::DeleteIfVersion,
        OpCode::MultiDelete,
        OpCode::StoreIterate,
        OpCode::StoreKeysIterate,
        OpCode::TableCharge,
    ];

    /// Parse a wire opcode
    pub fn from_u8(raw: u8) -> Option<Self> {
        OpCode::ALL.get(raw as usize).copied()
    }

    /// Wire representation
    #[inline]
    pub fn as_u8(self) -> u8 {
        self as u8
    }

    /// First protocol version that knows this opcode
    pub fn introduced_in(self) -> ProtocolVersion {
        match self {
            OpCode::TableCharge => ProtocolVersion::V3,
            _ => ProtocolVersion::V1,
        }
    }

    /// Stable name for logs
    pub fn name(self) -> &'static str {
        match self {
            OpCode::Nop => "Nop",
            OpCode::Get => "Get",
            OpCode::Put => "Put",
            OpCode::PutIfAbsent => "PutIfAbsent",
            OpCode::PutIfPresent => "PutIfPresent",
            OpCode::PutIfVersion => "PutIfVersion",
            OpCode::Delete => "Delete",
            OpCode::DeleteIfVersion => "DeleteIfVersion",
            OpCode::MultiDelete => "MultiDelete",
            OpCode::StoreIterate => "StoreIterate",
            OpCode::StoreKeysIterate => "StoreKeysIterate",
            OpCode::TableCharge => "TableCharge",
        }
    }
}

impl fmt::Display for OpCode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_all_is_dense_and_ordered() {
        for (i, op) in OpCode::ALL.iter().enumerate() {
            assert_eq!(op.as_u8() as usize, i);
            assert_eq!(OpCode::from_u8(i as u8), Some(*op));
        }
        assert_eq!(OpCode::from_u8(OpCode::COUNT as u8), None);
        assert_eq!(OpCode::from_u8(0xFF), None);
    }

    #[test]
    fn test_introduced_in() {
        assert_eq!(OpCode::Get.introduced_in(), ProtocolVersion::V1);
        assert_eq!(OpCode::TableCharge.introduced_in(), ProtocolVersion::V3);
    }
}
