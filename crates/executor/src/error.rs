//! Error types for operation execution.
//!
//! All errors from execution are represented by the [`Error`] enum.
//! These errors are:
//! - **Structured**: Each variant has typed fields for error details
//! - **Serializable**: Can be converted to/from JSON
//! - **Final**: The executor never retries; the caller owns retry policy

use partis_core::{KeyError, LimitError, PartitionId, StorageFault};
use partis_security::{AccessDenied, Privilege};
use serde::{Deserialize, Serialize};

/// Operation execution errors.
///
/// # Categories
///
/// | Category | Variants | Description |
/// |----------|----------|-------------|
/// | Protocol | `Protocol` | Malformed or unsupported wire input |
/// | Authorization | `AccessDenied` | Subject lacks a required privilege |
/// | Storage | `Storage` | Fault reported by the transaction |
/// | Iteration | `Iteration` | Resume token or start position rejected |
/// | Validation | `InvalidInput`, `WrongPartition` | Bad input for this node |
/// | System | `Internal` | Bug or invariant violation |
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, thiserror::Error)]
pub enum Error {
    // ==================== Protocol ====================
    /// Wire input could not be decoded or encoded
    #[error("protocol error: {0}")]
    Protocol(#[from] ProtocolError),

    // ==================== Authorization ====================
    /// The subject is missing required privileges
    #[error("access denied for '{principal}': missing {missing:?}")]
    AccessDenied {
        /// Principal that was refused
        principal: String,
        /// Privileges it lacked
        missing: Vec<Privilege>,
    },

    // ==================== Storage ====================
    /// The storage transaction failed
    #[error("storage fault: {0}")]
    Storage(#[from] StorageFault),

    // ==================== Iteration ====================
    /// A scan could not start or resume here
    #[error("iteration error: {0}")]
    Iteration(#[from] IterationError),

    // ==================== Validation ====================
    /// Invalid input
    #[error("invalid input: {reason}")]
    InvalidInput {
        /// What was wrong
        reason: String,
    },

    /// A key addressed a partition other than the one executing the operation
    #[error("key {key} is not owned by partition {partition}")]
    WrongPartition {
        /// Rendered key
        key: String,
        /// Partition that received the operation
        partition: PartitionId,
    },

    // ==================== System ====================
    /// Internal error (bug or invariant violation)
    #[error("internal error: {reason}")]
    Internal {
        /// Description
        reason: String,
    },
}

/// Coarse classification of an [`Error`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed or unsupported wire input
    Protocol,
    /// Authorization refused
    Authorization,
    /// Storage fault
    Storage,
    /// Iteration position rejected
    Iteration,
    /// Invalid input
    Validation,
    /// Bug
    Internal,
}

impl Error {
    /// Classify this error
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::Protocol(_) => ErrorKind::Protocol,
            Error::AccessDenied { .. } => ErrorKind::Authorization,
            Error::Storage(_) => ErrorKind::Storage,
            Error::Iteration(_) => ErrorKind::Iteration,
            Error::InvalidInput { .. } | Error::WrongPartition { .. } => ErrorKind::Validation,
            Error::Internal { .. } => ErrorKind::Internal,
        }
    }

    /// Can the caller retry the same operation unchanged?
    ///
    /// Only transient storage faults qualify. A `WrongPartition` or
    /// `PositionNotInPartition` needs re-routing first.
    pub fn is_retryable(&self) -> bool {
        match self {
            Error::Storage(fault) => fault.is_retryable(),
            _ => false,
        }
    }

    pub(crate) fn invalid_input(reason: impl Into<String>) -> Self {
        Error::InvalidInput {
            reason: reason.into(),
        }
    }

    pub(crate) fn internal(reason: impl Into<String>) -> Self {
        Error::Internal {
            reason: reason.into(),
        }
    }
}

impl From<AccessDenied> for Error {
    fn from(denied: AccessDenied) -> Self {
        Error::AccessDenied {
            principal: denied.principal,
            missing: denied.missing,
        }
    }
}

impl From<KeyError> for Error {
    fn from(e: KeyError) -> Self {
        Error::InvalidInput {
            reason: format!("{} ({})", e, e.reason_code()),
        }
    }
}

impl From<LimitError> for Error {
    fn from(e: LimitError) -> Self {
        Error::InvalidInput {
            reason: format!("{} ({})", e, e.reason_code()),
        }
    }
}

/// Wire codec errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum ProtocolError {
    /// Opcode unknown, or unknown at the negotiated version
    #[error("unknown opcode {opcode} at protocol version {version}")]
    UnknownOpcode {
        /// Raw opcode
        opcode: u8,
        /// Negotiated version
        version: u8,
    },

    /// Input ended in the middle of a field
    #[error("truncated input while reading {field}")]
    Truncated {
        /// Field being read
        field: String,
    },

    /// Bytes left over after the last field
    #[error("{count} trailing bytes after message")]
    TrailingBytes {
        /// Number of unread bytes
        count: usize,
    },

    /// A field held an impossible value
    #[error("invalid field {field}: {reason}")]
    InvalidField {
        /// Field name
        field: String,
        /// What was wrong
        reason: String,
    },

    /// Protocol version outside the supported range
    #[error("unsupported protocol version {version}")]
    UnsupportedVersion {
        /// Offending version
        version: u8,
    },

    /// A set field cannot be expressed at the requested version
    #[error("field {field} needs protocol version {introduced_in}, requested {version}")]
    FieldNotSupported {
        /// Field name
        field: String,
        /// Requested version
        version: u8,
        /// First version carrying the field
        introduced_in: u8,
    },
}

impl ProtocolError {
    pub(crate) fn truncated(field: &str) -> Self {
        ProtocolError::Truncated {
            field: field.to_string(),
        }
    }

    pub(crate) fn invalid(field: &str, reason: impl Into<String>) -> Self {
        ProtocolError::InvalidField {
            field: field.to_string(),
            reason: reason.into(),
        }
    }
}

/// Iteration cursor errors
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, thiserror::Error)]
pub enum IterationError {
    /// The resume token does not lie in the requested range
    #[error("resume token {token} is outside the requested range")]
    ResumeOutOfRange {
        /// Rendered token
        token: String,
    },

    /// The scan's start or resume position belongs to another partition
    #[error("position {position} is not owned by partition {partition}")]
    PositionNotInPartition {
        /// Rendered position
        position: String,
        /// Partition that received the call
        partition: PartitionId,
    },
}
