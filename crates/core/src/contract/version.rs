//! Version identifier type
//!
//! Every write performed through a transaction produces a [`Version`]. The
//! execution layer never interprets the number: it only compares versions
//! (conditional writes) and hands them back to callers as consistency markers.
//!
//! ## Comparison
//!
//! Versions are totally ordered. A later write to the same key always carries a
//! strictly greater version than the write it replaced.

use serde::{Deserialize, Serialize};

/// Opaque, orderable token identifying the write that produced a value.
///
/// ## Invariants
///
/// - Assigned by the storage engine, never by the execution layer
/// - Monotonically increasing across writes committed by one engine
/// - Zero is never assigned to a real write
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Version(u64);

impl Version {
    /// The zero version (never assigned to a write)
    pub const ZERO: Version = Version(0);

    /// Create a version from its raw representation
    pub const fn new(raw: u64) -> Self {
        Version(raw)
    }

    /// Get the raw representation
    ///
    /// Useful for storage and wire encoding.
    #[inline]
    pub const fn as_u64(&self) -> u64 {
        self.0
    }

    /// The next version, saturating at `u64::MAX`
    pub const fn increment(&self) -> Self {
        Version(self.0.saturating_add(1))
    }

}

impl std::fmt::Display for Version {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "v{}", self.0)
    }
}
