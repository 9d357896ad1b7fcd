//! Millisecond-precision timestamp type
//!
//! Record metadata (modification time, expiration time) is expressed in
//! milliseconds since the Unix epoch, the same unit the wire protocol carries.
//!
//! ## Expiration
//!
//! As an expiration time, [`Timestamp::NEVER`] (the epoch, 0) means the record
//! never expires.
//!
//! ```
//! use partis_core::Timestamp;
//!
//! let now = Timestamp::now();
//! let later = Timestamp::from_secs(1000);
//! assert!(Timestamp::NEVER.is_never());
//! assert_eq!(later.as_millis(), 1_000_000);
//! # let _ = now;
//! ```

use serde::{Deserialize, Serialize};
use std::time::{Duration, SystemTime, UNIX_EPOCH};

/// Millisecond-precision timestamp
///
/// ## Invariants
///
/// - Timestamps are always non-negative (u64)
/// - Timestamps are always in milliseconds
/// - The zero timestamp represents the Unix epoch
#[derive(
    Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize,
)]
pub struct Timestamp(u64);

impl Timestamp {
    /// Unix epoch (1970-01-01 00:00:00 UTC)
    pub const EPOCH: Timestamp = Timestamp(0);

    /// Expiration value meaning "never expires"
    pub const NEVER: Timestamp = Timestamp(0);

    /// Maximum representable timestamp
    pub const MAX: Timestamp = Timestamp(u64::MAX);

    /// Create a timestamp for the current moment
    ///
    /// Returns epoch (0) if the system clock is before the Unix epoch.
    pub fn now() -> Self {
        let duration = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .unwrap_or_default();
        Timestamp(duration.as_millis() as u64)
    }

    /// Create a timestamp from milliseconds since epoch
    #[inline]
    pub const fn from_millis(millis: u64) -> Self {
        Timestamp(millis)
    }

    /// Create a timestamp from seconds since epoch
    #[inline]
    pub const fn from_secs(secs: u64) -> Self {
        Timestamp(secs.saturating_mul(1_000))
    }

    /// Get milliseconds since Unix epoch
    #[inline]
    pub const fn as_millis(&self) -> u64 {
        self.0
    }

    /// True for the "never expires" sentinel
    #[inline]
    pub const fn is_never(&self) -> bool {
        self.0 == 0
    }

    /// Add a duration to this timestamp, saturating at [`Timestamp::MAX`]
    pub fn saturating_add(&self, duration: Duration) -> Self {
        let millis = u64::try_from(duration.as_millis()).unwrap_or(u64::MAX);
        Timestamp(self.0.saturating_add(millis))
    }

    /// Round up to the next multiple of `unit` (no-op when already aligned)
    ///
    /// A zero-length unit leaves the timestamp unchanged.
    pub fn round_up_to(&self, unit: Duration) -> Self {
        let unit = u64::try_from(unit.as_millis()).unwrap_or(u64::MAX);
        if unit == 0 {
            return *self;
        }
        match self.0 % unit {
            0 => *self,
            rem => Timestamp(self.0.saturating_add(unit - rem)),
        }
    }
}

impl std::fmt::Display for Timestamp {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}.{:03}", self.0 / 1_000, self.0 % 1_000)
    }
}
