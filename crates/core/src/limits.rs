//! Size limits and the throughput cost model
//!
//! [`Limits`] bounds what a single operation may carry (keys, values, batch
//! sizes). [`CostModel`] converts record sizes into read and write units.
//!
//! ## Contract
//!
//! The default limits are part of the wire contract: clients size their
//! requests against them. Custom limits are set when the executor is built.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Size limits for keys, values and iteration batches
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Limits {
    /// Maximum key length in bytes (default: 1024)
    pub max_key_bytes: usize,

    /// Maximum value length in bytes (default: 1MB)
    pub max_value_bytes: usize,

    /// Batch size used when a request asks for 0 (default: 100)
    pub default_batch_size: usize,

    /// Largest batch a single iteration call may return (default: 1000)
    pub max_batch_size: usize,
}

impl Default for Limits {
    fn default() -> Self {
        Limits {
            max_key_bytes: 1024,
            max_value_bytes: 1024 * 1024, // 1MB
            default_batch_size: 100,
            max_batch_size: 1000,
        }
    }
}

impl Limits {
    /// Create limits with small values for testing
    ///
    /// Lets unit tests exercise limit enforcement without building huge keys
    /// or values.
    pub fn with_small_limits() -> Self {
        Limits {
            max_key_bytes: 100,
            max_value_bytes: 1000,
            default_batch_size: 4,
            max_batch_size: 16,
        }
    }

    /// Validate a value length
    pub fn validate_value(&self, value: &[u8]) -> Result<(), LimitError> {
        if value.len() > self.max_value_bytes {
            return Err(LimitError::ValueTooLarge {
                actual: value.len(),
                max: self.max_value_bytes,
            });
        }
        Ok(())
    }

    /// Resolve a requested batch size
    ///
    /// 0 selects the default; anything above the maximum is clamped.
    pub fn effective_batch_size(&self, requested: u32) -> usize {
        match requested as usize {
            0 => self.default_batch_size,
            n => n.min(self.max_batch_size),
        }
    }

    /// Check internal consistency
    pub fn validate(&self) -> Result<(), LimitError> {
        if self.max_key_bytes == 0 || self.max_value_bytes == 0 {
            return Err(LimitError::Inconsistent {
                reason: "key and value limits must be non-zero".to_string(),
            });
        }
        if self.default_batch_size == 0 || self.max_batch_size == 0 {
            return Err(LimitError::Inconsistent {
                reason: "batch sizes must be non-zero".to_string(),
            });
        }
        if self.default_batch_size > self.max_batch_size {
            return Err(LimitError::Inconsistent {
                reason: format!(
                    "default_batch_size {} exceeds max_batch_size {}",
                    self.default_batch_size, self.max_batch_size
                ),
            });
        }
        Ok(())
    }
}

/// Limit validation errors
#[derive(Debug, Clone, Error, PartialEq, Eq, Serialize, Deserialize)]
pub enum LimitError {
    /// Value exceeds maximum size
    #[error("Value too large: {actual} bytes exceeds maximum {max}")]
    ValueTooLarge {
        /// Actual size in bytes
        actual: usize,
        /// Maximum allowed size
        max: usize,
    },

    /// Limits contradict each other
    #[error("Inconsistent limits: {reason}")]
    Inconsistent {
        /// Description of the conflict
        reason: String,
    },
}

impl LimitError {
    /// Short reason code for logs and wire errors
    pub fn reason_code(&self) -> &'static str {
        match self {
            LimitError::ValueTooLarge { .. } => "value_too_large",
            LimitError::Inconsistent { .. } => "inconsistent_limits",
        }
    }
}

// =============================================================================
// Cost model
// =============================================================================

/// Minimum read charge for any operation that consults storage
pub const MIN_READ_UNITS: u32 = 1;

/// Converts sizes in bytes into throughput units
///
/// `units(size) = max(1, ceil(size / unit_bytes))`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct CostModel {
    /// Bytes covered by one read unit (default: 1024)
    pub read_unit_bytes: u32,
    /// Bytes covered by one write unit (default: 1024)
    pub write_unit_bytes: u32,
}

impl Default for CostModel {
    fn default() -> Self {
        CostModel {
            read_unit_bytes: 1024,
            write_unit_bytes: 1024,
        }
    }
}

impl CostModel {
    /// Read units for a record of `size` bytes
    pub fn read_units(&self, size: u64) -> u32 {
        units(size, self.read_unit_bytes)
    }

    /// Write units for a record of `size` bytes
    pub fn write_units(&self, size: u64) -> u32 {
        units(size, self.write_unit_bytes)
    }
}

fn units(size: u64, unit_bytes: u32) -> u32 {
    let unit = u64::from(unit_bytes.max(1));
    let n = (size + unit - 1) / unit;
    u32::try_from(n.max(1)).unwrap_or(u32::MAX)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_limits() {
        let limits = Limits::default();
        assert_eq!(limits.max_key_bytes, 1024);
        assert_eq!(limits.max_value_bytes, 1024 * 1024);
        assert!(limits.validate().is_ok());
    }

    #[test]
    fn test_small_limits_are_consistent() {
        assert!(Limits::with_small_limits().validate().is_ok());
    }

    #[test]
    fn test_validate_value() {
        let limits = Limits::with_small_limits();
        assert!(limits.validate_value(&[0u8; 1000]).is_ok());
        let err = limits.validate_value(&[0u8; 1001]).unwrap_err();
        assert_eq!(err.reason_code(), "value_too_large");
    }

    #[test]
    fn test_effective_batch_size() {
        let limits = Limits::default();
        assert_eq!(limits.effective_batch_size(0), 100);
        assert_eq!(limits.effective_batch_size(7), 7);
        assert_eq!(limits.effective_batch_size(50_000), 1000);
    }

    #[test]
    fn test_inconsistent_batch_sizes() {
        let limits = Limits {
            default_batch_size: 10,
            max_batch_size: 5,
            ..Limits::default()
        };
        assert!(matches!(
            limits.validate(),
            Err(LimitError::Inconsistent { .. })
        ));
    }

    #[test]
    fn test_cost_units() {
        let model = CostModel::default();
        assert_eq!(model.read_units(0), 1);
        assert_eq!(model.read_units(1), 1);
        assert_eq!(model.read_units(1024), 1);
        assert_eq!(model.read_units(1025), 2);
        assert_eq!(model.write_units(4096), 4);
    }

    #[test]
    fn test_cost_units_custom_unit() {
        let model = CostModel {
            read_unit_bytes: 100,
            write_unit_bytes: 10,
        };
        assert_eq!(model.read_units(250), 3);
        assert_eq!(model.write_units(250), 25);
    }

    #[test]
    fn test_cost_units_zero_unit_does_not_panic() {
        let model = CostModel {
            read_unit_bytes: 0,
            write_unit_bytes: 0,
        };
        assert_eq!(model.read_units(5), 5);
    }
}
