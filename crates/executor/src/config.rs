//! Executor configuration via `partis.toml`
//!
//! Every field has a default, so an empty file is a valid configuration. The
//! settings are read once when the [`HandlerRegistry`](crate::HandlerRegistry)
//! is built; changing them means building a new registry.

use partis_core::{CostModel, Limits};
use serde::{Deserialize, Serialize};
use std::path::Path;
use thiserror::Error;

use crate::wire::ProtocolVersion;

/// Config file name
pub const CONFIG_FILE_NAME: &str = "partis.toml";

/// Configuration errors
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum ConfigError {
    /// The file could not be read or written
    #[error("config file '{path}': {reason}")]
    Io {
        /// File path
        path: String,
        /// Underlying I/O error
        reason: String,
    },

    /// The file is not valid TOML for this schema
    #[error("failed to parse config '{path}': {reason}")]
    Parse {
        /// File path, or `<string>` for in-memory input
        path: String,
        /// Parser message
        reason: String,
    },

    /// Values parse but do not make sense together
    #[error("invalid config: {reason}")]
    Invalid {
        /// What was wrong
        reason: String,
    },
}

/// Executor configuration loaded from `partis.toml`.
///
/// # Example
///
/// ```toml
/// default_batch_size = 100
/// max_batch_size = 1000
/// read_unit_bytes = 1024
/// write_unit_bytes = 1024
/// min_protocol_version = 1
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExecutorConfig {
    /// Entries per iteration call when the request asks for 0
    pub default_batch_size: usize,
    /// Largest batch an iteration call may return
    pub max_batch_size: usize,
    /// Bytes covered by one read unit
    pub read_unit_bytes: u32,
    /// Bytes covered by one write unit
    pub write_unit_bytes: u32,
    /// Longest accepted key, in bytes
    pub max_key_bytes: usize,
    /// Largest accepted value, in bytes
    pub max_value_bytes: usize,
    /// Oldest protocol version accepted from peers
    pub min_protocol_version: u8,
}

impl Default for ExecutorConfig {
    fn default() -> Self {
        let limits = Limits::default();
        let cost = CostModel::default();
        ExecutorConfig {
            default_batch_size: limits.default_batch_size,
            max_batch_size: limits.max_batch_size,
            read_unit_bytes: cost.read_unit_bytes,
            write_unit_bytes: cost.write_unit_bytes,
            max_key_bytes: limits.max_key_bytes,
            max_value_bytes: limits.max_value_bytes,
            min_protocol_version: ProtocolVersion::MIN.as_u8(),
        }
    }
}

impl ExecutorConfig {
    /// Size limits implied by this configuration
    pub fn limits(&self) -> Limits {
        Limits {
            max_key_bytes: self.max_key_bytes,
            max_value_bytes: self.max_value_bytes,
            default_batch_size: self.default_batch_size,
            max_batch_size: self.max_batch_size,
        }
    }

    /// Cost model implied by this configuration
    pub fn cost_model(&self) -> CostModel {
        CostModel {
            read_unit_bytes: self.read_unit_bytes,
            write_unit_bytes: self.write_unit_bytes,
        }
    }

    /// Oldest protocol version accepted from peers
    pub fn min_protocol(&self) -> Result<ProtocolVersion, ConfigError> {
        ProtocolVersion::from_u8(self.min_protocol_version).map_err(|_| ConfigError::Invalid {
            reason: format!(
                "min_protocol_version {} is not a supported version ({}..={})",
                self.min_protocol_version,
                ProtocolVersion::MIN.as_u8(),
                ProtocolVersion::CURRENT.as_u8()
            ),
        })
    }

    /// Check that the values are usable
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.limits()
            .validate()
            .map_err(|e| ConfigError::Invalid {
                reason: e.to_string(),
            })?;
        if self.read_unit_bytes == 0 || self.write_unit_bytes == 0 {
            return Err(ConfigError::Invalid {
                reason: "unit sizes must be non-zero".to_string(),
            });
        }
        self.min_protocol()?;
        Ok(())
    }

    /// Returns the default config file content with comments.
    pub fn default_toml() -> &'static str {
        r#"# Partis executor configuration

# Entries returned per iteration call when the request asks for 0
default_batch_size = 100

# Upper bound on entries per iteration call
max_batch_size = 1000

# Bytes per read / write throughput unit
read_unit_bytes = 1024
write_unit_bytes = 1024

# Key and value size limits, in bytes
max_key_bytes = 1024
max_value_bytes = 1048576

# Oldest wire protocol version accepted from peers (1, 2 or 3)
min_protocol_version = 1
"#
    }

    /// Parse and validate config from a TOML string.
    pub fn from_toml_str(content: &str) -> Result<Self, ConfigError> {
        parse(content, "<string>")
    }

    /// Read, parse and validate config from a file path.
    pub fn from_file(path: &Path) -> Result<Self, ConfigError> {
        let content = std::fs::read_to_string(path).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })?;
        parse(&content, &path.display().to_string())
    }

    /// Write the default config file if it does not already exist.
    ///
    /// Returns `Ok(())` whether the file was created or already existed.
    pub fn write_default_if_missing(path: &Path) -> Result<(), ConfigError> {
        if !path.exists() {
            std::fs::write(path, Self::default_toml()).map_err(|e| ConfigError::Io {
                path: path.display().to_string(),
                reason: e.to_string(),
            })?;
        }
        Ok(())
    }

    /// Serialize this config to TOML and write it to the given path.
    pub fn write_to_file(&self, path: &Path) -> Result<(), ConfigError> {
        let content = toml::to_string_pretty(self).map_err(|e| ConfigError::Invalid {
            reason: format!("failed to serialize config: {}", e),
        })?;
        std::fs::write(path, content).map_err(|e| ConfigError::Io {
            path: path.display().to_string(),
            reason: e.to_string(),
        })
    }
}

fn parse(content: &str, origin: &str) -> Result<ExecutorConfig, ConfigError> {
    let config: ExecutorConfig = toml::from_str(content).map_err(|e| ConfigError::Parse {
        path: origin.to_string(),
        reason: e.to_string(),
    })?;
    config.validate()?;
    Ok(config)
}
