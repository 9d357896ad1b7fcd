//! Handler registry
//!
//! Maps every [`OpCode`] to the handler that serves it. The table is a plain
//! vector indexed by `OpCode as usize`, built once and never mutated, so it
//! can be shared across threads without locking.

use std::fmt;
use std::sync::Arc;

use partis_core::{Clock, Key, SystemClock};
use tracing::info;

use crate::config::{ConfigError, ExecutorConfig};
use crate::error::Error;
use crate::handlers::{
    DeleteHandler, GetHandler, HandlerContext, IterateHandler, KeysIterateHandler,
    MultiDeleteHandler, NopHandler, OperationHandler, PutHandler, TableChargeHandler,
};
use crate::opcode::OpCode;
use crate::Result;

/// Rewrites record values on their way into results
///
/// The hook sees every live record a handler returns, including previous
/// records. Returning `None` keeps the stored value.
pub trait ValueTransform: Send + Sync {
    /// New value for the record at `key`, if it should change
    fn transform(&self, key: &Key, value: &[u8]) -> Option<Vec<u8>>;
}

/// Returns stored values unchanged
#[derive(Debug, Clone, Copy, Default)]
pub struct IdentityTransform;

impl ValueTransform for IdentityTransform {
    fn transform(&self, _key: &Key, _value: &[u8]) -> Option<Vec<u8>> {
        None
    }
}

// =============================================================================
// Registry
// =============================================================================

/// One handler per opcode
pub struct HandlerRegistry {
    handlers: Vec<Box<dyn OperationHandler>>,
    config: ExecutorConfig,
}

impl HandlerRegistry {
    /// Registry with the system clock and no value transform
    pub fn new(config: ExecutorConfig) -> std::result::Result<Self, ConfigError> {
        HandlerRegistry::builder(config).build()
    }

    /// Start configuring a registry
    pub fn builder(config: ExecutorConfig) -> HandlerRegistryBuilder {
        HandlerRegistryBuilder {
            config,
            clock: Arc::new(SystemClock),
            transform: Arc::new(IdentityTransform),
        }
    }

    /// The handler for `opcode`
    pub fn handler(&self, opcode: OpCode) -> Result<&dyn OperationHandler> {
        self.handlers
            .get(opcode as usize)
            .map(|h| h.as_ref())
            .ok_or_else(|| Error::internal(format!("no handler registered for {}", opcode)))
    }

    /// Configuration the handlers were built from
    pub fn config(&self) -> &ExecutorConfig {
        &self.config
    }

    /// Number of registered handlers
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    /// True when no handler is registered
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("handlers", &self.handlers.len())
            .field("config", &self.config)
            .finish()
    }
}

/// Builder for [`HandlerRegistry`]
///
/// ```
/// use std::sync::Arc;
/// use partis_core::{ManualClock, Timestamp};
/// use partis_executor::{ExecutorConfig, HandlerRegistry, OpCode};
///
/// let registry = HandlerRegistry::builder(ExecutorConfig::default())
///     .clock(Arc::new(ManualClock::new(Timestamp::from_secs(60))))
///     .build()
///     .unwrap();
/// assert_eq!(registry.handler(OpCode::Get).unwrap().opcode(), OpCode::Get);
/// ```
pub struct HandlerRegistryBuilder {
    config: ExecutorConfig,
    clock: Arc<dyn Clock>,
    transform: Arc<dyn ValueTransform>,
}

impl HandlerRegistryBuilder {
    /// Clock used for TTL expiration times
    pub fn clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = clock;
        self
    }

    /// Hook applied to values returned in results
    pub fn transform(mut self, transform: Arc<dyn ValueTransform>) -> Self {
        self.transform = transform;
        self
    }

    /// Validate the configuration and build one handler per opcode
    pub fn build(self) -> std::result::Result<HandlerRegistry, ConfigError> {
        self.config.validate()?;
        let ctx = HandlerContext {
            cost: self.config.cost_model(),
            limits: self.config.limits(),
            clock: self.clock,
            transform: self.transform,
        };

        let handlers: Vec<Box<dyn OperationHandler>> = OpCode::ALL
            .iter()
            .map(|&opcode| -> Box<dyn OperationHandler> {
                match opcode {
                    OpCode::Nop => Box::new(NopHandler),
                    OpCode::Get => Box::new(GetHandler::new(ctx.clone())),
                    OpCode::Put
                    | OpCode::PutIfAbsent
                    | OpCode::PutIfPresent
                    | OpCode::PutIfVersion => Box::new(PutHandler::new(opcode, ctx.clone())),
                    OpCode::Delete | OpCode::DeleteIfVersion => {
                        Box::new(DeleteHandler::new(opcode, ctx.clone()))
                    }
                    OpCode::MultiDelete => Box::new(MultiDeleteHandler::new(ctx.clone())),
                    OpCode::StoreIterate => Box::new(IterateHandler::new(ctx.clone())),
                    OpCode::StoreKeysIterate => Box::new(KeysIterateHandler::new(ctx.clone())),
                    OpCode::TableCharge => Box::new(TableChargeHandler::new(ctx.clone())),
                }
            })
            .collect();

        info!(
            handlers = handlers.len(),
            max_batch_size = self.config.max_batch_size,
            "handler registry built"
        );
        Ok(HandlerRegistry {
            handlers,
            config: self.config,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_every_opcode_has_its_handler() {
        let registry = HandlerRegistry::new(ExecutorConfig::default()).unwrap();
        assert_eq!(registry.len(), OpCode::COUNT);
        for opcode in OpCode::ALL {
            assert_eq!(registry.handler(opcode).unwrap().opcode(), opcode);
        }
    }

    #[test]
    fn test_invalid_config_is_rejected() {
        let config = ExecutorConfig {
            max_batch_size: 0,
            ..ExecutorConfig::default()
        };
        assert!(HandlerRegistry::new(config).is_err());
    }

    #[test]
    fn test_registry_is_send_sync() {
        fn assert_send_sync<T: Send + Sync>() {}
        assert_send_sync::<HandlerRegistry>();
    }

    #[test]
    fn test_identity_transform() {
        assert_eq!(IdentityTransform.transform(&Key::root(), b"v"), None);
    }
}
