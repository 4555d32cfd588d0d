//! API key to handler mapping.

use std::collections::HashMap;
use std::fmt;
use std::sync::Arc;

use crate::error::{BrokerError, Result};
use crate::network::codec::ResponseFrame;
use crate::protocol::{ApiKey, RequestEnvelope};

use super::{ApiVersionsHandler, DescribeTopicPartitionsHandler, ProtocolHandler};

/// Maps API keys to handlers.
///
/// Built once at startup and then shared read-only (behind an `Arc`) by all
/// connection tasks; nothing mutates it after the listener starts.
#[derive(Clone, Default)]
pub struct HandlerRegistry {
    handlers: HashMap<u16, Arc<dyn ProtocolHandler>>,
}

impl HandlerRegistry {
    /// Create an empty registry.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a registry with every handler this crate implements.
    #[must_use]
    pub fn with_default_handlers() -> Self {
        let mut registry = Self::new();
        registry.register(ApiKey::ApiVersions.into(), ApiVersionsHandler::new());
        registry.register(
            ApiKey::DescribeTopicPartitions.into(),
            DescribeTopicPartitionsHandler::new(),
        );
        registry
    }

    /// Register `handler` for `api_key`, replacing and returning any previous one.
    pub fn register<H>(&mut self, api_key: u16, handler: H) -> Option<Arc<dyn ProtocolHandler>>
    where
        H: ProtocolHandler + 'static,
    {
        self.handlers.insert(api_key, Arc::new(handler))
    }

    /// Look up the handler for `api_key`.
    ///
    /// # Errors
    ///
    /// Returns [`BrokerError::UnknownOperation`] if nothing is registered.
    pub fn resolve(&self, api_key: u16) -> Result<&dyn ProtocolHandler> {
        self.handlers
            .get(&api_key)
            .map(|h| &**h)
            .ok_or(BrokerError::UnknownOperation { api_key })
    }

    /// Resolve the envelope's handler and run it.
    pub fn dispatch(&self, envelope: &RequestEnvelope) -> Result<ResponseFrame> {
        self.resolve(envelope.api_key)?.process(envelope)
    }

    /// Registered API keys in ascending order.
    #[must_use]
    pub fn api_keys(&self) -> Vec<u16> {
        let mut keys: Vec<u16> = self.handlers.keys().copied().collect();
        keys.sort_unstable();
        keys
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }
}

impl fmt::Debug for HandlerRegistry {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("HandlerRegistry")
            .field("api_keys", &self.api_keys())
            .finish()
    }
}
