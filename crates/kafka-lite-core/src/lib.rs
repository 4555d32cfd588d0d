//! kafka-lite Core Library
//!
//! The framing and request-dispatch core of a Kafka-compatible broker
//! front-end. It turns length-prefixed frames into typed requests, routes
//! them to a handler by API key, and writes the handler's response back
//! with an exact length prefix.
//!
//! # Architecture
//!
//! The library is organized into several modules:
//!
//! - [`config`] - Configuration loading and validation
//! - [`error`] - Domain-specific error types
//! - [`protocol`] - Primitive wire types, request/response headers, protocol enums
//! - [`handlers`] - Handler traits, the handler registry and the API handlers
//! - [`network`] - Frame transport, codec, TCP listener and connection loop
//! - [`metrics`] - Prometheus metrics collection
//!
//! # Example
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use kafka_lite_core::{BrokerConfig, BrokerListener, BrokerMetrics, HandlerRegistry};
//!
//! let config = BrokerConfig::from_file("kafka-lite.yaml")?;
//! let listener = BrokerListener::bind(
//!     config,
//!     HandlerRegistry::with_default_handlers(),
//!     Arc::new(BrokerMetrics::new()),
//! )
//! .await?;
//! listener.run().await?;
//! ```

#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod handlers;
pub mod metrics;
pub mod network;
pub mod protocol;

/// Test utilities for integration testing.
///
/// This module is only available when compiling tests or when the `testing` feature is enabled.
#[cfg(any(test, feature = "testing"))]
pub mod testing;

// Re-export commonly used types
pub use config::{BrokerConfig, LoggingConfig};
pub use error::{BrokerError, ConfigError, Result};
pub use handlers::{ApiHandler, HandlerRegistry, ProtocolHandler};
pub use metrics::BrokerMetrics;
pub use network::BrokerListener;
pub use protocol::{ApiKey, ErrorCode, RequestEnvelope};
