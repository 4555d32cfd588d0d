//! Metrics collection for the kafka-lite broker.
//!
//! Request rates, embedded protocol error codes, connection failures and
//! frame traffic, exported in the Prometheus text format.

pub mod prometheus;

pub use prometheus::{BrokerMetrics, FrameDirection};
