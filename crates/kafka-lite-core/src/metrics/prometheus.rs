//! Prometheus metrics for the kafka-lite broker.
//!
//! Two kinds of failure are tracked separately. Errors the protocol carries
//! inside a well-formed response (unsupported version, unknown topic) are
//! counted per API and error code. Failures that close the connection are
//! counted per API and [`BrokerError::kind`](crate::BrokerError::kind).

use prometheus::core::Collector;
use prometheus::{
    HistogramOpts, HistogramVec, IntCounter, IntCounterVec, IntGauge, Opts, Registry,
    TextEncoder,
};

use crate::protocol::ErrorCode;

/// Direction of frame traffic, used as the `direction` label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FrameDirection {
    Inbound,
    Outbound,
}

impl FrameDirection {
    fn label(self) -> &'static str {
        match self {
            Self::Inbound => "in",
            Self::Outbound => "out",
        }
    }
}

/// Broker metrics collection.
pub struct BrokerMetrics {
    registry: Registry,

    /// Requests dispatched, by API.
    pub requests_total: IntCounterVec,

    /// Response entries by API and embedded error code.
    ///
    /// ApiVersions contributes one entry per response; DescribeTopicPartitions
    /// one per described topic.
    pub response_error_codes: IntCounterVec,

    /// Failures that closed a connection, by API and error kind.
    pub connection_failures: IntCounterVec,

    /// Time spent in the handler, by API.
    pub handler_duration_seconds: HistogramVec,

    pub open_connections: IntGauge,

    /// Connections dropped at accept time because the limit was reached.
    pub connections_rejected: IntCounter,

    /// Frame bytes including the length prefix, by direction.
    pub frame_bytes: IntCounterVec,
}

fn register<C>(registry: &Registry, collector: C) -> prometheus::Result<C>
where
    C: Collector + Clone + 'static,
{
    registry.register(Box::new(collector.clone()))?;
    Ok(collector)
}

impl BrokerMetrics {
    /// Create a collection with its own registry.
    ///
    /// # Errors
    ///
    /// Returns an error if a metric definition is rejected by prometheus.
    pub fn try_new() -> prometheus::Result<Self> {
        let registry = Registry::new();

        let requests_total = register(
            &registry,
            IntCounterVec::new(
                Opts::new("kafka_lite_requests_total", "Requests dispatched by API"),
                &["api_key"],
            )?,
        )?;
        let response_error_codes = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "kafka_lite_response_error_codes_total",
                    "Response entries by API and embedded protocol error code",
                ),
                &["api_key", "error_code"],
            )?,
        )?;
        let connection_failures = register(
            &registry,
            IntCounterVec::new(
                Opts::new(
                    "kafka_lite_connection_failures_total",
                    "Failures that closed a client connection, by API and kind",
                ),
                &["api_key", "kind"],
            )?,
        )?;
        // Handlers answer from static data, so the buckets stay sub-millisecond
        let handler_duration_seconds = register(
            &registry,
            HistogramVec::new(
                HistogramOpts::new(
                    "kafka_lite_handler_duration_seconds",
                    "Time from dispatch to a built response",
                )
                .buckets(vec![0.000_001, 0.000_005, 0.000_01, 0.000_05, 0.000_1, 0.000_5, 0.001]),
                &["api_key"],
            )?,
        )?;
        let open_connections = register(
            &registry,
            IntGauge::new("kafka_lite_open_connections", "Client connections being served")?,
        )?;
        let connections_rejected = register(
            &registry,
            IntCounter::new(
                "kafka_lite_connections_rejected_total",
                "Connections dropped because max_connections was reached",
            )?,
        )?;
        let frame_bytes = register(
            &registry,
            IntCounterVec::new(
                Opts::new("kafka_lite_frame_bytes_total", "Frame bytes by direction"),
                &["direction"],
            )?,
        )?;

        Ok(Self {
            registry,
            requests_total,
            response_error_codes,
            connection_failures,
            handler_duration_seconds,
            open_connections,
            connections_rejected,
            frame_bytes,
        })
    }

    /// Create a collection with its own registry.
    ///
    /// # Panics
    ///
    /// Panics if a metric definition is rejected, which only happens if two
    /// collectors share a name.
    #[must_use]
    pub fn new() -> Self {
        Self::try_new().expect("metric names are unique")
    }

    pub fn record_request(&self, api: &str) {
        self.requests_total.with_label_values(&[api]).inc();
    }

    /// Count the error codes a response carries.
    pub fn record_response_codes(&self, api: &str, codes: &[ErrorCode]) {
        for code in codes {
            self.response_error_codes
                .with_label_values(&[api, code.name()])
                .inc();
        }
    }

    /// Record a failure that is about to close the connection.
    pub fn record_failure(&self, api: &str, kind: &str) {
        self.connection_failures.with_label_values(&[api, kind]).inc();
    }

    pub fn record_handler_duration(&self, api: &str, seconds: f64) {
        self.handler_duration_seconds
            .with_label_values(&[api])
            .observe(seconds);
    }

    pub fn connection_opened(&self) {
        self.open_connections.inc();
    }

    pub fn connection_closed(&self) {
        self.open_connections.dec();
    }

    pub fn connection_rejected(&self) {
        self.connections_rejected.inc();
    }

    pub fn record_frame_bytes(&self, direction: FrameDirection, bytes: usize) {
        self.frame_bytes
            .with_label_values(&[direction.label()])
            .inc_by(bytes as u64);
    }

    /// Render every metric in the Prometheus text format.
    ///
    /// # Errors
    ///
    /// Returns an error if encoding fails.
    pub fn encode(&self) -> prometheus::Result<String> {
        let mut out = String::new();
        TextEncoder::new().encode_utf8(&self.registry.gather(), &mut out)?;
        Ok(out)
    }
}

impl Default for BrokerMetrics {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_fresh_collection_encodes() {
        let metrics = BrokerMetrics::try_new().unwrap();
        let output = metrics.encode().unwrap();
        assert!(output.contains("kafka_lite_open_connections 0"));
        assert!(output.contains("kafka_lite_connections_rejected_total 0"));
    }

    #[test]
    fn test_collections_do_not_share_registries() {
        let a = BrokerMetrics::new();
        let b = BrokerMetrics::new();
        a.record_request("ApiVersions");
        assert_eq!(a.requests_total.with_label_values(&["ApiVersions"]).get(), 1);
        assert_eq!(b.requests_total.with_label_values(&["ApiVersions"]).get(), 0);
    }

    #[test]
    fn test_response_codes_by_name() {
        let metrics = BrokerMetrics::new();
        metrics.record_response_codes("ApiVersions", &[ErrorCode::UnsupportedVersion]);
        metrics.record_response_codes(
            "DescribeTopicPartitions",
            &[
                ErrorCode::UnknownTopicOrPartition,
                ErrorCode::UnknownTopicOrPartition,
            ],
        );

        let topics = metrics
            .response_error_codes
            .with_label_values(&["DescribeTopicPartitions", "UNKNOWN_TOPIC_OR_PARTITION"])
            .get();
        assert_eq!(topics, 2);

        let output = metrics.encode().unwrap();
        assert!(output.contains("error_code=\"UNSUPPORTED_VERSION\""));
    }

    #[test]
    fn test_failure_kinds() {
        let metrics = BrokerMetrics::new();
        metrics.record_failure("Unknown", "unknown_operation");
        metrics.record_failure("Unknown", "unknown_operation");
        assert_eq!(
            metrics
                .connection_failures
                .with_label_values(&["Unknown", "unknown_operation"])
                .get(),
            2
        );
    }

    #[test]
    fn test_handler_duration() {
        let metrics = BrokerMetrics::new();
        metrics.record_handler_duration("ApiVersions", 0.000_002);
        let output = metrics.encode().unwrap();
        let count_line = "kafka_lite_handler_duration_seconds_count{api_key=\"ApiVersions\"} 1";
        assert!(output.contains(count_line));
    }

    #[test]
    fn test_connection_accounting() {
        let metrics = BrokerMetrics::new();
        metrics.connection_opened();
        metrics.connection_opened();
        metrics.connection_closed();
        metrics.connection_rejected();
        assert_eq!(metrics.open_connections.get(), 1);
        assert_eq!(metrics.connections_rejected.get(), 1);
    }

    #[test]
    fn test_frame_bytes_by_direction() {
        let metrics = BrokerMetrics::new();
        metrics.record_frame_bytes(FrameDirection::Inbound, 25);
        metrics.record_frame_bytes(FrameDirection::Outbound, 30);
        metrics.record_frame_bytes(FrameDirection::Outbound, 12);
        assert_eq!(metrics.frame_bytes.with_label_values(&["in"]).get(), 25);
        assert_eq!(metrics.frame_bytes.with_label_values(&["out"]).get(), 42);
    }
}
