//! Domain error types for the kafka-lite broker.
//!
//! Uses `thiserror` for ergonomic error definitions with proper context.

use thiserror::Error;

/// Errors related to configuration parsing and validation.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// Failed to read configuration file.
    #[error("failed to read config file '{path}': {source}")]
    IoError {
        path: String,
        #[source]
        source: std::io::Error,
    },

    /// Failed to parse YAML configuration.
    #[error("failed to parse config: {0}")]
    ParseError(#[from] serde_yaml::Error),

    /// Invalid address format.
    #[error("invalid address format: {0} (expected 'host:port')")]
    InvalidAddress(String),

    /// The connection limit must allow at least one client.
    #[error("max_connections must be at least 1, got {0}")]
    InvalidMaxConnections(usize),

    /// Frames must be able to hold at least the fixed request header prefix.
    #[error("max_frame_size must be at least {min}, got {actual}")]
    FrameSizeTooSmall { min: usize, actual: usize },
}

/// Errors that occur while serving a client connection.
///
/// Every variant aborts the connection it was raised on. Protocol-level
/// failures the client should see (unsupported version, unknown topic) are
/// carried as error codes inside well-formed responses instead.
#[derive(Error, Debug)]
pub enum BrokerError {
    /// The stream closed before the declared frame length was read.
    #[error("truncated frame: expected {expected} bytes, stream closed after {received}")]
    TruncatedFrame { expected: usize, received: usize },

    /// The underlying stream rejected a response write.
    #[error("failed to write frame: {0}")]
    WriteFailure(#[source] std::io::Error),

    /// Declared frame length exceeds the configured maximum.
    #[error("frame size {size} exceeds maximum {max}")]
    FrameTooLarge { size: usize, max: usize },

    /// Frame is shorter than the fixed request header prefix.
    #[error("request header too short: {len} bytes")]
    HeaderTooShort { len: usize },

    /// A primitive field could not be decoded.
    #[error("malformed field '{field}': {reason}")]
    MalformedField { field: &'static str, reason: String },

    /// An operation-specific request body could not be parsed.
    #[error("malformed request for api key {api_key}: {reason}")]
    MalformedRequest { api_key: u16, reason: String },

    /// No handler is registered for the operation code.
    #[error("unknown operation: api key {api_key}")]
    UnknownOperation { api_key: u16 },

    /// TCP/IO connection error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// Shutdown signal received.
    #[error("broker shutting down")]
    Shutdown,
}

impl BrokerError {
    /// Build a `MalformedField` error.
    pub(crate) fn malformed(field: &'static str, reason: impl Into<String>) -> Self {
        Self::MalformedField {
            field,
            reason: reason.into(),
        }
    }

    /// Short label used for the error metric.
    #[must_use]
    pub fn kind(&self) -> &'static str {
        match self {
            Self::TruncatedFrame { .. } => "truncated_frame",
            Self::WriteFailure(_) => "write_failure",
            Self::FrameTooLarge { .. } => "frame_too_large",
            Self::HeaderTooShort { .. } => "header_too_short",
            Self::MalformedField { .. } => "malformed_field",
            Self::MalformedRequest { .. } => "malformed_request",
            Self::UnknownOperation { .. } => "unknown_operation",
            Self::Connection(_) => "connection",
            Self::Shutdown => "shutdown",
        }
    }
}

/// Result type alias for broker operations.
pub type Result<T> = std::result::Result<T, BrokerError>;

/// Result type alias for configuration operations.
pub type ConfigResult<T> = std::result::Result<T, ConfigError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_truncated_frame_display() {
        let err = BrokerError::TruncatedFrame {
            expected: 100,
            received: 30,
        };
        assert!(err.to_string().contains("100"));
        assert!(err.to_string().contains("30"));
    }

    #[test]
    fn test_broker_error_from_io() {
        let io_err = std::io::Error::new(std::io::ErrorKind::ConnectionReset, "test");
        let err: BrokerError = io_err.into();
        assert!(matches!(err, BrokerError::Connection(_)));
        assert_eq!(err.kind(), "connection");
    }

    #[test]
    fn test_malformed_field_display() {
        let err = BrokerError::malformed("topic_name", "null in non-nullable field");
        assert_eq!(
            err.to_string(),
            "malformed field 'topic_name': null in non-nullable field"
        );
    }

    #[test]
    fn test_config_error_display() {
        let err = ConfigError::FrameSizeTooSmall { min: 10, actual: 4 };
        assert!(err.to_string().contains("10"));
        assert!(err.to_string().contains('4'));
    }
}
