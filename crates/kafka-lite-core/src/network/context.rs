//! Per-connection metadata carried through request handling.

use std::net::SocketAddr;

/// Context for a client connection.
///
/// Created when the listener accepts a socket and only read afterwards; it
/// exists to tag log lines with who the request came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ConnectionContext {
    /// Client's remote address.
    client_address: SocketAddr,
    /// Connection identifier (for logging/tracing).
    connection_id: String,
}

impl ConnectionContext {
    /// Create a new connection context.
    pub fn new(client_address: SocketAddr, connection_id: impl Into<String>) -> Self {
        Self {
            client_address,
            connection_id: connection_id.into(),
        }
    }

    /// Get the client's remote address.
    pub fn client_address(&self) -> SocketAddr {
        self.client_address
    }

    /// Get the connection identifier.
    pub fn connection_id(&self) -> &str {
        &self.connection_id
    }
}
