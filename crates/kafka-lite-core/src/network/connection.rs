//! Per-connection request handler.
//!
//! Reads one frame at a time, decodes its header, dispatches it through the
//! shared [`HandlerRegistry`] and writes the response before reading the next
//! frame. Requests on one connection are never processed concurrently.
//!
//! Any decode or dispatch failure ends the connection without a response.

use std::sync::Arc;
use std::time::Instant;

use bytes::Bytes;
use futures::{SinkExt, StreamExt};
use tokio::io::{AsyncRead, AsyncWrite};
use tokio::sync::watch;
use tokio_util::codec::Framed;
use tracing::{debug, instrument, warn};

use crate::error::{BrokerError, Result};
use crate::handlers::HandlerRegistry;
use crate::metrics::{BrokerMetrics, FrameDirection};
use crate::protocol::{ApiKey, RequestEnvelope, UNKNOWN_API_NAME};

use super::codec::{FrameCodec, ResponseFrame};
use super::context::ConnectionContext;
use super::frame::LENGTH_PREFIX_LEN;

/// Handles requests for a single client connection.
pub struct ConnectionHandler {
    registry: Arc<HandlerRegistry>,
    metrics: Arc<BrokerMetrics>,
    shutdown_rx: watch::Receiver<bool>,
    context: ConnectionContext,
    max_frame_size: usize,
}

impl ConnectionHandler {
    /// Create a new connection handler.
    ///
    /// # Arguments
    ///
    /// * `registry` - Handlers shared by every connection
    /// * `metrics` - Metrics sink
    /// * `shutdown_rx` - Shutdown flag; `true` ends the connection
    /// * `context` - Connection metadata for logging
    /// * `max_frame_size` - Largest frame accepted from the client
    #[must_use]
    pub fn new(
        registry: Arc<HandlerRegistry>,
        metrics: Arc<BrokerMetrics>,
        shutdown_rx: watch::Receiver<bool>,
        context: ConnectionContext,
        max_frame_size: usize,
    ) -> Self {
        Self {
            registry,
            metrics,
            shutdown_rx,
            context,
            max_frame_size,
        }
    }

    /// Handle the connection, processing requests until disconnect or shutdown.
    ///
    /// # Errors
    ///
    /// Returns the error that ended the connection: a transport failure, a
    /// malformed request, an unknown API key, or [`BrokerError::Shutdown`].
    #[instrument(skip(self, stream), fields(
        peer = %self.context.client_address(),
        connection_id = %self.context.connection_id()
    ))]
    pub async fn handle<S>(mut self, stream: S) -> Result<()>
    where
        S: AsyncRead + AsyncWrite + Unpin,
    {
        debug!("client connected");

        let codec = FrameCodec::with_max_frame_size(self.max_frame_size);
        let mut framed = Framed::new(stream, codec);

        loop {
            tokio::select! {
                result = framed.next() => {
                    match result {
                        Some(Ok(frame)) => {
                            let (api_name, response) = self.process_frame(frame)?;
                            let sent = LENGTH_PREFIX_LEN + response.payload_len();
                            if let Err(e) = framed.send(response).await {
                                let e = match e {
                                    BrokerError::Connection(io) => BrokerError::WriteFailure(io),
                                    other => other,
                                };
                                warn!(api_name, error = %e, "response write error");
                                self.metrics.record_failure(api_name, e.kind());
                                return Err(e);
                            }
                            self.metrics.record_frame_bytes(FrameDirection::Outbound, sent);
                        }
                        Some(Err(e)) => {
                            warn!(error = %e, "frame read error");
                            self.metrics.record_failure(UNKNOWN_API_NAME, e.kind());
                            return Err(e);
                        }
                        None => {
                            debug!("client disconnected");
                            break;
                        }
                    }
                }
                // A dropped sender means the listener is gone
                _ = async { self.shutdown_rx.wait_for(|stop| *stop).await.map(|_| ()) } => {
                    debug!("shutdown during connection handling");
                    return Err(BrokerError::Shutdown);
                }
            }
        }

        Ok(())
    }

    /// Decode and dispatch one frame, returning the API label with the response.
    fn process_frame(&self, frame: Bytes) -> Result<(&'static str, ResponseFrame)> {
        self.metrics
            .record_frame_bytes(FrameDirection::Inbound, LENGTH_PREFIX_LEN + frame.len());

        let envelope = RequestEnvelope::decode(frame).map_err(|e| {
            warn!(error = %e, "request header decode error");
            self.metrics.record_failure(UNKNOWN_API_NAME, e.kind());
            e
        })?;

        let api_name = ApiKey::label(envelope.api_key);
        debug!(
            api_key = envelope.api_key,
            api_name,
            api_version = envelope.api_version,
            correlation_id = envelope.correlation_id,
            client_id = envelope.client_id.as_deref().unwrap_or(""),
            "received request"
        );
        self.metrics.record_request(api_name);

        let started = Instant::now();
        let result = self.registry.dispatch(&envelope);
        self.metrics
            .record_handler_duration(api_name, started.elapsed().as_secs_f64());

        match result {
            Ok(response) => {
                self.metrics
                    .record_response_codes(api_name, &response.error_codes);
                Ok((api_name, response))
            }
            Err(e) => {
                warn!(
                    api_key = envelope.api_key,
                    correlation_id = envelope.correlation_id,
                    error = %e,
                    "closing connection"
                );
                self.metrics.record_failure(api_name, e.kind());
                Err(e)
            }
        }
    }
}
