//! TCP listener for accepting Kafka client connections.
//!
//! The listener accepts connections and spawns a task for each one,
//! delegating to the connection handler for request processing. Every task
//! shares the same read-only [`HandlerRegistry`].

use std::io::ErrorKind;
use std::net::SocketAddr;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};
use std::sync::Arc;

use tokio::net::TcpListener;
use tokio::sync::watch;
use tracing::{debug, error, info, instrument, warn};

use crate::config::BrokerConfig;
use crate::error::{BrokerError, Result};
use crate::handlers::HandlerRegistry;
use crate::metrics::BrokerMetrics;

use super::connection::ConnectionHandler;
use super::context::ConnectionContext;

/// TCP listener that accepts client connections.
pub struct BrokerListener {
    listener: TcpListener,
    local_addr: SocketAddr,
    config: Arc<BrokerConfig>,
    registry: Arc<HandlerRegistry>,
    metrics: Arc<BrokerMetrics>,
    shutdown_tx: watch::Sender<bool>,
    // Held so a shutdown sent before `run` subscribes is not lost
    shutdown_rx: watch::Receiver<bool>,
    active_connections: Arc<AtomicUsize>,
    next_connection_id: AtomicU64,
}

impl BrokerListener {
    /// Bind the configured listen address.
    ///
    /// The registry is frozen from here on: the listener only ever hands out
    /// shared references to it.
    ///
    /// # Errors
    ///
    /// Returns an error if binding to the listen address fails.
    pub async fn bind(
        config: BrokerConfig,
        registry: HandlerRegistry,
        metrics: Arc<BrokerMetrics>,
    ) -> Result<Self> {
        let listener = TcpListener::bind(&config.listen.address).await?;
        let local_addr = listener.local_addr()?;
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        Ok(Self {
            listener,
            local_addr,
            config: Arc::new(config),
            registry: Arc::new(registry),
            metrics,
            shutdown_tx,
            shutdown_rx,
            active_connections: Arc::new(AtomicUsize::new(0)),
            next_connection_id: AtomicU64::new(1),
        })
    }

    /// The address actually bound (useful when the config asked for port 0).
    #[must_use]
    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Get a shutdown handle; sending `true` stops the listener and every
    /// connection it is serving.
    ///
    /// The flag is sticky, so a shutdown sent before [`run`](Self::run) starts
    /// makes `run` return immediately.
    #[must_use]
    pub fn shutdown_handle(&self) -> watch::Sender<bool> {
        self.shutdown_tx.clone()
    }

    /// Get the current number of active connections.
    #[must_use]
    pub fn active_connections(&self) -> usize {
        self.active_connections.load(Ordering::Relaxed)
    }

    /// Run the listener, accepting connections until shutdown.
    ///
    /// # Errors
    ///
    /// Currently never fails once bound; accept errors are logged and skipped.
    #[instrument(skip(self), fields(address = %self.local_addr))]
    pub async fn run(&self) -> Result<()> {
        info!(
            address = %self.local_addr,
            api_keys = ?self.registry.api_keys(),
            "broker listening"
        );

        let mut shutdown_rx = self.shutdown_rx.clone();

        loop {
            tokio::select! {
                result = self.listener.accept() => {
                    match result {
                        Ok((socket, addr)) => {
                            let current = self.active_connections.load(Ordering::Relaxed);

                            if current >= self.config.listen.max_connections {
                                warn!(
                                    peer = %addr,
                                    active = current,
                                    max = self.config.listen.max_connections,
                                    "connection rejected: limit reached"
                                );
                                self.metrics.connection_rejected();
                                // Socket will be dropped, closing the connection
                                continue;
                            }

                            self.active_connections.fetch_add(1, Ordering::Relaxed);
                            self.metrics.connection_opened();
                            let connection_id = format!(
                                "conn-{}",
                                self.next_connection_id.fetch_add(1, Ordering::Relaxed)
                            );
                            debug!(
                                peer = %addr,
                                connection_id = %connection_id,
                                active = current + 1,
                                "accepted connection"
                            );

                            let handler = ConnectionHandler::new(
                                Arc::clone(&self.registry),
                                Arc::clone(&self.metrics),
                                self.shutdown_rx.clone(),
                                ConnectionContext::new(addr, connection_id),
                                self.config.codec.max_frame_size,
                            );
                            let active_connections = Arc::clone(&self.active_connections);
                            let metrics = Arc::clone(&self.metrics);

                            tokio::spawn(async move {
                                if let Err(e) = handler.handle(socket).await {
                                    match &e {
                                        BrokerError::Shutdown => {
                                            debug!(peer = %addr, "connection closed: shutdown");
                                        }
                                        BrokerError::Connection(io_err)
                                            if io_err.kind() == ErrorKind::ConnectionReset =>
                                        {
                                            debug!(peer = %addr, "client reset connection");
                                        }
                                        _ => {
                                            error!(peer = %addr, error = %e, "connection error");
                                        }
                                    }
                                }
                                active_connections.fetch_sub(1, Ordering::Relaxed);
                                metrics.connection_closed();
                            });
                        }
                        Err(e) => {
                            error!(error = %e, "accept error");
                        }
                    }
                }
                _ = shutdown_rx.wait_for(|stop| *stop) => {
                    info!("shutdown signal received");
                    break;
                }
            }
        }

        let active = self.active_connections.load(Ordering::Relaxed);
        if active > 0 {
            info!(active, "connections still open at shutdown");
        }

        Ok(())
    }
}
