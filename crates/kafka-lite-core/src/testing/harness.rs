//! Test harness running a real broker listener on an ephemeral port.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::watch;
use tokio::task::JoinHandle;

use crate::config::{BrokerConfig, ListenConfig};
use crate::error::Result;
use crate::handlers::HandlerRegistry;
use crate::metrics::BrokerMetrics;
use crate::network::BrokerListener;

use super::client::TestClient;

/// A broker listening on `127.0.0.1:0` for the lifetime of a test.
pub struct TestBroker {
    addr: SocketAddr,
    shutdown_tx: watch::Sender<bool>,
    task: JoinHandle<Result<()>>,
    /// Metrics recorded by the broker.
    pub metrics: Arc<BrokerMetrics>,
}

impl TestBroker {
    /// Start a broker with the default handlers.
    pub async fn start() -> Self {
        Self::with_registry(HandlerRegistry::with_default_handlers()).await
    }

    /// Start a broker with a custom registry.
    pub async fn with_registry(registry: HandlerRegistry) -> Self {
        let config = BrokerConfig {
            listen: ListenConfig {
                address: "127.0.0.1:0".to_string(),
                max_connections: 100,
            },
            ..BrokerConfig::default()
        };
        Self::with_config(config, registry).await
    }

    /// Start a broker with a custom configuration and registry.
    pub async fn with_config(config: BrokerConfig, registry: HandlerRegistry) -> Self {
        let metrics = Arc::new(BrokerMetrics::new());
        let listener = BrokerListener::bind(config, registry, Arc::clone(&metrics))
            .await
            .expect("Failed to bind test broker");
        let addr = listener.local_addr();
        let shutdown_tx = listener.shutdown_handle();
        let task = tokio::spawn(async move { listener.run().await });

        Self {
            addr,
            shutdown_tx,
            task,
            metrics,
        }
    }

    /// The address the broker is listening on.
    #[must_use]
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Open a new client connection.
    pub async fn client(&self) -> TestClient {
        TestClient::connect(self.addr)
            .await
            .expect("Failed to connect to test broker")
    }

    /// Stop the broker and wait for the listener to exit.
    pub async fn shutdown(self) -> Result<()> {
        // Fails only if the listener task already exited
        let _ = self.shutdown_tx.send(true);
        self.task.await.unwrap_or(Ok(()))
    }
}
