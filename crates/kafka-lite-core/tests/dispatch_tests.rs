//! Integration tests for request dispatch and connection handling.

use std::time::Duration;

use bytes::{Bytes, BytesMut};
use tokio::time::timeout;

use kafka_lite_core::handlers::{ApiVersionsHandler, HandlerRegistry, ProtocolHandler};
use kafka_lite_core::network::ResponseFrame;
use kafka_lite_core::protocol::{RequestEnvelope, ResponseHeaderVersion};
use kafka_lite_core::testing::{TestBroker, TestClient};
use kafka_lite_core::Result;

/// Echoes the request body back with a v1 header.
struct EchoHandler;

impl ProtocolHandler for EchoHandler {
    fn process(&self, envelope: &RequestEnvelope) -> Result<ResponseFrame> {
        Ok(ResponseFrame::new(
            envelope.correlation_id,
            ResponseHeaderVersion::V1,
            BytesMut::from(&envelope.body[..]),
        ))
    }
}

#[tokio::test]
async fn test_unknown_operation_closes_connection() {
    let broker = TestBroker::start().await;
    let mut client = broker.client().await;

    let (_, payload) = client.request(99, 0, Bytes::new()).await.unwrap();
    assert!(payload.is_none());

    let failures = broker
        .metrics
        .connection_failures
        .with_label_values(&["Unknown", "unknown_operation"])
        .get();
    assert_eq!(failures, 1);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_unknown_operation_does_not_affect_other_connections() {
    let broker = TestBroker::start().await;
    let mut bad = broker.client().await;
    let mut good = broker.client().await;

    let (_, payload) = bad.request(99, 0, Bytes::new()).await.unwrap();
    assert!(payload.is_none());

    assert_eq!(good.api_versions(4).await.unwrap().error_code, 0);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_header_too_short_closes_connection() {
    let broker = TestBroker::start().await;
    let mut client = TestClient::connect(broker.addr()).await.unwrap();

    client.send_raw(&[0, 18, 0, 4, 0, 0]).await.unwrap();
    assert!(client.recv_raw().await.unwrap().is_none());

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_custom_handler_registration() {
    let mut registry = HandlerRegistry::with_default_handlers();
    registry.register(1000, EchoHandler);
    let broker = TestBroker::with_registry(registry).await;
    let mut client = broker.client().await;

    let (correlation_id, payload) = client
        .request(1000, 0, Bytes::from_static(b"ping"))
        .await
        .unwrap();
    let payload = payload.unwrap();
    assert_eq!(&payload[..4], &correlation_id.to_be_bytes());
    assert_eq!(payload[4], 0);
    assert_eq!(&payload[5..], b"ping");

    // Defaults still served
    assert_eq!(client.api_versions(4).await.unwrap().error_code, 0);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_replacing_a_handler() {
    let mut registry = HandlerRegistry::new();
    registry.register(18, EchoHandler);
    let previous = registry.register(18, ApiVersionsHandler::new());
    assert!(previous.is_some());

    let broker = TestBroker::with_registry(registry).await;
    let mut client = broker.client().await;
    assert_eq!(client.api_versions(4).await.unwrap().api_keys.len(), 2);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_concurrent_connections() {
    let broker = TestBroker::start().await;

    let mut tasks = Vec::new();
    for _ in 0..8 {
        let mut client = broker.client().await;
        tasks.push(tokio::spawn(async move {
            for _ in 0..10 {
                let reply = client.api_versions(4).await.unwrap();
                assert_eq!(reply.error_code, 0);
            }
        }));
    }
    for task in tasks {
        timeout(Duration::from_secs(5), task).await.unwrap().unwrap();
    }

    broker.shutdown().await.unwrap();
}
