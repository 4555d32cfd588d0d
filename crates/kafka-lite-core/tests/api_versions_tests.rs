//! Integration tests for ApiVersions over a real TCP connection.

use kafka_lite_core::testing::TestBroker;

#[tokio::test]
async fn test_api_versions_supported_version() {
    let broker = TestBroker::start().await;
    let mut client = broker.client().await;

    let reply = client.api_versions(4).await.unwrap();

    assert_eq!(reply.error_code, 0);
    assert_eq!(reply.api_keys, vec![(18, 0, 4), (75, 0, 0)]);
    assert_eq!(reply.throttle_time_ms, 0);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_api_versions_unsupported_version() {
    let broker = TestBroker::start().await;
    let mut client = broker.client().await;

    let reply = client.api_versions(10).await.unwrap();

    assert_eq!(reply.error_code, 35);
    // The capability list is still sent so the client can downgrade
    assert_eq!(reply.api_keys.len(), 2);

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_api_versions_version_boundary() {
    let broker = TestBroker::start().await;
    let mut client = broker.client().await;

    for version in 0..=4 {
        assert_eq!(client.api_versions(version).await.unwrap().error_code, 0);
    }
    for version in 5..=8 {
        assert_eq!(client.api_versions(version).await.unwrap().error_code, 35);
    }

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_api_versions_exact_length_prefix() {
    let broker = TestBroker::start().await;
    let mut client = broker.client().await;

    let (correlation_id, payload) = client.request(18, 4, bytes::Bytes::new()).await.unwrap();
    let payload = payload.unwrap();

    // correlation id (v0 header) + error code + 2 entries + throttle + tags
    assert_eq!(payload.len(), 4 + 2 + 1 + 2 * 7 + 4 + 1);
    assert_eq!(&payload[..4], &correlation_id.to_be_bytes());

    broker.shutdown().await.unwrap();
}

#[tokio::test]
async fn test_correlation_ids_are_echoed() {
    let broker = TestBroker::start().await;
    let mut client = broker.client().await;

    let first = client.api_versions(4).await.unwrap();
    let second = client.api_versions(4).await.unwrap();
    assert_eq!(second.correlation_id, first.correlation_id + 1);

    broker.shutdown().await.unwrap();
}
