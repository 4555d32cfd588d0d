//! Minimal frame-level client for exercising a running broker.

use std::net::SocketAddr;

use bytes::Bytes;
use tokio::net::TcpStream;
use uuid::Uuid;

use crate::error::{BrokerError, Result};
use crate::handlers::DescribeTopicPartitionsRequest;
use crate::network::codec::DEFAULT_MAX_FRAME_SIZE;
use crate::network::frame::{read_frame, write_frame};
use crate::protocol::{ApiKey, RequestEnvelope, WireReader};

/// Decoded ApiVersions response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApiVersionsReply {
    pub correlation_id: u32,
    pub error_code: i16,
    /// `(api_key, min_version, max_version)` entries.
    pub api_keys: Vec<(u16, i16, i16)>,
    pub throttle_time_ms: i32,
}

/// One topic entry of a DescribeTopicPartitions response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TopicReply {
    pub error_code: i16,
    pub name: String,
    pub topic_id: Uuid,
    pub is_internal: bool,
    pub partition_count: usize,
    pub authorized_operations: u32,
}

/// Decoded DescribeTopicPartitions response.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DescribeTopicPartitionsReply {
    pub correlation_id: u32,
    pub throttle_time_ms: i32,
    pub topics: Vec<TopicReply>,
    /// Raw next-cursor byte; `0xFF` means no further pages.
    pub next_cursor: u8,
}

/// A test client holding one TCP connection.
pub struct TestClient {
    stream: TcpStream,
    next_correlation_id: u32,
    client_id: Option<String>,
}

impl TestClient {
    /// Connect to a broker.
    ///
    /// # Errors
    ///
    /// Returns an error if the TCP connection fails.
    pub async fn connect(addr: SocketAddr) -> Result<Self> {
        let stream = TcpStream::connect(addr).await?;
        Ok(Self {
            stream,
            next_correlation_id: 1,
            client_id: Some("kafka-lite-test".to_string()),
        })
    }

    /// Send an arbitrary frame payload.
    pub async fn send_raw(&mut self, payload: &[u8]) -> Result<()> {
        write_frame(&mut self.stream, payload).await
    }

    /// Receive one frame payload; `None` once the broker has closed the connection.
    pub async fn recv_raw(&mut self) -> Result<Option<Bytes>> {
        match read_frame(&mut self.stream, DEFAULT_MAX_FRAME_SIZE).await {
            Err(BrokerError::Connection(e)) if e.kind() == std::io::ErrorKind::ConnectionReset => {
                Ok(None)
            }
            other => other,
        }
    }

    /// Send a request with a fresh correlation id and return that id and the response payload.
    pub async fn request(
        &mut self,
        api_key: u16,
        api_version: u16,
        body: Bytes,
    ) -> Result<(u32, Option<Bytes>)> {
        let correlation_id = self.next_correlation_id;
        self.next_correlation_id = self.next_correlation_id.wrapping_add(1);

        let envelope = RequestEnvelope {
            api_key,
            api_version,
            correlation_id,
            client_id: self.client_id.clone(),
            body,
        };
        self.send_raw(&envelope.encode()?).await?;
        Ok((correlation_id, self.recv_raw().await?))
    }

    async fn expect_response(
        &mut self,
        api_key: u16,
        api_version: u16,
        body: Bytes,
    ) -> Result<(u32, WireReader)> {
        let (sent_id, payload) = self.request(api_key, api_version, body).await?;
        let payload = payload.ok_or_else(|| {
            BrokerError::Connection(std::io::Error::new(
                std::io::ErrorKind::UnexpectedEof,
                "broker closed the connection without responding",
            ))
        })?;
        let mut reader = WireReader::new(payload);
        let correlation_id = reader.read_u32("correlation_id")?;
        if correlation_id != sent_id {
            return Err(BrokerError::malformed(
                "correlation_id",
                format!("expected {sent_id}, got {correlation_id}"),
            ));
        }
        Ok((correlation_id, reader))
    }

    /// Send ApiVersions at `api_version` and decode the reply.
    pub async fn api_versions(&mut self, api_version: u16) -> Result<ApiVersionsReply> {
        let (correlation_id, mut r) = self
            .expect_response(ApiKey::ApiVersions.into(), api_version, Bytes::new())
            .await?;

        let error_code = r.read_i16("error_code")?;
        let count = r.read_compact_array_len("api_keys")?.unwrap_or(0);
        let mut api_keys = Vec::with_capacity(count);
        for _ in 0..count {
            let key = r.read_u16("api_key")?;
            let min = r.read_i16("min_version")?;
            let max = r.read_i16("max_version")?;
            r.skip_tagged_fields("api_key_tags")?;
            api_keys.push((key, min, max));
        }
        let throttle_time_ms = r.read_i32("throttle_time_ms")?;
        r.skip_tagged_fields("response_tags")?;

        Ok(ApiVersionsReply {
            correlation_id,
            error_code,
            api_keys,
            throttle_time_ms,
        })
    }

    /// Send DescribeTopicPartitions and decode the reply.
    pub async fn describe_topic_partitions(
        &mut self,
        request: &DescribeTopicPartitionsRequest,
    ) -> Result<DescribeTopicPartitionsReply> {
        let (correlation_id, mut r) = self
            .expect_response(ApiKey::DescribeTopicPartitions.into(), 0, request.encode()?)
            .await?;

        r.skip_tagged_fields("header_tags")?;
        let throttle_time_ms = r.read_i32("throttle_time_ms")?;
        let count = r.read_compact_array_len("topics")?.unwrap_or(0);
        let mut topics = Vec::with_capacity(count);
        for _ in 0..count {
            let error_code = r.read_i16("error_code")?;
            let name = r.read_compact_string("name")?;
            let topic_id = r.read_uuid("topic_id")?;
            let is_internal = r.read_u8("is_internal")? != 0;
            let partition_count = r.read_compact_array_len("partitions")?.unwrap_or(0);
            let authorized_operations = r.read_u32("authorized_operations")?;
            r.skip_tagged_fields("topic_tags")?;
            topics.push(TopicReply {
                error_code,
                name,
                topic_id,
                is_internal,
                partition_count,
                authorized_operations,
            });
        }
        let next_cursor = r.read_u8("next_cursor")?;
        r.skip_tagged_fields("response_tags")?;

        Ok(DescribeTopicPartitionsReply {
            correlation_id,
            throttle_time_ms,
            topics,
            next_cursor,
        })
    }
}
