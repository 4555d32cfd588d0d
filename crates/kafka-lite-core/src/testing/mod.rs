//! Test utilities for the kafka-lite broker.
//!
//! This module provides infrastructure for integration testing:
//!
//! - [`TestBroker`] - A real listener bound to an ephemeral local port
//! - [`TestClient`] - A minimal client that speaks frames over TCP
//!
//! # Example
//!
//! ```rust,ignore
//! use kafka_lite_core::testing::TestBroker;
//!
//! #[tokio::test]
//! async fn test_api_versions() {
//!     let broker = TestBroker::start().await;
//!     let mut client = broker.client().await;
//!
//!     let reply = client.api_versions(4).await.unwrap();
//!     assert_eq!(reply.error_code, 0);
//! }
//! ```

pub mod client;
pub mod harness;

pub use client::{ApiVersionsReply, DescribeTopicPartitionsReply, TestClient, TopicReply};
pub use harness::TestBroker;
