//! Network layer for the kafka-lite broker.
//!
//! This module provides:
//! - Frame transport over raw async streams
//! - Kafka frame codec for `Framed` connections
//! - TCP listener for accepting client connections
//! - Connection handler for processing requests

pub mod codec;
pub mod connection;
pub mod context;
pub mod frame;
pub mod listener;

pub use codec::{FrameCodec, ResponseFrame};
pub use connection::ConnectionHandler;
pub use context::ConnectionContext;
pub use frame::{read_frame, write_frame};
pub use listener::BrokerListener;
