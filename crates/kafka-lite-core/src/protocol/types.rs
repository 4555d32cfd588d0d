//! Protocol enumerations: API keys, error codes and ACL operation bits.

use bitflags::bitflags;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use uuid::Uuid;

/// Label used for requests whose API key could not be determined or is not served here.
pub const UNKNOWN_API_NAME: &str = "Unknown";

/// 128-bit topic identifier. Unknown topics carry the nil id.
pub type TopicId = Uuid;

/// API keys served by this broker.
///
/// The registry is keyed by the raw `u16`, so codes outside this enum can
/// still be registered; this type only names the ones implemented here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, IntoPrimitive, TryFromPrimitive)]
#[repr(u16)]
pub enum ApiKey {
    ApiVersions = 18,
    DescribeTopicPartitions = 75,
}

impl ApiKey {
    /// Protocol name of the API.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::ApiVersions => "ApiVersions",
            Self::DescribeTopicPartitions => "DescribeTopicPartitions",
        }
    }

    /// Name for a raw API key, [`UNKNOWN_API_NAME`] if it is not one of ours.
    #[must_use]
    pub fn label(code: u16) -> &'static str {
        Self::try_from(code).map_or(UNKNOWN_API_NAME, Self::name)
    }
}

/// Error codes carried inside responses.
#[derive(Debug, Clone, Copy, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(i16)]
pub enum ErrorCode {
    None = 0,
    UnknownTopicOrPartition = 3,
    UnsupportedVersion = 35,
}

impl ErrorCode {
    #[must_use]
    pub fn code(self) -> i16 {
        self.into()
    }

    /// Protocol name of the error, as Kafka clients print it.
    #[must_use]
    pub fn name(self) -> &'static str {
        match self {
            Self::None => "NONE",
            Self::UnknownTopicOrPartition => "UNKNOWN_TOPIC_OR_PARTITION",
            Self::UnsupportedVersion => "UNSUPPORTED_VERSION",
        }
    }
}

bitflags! {
    /// Operations a principal may perform on a resource.
    ///
    /// Bit `n` corresponds to the ACL operation with id `n`; ids 0-2
    /// (unknown, any, all) are never set in a response bitmask.
    #[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
    pub struct AclOperations: u32 {
        const READ = 1 << 3;
        const WRITE = 1 << 4;
        const CREATE = 1 << 5;
        const DELETE = 1 << 6;
        const ALTER = 1 << 7;
        const DESCRIBE = 1 << 8;
        const CLUSTER_ACTION = 1 << 9;
        const DESCRIBE_CONFIGS = 1 << 10;
        const ALTER_CONFIGS = 1 << 11;
        const IDEMPOTENT_WRITE = 1 << 12;
        const CREATE_TOKENS = 1 << 13;
        const DESCRIBE_TOKENS = 1 << 14;
    }
}

impl AclOperations {
    /// Every operation applicable to a topic resource.
    pub const TOPIC: Self = Self::READ
        .union(Self::WRITE)
        .union(Self::CREATE)
        .union(Self::DELETE)
        .union(Self::ALTER)
        .union(Self::DESCRIBE)
        .union(Self::DESCRIBE_CONFIGS)
        .union(Self::ALTER_CONFIGS);
}
