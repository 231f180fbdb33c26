//! Payload types exchanged by the workloads, and the tags they travel under.

use lamport_process::{timestamped, Rank, Tag, Timestamp};
use serde::{Deserialize, Serialize};

pub const TAG_PING: Tag = 5;
pub const TAG_PONG: Tag = 6;
pub const TAG_ROUND_START: Tag = 7;
pub const TAG_REPORT: Tag = 8;
pub const TAG_ACK: Tag = 9;
pub const TAG_SAMPLE: Tag = 10;
pub const TAG_SUM: Tag = 11;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ping {
    pub round: usize,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Pong {
    pub round: usize,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct RoundStart {
    pub round: usize,
    pub timestamp: Timestamp,
}

/// A follower's view of a round, sent ahead of its [`Ack`]
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub round: usize,
    pub rank: Rank,
    /// Follower clock right after it consumed the RoundStart
    pub clock_seen: Timestamp,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Ack {
    pub round: usize,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sample {
    pub round: usize,
    pub value: i64,
    pub timestamp: Timestamp,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Sum {
    pub round: usize,
    pub count: usize,
    pub total: i64,
    pub timestamp: Timestamp,
}

timestamped!(
    Ping => timestamp,
    Pong => timestamp,
    RoundStart => timestamp,
    Report => timestamp,
    Ack => timestamp,
    Sample => timestamp,
    Sum => timestamp,
);
