//! Point-to-Point Transport Layer
//!
//! Rank-addressed, tag-labelled, blocking transports. Every implementation
//! delivers frames reliably and in order per (source, destination) pair;
//! receives and probes block until a matching frame exists.

use bytes::Bytes;
use serde::{Deserialize, Serialize};

use crate::envelope::{Envelope, Rank, Source, Status, Tag, TagFilter};
use crate::Result;

pub mod local;
pub mod metrics;
pub mod tcp;

pub use local::{LocalCluster, LocalTransport};
pub use metrics::{MetricsTracker, TransportStats};
pub use tcp::{TcpTransport, TcpTransportConfig};

/// Unified transport trait for all transport implementations
pub trait Transport: Send {
    /// Rank of the local endpoint
    fn rank(&self) -> Rank;

    /// Number of ranks in the cluster
    fn size(&self) -> usize;

    /// Send one encoded message to `dest` under `tag`
    fn send(&self, dest: Rank, tag: Tag, payload: Bytes) -> Result<()>;

    /// Send an encoded sequence of `count` messages as one bulk frame
    fn send_sequence(&self, dest: Rank, tag: Tag, count: usize, payload: Bytes) -> Result<()>;

    /// Block until a frame matching `source` and `tag` arrives and take it
    fn recv(&self, source: Source, tag: TagFilter) -> Result<Envelope>;

    /// Block until a frame matching `source` and `tag` arrives and report its metadata
    fn probe(&self, source: Source, tag: TagFilter) -> Result<Status>;

    /// Counter snapshot for this endpoint
    fn stats(&self) -> TransportStats;

    fn transport_type(&self) -> TransportType;
}

impl<T: Transport + ?Sized> Transport for Box<T> {
    fn rank(&self) -> Rank {
        (**self).rank()
    }

    fn size(&self) -> usize {
        (**self).size()
    }

    fn send(&self, dest: Rank, tag: Tag, payload: Bytes) -> Result<()> {
        (**self).send(dest, tag, payload)
    }

    fn send_sequence(&self, dest: Rank, tag: Tag, count: usize, payload: Bytes) -> Result<()> {
        (**self).send_sequence(dest, tag, count, payload)
    }

    fn recv(&self, source: Source, tag: TagFilter) -> Result<Envelope> {
        (**self).recv(source, tag)
    }

    fn probe(&self, source: Source, tag: TagFilter) -> Result<Status> {
        (**self).probe(source, tag)
    }

    fn stats(&self) -> TransportStats {
        (**self).stats()
    }

    fn transport_type(&self) -> TransportType {
        (**self).transport_type()
    }
}

/// Transport type enumeration
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TransportType {
    /// In-process mailboxes shared between threads
    Local,
    /// One TCP connection per peer
    Tcp,
}

impl Default for TransportType {
    fn default() -> Self {
        Self::Local
    }
}

impl std::fmt::Display for TransportType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TransportType::Local => write!(f, "local"),
            TransportType::Tcp => write!(f, "tcp"),
        }
    }
}
