//! Network Infrastructure
//!
//! Rank-addressed point-to-point transports for a message-passing cluster.
//! This crate only moves frames: it knows sources, destinations, tags and
//! element counts, never what a payload means. Logical clocks, buffering and
//! typed dispatch live in the process layer above it.
//!
//! Two transports are provided:
//!
//! - [`LocalCluster`] / [`LocalTransport`]: in-process mailboxes for ranks
//!   running on threads of one OS process.
//! - [`TcpTransport`]: one OS process per rank over a static peer table.

pub mod envelope;
pub mod error;
pub mod mailbox;
pub mod transports;

// Re-export commonly used types
pub use envelope::{Envelope, Rank, Source, Status, Tag, TagFilter};
pub use error::{Result, TransportError};
pub use transports::{
    LocalCluster, LocalTransport, MetricsTracker, TcpTransport, TcpTransportConfig, Transport,
    TransportStats, TransportType,
};

/// Maximum frame body accepted by stream transports unless configured otherwise
pub const DEFAULT_MAX_FRAME_SIZE: usize = 16 * 1024 * 1024; // 16MB
