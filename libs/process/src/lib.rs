//! Lamport-Clocked Process Layer
//!
//! Per-rank communication substrate for message-passing clusters. A
//! [`ProcessCore`] wraps a [`network::Transport`] endpoint and adds:
//!
//! - a Lamport clock ticked on every send and merged on every receive,
//! - an out-of-order [`MessageBuffer`] so messages that arrive before anyone
//!   asks for them are kept rather than lost,
//! - tag-based dispatch through [`TagHandlers`],
//! - broadcast to a configurable scope that never includes the sender.
//!
//! # Example
//!
//! ```rust
//! use lamport_process::{timestamped, ProcessCore};
//! use network::LocalCluster;
//! use serde::{Deserialize, Serialize};
//!
//! #[derive(Debug, Default, Serialize, Deserialize)]
//! struct Ping {
//!     timestamp: u64,
//! }
//! timestamped!(Ping => timestamp);
//!
//! let cluster = LocalCluster::new(2);
//! let mut rank0 = ProcessCore::new(cluster.endpoint(0).unwrap(), "sender");
//! let mut rank1 = ProcessCore::new(cluster.endpoint(1).unwrap(), "receiver");
//!
//! rank0.send(&mut Ping::default(), 1, 5).unwrap();
//! let (ping, _status) = rank1.receive::<Ping>(0, 5).unwrap();
//! assert_eq!(ping.timestamp, 1);
//! assert_eq!(rank1.clock(), 2);
//! ```

pub mod buffer;
pub mod clock;
pub mod codec;
pub mod error;
pub mod handlers;
pub mod message;
pub mod process;
pub mod process_core;

pub use buffer::MessageBuffer;
pub use clock::LamportClock;
pub use error::{ProcessError, Result};
pub use handlers::TagHandlers;
pub use message::{Message, Timestamp};
pub use process::Process;
pub use process_core::{ProcessCore, EXIT_FATAL};

// Transport types callers need alongside the core
pub use network::{Rank, Source, Status, Tag};
