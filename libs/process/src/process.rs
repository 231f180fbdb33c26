//! Entry point contract for derived processes.

use network::TransportStats;

use crate::error::Result;
use crate::message::Timestamp;

/// A rank's domain logic, built on top of a [`ProcessCore`](crate::ProcessCore)
pub trait Process: Send {
    /// Display label used in diagnostics
    fn label(&self) -> &str;

    /// Current logical time of the underlying core
    fn clock(&self) -> Timestamp;

    /// Counters of the underlying transport
    fn stats(&self) -> TransportStats;

    /// Run the process for at most `max_rounds` rounds
    fn run(&mut self, max_rounds: usize) -> Result<()>;
}
