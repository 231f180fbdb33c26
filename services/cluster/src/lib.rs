//! # Cluster
//!
//! Workloads built on [`lamport_process::ProcessCore`] and the runners that
//! drive them: every rank inside one process over shared mailboxes, or one
//! rank per OS process over TCP.

pub mod logging;
pub mod runner;
pub mod workloads;

pub use logging::init_logging;
pub use runner::{run_bound_node, run_local, run_node, RankReport, RunReport};
pub use workloads::Workload;
