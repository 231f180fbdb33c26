//! Drives workloads to completion, either with every rank in this process
//! over shared mailboxes or as a single rank of a TCP cluster.

use anyhow::{bail, Context, Result};
use cluster_config::ClusterConfig;
use lamport_process::{ProcessCore, Rank, Timestamp};
use network::{LocalCluster, TcpTransport, Transport, TransportStats};
use std::net::TcpListener;
use tokio::task::JoinHandle;
use tracing::{info, warn};

use crate::workloads::Workload;

/// Final state of one rank
#[derive(Debug, Clone, PartialEq)]
pub struct RankReport {
    pub rank: Rank,
    pub label: String,
    pub clock: Timestamp,
    pub stats: TransportStats,
}

#[derive(Debug, Clone, PartialEq)]
pub struct RunReport {
    pub workload: Workload,
    pub ranks: Vec<RankReport>,
}

impl RunReport {
    pub fn clock_of(&self, rank: Rank) -> Option<Timestamp> {
        self.ranks.iter().find(|r| r.rank == rank).map(|r| r.clock)
    }

    /// Frames sent across every rank
    pub fn total_frames(&self) -> u64 {
        self.ranks.iter().map(|r| r.stats.frames_sent).sum()
    }
}

fn label_for(workload: Workload, rank: Rank) -> String {
    format!("{}/{}", workload, rank)
}

/// Build the rank's process and run it on the blocking pool
fn spawn_rank<T: Transport + 'static>(
    transport: T,
    workload: Workload,
    config: &ClusterConfig,
) -> JoinHandle<Result<RankReport>> {
    let rank = transport.rank();
    let max_rounds = config.cluster.max_rounds;
    let mut core = ProcessCore::new(transport, label_for(workload, rank));
    core.set_broadcast_scope(config.broadcast_scope());

    tokio::task::spawn_blocking(move || {
        let mut process = workload.build(core);
        process
            .run(max_rounds)
            .with_context(|| format!("rank {} failed running {}", rank, workload))?;
        Ok(RankReport {
            rank,
            label: process.label().to_string(),
            clock: process.clock(),
            stats: process.stats(),
        })
    })
}

/// Run every rank of `workload` in this process over a [`LocalCluster`]
pub async fn run_local(config: &ClusterConfig, workload: Workload) -> Result<RunReport> {
    config.validate()?;
    let size = config.cluster.size;
    info!(%workload, size, rounds = config.cluster.max_rounds, "Starting local cluster run");

    let cluster = LocalCluster::new(size);
    let tasks: Vec<_> = cluster
        .endpoints()
        .into_iter()
        .map(|endpoint| spawn_rank(endpoint, workload, config))
        .collect();

    let mut ranks = Vec::with_capacity(size);
    for (rank, task) in tasks.into_iter().enumerate() {
        let report = task
            .await
            .with_context(|| format!("rank {} task aborted", rank))??;
        info!(rank, clock = report.clock, frames = report.stats.frames_sent, "Rank finished");
        ranks.push(report);
    }

    for rank in 0..size {
        let leftover = cluster.pending(rank);
        if leftover > 0 {
            warn!(rank, leftover, "Frames left unreceived after run");
        }
    }

    Ok(RunReport { workload, ranks })
}

/// Run one rank of `workload` over TCP, peers taken from the configuration
pub async fn run_node(config: &ClusterConfig, rank: Rank, workload: Workload) -> Result<RankReport> {
    let addr = *config
        .transport
        .peers
        .get(rank)
        .with_context(|| format!("no peer address configured for rank {}", rank))?;
    let listener = TcpListener::bind(addr).with_context(|| format!("rank {} failed to bind {}", rank, addr))?;
    run_bound_node(config, rank, listener, workload).await
}

/// [`run_node`] on a listener the caller already bound
pub async fn run_bound_node(
    config: &ClusterConfig,
    rank: Rank,
    listener: TcpListener,
    workload: Workload,
) -> Result<RankReport> {
    config.validate()?;
    let peers = config.transport.peers.clone();
    if peers.len() != config.cluster.size {
        bail!(
            "tcp run needs one peer address per rank: {} peers for cluster size {}",
            peers.len(),
            config.cluster.size
        );
    }

    let transport = TcpTransport::from_listener(rank, listener, peers, config.transport.tcp_config())
        .with_context(|| format!("rank {} failed to start its transport", rank))?;
    info!(rank, addr = %transport.local_addr(), %workload, "Node listening");

    let report = spawn_rank(transport, workload, config)
        .await
        .with_context(|| format!("rank {} task aborted", rank))??;
    info!(rank, clock = report.clock, "Node finished");
    Ok(report)
}
