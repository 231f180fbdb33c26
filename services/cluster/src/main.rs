//! Cluster runner entry point

use anyhow::{anyhow, Context, Result};
use clap::{Args, Parser, Subcommand};
use cluster::{init_logging, run_local, run_node, Workload};
use cluster_config::ClusterConfig;
use lamport_process::Rank;
use std::path::PathBuf;
use tracing::{info, warn};

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Configuration file path
    #[arg(short, long, global = true)]
    config: Option<PathBuf>,

    /// Log filter, e.g. `debug` or `lamport_process=trace`
    #[arg(long, global = true)]
    log_level: Option<String>,

    /// Emit logs as JSON lines
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Run every rank inside this process
    Local(RunArgs),
    /// Run a single rank of a TCP cluster
    Node {
        /// Rank of this node; its listen address is `transport.peers[rank]`
        #[arg(long)]
        rank: Rank,

        #[command(flatten)]
        run: RunArgs,
    },
}

#[derive(Args, Debug, Default)]
struct RunArgs {
    /// Number of ranks
    #[arg(long)]
    ranks: Option<usize>,

    /// Rounds per workload
    #[arg(long)]
    rounds: Option<usize>,

    /// Workload to run
    #[arg(long, value_enum)]
    workload: Option<Workload>,
}

impl RunArgs {
    fn apply(&self, config: &mut ClusterConfig) {
        if let Some(ranks) = self.ranks {
            config.cluster.size = ranks;
        }
        if let Some(rounds) = self.rounds {
            config.cluster.max_rounds = rounds;
        }
        if let Some(workload) = self.workload {
            config.cluster.workload = workload.to_string();
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();

    let mut config = ClusterConfig::load(cli.config.as_deref())?;
    if let Some(level) = &cli.log_level {
        config.logging.level = level.clone();
    }
    if cli.json_logs {
        config.logging.json = true;
    }
    match &cli.command {
        Command::Local(run) | Command::Node { run, .. } => run.apply(&mut config),
    }
    config.validate()?;
    init_logging(&config.logging)?;

    let workload: Workload = config
        .cluster
        .workload
        .parse()
        .map_err(|e: String| anyhow!(e))?;

    info!("Starting Lamport cluster runner");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let run = async {
        match &cli.command {
            Command::Local(_) => {
                let report = run_local(&config, workload).await?;
                for rank in &report.ranks {
                    info!(
                        rank = rank.rank,
                        label = %rank.label,
                        clock = rank.clock,
                        sent = rank.stats.frames_sent,
                        received = rank.stats.frames_received,
                        "Final state"
                    );
                }
                info!(%workload, frames = report.total_frames(), "Local run complete");
            }
            Command::Node { rank, .. } => {
                let report = run_node(&config, *rank, workload).await?;
                info!(rank = *rank, clock = report.clock, "Node run complete");
            }
        }
        Ok::<_, anyhow::Error>(())
    };

    tokio::select! {
        result = run => result,
        signal = tokio::signal::ctrl_c() => {
            signal.context("Failed to listen for CTRL+C")?;
            warn!("Shutdown signal received, abandoning blocked ranks");
            // Ranks blocked in a receive never return; do not wait on them.
            std::process::exit(130);
        }
    }
}
