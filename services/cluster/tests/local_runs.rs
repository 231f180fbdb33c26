use cluster::{run_bound_node, run_local, Workload};
use cluster_config::ClusterConfig;
use network::TransportType;
use std::net::TcpListener;

fn config(size: usize, rounds: usize) -> ClusterConfig {
    let mut config = ClusterConfig::default();
    config.cluster.size = size;
    config.cluster.max_rounds = rounds;
    config
}

#[tokio::test]
async fn ping_pong_clocks_match_lamport_rules() {
    let report = run_local(&config(2, 3), Workload::PingPong).await.unwrap();

    assert_eq!(report.workload, Workload::PingPong);
    assert_eq!(report.clock_of(0), Some(12));
    assert_eq!(report.clock_of(1), Some(11));
    assert_eq!(report.total_frames(), 6);
    assert_eq!(report.ranks[0].label, "ping-pong/0");
}

#[tokio::test]
async fn ping_pong_leaves_extra_ranks_idle() {
    let report = run_local(&config(3, 2), Workload::PingPong).await.unwrap();
    assert_eq!(report.clock_of(0), Some(8));
    assert_eq!(report.clock_of(2), Some(0));
}

#[tokio::test]
async fn rounds_claim_buffered_reports() {
    let report = run_local(&config(3, 3), Workload::Rounds).await.unwrap();

    // Per round the leader consumes two acks and two reports after its
    // broadcast; every follower consumes one start and sends twice.
    assert_eq!(report.clock_of(0), Some(24));
    assert_eq!(report.clock_of(1), Some(20));
    assert_eq!(report.clock_of(2), Some(20));

    let leader = &report.ranks[0];
    assert_eq!(leader.stats.frames_sent, 6);
    assert_eq!(leader.stats.frames_received, 12);
}

#[tokio::test]
async fn rounds_respect_broadcast_scope() {
    let mut config = config(4, 2);
    config.cluster.broadcast_scope = Some(vec![0, 1, 2]);

    let report = run_local(&config, Workload::Rounds).await.unwrap();
    assert_eq!(report.clock_of(0), Some(16));
    assert_eq!(report.clock_of(3), Some(0));
    assert_eq!(report.ranks[3].stats.frames_received, 0);
}

#[tokio::test]
async fn gather_sums_broadcast_vectors() {
    let report = run_local(&config(3, 2), Workload::Gather).await.unwrap();

    assert_eq!(report.clock_of(0), Some(10));
    assert_eq!(report.clock_of(1), Some(8));
    assert_eq!(report.clock_of(2), Some(8));
    assert_eq!(report.ranks[0].stats.sequence_frames_sent, 4);
}

#[tokio::test]
async fn single_rank_cluster_runs_every_workload() {
    for workload in Workload::ALL {
        let report = run_local(&config(1, 2), workload).await.unwrap();
        assert_eq!(report.ranks.len(), 1);
    }
}

#[tokio::test]
async fn invalid_config_is_rejected_before_running() {
    let mut config = config(2, 1);
    config.cluster.broadcast_scope = Some(vec![5]);
    assert!(run_local(&config, Workload::Rounds).await.is_err());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 2)]
async fn ping_pong_over_tcp() {
    let listeners: Vec<TcpListener> = (0..2)
        .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
        .collect();

    let mut config = config(2, 3);
    config.transport.kind = TransportType::Tcp;
    config.transport.connect_backoff_ms = 20;
    config.transport.peers = listeners
        .iter()
        .map(|l| l.local_addr().unwrap())
        .collect();

    let nodes: Vec<_> = listeners
        .into_iter()
        .enumerate()
        .map(|(rank, listener)| {
            let config = config.clone();
            tokio::spawn(async move { run_bound_node(&config, rank, listener, Workload::PingPong).await })
        })
        .collect();

    let mut clocks = Vec::new();
    for node in nodes {
        clocks.push(node.await.unwrap().unwrap().clock);
    }
    assert_eq!(clocks, vec![12, 11]);
}
