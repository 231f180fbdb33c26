//! # Cluster Configuration
//!
//! Settings shared by every rank of a cluster run: how many ranks, which
//! workload, how ranks reach each other and how they log.
//!
//! ## Usage
//!
//! ```rust
//! use cluster_config::ClusterConfig;
//!
//! let config = ClusterConfig::from_toml_str(
//!     r#"
//! [cluster]
//! size = 3
//! workload = "rounds"
//! "#,
//! )
//! .unwrap();
//!
//! assert_eq!(config.broadcast_scope(), vec![0, 1, 2]);
//! ```

pub mod cluster;

pub use cluster::{
    ClusterConfig, ClusterSettings, LoggingSettings, TransportSettings, ENV_PREFIX,
};
