//! Cluster Configuration Module
//!
//! Loads the settings for one cluster run. Values come from an optional TOML
//! file, overridden by `LAMPORT__SECTION__KEY` environment variables, with
//! every field falling back to a default.

use anyhow::{bail, Context, Result};
use config::{Config, Environment, File, FileFormat};
use network::{Rank, TcpTransportConfig, TransportType};
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::net::SocketAddr;
use std::path::Path;
use std::time::Duration;
use tracing::{debug, info};

/// Prefix for environment overrides
pub const ENV_PREFIX: &str = "LAMPORT";

/// Main cluster configuration structure
#[derive(Debug, Deserialize, Serialize, Clone, Default, PartialEq)]
#[serde(default)]
pub struct ClusterConfig {
    pub cluster: ClusterSettings,
    pub transport: TransportSettings,
    pub logging: LoggingSettings,
}

/// Shape of the run
#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct ClusterSettings {
    /// Number of ranks
    pub size: usize,
    /// Rounds each workload performs
    pub max_rounds: usize,
    /// Workload name, e.g. `ping-pong`
    pub workload: String,
    /// Ranks every broadcast goes to; all ranks when unset
    pub broadcast_scope: Option<Vec<Rank>>,
}

impl Default for ClusterSettings {
    fn default() -> Self {
        Self {
            size: 2,
            max_rounds: 3,
            workload: "ping-pong".to_string(),
            broadcast_scope: None,
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct TransportSettings {
    pub kind: TransportType,
    /// Listen address of every rank, index = rank. Only used by `tcp`.
    pub peers: Vec<SocketAddr>,
    pub connect_attempts: u32,
    pub connect_backoff_ms: u64,
    pub max_frame_size: usize,
}

impl Default for TransportSettings {
    fn default() -> Self {
        Self {
            kind: TransportType::Local,
            peers: Vec::new(),
            connect_attempts: 50,
            connect_backoff_ms: 100,
            max_frame_size: network::DEFAULT_MAX_FRAME_SIZE,
        }
    }
}

impl TransportSettings {
    pub fn tcp_config(&self) -> TcpTransportConfig {
        TcpTransportConfig {
            connect_attempts: self.connect_attempts,
            connect_backoff: Duration::from_millis(self.connect_backoff_ms),
            max_frame_size: self.max_frame_size,
            ..TcpTransportConfig::default()
        }
    }
}

#[derive(Debug, Deserialize, Serialize, Clone, PartialEq)]
#[serde(default)]
pub struct LoggingSettings {
    /// `tracing` filter directive, e.g. `info` or `lamport_process=trace`
    pub level: String,
    /// Emit JSON lines instead of human-readable output
    pub json: bool,
}

impl Default for LoggingSettings {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json: false,
        }
    }
}

impl ClusterConfig {
    /// Load configuration from an optional file with environment overrides.
    ///
    /// The result is not validated, so callers can layer command-line
    /// overrides first and then call [`ClusterConfig::validate`].
    pub fn load(path: Option<&Path>) -> Result<Self> {
        Self::load_with_env(path, None)
    }

    /// Like [`ClusterConfig::load`], reading overrides from `env` instead of
    /// the process environment when given.
    pub fn load_with_env(path: Option<&Path>, env: Option<HashMap<String, String>>) -> Result<Self> {
        let mut builder = Config::builder();

        if let Some(path) = path {
            info!("Loading cluster config: {:?}", path);
            builder = builder.add_source(File::from(path).format(FileFormat::Toml).required(true));
        }

        builder = builder.add_source(
            Environment::with_prefix(ENV_PREFIX)
                .prefix_separator("__")
                .separator("__")
                .try_parsing(true)
                .source(env.map(|vars| vars.into_iter().collect())),
        );

        let config: Self = builder
            .build()
            .context("Failed to build configuration")?
            .try_deserialize()
            .context("Failed to deserialize configuration")?;

        debug!(?config, "Cluster configuration loaded");
        Ok(config)
    }

    /// Parse and validate a TOML document
    pub fn from_toml_str(contents: &str) -> Result<Self> {
        let config: Self = toml::from_str(contents).context("Failed to parse TOML configuration")?;
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<()> {
        let size = self.cluster.size;
        if size == 0 {
            bail!("cluster.size must be at least 1");
        }

        if let Some(scope) = &self.cluster.broadcast_scope {
            if let Some(rank) = scope.iter().find(|&&rank| rank >= size) {
                bail!("cluster.broadcast_scope names rank {} but cluster.size is {}", rank, size);
            }
        }

        if self.transport.kind == TransportType::Tcp && self.transport.peers.len() != size {
            bail!(
                "transport.peers lists {} addresses but cluster.size is {}",
                self.transport.peers.len(),
                size
            );
        }

        if self.transport.max_frame_size == 0 {
            bail!("transport.max_frame_size cannot be zero");
        }

        if self.transport.connect_attempts == 0 {
            bail!("transport.connect_attempts cannot be zero");
        }

        if self.logging.level.trim().is_empty() {
            bail!("logging.level cannot be empty");
        }

        Ok(())
    }

    /// Broadcast scope with the all-ranks default applied
    pub fn broadcast_scope(&self) -> Vec<Rank> {
        match &self.cluster.broadcast_scope {
            Some(scope) => scope.clone(),
            None => (0..self.cluster.size).collect(),
        }
    }
}
