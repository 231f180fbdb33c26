//! Workloads a cluster can run. Each one is a [`Process`] built on a
//! [`ProcessCore`].

pub mod gather;
pub mod messages;
pub mod ping_pong;
pub mod rounds;

use lamport_process::{Process, ProcessCore};
use network::Transport;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

pub use gather::Gather;
pub use ping_pong::PingPong;
pub use rounds::Rounds;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, clap::ValueEnum)]
#[serde(rename_all = "kebab-case")]
pub enum Workload {
    /// Rank 0 and rank 1 trade one ping and pong per round
    PingPong,
    /// Leader broadcasts round starts; followers report and ack
    Rounds,
    /// Root broadcasts sample batches; followers return their sums
    Gather,
}

impl Workload {
    pub const ALL: [Workload; 3] = [Workload::PingPong, Workload::Rounds, Workload::Gather];

    pub fn name(&self) -> &'static str {
        match self {
            Workload::PingPong => "ping-pong",
            Workload::Rounds => "rounds",
            Workload::Gather => "gather",
        }
    }

    /// Wrap `core` in this workload's process
    pub fn build<T: Transport + 'static>(&self, core: ProcessCore<T>) -> Box<dyn Process> {
        match self {
            Workload::PingPong => Box::new(PingPong::new(core)),
            Workload::Rounds => Box::new(Rounds::new(core)),
            Workload::Gather => Box::new(Gather::new(core)),
        }
    }
}

impl Default for Workload {
    fn default() -> Self {
        Self::PingPong
    }
}

impl fmt::Display for Workload {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for Workload {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Workload::ALL
            .into_iter()
            .find(|workload| workload.name() == s.trim())
            .ok_or_else(|| {
                let known: Vec<&str> = Workload::ALL.iter().map(Workload::name).collect();
                format!("unknown workload '{}', expected one of {}", s, known.join(", "))
            })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_names_round_trip() {
        for workload in Workload::ALL {
            assert_eq!(workload.name().parse::<Workload>().unwrap(), workload);
            assert_eq!(workload.to_string(), workload.name());
        }
        assert!("token-ring".parse::<Workload>().is_err());
    }

    #[test]
    fn test_clap_names_match() {
        use clap::ValueEnum;
        for workload in Workload::ALL {
            let value = workload.to_possible_value().unwrap();
            assert_eq!(value.get_name(), workload.name());
        }
    }
}
