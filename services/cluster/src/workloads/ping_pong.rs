use lamport_process::{Process, ProcessCore, ProcessError, Result, Timestamp};
use network::{Transport, TransportStats};
use tracing::warn;

use super::messages::{Ping, Pong, TAG_PING, TAG_PONG};

/// Rank 0 pings rank 1 once per round and waits for the pong
pub struct PingPong<T: Transport> {
    core: ProcessCore<T>,
}

impl<T: Transport> PingPong<T> {
    pub fn new(core: ProcessCore<T>) -> Self {
        Self { core }
    }

    fn serve(&mut self, max_rounds: usize) -> Result<()> {
        for round in 0..max_rounds {
            let mut ping = Ping { round, timestamp: 0 };
            self.core.send(&mut ping, 1, TAG_PING)?;

            let (pong, _) = self.core.receive::<Pong>(1, TAG_PONG)?;
            if pong.round != round {
                return Err(ProcessError::handler(
                    TAG_PONG,
                    format!("expected pong for round {}, got {}", round, pong.round),
                ));
            }
            self.core.log(format_args!(
                "round {} ping@{} pong@{}",
                round, ping.timestamp, pong.timestamp
            ));
        }
        Ok(())
    }

    fn answer(&mut self, max_rounds: usize) -> Result<()> {
        for _ in 0..max_rounds {
            let (ping, _) = self.core.receive::<Ping>(0, TAG_PING)?;
            let mut pong = Pong {
                round: ping.round,
                timestamp: 0,
            };
            self.core.send(&mut pong, 0, TAG_PONG)?;
        }
        Ok(())
    }
}

impl<T: Transport> Process for PingPong<T> {
    fn label(&self) -> &str {
        self.core.label()
    }

    fn clock(&self) -> Timestamp {
        self.core.clock()
    }

    fn stats(&self) -> TransportStats {
        self.core.transport_stats()
    }

    fn run(&mut self, max_rounds: usize) -> Result<()> {
        if self.core.cluster_size() < 2 {
            warn!(rank = self.core.rank(), "ping-pong needs two ranks, nothing to do");
            return Ok(());
        }

        match self.core.rank() {
            0 => self.serve(max_rounds),
            1 => self.answer(max_rounds),
            _ => {
                self.core.log("idle");
                Ok(())
            }
        }
    }
}
