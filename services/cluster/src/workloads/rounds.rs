//! Leader-driven rounds.
//!
//! Every follower answers a `RoundStart` with a `Report` and then an `Ack`.
//! The leader waits for acks only, so each follower's report lands in the
//! buffer and is claimed afterwards with a plain receive.

use lamport_process::{Process, ProcessCore, ProcessError, Rank, Result, Source, TagHandlers, Timestamp};
use network::{Transport, TransportStats};
use tracing::debug;

use super::messages::{Ack, Report, RoundStart, TAG_ACK, TAG_REPORT, TAG_ROUND_START};

const LEADER: Rank = 0;

pub struct Rounds<T: Transport> {
    core: ProcessCore<T>,
}

impl<T: Transport> Rounds<T> {
    pub fn new(core: ProcessCore<T>) -> Self {
        Self { core }
    }

    fn followers(&self) -> Vec<Rank> {
        self.core
            .broadcast_scope()
            .iter()
            .copied()
            .filter(|&rank| rank != LEADER)
            .collect()
    }

    fn lead(&mut self, max_rounds: usize) -> Result<()> {
        let expected = self.followers().len();

        for round in 0..max_rounds {
            let mut start = RoundStart { round, timestamp: 0 };
            self.core.broadcast(&mut start, TAG_ROUND_START)?;

            let mut acked: Vec<Rank> = Vec::with_capacity(expected);
            let mut handlers = TagHandlers::new().on::<Ack, _>(TAG_ACK, |_, ack, status| {
                if ack.round != round {
                    return Err(ProcessError::handler(
                        TAG_ACK,
                        format!("rank {} acked round {} during round {}", status.source, ack.round, round),
                    ));
                }
                acked.push(status.source);
                Ok(())
            });

            let mut resolved = 0;
            while resolved < expected {
                if self.core.receive_multi_tag(Source::Any, &mut handlers)? {
                    resolved += 1;
                }
            }
            drop(handlers);
            debug!(round, buffered = self.core.buffered(), "All followers acked");

            for rank in acked {
                let (report, _) = self.core.receive::<Report>(rank, TAG_REPORT)?;
                if report.round != round || report.rank != rank {
                    return Err(ProcessError::handler(
                        TAG_REPORT,
                        format!("unexpected report {:?} in round {}", report, round),
                    ));
                }
                self.core.log(format_args!(
                    "round {} report from rank {} (clock seen {})",
                    round, rank, report.clock_seen
                ));
            }
        }
        Ok(())
    }

    fn follow(&mut self, max_rounds: usize) -> Result<()> {
        for _ in 0..max_rounds {
            let (start, _) = self.core.receive::<RoundStart>(LEADER, TAG_ROUND_START)?;

            let mut report = Report {
                round: start.round,
                rank: self.core.rank(),
                clock_seen: self.core.clock(),
                timestamp: 0,
            };
            self.core.send(&mut report, LEADER, TAG_REPORT)?;

            let mut ack = Ack {
                round: start.round,
                timestamp: 0,
            };
            self.core.send(&mut ack, LEADER, TAG_ACK)?;
        }
        Ok(())
    }
}

impl<T: Transport> Process for Rounds<T> {
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
        let rank = self.core.rank();
        if rank == LEADER {
            self.lead(max_rounds)
        } else if self.core.broadcast_scope().contains(&rank) {
            self.follow(max_rounds)
        } else {
            self.core.log("outside broadcast scope, idle");
            Ok(())
        }
    }
}
