use lamport_process::{Process, ProcessCore, ProcessError, Rank, Result, Timestamp};
use network::{Transport, TransportStats};

use super::messages::{Sample, Sum, TAG_SAMPLE, TAG_SUM};

const ROOT: Rank = 0;

/// Samples broadcast per round
pub const BATCH_SIZE: usize = 4;

/// Rank 0 broadcasts a batch of samples; every follower sums its copy and
/// sends the total back.
pub struct Gather<T: Transport> {
    core: ProcessCore<T>,
}

impl<T: Transport> Gather<T> {
    pub fn new(core: ProcessCore<T>) -> Self {
        Self { core }
    }

    fn batch(round: usize) -> Vec<Sample> {
        (0..BATCH_SIZE)
            .map(|i| Sample {
                round,
                value: (round * 10 + i + 1) as i64,
                timestamp: 0,
            })
            .collect()
    }

    fn scatter(&mut self, max_rounds: usize) -> Result<()> {
        let followers = self
            .core
            .broadcast_scope()
            .iter()
            .filter(|&&rank| rank != ROOT)
            .count();

        for round in 0..max_rounds {
            let mut samples = Self::batch(round);
            let expected: i64 = samples.iter().map(|s| s.value).sum();
            self.core.broadcast_vector(&mut samples, TAG_SAMPLE)?;

            for _ in 0..followers {
                let (sum, status) = self.core.receive_any::<Sum>(TAG_SUM)?;
                if sum.round != round || sum.count != BATCH_SIZE || sum.total != expected {
                    return Err(ProcessError::handler(
                        TAG_SUM,
                        format!(
                            "rank {} summed {} samples to {} in round {}, expected {} to {} in round {}",
                            status.source, sum.count, sum.total, sum.round, BATCH_SIZE, expected, round
                        ),
                    ));
                }
            }
            self.core
                .log(format_args!("round {} total {} confirmed by {} ranks", round, expected, followers));
        }
        Ok(())
    }

    fn reduce(&mut self, max_rounds: usize) -> Result<()> {
        for _ in 0..max_rounds {
            let (samples, status) = self.core.receive_vector_any::<Sample>(TAG_SAMPLE)?;
            let mut sum = Sum {
                round: samples[0].round,
                count: samples.len(),
                total: samples.iter().map(|s| s.value).sum(),
                timestamp: 0,
            };
            self.core.send(&mut sum, status.source, TAG_SUM)?;
        }
        Ok(())
    }
}

impl<T: Transport> Process for Gather<T> {
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
        if rank == ROOT {
            self.scatter(max_rounds)
        } else if self.core.broadcast_scope().contains(&rank) {
            self.reduce(max_rounds)
        } else {
            self.core.log("outside broadcast scope, idle");
            Ok(())
        }
    }
}
