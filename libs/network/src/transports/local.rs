//! In-Process Transport
//!
//! A [`LocalCluster`] owns one mailbox per rank. Each rank gets a
//! [`LocalTransport`] handle that pushes straight into the destination's
//! mailbox, so ranks running on separate threads exchange frames without
//! serialization of the envelope itself.

use bytes::Bytes;
use std::sync::Arc;
use tracing::{debug, trace};

use super::metrics::{MetricsTracker, TransportStats};
use super::{Transport, TransportType};
use crate::envelope::{Envelope, Rank, Source, Status, Tag, TagFilter};
use crate::mailbox::Mailbox;
use crate::{Result, TransportError};

/// Shared mailboxes for a fixed set of in-process ranks
#[derive(Debug, Clone)]
pub struct LocalCluster {
    mailboxes: Arc<[Mailbox]>,
    metrics: Arc<[MetricsTracker]>,
}

impl LocalCluster {
    /// Create a cluster of `size` ranks numbered `0..size`
    pub fn new(size: usize) -> Self {
        debug!("Creating local cluster with {} ranks", size);
        Self {
            mailboxes: (0..size).map(|_| Mailbox::new()).collect(),
            metrics: (0..size).map(|_| MetricsTracker::new()).collect(),
        }
    }

    pub fn size(&self) -> usize {
        self.mailboxes.len()
    }

    /// Transport handle for one rank
    pub fn endpoint(&self, rank: Rank) -> Result<LocalTransport> {
        if rank >= self.size() {
            return Err(TransportError::unknown_rank(rank, self.size()));
        }
        Ok(LocalTransport {
            rank,
            mailboxes: Arc::clone(&self.mailboxes),
            metrics: self.metrics[rank].clone(),
        })
    }

    /// One transport handle per rank, in rank order
    pub fn endpoints(&self) -> Vec<LocalTransport> {
        (0..self.size())
            .map(|rank| LocalTransport {
                rank,
                mailboxes: Arc::clone(&self.mailboxes),
                metrics: self.metrics[rank].clone(),
            })
            .collect()
    }

    /// Frames queued for `rank` and not yet received
    pub fn pending(&self, rank: Rank) -> usize {
        self.mailboxes.get(rank).map(Mailbox::len).unwrap_or(0)
    }
}

/// One rank's view of a [`LocalCluster`]
#[derive(Debug, Clone)]
pub struct LocalTransport {
    rank: Rank,
    mailboxes: Arc<[Mailbox]>,
    metrics: MetricsTracker,
}

impl LocalTransport {
    fn mailbox(&self, rank: Rank) -> Result<&Mailbox> {
        self.mailboxes.get(rank).ok_or_else(|| {
            self.metrics.record_error();
            TransportError::unknown_rank(rank, self.mailboxes.len())
        })
    }

    fn check_source(&self, source: Source) -> Result<()> {
        if let Source::Rank(rank) = source {
            self.mailbox(rank)?;
        }
        Ok(())
    }

    fn deliver(&self, dest: Rank, envelope: Envelope) -> Result<()> {
        let mailbox = self.mailbox(dest)?;
        self.metrics
            .record_send(envelope.payload.len(), envelope.is_sequence());
        trace!(
            from = self.rank,
            to = dest,
            tag = envelope.tag,
            bytes = envelope.payload.len(),
            "Local frame sent"
        );
        mailbox.deliver(envelope);
        Ok(())
    }

    /// Frames waiting in this rank's own mailbox
    pub fn pending(&self) -> usize {
        self.mailboxes[self.rank].len()
    }
}

impl Transport for LocalTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.mailboxes.len()
    }

    fn send(&self, dest: Rank, tag: Tag, payload: Bytes) -> Result<()> {
        self.deliver(dest, Envelope::single(self.rank, tag, payload))
    }

    fn send_sequence(&self, dest: Rank, tag: Tag, count: usize, payload: Bytes) -> Result<()> {
        self.deliver(dest, Envelope::sequence(self.rank, tag, count, payload))
    }

    fn recv(&self, source: Source, tag: TagFilter) -> Result<Envelope> {
        self.check_source(source)?;
        let envelope = self.mailboxes[self.rank].take(source, tag);
        self.metrics.record_receive(envelope.payload.len());
        Ok(envelope)
    }

    fn probe(&self, source: Source, tag: TagFilter) -> Result<Status> {
        self.check_source(source)?;
        let status = self.mailboxes[self.rank].peek(source, tag);
        self.metrics.record_probe();
        Ok(status)
    }

    fn stats(&self) -> TransportStats {
        self.metrics.snapshot()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Local
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::thread;

    #[test]
    fn test_endpoints_are_numbered_by_rank() {
        let cluster = LocalCluster::new(3);
        let endpoints = cluster.endpoints();
        assert_eq!(endpoints.len(), 3);
        for (rank, endpoint) in endpoints.iter().enumerate() {
            assert_eq!(endpoint.rank(), rank);
            assert_eq!(endpoint.size(), 3);
            assert_eq!(endpoint.transport_type(), TransportType::Local);
        }
        assert!(matches!(
            cluster.endpoint(3),
            Err(TransportError::UnknownRank { rank: 3, size: 3 })
        ));
    }

    #[test]
    fn test_send_and_recv_between_ranks() {
        let cluster = LocalCluster::new(2);
        let a = cluster.endpoint(0).unwrap();
        let b = cluster.endpoint(1).unwrap();

        a.send(1, 5, Bytes::from_static(b"hello")).unwrap();
        assert_eq!(cluster.pending(1), 1);

        let envelope = b.recv(Source::Rank(0), TagFilter::Tag(5)).unwrap();
        assert_eq!(envelope.source, 0);
        assert_eq!(envelope.count, None);
        assert_eq!(envelope.payload, Bytes::from_static(b"hello"));
        assert_eq!(b.pending(), 0);

        assert_eq!(a.stats().frames_sent, 1);
        assert_eq!(b.stats().frames_received, 1);
    }

    #[test]
    fn test_probe_reports_sequence_count() {
        let cluster = LocalCluster::new(2);
        let a = cluster.endpoint(0).unwrap();
        let b = cluster.endpoint(1).unwrap();

        a.send_sequence(1, 9, 4, Bytes::from_static(b"data")).unwrap();
        let status = b.probe(Source::Any, TagFilter::Tag(9)).unwrap();
        assert_eq!(status, Status::new(0, 9, Some(4)));
        assert_eq!(b.pending(), 1);
        assert_eq!(b.stats().probes, 1);
        assert_eq!(a.stats().sequence_frames_sent, 1);
    }

    #[test]
    fn test_unknown_destination_fails() {
        let cluster = LocalCluster::new(2);
        let a = cluster.endpoint(0).unwrap();
        let err = a.send(5, 1, Bytes::new()).unwrap_err();
        assert!(matches!(err, TransportError::UnknownRank { rank: 5, size: 2 }));
        assert_eq!(a.stats().errors, 1);
    }

    #[test]
    fn test_ranks_on_threads() {
        let cluster = LocalCluster::new(2);
        let mut endpoints = cluster.endpoints().into_iter();
        let a = endpoints.next().unwrap();
        let b = endpoints.next().unwrap();

        let echo = thread::spawn(move || {
            let request = b.recv(Source::Rank(0), TagFilter::Any).unwrap();
            b.send(0, request.tag + 1, request.payload).unwrap();
        });

        a.send(1, 10, Bytes::from_static(b"ping")).unwrap();
        let reply = a.recv(Source::Rank(1), TagFilter::Tag(11)).unwrap();
        assert_eq!(reply.payload, Bytes::from_static(b"ping"));
        echo.join().unwrap();
    }
}
