//! TCP Transport
//!
//! One listener per rank and a static peer table where index = rank.
//! Outbound connections are opened lazily on the first send to a peer and
//! reused afterwards, so frames to one destination stay ordered. Inbound
//! connections each get a reader thread that feeds the local mailbox.
//!
//! Dropping the transport stops the accept thread, shuts every inbound
//! connection down and joins its reader threads, which releases the
//! listening port.

use bytes::Bytes;
use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::io::BufReader;
use std::net::{IpAddr, Ipv4Addr, Ipv6Addr, Shutdown, SocketAddr, TcpListener, TcpStream};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::thread::{self, JoinHandle};
use std::time::Duration;
use tracing::{debug, info, trace, warn};

use super::metrics::{MetricsTracker, TransportStats};
use super::{Transport, TransportType};
use crate::envelope::{read_frame, write_frame, Envelope, Rank, Source, Status, Tag, TagFilter};
use crate::mailbox::Mailbox;
use crate::{Result, TransportError};

/// TCP transport configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TcpTransportConfig {
    /// Connection attempts per peer before giving up
    pub connect_attempts: u32,
    /// Pause between connection attempts
    pub connect_backoff: Duration,
    /// Largest accepted frame body
    pub max_frame_size: usize,
    /// Disable Nagle's algorithm on every connection
    pub nodelay: bool,
}

impl Default for TcpTransportConfig {
    fn default() -> Self {
        Self {
            connect_attempts: 50,
            connect_backoff: Duration::from_millis(100),
            max_frame_size: crate::DEFAULT_MAX_FRAME_SIZE,
            nodelay: true,
        }
    }
}

impl TcpTransportConfig {
    pub fn validate(&self) -> Result<()> {
        if self.connect_attempts == 0 {
            return Err(TransportError::configuration(
                "connect_attempts cannot be zero",
                Some("connect_attempts"),
            ));
        }
        if self.max_frame_size == 0 {
            return Err(TransportError::configuration(
                "max_frame_size cannot be zero",
                Some("max_frame_size"),
            ));
        }
        Ok(())
    }
}

/// TCP endpoint for one rank
pub struct TcpTransport {
    rank: Rank,
    peers: Arc<[SocketAddr]>,
    config: TcpTransportConfig,
    mailbox: Arc<Mailbox>,
    connections: Mutex<HashMap<Rank, TcpStream>>,
    metrics: MetricsTracker,
    local_addr: SocketAddr,
    inbound: Arc<Inbound>,
    accept_thread: Option<JoinHandle<()>>,
}

/// Accept-side state shared with the accept thread
struct Inbound {
    mailbox: Arc<Mailbox>,
    metrics: MetricsTracker,
    max_frame_size: usize,
    closed: AtomicBool,
    /// Accepted connections and the threads reading them
    readers: Mutex<Vec<(TcpStream, JoinHandle<()>)>>,
}

impl Inbound {
    /// Start a reader for an accepted connection unless the endpoint is closing
    fn adopt(&self, stream: TcpStream) {
        let mut readers = self.readers.lock();
        if self.closed.load(Ordering::Acquire) {
            return;
        }

        let handle = match stream.try_clone() {
            Ok(handle) => handle,
            Err(e) => {
                warn!(error = %e, "Failed to clone accepted connection");
                return;
            }
        };
        let mailbox = Arc::clone(&self.mailbox);
        let metrics = self.metrics.clone();
        let max_frame_size = self.max_frame_size;
        match thread::Builder::new()
            .name("tcp-reader".to_string())
            .spawn(move || read_loop(stream, mailbox, metrics, max_frame_size))
        {
            Ok(reader) => readers.push((handle, reader)),
            Err(e) => warn!(error = %e, "Failed to spawn reader thread"),
        }
    }

    /// Mark the endpoint closed and take over the live readers
    fn close(&self) -> Vec<(TcpStream, JoinHandle<()>)> {
        let mut readers = self.readers.lock();
        self.closed.store(true, Ordering::Release);
        readers.drain(..).collect()
    }

    fn is_closed(&self) -> bool {
        self.closed.load(Ordering::Acquire)
    }
}

impl std::fmt::Debug for TcpTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TcpTransport")
            .field("rank", &self.rank)
            .field("local_addr", &self.local_addr)
            .field("peers", &self.peers.len())
            .field("connections", &self.connections.lock().len())
            .finish()
    }
}

impl TcpTransport {
    /// Bind the listener at `peers[rank]` and start accepting peers
    pub fn bind(rank: Rank, peers: Vec<SocketAddr>, config: TcpTransportConfig) -> Result<Self> {
        let addr = *peers
            .get(rank)
            .ok_or_else(|| TransportError::unknown_rank(rank, peers.len()))?;
        let listener = TcpListener::bind(addr).map_err(|e| {
            TransportError::connection_with_source("Failed to bind listener", Some(addr), e)
        })?;
        Self::from_listener(rank, listener, peers, config)
    }

    /// Start the transport on an already bound listener
    pub fn from_listener(
        rank: Rank,
        listener: TcpListener,
        peers: Vec<SocketAddr>,
        config: TcpTransportConfig,
    ) -> Result<Self> {
        config.validate()?;
        if rank >= peers.len() {
            return Err(TransportError::unknown_rank(rank, peers.len()));
        }

        let local_addr = listener
            .local_addr()
            .map_err(|e| TransportError::io("Listener has no local address", e))?;
        let mailbox = Arc::new(Mailbox::new());
        let metrics = MetricsTracker::new();

        let inbound = Arc::new(Inbound {
            mailbox: Arc::clone(&mailbox),
            metrics: metrics.clone(),
            max_frame_size: config.max_frame_size,
            closed: AtomicBool::new(false),
            readers: Mutex::new(Vec::new()),
        });
        let acceptor = Arc::clone(&inbound);
        let accept_thread = thread::Builder::new()
            .name(format!("tcp-accept-{}", rank))
            .spawn(move || accept_loop(listener, acceptor))
            .map_err(|e| TransportError::io("Failed to spawn accept thread", e))?;

        info!(rank, %local_addr, peers = peers.len(), "TCP transport listening");

        Ok(Self {
            rank,
            peers: peers.into(),
            config,
            mailbox,
            connections: Mutex::new(HashMap::new()),
            metrics,
            local_addr,
            inbound,
            accept_thread: Some(accept_thread),
        })
    }

    pub fn local_addr(&self) -> SocketAddr {
        self.local_addr
    }

    /// Frames received and not yet consumed
    pub fn pending(&self) -> usize {
        self.mailbox.len()
    }

    fn peer_addr(&self, dest: Rank) -> Result<SocketAddr> {
        self.peers
            .get(dest)
            .copied()
            .ok_or_else(|| TransportError::unknown_rank(dest, self.peers.len()))
    }

    fn connect(&self, dest: Rank) -> Result<TcpStream> {
        let addr = self.peer_addr(dest)?;
        let mut last_error = None;

        for attempt in 1..=self.config.connect_attempts {
            match TcpStream::connect(addr) {
                Ok(stream) => {
                    stream.set_nodelay(self.config.nodelay).map_err(|e| {
                        TransportError::connection_with_source("Failed to set TCP_NODELAY", Some(addr), e)
                    })?;
                    debug!(rank = self.rank, dest, %addr, attempt, "Connected to peer");
                    return Ok(stream);
                }
                Err(e) => {
                    trace!(rank = self.rank, dest, %addr, attempt, error = %e, "Peer not reachable yet");
                    last_error = Some(e);
                    thread::sleep(self.config.connect_backoff);
                }
            }
        }

        let message = format!(
            "Failed to connect to rank {} after {} attempts",
            dest, self.config.connect_attempts
        );
        Err(match last_error {
            Some(e) => TransportError::connection_with_source(message, Some(addr), e),
            None => TransportError::connection(message, Some(addr)),
        })
    }

    fn transmit(&self, dest: Rank, envelope: Envelope) -> Result<()> {
        let bytes = envelope.payload.len();
        let sequence = envelope.is_sequence();

        if dest == self.rank {
            self.peer_addr(dest)?;
            self.mailbox.deliver(envelope);
            self.metrics.record_send(bytes, sequence);
            return Ok(());
        }

        let mut connections = self.connections.lock();
        if !connections.contains_key(&dest) {
            let stream = self.connect(dest).map_err(|e| {
                self.metrics.record_error();
                e
            })?;
            connections.insert(dest, stream);
        }

        let result = match connections.get_mut(&dest) {
            Some(stream) => write_frame(stream, &envelope),
            None => Err(TransportError::network("Connection table lost entry")),
        };

        match result {
            Ok(written) => {
                trace!(from = self.rank, to = dest, tag = envelope.tag, written, "TCP frame sent");
                self.metrics.record_send(bytes, sequence);
                Ok(())
            }
            Err(e) => {
                // Drop the broken stream; the next send reconnects.
                connections.remove(&dest);
                self.metrics.record_error();
                warn!(rank = self.rank, dest, error = %e, "TCP send failed");
                Err(e)
            }
        }
    }
}

impl Drop for TcpTransport {
    fn drop(&mut self) {
        let readers = self.inbound.close();

        // The accept thread only notices the flag once accept returns.
        let mut wake_addr = self.local_addr;
        if wake_addr.ip().is_unspecified() {
            wake_addr.set_ip(match wake_addr.ip() {
                IpAddr::V4(_) => IpAddr::V4(Ipv4Addr::LOCALHOST),
                IpAddr::V6(_) => IpAddr::V6(Ipv6Addr::LOCALHOST),
            });
        }
        match TcpStream::connect_timeout(&wake_addr, Duration::from_secs(1)) {
            Ok(_) => {
                if let Some(accept_thread) = self.accept_thread.take() {
                    let _ = accept_thread.join();
                }
            }
            Err(e) => warn!(rank = self.rank, error = %e, "Could not wake accept thread, leaving it detached"),
        }

        let count = readers.len();
        for (stream, reader) in readers {
            let _ = stream.shutdown(Shutdown::Both);
            let _ = reader.join();
        }
        debug!(rank = self.rank, readers = count, "TCP transport shut down");
    }
}

fn accept_loop(listener: TcpListener, inbound: Arc<Inbound>) {
    for stream in listener.incoming() {
        if inbound.is_closed() {
            break;
        }
        match stream {
            Ok(stream) => inbound.adopt(stream),
            Err(e) => {
                warn!(error = %e, "Failed to accept connection");
            }
        }
    }
    trace!("Accept loop stopped");
}

fn read_loop(stream: TcpStream, mailbox: Arc<Mailbox>, metrics: MetricsTracker, max_frame_size: usize) {
    let peer = stream.peer_addr().ok();
    debug!(?peer, "Accepted peer connection");
    let mut reader = BufReader::new(stream);

    loop {
        match read_frame(&mut reader, max_frame_size) {
            Ok(Some(envelope)) => {
                trace!(?peer, source = envelope.source, tag = envelope.tag, "TCP frame received");
                mailbox.deliver(envelope);
            }
            Ok(None) => {
                debug!(?peer, "Peer closed connection");
                return;
            }
            Err(e) => {
                metrics.record_error();
                warn!(?peer, error = %e, "Dropping peer connection after read failure");
                return;
            }
        }
    }
}

impl Transport for TcpTransport {
    fn rank(&self) -> Rank {
        self.rank
    }

    fn size(&self) -> usize {
        self.peers.len()
    }

    fn send(&self, dest: Rank, tag: Tag, payload: Bytes) -> Result<()> {
        self.transmit(dest, Envelope::single(self.rank, tag, payload))
    }

    fn send_sequence(&self, dest: Rank, tag: Tag, count: usize, payload: Bytes) -> Result<()> {
        self.transmit(dest, Envelope::sequence(self.rank, tag, count, payload))
    }

    fn recv(&self, source: Source, tag: TagFilter) -> Result<Envelope> {
        if let Source::Rank(rank) = source {
            self.peer_addr(rank)?;
        }
        let envelope = self.mailbox.take(source, tag);
        self.metrics.record_receive(envelope.payload.len());
        Ok(envelope)
    }

    fn probe(&self, source: Source, tag: TagFilter) -> Result<Status> {
        if let Source::Rank(rank) = source {
            self.peer_addr(rank)?;
        }
        let status = self.mailbox.peek(source, tag);
        self.metrics.record_probe();
        Ok(status)
    }

    fn stats(&self) -> TransportStats {
        self.metrics.snapshot()
    }

    fn transport_type(&self) -> TransportType {
        TransportType::Tcp
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn mesh(size: usize) -> Vec<TcpTransport> {
        let listeners: Vec<TcpListener> = (0..size)
            .map(|_| TcpListener::bind("127.0.0.1:0").unwrap())
            .collect();
        let peers: Vec<SocketAddr> = listeners.iter().map(|l| l.local_addr().unwrap()).collect();

        listeners
            .into_iter()
            .enumerate()
            .map(|(rank, listener)| {
                TcpTransport::from_listener(rank, listener, peers.clone(), TcpTransportConfig::default())
                    .unwrap()
            })
            .collect()
    }

    #[test]
    fn test_frames_cross_sockets_in_order() {
        let nodes = mesh(2);

        for i in 0..5u8 {
            nodes[0].send(1, 3, Bytes::from(vec![i])).unwrap();
        }
        for i in 0..5u8 {
            let envelope = nodes[1].recv(Source::Rank(0), TagFilter::Tag(3)).unwrap();
            assert_eq!(envelope.payload, Bytes::from(vec![i]));
            assert_eq!(envelope.source, 0);
        }
        assert_eq!(nodes[0].stats().frames_sent, 5);
        assert_eq!(nodes[1].stats().frames_received, 5);
    }

    #[test]
    fn test_sequence_status_over_tcp() {
        let nodes = mesh(2);
        nodes[1]
            .send_sequence(0, 4, 3, Bytes::from_static(b"abc"))
            .unwrap();

        let status = nodes[0].probe(Source::Any, TagFilter::Any).unwrap();
        assert_eq!(status, Status::new(1, 4, Some(3)));
        let envelope = nodes[0].recv(Source::Rank(1), TagFilter::Tag(4)).unwrap();
        assert_eq!(envelope.count, Some(3));
    }

    #[test]
    fn test_self_send_bypasses_socket() {
        let nodes = mesh(1);
        nodes[0].send(0, 1, Bytes::from_static(b"me")).unwrap();
        assert_eq!(nodes[0].pending(), 1);
        assert!(nodes[0].connections.lock().is_empty());
    }

    #[test]
    fn test_unknown_peer_rejected() {
        let nodes = mesh(1);
        let err = nodes[0].send(4, 1, Bytes::new()).unwrap_err();
        assert!(matches!(err, TransportError::UnknownRank { rank: 4, size: 1 }));
    }

    #[test]
    fn test_drop_releases_listener_and_readers() {
        let mut nodes = mesh(2);
        nodes[0].send(1, 2, Bytes::from_static(b"hi")).unwrap();
        let envelope = nodes[1].recv(Source::Rank(0), TagFilter::Tag(2)).unwrap();
        assert_eq!(envelope.payload, Bytes::from_static(b"hi"));
        assert_eq!(nodes[1].inbound.readers.lock().len(), 1);

        let addr = nodes[1].local_addr();
        let inbound = Arc::clone(&nodes[1].inbound);
        drop(nodes.pop());

        assert!(inbound.is_closed());
        assert!(inbound.readers.lock().is_empty());

        // The port is free again for a new endpoint of the same rank.
        let rebound = TcpTransport::bind(0, vec![addr], TcpTransportConfig::default()).unwrap();
        assert_eq!(rebound.local_addr(), addr);
        drop(nodes);
    }

    #[test]
    fn test_zero_connect_attempts_rejected() {
        let config = TcpTransportConfig {
            connect_attempts: 0,
            ..Default::default()
        };
        assert!(matches!(
            config.validate(),
            Err(TransportError::Configuration { .. })
        ));
    }
}
