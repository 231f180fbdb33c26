//! Process core: Lamport-clocked send, broadcast and receive over a transport.
//!
//! ```text
//!   send/broadcast ──► tick clock ──► stamp ──► Transport::send*
//!
//!   receive ──► MessageBuffer hit? ──yes──┐
//!                   │ no                   ├──► decode ──► clock = max(clock, ts) + 1
//!                   └──► Transport::recv ──┘
//! ```
//!
//! One `ProcessCore` belongs to exactly one rank and is driven by one thread.
//! Every receive blocks until the buffer or the transport can satisfy it;
//! there are no timeouts.
//!
//! Single-message receives and sequence receives never claim each other's
//! frames. A frame that fails to decode stays buffered.
//!
//! An undefined or empty sequence count, or an exhausted logical clock,
//! terminates the whole OS process with [`EXIT_FATAL`].

use std::fmt;
use tracing::{debug, error, info, trace, warn};

use network::{Envelope, Rank, Source, Status, Tag, TagFilter, Transport, TransportStats};

use crate::buffer::MessageBuffer;
use crate::clock::LamportClock;
use crate::codec;
use crate::error::Result;
use crate::handlers::{Dispatched, TagHandlers};
use crate::message::{Message, Timestamp};

/// Exit status used when a rank cannot continue
pub const EXIT_FATAL: i32 = 1;

pub struct ProcessCore<T: Transport> {
    transport: T,
    rank: Rank,
    label: String,
    clock: LamportClock,
    broadcast_scope: Vec<Rank>,
    buffer: MessageBuffer,
}

impl<T: Transport> fmt::Debug for ProcessCore<T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ProcessCore")
            .field("rank", &self.rank)
            .field("label", &self.label)
            .field("clock", &self.clock.current())
            .field("broadcast_scope", &self.broadcast_scope)
            .field("buffered", &self.buffer.len())
            .finish()
    }
}

impl<T: Transport> ProcessCore<T> {
    /// Wrap a transport endpoint. The rank is taken from the transport and
    /// the broadcast scope starts empty.
    pub fn new(transport: T, label: impl Into<String>) -> Self {
        let rank = transport.rank();
        let label = label.into();
        debug!(rank, %label, transport = %transport.transport_type(), "Process core created");
        Self {
            transport,
            rank,
            label,
            clock: LamportClock::new(),
            broadcast_scope: Vec::new(),
            buffer: MessageBuffer::new(),
        }
    }

    pub fn rank(&self) -> Rank {
        self.rank
    }

    pub fn label(&self) -> &str {
        &self.label
    }

    /// Current logical time
    pub fn clock(&self) -> Timestamp {
        self.clock.current()
    }

    pub fn broadcast_scope(&self) -> &[Rank] {
        &self.broadcast_scope
    }

    /// Messages waiting in the out-of-order buffer
    pub fn buffered(&self) -> usize {
        self.buffer.len()
    }

    /// Number of ranks reachable through the transport
    pub fn cluster_size(&self) -> usize {
        self.transport.size()
    }

    pub fn transport(&self) -> &T {
        &self.transport
    }

    pub fn transport_stats(&self) -> TransportStats {
        self.transport.stats()
    }

    /// Register a local event and return the new logical time
    pub fn advance_clock(&mut self) -> Timestamp {
        self.tick()
    }

    fn tick(&mut self) -> Timestamp {
        match self.clock.tick() {
            Some(timestamp) => timestamp,
            None => self.fatal(format_args!("logical clock exhausted")),
        }
    }

    /// Replace the set of broadcast destinations.
    ///
    /// Ranks are not checked against the cluster; an unknown rank surfaces as
    /// a transport error on the next broadcast.
    pub fn set_broadcast_scope(&mut self, ranks: impl IntoIterator<Item = Rank>) {
        self.broadcast_scope = ranks.into_iter().collect();
        debug!(rank = self.rank, scope = ?self.broadcast_scope, "Broadcast scope set");
    }

    /// Emit one diagnostic line tagged with rank, logical time and label
    pub fn log(&self, message: impl fmt::Display) {
        info!(
            rank = self.rank,
            clock = self.clock.current(),
            label = %self.label,
            "{}",
            message
        );
    }

    /// Send one message. Ticks the clock once and stamps the new value.
    pub fn send<M: Message>(&mut self, message: &mut M, dest: Rank, tag: Tag) -> Result<()> {
        let timestamp = self.tick();
        message.set_timestamp(timestamp);
        let payload = codec::encode(message)?;
        trace!(rank = self.rank, dest, tag, timestamp, "Sending message");
        self.transport.send(dest, tag, payload)?;
        Ok(())
    }

    /// Send one message to every rank in the broadcast scope except this one.
    ///
    /// A broadcast is a single send event: the clock ticks once and every
    /// recipient sees the same timestamp.
    pub fn broadcast<M: Message>(&mut self, message: &mut M, tag: Tag) -> Result<()> {
        let timestamp = self.tick();
        message.set_timestamp(timestamp);
        let payload = codec::encode(message)?;

        for &dest in &self.broadcast_scope {
            if dest == self.rank {
                continue;
            }
            trace!(rank = self.rank, dest, tag, timestamp, "Broadcasting message");
            self.transport.send(dest, tag, payload.clone())?;
        }
        Ok(())
    }

    /// Send a sequence as one bulk frame. One clock tick; every element
    /// carries the same timestamp.
    pub fn send_vector<M: Message>(&mut self, messages: &mut [M], dest: Rank, tag: Tag) -> Result<()> {
        let timestamp = self.stamp_all(messages);
        let payload = codec::encode_sequence(messages)?;
        trace!(rank = self.rank, dest, tag, timestamp, count = messages.len(), "Sending sequence");
        self.transport.send_sequence(dest, tag, messages.len(), payload)?;
        Ok(())
    }

    /// Broadcast a sequence as one bulk frame per recipient, self excluded
    pub fn broadcast_vector<M: Message>(&mut self, messages: &mut [M], tag: Tag) -> Result<()> {
        let timestamp = self.stamp_all(messages);
        let payload = codec::encode_sequence(messages)?;

        for &dest in &self.broadcast_scope {
            if dest == self.rank {
                continue;
            }
            trace!(rank = self.rank, dest, tag, timestamp, count = messages.len(), "Broadcasting sequence");
            self.transport
                .send_sequence(dest, tag, messages.len(), payload.clone())?;
        }
        Ok(())
    }

    fn stamp_all<M: Message>(&mut self, messages: &mut [M]) -> Timestamp {
        if messages.is_empty() {
            warn!(rank = self.rank, "Sending an empty sequence; receivers treat it as fatal");
        }
        let timestamp = self.tick();
        for message in messages.iter_mut() {
            message.set_timestamp(timestamp);
        }
        timestamp
    }

    /// Receive one message from `source` under `tag`.
    ///
    /// A matching buffered message is returned before the transport is
    /// consulted. Either way the clock moves to `max(clock, ts) + 1` now, at
    /// consumption time.
    pub fn receive<M: Message>(&mut self, source: Rank, tag: Tag) -> Result<(M, Status)> {
        self.receive_from(Source::Rank(source), tag)
    }

    /// [`ProcessCore::receive`] from whichever rank delivers first
    pub fn receive_any<M: Message>(&mut self, tag: Tag) -> Result<(M, Status)> {
        self.receive_from(Source::Any, tag)
    }

    fn receive_from<M: Message>(&mut self, source: Source, tag: Tag) -> Result<(M, Status)> {
        let envelope = match self.buffer.take(source, &[tag]) {
            Some(envelope) => {
                trace!(rank = self.rank, %source, tag, "Receive satisfied from buffer");
                envelope
            }
            None => self.recv_single(source, tag)?,
        };

        let status = envelope.status();
        let message: M = match codec::decode(&envelope.payload) {
            Ok(message) => message,
            Err(e) => {
                self.buffer.restore(envelope);
                return Err(e);
            }
        };
        let clock = self.observe(message.timestamp());
        trace!(rank = self.rank, from = status.source, tag, clock, "Message received");
        Ok((message, status))
    }

    /// Take the next single-message frame from the transport. Sequence
    /// frames met on the way are buffered for a later vector receive.
    fn recv_single(&mut self, source: Source, tag: Tag) -> Result<Envelope> {
        loop {
            let envelope = self.transport.recv(source, TagFilter::Tag(tag))?;
            if !envelope.is_sequence() {
                return Ok(envelope);
            }
            trace!(rank = self.rank, %source, tag, "Sequence frame set aside for a vector receive");
            self.buffer.store(envelope);
        }
    }

    /// Receive a bulk sequence from `source` under `tag`.
    ///
    /// The element count is learned by probing before the receive. A count
    /// that is undefined or zero is unrecoverable and terminates the process.
    /// The clock is merged with the first element's timestamp, which every
    /// element shares.
    pub fn receive_vector<M: Message>(&mut self, source: Rank, tag: Tag) -> Result<(Vec<M>, Status)> {
        self.receive_vector_from(Source::Rank(source), tag)
    }

    /// [`ProcessCore::receive_vector`] from whichever rank delivers first
    pub fn receive_vector_any<M: Message>(&mut self, tag: Tag) -> Result<(Vec<M>, Status)> {
        self.receive_vector_from(Source::Any, tag)
    }

    fn receive_vector_from<M: Message>(&mut self, source: Source, tag: Tag) -> Result<(Vec<M>, Status)> {
        let envelope = match self.buffer.take_sequence(source, tag) {
            Some(envelope) => envelope,
            None => {
                let probe = self.transport.probe(source, TagFilter::Tag(tag))?;
                let count = self.require_count(probe);
                trace!(rank = self.rank, %source, tag, count, "Probed sequence");
                self.transport
                    .recv(Source::Rank(probe.source), TagFilter::Tag(tag))?
            }
        };

        let status = envelope.status();
        let count = self.require_count(status);
        let messages: Vec<M> = match codec::decode_sequence(&envelope.payload) {
            Ok(messages) => messages,
            Err(e) => {
                self.buffer.restore(envelope);
                return Err(e);
            }
        };
        if messages.len() != count {
            self.fatal(format_args!(
                "sequence from rank {} announced {} elements but carried {}",
                status.source,
                count,
                messages.len()
            ));
        }

        let clock = self.observe(messages[0].timestamp());
        trace!(rank = self.rank, from = status.source, tag, count, clock, "Sequence received");
        Ok((messages, status))
    }

    fn require_count(&self, status: Status) -> usize {
        match status.count {
            Some(count) if count > 0 => count,
            Some(_) => self.fatal(format_args!(
                "sequence from rank {} under tag {} is empty",
                status.source, status.tag
            )),
            None => self.fatal(format_args!(
                "element count from rank {} under tag {} is undefined",
                status.source, status.tag
            )),
        }
    }

    fn fatal(&self, reason: fmt::Arguments<'_>) -> ! {
        error!(rank = self.rank, clock = self.clock.current(), label = %self.label, "Fatal: {}", reason);
        std::process::exit(EXIT_FATAL)
    }

    /// Dispatch one message from `source` to the handler registered for its tag.
    ///
    /// The buffer is searched first for any registered tag. Otherwise one
    /// blocking transport receive (any tag) is made: a registered tag is
    /// dispatched, anything else is buffered for a later receive and the
    /// call returns `Ok(false)`. Sequence frames are never handed to the
    /// single-message handlers; they are buffered the same way. Callers that
    /// need a resolution loop on the return value.
    ///
    /// A payload that does not decode as its handler's type is returned to
    /// the buffer and the codec error is reported.
    pub fn receive_multi_tag(
        &mut self,
        source: Source,
        handlers: &mut TagHandlers<'_, T>,
    ) -> Result<bool> {
        if handlers.is_empty() {
            warn!(rank = self.rank, %source, "Multi-tag receive without handlers buffers everything");
        }

        let tags = handlers.tags();
        let envelope = match self.buffer.take(source, &tags) {
            Some(envelope) => {
                trace!(rank = self.rank, %source, tag = envelope.tag, "Multi-tag receive satisfied from buffer");
                envelope
            }
            None => self.transport.recv(source, TagFilter::Any)?,
        };

        if envelope.is_sequence() {
            self.buffer.store(envelope);
            return Ok(false);
        }

        match handlers.dispatch(self, &envelope) {
            Dispatched::Handled(outcome) => outcome.map(|_| true),
            Dispatched::Rejected(e) => {
                self.buffer.restore(envelope);
                Err(e)
            }
            Dispatched::Unregistered => {
                self.buffer.store(envelope);
                Ok(false)
            }
        }
    }

    /// Apply the receive rule for a consumed message
    pub(crate) fn observe(&mut self, timestamp: Timestamp) -> Timestamp {
        match self.clock.observe(timestamp) {
            Some(clock) => clock,
            None => self.fatal(format_args!(
                "logical clock exhausted by received timestamp {}",
                timestamp
            )),
        }
    }

    /// Buffered messages in arrival order, for diagnostics
    pub fn buffered_messages(&self) -> impl Iterator<Item = &Envelope> {
        self.buffer.iter()
    }
}
