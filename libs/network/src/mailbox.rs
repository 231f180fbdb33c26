//! Per-rank inbound queue with selective, blocking matching.
//!
//! Frames are kept in arrival order. A receive takes the first frame that
//! matches its (source, tag) selectors, so frames from one sender under one
//! tag never overtake each other.

use parking_lot::{Condvar, Mutex};
use std::collections::VecDeque;
use tracing::trace;

use crate::envelope::{Envelope, Source, Status, TagFilter};

#[derive(Debug, Default)]
pub struct Mailbox {
    queue: Mutex<VecDeque<Envelope>>,
    arrived: Condvar,
}

impl Mailbox {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a frame and wake blocked receivers
    pub fn deliver(&self, envelope: Envelope) {
        let mut queue = self.queue.lock();
        trace!(
            source = envelope.source,
            tag = envelope.tag,
            queued = queue.len(),
            "Frame delivered to mailbox"
        );
        queue.push_back(envelope);
        drop(queue);
        self.arrived.notify_all();
    }

    /// Block until a matching frame is queued, then remove and return it
    pub fn take(&self, source: Source, tag: TagFilter) -> Envelope {
        let mut queue = self.queue.lock();
        loop {
            if let Some(index) = queue.iter().position(|e| e.matches(source, tag)) {
                if let Some(envelope) = queue.remove(index) {
                    return envelope;
                }
            }
            self.arrived.wait(&mut queue);
        }
    }

    /// Block until a matching frame is queued and report its metadata without removing it
    pub fn peek(&self, source: Source, tag: TagFilter) -> Status {
        let mut queue = self.queue.lock();
        loop {
            if let Some(envelope) = queue.iter().find(|e| e.matches(source, tag)) {
                return envelope.status();
            }
            self.arrived.wait(&mut queue);
        }
    }

    /// Number of frames waiting
    pub fn len(&self) -> usize {
        self.queue.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.queue.lock().is_empty()
    }
}
