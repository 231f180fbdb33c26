//! Out-of-order message buffer.
//!
//! Holds frames that were taken off the transport but not wanted by the
//! receive that took them. Entries are owned by the buffer until a later
//! receive claims them; claiming moves the entry out. Nothing is ever dropped
//! here.

use std::collections::VecDeque;
use tracing::debug;

use network::{Envelope, Source, Tag};

#[derive(Debug, Default)]
pub struct MessageBuffer {
    entries: VecDeque<Envelope>,
}

impl MessageBuffer {
    pub fn new() -> Self {
        Self::default()
    }

    /// Park a frame until a matching receive asks for it
    pub fn store(&mut self, envelope: Envelope) {
        debug!(
            source = envelope.source,
            tag = envelope.tag,
            buffered = self.entries.len() + 1,
            "Buffering unmatched message"
        );
        self.entries.push_back(envelope);
    }

    /// Remove the oldest single-message entry from `source` whose tag is
    /// in `tags`. Sequence frames are only claimed by
    /// [`MessageBuffer::take_sequence`].
    pub fn take(&mut self, source: Source, tags: &[Tag]) -> Option<Envelope> {
        let index = self.entries.iter().position(|e| {
            !e.is_sequence() && source.matches(e.source) && tags.contains(&e.tag)
        })?;
        self.entries.remove(index)
    }

    /// Put back an entry whose claim failed. It goes to the head so it is
    /// again the first match for its (source, tag).
    pub fn restore(&mut self, envelope: Envelope) {
        debug!(
            source = envelope.source,
            tag = envelope.tag,
            buffered = self.entries.len() + 1,
            "Returning unclaimed message to buffer"
        );
        self.entries.push_front(envelope);
    }

    /// Like [`MessageBuffer::take`], restricted to sequence frames
    pub fn take_sequence(&mut self, source: Source, tag: Tag) -> Option<Envelope> {
        let index = self
            .entries
            .iter()
            .position(|e| e.is_sequence() && source.matches(e.source) && e.tag == tag)?;
        self.entries.remove(index)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Buffered entries in arrival order
    pub fn iter(&self) -> impl Iterator<Item = &Envelope> {
        self.entries.iter()
    }
}
