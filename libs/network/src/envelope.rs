//! Envelopes and Delivery Metadata
//!
//! An [`Envelope`] is one transport frame: who sent it, under which tag, how
//! many elements it carries and the encoded payload. The transport never
//! looks inside the payload.
//!
//! Wire format used by stream transports:
//!
//! ```text
//! [frame_len: u32 LE][bincode(Envelope)]
//! ```

use bytes::Bytes;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::io::{ErrorKind, Read, Write};

use crate::error::{Result, TransportError};

/// A process identity within the cluster
pub type Rank = usize;

/// Integer label of a logical message channel
pub type Tag = i32;

/// Bytes used by the frame length prefix
pub const FRAME_HEADER_SIZE: usize = 4;

/// Source selector for receives and probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Source {
    /// Only frames sent by this rank
    Rank(Rank),
    /// Frames from any rank
    Any,
}

impl Source {
    /// Check whether a frame sent by `rank` satisfies this selector
    pub fn matches(&self, rank: Rank) -> bool {
        match self {
            Source::Rank(expected) => *expected == rank,
            Source::Any => true,
        }
    }
}

impl From<Rank> for Source {
    fn from(rank: Rank) -> Self {
        Source::Rank(rank)
    }
}

impl fmt::Display for Source {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Source::Rank(rank) => write!(f, "{}", rank),
            Source::Any => write!(f, "*"),
        }
    }
}

/// Tag selector for receives and probes
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TagFilter {
    /// Only frames carrying this tag
    Tag(Tag),
    /// Frames with any tag
    Any,
}

impl TagFilter {
    pub fn matches(&self, tag: Tag) -> bool {
        match self {
            TagFilter::Tag(expected) => *expected == tag,
            TagFilter::Any => true,
        }
    }
}

impl From<Tag> for TagFilter {
    fn from(tag: Tag) -> Self {
        TagFilter::Tag(tag)
    }
}

/// Delivery metadata returned by every receive and probe
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Status {
    /// Rank that sent the frame
    pub source: Rank,
    /// Tag the frame was sent under
    pub tag: Tag,
    /// Element count for sequence frames, `None` when undefined
    pub count: Option<usize>,
}

impl Status {
    pub fn new(source: Rank, tag: Tag, count: Option<usize>) -> Self {
        Self { source, tag, count }
    }
}

/// One transport frame
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Envelope {
    pub source: Rank,
    pub tag: Tag,
    /// `Some(n)` for a sequence of `n` elements, `None` for a single message
    pub count: Option<usize>,
    pub payload: Bytes,
}

impl Envelope {
    /// Frame holding a single encoded message
    pub fn single(source: Rank, tag: Tag, payload: Bytes) -> Self {
        Self {
            source,
            tag,
            count: None,
            payload,
        }
    }

    /// Frame holding an encoded sequence of `count` messages
    pub fn sequence(source: Rank, tag: Tag, count: usize, payload: Bytes) -> Self {
        Self {
            source,
            tag,
            count: Some(count),
            payload,
        }
    }

    /// Delivery metadata for this frame
    pub fn status(&self) -> Status {
        Status::new(self.source, self.tag, self.count)
    }

    pub fn matches(&self, source: Source, tag: TagFilter) -> bool {
        source.matches(self.source) && tag.matches(self.tag)
    }

    pub fn is_sequence(&self) -> bool {
        self.count.is_some()
    }

    /// Serialize the envelope into a length-prefixed frame
    pub fn to_wire_format(&self) -> Result<Vec<u8>> {
        let body = bincode::serialize(self)?;
        if body.len() > u32::MAX as usize {
            return Err(TransportError::protocol(format!(
                "Frame of {} bytes exceeds the length prefix",
                body.len()
            )));
        }

        let mut frame = Vec::with_capacity(FRAME_HEADER_SIZE + body.len());
        frame.extend_from_slice(&(body.len() as u32).to_le_bytes());
        frame.extend_from_slice(&body);
        Ok(frame)
    }

    /// Parse an envelope from a frame body (length prefix already stripped)
    pub fn from_wire_format(body: &[u8]) -> Result<Self> {
        bincode::deserialize(body).map_err(|e| {
            TransportError::protocol_with_source("Failed to decode envelope frame", e)
        })
    }
}

/// Write one length-prefixed frame
pub fn write_frame<W: Write>(writer: &mut W, envelope: &Envelope) -> Result<usize> {
    let frame = envelope.to_wire_format()?;
    writer
        .write_all(&frame)
        .and_then(|_| writer.flush())
        .map_err(|e| TransportError::io("Failed to write frame", e))?;
    Ok(frame.len())
}

/// Read one length-prefixed frame.
///
/// Returns `Ok(None)` when the peer closed the stream cleanly between frames.
pub fn read_frame<R: Read>(reader: &mut R, max_frame_size: usize) -> Result<Option<Envelope>> {
    let mut header = [0u8; FRAME_HEADER_SIZE];
    match reader.read_exact(&mut header) {
        Ok(()) => {}
        Err(e) if e.kind() == ErrorKind::UnexpectedEof => return Ok(None),
        Err(e) => return Err(TransportError::io("Failed to read frame header", e)),
    }

    let len = u32::from_le_bytes(header) as usize;
    if len > max_frame_size {
        return Err(TransportError::protocol(format!(
            "Frame of {} bytes exceeds limit of {} bytes",
            len, max_frame_size
        )));
    }

    let mut body = vec![0u8; len];
    reader
        .read_exact(&mut body)
        .map_err(|e| TransportError::io("Truncated frame body", e))?;

    Envelope::from_wire_format(&body).map(Some)
}
