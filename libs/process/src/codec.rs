//! Payload encoding.
//!
//! Single messages and message sequences are bincode-encoded into the opaque
//! payload the transport carries. A sequence is encoded as one bincode
//! sequence so the receiver can decode it in a single pass.
//!
//! Decoding must consume the whole payload. Leftover bytes mean the payload
//! was written for a different type and are reported as a codec error.

use bincode::Options;
use bytes::Bytes;
use serde::de::DeserializeOwned;
use serde::Serialize;

use crate::error::{ProcessError, Result};

fn options() -> impl Options {
    bincode::DefaultOptions::new()
        .with_fixint_encoding()
        .reject_trailing_bytes()
}

pub fn encode<M: Serialize>(message: &M) -> Result<Bytes> {
    options()
        .serialize(message)
        .map(Bytes::from)
        .map_err(|e| ProcessError::codec::<M>("Failed to encode message", e))
}

pub fn encode_sequence<M: Serialize>(messages: &[M]) -> Result<Bytes> {
    options()
        .serialize(messages)
        .map(Bytes::from)
        .map_err(|e| ProcessError::codec::<M>("Failed to encode message sequence", e))
}

pub fn decode<M: DeserializeOwned>(payload: &[u8]) -> Result<M> {
    options()
        .deserialize(payload)
        .map_err(|e| ProcessError::codec::<M>("Failed to decode message", e))
}

pub fn decode_sequence<M: DeserializeOwned>(payload: &[u8]) -> Result<Vec<M>> {
    options()
        .deserialize(payload)
        .map_err(|e| ProcessError::codec::<M>("Failed to decode message sequence", e))
}
