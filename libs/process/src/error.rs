//! Process Layer Error Types
//!
//! Transport failures pass through untouched; the process layer only adds
//! payload decoding and handler failures of its own.

use network::{Tag, TransportError};
use thiserror::Error;

/// Main process error type
#[derive(Error, Debug)]
pub enum ProcessError {
    /// Failure reported by the underlying transport
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// Payload could not be encoded or decoded as the requested type
    #[error("Codec error: {message} ({type_name})")]
    Codec {
        message: String,
        type_name: &'static str,
        source: bincode::Error,
    },

    /// A tag handler reported a failure
    #[error("Handler for tag {tag} failed: {message}")]
    Handler { tag: Tag, message: String },
}

/// Result type alias for process operations
pub type Result<T> = std::result::Result<T, ProcessError>;

impl ProcessError {
    /// Create a codec error for type `M`
    pub fn codec<M>(message: impl Into<String>, source: bincode::Error) -> Self {
        Self::Codec {
            message: message.into(),
            type_name: std::any::type_name::<M>(),
            source,
        }
    }

    /// Create a handler error
    pub fn handler(tag: Tag, message: impl Into<String>) -> Self {
        Self::Handler {
            tag,
            message: message.into(),
        }
    }

    pub fn is_transport(&self) -> bool {
        matches!(self, Self::Transport(_))
    }
}
