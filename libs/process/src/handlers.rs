//! Tag-keyed handler registry for multi-tag dispatch.
//!
//! Each registered tag carries the concrete payload type it expects. When a
//! frame arrives under a registered tag, the registry decodes it as that
//! type, lets the process apply the receive clock rule, then calls the
//! handler. Handlers get the process back as their first argument so they
//! can reply from inside dispatch. A payload that does not decode as the
//! registered type is not consumed: the caller keeps the envelope.

use std::collections::HashMap;
use std::fmt;

use network::{Envelope, Status, Tag, Transport};

use crate::codec;
use crate::process_core::ProcessCore;
use crate::error::{ProcessError, Result};
use crate::message::Message;

type Dispatch<'h, T> = Box<dyn FnMut(&mut ProcessCore<T>, &Envelope) -> Dispatched + 'h>;

/// Outcome of offering one envelope to the registry
#[derive(Debug)]
pub(crate) enum Dispatched {
    /// The handler ran and the message is consumed
    Handled(Result<()>),
    /// The payload did not decode as the registered type
    Rejected(ProcessError),
    /// No handler for the envelope's tag
    Unregistered,
}

pub struct TagHandlers<'h, T: Transport> {
    handlers: HashMap<Tag, Dispatch<'h, T>>,
}

impl<'h, T: Transport> TagHandlers<'h, T> {
    pub fn new() -> Self {
        Self {
            handlers: HashMap::new(),
        }
    }

    /// Builder form of [`TagHandlers::insert`]
    pub fn on<M, F>(mut self, tag: Tag, handler: F) -> Self
    where
        M: Message,
        F: FnMut(&mut ProcessCore<T>, M, Status) -> Result<()> + 'h,
    {
        self.insert(tag, handler);
        self
    }

    /// Register `handler` for frames under `tag`, decoded as `M`.
    ///
    /// Registering a tag twice replaces the earlier handler.
    pub fn insert<M, F>(&mut self, tag: Tag, mut handler: F)
    where
        M: Message,
        F: FnMut(&mut ProcessCore<T>, M, Status) -> Result<()> + 'h,
    {
        let dispatch = move |core: &mut ProcessCore<T>, envelope: &Envelope| {
            let message: M = match codec::decode(&envelope.payload) {
                Ok(message) => message,
                Err(e) => return Dispatched::Rejected(e),
            };
            core.observe(message.timestamp());
            Dispatched::Handled(handler(core, message, envelope.status()))
        };
        self.handlers.insert(tag, Box::new(dispatch));
    }

    pub fn remove(&mut self, tag: Tag) -> bool {
        self.handlers.remove(&tag).is_some()
    }

    pub fn contains(&self, tag: Tag) -> bool {
        self.handlers.contains_key(&tag)
    }

    /// Registered tags, ascending
    pub fn tags(&self) -> Vec<Tag> {
        let mut tags: Vec<Tag> = self.handlers.keys().copied().collect();
        tags.sort_unstable();
        tags
    }

    pub fn len(&self) -> usize {
        self.handlers.len()
    }

    pub fn is_empty(&self) -> bool {
        self.handlers.is_empty()
    }

    /// Run the handler registered for the envelope's tag
    pub(crate) fn dispatch(&mut self, core: &mut ProcessCore<T>, envelope: &Envelope) -> Dispatched {
        match self.handlers.get_mut(&envelope.tag) {
            Some(handler) => handler(core, envelope),
            None => Dispatched::Unregistered,
        }
    }
}

impl<'h, T: Transport> Default for TagHandlers<'h, T> {
    fn default() -> Self {
        Self::new()
    }
}

impl<'h, T: Transport> fmt::Debug for TagHandlers<'h, T> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TagHandlers")
            .field("tags", &self.tags())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use network::{LocalCluster, LocalTransport};
    use serde::{Deserialize, Serialize};

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Note {
        text: String,
        timestamp: u64,
    }

    crate::timestamped!(Note => timestamp);

    #[test]
    fn test_registry_bookkeeping() {
        let mut handlers: TagHandlers<'_, LocalTransport> = TagHandlers::new()
            .on::<Note, _>(4, |_, _, _| Ok(()))
            .on::<Note, _>(2, |_, _, _| Ok(()));

        assert_eq!(handlers.tags(), vec![2, 4]);
        assert!(handlers.contains(4));
        assert!(!handlers.contains(3));
        assert!(handlers.remove(4));
        assert!(!handlers.remove(4));
        assert_eq!(handlers.len(), 1);
        assert!(!handlers.is_empty());
        assert_eq!(format!("{:?}", handlers), "TagHandlers { tags: [2] }");
    }

    #[test]
    fn test_dispatch_decodes_and_advances_clock() {
        let cluster = LocalCluster::new(1);
        let mut core = ProcessCore::new(cluster.endpoint(0).unwrap(), "solo");

        let mut seen = Vec::new();
        let mut handlers = TagHandlers::new().on::<Note, _>(1, |_, note, status| {
            seen.push((note.text, status.tag));
            Ok(())
        });

        let note = Note {
            text: "hello".to_string(),
            timestamp: 9,
        };
        let envelope = Envelope::single(0, 1, codec::encode(&note).unwrap());
        assert!(matches!(
            handlers.dispatch(&mut core, &envelope),
            Dispatched::Handled(Ok(()))
        ));
        assert_eq!(core.clock(), 10);

        let unknown = Envelope::single(0, 2, codec::encode(&note).unwrap());
        assert!(matches!(
            handlers.dispatch(&mut core, &unknown),
            Dispatched::Unregistered
        ));
        assert_eq!(core.clock(), 10);

        let garbled = Envelope::single(0, 1, bytes::Bytes::from_static(b"\x01"));
        assert!(matches!(
            handlers.dispatch(&mut core, &garbled),
            Dispatched::Rejected(ProcessError::Codec { .. })
        ));
        assert_eq!(core.clock(), 10);

        drop(handlers);
        assert_eq!(seen, vec![("hello".to_string(), 1)]);
    }
}
