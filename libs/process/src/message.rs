//! Message Capability
//!
//! Any payload exchanged through a [`ProcessCore`](crate::ProcessCore) must
//! expose its logical timestamp. Everything else about the payload is opaque
//! to the process layer.

use serde::de::DeserializeOwned;
use serde::Serialize;

/// Logical time, as counted by a Lamport clock
pub type Timestamp = u64;

/// Payload that carries a readable and writable logical timestamp
pub trait Message: Serialize + DeserializeOwned + Send + 'static {
    /// Timestamp stamped by the sender
    fn timestamp(&self) -> Timestamp;

    /// Overwrite the timestamp before transmission
    fn set_timestamp(&mut self, timestamp: Timestamp);
}

/// Implement [`Message`] for structs that keep their timestamp in a named field.
///
/// ```rust
/// use lamport_process::timestamped;
/// use serde::{Deserialize, Serialize};
///
/// #[derive(Debug, Default, Serialize, Deserialize)]
/// struct Ping {
///     round: u32,
///     timestamp: u64,
/// }
///
/// timestamped!(Ping => timestamp);
/// ```
#[macro_export]
macro_rules! timestamped {
    ($($ty:ty => $field:ident),+ $(,)?) => {
        $(
            impl $crate::Message for $ty {
                fn timestamp(&self) -> $crate::Timestamp {
                    self.$field
                }

                fn set_timestamp(&mut self, timestamp: $crate::Timestamp) {
                    self.$field = timestamp;
                }
            }
        )+
    };
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, Default, Serialize, Deserialize)]
    struct Probe {
        body: String,
        clock: Timestamp,
    }

    crate::timestamped!(Probe => clock);

    #[test]
    fn test_macro_targets_named_field() {
        let mut probe = Probe::default();
        probe.set_timestamp(42);
        assert_eq!(probe.clock, 42);
        assert_eq!(probe.timestamp(), 42);
    }
}
