//! Lamport logical clock.
//!
//! Send events tick the clock and stamp the new value; receive events move
//! it to `max(local, received) + 1`. The value never decreases and strictly
//! increases on every event. An event that would move the clock past
//! `u64::MAX` is refused and leaves the clock unchanged.

use crate::message::Timestamp;

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, PartialOrd, Ord)]
pub struct LamportClock {
    value: Timestamp,
}

impl LamportClock {
    pub fn new() -> Self {
        Self::default()
    }

    /// Clock starting at an arbitrary value
    pub fn starting_at(value: Timestamp) -> Self {
        Self { value }
    }

    pub fn current(&self) -> Timestamp {
        self.value
    }

    /// Local or send event: increment and return the new value.
    ///
    /// `None` when the clock is exhausted.
    pub fn tick(&mut self) -> Option<Timestamp> {
        self.value = self.value.checked_add(1)?;
        Some(self.value)
    }

    /// Receive event: merge a received timestamp and return the new value.
    ///
    /// `None` when `max(local, received) + 1` does not fit.
    pub fn observe(&mut self, received: Timestamp) -> Option<Timestamp> {
        self.value = self.value.max(received).checked_add(1)?;
        Some(self.value)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_tick_increments() {
        let mut clock = LamportClock::new();
        assert_eq!(clock.tick(), Some(1));
        assert_eq!(clock.tick(), Some(2));
        assert_eq!(clock.current(), 2);
    }

    #[test]
    fn test_observe_takes_max_plus_one() {
        let mut clock = LamportClock::starting_at(5);
        assert_eq!(clock.observe(3), Some(6));
        assert_eq!(clock.observe(10), Some(11));
        assert_eq!(clock.observe(11), Some(12));
    }

    #[test]
    fn test_observe_of_own_value_still_advances() {
        let mut clock = LamportClock::starting_at(4);
        assert_eq!(clock.observe(4), Some(5));
    }

    #[test]
    fn test_exhausted_clock_refuses_events() {
        let mut clock = LamportClock::starting_at(3);
        assert_eq!(clock.observe(Timestamp::MAX), None);
        assert_eq!(clock.current(), 3);

        assert_eq!(clock.observe(Timestamp::MAX - 1), Some(Timestamp::MAX));
        assert_eq!(clock.tick(), None);
        assert_eq!(clock.observe(0), None);
        assert_eq!(clock.current(), Timestamp::MAX);
    }
}
