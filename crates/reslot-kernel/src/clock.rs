//! Discrete simulated clock.
//!
//! Simulated time is a `u64` nanosecond counter that only moves when the
//! scheduler pops an item with a later timestamp. There is no wall-clock
//! coupling anywhere in the kernel; a whole run is as fast as the host can
//! drain the queue.

/// Nanosecond-precision simulated clock.
///
/// The clock starts at zero and advances monotonically. Backwards movement
/// is a scheduler bug and trips a debug assert.
#[derive(Debug, Clone, Default)]
pub struct SimClock {
    now_ns: u64,
}

impl SimClock {
    /// Creates a clock at time zero.
    pub fn new() -> Self {
        Self { now_ns: 0 }
    }

    /// Returns the current simulated time in nanoseconds.
    #[inline]
    pub fn now(&self) -> u64 {
        self.now_ns
    }

    /// Returns the current simulated time in whole microseconds.
    #[inline]
    pub fn now_us(&self) -> u64 {
        self.now_ns / 1_000
    }

    /// Advances time to the given value.
    ///
    /// # Panics
    ///
    /// Panics in debug builds if `time_ns < self.now()`.
    pub fn advance_to(&mut self, time_ns: u64) {
        debug_assert!(
            time_ns >= self.now_ns,
            "time cannot go backwards: current={}, target={}",
            self.now_ns,
            time_ns
        );
        self.now_ns = time_ns;
    }

    /// Advances the clock by a delta.
    ///
    /// # Panics
    ///
    /// Panics on overflow.
    pub fn advance_by(&mut self, delta_ns: u64) {
        let target = self
            .now_ns
            .checked_add(delta_ns)
            .unwrap_or_else(|| panic!("clock overflow: {} + {delta_ns}", self.now_ns));
        self.advance_to(target);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn starts_at_zero() {
        let clock = SimClock::new();
        assert_eq!(clock.now(), 0);
    }

    #[test]
    fn advance_to() {
        let mut clock = SimClock::new();
        clock.advance_to(5_000);
        assert_eq!(clock.now(), 5_000);
    }

    #[test]
    fn advance_by_accumulates() {
        let mut clock = SimClock::new();
        clock.advance_by(1_000);
        clock.advance_by(500);
        assert_eq!(clock.now(), 1_500);
    }

    #[test]
    fn now_us_truncates() {
        let mut clock = SimClock::new();
        clock.advance_to(5_500);
        assert_eq!(clock.now_us(), 5);
    }

    #[test]
    #[should_panic(expected = "time cannot go backwards")]
    fn advance_to_past_panics() {
        let mut clock = SimClock::new();
        clock.advance_to(5_000);
        clock.advance_to(1_000);
    }
}
