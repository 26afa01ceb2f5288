//! Timer interface trait
//!
//! This module defines the clock and delay interface used by every wait in the
//! tracker core.

/// Timer interface trait
///
/// The clock is a free-running millisecond counter that wraps at `u32::MAX`
/// (roughly every 49.7 days), like Arduino's `millis()`. Durations must always
/// be computed with wrapping subtraction; [`elapsed_since`](Self::elapsed_since)
/// does this for you.
///
/// # Safety Invariants
///
/// - Monotonic time source (never goes backwards except for wraparound)
/// - `delay_ms` blocks the whole polling cycle; callers keep delays bounded
pub trait TimerInterface {
    /// Get current time in milliseconds since platform initialization
    fn now_ms(&self) -> u32;

    /// Block for at least `ms` milliseconds
    fn delay_ms(&mut self, ms: u32);

    /// Milliseconds elapsed since `earlier`, correct across counter wraparound
    fn elapsed_since(&self, earlier: u32) -> u32 {
        self.now_ms().wrapping_sub(earlier)
    }

    /// Whether at least `interval_ms` has passed since `last`
    ///
    /// `None` means the action never ran and is therefore due.
    fn is_due(&self, last: Option<u32>, interval_ms: u32) -> bool {
        match last {
            Some(at) => self.elapsed_since(at) >= interval_ms,
            None => true,
        }
    }
}
