//! Mock Timer implementation for testing

use crate::platform::traits::TimerInterface;
use std::cell::Cell;
use std::rc::Rc;

/// Mock Timer implementation
///
/// Simulated millisecond clock. Delays advance the clock instantly, and all
/// clones observe the same time, so a test can move time forward while the
/// code under test owns its own handle.
#[derive(Debug, Clone, Default)]
pub struct MockTimer {
    now_ms: Rc<Cell<u32>>,
}

impl MockTimer {
    /// Create a new mock timer at t = 0
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a mock timer starting at `ms`
    pub fn starting_at(ms: u32) -> Self {
        let timer = Self::new();
        timer.set(ms);
        timer
    }

    /// Advance the shared clock (wraps like the hardware counter)
    pub fn advance(&self, ms: u32) {
        self.now_ms.set(self.now_ms.get().wrapping_add(ms));
    }

    /// Jump the shared clock to an absolute value
    pub fn set(&self, ms: u32) {
        self.now_ms.set(ms);
    }
}

impl TimerInterface for MockTimer {
    fn now_ms(&self) -> u32 {
        self.now_ms.get()
    }

    fn delay_ms(&mut self, ms: u32) {
        self.advance(ms);
    }
}
