//! Offline sample queue
//!
//! Routine samples that could not be delivered are kept in RAM and re-sent
//! after the next successful push. When full, the oldest sample is dropped.

use super::event::Location;
use heapless::Deque;

/// Samples kept while offline
pub const OFFLINE_CAPACITY: usize = 8;

/// One undelivered routine sample
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct OfflineSample {
    /// Position at capture time
    pub location: Location,
    /// Capture time (ms clock)
    pub timestamp_ms: u32,
}

/// Bounded FIFO of undelivered samples
#[derive(Debug, Default)]
pub struct OfflineQueue {
    samples: Deque<OfflineSample, OFFLINE_CAPACITY>,
    dropped: u32,
}

impl OfflineQueue {
    /// Create an empty queue
    pub const fn new() -> Self {
        Self {
            samples: Deque::new(),
            dropped: 0,
        }
    }

    /// Append a sample, dropping the oldest when full
    pub fn push(&mut self, sample: OfflineSample) {
        if self.samples.is_full() {
            self.samples.pop_front();
            self.dropped = self.dropped.saturating_add(1);
            crate::log_warn!("Telemetry: Offline queue full, dropped {} samples", self.dropped);
        }
        // Space was made above
        let _ = self.samples.push_back(sample);
    }

    /// Oldest sample
    pub fn pop(&mut self) -> Option<OfflineSample> {
        self.samples.pop_front()
    }

    /// Put a sample back at the front after a failed re-send
    pub fn requeue(&mut self, sample: OfflineSample) {
        if self.samples.is_full() {
            self.dropped = self.dropped.saturating_add(1);
            return;
        }
        let _ = self.samples.push_front(sample);
    }

    /// Queued samples
    pub fn len(&self) -> usize {
        self.samples.len()
    }

    /// No samples queued
    pub fn is_empty(&self) -> bool {
        self.samples.is_empty()
    }

    /// Samples dropped because the queue was full
    pub fn dropped(&self) -> u32 {
        self.dropped
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn sample(t: u32) -> OfflineSample {
        OfflineSample {
            location: Location::new(14.6, 120.98),
            timestamp_ms: t,
        }
    }

    #[test]
    fn test_fifo_order() {
        let mut queue = OfflineQueue::new();
        queue.push(sample(1));
        queue.push(sample(2));
        assert_eq!(queue.pop().map(|s| s.timestamp_ms), Some(1));
        assert_eq!(queue.pop().map(|s| s.timestamp_ms), Some(2));
        assert!(queue.pop().is_none());
    }

    #[test]
    fn test_full_queue_drops_oldest() {
        let mut queue = OfflineQueue::new();
        for t in 0..(OFFLINE_CAPACITY as u32 + 3) {
            queue.push(sample(t));
        }
        assert_eq!(queue.len(), OFFLINE_CAPACITY);
        assert_eq!(queue.dropped(), 3);
        assert_eq!(queue.pop().map(|s| s.timestamp_ms), Some(3));
    }

    #[test]
    fn test_requeue_goes_to_front() {
        let mut queue = OfflineQueue::new();
        queue.push(sample(1));
        queue.push(sample(2));
        let first = queue.pop().unwrap();
        queue.requeue(first);
        assert_eq!(queue.pop().map(|s| s.timestamp_ms), Some(1));
    }
}
