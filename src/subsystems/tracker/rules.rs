//! Detection rules
//!
//! Each rule keeps the state it needs between cycles and reports edges; the
//! orchestrator decides what to raise.

use super::config::Geofence;
use crate::communication::telemetry::Location;
use crate::subsystems::navigation::haversine_distance;

/// Whether `interval_ms` has passed since `last` (always true before the first run)
pub fn interval_elapsed(last: Option<u32>, now_ms: u32, interval_ms: u32) -> bool {
    match last {
        None => true,
        Some(last) => now_ms.wrapping_sub(last) >= interval_ms,
    }
}

/// Motion between consecutive valid fixes
#[derive(Debug, Default)]
pub struct MotionDetector {
    previous: Option<Location>,
    detected: bool,
}

impl MotionDetector {
    /// Create a detector without a baseline
    pub const fn new() -> Self {
        Self {
            previous: None,
            detected: false,
        }
    }

    /// Feed a new fix; returns the distance from the previous one
    ///
    /// The flag latches once the distance exceeds `threshold_m` and stays set
    /// until [`take`](Self::take) or [`reset`](Self::reset).
    pub fn observe(&mut self, location: Location, threshold_m: f32) -> Option<f32> {
        let distance = self.previous.map(|prev| {
            haversine_distance(prev.latitude, prev.longitude, location.latitude, location.longitude)
        });
        if distance.is_some_and(|d| d > threshold_m) {
            self.detected = true;
        }
        self.previous = Some(location);
        distance
    }

    /// Motion seen since the flag was last cleared
    pub fn is_detected(&self) -> bool {
        self.detected
    }

    /// Read and clear the flag
    pub fn take(&mut self) -> bool {
        core::mem::take(&mut self.detected)
    }

    /// Clear the flag, keeping the baseline
    pub fn reset(&mut self) {
        self.detected = false;
    }
}

/// Geofence crossing
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FenceCrossing {
    /// Inside to outside
    Left,
    /// Outside to inside
    Returned,
}

/// Tracks which side of the geofence the vehicle is on
#[derive(Debug)]
pub struct GeofenceMonitor {
    fence: Option<Geofence>,
    inside: bool,
}

impl GeofenceMonitor {
    /// Monitor for `fence`, starting inside
    pub const fn new(fence: Option<Geofence>) -> Self {
        Self { fence, inside: true }
    }

    /// Replace the fence; the vehicle is assumed inside the new one
    pub fn set(&mut self, fence: Option<Geofence>) {
        self.fence = fence;
        self.inside = true;
    }

    /// Current fence
    pub fn fence(&self) -> Option<&Geofence> {
        self.fence.as_ref()
    }

    /// Last known side
    pub fn is_inside(&self) -> bool {
        self.inside
    }

    /// Distance to the center; `None` without a fence
    pub fn distance(&self, location: Location) -> Option<f32> {
        self.fence.map(|fence| {
            haversine_distance(location.latitude, location.longitude, fence.center_lat, fence.center_lon)
        })
    }

    /// Compare `location` with the fence and report a crossing
    ///
    /// The side is updated on every crossing, whether or not an alert follows.
    pub fn check(&mut self, location: Location) -> Option<FenceCrossing> {
        let fence = self.fence?;
        let inside = self.distance(location)? <= fence.radius_m;
        match (self.inside, inside) {
            (true, false) => {
                self.inside = false;
                Some(FenceCrossing::Left)
            }
            (false, true) => {
                self.inside = true;
                Some(FenceCrossing::Returned)
            }
            _ => None,
        }
    }
}

/// One-shot alarm for a condition that stays absent too long
///
/// Fires once per episode; a new episode starts when the condition is present
/// again.
#[derive(Debug)]
pub struct LossMonitor {
    timeout_ms: u32,
    lost_since: Option<u32>,
    alerted: bool,
}

impl LossMonitor {
    /// Monitor with the given absence timeout
    pub const fn new(timeout_ms: u32) -> Self {
        Self {
            timeout_ms,
            lost_since: None,
            alerted: false,
        }
    }

    /// Record the condition; true when an alert is due for this episode
    ///
    /// Stays true on later calls until [`acknowledge`](Self::acknowledge).
    pub fn update(&mut self, present: bool, now_ms: u32) -> bool {
        if present {
            self.lost_since = None;
            self.alerted = false;
            return false;
        }
        let since = *self.lost_since.get_or_insert(now_ms);
        !self.alerted && now_ms.wrapping_sub(since) >= self.timeout_ms
    }

    /// The alert for this episode has been raised
    pub fn acknowledge(&mut self) {
        self.alerted = true;
    }

    /// Start of the current absence
    pub fn lost_since(&self) -> Option<u32> {
        self.lost_since
    }
}

/// Global alert rate limit
#[derive(Debug)]
pub struct AlertLimiter {
    interval_ms: u32,
    last_ms: Option<u32>,
}

impl AlertLimiter {
    /// Limiter allowing one alert per `interval_ms`
    pub const fn new(interval_ms: u32) -> Self {
        Self {
            interval_ms,
            last_ms: None,
        }
    }

    /// Change the interval, keeping the last alert time
    pub fn set_interval(&mut self, interval_ms: u32) {
        self.interval_ms = interval_ms;
    }

    /// An alert at `now_ms` would be allowed
    pub fn allows(&self, now_ms: u32) -> bool {
        interval_elapsed(self.last_ms, now_ms, self.interval_ms)
    }

    /// Record an alert at `now_ms`
    pub fn record(&mut self, now_ms: u32) {
        self.last_ms = Some(now_ms);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const CENTER: Location = Location::new(14.6000, 120.9850);

    fn fence() -> Geofence {
        Geofence {
            center_lat: CENTER.latitude,
            center_lon: CENTER.longitude,
            radius_m: 100.0,
        }
    }

    #[test]
    fn test_motion_needs_baseline() {
        let mut motion = MotionDetector::new();
        assert_eq!(motion.observe(Location::new(14.6, 120.985), 5.0), None);
        assert!(!motion.is_detected());
    }

    #[test]
    fn test_motion_latches_until_taken() {
        let mut motion = MotionDetector::new();
        motion.observe(Location::new(14.5995, 120.9842), 5.0);
        let moved = motion.observe(Location::new(14.6100, 120.9950), 5.0).unwrap();
        assert!(moved > 1_000.0);
        assert!(motion.is_detected());

        // Standing still does not clear the flag
        motion.observe(Location::new(14.6100, 120.9950), 5.0);
        assert!(motion.take());
        assert!(!motion.take());
    }

    #[test]
    fn test_motion_below_threshold() {
        let mut motion = MotionDetector::new();
        motion.observe(Location::new(14.6000, 120.9850), 5.0);
        motion.observe(Location::new(14.60001, 120.98501), 5.0);
        assert!(!motion.is_detected());
    }

    #[test]
    fn test_geofence_crossings() {
        let mut monitor = GeofenceMonitor::new(Some(fence()));
        let inside = Location::new(14.5998, 120.9848);
        let outside = Location::new(14.6100, 120.9950);

        assert_eq!(monitor.check(inside), None);
        assert_eq!(monitor.check(outside), Some(FenceCrossing::Left));
        assert_eq!(monitor.check(outside), None);
        assert_eq!(monitor.check(inside), Some(FenceCrossing::Returned));
        assert_eq!(monitor.check(outside), Some(FenceCrossing::Left));
    }

    #[test]
    fn test_geofence_boundary_fix() {
        // About 102.6 m from the center
        let mut monitor = GeofenceMonitor::new(Some(fence()));
        let near = Location::new(14.5995, 120.9842);
        let d = monitor.distance(near).unwrap();
        assert!(d > 100.0 && d < 105.0);
        assert_eq!(monitor.check(near), Some(FenceCrossing::Left));
    }

    #[test]
    fn test_geofence_disabled() {
        let mut monitor = GeofenceMonitor::new(None);
        assert_eq!(monitor.check(Location::new(0.0, 0.0)), None);

        monitor.set(Some(fence()));
        assert!(monitor.is_inside());
        assert!(monitor.fence().is_some());
    }

    #[test]
    fn test_loss_monitor_one_shot_per_episode() {
        let mut monitor = LossMonitor::new(300_000);
        assert!(!monitor.update(false, 0));
        assert!(!monitor.update(false, 299_999));
        assert!(monitor.update(false, 300_000));

        // Not acknowledged yet (e.g. rate limited): still due
        assert!(monitor.update(false, 310_000));
        monitor.acknowledge();
        assert!(!monitor.update(false, 900_000));

        // Condition clears, then a new episode
        assert!(!monitor.update(true, 900_001));
        assert_eq!(monitor.lost_since(), None);
        assert!(!monitor.update(false, 1_000_000));
        assert!(monitor.update(false, 1_300_000));
    }

    #[test]
    fn test_loss_monitor_across_clock_wrap() {
        let mut monitor = LossMonitor::new(1_000);
        assert!(!monitor.update(false, u32::MAX - 500));
        assert!(monitor.update(false, 600));
    }

    #[test]
    fn test_limiter_first_alert_allowed() {
        let limiter = AlertLimiter::new(30_000);
        assert!(limiter.allows(0));
    }

    #[test]
    fn test_limiter_window() {
        let mut limiter = AlertLimiter::new(30_000);
        limiter.record(10_000);
        assert!(!limiter.allows(10_000));
        assert!(!limiter.allows(39_999));
        assert!(limiter.allows(40_000));
    }

    #[test]
    fn test_limiter_across_clock_wrap() {
        let mut limiter = AlertLimiter::new(30_000);
        limiter.record(u32::MAX - 10_000);
        assert!(!limiter.allows(5_000));
        assert!(limiter.allows(20_000));
    }
}
