//! Tracker configuration

use crate::core::parameters::bounded_string;
use crate::devices::modem::PhoneNumber;

/// Operating mode, selecting default intervals and thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum OperatingMode {
    /// Short intervals, low thresholds, confirmation SMS and diagnostics
    Testing = 0,
    /// Field settings
    Production = 1,
}

impl OperatingMode {
    /// Parameter encoding (`TRK_MODE`)
    pub fn from_param(value: i32) -> Self {
        if value == OperatingMode::Testing as i32 {
            OperatingMode::Testing
        } else {
            OperatingMode::Production
        }
    }

    /// Minimum gap between GPS polls
    pub fn gps_update_interval_ms(&self) -> u32 {
        match self {
            OperatingMode::Testing => 5_000,
            OperatingMode::Production => 60_000,
        }
    }

    /// Minimum gap between alerts
    pub fn alert_interval_ms(&self) -> u32 {
        match self {
            OperatingMode::Testing => 30_000,
            OperatingMode::Production => 300_000,
        }
    }

    /// Displacement between fixes counted as motion
    pub fn motion_threshold_m(&self) -> f32 {
        match self {
            OperatingMode::Testing => 5.0,
            OperatingMode::Production => 15.0,
        }
    }

    /// Default speed limit
    pub fn speed_limit_kmh(&self) -> f32 {
        match self {
            OperatingMode::Testing => 10.0,
            OperatingMode::Production => 80.0,
        }
    }
}

/// Circular safe area
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Geofence {
    /// Center latitude in degrees
    pub center_lat: f32,
    /// Center longitude in degrees
    pub center_lon: f32,
    /// Radius in meters
    pub radius_m: f32,
}

/// Tracker settings
#[derive(Debug, Clone, PartialEq)]
pub struct TrackerConfig {
    /// Operating mode
    pub mode: OperatingMode,
    /// Minimum gap between GPS polls
    pub gps_update_interval_ms: u32,
    /// Minimum gap between alerts
    pub alert_interval_ms: u32,
    /// Displacement between fixes counted as motion
    pub motion_threshold_m: f32,
    /// Speed limit
    pub speed_limit_kmh: f32,
    /// Minimum gap between network registration checks
    pub gsm_check_interval_ms: u32,
    /// Continuous fix loss before a GPS-lost alert
    pub gps_loss_timeout_ms: u32,
    /// Continuous network loss before a GSM-lost alert
    pub gsm_loss_timeout_ms: u32,
    /// Pause after an alert before leaving the `Alert` state
    pub alert_settle_ms: u32,
    /// Modem initialization attempts at startup
    pub modem_init_attempts: u8,
    /// Pause between modem initialization attempts
    pub modem_init_retry_ms: u32,
    /// Startup wait for the first fix
    pub gps_fix_timeout_ms: u32,
    /// SMS recipient, `None` disables SMS
    pub emergency_contact: Option<PhoneNumber>,
    /// Safe area, `None` disables the geofence rule
    pub geofence: Option<Geofence>,
}

impl TrackerConfig {
    /// Defaults for `mode`
    pub fn new(mode: OperatingMode) -> Self {
        Self {
            mode,
            gps_update_interval_ms: mode.gps_update_interval_ms(),
            alert_interval_ms: mode.alert_interval_ms(),
            motion_threshold_m: mode.motion_threshold_m(),
            speed_limit_kmh: mode.speed_limit_kmh(),
            gsm_check_interval_ms: 30_000,
            gps_loss_timeout_ms: 300_000,
            gsm_loss_timeout_ms: 600_000,
            alert_settle_ms: 2_000,
            modem_init_attempts: 10,
            modem_init_retry_ms: 2_000,
            gps_fix_timeout_ms: 60_000,
            emergency_contact: None,
            geofence: None,
        }
    }

    /// Set the SMS recipient; an empty number disables SMS
    pub fn with_contact(mut self, number: &str) -> Self {
        self.emergency_contact = (!number.is_empty()).then(|| bounded_string(number));
        self
    }

    /// Testing mode
    pub fn is_testing(&self) -> bool {
        self.mode == OperatingMode::Testing
    }
}

impl Default for TrackerConfig {
    fn default() -> Self {
        Self::new(OperatingMode::Production)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mode_defaults() {
        let testing = TrackerConfig::new(OperatingMode::Testing);
        assert_eq!(testing.gps_update_interval_ms, 5_000);
        assert_eq!(testing.alert_interval_ms, 30_000);
        assert_eq!(testing.motion_threshold_m, 5.0);
        assert_eq!(testing.speed_limit_kmh, 10.0);

        let production = TrackerConfig::default();
        assert_eq!(production.gps_update_interval_ms, 60_000);
        assert_eq!(production.alert_interval_ms, 300_000);
        assert_eq!(production.motion_threshold_m, 15.0);
        assert_eq!(production.speed_limit_kmh, 80.0);
        assert!(!production.is_testing());
    }

    #[test]
    fn test_mode_from_param() {
        assert_eq!(OperatingMode::from_param(0), OperatingMode::Testing);
        assert_eq!(OperatingMode::from_param(1), OperatingMode::Production);
        assert_eq!(OperatingMode::from_param(7), OperatingMode::Production);
    }

    #[test]
    fn test_contact() {
        let config = TrackerConfig::default().with_contact("+639171234567");
        assert_eq!(config.emergency_contact.as_deref(), Some("+639171234567"));
        assert!(TrackerConfig::default().with_contact("").emergency_contact.is_none());
    }
}
