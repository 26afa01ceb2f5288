//! Alert events and locations

use crate::core::parameters::bounded_string;
use crate::devices::gps::Fix;
use core::fmt;
use heapless::String;

/// Alert message capacity
pub const MESSAGE_CAPACITY: usize = 64;

/// Alert categories
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum AlertKind {
    /// Movement while armed
    Motion,
    /// Speed limit exceeded
    Speed,
    /// Left the geofence
    Geofence,
    /// No GPS fix for too long
    GpsLost,
    /// No network for too long
    GsmLost,
    /// Internal failure
    SystemError,
}

impl AlertKind {
    /// Heading used in SMS alerts
    pub fn label(&self) -> &'static str {
        match self {
            AlertKind::Motion => "MOTION ALERT",
            AlertKind::Speed => "SPEED ALERT",
            AlertKind::Geofence => "GEOFENCE ALERT",
            AlertKind::GpsLost => "GPS LOST",
            AlertKind::GsmLost => "GSM LOST",
            AlertKind::SystemError => "SYSTEM ERROR",
        }
    }

    /// `alertType` value in HTTP payloads
    pub fn code(&self) -> &'static str {
        match self {
            AlertKind::Motion => "MOTION_DETECTED",
            AlertKind::Speed => "SPEED_EXCEEDED",
            AlertKind::Geofence => "GEOFENCE_BREACH",
            AlertKind::GpsLost => "GPS_LOST",
            AlertKind::GsmLost => "GSM_LOST",
            AlertKind::SystemError => "SYSTEM_ERROR",
        }
    }
}

/// Position in decimal degrees
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Location {
    /// Latitude, south negative
    pub latitude: f32,
    /// Longitude, west negative
    pub longitude: f32,
}

impl Location {
    /// Create a location
    pub const fn new(latitude: f32, longitude: f32) -> Self {
        Self {
            latitude,
            longitude,
        }
    }

    /// Location of a valid fix
    pub fn from_fix(fix: &Fix) -> Option<Self> {
        fix.valid.then(|| Self::new(fix.latitude, fix.longitude))
    }

    /// Both coordinates exactly zero, which receivers report before a fix
    pub fn is_null(&self) -> bool {
        self.latitude == 0.0 && self.longitude == 0.0
    }
}

/// `lat,lon` with six decimals
impl fmt::Display for Location {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{:.6},{:.6}", self.latitude, self.longitude)
    }
}

/// One raised alert
#[derive(Debug, Clone, PartialEq)]
pub struct AlertEvent {
    /// Category
    pub kind: AlertKind,
    /// Human readable detail, may be empty
    pub message: String<MESSAGE_CAPACITY>,
    /// Last known location, `None` without a fix
    pub location: Option<Location>,
    /// When the alert was raised (ms clock)
    pub timestamp_ms: u32,
}

impl AlertEvent {
    /// Create an event; the message is truncated to [`MESSAGE_CAPACITY`]
    pub fn new(kind: AlertKind, message: &str, location: Option<Location>, timestamp_ms: u32) -> Self {
        Self {
            kind,
            message: bounded_string(message),
            location,
            timestamp_ms,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::format;

    #[test]
    fn test_location_display() {
        let location = Location::new(14.5995, 120.9842);
        assert_eq!(format!("{}", location), "14.599500,120.984200");
        assert_eq!(format!("{}", Location::new(-33.8688, -151.2093)), "-33.868801,-151.209305");
    }

    #[test]
    fn test_location_from_fix() {
        let mut fix = Fix {
            latitude: 14.6,
            longitude: 120.985,
            ..Fix::default()
        };
        assert_eq!(Location::from_fix(&fix), None);

        fix.valid = true;
        assert_eq!(Location::from_fix(&fix), Some(Location::new(14.6, 120.985)));
        assert!(Location::new(0.0, 0.0).is_null());
    }

    #[test]
    fn test_alert_labels_and_codes() {
        assert_eq!(AlertKind::Geofence.label(), "GEOFENCE ALERT");
        assert_eq!(AlertKind::Geofence.code(), "GEOFENCE_BREACH");
        assert_eq!(AlertKind::Motion.code(), "MOTION_DETECTED");
        assert_eq!(AlertKind::GsmLost.label(), "GSM LOST");
    }

    #[test]
    fn test_alert_message_truncated() {
        let long = [b'm'; 100];
        let event = AlertEvent::new(
            AlertKind::Speed,
            core::str::from_utf8(&long).unwrap(),
            None,
            0,
        );
        assert_eq!(event.message.len(), MESSAGE_CAPACITY);
    }
}
