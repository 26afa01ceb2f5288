//! Tracker state and status snapshot

use crate::communication::telemetry::Location;

/// Tracker lifecycle state
///
/// ```text
/// Initializing --> Standby <--> Tracking
///                     \          /
///                      +-> Alert +   (settles back after each alert)
/// any --(modem handshake lost)--> Error --(initialize)--> ...
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackerState {
    /// Startup sequence running
    Initializing,
    /// Idle, waiting for motion while armed
    Standby,
    /// Armed and moving
    Tracking,
    /// Alert being delivered
    Alert,
    /// Modem unusable; only `initialize` leaves this state
    Error,
}

impl TrackerState {
    /// Name used in status messages
    pub fn name(&self) -> &'static str {
        match self {
            TrackerState::Initializing => "Initializing",
            TrackerState::Standby => "Standby",
            TrackerState::Tracking => "Tracking",
            TrackerState::Alert => "Alert",
            TrackerState::Error => "Error",
        }
    }
}

/// Status snapshot
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct TrackerStatus {
    /// Lifecycle state
    pub state: TrackerState,
    /// Rules are evaluated
    pub armed: bool,
    /// Last GPS poll reported a valid fix
    pub gps_fixed: bool,
    /// Modem registered on a network
    pub gsm_connected: bool,
    /// Last valid position, kept after the fix is lost
    pub last_location: Option<Location>,
    /// Speed of the last valid fix
    pub last_speed_kmh: f32,
    /// Time since boot
    pub uptime_ms: u32,
    /// Alerts raised since boot or the last `clear_alerts`
    pub alert_count: u32,
    /// Update cycle paused
    pub suspended: bool,
}

impl Default for TrackerStatus {
    fn default() -> Self {
        Self {
            state: TrackerState::Initializing,
            armed: false,
            gps_fixed: false,
            gsm_connected: false,
            last_location: None,
            last_speed_kmh: 0.0,
            uptime_ms: 0,
            alert_count: 0,
            suspended: false,
        }
    }
}
