//! Tracker Parameter Definitions
//!
//! # Parameters
//!
//! - `TRK_MODE` - Operating mode (0 = testing, 1 = production)
//! - `TRK_GPS_INT` - GPS poll interval (ms)
//! - `TRK_ALERT_INT` - Minimum gap between alerts (ms)
//! - `TRK_MOTION_M` - Displacement counted as motion (m)
//! - `TRK_SPEED_KMH` - Speed limit (km/h)
//! - `TRK_GSM_INT` - Registration check interval (ms)
//! - `TRK_GPS_LOSS` - Fix loss before a GPS-lost alert (ms)
//! - `TRK_GSM_LOSS` - Network loss before a GSM-lost alert (ms)
//! - `TRK_CONTACT` - Emergency SMS recipient (**hidden**)
//! - `FENCE_ENABLE` - Geofence rule on/off
//! - `FENCE_LAT` / `FENCE_LON` - Geofence center (degrees)
//! - `FENCE_RADIUS` - Geofence radius (m)

use super::error::ParameterError;
use super::storage::{ParamFlags, ParamValue, ParameterStore};
use crate::subsystems::tracker::{Geofence, OperatingMode, TrackerConfig};

/// Default geofence radius in meters
const DEFAULT_FENCE_RADIUS_M: f32 = 100.0;

/// Tracker parameter group
pub struct TrackerParams;

impl TrackerParams {
    /// Register tracker parameters with the defaults for `mode`
    pub fn register_defaults(store: &mut ParameterStore, mode: OperatingMode) -> Result<(), ParameterError> {
        let defaults = TrackerConfig::new(mode);

        store.register("TRK_MODE", ParamValue::Int(mode as i32), ParamFlags::empty())?;
        store.register(
            "TRK_GPS_INT",
            ParamValue::Int(defaults.gps_update_interval_ms as i32),
            ParamFlags::empty(),
        )?;
        store.register(
            "TRK_ALERT_INT",
            ParamValue::Int(defaults.alert_interval_ms as i32),
            ParamFlags::empty(),
        )?;
        store.register(
            "TRK_MOTION_M",
            ParamValue::Float(defaults.motion_threshold_m),
            ParamFlags::empty(),
        )?;
        store.register(
            "TRK_SPEED_KMH",
            ParamValue::Float(defaults.speed_limit_kmh),
            ParamFlags::empty(),
        )?;
        store.register(
            "TRK_GSM_INT",
            ParamValue::Int(defaults.gsm_check_interval_ms as i32),
            ParamFlags::empty(),
        )?;
        store.register(
            "TRK_GPS_LOSS",
            ParamValue::Int(defaults.gps_loss_timeout_ms as i32),
            ParamFlags::empty(),
        )?;
        store.register(
            "TRK_GSM_LOSS",
            ParamValue::Int(defaults.gsm_loss_timeout_ms as i32),
            ParamFlags::empty(),
        )?;

        // Provisioned at build time, never listed
        store.register_str("TRK_CONTACT", env!("TRACKER_CONTACT"), ParamFlags::HIDDEN)?;

        // Geofence off until a center is set
        store.register("FENCE_ENABLE", ParamValue::Bool(false), ParamFlags::empty())?;
        store.register("FENCE_LAT", ParamValue::Float(0.0), ParamFlags::empty())?;
        store.register("FENCE_LON", ParamValue::Float(0.0), ParamFlags::empty())?;
        store.register(
            "FENCE_RADIUS",
            ParamValue::Float(DEFAULT_FENCE_RADIUS_M),
            ParamFlags::empty(),
        )?;

        Ok(())
    }

    /// Build the tracker configuration from the store
    ///
    /// Missing or negative values fall back to the mode defaults.
    pub fn from_store(store: &ParameterStore) -> TrackerConfig {
        let mode = store
            .get_int("TRK_MODE")
            .map(OperatingMode::from_param)
            .unwrap_or(OperatingMode::Production);
        let defaults = TrackerConfig::new(mode);

        let millis = |name: &str, fallback: u32| match store.get_int(name) {
            Some(v) if v >= 0 => v as u32,
            _ => fallback,
        };
        let positive = |name: &str, fallback: f32| match store.get_float(name) {
            Some(v) if v > 0.0 => v,
            _ => fallback,
        };

        let geofence = if store.get_bool("FENCE_ENABLE").unwrap_or(false) {
            Some(Geofence {
                center_lat: store.get_float("FENCE_LAT").unwrap_or(0.0),
                center_lon: store.get_float("FENCE_LON").unwrap_or(0.0),
                radius_m: positive("FENCE_RADIUS", DEFAULT_FENCE_RADIUS_M),
            })
        } else {
            None
        };

        TrackerConfig {
            gps_update_interval_ms: millis("TRK_GPS_INT", defaults.gps_update_interval_ms),
            alert_interval_ms: millis("TRK_ALERT_INT", defaults.alert_interval_ms),
            motion_threshold_m: positive("TRK_MOTION_M", defaults.motion_threshold_m),
            speed_limit_kmh: positive("TRK_SPEED_KMH", defaults.speed_limit_kmh),
            gsm_check_interval_ms: millis("TRK_GSM_INT", defaults.gsm_check_interval_ms),
            gps_loss_timeout_ms: millis("TRK_GPS_LOSS", defaults.gps_loss_timeout_ms),
            gsm_loss_timeout_ms: millis("TRK_GSM_LOSS", defaults.gsm_loss_timeout_ms),
            geofence,
            ..defaults
        }
        .with_contact(store.get_str("TRK_CONTACT").unwrap_or(""))
    }
}
