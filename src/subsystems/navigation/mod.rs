//! Navigation subsystem
//!
//! Geographic calculations shared by the motion and geofence rules.

mod geo;

// Re-export public API
pub use geo::{haversine_distance, EARTH_RADIUS_M};
