//! Geographic calculations
//!
//! Pure functions over WGS-84 degrees. Single precision is enough here: the
//! receiver reports coordinates to roughly a metre, and every threshold the
//! tracker compares against is several metres or more.

use libm::{atan2f, cosf, sinf, sqrtf};

/// Mean Earth radius used by the haversine formula
pub const EARTH_RADIUS_M: f32 = 6_371_000.0;

const DEG_TO_RAD: f32 = core::f32::consts::PI / 180.0;

/// Great-circle distance between two positions using the Haversine formula
///
/// # Arguments
///
/// * `lat1`, `lon1` - Start position in degrees
/// * `lat2`, `lon2` - End position in degrees
///
/// # Returns
///
/// Distance in meters
pub fn haversine_distance(lat1: f32, lon1: f32, lat2: f32, lon2: f32) -> f32 {
    let lat1_rad = lat1 * DEG_TO_RAD;
    let lat2_rad = lat2 * DEG_TO_RAD;
    let delta_lat = (lat2 - lat1) * DEG_TO_RAD;
    let delta_lon = (lon2 - lon1) * DEG_TO_RAD;

    let sin_dlat = sinf(delta_lat / 2.0);
    let sin_dlon = sinf(delta_lon / 2.0);
    let a = sin_dlat * sin_dlat + cosf(lat1_rad) * cosf(lat2_rad) * sin_dlon * sin_dlon;
    let c = 2.0 * atan2f(sqrtf(a), sqrtf(1.0 - a));

    EARTH_RADIUS_M * c
}
