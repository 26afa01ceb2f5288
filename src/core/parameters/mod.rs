//! Parameter management
//!
//! Named configuration values held in a RAM [`ParameterStore`]. Each group
//! registers its defaults (build-time provisioning from `build.rs` included)
//! and builds its typed configuration from the store.
//!
//! | Group       | Prefixes                 | Builds              |
//! |-------------|--------------------------|---------------------|
//! | `tracker`   | `TRK_`, `FENCE_`         | `TrackerConfig`     |
//! | `telemetry` | `TLM_`, `NET_`           | `TelemetryConfig`   |

pub mod error;
pub mod storage;
pub mod telemetry;
pub mod tracker;

// Re-export commonly used types
pub use error::ParameterError;
pub use storage::{
    bounded_string, ParamFlags, ParamMetadata, ParamValue, ParameterStore, MAX_PARAMS,
    MAX_STRING_LEN, PARAM_NAME_LEN,
};
pub use telemetry::TelemetryParams;
pub use tracker::TrackerParams;

use crate::subsystems::tracker::OperatingMode;

/// Register every group's defaults
pub fn register_all(store: &mut ParameterStore, mode: OperatingMode) -> Result<(), ParameterError> {
    TrackerParams::register_defaults(store, mode)?;
    TelemetryParams::register_defaults(store)?;
    Ok(())
}
