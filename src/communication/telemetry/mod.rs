//! Alert and telemetry dispatch
//!
//! # Architecture
//!
//! - **Event**: [`AlertKind`], [`AlertEvent`] and [`Location`]
//! - **Payload**: JSON body for HTTP pushes and the SMS alert text
//! - **Dispatcher**: routine and alert pushes with separate retry policies
//! - **Offline**: bounded queue of undelivered routine samples
//!
//! # Usage
//!
//! ```ignore
//! use bike_tracker::communication::telemetry::{Location, TelemetryConfig, TelemetryDispatcher};
//!
//! let mut telemetry = TelemetryDispatcher::new(TelemetryConfig::default());
//! telemetry.push_location(&mut modem, Location::new(14.5995, 120.9842));
//! ```

pub mod config;
pub mod dispatcher;
pub mod event;
pub mod offline;
pub mod payload;

pub use config::TelemetryConfig;
pub use dispatcher::{PushOutcome, TelemetryDispatcher, TelemetryStats};
pub use event::{AlertEvent, AlertKind, Location};
pub use offline::{OfflineQueue, OfflineSample};
pub use payload::{alert_sms_text, location_json, PayloadFields, NO_FIX_TEXT};
