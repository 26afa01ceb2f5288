//! Communication
//!
//! Formatting and delivery of what the tracker reports to the outside world.
//!
//! # Channels
//!
//! - **HTTP telemetry**: JSON location pushes and alerts over the GPRS bearer
//! - **SMS alerts**: text formatting; delivery goes through the modem session

pub mod telemetry;
