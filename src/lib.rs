#![cfg_attr(not(any(test, feature = "mock")), no_std)]

//! bike_tracker - Vehicle security tracker core
//!
//! This library provides the protocol and state-machine core of a GPS/GSM
//! vehicle tracker: a streaming NMEA parser, a SIM800-class modem driver that
//! speaks AT commands over a serial link, an alert/telemetry dispatcher, and the
//! tracker orchestrator that evaluates motion, speed and geofence rules.
//!
//! Everything runs in a single cooperative polling loop. Blocking waits go
//! through [`platform::traits::TimerInterface`], so the host mocks can advance
//! time without sleeping.

// Platform abstraction layer (UART, timer, indicator)
pub mod platform;

// Logging macros and parameter store
pub mod core;

// Device drivers: GPS receiver and cellular modem
pub mod devices;

// HTTP telemetry and SMS alert formatting
pub mod communication;

// Navigation math and the tracker orchestrator
pub mod subsystems;

// Note: Logging macros (log_info!, log_warn!, log_error!, log_debug!, log_trace!)
// are exported at crate root via #[macro_export] in core::logging
