//! Device drivers
//!
//! Drivers are generic over the platform traits, so the same code runs on
//! hardware and against the host mocks.
//!
//! ## Modules
//!
//! - `gps`: NMEA GPS receiver driver
//! - `modem`: SIM800-class GSM/GPRS modem session

pub mod gps;
pub mod modem;
