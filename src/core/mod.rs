//! Core infrastructure
//!
//! Logging macros and the parameter store shared by the drivers and the
//! tracker.

pub mod logging;
pub mod parameters;
