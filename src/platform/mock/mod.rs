//! Mock platform implementation for testing
//!
//! This module provides mock implementations of platform traits that can be used
//! for unit testing without requiring actual hardware.
//!
//! # Feature Gate
//!
//! This module is available in two contexts:
//! - During test builds (`#[cfg(test)]`)
//! - When the `mock` feature is enabled
//!
//! Every mock is a cheap handle around shared state, so a test can hand one
//! clone to the code under test and keep another for inspection.
//!
//! # Example
//!
//! ```ignore
//! use bike_tracker::platform::mock::{MockModem, MockTimer};
//! use bike_tracker::platform::traits::TimerInterface;
//!
//! let timer = MockTimer::new();
//! let mut handle = timer.clone();
//! handle.delay_ms(250);
//! assert_eq!(timer.now_ms(), 250);
//!
//! let modem = MockModem::new();
//! modem.respond("AT+CSQ", "\r\n+CSQ: 17,0\r\n\r\nOK\r\n");
//! ```

#![cfg(any(test, feature = "mock"))]

mod indicator;
mod modem;
mod timer;
mod uart;

pub use indicator::RecordingIndicator;
pub use modem::MockModem;
pub use timer::MockTimer;
pub use uart::MockUart;
