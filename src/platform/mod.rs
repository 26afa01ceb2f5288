//! Platform abstraction layer
//!
//! Serial transports, the millisecond clock and the alert indicator are the
//! only hardware the tracker core touches. Board bring-up lives outside this
//! crate; it hands in implementations of these traits.

pub mod error;
pub mod traits;

#[cfg(any(test, feature = "mock"))]
pub mod mock;

// Re-export commonly used types
pub use error::{PlatformError, Result, UartError};
pub use traits::{Cue, Indicator, TimerInterface, UartInterface};
