//! Platform abstraction traits
//!
//! This module defines the traits that platform implementations must provide.

pub mod indicator;
pub mod timer;
pub mod uart;

// Re-export trait interfaces
pub use indicator::{Cue, Indicator, NoopIndicator};
pub use timer::TimerInterface;
pub use uart::{UartConfig, UartInterface, UartParity, UartStopBits};
