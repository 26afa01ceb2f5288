//! Tracker error types

use crate::devices::modem::ModemError;
use core::fmt;

/// Tracker errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum TrackerError {
    /// Modem operation failed
    Modem(ModemError),
    /// No emergency contact configured
    NoContact,
}

impl From<ModemError> for TrackerError {
    fn from(err: ModemError) -> Self {
        TrackerError::Modem(err)
    }
}

impl fmt::Display for TrackerError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            TrackerError::Modem(err) => write!(f, "modem: {}", err),
            TrackerError::NoContact => write!(f, "no emergency contact configured"),
        }
    }
}

/// Result type for tracker operations
pub type Result<T> = core::result::Result<T, TrackerError>;
