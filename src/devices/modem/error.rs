//! Modem error types

use crate::platform::PlatformError;
use core::fmt;

/// Result type for modem operations
pub type Result<T> = core::result::Result<T, ModemError>;

/// What was wrong with a response the modem did produce
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ProtocolFault {
    /// Modem answered with `ERROR` / `+CME ERROR`
    ErrorToken,
    /// HTTP request completed with a non-2xx status
    HttpStatus(u16),
    /// Response arrived but could not be interpreted
    UnexpectedResponse,
}

/// Modem session errors
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ModemError {
    /// No expected response before the deadline
    TransportTimeout,
    /// Explicit error token, bad HTTP status or unparseable response
    Protocol(ProtocolFault),
    /// Network registration not confirmed within the timeout
    RegistrationFailure,
    /// GPRS bearer could not be opened
    BearerFailure,
    /// Operation not allowed in the current connection state
    NotReady,
    /// Reconnect requested before any APN credentials were stored
    NoCredentials,
    /// Command does not fit the transmit buffer
    CommandTooLong,
    /// UART fault
    Transport(PlatformError),
}

impl From<PlatformError> for ModemError {
    fn from(err: PlatformError) -> Self {
        ModemError::Transport(err)
    }
}

impl fmt::Display for ProtocolFault {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ProtocolFault::ErrorToken => write!(f, "modem returned ERROR"),
            ProtocolFault::HttpStatus(code) => write!(f, "HTTP status {}", code),
            ProtocolFault::UnexpectedResponse => write!(f, "unexpected response"),
        }
    }
}

impl fmt::Display for ModemError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ModemError::TransportTimeout => write!(f, "modem response timeout"),
            ModemError::Protocol(fault) => write!(f, "protocol error: {}", fault),
            ModemError::RegistrationFailure => write!(f, "network registration failed"),
            ModemError::BearerFailure => write!(f, "GPRS bearer failed to open"),
            ModemError::NotReady => write!(f, "modem not ready"),
            ModemError::NoCredentials => write!(f, "no APN credentials stored"),
            ModemError::CommandTooLong => write!(f, "AT command too long"),
            ModemError::Transport(err) => write!(f, "transport error: {}", err),
        }
    }
}
