//! Telemetry configuration

use crate::core::parameters::bounded_string;
use crate::devices::modem::{ApnCredentials, Backoff, RetryPolicy};
use heapless::String;

/// Endpoint URL capacity
pub const URL_CAPACITY: usize = 127;

/// Device identifier capacity
pub const DEVICE_ID_CAPACITY: usize = 32;

/// HTTP telemetry settings
#[derive(Debug, Clone, PartialEq)]
pub struct TelemetryConfig {
    /// Requested on; see [`is_usable`](Self::is_usable)
    pub enabled: bool,
    /// Endpoint receiving the JSON POSTs
    pub url: String<URL_CAPACITY>,
    /// Identifier sent as `deviceId`
    pub device_id: String<DEVICE_ID_CAPACITY>,
    /// Bearer credentials
    pub apn: ApnCredentials,
    /// Minimum gap between routine pushes
    pub update_interval_ms: u32,
    /// Routine push retries
    pub routine_retry: RetryPolicy,
    /// Reopen the bearer after the first failed routine attempt
    pub reconnect_on_failure: bool,
    /// Alert push retries
    pub alert_retry: RetryPolicy,
    /// Periodic bearer check and idle reset
    pub monitor_connection: bool,
    /// Full connection reset after a routine push gave up
    pub auto_reconnect: bool,
    /// Gap between bearer checks
    pub connection_check_interval_ms: u32,
    /// Reset the connection after this long without data activity
    pub idle_reset_ms: u32,
    /// Keep undelivered routine samples for a later re-send
    pub offline_batching: bool,
}

impl TelemetryConfig {
    /// Configuration for an endpoint, with default intervals and policies
    pub fn new(url: &str, device_id: &str, apn: ApnCredentials) -> Self {
        Self {
            enabled: !url.is_empty(),
            url: bounded_string(url),
            device_id: bounded_string(device_id),
            apn,
            ..Self::default()
        }
    }

    /// Enabled and with an endpoint, a device id and an APN
    pub fn is_usable(&self) -> bool {
        self.enabled && !self.url.is_empty() && !self.device_id.is_empty() && !self.apn.apn.is_empty()
    }
}

impl Default for TelemetryConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            url: String::new(),
            device_id: bounded_string("BIKE_TRACKER_001"),
            apn: ApnCredentials::new("internet", "", ""),
            update_interval_ms: 30_000,
            routine_retry: RetryPolicy::routine(),
            reconnect_on_failure: true,
            alert_retry: RetryPolicy::alert(),
            monitor_connection: true,
            auto_reconnect: true,
            connection_check_interval_ms: 60_000,
            idle_reset_ms: 300_000,
            offline_batching: true,
        }
    }
}

/// Build a retry policy from parameter values
pub(crate) fn policy(attempts: i32, delay_ms: i32, linear: bool) -> RetryPolicy {
    let attempts = attempts.clamp(1, u8::MAX as i32) as u8;
    let delay = delay_ms.max(0) as u32;
    let backoff = if linear {
        Backoff::Linear(delay)
    } else {
        Backoff::Fixed(delay)
    };
    RetryPolicy::new(attempts, backoff)
}
