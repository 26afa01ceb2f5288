//! Telemetry and Network Parameter Definitions
//!
//! # Parameters
//!
//! - `TLM_ENABLE` - HTTP telemetry on/off (on when an endpoint was provisioned)
//! - `TLM_URL` - Endpoint URL
//! - `TLM_DEVICE_ID` - Device identifier (**read-only**)
//! - `TLM_INTERVAL` - Routine push interval (ms)
//! - `TLM_RETRIES` / `TLM_RETRY_MS` - Routine attempts and linear back-off step
//! - `TLM_ALERT_RETRY` / `TLM_ALERT_MS` - Alert attempts and fixed back-off
//! - `TLM_BATCH` - Keep undelivered samples for re-send
//! - `NET_APN` / `NET_USER` - Bearer APN and username
//! - `NET_PASS` - Bearer password (**hidden**)
//! - `NET_MONITOR` - Periodic bearer check and idle reset
//! - `NET_RECONNECT` - Reset the link after a failed routine push
//! - `NET_CHECK_MS` - Bearer check interval (ms)
//! - `NET_IDLE_MS` - Idle time before a link reset (ms)
//!
//! Build-time provisioning comes from `TRACKER_API_URL`, `TRACKER_DEVICE_ID`,
//! `TRACKER_APN`, `TRACKER_APN_USER` and `TRACKER_APN_PASSWORD`.

use super::error::ParameterError;
use super::storage::{bounded_string, ParamFlags, ParamValue, ParameterStore};
use crate::communication::telemetry::config::policy;
use crate::communication::telemetry::TelemetryConfig;
use crate::devices::modem::{ApnCredentials, Backoff, RetryPolicy};

/// Telemetry parameter group
pub struct TelemetryParams;

fn backoff_step(policy: &RetryPolicy) -> i32 {
    match policy.backoff {
        Backoff::Fixed(ms) | Backoff::Linear(ms) => ms as i32,
    }
}

impl TelemetryParams {
    /// Register telemetry and network parameters with default values
    pub fn register_defaults(store: &mut ParameterStore) -> Result<(), ParameterError> {
        let defaults = TelemetryConfig::default();
        let url = env!("TRACKER_API_URL");

        store.register("TLM_ENABLE", ParamValue::Bool(!url.is_empty()), ParamFlags::empty())?;
        store.register_str("TLM_URL", url, ParamFlags::empty())?;
        store.register_str("TLM_DEVICE_ID", env!("TRACKER_DEVICE_ID"), ParamFlags::READ_ONLY)?;
        store.register(
            "TLM_INTERVAL",
            ParamValue::Int(defaults.update_interval_ms as i32),
            ParamFlags::empty(),
        )?;

        // Routine: linear back-off, bearer reopened after the first failure
        store.register(
            "TLM_RETRIES",
            ParamValue::Int(defaults.routine_retry.attempts as i32),
            ParamFlags::empty(),
        )?;
        store.register(
            "TLM_RETRY_MS",
            ParamValue::Int(backoff_step(&defaults.routine_retry)),
            ParamFlags::empty(),
        )?;

        // Alerts: more attempts, fixed back-off
        store.register(
            "TLM_ALERT_RETRY",
            ParamValue::Int(defaults.alert_retry.attempts as i32),
            ParamFlags::empty(),
        )?;
        store.register(
            "TLM_ALERT_MS",
            ParamValue::Int(backoff_step(&defaults.alert_retry)),
            ParamFlags::empty(),
        )?;
        store.register(
            "TLM_BATCH",
            ParamValue::Bool(defaults.offline_batching),
            ParamFlags::empty(),
        )?;

        store.register_str("NET_APN", env!("TRACKER_APN"), ParamFlags::empty())?;
        store.register_str("NET_USER", env!("TRACKER_APN_USER"), ParamFlags::empty())?;
        store.register_str("NET_PASS", env!("TRACKER_APN_PASSWORD"), ParamFlags::HIDDEN)?;
        store.register(
            "NET_MONITOR",
            ParamValue::Bool(defaults.monitor_connection),
            ParamFlags::empty(),
        )?;
        store.register(
            "NET_RECONNECT",
            ParamValue::Bool(defaults.auto_reconnect),
            ParamFlags::empty(),
        )?;
        store.register(
            "NET_CHECK_MS",
            ParamValue::Int(defaults.connection_check_interval_ms as i32),
            ParamFlags::empty(),
        )?;
        store.register(
            "NET_IDLE_MS",
            ParamValue::Int(defaults.idle_reset_ms as i32),
            ParamFlags::empty(),
        )?;

        Ok(())
    }

    /// Build the telemetry configuration from the store
    pub fn from_store(store: &ParameterStore) -> TelemetryConfig {
        let defaults = TelemetryConfig::default();
        let int = |name: &str, fallback: i32| store.get_int(name).unwrap_or(fallback);
        let millis = |name: &str, fallback: u32| match store.get_int(name) {
            Some(v) if v >= 0 => v as u32,
            _ => fallback,
        };
        let flag = |name: &str, fallback: bool| store.get_bool(name).unwrap_or(fallback);

        let apn = ApnCredentials::new(
            store.get_str("NET_APN").unwrap_or(defaults.apn.apn.as_str()),
            store.get_str("NET_USER").unwrap_or(""),
            store.get_str("NET_PASS").unwrap_or(""),
        );

        TelemetryConfig {
            enabled: flag("TLM_ENABLE", false),
            url: bounded_string(store.get_str("TLM_URL").unwrap_or("")),
            device_id: bounded_string(
                store
                    .get_str("TLM_DEVICE_ID")
                    .unwrap_or(defaults.device_id.as_str()),
            ),
            apn,
            update_interval_ms: millis("TLM_INTERVAL", defaults.update_interval_ms),
            routine_retry: policy(
                int("TLM_RETRIES", defaults.routine_retry.attempts as i32),
                int("TLM_RETRY_MS", backoff_step(&defaults.routine_retry)),
                true,
            ),
            reconnect_on_failure: defaults.reconnect_on_failure,
            alert_retry: policy(
                int("TLM_ALERT_RETRY", defaults.alert_retry.attempts as i32),
                int("TLM_ALERT_MS", backoff_step(&defaults.alert_retry)),
                false,
            ),
            monitor_connection: flag("NET_MONITOR", defaults.monitor_connection),
            auto_reconnect: flag("NET_RECONNECT", defaults.auto_reconnect),
            connection_check_interval_ms: millis("NET_CHECK_MS", defaults.connection_check_interval_ms),
            idle_reset_ms: millis("NET_IDLE_MS", defaults.idle_reset_ms),
            offline_batching: flag("TLM_BATCH", defaults.offline_batching),
        }
    }
}
