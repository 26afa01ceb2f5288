//! Telemetry dispatcher
//!
//! Pushes location samples and alerts to the HTTP endpoint through a
//! [`ModemSession`]. The dispatcher owns no transport; the caller lends it the
//! session for each operation.
//!
//! | Push     | Policy                                   | On persistent failure         |
//! |----------|------------------------------------------|-------------------------------|
//! | routine  | `routine_retry`, bearer reopen after #1  | queue offline, reset link     |
//! | alert    | `alert_retry`                            | logged as critical            |

use super::config::TelemetryConfig;
use super::event::{AlertEvent, Location};
use super::offline::{OfflineQueue, OfflineSample};
use super::payload::{location_json, PayloadFields, PAYLOAD_CAPACITY};
use crate::devices::modem::{HttpMethod, ModemSession, RetryPolicy};
use crate::platform::traits::{TimerInterface, UartInterface};
use heapless::String;

/// Result of a push request
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum PushOutcome {
    /// Endpoint accepted the sample
    Delivered,
    /// Routine interval has not elapsed yet
    NotDue,
    /// Nothing to send (telemetry off, no usable location)
    Skipped,
    /// Every attempt failed
    Failed,
}

/// Delivery counters
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TelemetryStats {
    /// Routine samples delivered
    pub routine_sent: u32,
    /// Routine pushes that gave up
    pub routine_failed: u32,
    /// Alerts delivered
    pub alerts_sent: u32,
    /// Alerts that gave up
    pub alerts_failed: u32,
    /// Offline samples re-sent
    pub backlog_sent: u32,
}

/// HTTP telemetry dispatcher
pub struct TelemetryDispatcher {
    config: TelemetryConfig,
    last_push_ms: Option<u32>,
    last_health_check_ms: Option<u32>,
    offline: OfflineQueue,
    stats: TelemetryStats,
}

impl TelemetryDispatcher {
    /// Create a dispatcher
    pub fn new(config: TelemetryConfig) -> Self {
        Self {
            config,
            last_push_ms: None,
            last_health_check_ms: None,
            offline: OfflineQueue::new(),
            stats: TelemetryStats::default(),
        }
    }

    /// Current configuration
    pub fn config(&self) -> &TelemetryConfig {
        &self.config
    }

    /// Replace the configuration; timers and the offline queue are kept
    pub fn set_config(&mut self, config: TelemetryConfig) {
        self.config = config;
    }

    /// Turn pushes on or off
    pub fn set_enabled(&mut self, enabled: bool) {
        if self.config.enabled != enabled {
            crate::log_info!("Telemetry: {}", if enabled { "Enabled" } else { "Disabled" });
        }
        self.config.enabled = enabled;
    }

    /// Enabled with a complete endpoint configuration
    pub fn is_enabled(&self) -> bool {
        self.config.is_usable()
    }

    /// Delivery counters
    pub fn stats(&self) -> &TelemetryStats {
        &self.stats
    }

    /// Undelivered routine samples
    pub fn offline_queue(&self) -> &OfflineQueue {
        &self.offline
    }

    /// Routine push interval has elapsed (or nothing was pushed yet)
    pub fn routine_due(&self, now_ms: u32) -> bool {
        match self.last_push_ms {
            None => true,
            Some(last) => now_ms.wrapping_sub(last) >= self.config.update_interval_ms,
        }
    }

    /// Push a routine location sample if the interval has elapsed
    ///
    /// The interval restarts when an attempt is made, whatever its result.
    /// A failed sample goes to the offline queue (when batching is on) and,
    /// with `auto_reconnect`, triggers a full connection reset.
    pub fn push_location<U: UartInterface, T: TimerInterface>(
        &mut self,
        modem: &mut ModemSession<U, T>,
        location: Location,
    ) -> PushOutcome {
        if !self.is_enabled() {
            return PushOutcome::Skipped;
        }
        let now = modem.now_ms();
        if !self.routine_due(now) {
            return PushOutcome::NotDue;
        }
        if location.is_null() {
            crate::log_debug!("Telemetry: Null coordinates, push skipped");
            return PushOutcome::Skipped;
        }
        let sample = OfflineSample {
            location,
            timestamp_ms: now,
        };

        if self.config.monitor_connection {
            if let Err(e) = modem.maintain_connection() {
                crate::log_warn!("Telemetry: Connection not available: {:?}", e);
                self.park(sample);
                return PushOutcome::Failed;
            }
        }
        self.last_push_ms = Some(now);

        let policy = self.config.routine_retry;
        let reconnect = self.config.reconnect_on_failure;
        if self.post_sample(modem, &sample, "", policy, reconnect) {
            self.stats.routine_sent = self.stats.routine_sent.saturating_add(1);
            crate::log_info!("Telemetry: Location delivered");
            self.flush_offline(modem);
            return PushOutcome::Delivered;
        }

        self.stats.routine_failed = self.stats.routine_failed.saturating_add(1);
        crate::log_warn!("Telemetry: All {} location attempts failed", policy.attempts);
        self.park(sample);
        if self.config.auto_reconnect {
            if let Err(e) = modem.reset_connection() {
                crate::log_warn!("Telemetry: Connection reset failed: {:?}", e);
            }
        }
        PushOutcome::Failed
    }

    /// Push a routine sample now, ignoring the interval
    pub fn push_location_now<U: UartInterface, T: TimerInterface>(
        &mut self,
        modem: &mut ModemSession<U, T>,
        location: Location,
    ) -> PushOutcome {
        self.last_push_ms = None;
        self.push_location(modem, location)
    }

    /// Push an alert
    ///
    /// Alerts bypass the routine interval. Without a location there is no
    /// meaningful payload and the push is skipped.
    pub fn push_alert<U: UartInterface, T: TimerInterface>(
        &mut self,
        modem: &mut ModemSession<U, T>,
        event: &AlertEvent,
    ) -> PushOutcome {
        if !self.is_enabled() {
            return PushOutcome::Skipped;
        }
        let Some(location) = event.location else {
            crate::log_warn!("Telemetry: Alert {} without location, not pushed", event.kind.code());
            return PushOutcome::Skipped;
        };

        if let Err(e) = modem.maintain_connection() {
            crate::log_error!("Telemetry: CRITICAL alert {} not sent, no connection: {:?}", event.kind.code(), e);
            self.stats.alerts_failed = self.stats.alerts_failed.saturating_add(1);
            return PushOutcome::Failed;
        }

        let sample = OfflineSample {
            location,
            timestamp_ms: event.timestamp_ms,
        };
        let policy = self.config.alert_retry;
        if self.post_sample(modem, &sample, event.kind.code(), policy, false) {
            self.stats.alerts_sent = self.stats.alerts_sent.saturating_add(1);
            crate::log_info!("Telemetry: Alert {} delivered", event.kind.code());
            PushOutcome::Delivered
        } else {
            self.stats.alerts_failed = self.stats.alerts_failed.saturating_add(1);
            crate::log_error!("Telemetry: CRITICAL alert {} failed after {} attempts", event.kind.code(), policy.attempts);
            PushOutcome::Failed
        }
    }

    /// Periodic connection health check
    ///
    /// Reopens a dropped bearer and resets the link after
    /// `idle_reset_ms` without data activity. Runs at most once per
    /// `connection_check_interval_ms`.
    pub fn monitor_connection<U: UartInterface, T: TimerInterface>(
        &mut self,
        modem: &mut ModemSession<U, T>,
    ) {
        if !self.is_enabled() || !self.config.monitor_connection {
            return;
        }
        let now = modem.now_ms();
        if let Some(last) = self.last_health_check_ms {
            if now.wrapping_sub(last) < self.config.connection_check_interval_ms {
                return;
            }
        }
        self.last_health_check_ms = Some(now);

        match modem.is_gprs_connected() {
            Ok(true) => {}
            Ok(false) => {
                crate::log_warn!("Telemetry: GPRS down, reconnecting");
                match modem.reconnect_gprs() {
                    Ok(()) => crate::log_info!("Telemetry: GPRS reconnected"),
                    Err(e) => crate::log_warn!("Telemetry: GPRS reconnect failed: {:?}", e),
                }
            }
            Err(e) => crate::log_warn!("Telemetry: Bearer check failed: {:?}", e),
        }

        let idle = modem.now_ms().wrapping_sub(modem.last_activity_ms());
        if idle > self.config.idle_reset_ms {
            crate::log_warn!("Telemetry: Link idle for {} ms, resetting", idle);
            if let Err(e) = modem.reset_connection() {
                crate::log_warn!("Telemetry: Connection reset failed: {:?}", e);
            }
        }
    }

    fn park(&mut self, sample: OfflineSample) {
        if self.config.offline_batching {
            self.offline.push(sample);
        }
    }

    /// Re-send queued samples, one attempt each, stopping at the first failure
    fn flush_offline<U: UartInterface, T: TimerInterface>(&mut self, modem: &mut ModemSession<U, T>) {
        let single = RetryPolicy::new(1, self.config.routine_retry.backoff);
        while let Some(sample) = self.offline.pop() {
            if !self.post_sample(modem, &sample, "", single, false) {
                self.offline.requeue(sample);
                crate::log_debug!("Telemetry: Backlog flush stopped, {} left", self.offline.len());
                return;
            }
            self.stats.backlog_sent = self.stats.backlog_sent.saturating_add(1);
        }
    }

    fn post_sample<U: UartInterface, T: TimerInterface>(
        &self,
        modem: &mut ModemSession<U, T>,
        sample: &OfflineSample,
        alert_type: &str,
        policy: RetryPolicy,
        reconnect_after_first: bool,
    ) -> bool {
        let signal = modem.signal_strength();
        let local_ip = modem.local_ip();
        let imei = modem.imei();

        let body: String<PAYLOAD_CAPACITY> = match location_json(&PayloadFields {
            device_id: &self.config.device_id,
            location: sample.location,
            timestamp_ms: sample.timestamp_ms,
            alert_type,
            signal,
            local_ip: &local_ip,
            imei: &imei,
        }) {
            Ok(body) => body,
            Err(_) => {
                crate::log_error!("Telemetry: Payload exceeds buffer");
                return false;
            }
        };

        for attempt in policy.attempts() {
            match modem.perform_http_request(HttpMethod::Post, &self.config.url, Some(body.as_str())) {
                Ok(response) => {
                    crate::log_debug!("Telemetry: HTTP {} on attempt {}", response.status, attempt);
                    return true;
                }
                Err(e) => crate::log_warn!("Telemetry: Attempt {} failed: {:?}", attempt, e),
            }

            if policy.is_last(attempt) {
                break;
            }
            if reconnect_after_first && attempt == 1 {
                if let Err(e) = modem.reconnect_gprs() {
                    crate::log_warn!("Telemetry: Bearer reopen failed: {:?}", e);
                }
            }
            modem.delay_ms(policy.delay_after(attempt));
        }
        false
    }
}
