//! Tracker orchestrator
//!
//! [`TrackerCore`] owns the GPS driver, the modem session, the telemetry
//! dispatcher and the indicator, and runs one cooperative cycle per
//! [`TrackerCore::update`]:
//!
//! ```text
//! uptime -> GPS refresh -> GSM check -> link monitor
//!        -> armed rules (motion, speed, geofence) -> loss monitors
//!        -> routine telemetry push
//! ```
//!
//! GPS polls and GSM checks are rate-limited by their configured intervals.
//! Every alert goes through a single global rate limiter: a rate-limited alert
//! has no side effects at all.
//!
//! ## Usage
//!
//! ```ignore
//! use bike_tracker::subsystems::tracker::{TrackerConfig, TrackerCore, OperatingMode};
//!
//! let config = TrackerConfig::new(OperatingMode::Production).with_contact("+639171234567");
//! let mut tracker = TrackerCore::new(gps, modem, indicator, config);
//! tracker.initialize()?;
//! tracker.arm();
//! loop {
//!     tracker.update();
//!     timer.delay_ms(100);
//! }
//! ```

mod config;
mod error;
mod rules;
mod state;

pub use config::{Geofence, OperatingMode, TrackerConfig};
pub use error::{Result, TrackerError};
pub use rules::{interval_elapsed, AlertLimiter, FenceCrossing, GeofenceMonitor, LossMonitor, MotionDetector};
pub use state::{TrackerState, TrackerStatus};

use crate::communication::telemetry::{
    alert_sms_text, AlertEvent, AlertKind, Location, PushOutcome, TelemetryConfig,
    TelemetryDispatcher, NO_FIX_TEXT,
};
use crate::core::parameters::bounded_string;
use crate::devices::gps::GpsDriver;
use crate::devices::modem::{ConnectionState, ModemError, ModemSession, SMS_TEXT_CAPACITY};
use crate::platform::traits::{Cue, Indicator, NoopIndicator, TimerInterface, UartInterface};
use core::fmt::Write;
use heapless::String;

/// Gap between GPS polls while waiting for the first fix
const FIX_WAIT_POLL_MS: u32 = 1_000;

/// Message attached to simulated alerts
const TEST_ALERT_MESSAGE: &str = "Test alert - ignore";

/// Result of an alert request
#[derive(Debug, Clone, PartialEq)]
pub enum AlertOutcome {
    /// Alert recorded and delivery attempted
    Raised(AlertEvent),
    /// Suppressed by the global rate limit; nothing was sent or counted
    RateLimited,
}

/// Snapshot collected by [`TrackerCore::run_diagnostics`]
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DiagnosticsReport {
    /// Valid GPS fix
    pub gps_fixed: bool,
    /// Satellites in the last fix
    pub satellites: u8,
    /// Current position
    pub location: Option<Location>,
    /// Registration confirmed by a fresh query
    pub gsm_connected: bool,
    /// Signal quality (CSQ rssi)
    pub signal: Option<u8>,
    /// Bearer believed open
    pub gprs_connected: bool,
}

/// Vehicle tracker
pub struct TrackerCore<G, M, T, I = NoopIndicator>
where
    G: UartInterface,
    M: UartInterface,
    T: TimerInterface,
    I: Indicator,
{
    gps: GpsDriver<G>,
    modem: ModemSession<M, T>,
    indicator: I,
    config: TrackerConfig,
    telemetry: TelemetryDispatcher,
    status: TrackerStatus,
    motion: MotionDetector,
    geofence: GeofenceMonitor,
    gps_loss: LossMonitor,
    gsm_loss: LossMonitor,
    limiter: AlertLimiter,
    last_gps_poll_ms: Option<u32>,
    last_gsm_check_ms: Option<u32>,
}

impl<G, M, T, I> TrackerCore<G, M, T, I>
where
    G: UartInterface,
    M: UartInterface,
    T: TimerInterface,
    I: Indicator,
{
    /// Create a tracker; telemetry starts disabled
    ///
    /// The modem session's clock is the tracker's clock.
    pub fn new(gps: GpsDriver<G>, modem: ModemSession<M, T>, indicator: I, config: TrackerConfig) -> Self {
        Self {
            gps,
            modem,
            indicator,
            geofence: GeofenceMonitor::new(config.geofence),
            gps_loss: LossMonitor::new(config.gps_loss_timeout_ms),
            gsm_loss: LossMonitor::new(config.gsm_loss_timeout_ms),
            limiter: AlertLimiter::new(config.alert_interval_ms),
            config,
            telemetry: TelemetryDispatcher::new(TelemetryConfig::default()),
            status: TrackerStatus::default(),
            motion: MotionDetector::new(),
            last_gps_poll_ms: None,
            last_gsm_check_ms: None,
        }
    }

    /// Bring up the modem and wait for the first fix
    ///
    /// The modem gets `modem_init_attempts` tries; if all fail the tracker
    /// enters `Error`. A missing fix is not fatal: the tracker starts in
    /// `Standby` and the `Degraded` cue is played.
    pub fn initialize(&mut self) -> Result<()> {
        self.status.state = TrackerState::Initializing;
        self.indicator.cue(Cue::Booting);
        crate::log_info!("Tracker: Initializing ({:?} mode)", self.config.mode);

        self.bring_up_modem()?;
        self.wait_for_fix();

        self.last_gsm_check_ms = Some(self.modem.now_ms());
        self.status.state = TrackerState::Standby;
        if self.status.gps_fixed {
            self.indicator.cue(Cue::Ready);
        } else {
            crate::log_warn!("Tracker: No GPS fix, starting degraded");
            self.indicator.cue(Cue::Degraded);
        }
        if self.config.is_testing() {
            self.send_notice("System Initialized");
        }
        crate::log_info!("Tracker: Ready");
        Ok(())
    }

    fn bring_up_modem(&mut self) -> Result<()> {
        let attempts = self.config.modem_init_attempts.max(1);
        let mut last_error = ModemError::NotReady;
        for attempt in 1..=attempts {
            match self.modem.initialize() {
                Ok(()) => {
                    self.status.gsm_connected = true;
                    return Ok(());
                }
                Err(e) => {
                    crate::log_warn!("Tracker: Modem init {}/{} failed: {:?}", attempt, attempts, e);
                    last_error = e;
                    if attempt < attempts {
                        self.modem.delay_ms(self.config.modem_init_retry_ms);
                    }
                }
            }
        }
        self.status.gsm_connected = false;
        self.status.state = TrackerState::Error;
        crate::log_error!("Tracker: Modem unavailable");
        Err(last_error.into())
    }

    fn wait_for_fix(&mut self) {
        let start = self.modem.now_ms();
        loop {
            let now = self.modem.now_ms();
            self.refresh_gps(now);
            if self.status.gps_fixed {
                crate::log_info!("Tracker: GPS fix acquired");
                return;
            }
            if now.wrapping_sub(start) >= self.config.gps_fix_timeout_ms {
                return;
            }
            self.modem.delay_ms(FIX_WAIT_POLL_MS);
        }
    }

    /// Run one cycle
    ///
    /// Returns the alert raised during this cycle, if any. Does nothing but
    /// count uptime while suspended or in `Error`.
    pub fn update(&mut self) -> Option<AlertEvent> {
        let now = self.modem.now_ms();
        self.status.uptime_ms = now;
        if self.status.suspended || self.status.state == TrackerState::Error {
            return None;
        }

        if interval_elapsed(self.last_gps_poll_ms, now, self.config.gps_update_interval_ms) {
            self.refresh_gps(now);
        }
        if interval_elapsed(self.last_gsm_check_ms, now, self.config.gsm_check_interval_ms) {
            self.refresh_gsm(now);
            if self.status.state == TrackerState::Error {
                return None;
            }
        }
        if self.status.gsm_connected {
            self.telemetry.monitor_connection(&mut self.modem);
        }

        let mut raised = None;
        if self.status.armed {
            self.evaluate_rules(&mut raised);
        }
        self.evaluate_loss(&mut raised);

        if self.status.gsm_connected && self.telemetry.is_enabled() {
            if let Some(location) = self.current_location() {
                if self.telemetry.push_location(&mut self.modem, location) == PushOutcome::Delivered {
                    self.indicator.cue(Cue::UploadOk);
                }
            }
        }
        raised
    }

    fn refresh_gps(&mut self, now: u32) {
        self.last_gps_poll_ms = Some(now);
        let summary = match self.gps.poll() {
            Ok(summary) => summary,
            Err(e) => {
                crate::log_warn!("Tracker: GPS read failed: {:?}", e);
                return;
            }
        };
        let fix = *self.gps.fix();
        if summary.validity_changed {
            if fix.valid {
                crate::log_info!("GPS: Fix acquired ({} satellites)", fix.satellites);
                self.indicator.cue(Cue::GpsFix);
            } else {
                crate::log_warn!("GPS: Fix lost");
            }
        }
        self.status.gps_fixed = fix.valid;

        if let Some(location) = Location::from_fix(&fix) {
            self.status.last_location = Some(location);
            self.status.last_speed_kmh = fix.speed_kmh;
            if summary.sentences > 0 {
                self.motion.observe(location, self.config.motion_threshold_m);
            }
        }
    }

    fn refresh_gsm(&mut self, now: u32) {
        self.last_gsm_check_ms = Some(now);
        let registered = match self.modem.check_registration() {
            Ok(registered) => registered,
            Err(e) => {
                crate::log_warn!("Tracker: Registration check failed: {:?}", e);
                false
            }
        };
        if !registered || !self.modem.is_registered() {
            crate::log_warn!("Tracker: Network lost, reinitializing modem");
            if let Err(e) = self.modem.initialize() {
                crate::log_warn!("Tracker: Modem reinit failed: {:?}", e);
            }
            if self.modem.connection() == ConnectionState::Error {
                crate::log_error!("Tracker: Modem not responding");
                self.status.state = TrackerState::Error;
            }
        }
        self.status.gsm_connected = self.modem.is_registered();
    }

    fn evaluate_rules(&mut self, raised: &mut Option<AlertEvent>) {
        if self.motion.take() && self.status.state == TrackerState::Standby {
            crate::log_warn!("Tracker: Motion detected while armed");
            self.status.state = TrackerState::Tracking;
            self.candidate(AlertKind::Motion, "Unauthorized movement detected", raised);
        }

        if !self.status.gps_fixed {
            return;
        }

        let speed = self.status.last_speed_kmh;
        if speed > self.config.speed_limit_kmh {
            let mut message: String<64> = String::new();
            let _ = write!(message, "Speed limit exceeded: {:.1} km/h", speed);
            self.candidate(AlertKind::Speed, &message, raised);
        }

        if let Some(location) = self.status.last_location {
            match self.geofence.check(location) {
                Some(FenceCrossing::Left) => {
                    self.candidate(AlertKind::Geofence, "Vehicle left safe area", raised);
                }
                Some(FenceCrossing::Returned) => crate::log_info!("Tracker: Back inside safe area"),
                None => {}
            }
        }
    }

    fn evaluate_loss(&mut self, raised: &mut Option<AlertEvent>) {
        let now = self.modem.now_ms();
        if self.gps_loss.update(self.status.gps_fixed, now) {
            self.candidate(AlertKind::GpsLost, "GPS signal lost for extended period", raised);
        }
        if self.gsm_loss.update(self.status.gsm_connected, now) {
            self.candidate(AlertKind::GsmLost, "GSM connection lost for extended period", raised);
        }
    }

    fn candidate(&mut self, kind: AlertKind, message: &str, raised: &mut Option<AlertEvent>) {
        if let AlertOutcome::Raised(event) = self.trigger_alert(kind, message) {
            raised.get_or_insert(event);
        }
    }

    /// Raise an alert, subject to the global rate limit
    ///
    /// A raised alert is counted, sent by SMS to the emergency contact when
    /// registered, pushed to telemetry when enabled, and cued. The tracker
    /// then settles back to `Tracking` (armed) or `Standby`.
    pub fn trigger_alert(&mut self, kind: AlertKind, message: &str) -> AlertOutcome {
        let now = self.modem.now_ms();
        if !self.limiter.allows(now) {
            crate::log_debug!("Tracker: {} alert rate limited", kind.code());
            return AlertOutcome::RateLimited;
        }
        self.limiter.record(now);
        match kind {
            AlertKind::GpsLost => self.gps_loss.acknowledge(),
            AlertKind::GsmLost => self.gsm_loss.acknowledge(),
            _ => {}
        }

        self.status.state = TrackerState::Alert;
        self.status.alert_count = self.status.alert_count.saturating_add(1);
        let event = AlertEvent::new(kind, message, self.current_location(), now);
        crate::log_warn!("Tracker: {} - {}", kind.label(), event.message.as_str());

        self.send_alert_sms(&event);
        if self.status.gsm_connected {
            self.telemetry.push_alert(&mut self.modem, &event);
        }
        self.indicator.cue(Cue::Alert);
        self.modem.delay_ms(self.config.alert_settle_ms);

        self.status.state = self.resting_state();
        AlertOutcome::Raised(event)
    }

    fn resting_state(&self) -> TrackerState {
        if self.status.armed {
            TrackerState::Tracking
        } else {
            TrackerState::Standby
        }
    }

    fn send_alert_sms(&mut self, event: &AlertEvent) {
        if !self.status.gsm_connected {
            crate::log_warn!("Tracker: No network, alert SMS not sent");
            return;
        }
        let Some(contact) = self.config.emergency_contact.as_ref() else {
            crate::log_debug!("Tracker: No emergency contact");
            return;
        };
        let text = alert_sms_text(event);
        if let Err(e) = self.modem.send_sms(contact, &text) {
            crate::log_warn!("Tracker: Alert SMS failed: {:?}", e);
        }
    }

    /// Confirmation SMS with the current location
    fn send_notice(&mut self, label: &str) {
        if !self.status.gsm_connected {
            return;
        }
        let location = self.location_text();
        let Some(contact) = self.config.emergency_contact.as_ref() else {
            return;
        };
        if let Err(e) = self.modem.send_location_sms(contact, &location, Some(label)) {
            crate::log_warn!("Tracker: Notice SMS failed: {:?}", e);
        }
    }

    fn location_text(&self) -> String<32> {
        let mut text = String::new();
        match self.current_location() {
            Some(location) => {
                let _ = write!(text, "{}", location);
            }
            None => text = bounded_string(NO_FIX_TEXT),
        }
        text
    }

    /// Enable rule evaluation
    pub fn arm(&mut self) {
        self.status.armed = true;
        self.motion.reset();
        if self.status.state != TrackerState::Error {
            self.status.state = TrackerState::Standby;
        }
        crate::log_info!("Tracker: Armed");
        self.indicator.cue(Cue::Armed);
        if self.config.is_testing() {
            self.send_notice("Tracker Armed");
        }
    }

    /// Disable rule evaluation
    pub fn disarm(&mut self) {
        self.status.armed = false;
        if self.status.state != TrackerState::Error {
            self.status.state = TrackerState::Standby;
        }
        crate::log_info!("Tracker: Disarmed");
        self.indicator.cue(Cue::Disarmed);
        if self.config.is_testing() {
            self.send_notice("Tracker Disarmed");
        }
    }

    /// Rules are evaluated
    pub fn is_armed(&self) -> bool {
        self.status.armed
    }

    /// Set the safe area; the vehicle is assumed inside it
    pub fn set_geofence(&mut self, center_lat: f32, center_lon: f32, radius_m: f32) {
        let fence = Geofence {
            center_lat,
            center_lon,
            radius_m,
        };
        self.config.geofence = Some(fence);
        self.geofence.set(Some(fence));
        crate::log_info!("Tracker: Geofence set, radius {} m", radius_m);
    }

    /// Remove the safe area
    pub fn clear_geofence(&mut self) {
        self.config.geofence = None;
        self.geofence.set(None);
    }

    /// Change the speed limit
    pub fn set_speed_limit(&mut self, kmh: f32) {
        self.config.speed_limit_kmh = kmh;
    }

    /// Change the SMS recipient; an empty number disables SMS
    pub fn set_emergency_contact(&mut self, number: &str) {
        self.config.emergency_contact = (!number.is_empty()).then(|| bounded_string(number));
    }

    /// Apply a telemetry configuration and open the bearer
    ///
    /// An unusable configuration just disables telemetry. If the bearer
    /// cannot be opened telemetry is disabled and the error returned.
    pub fn configure_telemetry(&mut self, config: TelemetryConfig) -> Result<()> {
        let usable = config.is_usable();
        let apn = config.apn.clone();
        self.telemetry.set_config(config);
        if !usable {
            crate::log_info!("Tracker: Telemetry not configured");
            return Ok(());
        }

        if let Err(e) = self.modem.enable_auto_time_sync() {
            crate::log_debug!("Tracker: Network time sync not enabled: {:?}", e);
        }
        if let Err(e) = self.modem.initialize_gprs(&apn) {
            crate::log_error!("Tracker: GPRS setup failed, telemetry disabled: {:?}", e);
            self.telemetry.set_enabled(false);
            return Err(e.into());
        }

        match self.modem.check_internet_connectivity() {
            Ok(true) => crate::log_info!("Tracker: Internet reachable"),
            Ok(false) => crate::log_warn!("Tracker: Internet not reachable"),
            Err(e) => crate::log_warn!("Tracker: Connectivity check failed: {:?}", e),
        }
        let ip = self.modem.local_ip();
        crate::log_info!("Tracker: Telemetry enabled, local IP {}", ip.as_str());
        Ok(())
    }

    /// Position of the current fix
    pub fn current_location(&self) -> Option<Location> {
        if self.status.gps_fixed {
            self.status.last_location
        } else {
            None
        }
    }

    /// SMS the status summary to the emergency contact
    pub fn send_status_sms(&mut self) -> Result<()> {
        let text = self.status_text();
        let contact = self
            .config
            .emergency_contact
            .as_ref()
            .ok_or(TrackerError::NoContact)?;
        self.modem.send_sms(contact, &text)?;
        Ok(())
    }

    /// Multi-line status summary
    pub fn status_text(&self) -> String<SMS_TEXT_CAPACITY> {
        let mut text = String::new();
        let _ = write!(
            text,
            "BikeTracker Status:\nState: {}\nArmed: {}\nGPS: {}\nLocation: {}\nSpeed: {:.1} km/h\nUptime: {}s\nAlerts: {}",
            self.status.state.name(),
            if self.status.armed { "Yes" } else { "No" },
            if self.status.gps_fixed { "Fixed" } else { "No Fix" },
            self.location_text().as_str(),
            self.status.last_speed_kmh,
            self.status.uptime_ms / 1000,
            self.status.alert_count,
        );
        text
    }

    /// Poll the GPS now and push the position, ignoring the routine interval
    pub fn request_location_update(&mut self) -> PushOutcome {
        let now = self.modem.now_ms();
        self.refresh_gps(now);
        match self.current_location() {
            Some(location) if self.status.gsm_connected => {
                self.telemetry.push_location_now(&mut self.modem, location)
            }
            _ => PushOutcome::Skipped,
        }
    }

    /// Exercise the indicator and report subsystem health (testing mode only)
    pub fn run_diagnostics(&mut self) -> Option<DiagnosticsReport> {
        if !self.config.is_testing() {
            crate::log_warn!("Tracker: Diagnostics only available in testing mode");
            return None;
        }
        self.indicator.cue(Cue::SelfTest);
        let now = self.modem.now_ms();
        self.refresh_gps(now);

        let report = DiagnosticsReport {
            gps_fixed: self.status.gps_fixed,
            satellites: self.gps.fix().satellites,
            location: self.current_location(),
            gsm_connected: self.modem.check_registration().unwrap_or(false),
            signal: self.modem.signal_strength(),
            gprs_connected: self.modem.gprs_flag(),
        };
        crate::log_info!(
            "Tracker: Diagnostics gps={} sats={} gsm={} gprs={}",
            report.gps_fixed,
            report.satellites,
            report.gsm_connected,
            report.gprs_connected
        );
        Some(report)
    }

    /// Raise a test alert (testing mode only)
    pub fn simulate_alert(&mut self, kind: AlertKind) -> Option<AlertOutcome> {
        if !self.config.is_testing() {
            crate::log_warn!("Tracker: Alert simulation only available in testing mode");
            return None;
        }
        Some(self.trigger_alert(kind, TEST_ALERT_MESSAGE))
    }

    /// Reset the alert counter and the motion flag
    pub fn clear_alerts(&mut self) {
        self.status.alert_count = 0;
        self.motion.reset();
        if self.status.state == TrackerState::Alert {
            self.status.state = self.resting_state();
        }
        crate::log_info!("Tracker: Alerts cleared");
    }

    /// Pause the update cycle
    pub fn suspend(&mut self) {
        self.status.suspended = true;
        crate::log_info!("Tracker: Suspended");
    }

    /// Resume the update cycle; the next cycle polls GPS and GSM immediately
    pub fn resume(&mut self) {
        self.status.suspended = false;
        self.last_gps_poll_ms = None;
        self.last_gsm_check_ms = None;
        crate::log_info!("Tracker: Resumed");
    }

    /// Status snapshot
    pub fn status(&self) -> TrackerStatus {
        self.status
    }

    /// Lifecycle state
    pub fn state(&self) -> TrackerState {
        self.status.state
    }

    /// Current configuration
    pub fn config(&self) -> &TrackerConfig {
        &self.config
    }

    /// Telemetry dispatcher
    pub fn telemetry(&self) -> &TelemetryDispatcher {
        &self.telemetry
    }

    /// GPS driver
    pub fn gps(&self) -> &GpsDriver<G> {
        &self.gps
    }

    /// Modem session
    pub fn modem(&self) -> &ModemSession<M, T> {
        &self.modem
    }

    /// Mutable modem session
    pub fn modem_mut(&mut self) -> &mut ModemSession<M, T> {
        &mut self.modem
    }
}
