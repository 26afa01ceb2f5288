//! GPRS bearer lifecycle
//!
//! Bearer profile 1 is configured with `AT+SAPBR=3,1,...` and opened with
//! `AT+SAPBR=1,1`. The open command can report `OK` without an address, so
//! success is confirmed by querying `AT+SAPBR=2,1` for status 1.

use super::{ApnCredentials, AtStep, CommandOutcome, ConnectionState, ModemError, ModemSession, Result};
use crate::platform::traits::{TimerInterface, UartInterface};
use core::fmt::Write;
use heapless::String;

/// Pause after closing a stale bearer
const CLOSE_SETTLE_MS: u32 = 1_000;
/// Pause between a successful open and the status query
const OPEN_SETTLE_MS: u32 = 2_000;
/// Pause between disconnect and reconnect
const RECONNECT_SETTLE_MS: u32 = 2_000;
/// Timeout for `AT+CNTP`
const NTP_TIMEOUT_MS: u32 = 30_000;
/// `AT+CIPPING` overall deadline and the extra wait for late replies
const PING_TIMEOUT_MS: u32 = 15_000;
const PING_SETTLE_MS: u32 = 5_000;
/// Host pinged by the connectivity check
const PING_HOST: &str = "8.8.8.8";
const NTP_SERVER: &str = "pool.ntp.org";

/// Dotted IPv4 address as reported by the modem
pub type IpAddress = String<16>;

impl<U: UartInterface, T: TimerInterface> ModemSession<U, T> {
    /// Configure and open the GPRS bearer
    ///
    /// The credentials are stored first so a later
    /// [`reconnect_gprs`](Self::reconnect_gprs) can reuse them. Opening is
    /// retried per [`ModemConfig::bearer_retry`](super::ModemConfig), closing
    /// the bearer between attempts.
    ///
    /// # Errors
    ///
    /// - [`ModemError::NotReady`] unless registered
    /// - profile setup failures from the AT layer
    /// - [`ModemError::BearerFailure`] when every open attempt failed
    pub fn initialize_gprs(&mut self, credentials: &ApnCredentials) -> Result<()> {
        if !self.is_registered() {
            return Err(ModemError::NotReady);
        }
        self.state.apn = Some(credentials.clone());
        self.state.gprs_connected = false;
        crate::log_info!("Modem: Opening GPRS bearer (APN {})", credentials.apn.as_str());

        let timeout = self.config.bearer_command_timeout_ms;

        // A bearer left open by a previous session makes SAPBR=1,1 fail
        let _ = self.send_at_command("AT+SAPBR=0,1", "OK", timeout)?;
        self.timer.delay_ms(CLOSE_SETTLE_MS);

        self.configure_bearer_profile(credentials)?;

        if self.config.ntp_sync {
            self.sync_network_time();
        }

        let policy = self.config.bearer_retry;
        for attempt in policy.attempts() {
            if self.open_bearer()? {
                self.state.gprs_connected = true;
                self.state.last_activity_ms = self.timer.now_ms();
                crate::log_info!("Modem: GPRS connected (attempt {})", attempt);
                return Ok(());
            }

            crate::log_warn!("Modem: Bearer open attempt {} failed", attempt);
            if !policy.is_last(attempt) {
                self.timer.delay_ms(policy.delay_after(attempt));
                let _ = self.send_at_command("AT+SAPBR=0,1", "OK", timeout)?;
                self.timer.delay_ms(RECONNECT_SETTLE_MS);
            }
        }

        crate::log_error!("Modem: GPRS bearer failed");
        Err(ModemError::BearerFailure)
    }

    fn configure_bearer_profile(&mut self, credentials: &ApnCredentials) -> Result<()> {
        let timeout = self.config.bearer_command_timeout_ms;

        let mut apn: String<80> = String::new();
        write!(apn, "AT+SAPBR=3,1,\"APN\",\"{}\"", credentials.apn.as_str())
            .map_err(|_| ModemError::CommandTooLong)?;
        let mut user: String<64> = String::new();
        write!(user, "AT+SAPBR=3,1,\"USER\",\"{}\"", credentials.user.as_str())
            .map_err(|_| ModemError::CommandTooLong)?;
        let mut password: String<64> = String::new();
        write!(password, "AT+SAPBR=3,1,\"PWD\",\"{}\"", credentials.password.as_str())
            .map_err(|_| ModemError::CommandTooLong)?;

        self.run_script(&[
            AtStep::required("AT+SAPBR=3,1,\"CONTYPE\",\"GPRS\"", timeout),
            AtStep::required(&apn, timeout),
        ])?;
        if !credentials.user.is_empty() {
            self.command(&user, "OK", timeout)?;
        }
        if !credentials.password.is_empty() {
            self.command(&password, "OK", timeout)?;
        }
        Ok(())
    }

    /// Best-effort NTP sync over bearer profile 1
    fn sync_network_time(&mut self) {
        let timeout = self.config.bearer_command_timeout_ms;
        let mut server: String<48> = String::new();
        let _ = write!(server, "AT+CNTP=\"{}\",0", NTP_SERVER);

        let result = self.run_script(&[
            AtStep::required("AT+CNTPCID=1", timeout),
            AtStep::required(&server, timeout),
            AtStep::required("AT+CNTP", NTP_TIMEOUT_MS),
        ]);
        if let Err(e) = result {
            crate::log_debug!("Modem: NTP sync skipped: {:?}", e);
        }
    }

    /// One `SAPBR=1,1` plus status query
    fn open_bearer(&mut self) -> Result<bool> {
        let outcome = self.send_at_command("AT+SAPBR=1,1", "OK", self.config.bearer_open_timeout_ms)?;
        if outcome != CommandOutcome::Success {
            return Ok(false);
        }
        self.timer.delay_ms(OPEN_SETTLE_MS);
        Ok(self.query_bearer()?.is_some())
    }

    /// Query bearer 1; `Some(ip)` when open
    fn query_bearer(&mut self) -> Result<Option<IpAddress>> {
        let outcome = self.send_at_command("AT+SAPBR=2,1", "OK", self.config.bearer_command_timeout_ms)?;
        if outcome != CommandOutcome::Success {
            return Ok(None);
        }
        Ok(parse_bearer_status(self.response()))
    }

    /// Ask the modem whether the bearer is open
    ///
    /// Clears the connected flag when it is not.
    pub fn is_gprs_connected(&mut self) -> Result<bool> {
        let open = self.query_bearer()?.is_some();
        if !open && self.state.gprs_connected {
            crate::log_warn!("Modem: GPRS bearer dropped");
        }
        self.state.gprs_connected = open;
        Ok(open)
    }

    /// Bearer IP address, `0.0.0.0` when closed or unknown
    pub fn local_ip(&mut self) -> IpAddress {
        match self.query_bearer() {
            Ok(Some(ip)) => ip,
            _ => {
                let mut ip = IpAddress::new();
                let _ = ip.push_str("0.0.0.0");
                ip
            }
        }
    }

    /// Terminate HTTP and close the bearer
    pub fn disconnect_gprs(&mut self) -> Result<()> {
        let timeout = self.config.bearer_command_timeout_ms;
        let _ = self.send_at_command("AT+HTTPTERM", "OK", timeout)?;
        let _ = self.send_at_command("AT+SAPBR=0,1", "OK", timeout)?;
        self.state.gprs_connected = false;
        crate::log_info!("Modem: GPRS disconnected");
        Ok(())
    }

    /// Disconnect, then open the bearer again with the stored credentials
    ///
    /// # Errors
    ///
    /// [`ModemError::NoCredentials`] if `initialize_gprs` never ran.
    pub fn reconnect_gprs(&mut self) -> Result<()> {
        let Some(credentials) = self.state.apn.clone() else {
            return Err(ModemError::NoCredentials);
        };
        crate::log_info!("Modem: Reconnecting GPRS");
        self.disconnect_gprs()?;
        self.timer.delay_ms(RECONNECT_SETTLE_MS);
        self.initialize_gprs(&credentials)
    }

    /// Reconnect only if the bearer is down
    pub fn ensure_gprs_connection(&mut self) -> Result<()> {
        if self.is_gprs_connected()? {
            return Ok(());
        }
        self.reconnect_gprs()
    }

    /// Periodic health check
    ///
    /// Restores the bearer when it dropped and refreshes the activity
    /// timestamp when it is up.
    pub fn maintain_connection(&mut self) -> Result<()> {
        if !self.is_registered() {
            return Err(ModemError::NotReady);
        }
        self.ensure_gprs_connection()?;
        self.state.last_activity_ms = self.timer.now_ms();
        Ok(())
    }

    /// Ping a public host through the bearer
    pub fn check_internet_connectivity(&mut self) -> Result<bool> {
        let mut cmd: String<40> = String::new();
        let _ = write!(cmd, "AT+CIPPING=\"{}\"", PING_HOST);

        let outcome = self.send_at_command(&cmd, "OK", PING_TIMEOUT_MS)?;
        if outcome == CommandOutcome::ErrorToken {
            return Ok(false);
        }
        if !self.response().contains("+CIPPING:") {
            let _ = self.wait_for("+CIPPING:", PING_SETTLE_MS)?;
        }
        let reachable = self.response().contains("+CIPPING: 1,");
        if reachable {
            self.state.last_activity_ms = self.timer.now_ms();
        }
        Ok(reachable)
    }

    /// Tear down and re-establish registration and the bearer
    ///
    /// Used after an upload gave up. Network registration is toggled with
    /// `AT+CREG=0` / `AT+CREG=1` and polled again; the bearer is reopened if
    /// credentials are stored.
    pub fn reset_connection(&mut self) -> Result<()> {
        crate::log_warn!("Modem: Resetting connection");
        let timeout = self.config.command_timeout_ms;

        self.disconnect_gprs()?;
        self.timer.delay_ms(3_000);

        let _ = self.send_at_command("AT+CREG=0", "OK", timeout)?;
        self.timer.delay_ms(1_000);
        let _ = self.send_at_command("AT+CREG=1", "OK", timeout)?;
        self.timer.delay_ms(5_000);

        if !self.poll_registration()? {
            self.state.connection = ConnectionState::NoNetwork;
            return Err(ModemError::RegistrationFailure);
        }
        self.state.connection = ConnectionState::Registered;

        match self.state.apn.clone() {
            Some(credentials) => self.initialize_gprs(&credentials),
            None => Ok(()),
        }
    }
}

/// Parse `+SAPBR: <cid>,<status>,"<ip>"`; `Some(ip)` when status is 1
fn parse_bearer_status(response: &str) -> Option<IpAddress> {
    let (_, rest) = response.split_once("+SAPBR:")?;
    let line = rest.lines().next()?;
    let mut fields = line.split(',').map(str::trim);
    let _cid = fields.next()?;
    if fields.next()? != "1" {
        return None;
    }
    let ip = fields.next().unwrap_or("").trim_matches('"');
    let mut addr = IpAddress::new();
    addr.push_str(ip).ok()?;
    Some(addr)
}

#[cfg(test)]
mod tests {
    use super::super::tests::{registered, session};
    use super::*;
    use crate::devices::modem::ProtocolFault;
    use crate::platform::mock::{MockModem, MockTimer};

    fn credentials() -> ApnCredentials {
        ApnCredentials::new("internet.globe.com.ph", "", "")
    }

    #[test]
    fn test_parse_bearer_status() {
        assert_eq!(
            parse_bearer_status("\r\n+SAPBR: 1,1,\"10.64.12.7\"\r\n\r\nOK\r\n").as_deref(),
            Some("10.64.12.7")
        );
        assert_eq!(parse_bearer_status("\r\n+SAPBR: 1,3,\"0.0.0.0\"\r\n\r\nOK\r\n"), None);
        assert_eq!(parse_bearer_status("\r\nOK\r\n"), None);
    }

    #[test]
    fn test_gprs_requires_registration() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        assert_eq!(s.initialize_gprs(&credentials()), Err(ModemError::NotReady));
        assert!(s.state().apn.is_none());
    }

    #[test]
    fn test_gprs_sequence() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        s.initialize_gprs(&credentials()).unwrap();
        assert!(s.gprs_flag());
        assert_eq!(s.last_activity_ms(), timer.now_ms());
        assert_eq!(
            modem.trace(),
            [
                "AT+SAPBR=0,1",
                "AT+SAPBR=3,1,\"CONTYPE\",\"GPRS\"",
                "AT+SAPBR=3,1,\"APN\",\"internet.globe.com.ph\"",
                "AT+CNTPCID=1",
                "AT+CNTP=\"pool.ntp.org\",0",
                "AT+CNTP",
                "AT+SAPBR=1,1",
                "AT+SAPBR=2,1",
            ]
        );
    }

    #[test]
    fn test_gprs_sends_user_and_password_when_set() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        s.initialize_gprs(&ApnCredentials::new("apn", "user", "secret"))
            .unwrap();
        assert!(modem.sent("AT+SAPBR=3,1,\"USER\",\"user\""));
        assert!(modem.sent("AT+SAPBR=3,1,\"PWD\",\"secret\""));
    }

    #[test]
    fn test_gprs_ntp_failure_is_ignored() {
        let modem = MockModem::online();
        modem.respond("AT+CNTPCID", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        s.initialize_gprs(&credentials()).unwrap();
        assert!(!modem.sent("AT+CNTP=\""));
    }

    #[test]
    fn test_gprs_retries_then_fails() {
        let modem = MockModem::online();
        modem.respond("AT+SAPBR=1,1", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        assert_eq!(s.initialize_gprs(&credentials()), Err(ModemError::BearerFailure));
        assert_eq!(modem.count("AT+SAPBR=1,1"), 3);
        assert!(!s.gprs_flag());
        // Credentials are kept for a later reconnect
        assert!(s.state().apn.is_some());
    }

    #[test]
    fn test_gprs_open_ok_but_no_address() {
        let modem = MockModem::online();
        modem.respond_once("AT+SAPBR=2,1", "\r\n+SAPBR: 1,2,\"0.0.0.0\"\r\n\r\nOK\r\n");
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        s.initialize_gprs(&credentials()).unwrap();
        assert_eq!(modem.count("AT+SAPBR=1,1"), 2);
    }

    #[test]
    fn test_gprs_profile_failure_is_error() {
        let modem = MockModem::online();
        modem.respond("AT+SAPBR=3,1,\"APN\"", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        assert_eq!(
            s.initialize_gprs(&credentials()),
            Err(ModemError::Protocol(ProtocolFault::ErrorToken))
        );
        assert!(!modem.sent("AT+SAPBR=1,1"));
    }

    #[test]
    fn test_is_gprs_connected_clears_flag() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        s.initialize_gprs(&credentials()).unwrap();

        modem.respond("AT+SAPBR=2,1", "\r\n+SAPBR: 1,3,\"0.0.0.0\"\r\n\r\nOK\r\n");
        assert_eq!(s.is_gprs_connected(), Ok(false));
        assert!(!s.gprs_flag());
        assert_eq!(s.local_ip().as_str(), "0.0.0.0");
    }

    #[test]
    fn test_local_ip() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        assert_eq!(s.local_ip().as_str(), "10.64.12.7");
    }

    #[test]
    fn test_reconnect_without_credentials() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);

        assert_eq!(s.reconnect_gprs(), Err(ModemError::NoCredentials));
        assert!(modem.trace().is_empty());
    }

    #[test]
    fn test_reconnect_reuses_credentials() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        s.initialize_gprs(&credentials()).unwrap();
        modem.clear_trace();

        s.reconnect_gprs().unwrap();
        let trace = modem.trace();
        assert_eq!(trace[0], "AT+HTTPTERM");
        assert!(modem.sent("AT+SAPBR=3,1,\"APN\",\"internet.globe.com.ph\""));
        assert!(s.gprs_flag());
    }

    #[test]
    fn test_ensure_connection_skips_when_up() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        s.initialize_gprs(&credentials()).unwrap();
        modem.clear_trace();

        s.ensure_gprs_connection().unwrap();
        assert_eq!(modem.trace(), ["AT+SAPBR=2,1"]);
    }

    #[test]
    fn test_maintain_connection_updates_activity() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        s.initialize_gprs(&credentials()).unwrap();

        timer.advance(60_000);
        s.maintain_connection().unwrap();
        assert_eq!(s.last_activity_ms(), timer.now_ms());
    }

    #[test]
    fn test_connectivity_check() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        assert_eq!(s.check_internet_connectivity(), Ok(true));

        // OK without any echo reply line
        modem.respond("AT+CIPPING=", "\r\nOK\r\n");
        assert_eq!(s.check_internet_connectivity(), Ok(false));

        modem.respond("AT+CIPPING=", "\r\nERROR\r\n");
        assert_eq!(s.check_internet_connectivity(), Ok(false));
    }

    #[test]
    fn test_reset_connection_reregisters_and_reopens() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        s.initialize_gprs(&credentials()).unwrap();
        modem.clear_trace();

        s.reset_connection().unwrap();
        assert!(modem.sent("AT+CREG=0"));
        assert!(modem.sent("AT+CREG=1"));
        assert!(modem.sent("AT+CREG?"));
        assert!(modem.sent("AT+SAPBR=1,1"));
        assert!(s.is_registered());
        assert!(s.gprs_flag());
    }

    #[test]
    fn test_reset_connection_without_network() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut s = registered(&modem, &timer);
        modem.respond("AT+CREG?", "\r\n+CREG: 0,0\r\n\r\nOK\r\n");

        assert_eq!(s.reset_connection(), Err(ModemError::RegistrationFailure));
        assert_eq!(s.connection(), ConnectionState::NoNetwork);
    }
}
