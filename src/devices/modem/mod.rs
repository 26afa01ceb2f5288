//! SIM800-class cellular modem driver
//!
//! [`ModemSession`] speaks textual AT commands over a [`UartInterface`] and
//! tracks the connection lifecycle:
//!
//! ```text
//! Uninitialized --AT ok--> Ready --CREG 1|5--> Registered
//!       |                    |                     |
//!       +---- AT / CMGF fail +--> Error            +-- bearer up/down (gprs_connected)
//!                            +--> NoNetwork (registration timeout)
//! ```
//!
//! `Error` and `NoNetwork` are terminal until [`ModemSession::initialize`] runs
//! again. Every wait is bounded and goes through the injected
//! [`TimerInterface`], and the receive side is cleared before each command.
//!
//! The session is split by concern:
//! - `command`: the AT primitive, response buffer and command scripts
//! - `sms`: text-mode SMS
//! - `gprs`: bearer lifecycle and connection health
//! - `http`: the `AT+HTTP*` request state machine
//! - `info`: signal, IMEI, time sync, power-off

use crate::core::parameters::bounded_string;
use crate::platform::traits::{TimerInterface, UartInterface};
use heapless::String;

mod command;
mod error;
mod gprs;
mod http;
mod info;
pub mod retry;
mod sms;

pub use command::{AtStep, CommandOutcome, RESPONSE_CAPACITY};
pub use error::{ModemError, ProtocolFault, Result};
pub use http::{HttpMethod, HttpResponse, HTTP_BODY_CAPACITY, HTTP_USER_DATA_CAPACITY};
pub use gprs::IpAddress;
pub use info::Imei;
pub use retry::{Backoff, RetryPolicy};
pub use sms::SMS_TEXT_CAPACITY;

/// E.164 phone number, e.g. `+639171234567`
pub type PhoneNumber = String<24>;

/// Registration stat values accepted from `+CREG:` (home, roaming)
const REGISTERED_HOME: u8 = 1;
const REGISTERED_ROAMING: u8 = 5;

/// Network connection state
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum ConnectionState {
    /// `initialize` has not run yet
    Uninitialized,
    /// AT handshake succeeded, registration pending
    Ready,
    /// Registered on the home or a roaming network
    Registered,
    /// Registration was not confirmed in time
    NoNetwork,
    /// Handshake or SMS text mode failed
    Error,
}

/// APN settings for the GPRS bearer
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ApnCredentials {
    /// Access point name
    pub apn: String<48>,
    /// Username, empty when the carrier needs none
    pub user: String<32>,
    /// Password, empty when the carrier needs none
    pub password: String<32>,
}

impl ApnCredentials {
    /// Build credentials; overlong values are truncated
    pub fn new(apn: &str, user: &str, password: &str) -> Self {
        Self {
            apn: bounded_string(apn),
            user: bounded_string(user),
            password: bounded_string(password),
        }
    }
}

/// Observable modem state
///
/// Only the session writes it; other components read it through
/// [`ModemSession::state`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ModemState {
    /// Registration lifecycle
    pub connection: ConnectionState,
    /// GPRS bearer believed open
    pub gprs_connected: bool,
    /// Last successful data exchange (ms clock)
    pub last_activity_ms: u32,
    /// Credentials stored by the last `initialize_gprs`
    pub apn: Option<ApnCredentials>,
}

/// Timeouts and retry settings for the session
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct ModemConfig {
    /// Default AT command timeout
    pub command_timeout_ms: u32,
    /// Overall deadline for `+CREG` polling
    pub registration_timeout_ms: u32,
    /// Gap between `AT+CREG?` polls
    pub registration_poll_ms: u32,
    /// Timeout for bearer profile commands
    pub bearer_command_timeout_ms: u32,
    /// Timeout for `AT+SAPBR=1,1`
    pub bearer_open_timeout_ms: u32,
    /// Attempts and back-off for opening the bearer
    pub bearer_retry: RetryPolicy,
    /// Timeout for `AT+HTTP*` setup commands
    pub http_command_timeout_ms: u32,
    /// Deadline for the `+HTTPACTION:` completion line
    pub http_action_timeout_ms: u32,
    /// Timeout for `AT+HTTPREAD`
    pub http_read_timeout_ms: u32,
    /// Deadline for the `>` SMS prompt
    pub sms_prompt_timeout_ms: u32,
    /// Fixed wait after submitting an SMS
    pub sms_settle_ms: u32,
    /// Run NTP sync while configuring the bearer
    pub ntp_sync: bool,
}

impl Default for ModemConfig {
    fn default() -> Self {
        Self {
            command_timeout_ms: 3_000,
            registration_timeout_ms: 20_000,
            registration_poll_ms: 1_000,
            bearer_command_timeout_ms: 5_000,
            bearer_open_timeout_ms: 30_000,
            bearer_retry: RetryPolicy::bearer(),
            http_command_timeout_ms: 5_000,
            http_action_timeout_ms: 30_000,
            http_read_timeout_ms: 10_000,
            sms_prompt_timeout_ms: 5_000,
            sms_settle_ms: 5_000,
            ntp_sync: true,
        }
    }
}

/// AT command session with a SIM800-class modem
pub struct ModemSession<U: UartInterface, T: TimerInterface> {
    uart: U,
    timer: T,
    config: ModemConfig,
    state: ModemState,
    response: command::ResponseBuffer,
    imei: Option<Imei>,
    http_user_data: Option<String<HTTP_USER_DATA_CAPACITY>>,
}

impl<U: UartInterface, T: TimerInterface> ModemSession<U, T> {
    /// Create a session with default timeouts
    pub fn new(uart: U, timer: T) -> Self {
        Self::with_config(uart, timer, ModemConfig::default())
    }

    /// Create a session with explicit timeouts
    pub fn with_config(uart: U, timer: T, config: ModemConfig) -> Self {
        let now = timer.now_ms();
        Self {
            uart,
            timer,
            config,
            state: ModemState {
                connection: ConnectionState::Uninitialized,
                gprs_connected: false,
                last_activity_ms: now,
                apn: None,
            },
            response: command::ResponseBuffer::new(),
            imei: None,
            http_user_data: None,
        }
    }

    /// Current state snapshot
    pub fn state(&self) -> &ModemState {
        &self.state
    }

    /// Registration lifecycle state
    pub fn connection(&self) -> ConnectionState {
        self.state.connection
    }

    /// Registered on a network
    pub fn is_registered(&self) -> bool {
        self.state.connection == ConnectionState::Registered
    }

    /// Last known bearer flag, without querying the modem
    pub fn gprs_flag(&self) -> bool {
        self.state.gprs_connected
    }

    /// Last successful data exchange
    pub fn last_activity_ms(&self) -> u32 {
        self.state.last_activity_ms
    }

    /// Session timeouts
    pub fn config(&self) -> &ModemConfig {
        &self.config
    }

    /// Get mutable reference to UART interface
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Initialize the modem and wait for network registration
    ///
    /// Sequence: `AT` handshake, `ATE0` (best effort), `AT+CMGF=1`, then
    /// `AT+CREG?` polling until stat 1 or 5 or the registration timeout.
    ///
    /// # Errors
    ///
    /// - handshake or text-mode failure: state becomes `Error`
    /// - [`ModemError::RegistrationFailure`]: state becomes `NoNetwork`
    pub fn initialize(&mut self) -> Result<()> {
        crate::log_info!("Modem: Initializing");
        let result = self.handshake_and_register();

        self.state.connection = match result {
            Ok(()) => ConnectionState::Registered,
            Err(ModemError::RegistrationFailure) => ConnectionState::NoNetwork,
            Err(_) => ConnectionState::Error,
        };
        if result.is_err() {
            self.state.gprs_connected = false;
        }

        match result {
            Ok(()) => crate::log_info!("Modem: Registered on network"),
            Err(e) => crate::log_warn!("Modem: Initialization failed: {:?}", e),
        }
        result
    }

    /// Single `AT+CREG?` query
    ///
    /// Only `Ready -> Registered` and `Registered -> NoNetwork` happen here.
    /// `Uninitialized`, `NoNetwork` and `Error` report the network status but
    /// stay put until [`Self::initialize`] runs. A missing or unparsable
    /// answer reports `false` and leaves the state alone.
    pub fn check_registration(&mut self) -> Result<bool> {
        let timeout = self.config.command_timeout_ms;
        if self.send_at_command("AT+CREG?", "OK", timeout)? != CommandOutcome::Success {
            return Ok(false);
        }
        let Some(stat) = parse_registration_stat(self.response()) else {
            return Ok(false);
        };
        let registered = matches!(stat, REGISTERED_HOME | REGISTERED_ROAMING);
        match (registered, self.state.connection) {
            (true, ConnectionState::Ready) => self.state.connection = ConnectionState::Registered,
            (false, ConnectionState::Registered) => {
                crate::log_warn!("Modem: Lost network registration (stat {})", stat);
                self.state.connection = ConnectionState::NoNetwork;
                self.state.gprs_connected = false;
            }
            _ => {}
        }
        Ok(registered)
    }

    fn handshake_and_register(&mut self) -> Result<()> {
        self.clear_input()?;
        let timeout = self.config.command_timeout_ms;

        self.command("AT", "OK", timeout)?;
        self.state.connection = ConnectionState::Ready;

        if self.send_at_command("ATE0", "OK", timeout)? != CommandOutcome::Success {
            crate::log_debug!("Modem: ATE0 not acknowledged, continuing");
        }

        self.command("AT+CMGF=1", "OK", timeout)?;

        if self.poll_registration()? {
            Ok(())
        } else {
            Err(ModemError::RegistrationFailure)
        }
    }

    /// Poll `AT+CREG?` until registered or the registration timeout elapses
    fn poll_registration(&mut self) -> Result<bool> {
        let start = self.timer.now_ms();
        let timeout = self.config.command_timeout_ms;

        loop {
            if self.send_at_command("AT+CREG?", "OK", timeout)? == CommandOutcome::Success {
                match parse_registration_stat(self.response()) {
                    Some(REGISTERED_HOME) | Some(REGISTERED_ROAMING) => return Ok(true),
                    Some(stat) => crate::log_debug!("Modem: CREG stat {}", stat),
                    None => {}
                }
            }

            if self.timer.elapsed_since(start) >= self.config.registration_timeout_ms {
                crate::log_warn!("Modem: Registration timeout");
                return Ok(false);
            }
            self.timer.delay_ms(self.config.registration_poll_ms);
        }
    }
}

/// Extract the `<stat>` field from a `+CREG:` response or URC
///
/// Accepts both the query form `+CREG: <n>,<stat>` and the unsolicited form
/// `+CREG: <stat>`.
fn parse_registration_stat(response: &str) -> Option<u8> {
    let (_, rest) = response.split_once("+CREG:")?;
    let line = rest.lines().next()?.trim();
    let mut fields = line.split(',').map(str::trim);
    let first = fields.next()?;
    let stat = fields.next().unwrap_or(first);
    stat.parse().ok()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockModem, MockTimer};

    pub(super) fn session(modem: &MockModem, timer: &MockTimer) -> ModemSession<MockModem, MockTimer> {
        ModemSession::new(modem.clone(), timer.clone())
    }

    /// Session that completed `initialize`, with the trace cleared
    pub(super) fn registered(
        modem: &MockModem,
        timer: &MockTimer,
    ) -> ModemSession<MockModem, MockTimer> {
        let mut session = session(modem, timer);
        session.initialize().unwrap();
        modem.clear_trace();
        session
    }

    #[test]
    fn test_parse_registration_stat() {
        assert_eq!(parse_registration_stat("\r\n+CREG: 0,1\r\n\r\nOK\r\n"), Some(1));
        assert_eq!(parse_registration_stat("\r\n+CREG: 2,5,\"1A2B\",\"00C3\"\r\n"), Some(5));
        assert_eq!(parse_registration_stat("\r\n+CREG: 3\r\n"), Some(3));
        assert_eq!(parse_registration_stat("\r\nOK\r\n"), None);
    }

    #[test]
    fn test_initialize_registers() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        session.initialize().unwrap();
        assert_eq!(session.connection(), ConnectionState::Registered);
        assert_eq!(
            modem.trace()[..4],
            ["AT", "ATE0", "AT+CMGF=1", "AT+CREG?"]
        );
    }

    #[test]
    fn test_initialize_roaming_counts_as_registered() {
        let modem = MockModem::online();
        modem.respond("AT+CREG?", "\r\n+CREG: 0,5\r\n\r\nOK\r\n");
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        session.initialize().unwrap();
        assert!(session.is_registered());
    }

    #[test]
    fn test_registration_polls_until_registered() {
        let modem = MockModem::online();
        modem.respond_once("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
        modem.respond_once("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        session.initialize().unwrap();
        assert_eq!(modem.count("AT+CREG?"), 3);
        assert!(timer.now_ms() >= 2 * 1_000);
    }

    #[test]
    fn test_registration_timeout_sets_no_network() {
        let modem = MockModem::online();
        modem.respond("AT+CREG?", "\r\n+CREG: 0,2\r\n\r\nOK\r\n");
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        assert_eq!(session.initialize(), Err(ModemError::RegistrationFailure));
        assert_eq!(session.connection(), ConnectionState::NoNetwork);
        assert!(timer.now_ms() >= 20_000);
        assert!(timer.now_ms() < 25_000);
    }

    #[test]
    fn test_handshake_timeout_sets_error() {
        let modem = MockModem::silent();
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        assert_eq!(session.initialize(), Err(ModemError::TransportTimeout));
        assert_eq!(session.connection(), ConnectionState::Error);
        assert_eq!(modem.trace(), ["AT"]);
        assert!(timer.now_ms() >= 3_000);
    }

    #[test]
    fn test_text_mode_failure_sets_error() {
        let modem = MockModem::online();
        modem.respond("AT+CMGF=1", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        assert_eq!(
            session.initialize(),
            Err(ModemError::Protocol(ProtocolFault::ErrorToken))
        );
        assert_eq!(session.connection(), ConnectionState::Error);
        assert!(!modem.sent("AT+CREG?"));
    }

    #[test]
    fn test_echo_off_is_best_effort() {
        let modem = MockModem::online();
        modem.respond("ATE0", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        session.initialize().unwrap();
        assert!(session.is_registered());
    }

    #[test]
    fn test_reinitialize_recovers_from_error() {
        let modem = MockModem::online();
        modem.respond_once("AT", "");
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        assert!(session.initialize().is_err());
        assert_eq!(session.connection(), ConnectionState::Error);

        session.initialize().unwrap();
        assert_eq!(session.connection(), ConnectionState::Registered);
    }

    #[test]
    fn test_check_registration_tracks_network() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut session = registered(&modem, &timer);

        assert_eq!(session.check_registration(), Ok(true));
        assert_eq!(modem.count("AT+CREG?"), 1);

        modem.respond("AT+CREG?", "\r\n+CREG: 0,3\r\n\r\nOK\r\n");
        assert_eq!(session.check_registration(), Ok(false));
        assert_eq!(session.connection(), ConnectionState::NoNetwork);

        // Network back, but the session stays down until re-initialized
        modem.respond("AT+CREG?", "\r\n+CREG: 0,5\r\n\r\nOK\r\n");
        assert_eq!(session.check_registration(), Ok(true));
        assert_eq!(session.connection(), ConnectionState::NoNetwork);

        session.initialize().unwrap();
        assert!(session.is_registered());
    }

    #[test]
    fn test_check_registration_keeps_failed_session_down() {
        let modem = MockModem::online();
        modem.respond("AT+CMGF=1", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        assert!(session.initialize().is_err());
        assert_eq!(session.connection(), ConnectionState::Error);

        assert_eq!(session.check_registration(), Ok(true));
        assert_eq!(session.connection(), ConnectionState::Error);
        assert!(!session.is_registered());
    }

    #[test]
    fn test_check_registration_before_initialize() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut session = session(&modem, &timer);

        assert_eq!(session.check_registration(), Ok(true));
        assert_eq!(session.connection(), ConnectionState::Uninitialized);
    }

    #[test]
    fn test_check_registration_without_answer_keeps_state() {
        let modem = MockModem::online();
        let timer = MockTimer::new();
        let mut session = registered(&modem, &timer);

        modem.respond_once("AT+CREG?", "");
        assert_eq!(session.check_registration(), Ok(false));
        assert!(session.is_registered());
    }
}
