//! AT command primitive
//!
//! One command is in flight at a time. Before each command the receive side
//! is drained and the response buffer cleared, then the command line is
//! written as a single frame and the buffer is filled until the expected
//! token, an `ERROR` token, or the deadline.

use super::{ModemError, ModemSession, ProtocolFault, Result};
use crate::platform::traits::{TimerInterface, UartInterface};
use heapless::{String, Vec};

/// Response buffer capacity in bytes
pub const RESPONSE_CAPACITY: usize = 1024;

/// Longest command line, including the trailing CRLF
const COMMAND_CAPACITY: usize = 192;

/// Sleep between receive polls
const POLL_INTERVAL_MS: u32 = 10;

/// Error token; also matches `+CME ERROR` and `+CMS ERROR`
const ERROR_TOKEN: &str = "ERROR";

/// Result of one AT exchange
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
#[cfg_attr(feature = "defmt", derive(defmt::Format))]
pub enum CommandOutcome {
    /// Expected token seen
    Success,
    /// `ERROR` seen before the expected token
    ErrorToken,
    /// Deadline passed
    Timeout,
}

impl CommandOutcome {
    /// Convert to a result, mapping failures to [`ModemError`]
    pub fn into_result(self) -> Result<()> {
        match self {
            CommandOutcome::Success => Ok(()),
            CommandOutcome::ErrorToken => Err(ModemError::Protocol(ProtocolFault::ErrorToken)),
            CommandOutcome::Timeout => Err(ModemError::TransportTimeout),
        }
    }
}

/// One step of a command script
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct AtStep<'a> {
    /// Command line without CRLF
    pub command: &'a str,
    /// Token that marks success
    pub expect: &'a str,
    /// Deadline for this step
    pub timeout_ms: u32,
    /// Abort the script when this step fails
    pub required: bool,
}

impl<'a> AtStep<'a> {
    /// Step that must succeed, expecting `OK`
    pub const fn required(command: &'a str, timeout_ms: u32) -> Self {
        Self {
            command,
            expect: "OK",
            timeout_ms,
            required: true,
        }
    }

    /// Step whose failure is logged and ignored
    pub const fn optional(command: &'a str, timeout_ms: u32) -> Self {
        Self {
            command,
            expect: "OK",
            timeout_ms,
            required: false,
        }
    }
}

/// Accumulated modem output
///
/// When full, the older half is discarded so the most recent output (where
/// the expected token will appear) is kept.
pub(super) struct ResponseBuffer {
    bytes: Vec<u8, RESPONSE_CAPACITY>,
}

impl ResponseBuffer {
    pub(super) const fn new() -> Self {
        Self { bytes: Vec::new() }
    }

    pub(super) fn clear(&mut self) {
        self.bytes.clear();
    }

    pub(super) fn extend(&mut self, data: &[u8]) {
        for &byte in data {
            if self.bytes.is_full() {
                let half = RESPONSE_CAPACITY / 2;
                self.bytes.copy_within(half.., 0);
                self.bytes.truncate(RESPONSE_CAPACITY - half);
            }
            // Cannot fail: space was made above
            let _ = self.bytes.push(byte);
        }
    }

    pub(super) fn contains(&self, needle: &str) -> bool {
        let needle = needle.as_bytes();
        needle.is_empty() || self.bytes.windows(needle.len()).any(|w| w == needle)
    }

    /// Longest valid UTF-8 prefix
    pub(super) fn as_str(&self) -> &str {
        match core::str::from_utf8(&self.bytes) {
            Ok(text) => text,
            Err(e) => core::str::from_utf8(&self.bytes[..e.valid_up_to()]).unwrap_or(""),
        }
    }
}

impl<U: UartInterface, T: TimerInterface> ModemSession<U, T> {
    /// Send one AT command and wait for `expected`
    ///
    /// `cmd` is sent without CRLF; the terminator is appended here. The
    /// response buffer holds everything received and is available through
    /// [`response`](Self::response) until the next command.
    ///
    /// # Errors
    ///
    /// Only transport faults and overlong commands are errors. A missing or
    /// negative answer is reported as a [`CommandOutcome`].
    pub fn send_at_command(
        &mut self,
        cmd: &str,
        expected: &str,
        timeout_ms: u32,
    ) -> Result<CommandOutcome> {
        let mut line: String<COMMAND_CAPACITY> = String::new();
        line.push_str(cmd).map_err(|_| ModemError::CommandTooLong)?;
        line.push_str("\r\n").map_err(|_| ModemError::CommandTooLong)?;

        self.clear_input()?;
        crate::log_trace!("Modem: > {}", cmd);
        self.uart.write(line.as_bytes())?;

        let outcome = self.await_response(expected, timeout_ms)?;
        if outcome != CommandOutcome::Success {
            crate::log_debug!("Modem: {} -> {:?}", cmd, outcome);
        }
        Ok(outcome)
    }

    /// [`send_at_command`](Self::send_at_command) with failures as errors
    pub fn command(&mut self, cmd: &str, expected: &str, timeout_ms: u32) -> Result<()> {
        self.send_at_command(cmd, expected, timeout_ms)?.into_result()
    }

    /// Run steps in order
    ///
    /// Stops at the first failing required step; optional failures are
    /// logged and skipped.
    pub fn run_script(&mut self, steps: &[AtStep<'_>]) -> Result<()> {
        for step in steps {
            let outcome = self.send_at_command(step.command, step.expect, step.timeout_ms)?;
            match (outcome, step.required) {
                (CommandOutcome::Success, _) => {}
                (_, true) => return outcome.into_result(),
                (_, false) => crate::log_debug!("Modem: Optional step {} skipped", step.command),
            }
        }
        Ok(())
    }

    /// Keep receiving into the current response until `expected` appears
    ///
    /// Unlike [`send_at_command`](Self::send_at_command) the buffer is not
    /// cleared, so a token that arrived with the previous reply still counts.
    pub fn wait_for(&mut self, expected: &str, timeout_ms: u32) -> Result<CommandOutcome> {
        self.await_response(expected, timeout_ms)
    }

    /// Wait until a full line starting with `prefix` has been received
    ///
    /// Used for unsolicited completions such as `+HTTPACTION:`.
    pub fn wait_for_line(&mut self, prefix: &str, timeout_ms: u32) -> Result<CommandOutcome> {
        let start = self.timer.now_ms();
        loop {
            self.pump()?;
            if let Some((_, rest)) = self.response.as_str().split_once(prefix) {
                if rest.contains("\r\n") {
                    return Ok(CommandOutcome::Success);
                }
            }
            if self.timer.elapsed_since(start) >= timeout_ms {
                return Ok(CommandOutcome::Timeout);
            }
            self.timer.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Write raw bytes as one frame (SMS text, HTTP body)
    ///
    /// The response buffer is cleared first so the following wait only sees
    /// the answer to this payload.
    pub fn write_raw(&mut self, data: &[u8]) -> Result<()> {
        self.response.clear();
        self.uart.write(data)?;
        Ok(())
    }

    /// Text received since the last command
    pub fn response(&self) -> &str {
        self.response.as_str()
    }

    /// Current time on the session clock
    pub fn now_ms(&self) -> u32 {
        self.timer.now_ms()
    }

    /// Block on the session clock
    pub fn delay_ms(&mut self, ms: u32) {
        self.timer.delay_ms(ms);
    }

    /// Drop pending input and forget the previous response
    pub(super) fn clear_input(&mut self) -> Result<()> {
        let mut scratch = [0u8; 64];
        while self.uart.available() {
            if self.uart.read(&mut scratch)? == 0 {
                break;
            }
        }
        self.response.clear();
        Ok(())
    }

    fn await_response(&mut self, expected: &str, timeout_ms: u32) -> Result<CommandOutcome> {
        let start = self.timer.now_ms();
        loop {
            self.pump()?;
            if self.response.contains(expected) {
                return Ok(CommandOutcome::Success);
            }
            if self.response.contains(ERROR_TOKEN) {
                return Ok(CommandOutcome::ErrorToken);
            }
            if self.timer.elapsed_since(start) >= timeout_ms {
                return Ok(CommandOutcome::Timeout);
            }
            self.timer.delay_ms(POLL_INTERVAL_MS);
        }
    }

    /// Move everything the UART has into the response buffer
    fn pump(&mut self) -> Result<()> {
        let mut chunk = [0u8; 64];
        loop {
            let n = self.uart.read(&mut chunk)?;
            if n == 0 {
                return Ok(());
            }
            self.response.extend(&chunk[..n]);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::{MockModem, MockTimer};
    use crate::platform::{PlatformError, UartError};

    fn session(modem: &MockModem, timer: &MockTimer) -> ModemSession<MockModem, MockTimer> {
        ModemSession::new(modem.clone(), timer.clone())
    }

    #[test]
    fn test_command_success() {
        let modem = MockModem::new();
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        assert_eq!(s.send_at_command("AT", "OK", 1_000), Ok(CommandOutcome::Success));
        assert_eq!(modem.trace(), ["AT"]);
        assert_eq!(timer.now_ms(), 0);
    }

    #[test]
    fn test_error_token() {
        let modem = MockModem::new();
        modem.respond("AT+CPIN?", "\r\n+CME ERROR: 10\r\n");
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        assert_eq!(
            s.send_at_command("AT+CPIN?", "OK", 1_000),
            Ok(CommandOutcome::ErrorToken)
        );
        assert_eq!(
            s.command("AT+CPIN?", "OK", 1_000),
            Err(ModemError::Protocol(ProtocolFault::ErrorToken))
        );
    }

    #[test]
    fn test_timeout_is_bounded_by_clock() {
        let modem = MockModem::silent();
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        assert_eq!(s.send_at_command("AT", "OK", 500), Ok(CommandOutcome::Timeout));
        assert!(timer.now_ms() >= 500);
        assert!(timer.now_ms() < 500 + 2 * POLL_INTERVAL_MS);
        assert_eq!(s.command("AT", "OK", 500), Err(ModemError::TransportTimeout));
    }

    #[test]
    fn test_stale_input_is_discarded() {
        let modem = MockModem::silent();
        modem.inject("\r\nOK\r\n");
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        // The stale OK must not satisfy the new command
        assert_eq!(s.send_at_command("AT", "OK", 100), Ok(CommandOutcome::Timeout));
    }

    #[test]
    fn test_command_too_long() {
        let modem = MockModem::new();
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);
        let long = [b'A'; COMMAND_CAPACITY];
        let cmd = core::str::from_utf8(&long).unwrap();

        assert_eq!(s.send_at_command(cmd, "OK", 100), Err(ModemError::CommandTooLong));
        assert!(modem.trace().is_empty());
    }

    #[test]
    fn test_write_failure_propagates() {
        let modem = MockModem::new();
        modem.fail_writes(true);
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        assert_eq!(
            s.send_at_command("AT", "OK", 100),
            Err(ModemError::Transport(PlatformError::Uart(UartError::WriteFailed)))
        );
    }

    #[test]
    fn test_wait_for_line_needs_full_line() {
        let modem = MockModem::silent();
        modem.respond("AT+HTTPACTION=0", "\r\nOK\r\n\r\n+HTTPACTION: 0,2");
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        s.command("AT+HTTPACTION=0", "OK", 100).unwrap();
        assert_eq!(
            s.wait_for_line("+HTTPACTION:", 200),
            Ok(CommandOutcome::Timeout)
        );

        modem.inject("00,4\r\n");
        assert_eq!(
            s.wait_for_line("+HTTPACTION:", 200),
            Ok(CommandOutcome::Success)
        );
        assert!(s.response().contains("+HTTPACTION: 0,200,4"));
    }

    #[test]
    fn test_script_stops_at_required_failure() {
        let modem = MockModem::new();
        modem.respond("AT+B", "\r\nERROR\r\n");
        let timer = MockTimer::new();
        let mut s = session(&modem, &timer);

        let steps = [
            AtStep::required("AT+A", 100),
            AtStep::optional("AT+B", 100),
            AtStep::required("AT+C", 100),
        ];
        s.run_script(&steps).unwrap();
        assert_eq!(modem.trace(), ["AT+A", "AT+B", "AT+C"]);

        modem.clear_trace();
        let steps = [AtStep::required("AT+B", 100), AtStep::required("AT+C", 100)];
        assert_eq!(
            s.run_script(&steps),
            Err(ModemError::Protocol(ProtocolFault::ErrorToken))
        );
        assert_eq!(modem.trace(), ["AT+B"]);
    }

    #[test]
    fn test_response_buffer_keeps_tail() {
        let mut buffer = ResponseBuffer::new();
        let filler = [b'x'; RESPONSE_CAPACITY];
        buffer.extend(&filler);
        buffer.extend(b"+CSQ: 20,0");

        assert!(buffer.contains("+CSQ: 20,0"));
        assert!(buffer.as_str().len() <= RESPONSE_CAPACITY);
    }

    #[test]
    fn test_response_buffer_invalid_utf8_prefix() {
        let mut buffer = ResponseBuffer::new();
        buffer.extend(b"OK\r\n\xff\xfe");
        assert_eq!(buffer.as_str(), "OK\r\n");
        assert!(buffer.contains("OK"));
    }
}
