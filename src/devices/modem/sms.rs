//! Text-mode SMS
//!
//! `AT+CMGS="<number>"`, wait for the `>` prompt, then the text terminated by
//! Ctrl-Z in a single write. Delivery is not confirmed: after submission the
//! session waits a fixed settle time and discards whatever the modem said.

use super::{ModemError, ModemSession, Result};
use crate::core::parameters::bounded_string;
use crate::platform::traits::{TimerInterface, UartInterface};
use core::fmt::Write;
use heapless::{String, Vec};

/// Longest SMS body sent (single GSM-7 segment)
pub const SMS_TEXT_CAPACITY: usize = 160;

const CTRL_Z: u8 = 0x1A;
const ESC: u8 = 0x1B;

impl<U: UartInterface, T: TimerInterface> ModemSession<U, T> {
    /// Send a text message
    ///
    /// Text longer than [`SMS_TEXT_CAPACITY`] bytes is truncated.
    ///
    /// # Errors
    ///
    /// - [`ModemError::NotReady`] unless registered
    /// - prompt timeout or `ERROR`: the pending input is cancelled with ESC
    pub fn send_sms(&mut self, number: &str, text: &str) -> Result<()> {
        if !self.is_registered() {
            crate::log_warn!("Modem: SMS not sent, not registered");
            return Err(ModemError::NotReady);
        }

        let mut cmd: String<48> = String::new();
        write!(cmd, "AT+CMGS=\"{}\"", number).map_err(|_| ModemError::CommandTooLong)?;

        let outcome = self.send_at_command(&cmd, ">", self.config.sms_prompt_timeout_ms)?;
        if let Err(e) = outcome.into_result() {
            crate::log_warn!("Modem: No SMS prompt ({:?})", outcome);
            // Leave the modem out of text-entry mode even if this write fails
            let _ = self.write_raw(&[ESC]);
            return Err(e);
        }

        let body: String<SMS_TEXT_CAPACITY> = bounded_string(text);
        let mut payload: Vec<u8, { SMS_TEXT_CAPACITY + 1 }> = Vec::new();
        // Fits: body is bounded to SMS_TEXT_CAPACITY
        let _ = payload.extend_from_slice(body.as_bytes());
        let _ = payload.push(CTRL_Z);
        self.write_raw(&payload)?;

        self.timer.delay_ms(self.config.sms_settle_ms);
        self.clear_input()?;
        crate::log_info!("Modem: SMS submitted ({} chars)", body.len());
        Ok(())
    }

    /// Send a location message
    ///
    /// Format: `BikeTracker Alert[ - <label>]\nLocation: <location>\nTime: <s>s`
    /// where the time is seconds on the session clock.
    pub fn send_location_sms(
        &mut self,
        number: &str,
        location: &str,
        label: Option<&str>,
    ) -> Result<()> {
        let mut text: String<SMS_TEXT_CAPACITY> = String::new();
        // Overflow only truncates the message
        let _ = text.push_str("BikeTracker Alert");
        if let Some(label) = label {
            let _ = write!(text, " - {}", label);
        }
        let _ = write!(
            text,
            "\nLocation: {}\nTime: {}s",
            location,
            self.timer.now_ms() / 1000
        );
        self.send_sms(number, &text)
    }
}
