//! Modem metadata and power control

use super::{CommandOutcome, ConnectionState, ModemSession, Result};
use crate::platform::traits::{TimerInterface, UartInterface};
use heapless::String;

/// IMEI text, `Unknown` when it could not be read
pub type Imei = String<20>;

/// `+CSQ` rssi value meaning "not known or not detectable"
const RSSI_UNKNOWN: u8 = 99;

const POWER_DOWN_TIMEOUT_MS: u32 = 5_000;

impl<U: UartInterface, T: TimerInterface> ModemSession<U, T> {
    /// Signal strength as the `+CSQ` rssi (0..=31), `None` when unknown
    pub fn signal_strength(&mut self) -> Option<u8> {
        let timeout = self.config.command_timeout_ms;
        match self.send_at_command("AT+CSQ", "OK", timeout) {
            Ok(CommandOutcome::Success) => {}
            _ => return None,
        }
        parse_rssi(self.response()).filter(|&rssi| rssi != RSSI_UNKNOWN)
    }

    /// Modem IMEI, read once and cached
    pub fn imei(&mut self) -> Imei {
        if let Some(imei) = &self.imei {
            return imei.clone();
        }

        let timeout = self.config.command_timeout_ms;
        let read = match self.send_at_command("AT+GSN", "OK", timeout) {
            Ok(CommandOutcome::Success) => parse_imei(self.response()),
            _ => None,
        };

        match read {
            Some(imei) => {
                self.imei = Some(imei.clone());
                imei
            }
            None => {
                crate::log_warn!("Modem: IMEI not available");
                let mut unknown = Imei::new();
                let _ = unknown.push_str("Unknown");
                unknown
            }
        }
    }

    /// Enable network time updates (`AT+CLTS=1`) and the RTC alarm (`AT+CALA=1`)
    pub fn enable_auto_time_sync(&mut self) -> Result<()> {
        let timeout = self.config.command_timeout_ms;
        self.command("AT+CLTS=1", "OK", timeout)?;
        self.command("AT+CALA=1", "OK", timeout)?;
        crate::log_info!("Modem: Network time sync enabled");
        Ok(())
    }

    /// Power the modem down (`AT+CPOWD=1`)
    ///
    /// The session returns to `Uninitialized`; call
    /// [`initialize`](Self::initialize) after the modem is powered again.
    pub fn power_off(&mut self) -> Result<()> {
        self.command("AT+CPOWD=1", "POWER DOWN", POWER_DOWN_TIMEOUT_MS)?;
        self.state.connection = ConnectionState::Uninitialized;
        self.state.gprs_connected = false;
        crate::log_info!("Modem: Powered down");
        Ok(())
    }
}

/// `+CSQ: <rssi>,<ber>`
fn parse_rssi(response: &str) -> Option<u8> {
    let (_, rest) = response.split_once("+CSQ:")?;
    rest.split(',').next()?.trim().parse().ok()
}

/// First line made only of digits
fn parse_imei(response: &str) -> Option<Imei> {
    let line = response
        .lines()
        .map(str::trim)
        .find(|line| line.len() >= 14 && line.bytes().all(|b| b.is_ascii_digit()))?;
    let mut imei = Imei::new();
    imei.push_str(line).ok()?;
    Some(imei)
}
