//! GPS device driver (NMEA protocol)
//!
//! Drains the receiver's UART through the streaming [`nmea`] parser and keeps
//! the latest [`Fix`].
//!
//! # Example
//!
//! ```ignore
//! use bike_tracker::platform::mock::MockUart;
//! use bike_tracker::devices::gps::GpsDriver;
//!
//! let mut gps = GpsDriver::new(MockUart::new(Default::default()));
//! let summary = gps.poll()?;
//! if gps.fix().valid {
//!     // use gps.fix().latitude / longitude
//! }
//! ```

use crate::platform::{traits::UartInterface, Result};

pub mod nmea;

pub use nmea::{Fix, FixChange, NmeaError, NmeaParser, Sentence, SentenceKind};

/// Upper bound on bytes consumed by one [`GpsDriver::poll`]
///
/// At 9600 baud the receiver produces under 1 KB/s, so this drains a full
/// update interval's backlog while keeping a stuck-high RX line from
/// starving the rest of the cycle.
pub const MAX_BYTES_PER_POLL: usize = 2048;

/// Outcome of one [`GpsDriver::poll`]
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PollSummary {
    /// GGA/RMC sentences applied to the fix
    pub sentences: u16,
    /// Sentences dropped as malformed
    pub malformed: u16,
    /// Fix validity differs from before the poll
    pub validity_changed: bool,
}

/// GPS device driver
///
/// This driver is generic over any type implementing `UartInterface`,
/// making it platform-independent.
pub struct GpsDriver<U: UartInterface> {
    uart: U,
    parser: NmeaParser,
    fix: Fix,
}

impl<U: UartInterface> GpsDriver<U> {
    /// Create a new GPS driver
    ///
    /// # Arguments
    ///
    /// * `uart` - UART interface for GPS communication (9600 8N1)
    pub fn new(uart: U) -> Self {
        Self {
            uart,
            parser: NmeaParser::new(),
            fix: Fix::default(),
        }
    }

    /// Get mutable reference to UART interface
    pub fn uart_mut(&mut self) -> &mut U {
        &mut self.uart
    }

    /// Latest fix
    pub fn fix(&self) -> &Fix {
        &self.fix
    }

    /// Drain buffered bytes through the parser
    ///
    /// Reads until the UART reports no more data or [`MAX_BYTES_PER_POLL`] is
    /// reached. Unsupported sentences are skipped; malformed ones are counted
    /// and dropped.
    ///
    /// # Errors
    ///
    /// Returns an error if UART communication fails. Sentences completed
    /// before the failure have already been applied.
    pub fn poll(&mut self) -> Result<PollSummary> {
        let was_valid = self.fix.valid;
        let mut summary = PollSummary::default();
        let mut consumed = 0;
        let mut chunk = [0u8; 64];

        while consumed < MAX_BYTES_PER_POLL {
            let read_count = self.uart.read(&mut chunk)?;
            if read_count == 0 {
                break;
            }
            consumed += read_count;

            for &byte in chunk.iter().take(read_count) {
                let Some(sentence) = self.parser.feed(byte) else {
                    continue;
                };
                match nmea::parse_fix(&sentence, &mut self.fix) {
                    Ok(_) => summary.sentences = summary.sentences.saturating_add(1),
                    Err(NmeaError::MalformedSentence) => {
                        summary.malformed = summary.malformed.saturating_add(1);
                    }
                    Err(NmeaError::Unsupported) => {}
                }
            }
        }

        summary.validity_changed = was_valid != self.fix.valid;
        if summary.validity_changed {
            if self.fix.valid {
                crate::log_info!("GPS: Fix acquired ({} satellites)", self.fix.satellites);
            } else {
                crate::log_warn!("GPS: Fix lost");
            }
        }
        Ok(summary)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::platform::mock::MockUart;
    use crate::platform::traits::UartConfig;

    const GGA: &[u8] = b"$GPGGA,123519,4807.038,N,01131.000,E,1,08,0.9,545.4,M,46.9,M,,*47\r\n";
    const RMC: &[u8] = b"$GPRMC,123519,A,4807.038,N,01131.000,E,022.4,084.4,230394,003.1,W*6A\r\n";

    fn driver() -> (GpsDriver<MockUart>, MockUart) {
        let uart = MockUart::new(UartConfig::default());
        let remote = uart.clone();
        (GpsDriver::new(uart), remote)
    }

    #[test]
    fn test_gps_no_data() {
        let (mut gps, _) = driver();
        let summary = gps.poll().unwrap();
        assert_eq!(summary, PollSummary::default());
        assert!(!gps.fix().valid);
    }

    #[test]
    fn test_gps_drains_everything_in_one_poll() {
        let (mut gps, uart) = driver();
        // Longer than one 64-byte read chunk
        uart.inject_rx_data(GGA);
        uart.inject_rx_data(RMC);

        let summary = gps.poll().unwrap();
        assert_eq!(summary.sentences, 2);
        assert!(summary.validity_changed);
        assert_eq!(uart.pending_rx(), 0);

        let fix = gps.fix();
        assert!(fix.valid);
        assert!((fix.latitude - 48.1173).abs() < 0.001);
        assert!((fix.speed_kmh - 41.48).abs() < 0.01);
    }

    #[test]
    fn test_gps_sentence_split_across_polls() {
        let (mut gps, uart) = driver();
        uart.inject_rx_data(&GGA[..30]);
        assert_eq!(gps.poll().unwrap().sentences, 0);

        uart.inject_rx_data(&GGA[30..]);
        let summary = gps.poll().unwrap();
        assert_eq!(summary.sentences, 1);
        assert!(gps.fix().valid);
    }

    #[test]
    fn test_gps_counts_malformed_and_skips_unsupported() {
        let (mut gps, uart) = driver();
        uart.inject_rx_data(b"$GPGGA,123519,4807.038,N*00\r\n");
        uart.inject_rx_data(b"$GPGSV,3,1,11,03,03,111,00,04,15,270,00*74\r\n");
        uart.inject_rx_data(b"INVALID DATA\r\n");

        let summary = gps.poll().unwrap();
        assert_eq!(summary.sentences, 0);
        assert_eq!(summary.malformed, 1);
        assert!(!gps.fix().valid);
    }

    #[test]
    fn test_gps_poll_is_bounded() {
        let (mut gps, uart) = driver();
        let noise = [b'x'; MAX_BYTES_PER_POLL + 100];
        uart.inject_rx_data(&noise);

        gps.poll().unwrap();
        assert_eq!(uart.pending_rx(), 100);
    }

    #[test]
    fn test_gps_reports_fix_loss() {
        let (mut gps, uart) = driver();
        uart.inject_rx_data(GGA);
        gps.poll().unwrap();

        uart.inject_rx_data(b"$GPGGA,123520,4807.038,N,01131.000,E,0,00,,,M,,M,,*4F\r\n");
        let summary = gps.poll().unwrap();
        assert!(summary.validity_changed);
        assert!(!gps.fix().valid);
    }
}
