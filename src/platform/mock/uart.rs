//! Mock UART implementation for testing

use crate::platform::{
    Result,
    traits::{UartConfig, UartInterface},
};
use std::cell::RefCell;
use std::rc::Rc;
use std::vec::Vec;

#[derive(Debug)]
struct UartBuffers {
    config: UartConfig,
    tx: Vec<u8>,
    rx: Vec<u8>,
}

/// Mock UART implementation
///
/// Provides in-memory buffers for transmit and receive data, allowing unit
/// tests to feed NMEA traffic into a driver that owns its own handle.
///
/// # Example
///
/// ```ignore
/// use bike_tracker::platform::mock::MockUart;
/// use bike_tracker::platform::traits::UartInterface;
///
/// let mut uart = MockUart::new(Default::default());
/// let remote = uart.clone();
///
/// uart.write(b"Hello").unwrap();
/// assert_eq!(remote.tx_buffer(), b"Hello");
///
/// remote.inject_rx_data(b"World");
/// let mut buf = [0u8; 5];
/// uart.read(&mut buf).unwrap();
/// assert_eq!(&buf, b"World");
/// ```
#[derive(Debug, Clone)]
pub struct MockUart {
    inner: Rc<RefCell<UartBuffers>>,
}

impl MockUart {
    /// Create a new mock UART
    pub fn new(config: UartConfig) -> Self {
        Self {
            inner: Rc::new(RefCell::new(UartBuffers {
                config,
                tx: Vec::new(),
                rx: Vec::new(),
            })),
        }
    }

    /// Get transmitted data (for test verification)
    pub fn tx_buffer(&self) -> Vec<u8> {
        self.inner.borrow().tx.clone()
    }

    /// Clear transmit buffer
    pub fn clear_tx_buffer(&self) {
        self.inner.borrow_mut().tx.clear();
    }

    /// Inject receive data (for test setup)
    pub fn inject_rx_data(&self, data: &[u8]) {
        self.inner.borrow_mut().rx.extend_from_slice(data);
    }

    /// Bytes injected but not yet read
    pub fn pending_rx(&self) -> usize {
        self.inner.borrow().rx.len()
    }

    /// Get current baud rate
    pub fn baud_rate(&self) -> u32 {
        self.inner.borrow().config.baud_rate
    }
}

impl UartInterface for MockUart {
    fn write(&mut self, data: &[u8]) -> Result<usize> {
        self.inner.borrow_mut().tx.extend_from_slice(data);
        Ok(data.len())
    }

    fn read(&mut self, buffer: &mut [u8]) -> Result<usize> {
        let mut inner = self.inner.borrow_mut();
        let to_read = core::cmp::min(buffer.len(), inner.rx.len());

        buffer[..to_read].copy_from_slice(&inner.rx[..to_read]);
        inner.rx.drain(..to_read);

        Ok(to_read)
    }

    fn set_baud_rate(&mut self, baud: u32) -> Result<()> {
        self.inner.borrow_mut().config.baud_rate = baud;
        Ok(())
    }

    fn available(&self) -> bool {
        !self.inner.borrow().rx.is_empty()
    }

    fn flush(&mut self) -> Result<()> {
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_uart_write() {
        let mut uart = MockUart::new(UartConfig::default());
        let written = uart.write(b"$GPGGA").unwrap();
        assert_eq!(written, 6);
        assert_eq!(uart.tx_buffer(), b"$GPGGA");
    }

    #[test]
    fn test_mock_uart_read_in_chunks() {
        let mut uart = MockUart::new(UartConfig::default());
        uart.inject_rx_data(b"Test Data");

        let mut buffer = [0u8; 4];
        let read = uart.read(&mut buffer).unwrap();
        assert_eq!(read, 4);
        assert_eq!(&buffer, b"Test");

        let mut buffer2 = [0u8; 10];
        let read2 = uart.read(&mut buffer2).unwrap();
        assert_eq!(read2, 5);
        assert_eq!(&buffer2[..5], b" Data");
        assert_eq!(uart.pending_rx(), 0);
    }

    #[test]
    fn test_mock_uart_shared_handle() {
        let mut uart = MockUart::new(UartConfig::default());
        let remote = uart.clone();
        assert!(!uart.available());

        remote.inject_rx_data(b"X");
        assert!(uart.available());

        let mut buf = [0u8; 1];
        uart.read(&mut buf).unwrap();
        assert!(!remote.available());
    }

    #[test]
    fn test_mock_uart_baud_rate() {
        let mut uart = MockUart::new(UartConfig::default());
        assert_eq!(uart.baud_rate(), 9600);

        uart.set_baud_rate(115_200).unwrap();
        assert_eq!(uart.baud_rate(), 115_200);
    }
}
