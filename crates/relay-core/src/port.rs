//! The serial port contract.
//!
//! Both relay loops talk to the link only through [`PortHandle`]. The
//! application crate implements it over the OS serial driver; tests use an
//! in-memory loopback. Each loop owns its own handle (a clone onto the same
//! device, or a second device), so no handle is ever shared between threads.

use std::time::Duration;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Default line speed of the device's UART.
pub const DEFAULT_BAUD_RATE: u32 = 9600;

/// Default read timeout for blocking reads.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_secs(2);

/// Errors raised by a [`PortHandle`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum PortError {
    /// The device could not be opened: missing, held by another process, or
    /// the driver rejected the configuration.
    #[error("serial port {device} unavailable: {reason}")]
    PortUnavailable { device: String, reason: String },

    /// The port is open but the driver will not accept writes.
    #[error("serial port {device} is not writable")]
    NotWritable { device: String },

    /// A write did not complete.
    #[error("write to {device} failed: {reason}")]
    WriteFailed { device: String, reason: String },

    /// A read or byte-count query failed.
    #[error("read from {device} failed: {reason}")]
    ReadFailed { device: String, reason: String },

    /// The handle was used after [`PortHandle::close`].
    #[error("serial port {device} is closed")]
    Closed { device: String },
}

impl PortError {
    /// Returns `true` if the handle cannot be used any further.
    ///
    /// A loop that sees a fatal error stops; anything else is logged and the
    /// loop carries on with its next iteration.
    pub fn is_fatal(&self) -> bool {
        matches!(
            self,
            PortError::PortUnavailable { .. }
                | PortError::NotWritable { .. }
                | PortError::Closed { .. }
        )
    }
}

/// Parity setting of the link.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Parity {
    #[default]
    None,
    Even,
    Odd,
}

/// Number of stop bits.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum StopBits {
    #[default]
    One,
    Two,
}

impl TryFrom<u8> for StopBits {
    type Error = u8;

    fn try_from(value: u8) -> Result<Self, Self::Error> {
        match value {
            1 => Ok(StopBits::One),
            2 => Ok(StopBits::Two),
            other => Err(other),
        }
    }
}

impl From<StopBits> for u8 {
    fn from(value: StopBits) -> Self {
        match value {
            StopBits::One => 1,
            StopBits::Two => 2,
        }
    }
}

/// Everything needed to open one end of the link.
///
/// Data bits are always 8 and flow control is always off.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerialConfig {
    pub device: String,
    pub baud_rate: u32,
    pub parity: Parity,
    pub stop_bits: StopBits,
    pub read_timeout: Duration,
}

impl SerialConfig {
    /// Creates a 9600 8N1 configuration for `device` with a 2 s read timeout.
    pub fn new(device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            baud_rate: DEFAULT_BAUD_RATE,
            parity: Parity::None,
            stop_bits: StopBits::One,
            read_timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    pub fn with_baud_rate(mut self, baud_rate: u32) -> Self {
        self.baud_rate = baud_rate;
        self
    }

    pub fn with_parity(mut self, parity: Parity) -> Self {
        self.parity = parity;
        self
    }

    pub fn with_stop_bits(mut self, stop_bits: StopBits) -> Self {
        self.stop_bits = stop_bits;
        self
    }

    pub fn with_read_timeout(mut self, read_timeout: Duration) -> Self {
        self.read_timeout = read_timeout;
        self
    }

    /// Returns a copy targeting a different device with the same line settings.
    pub fn for_device(&self, device: impl Into<String>) -> Self {
        Self {
            device: device.into(),
            ..self.clone()
        }
    }
}

/// An open serial endpoint.
///
/// Every call goes to the driver; implementations must not cache counts or
/// data between calls.
pub trait PortHandle: Send {
    /// The device identifier this handle was opened on.
    fn device(&self) -> &str;

    /// Number of bytes ready to read. Never blocks.
    fn bytes_available(&mut self) -> Result<usize, PortError>;

    /// Reads up to `max_bytes`, waiting at most the configured read timeout.
    ///
    /// Returns an empty vector on timeout.
    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, PortError>;

    /// Writes `bytes`, returning how many the driver accepted.
    fn write(&mut self, bytes: &[u8]) -> Result<usize, PortError>;

    /// Returns `true` if the driver will accept writes on this handle.
    fn is_writable(&self) -> bool;

    /// Opens a second handle onto the same device.
    fn try_clone(&self) -> Result<Box<dyn PortHandle>, PortError>;

    /// Releases the OS resource. Calling it again has no effect.
    fn close(&mut self);
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_serial_config_defaults_match_device_uart() {
        let cfg = SerialConfig::new("/dev/ttyUSB0");
        assert_eq!(cfg.device, "/dev/ttyUSB0");
        assert_eq!(cfg.baud_rate, 9600);
        assert_eq!(cfg.parity, Parity::None);
        assert_eq!(cfg.stop_bits, StopBits::One);
        assert_eq!(cfg.read_timeout, Duration::from_secs(2));
    }

    #[test]
    fn test_builders_override_fields() {
        let cfg = SerialConfig::new("COM3")
            .with_baud_rate(115_200)
            .with_parity(Parity::Even)
            .with_stop_bits(StopBits::Two)
            .with_read_timeout(Duration::from_millis(50));
        assert_eq!(cfg.baud_rate, 115_200);
        assert_eq!(cfg.parity, Parity::Even);
        assert_eq!(cfg.stop_bits, StopBits::Two);
        assert_eq!(cfg.read_timeout, Duration::from_millis(50));
    }

    #[test]
    fn test_for_device_keeps_line_settings() {
        let base = SerialConfig::new("COM20").with_baud_rate(19_200);
        let other = base.for_device("COM21");
        assert_eq!(other.device, "COM21");
        assert_eq!(other.baud_rate, 19_200);
    }

    #[test]
    fn test_stop_bits_conversion() {
        assert_eq!(StopBits::try_from(1), Ok(StopBits::One));
        assert_eq!(StopBits::try_from(2), Ok(StopBits::Two));
        assert_eq!(StopBits::try_from(3), Err(3));
        assert_eq!(u8::from(StopBits::Two), 2);
    }

    #[test]
    fn test_fatal_classification() {
        let device = "COM1".to_string();
        assert!(PortError::Closed { device: device.clone() }.is_fatal());
        assert!(PortError::NotWritable { device: device.clone() }.is_fatal());
        assert!(PortError::PortUnavailable {
            device: device.clone(),
            reason: "busy".into()
        }
        .is_fatal());
        assert!(!PortError::WriteFailed {
            device: device.clone(),
            reason: "timeout".into()
        }
        .is_fatal());
        assert!(!PortError::ReadFailed {
            device,
            reason: "interrupted".into()
        }
        .is_fatal());
    }
}
