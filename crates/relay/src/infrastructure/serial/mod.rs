//! Serial port backend over the `serialport` crate.
//!
//! [`SerialPortHandle`] implements [`PortHandle`] for a real device. The
//! driver API is blocking, which is why the receive loop runs on its own
//! thread: `read` waits up to the configured read timeout and a timeout is
//! reported as an empty read, not an error.
//!
//! Device enumeration ([`list_ports`]) backs the `list` subcommand and the
//! interactive device prompt.

use std::fmt;
use std::io::{self, Read, Write};

use serial_relay_core::{Parity, PortError, PortHandle, SerialConfig, StopBits};
use serialport::{DataBits, FlowControl, SerialPort, SerialPortType};
use thiserror::Error;
use tracing::{debug, info};

use crate::application::lifecycle::PortOpener;

pub mod loopback;

/// A [`PortHandle`] backed by an OS serial device.
pub struct SerialPortHandle {
    device: String,
    port: Option<Box<dyn SerialPort>>,
}

/// Opens `config.device` with 8 data bits and no flow control.
///
/// # Errors
///
/// Returns [`PortError::PortUnavailable`] if the device is missing, held by
/// another process, or rejects the line settings.
pub fn open_port(config: &SerialConfig) -> Result<SerialPortHandle, PortError> {
    let port = serialport::new(config.device.as_str(), config.baud_rate)
        .data_bits(DataBits::Eight)
        .parity(to_driver_parity(config.parity))
        .stop_bits(to_driver_stop_bits(config.stop_bits))
        .flow_control(FlowControl::None)
        .timeout(config.read_timeout)
        .open()
        .map_err(|e| PortError::PortUnavailable {
            device: config.device.clone(),
            reason: e.to_string(),
        })?;

    info!(
        "opened serial port {} at {} baud",
        config.device, config.baud_rate
    );
    Ok(SerialPortHandle {
        device: config.device.clone(),
        port: Some(port),
    })
}

fn to_driver_parity(parity: Parity) -> serialport::Parity {
    match parity {
        Parity::None => serialport::Parity::None,
        Parity::Even => serialport::Parity::Even,
        Parity::Odd => serialport::Parity::Odd,
    }
}

fn to_driver_stop_bits(stop_bits: StopBits) -> serialport::StopBits {
    match stop_bits {
        StopBits::One => serialport::StopBits::One,
        StopBits::Two => serialport::StopBits::Two,
    }
}

/// Returns `true` for the error kinds a blocking read reports on timeout.
fn is_timeout_error(e: &io::Error) -> bool {
    matches!(e.kind(), io::ErrorKind::WouldBlock | io::ErrorKind::TimedOut)
}

/// Returns `true` for errors meaning the device itself went away.
fn is_disconnect_error(e: &io::Error) -> bool {
    matches!(
        e.kind(),
        io::ErrorKind::BrokenPipe | io::ErrorKind::NotConnected | io::ErrorKind::UnexpectedEof
    )
}

/// Returns `true` for driver errors meaning the device itself went away.
fn is_driver_disconnect(e: &serialport::Error) -> bool {
    match e.kind() {
        serialport::ErrorKind::NoDevice => true,
        serialport::ErrorKind::Io(kind) => is_disconnect_error(&io::Error::from(kind)),
        _ => false,
    }
}

impl SerialPortHandle {
    fn port_mut(&mut self) -> Result<&mut Box<dyn SerialPort>, PortError> {
        let device = &self.device;
        self.port.as_mut().ok_or_else(|| PortError::Closed {
            device: device.clone(),
        })
    }

    fn disconnected(&self, e: &io::Error) -> PortError {
        PortError::PortUnavailable {
            device: self.device.clone(),
            reason: e.to_string(),
        }
    }
}

impl PortHandle for SerialPortHandle {
    fn device(&self) -> &str {
        &self.device
    }

    fn bytes_available(&mut self) -> Result<usize, PortError> {
        let count = self.port_mut()?.bytes_to_read();
        match count {
            Ok(count) => Ok(count as usize),
            Err(e) if is_driver_disconnect(&e) => Err(PortError::PortUnavailable {
                device: self.device.clone(),
                reason: e.to_string(),
            }),
            Err(e) => Err(PortError::ReadFailed {
                device: self.device.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn read(&mut self, max_bytes: usize) -> Result<Vec<u8>, PortError> {
        let port = self.port_mut()?;
        if max_bytes == 0 {
            return Ok(Vec::new());
        }

        let mut buf = vec![0u8; max_bytes];
        match port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(e) if is_timeout_error(&e) => Ok(Vec::new()),
            Err(e) if is_disconnect_error(&e) => Err(self.disconnected(&e)),
            Err(e) => Err(PortError::ReadFailed {
                device: self.device.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn write(&mut self, bytes: &[u8]) -> Result<usize, PortError> {
        let port = self.port_mut()?;
        let result = port
            .write(bytes)
            .and_then(|written| port.flush().map(|()| written));

        match result {
            Ok(written) => Ok(written),
            Err(e) if is_disconnect_error(&e) => Err(self.disconnected(&e)),
            Err(e) => Err(PortError::WriteFailed {
                device: self.device.clone(),
                reason: e.to_string(),
            }),
        }
    }

    fn is_writable(&self) -> bool {
        self.port.is_some()
    }

    fn try_clone(&self) -> Result<Box<dyn PortHandle>, PortError> {
        let port = self.port.as_ref().ok_or_else(|| PortError::Closed {
            device: self.device.clone(),
        })?;
        let clone = port.try_clone().map_err(|e| PortError::PortUnavailable {
            device: self.device.clone(),
            reason: format!("cannot clone handle: {e}"),
        })?;
        Ok(Box::new(SerialPortHandle {
            device: self.device.clone(),
            port: Some(clone),
        }))
    }

    fn close(&mut self) {
        if self.port.take().is_some() {
            debug!("closed serial port {}", self.device);
        }
    }
}

/// Opens real serial devices for the lifecycle coordinator.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemPortOpener;

impl PortOpener for SystemPortOpener {
    fn open(&self, config: &SerialConfig) -> Result<Box<dyn PortHandle>, PortError> {
        Ok(Box::new(open_port(config)?))
    }
}

// ── Enumeration ───────────────────────────────────────────────────────────────

/// Error type for device enumeration.
#[derive(Debug, Error)]
#[error("failed to enumerate serial ports: {0}")]
pub struct EnumerationError(#[from] serialport::Error);

/// One serial adapter known to the OS.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortListing {
    pub device: String,
    pub name: String,
    pub location: String,
    pub description: String,
}

impl PortListing {
    fn from_info(info: serialport::SerialPortInfo) -> Self {
        let (name, location, description) = match info.port_type {
            SerialPortType::UsbPort(usb) => (
                usb.product.unwrap_or_else(|| "USB serial".to_string()),
                format!("usb {:04x}:{:04x}", usb.vid, usb.pid),
                usb.manufacturer.unwrap_or_default(),
            ),
            SerialPortType::PciPort => ("PCI serial".to_string(), "pci".to_string(), String::new()),
            SerialPortType::BluetoothPort => (
                "Bluetooth serial".to_string(),
                "bluetooth".to_string(),
                String::new(),
            ),
            SerialPortType::Unknown => ("serial".to_string(), String::new(), String::new()),
        };
        Self {
            device: info.port_name,
            name,
            location,
            description,
        }
    }
}

impl fmt::Display for PortListing {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{} {} {} {}",
            self.device, self.name, self.location, self.description
        )
    }
}

/// Lists the serial adapters the OS reports, in driver order.
///
/// # Errors
///
/// Returns [`EnumerationError`] if the OS query fails.
pub fn list_ports() -> Result<Vec<PortListing>, EnumerationError> {
    let ports = serialport::available_ports()?;
    debug!("enumerated {} serial ports", ports.len());
    Ok(ports.into_iter().map(PortListing::from_info).collect())
}
