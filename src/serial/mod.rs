// src/serial/mod.rs  -  Byte source over a serial port + port enumeration
//
// Linux:   pedals usually show up as /dev/ttyUSB0 or /dev/ttyACM0
//          Permissions: add yourself to the `dialout` group, or:
//            sudo chmod a+rw /dev/ttyUSB0
// Windows: COM3, COM4, …  (check Device Manager)
// macOS:   /dev/cu.usbserial-*  or /dev/cu.usbmodem*

pub mod reader;
#[cfg(test)]
pub mod mock;

pub use reader::{PollingReader, ReadHandler, ReaderHandle, ReaderState};

use crate::error::PedalError;
use serialport::{SerialPort, SerialPortType};
use std::io::{ErrorKind, Read};
use std::time::Duration;

/// Default pedal baud rate (what most USB pedal boards ship with)
pub const DEFAULT_BAUD: u32 = 9_600;

/// Bounded driver-level read timeout; a firing never blocks longer than this
const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Transport boundary used by the polling reader.
pub trait ByteSource: Send {
    /// Bytes ready to read without blocking.
    fn available(&mut self) -> Result<usize, PedalError>;
    /// Read up to `max` bytes.  May return fewer, or none.
    fn read(&mut self, max: usize) -> Result<Vec<u8>, PedalError>;
    /// Human-readable identifier for log lines
    fn name(&self) -> &str;
}

// ── Serial port source ────────────────────────────────────────────────────────
pub struct SerialSource {
    port: Box<dyn SerialPort>,
    name: String,
}

impl SerialSource {
    /// Open `port_path` (e.g. "/dev/ttyUSB0" or "COM3") at `baud_rate`.
    pub fn open(port_path: &str, baud_rate: u32) -> Result<Self, PedalError> {
        let port = serialport::new(port_path, baud_rate)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|source| PedalError::Open { port: port_path.to_string(), source })?;
        log::info!("[serial] Opened {} at {} baud", port_path, baud_rate);
        Ok(Self { port, name: port_path.to_string() })
    }
}

impl ByteSource for SerialSource {
    fn available(&mut self) -> Result<usize, PedalError> {
        Ok(self.port.bytes_to_read()? as usize)
    }

    fn read(&mut self, max: usize) -> Result<Vec<u8>, PedalError> {
        let mut buf = vec![0u8; max];
        match self.port.read(&mut buf) {
            Ok(n) => {
                buf.truncate(n);
                Ok(buf)
            }
            Err(ref e) if e.kind() == ErrorKind::TimedOut => Ok(Vec::new()),
            Err(e) => Err(PedalError::TransportRead(e)),
        }
    }

    fn name(&self) -> &str { &self.name }
}

// ── Port listing ──────────────────────────────────────────────────────────────
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PortInfo {
    /// Path handed to `SerialSource::open`
    pub device:      String,
    pub description: String,
}

impl PortInfo {
    /// "<description> (<device>)"
    pub fn label(&self) -> String { format!("{} ({})", self.description, self.device) }
}

/// Serial ports currently present on the system.
pub fn list_ports() -> Vec<PortInfo> {
    match serialport::available_ports() {
        Ok(ports) => ports.into_iter()
            .map(|p| PortInfo { description: describe(&p.port_type), device: p.port_name })
            .collect(),
        Err(e) => {
            log::warn!("[serial] Port enumeration failed: {e}");
            Vec::new()
        }
    }
}

fn describe(kind: &SerialPortType) -> String {
    match kind {
        SerialPortType::UsbPort(info) => match (&info.manufacturer, &info.product) {
            (_, Some(product)) => product.clone(),
            (Some(maker), None) => format!("{maker} USB serial"),
            (None, None) => format!("USB serial {:04x}:{:04x}", info.vid, info.pid),
        },
        SerialPortType::PciPort          => "PCI serial".into(),
        SerialPortType::BluetoothPort    => "Bluetooth serial".into(),
        SerialPortType::Unknown          => "Serial port".into(),
    }
}
