//! Serial port backend for the transport

use std::io::{self, Read, Write};
use std::time::Duration;

use anyhow::Result;
use serialport::SerialPort;

use super::{Connector, SerialLink};

pub struct SerialPortConnector {
    port: String,
    baud_rate: u32,
    read_timeout: Duration,
}

impl SerialPortConnector {
    pub fn new(port: impl Into<String>, baud_rate: u32, read_timeout: Duration) -> Self {
        Self {
            port: port.into(),
            baud_rate,
            read_timeout,
        }
    }
}

impl Connector for SerialPortConnector {
    fn describe(&self) -> String {
        format!("{} @ {} baud", self.port, self.baud_rate)
    }

    fn open(&mut self) -> io::Result<Box<dyn SerialLink>> {
        let port = serialport::new(&self.port, self.baud_rate)
            .timeout(self.read_timeout)
            .open()?;
        Ok(Box::new(SerialPortLink { port }))
    }
}

struct SerialPortLink {
    port: Box<dyn SerialPort>,
}

impl SerialLink for SerialPortLink {
    fn write_frame(&mut self, bytes: &[u8]) -> io::Result<()> {
        self.port.write_all(bytes)?;
        self.port.flush()
    }

    fn read_available(&mut self, buf: &mut Vec<u8>) -> io::Result<usize> {
        let pending = self.port.bytes_to_read()? as usize;
        if pending == 0 {
            return Ok(0);
        }
        let start = buf.len();
        buf.resize(start + pending, 0);
        match self.port.read(&mut buf[start..]) {
            Ok(n) => {
                buf.truncate(start + n);
                Ok(n)
            }
            Err(e) if e.kind() == io::ErrorKind::TimedOut => {
                buf.truncate(start);
                Ok(0)
            }
            Err(e) => {
                buf.truncate(start);
                Err(e)
            }
        }
    }
}

/// A serial port visible to the OS
#[derive(Debug, Clone)]
pub struct PortListing {
    pub name: String,
    pub kind: String,
}

pub fn list_ports() -> Result<Vec<PortListing>> {
    let ports = serialport::available_ports()?;
    Ok(ports
        .into_iter()
        .map(|p| {
            let kind = match p.port_type {
                serialport::SerialPortType::UsbPort(info) => format!(
                    "USB {:04x}:{:04x} {}",
                    info.vid,
                    info.pid,
                    info.product.unwrap_or_default()
                ),
                serialport::SerialPortType::PciPort => "PCI".to_string(),
                serialport::SerialPortType::BluetoothPort => "Bluetooth".to_string(),
                serialport::SerialPortType::Unknown => "unknown".to_string(),
            };
            PortListing {
                name: p.port_name,
                kind,
            }
        })
        .collect())
}
