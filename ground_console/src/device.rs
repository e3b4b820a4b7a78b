//! Serial connection to the ground relay.

use std::io::{Read, Write};
use std::time::{Duration, Instant};

use anyhow::Result;
use serialport::SerialPort;

use picofly_link::protocol::{ControlUpdate, FrameAccumulator};

/// Find the relay by scanning CDC-ACM and USB-serial devices.
/// The relay never answers on its own, so the first candidate wins.
pub fn find_relay_port() -> Result<String> {
    let ports = serialport::available_ports()?;
    let candidate = ports
        .into_iter()
        .map(|info| info.port_name)
        .find(|name| name.contains("ttyACM") || name.contains("ttyUSB"));

    match candidate {
        Some(port) => Ok(port),
        None => anyhow::bail!("No relay port found - ensure the ground station is connected"),
    }
}

/// Resolve a port argument - returns the port path if not "auto", otherwise auto-detects.
pub fn resolve_port(port_arg: &str) -> Result<String> {
    if port_arg == "auto" {
        find_relay_port()
    } else {
        Ok(port_arg.to_string())
    }
}

/// Client for the ground relay's serial link.
pub struct RelayClient {
    port: Box<dyn SerialPort>,
    accumulator: FrameAccumulator,
}

impl RelayClient {
    /// Open the relay's serial port.
    pub fn new(port_name: &str, baud_rate: u32) -> Result<Self> {
        let port = serialport::new(port_name, baud_rate)
            .timeout(Duration::from_millis(100))
            .open()?;

        Ok(Self {
            port,
            accumulator: FrameAccumulator::new(),
        })
    }

    /// Drain all pending data from the serial port.
    /// Boot output and half-sent frames are discarded.
    pub fn drain_buffer(&mut self) -> Result<()> {
        self.port.clear(serialport::ClearBuffer::All)?;

        let mut buf = [0u8; 256];
        loop {
            match self.port.read(&mut buf) {
                Ok(0) => break,
                Ok(_) => continue,
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => break,
                Err(e) => return Err(e.into()),
            }
        }

        self.accumulator.reset();
        Ok(())
    }

    /// Queue a control update for transmission to the aircraft.
    pub fn send_control(&mut self, update: &ControlUpdate) -> Result<()> {
        let frame = update.encode();
        self.port.write_all(&frame)?;
        self.port.flush()?;
        Ok(())
    }

    /// Read the next complete frame.
    /// Returns None if nothing complete arrived within `timeout`.
    pub fn read_frame(&mut self, timeout: Duration) -> Result<Option<Vec<u8>>> {
        let mut buf = [0u8; 1];
        let start = Instant::now();

        while start.elapsed() < timeout {
            match self.port.read(&mut buf) {
                Ok(1) => {
                    if let Some(frame) = self.accumulator.push(buf[0]) {
                        return Ok(Some(frame.to_vec()));
                    }
                }
                Ok(_) => {}
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => continue,
                Err(e) => return Err(e.into()),
            }
        }

        Ok(None)
    }
}
