use super::Adapter;
use crate::error::{PumpError, PumpResult};
use serialport::SerialPort;
use std::io::{Read, Write};
use std::time::{Duration, Instant};
use tracing::{debug, trace};

/// Internal poll interval of the OS-level port read.
const PORT_POLL_TIMEOUT: Duration = Duration::from_millis(100);

/// Serial adapter for RS-232 / USB-CDC communication
///
/// This adapter wraps the serialport crate. Reads are performed one byte at a time
/// against a short port timeout and an overall deadline, so a silent device surfaces
/// as [`PumpError::Timeout`] instead of blocking forever.
pub struct SerialAdapter {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,

    /// Read timeout
    timeout: Duration,

    /// The open port, `None` once disconnected
    port: Option<Box<dyn SerialPort>>,
}

impl SerialAdapter {
    /// Open a serial port (8 data bits, no parity, one stop bit, no flow control).
    ///
    /// # Arguments
    /// * `port_name` - Serial port path (e.g., "/dev/ttyUSB0", "COM3")
    /// * `baud_rate` - Communication speed (the pump ships at 115200)
    /// * `timeout` - Read timeout applied to every reply byte
    pub fn open(port_name: &str, baud_rate: u32, timeout: Duration) -> PumpResult<Self> {
        let port = serialport::new(port_name, baud_rate)
            .data_bits(serialport::DataBits::Eight)
            .parity(serialport::Parity::None)
            .stop_bits(serialport::StopBits::One)
            .flow_control(serialport::FlowControl::None)
            .timeout(PORT_POLL_TIMEOUT)
            .open()
            .map_err(|e| {
                PumpError::Serial(serialport::Error::new(
                    e.kind(),
                    format!(
                        "Failed to open serial port '{}' at {} baud: {}",
                        port_name, baud_rate, e.description
                    ),
                ))
            })?;

        // Stale bytes from a previous session would be read as a reply.
        port.clear(serialport::ClearBuffer::All)?;

        debug!("Serial port '{}' opened at {} baud", port_name, baud_rate);

        Ok(Self {
            port_name: port_name.to_string(),
            timeout,
            port: Some(port),
        })
    }

    fn port(&mut self) -> PumpResult<&mut Box<dyn SerialPort>> {
        self.port.as_mut().ok_or(PumpError::NotConnected)
    }
}

impl Adapter for SerialAdapter {
    fn name(&self) -> &str {
        "serial"
    }

    fn write(&mut self, bytes: &[u8]) -> PumpResult<()> {
        let port = self.port()?;
        port.write_all(bytes)?;
        port.flush()?;
        trace!("Wrote {} bytes to serial port", bytes.len());
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> PumpResult<u8> {
        let port = self.port()?;
        let mut buffer = [0u8; 1];
        let start = Instant::now();

        loop {
            if start.elapsed() > timeout {
                return Err(PumpError::Timeout(timeout));
            }

            match port.read(&mut buffer) {
                Ok(1) => return Ok(buffer[0]),
                Ok(0) => {
                    // EOF - shouldn't happen with serial ports
                    return Err(PumpError::UnexpectedResponse(
                        "Unexpected EOF from serial port".to_string(),
                    ));
                }
                Err(e) if e.kind() == std::io::ErrorKind::TimedOut => {
                    // Port timeout is shorter than our overall timeout
                    continue;
                }
                Err(e) => return Err(PumpError::Io(e)),
                Ok(_) => continue,
            }
        }
    }

    fn bytes_to_read(&mut self) -> PumpResult<usize> {
        Ok(self.port()?.bytes_to_read()? as usize)
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn disconnect(&mut self) -> PumpResult<()> {
        if self.port.take().is_some() {
            debug!("Serial port '{}' closed", self.port_name);
        }
        Ok(())
    }
}
