//! Scripted adapter standing in for the pump.
//!
//! Each expected command is registered together with the bytes the device sends back.
//! Writes are checked against the script in order and recorded, so tests can assert both
//! what the driver sent and that nothing was sent at all.
//!
//! ```
//! use legato_daq::adapters::{Adapter, MockAdapter};
//!
//! let mut mock = MockAdapter::new().expect("force", "\r\n50%\r\n:");
//! mock.write(b"force\r").unwrap();
//! assert_eq!(mock.written(), ["force"]);
//! ```

use super::Adapter;
use crate::error::{PumpError, PumpResult};
use std::collections::VecDeque;
use std::time::Duration;
use tracing::trace;

#[derive(Debug)]
struct Exchange {
    command: String,
    reply: Vec<u8>,
    deferred: Option<Vec<u8>>,
}

/// In-memory adapter replaying a fixed command/reply script.
#[derive(Debug)]
pub struct MockAdapter {
    script: VecDeque<Exchange>,
    rx: VecDeque<u8>,
    deferred: VecDeque<Vec<u8>>,
    written: Vec<String>,
    connected: bool,
    timeout: Duration,
}

impl MockAdapter {
    /// Empty script; every read times out until something is expected.
    pub fn new() -> Self {
        Self {
            script: VecDeque::new(),
            rx: VecDeque::new(),
            deferred: VecDeque::new(),
            written: Vec::new(),
            connected: true,
            timeout: Duration::from_millis(10),
        }
    }

    /// Expect `command` (without terminator) and answer with `reply`.
    pub fn expect(mut self, command: &str, reply: &str) -> Self {
        self.push_expect(command, reply);
        self
    }

    /// Append an exchange to the script of an adapter already in use.
    pub fn push_expect(&mut self, command: &str, reply: &str) {
        self.script.push_back(Exchange {
            command: command.to_string(),
            reply: reply.as_bytes().to_vec(),
            deferred: None,
        });
    }

    /// Like [`expect`](Self::expect), with a second chunk that only arrives once the
    /// first has been fully read and the driver waits for more (e.g. `T*` at the end
    /// of a run).
    pub fn expect_then(mut self, command: &str, reply: &str, later: &str) -> Self {
        self.push_expect_then(command, reply, later);
        self
    }

    /// In-place form of [`expect_then`](Self::expect_then).
    pub fn push_expect_then(&mut self, command: &str, reply: &str, later: &str) {
        self.script.push_back(Exchange {
            command: command.to_string(),
            reply: reply.as_bytes().to_vec(),
            deferred: Some(later.as_bytes().to_vec()),
        });
    }

    /// Expect `command` and never answer it.
    pub fn expect_silence(self, command: &str) -> Self {
        self.expect(command, "")
    }

    /// Commands written so far, terminators stripped.
    pub fn written(&self) -> &[String] {
        &self.written
    }

    /// True once every scripted exchange has been consumed.
    pub fn is_exhausted(&self) -> bool {
        self.script.is_empty()
    }

    /// Whether `disconnect` has been called.
    pub fn is_connected(&self) -> bool {
        self.connected
    }
}

impl Default for MockAdapter {
    fn default() -> Self {
        Self::new()
    }
}

impl Adapter for MockAdapter {
    fn name(&self) -> &str {
        "mock"
    }

    fn write(&mut self, bytes: &[u8]) -> PumpResult<()> {
        if !self.connected {
            return Err(PumpError::NotConnected);
        }
        let command = String::from_utf8_lossy(bytes)
            .trim_end_matches(['\r', '\n'])
            .to_string();
        trace!("mock <- {:?}", command);
        self.written.push(command.clone());

        let exchange = self.script.pop_front().ok_or_else(|| {
            PumpError::Io(std::io::Error::other(format!(
                "mock: unscripted command '{}'",
                command
            )))
        })?;
        if exchange.command != command {
            return Err(PumpError::Io(std::io::Error::other(format!(
                "mock: expected '{}', got '{}'",
                exchange.command, command
            ))));
        }
        self.rx.extend(exchange.reply);
        if let Some(later) = exchange.deferred {
            self.deferred.push_back(later);
        }
        Ok(())
    }

    fn read_byte(&mut self, timeout: Duration) -> PumpResult<u8> {
        if !self.connected {
            return Err(PumpError::NotConnected);
        }
        if self.rx.is_empty() {
            if let Some(later) = self.deferred.pop_front() {
                self.rx.extend(later);
            }
        }
        self.rx.pop_front().ok_or(PumpError::Timeout(timeout))
    }

    fn bytes_to_read(&mut self) -> PumpResult<usize> {
        Ok(self.rx.len())
    }

    fn timeout(&self) -> Duration {
        self.timeout
    }

    fn disconnect(&mut self) -> PumpResult<()> {
        self.connected = false;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_replies_in_order() {
        let mut mock = MockAdapter::new()
            .expect("echo", "\r\nOFF\r\n:")
            .expect("poll", "\r\nOFF\r\n:");
        mock.write(b"echo\r").unwrap();
        assert_eq!(mock.bytes_to_read().unwrap(), 8);
        assert_eq!(mock.read_byte(mock.timeout()).unwrap(), b'\r');
        assert!(!mock.is_exhausted());
    }

    #[test]
    fn test_unexpected_command_is_rejected() {
        let mut mock = MockAdapter::new().expect("echo", "\r\nOFF\r\n:");
        assert!(mock.write(b"poll\r").is_err());
        assert_eq!(mock.written(), ["poll"]);
    }

    #[test]
    fn test_deferred_bytes_wait_for_drain() {
        let mut mock = MockAdapter::new().expect_then("run", ">", "T");
        mock.write(b"run\r").unwrap();
        assert_eq!(mock.bytes_to_read().unwrap(), 1);
        assert_eq!(mock.read_byte(mock.timeout()).unwrap(), b'>');
        assert_eq!(mock.bytes_to_read().unwrap(), 0);
        assert_eq!(mock.read_byte(mock.timeout()).unwrap(), b'T');
        assert!(matches!(
            mock.read_byte(mock.timeout()),
            Err(PumpError::Timeout(_))
        ));
    }

    #[test]
    fn test_disconnect() {
        let mut mock = MockAdapter::new();
        mock.disconnect().unwrap();
        assert!(!mock.is_connected());
        assert!(matches!(mock.write(b"x\r"), Err(PumpError::NotConnected)));
    }
}
