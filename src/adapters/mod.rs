//! Hardware adapter implementations
//!
//! This module contains implementations of the [`Adapter`] trait, the byte-level I/O
//! seam between the pump driver and whatever carries its bytes. The driver only ever
//! talks to an `Adapter`, so the same command/reply logic runs against a real serial
//! port or against the scripted [`MockAdapter`] used by the tests.

pub mod mock;
#[cfg(feature = "instrument_serial")]
pub mod serial_adapter;

pub use mock::MockAdapter;
#[cfg(feature = "instrument_serial")]
pub use serial_adapter::SerialAdapter;

use crate::error::PumpResult;
use std::time::Duration;

/// Blocking, byte-oriented transport to a single device.
///
/// Implementations are used strictly sequentially: one command is written, then its
/// reply is read back byte by byte before the next command goes out.
pub trait Adapter {
    /// Short adapter name used in log output.
    fn name(&self) -> &str;

    /// Write all bytes and flush.
    fn write(&mut self, bytes: &[u8]) -> PumpResult<()>;

    /// Read one byte, waiting at most `timeout`.
    ///
    /// Returns [`PumpError::Timeout`](crate::error::PumpError::Timeout) if nothing
    /// arrives in time.
    fn read_byte(&mut self, timeout: Duration) -> PumpResult<u8>;

    /// Number of bytes already received and waiting to be read.
    fn bytes_to_read(&mut self) -> PumpResult<usize>;

    /// Default read timeout configured for this adapter.
    fn timeout(&self) -> Duration;

    /// Release the underlying port. Further I/O fails with `NotConnected`.
    fn disconnect(&mut self) -> PumpResult<()>;
}

impl<T: Adapter + ?Sized> Adapter for Box<T> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn write(&mut self, bytes: &[u8]) -> PumpResult<()> {
        (**self).write(bytes)
    }

    fn read_byte(&mut self, timeout: Duration) -> PumpResult<u8> {
        (**self).read_byte(timeout)
    }

    fn bytes_to_read(&mut self) -> PumpResult<usize> {
        (**self).bytes_to_read()
    }

    fn timeout(&self) -> Duration {
        (**self).timeout()
    }

    fn disconnect(&mut self) -> PumpResult<()> {
        (**self).disconnect()
    }
}
