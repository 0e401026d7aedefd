//! Serial transport seam.
//!
//! The bridge connection talks to a byte-level trait so tests can run
//! against a scripted in-memory port; production uses the `serialport`
//! crate.

use crate::{CoreError, CoreResult};

use std::{io, panic::Location, time::Duration};

use error_location::ErrorLocation;
use tracing::{debug, instrument};

/// Read timeout of the underlying port. This is also the cadence at which
/// the I/O thread notices cancellation and new requests.
pub const READ_TIMEOUT: Duration = Duration::from_millis(50);

/// Default baud rate for the hardware actuator link.
pub const DEFAULT_BAUD: u32 = 115_200;

/// An open serial byte stream.
///
/// `read` honors the transport's read timeout and reports it as
/// [`io::ErrorKind::TimedOut`]; a zero-byte read means the peer hung up.
pub trait SerialIo: Send {
    /// Write the whole buffer.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error.
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()>;

    /// Read up to `buf.len()` bytes, bounded by the read timeout.
    ///
    /// # Errors
    ///
    /// Propagates the underlying I/O error, including `TimedOut`.
    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize>;
}

/// Enumerates and opens serial ports.
pub trait SerialTransport: Send + Sync {
    /// Names of the serial ports currently available.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transport`] if enumeration fails.
    fn list_ports(&self) -> CoreResult<Vec<String>>;

    /// Open a port at the given baud rate.
    ///
    /// # Errors
    ///
    /// Returns [`CoreError::Transport`] if the port cannot be opened.
    fn open(&self, port: &str, baud: u32) -> CoreResult<Box<dyn SerialIo>>;
}

/// Production transport over the `serialport` crate.
#[derive(Debug, Default, Clone, Copy)]
pub struct SystemSerial;

impl SystemSerial {
    /// Create the system transport.
    #[must_use]
    pub fn new() -> Self {
        Self
    }
}

impl SerialTransport for SystemSerial {
    #[instrument(skip(self))]
    fn list_ports(&self) -> CoreResult<Vec<String>> {
        let ports = serialport::available_ports().map_err(|e| CoreError::Transport {
            reason: format!("Failed to enumerate serial ports: {e}"),
            location: ErrorLocation::from(Location::caller()),
        })?;
        let names: Vec<String> = ports.into_iter().map(|p| p.port_name).collect();
        debug!(count = names.len(), "Enumerated serial ports");
        Ok(names)
    }

    #[instrument(skip(self))]
    fn open(&self, port: &str, baud: u32) -> CoreResult<Box<dyn SerialIo>> {
        let port = serialport::new(port, baud)
            .timeout(READ_TIMEOUT)
            .open()
            .map_err(|e| CoreError::Transport {
                reason: format!("Failed to open serial port: {e}"),
                location: ErrorLocation::from(Location::caller()),
            })?;
        Ok(Box::new(SystemSerialIo { port }))
    }
}

struct SystemSerialIo {
    port: Box<dyn serialport::SerialPort>,
}

impl SerialIo for SystemSerialIo {
    fn write_all(&mut self, buf: &[u8]) -> io::Result<()> {
        io::Write::write_all(&mut self.port, buf)
    }

    fn read(&mut self, buf: &mut [u8]) -> io::Result<usize> {
        io::Read::read(&mut self.port, buf)
    }
}
