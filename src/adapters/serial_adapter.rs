//! RS-232 channel for 5071A-class instruments.
//!
//! Line settings are fixed by the instrument: 9600 baud, 8 data bits, no
//! parity, 1 stop bit, no handshake. Only the port path and the read timeout
//! vary per installation.

use super::{ChannelOpener, LineChannel, LineRead};
use crate::error::AppResult;
use std::io;
use std::time::Duration;

#[cfg(feature = "instrument_serial")]
use serialport::{ClearBuffer, DataBits, FlowControl, Parity, SerialPort, StopBits};
use std::io::Read;
#[cfg(feature = "instrument_serial")]
use std::io::Write;
#[cfg(feature = "instrument_serial")]
use tracing::debug;

/// Fixed line speed of the instrument's RS-232 port.
pub const BAUD_RATE: u32 = 9600;

/// Default per-read timeout.
pub const DEFAULT_READ_TIMEOUT: Duration = Duration::from_millis(1000);

/// Upper bound on a line without terminator before it is handed out as-is.
pub const MAX_LINE_BYTES: usize = 4096;

/// Reassembles text lines from raw serial chunks.
///
/// Bytes are kept until a `\n` arrives, so a line split across several reads
/// (or across a read timeout) comes out whole. Trailing `\r` and `\n` are
/// stripped and invalid UTF-8 is replaced.
#[derive(Debug, Clone, Default)]
pub struct LineBuffer {
    pending: Vec<u8>,
}

impl LineBuffer {
    /// Empty buffer.
    pub fn new() -> Self {
        Self::default()
    }

    /// Append received bytes.
    pub fn push(&mut self, bytes: &[u8]) {
        self.pending.extend_from_slice(bytes);
    }

    /// Next complete line, or the first [`MAX_LINE_BYTES`] of an over-long one.
    pub fn take_line(&mut self) -> Option<String> {
        let end = match self.pending.iter().position(|&b| b == b'\n') {
            Some(pos) => pos + 1,
            None if self.pending.len() >= MAX_LINE_BYTES => MAX_LINE_BYTES,
            None => return None,
        };
        Some(strip_line_end(self.pending.drain(..end).collect()))
    }

    /// Whatever is left after the last line ending, if anything.
    pub fn take_rest(&mut self) -> Option<String> {
        let rest = strip_line_end(std::mem::take(&mut self.pending));
        if rest.is_empty() {
            None
        } else {
            Some(rest)
        }
    }

    /// Drop all buffered bytes.
    pub fn clear(&mut self) {
        self.pending.clear();
    }

    /// True when nothing is buffered.
    pub fn is_empty(&self) -> bool {
        self.pending.is_empty()
    }

    /// Read from `reader` until a line is complete or a read times out.
    ///
    /// A timeout, including a zero-byte read, leaves any partial line
    /// buffered for the next call.
    pub fn read_from<R: Read + ?Sized>(&mut self, reader: &mut R) -> io::Result<LineRead> {
        let mut chunk = [0u8; 256];
        loop {
            if let Some(line) = self.take_line() {
                return Ok(LineRead::Line(line));
            }
            match reader.read(&mut chunk) {
                // Some drivers report an expired timeout as an empty read.
                Ok(0) => return Ok(LineRead::TimedOut),
                Ok(n) => self.push(&chunk[..n]),
                Err(e) if e.kind() == io::ErrorKind::TimedOut => return Ok(LineRead::TimedOut),
                Err(e) if e.kind() == io::ErrorKind::Interrupted => continue,
                Err(e) => return Err(e),
            }
        }
    }
}

fn strip_line_end(mut line: Vec<u8>) -> String {
    while matches!(line.last(), Some(&b'\n') | Some(&b'\r')) {
        line.pop();
    }
    String::from_utf8_lossy(&line).into_owned()
}

/// Opens [`SerialChannel`]s on a named port.
#[derive(Debug, Clone)]
pub struct SerialOpener {
    /// Port name (e.g., "/dev/ttyUSB0", "COM3")
    port_name: String,

    /// Read and write timeout of the port
    timeout: Duration,
}

impl SerialOpener {
    /// Create an opener for `port_name` with the default timeout.
    pub fn new(port_name: impl Into<String>) -> Self {
        Self {
            port_name: port_name.into().trim().to_string(),
            timeout: DEFAULT_READ_TIMEOUT,
        }
    }

    /// Set the per-read timeout. One timeout is one "tick" of the transport's
    /// end-of-reply counter.
    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Configured timeout.
    pub fn timeout(&self) -> Duration {
        self.timeout
    }
}

impl ChannelOpener for SerialOpener {
    type Channel = SerialChannel;

    #[cfg(feature = "instrument_serial")]
    fn open(&mut self) -> AppResult<SerialChannel> {
        let mut port = serialport::new(&self.port_name, BAUD_RATE)
            .data_bits(DataBits::Eight)
            .parity(Parity::None)
            .stop_bits(StopBits::One)
            .flow_control(FlowControl::None)
            .timeout(self.timeout)
            .open()?;
        port.write_request_to_send(true)?;

        debug!(port = %self.port_name, baud = BAUD_RATE, "Serial port opened");
        Ok(SerialChannel {
            port,
            buffer: LineBuffer::new(),
        })
    }

    #[cfg(not(feature = "instrument_serial"))]
    fn open(&mut self) -> AppResult<SerialChannel> {
        Err(crate::error::DaqError::SerialFeatureDisabled)
    }

    fn describe(&self) -> &str {
        &self.port_name
    }
}

/// Open serial connection with a line reassembly buffer.
#[cfg(feature = "instrument_serial")]
pub struct SerialChannel {
    port: Box<dyn SerialPort>,
    buffer: LineBuffer,
}

#[cfg(feature = "instrument_serial")]
impl LineChannel for SerialChannel {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.buffer.clear();
        self.port.clear(ClearBuffer::All)?;
        Ok(())
    }

    fn send(&mut self, text: &str) -> io::Result<()> {
        self.port.write_all(text.as_bytes())?;
        self.port.flush()
    }

    fn read_line(&mut self) -> io::Result<LineRead> {
        self.buffer.read_from(&mut self.port)
    }

    fn take_partial(&mut self) -> Option<String> {
        self.buffer.take_rest()
    }
}

/// Uninhabited stand-in when serial support is compiled out.
#[cfg(not(feature = "instrument_serial"))]
pub enum SerialChannel {}

#[cfg(not(feature = "instrument_serial"))]
impl LineChannel for SerialChannel {
    fn discard_buffers(&mut self) -> io::Result<()> {
        match *self {}
    }

    fn send(&mut self, _text: &str) -> io::Result<()> {
        match *self {}
    }

    fn read_line(&mut self) -> io::Result<LineRead> {
        match *self {}
    }
}
