//! Line-oriented channel adapters
//!
//! The transport only needs three things from a connection: throw away
//! whatever is buffered, send a string, and try to read one line within the
//! port's read timeout. [`LineChannel`] captures exactly that, and
//! [`ChannelOpener`] knows how to (re)open one.
//!
//! - [`serial_adapter`]: RS-232 via the `serialport` crate.
//! - [`mock`]: scripted channel for tests and dry runs.

pub mod mock;
pub mod serial_adapter;

pub use mock::{MockHandle, ScriptStep, ScriptedChannel, ScriptedOpener};
pub use serial_adapter::{LineBuffer, SerialChannel, SerialOpener};

use crate::error::AppResult;
use std::io;

/// Outcome of one line read attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineRead {
    /// A complete line, without its terminator.
    Line(String),
    /// Nothing arrived within the read timeout.
    TimedOut,
}

/// An open, line-oriented connection to one instrument.
pub trait LineChannel: Send {
    /// Discard any buffered input and output.
    fn discard_buffers(&mut self) -> io::Result<()>;

    /// Write `text` verbatim and flush.
    fn send(&mut self, text: &str) -> io::Result<()>;

    /// Read one line, or report that the read timed out.
    ///
    /// Errors other than a timeout mean the connection is unusable.
    fn read_line(&mut self) -> io::Result<LineRead>;

    /// Text received after the last line ending, removed from the channel.
    ///
    /// Called once a reply is complete so that an unterminated last line is
    /// not lost to the next [`LineChannel::discard_buffers`].
    fn take_partial(&mut self) -> Option<String> {
        None
    }
}

/// Factory for a [`LineChannel`], called whenever the transport is closed.
pub trait ChannelOpener: Send {
    /// Channel type produced on success.
    type Channel: LineChannel;

    /// Attempt to open the channel.
    fn open(&mut self) -> AppResult<Self::Channel>;

    /// Human-readable endpoint name for logs (e.g. the port path).
    fn describe(&self) -> &str;
}
