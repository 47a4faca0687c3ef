//! Request/response exchange over a timeout-prone line channel.
//!
//! [`Transport`] owns at most one open channel to one instrument and turns it
//! into a synchronous "send a command, get the whole reply" call:
//!
//! ```text
//!   Closed --open ok--> Open --I/O error--> Closed
//!     ^  |                |
//!     +--+ open failed    +-- exchange(cmd): discard, send, collect until quiet
//! ```
//!
//! Nothing here is fatal. A port that cannot be opened yields an empty reply
//! and is retried on the next call; a port that fails mid-reply is dropped and
//! the partial text is returned.
//!
//! # Example
//!
//! ```
//! use cs_daq::adapters::{ScriptStep, ScriptedOpener};
//! use cs_daq::transport::Transport;
//!
//! let opener = ScriptedOpener::new("mock").with_session(vec![
//!     ScriptStep::line("MJD 60123 14:05:33"),
//!     ScriptStep::line("CBT ID: CBT047"),
//! ]);
//! let mut transport = Transport::new(opener);
//! let reply = transport.exchange("SYSTEM:PRINT?");
//! assert_eq!(reply, "MJD 60123 14:05:33\nCBT ID: CBT047\n");
//! ```

pub mod collector;

pub use collector::{CollectState, ReplyCollector, DEFAULT_TIMEOUT_THRESHOLD};

use crate::adapters::{ChannelOpener, LineChannel, LineRead};
use crate::report::parse_identification;
use std::io;
use tracing::{debug, info, warn};

/// Identification query.
pub const IDENTIFY_COMMAND: &str = "*IDN?";

/// Default command terminator.
pub const DEFAULT_LINE_TERMINATOR: &str = "\n";

/// Connection state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TransportState {
    /// No open channel.
    Closed,
    /// Channel open and usable.
    Open,
}

/// Resilient request/response transport for one instrument.
pub struct Transport<O: ChannelOpener> {
    opener: O,
    channel: Option<O::Channel>,
    timeout_threshold: u32,
    line_terminator: String,
}

impl<O: ChannelOpener> Transport<O> {
    /// Closed transport with default threshold and terminator.
    pub fn new(opener: O) -> Self {
        Self {
            opener,
            channel: None,
            timeout_threshold: DEFAULT_TIMEOUT_THRESHOLD,
            line_terminator: DEFAULT_LINE_TERMINATOR.to_string(),
        }
    }

    /// Number of consecutive read timeouts tolerated before a reply counts as complete.
    pub fn with_timeout_threshold(mut self, threshold: u32) -> Self {
        self.timeout_threshold = threshold;
        self
    }

    /// Terminator appended to every command.
    pub fn with_line_terminator(mut self, terminator: impl Into<String>) -> Self {
        self.line_terminator = terminator.into();
        self
    }

    /// Current connection state.
    pub fn state(&self) -> TransportState {
        if self.channel.is_some() {
            TransportState::Open
        } else {
            TransportState::Closed
        }
    }

    /// Endpoint name, for logs.
    pub fn endpoint(&self) -> &str {
        self.opener.describe()
    }

    /// Open the channel if it is not open yet. Returns whether it is open.
    ///
    /// Failure is logged and otherwise ignored; the next call tries again.
    pub fn open(&mut self) -> bool {
        if self.channel.is_some() {
            return true;
        }
        match self.opener.open() {
            Ok(channel) => {
                info!(port = %self.opener.describe(), "Connection opened");
                self.channel = Some(channel);
                true
            }
            Err(e) => {
                warn!(
                    port = %self.opener.describe(),
                    error = %e,
                    "Can't open port, will keep trying"
                );
                false
            }
        }
    }

    /// Drop the channel, if any.
    pub fn close(&mut self) {
        if self.channel.take().is_some() {
            debug!(port = %self.opener.describe(), "Connection closed");
        }
    }

    /// Send `command` and return everything received until the channel goes
    /// quiet.
    ///
    /// Returns an empty string if the channel cannot be opened. On an I/O
    /// error the channel is closed and whatever arrived before the error is
    /// returned.
    pub fn exchange(&mut self, command: &str) -> String {
        if !self.open() {
            return String::new();
        }
        let Some(channel) = self.channel.as_mut() else {
            return String::new();
        };

        let request = format!("{}{}", command, self.line_terminator);
        let (reply, failure) = transact(channel, &request, self.timeout_threshold);

        if let Some(e) = failure {
            warn!(
                port = %self.opener.describe(),
                command,
                error = %e,
                "Serial I/O failed, closing connection"
            );
            self.close();
        }
        reply
    }

    /// Query the device identification. `None` when nothing usable came back.
    pub fn identify(&mut self) -> Option<String> {
        let reply = self.exchange(IDENTIFY_COMMAND);
        parse_identification(&reply, IDENTIFY_COMMAND)
    }
}

/// One request/response cycle on an open channel.
///
/// A last line without a line ending is appended to the reply once the
/// channel goes quiet. Returns the collected text and the I/O error that
/// ended it early, if any.
fn transact<C: LineChannel>(
    channel: &mut C,
    request: &str,
    threshold: u32,
) -> (String, Option<io::Error>) {
    if let Err(e) = channel.discard_buffers() {
        return (String::new(), Some(e));
    }
    if let Err(e) = channel.send(request) {
        return (String::new(), Some(e));
    }
    debug!(command = %request.trim_end(), "Sent command");

    let mut collector = ReplyCollector::new(threshold);
    while !collector.is_complete() {
        match channel.read_line() {
            Ok(LineRead::Line(line)) => {
                debug!(line = %line, "Received line");
                collector.on_line(&line);
            }
            Ok(LineRead::TimedOut) => {
                collector.on_timeout();
            }
            Err(e) => return (collector.into_text(), Some(e)),
        }
    }
    debug!(lines = collector.line_count(), "Reply complete");
    let mut text = collector.into_text();
    if let Some(tail) = channel.take_partial() {
        debug!(tail = %tail, "Keeping unterminated last line");
        text.push_str(&tail);
        text.push('\n');
    }
    (text, None)
}
