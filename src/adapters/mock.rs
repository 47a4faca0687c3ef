//! Scripted channel for testing the transport without hardware.
//!
//! A [`ScriptedChannel`] plays back a list of [`ScriptStep`]s, one per
//! `read_line` call, and reports a timeout forever once the script runs out.
//! A [`ScriptedOpener`] hands out one channel per successful open and can be
//! told to fail, or to make every read take a fixed time. Everything the
//! transport does is recorded in a shared [`MockHandle`] for verification.

use super::{ChannelOpener, LineChannel, LineRead};
use crate::error::{AppResult, DaqError};
use std::collections::VecDeque;
use std::io;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

/// One scripted reaction to a `read_line` call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ScriptStep {
    /// Deliver this line.
    Line(String),
    /// Report a read timeout.
    Timeout,
    /// Buffer this text without a line ending, then report a read timeout.
    Partial(String),
    /// Fail with an I/O error of this kind.
    Fail(io::ErrorKind),
}

impl ScriptStep {
    /// Shorthand for [`ScriptStep::Line`].
    pub fn line(text: &str) -> Self {
        ScriptStep::Line(text.to_string())
    }
}

#[derive(Debug, Default)]
struct MockLog {
    open_attempts: usize,
    sent: Vec<String>,
    discards: usize,
    reads: usize,
}

/// Shared view of everything the mock saw.
#[derive(Debug, Clone, Default)]
pub struct MockHandle {
    log: Arc<Mutex<MockLog>>,
}

impl MockHandle {
    fn lock(&self) -> MutexGuard<'_, MockLog> {
        self.log.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Number of open attempts, successful or not.
    pub fn open_attempts(&self) -> usize {
        self.lock().open_attempts
    }

    /// Every string written to any channel, in order.
    pub fn sent(&self) -> Vec<String> {
        self.lock().sent.clone()
    }

    /// Number of buffer discards.
    pub fn discards(&self) -> usize {
        self.lock().discards
    }

    /// Number of `read_line` calls.
    pub fn reads(&self) -> usize {
        self.lock().reads
    }
}

/// Channel that replays a script.
#[derive(Debug)]
pub struct ScriptedChannel {
    steps: VecDeque<ScriptStep>,
    handle: MockHandle,
    partial: String,
    read_delay: Option<Duration>,
}

impl ScriptedChannel {
    /// Channel playing `steps`, recording into `handle`.
    pub fn new(steps: impl IntoIterator<Item = ScriptStep>, handle: MockHandle) -> Self {
        Self {
            steps: steps.into_iter().collect(),
            handle,
            partial: String::new(),
            read_delay: None,
        }
    }

    /// Make every `read_line` call block for `delay` first.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }
}

impl LineChannel for ScriptedChannel {
    fn discard_buffers(&mut self) -> io::Result<()> {
        self.handle.lock().discards += 1;
        self.partial.clear();
        Ok(())
    }

    fn send(&mut self, text: &str) -> io::Result<()> {
        self.handle.lock().sent.push(text.to_string());
        Ok(())
    }

    fn read_line(&mut self) -> io::Result<LineRead> {
        if let Some(delay) = self.read_delay {
            std::thread::sleep(delay);
        }
        self.handle.lock().reads += 1;
        match self.steps.pop_front() {
            Some(ScriptStep::Line(line)) => {
                let mut text = std::mem::take(&mut self.partial);
                text.push_str(&line);
                Ok(LineRead::Line(text))
            }
            Some(ScriptStep::Partial(text)) => {
                self.partial.push_str(&text);
                Ok(LineRead::TimedOut)
            }
            Some(ScriptStep::Timeout) | None => Ok(LineRead::TimedOut),
            Some(ScriptStep::Fail(kind)) => Err(io::Error::new(kind, "scripted failure")),
        }
    }

    fn take_partial(&mut self) -> Option<String> {
        if self.partial.is_empty() {
            None
        } else {
            Some(std::mem::take(&mut self.partial))
        }
    }
}

/// Opener handing out scripted channels.
///
/// Each queued entry is consumed by one open attempt: `None` makes that
/// attempt fail, `Some(script)` opens a channel playing `script`. Once the
/// queue is empty every attempt fails.
#[derive(Debug)]
pub struct ScriptedOpener {
    name: String,
    opens: VecDeque<Option<Vec<ScriptStep>>>,
    handle: MockHandle,
    read_delay: Option<Duration>,
}

impl ScriptedOpener {
    /// Empty opener; every open fails until scripts are queued.
    pub fn new(name: &str) -> Self {
        Self {
            name: name.to_string(),
            opens: VecDeque::new(),
            handle: MockHandle::default(),
            read_delay: None,
        }
    }

    /// Every channel opened from now on blocks for `delay` on each read.
    pub fn with_read_delay(mut self, delay: Duration) -> Self {
        self.read_delay = Some(delay);
        self
    }

    /// Queue a successful open that plays `script`.
    pub fn with_session(mut self, script: Vec<ScriptStep>) -> Self {
        self.opens.push_back(Some(script));
        self
    }

    /// Queue a failing open.
    pub fn with_failed_open(mut self) -> Self {
        self.opens.push_back(None);
        self
    }

    /// Handle for inspecting recorded activity.
    pub fn handle(&self) -> MockHandle {
        self.handle.clone()
    }
}

impl ChannelOpener for ScriptedOpener {
    type Channel = ScriptedChannel;

    fn open(&mut self) -> AppResult<ScriptedChannel> {
        self.handle.lock().open_attempts += 1;
        match self.opens.pop_front().flatten() {
            Some(script) => {
                let channel = ScriptedChannel::new(script, self.handle.clone());
                Ok(match self.read_delay {
                    Some(delay) => channel.with_read_delay(delay),
                    None => channel,
                })
            }
            None => Err(DaqError::Io(io::Error::new(
                io::ErrorKind::NotFound,
                format!("mock port '{}' unavailable", self.name),
            ))),
        }
    }

    fn describe(&self) -> &str {
        &self.name
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_script_runs_out_into_timeouts() {
        let handle = MockHandle::default();
        let mut channel = ScriptedChannel::new(vec![ScriptStep::line("a")], handle.clone());
        assert_eq!(channel.read_line().unwrap(), LineRead::Line("a".into()));
        assert_eq!(channel.read_line().unwrap(), LineRead::TimedOut);
        assert_eq!(channel.read_line().unwrap(), LineRead::TimedOut);
        assert_eq!(handle.reads(), 3);
    }

    #[test]
    fn test_opener_sequence() {
        let mut opener = ScriptedOpener::new("mock0")
            .with_failed_open()
            .with_session(vec![]);
        assert!(opener.open().is_err());
        assert!(opener.open().is_ok());
        assert!(opener.open().is_err());
        assert_eq!(opener.handle().open_attempts(), 3);
    }

    #[test]
    fn test_partial_joins_next_line() {
        let mut channel = ScriptedChannel::new(
            vec![ScriptStep::Partial("CBT ".into()), ScriptStep::line("ID: 7")],
            MockHandle::default(),
        );
        assert_eq!(channel.read_line().unwrap(), LineRead::TimedOut);
        assert_eq!(channel.read_line().unwrap(), LineRead::Line("CBT ID: 7".into()));
        assert_eq!(channel.take_partial(), None);
    }

    #[test]
    fn test_scripted_failure() {
        let mut channel = ScriptedChannel::new(
            vec![ScriptStep::Fail(io::ErrorKind::BrokenPipe)],
            MockHandle::default(),
        );
        let err = channel.read_line().unwrap_err();
        assert_eq!(err.kind(), io::ErrorKind::BrokenPipe);
    }
}
