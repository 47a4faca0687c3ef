//! End-of-reply detection by counting read timeouts.
//!
//! Replies carry no length and no terminator. A reply is taken to be complete
//! once more than `threshold` reads in a row have timed out; any line that
//! arrives in between resets the count. A device that keeps producing at least
//! one line per `threshold` timeouts is therefore never cut off.

/// Default number of consecutive timeouts tolerated before a reply is complete.
pub const DEFAULT_TIMEOUT_THRESHOLD: u32 = 4;

/// Collector state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CollectState {
    /// Still waiting for more lines.
    Collecting,
    /// The channel went quiet; the reply is final.
    Complete,
}

/// Accumulates reply lines until the channel goes quiet.
#[derive(Debug, Clone)]
pub struct ReplyCollector {
    threshold: u32,
    consecutive_timeouts: u32,
    lines: usize,
    text: String,
    state: CollectState,
}

impl ReplyCollector {
    /// New collector completing after more than `threshold` consecutive timeouts.
    pub fn new(threshold: u32) -> Self {
        Self {
            threshold,
            consecutive_timeouts: 0,
            lines: 0,
            text: String::new(),
            state: CollectState::Collecting,
        }
    }

    /// Record a received line. Ignored once complete.
    pub fn on_line(&mut self, line: &str) -> CollectState {
        if self.state == CollectState::Collecting {
            self.consecutive_timeouts = 0;
            self.lines += 1;
            self.text.push_str(line);
            self.text.push('\n');
        }
        self.state
    }

    /// Record a read timeout.
    pub fn on_timeout(&mut self) -> CollectState {
        if self.state == CollectState::Collecting {
            self.consecutive_timeouts += 1;
            if self.consecutive_timeouts > self.threshold {
                self.state = CollectState::Complete;
            }
        }
        self.state
    }

    /// Current state.
    pub fn state(&self) -> CollectState {
        self.state
    }

    /// True once the reply is final.
    pub fn is_complete(&self) -> bool {
        self.state == CollectState::Complete
    }

    /// Timeouts seen since the last line.
    pub fn consecutive_timeouts(&self) -> u32 {
        self.consecutive_timeouts
    }

    /// Lines collected so far.
    pub fn line_count(&self) -> usize {
        self.lines
    }

    /// Text collected so far, one `\n` after every line.
    pub fn text(&self) -> &str {
        &self.text
    }

    /// Consume the collector and return the text.
    pub fn into_text(self) -> String {
        self.text
    }
}

impl Default for ReplyCollector {
    fn default() -> Self {
        Self::new(DEFAULT_TIMEOUT_THRESHOLD)
    }
}
