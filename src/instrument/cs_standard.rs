//! 5071A-class caesium frequency standard
//!
//! Ties one [`Transport`] to one [`CsvLogFile`]. The instrument is identified
//! once at startup and then polled with `SYSTEM:PRINT?` whenever the schedule
//! says so.
//!
//! ## Configuration
//!
//! ```toml
//! [[instruments]]
//! name = "CS1"
//! port = "/dev/ttyUSB0"
//! file_base_name = "cs1_log"
//! ```

use crate::adapters::{ChannelOpener, SerialOpener};
use crate::config::{InstrumentConfig, Settings};
use crate::data::CsvLogFile;
use crate::error::AppResult;
use crate::report::{Reading, ReportParser};
use crate::transport::Transport;
use chrono::{DateTime, Utc};
use std::fmt;
use tracing::{debug, info, warn};

/// Diagnostic report query.
pub const PRINT_COMMAND: &str = "SYSTEM:PRINT?";

/// Wall-clock source used to stamp readings.
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send>;

/// One polled frequency standard.
pub struct CsStandard<O: ChannelOpener = SerialOpener> {
    name: String,
    transport: Transport<O>,
    parser: ReportParser,
    log: CsvLogFile,
    device_id: Option<String>,
    clock: Clock,
}

impl CsStandard<SerialOpener> {
    /// Serial-backed instrument built from configuration.
    pub fn from_config(settings: &Settings, instrument: &InstrumentConfig) -> AppResult<Self> {
        let opener = SerialOpener::new(instrument.port.as_str())
            .with_timeout(settings.serial.read_timeout);
        let transport = Transport::new(opener)
            .with_timeout_threshold(settings.serial.timeout_threshold)
            .with_line_terminator(settings.serial.line_terminator.as_str());
        let log = CsvLogFile::new(settings.log_file_path(instrument), settings.csv_format()?);
        Ok(Self::new(instrument.name.trim(), transport, log))
    }
}

impl<O: ChannelOpener> CsStandard<O> {
    /// Instrument over `transport`, logging to `log`, with the stock schema.
    pub fn new(name: &str, transport: Transport<O>, log: CsvLogFile) -> Self {
        Self {
            name: name.to_string(),
            transport,
            parser: ReportParser::default(),
            log,
            device_id: None,
            clock: Box::new(Utc::now),
        }
    }

    /// Replace the clock readings are stamped with.
    pub fn with_clock(mut self, clock: impl Fn() -> DateTime<Utc> + Send + 'static) -> Self {
        self.clock = Box::new(clock);
        self
    }

    /// Replace the report parser.
    pub fn with_parser(mut self, parser: ReportParser) -> Self {
        self.parser = parser;
        self
    }

    /// Display name.
    pub fn name(&self) -> &str {
        &self.name
    }

    /// Identification string, once [`CsStandard::identify`] succeeded.
    pub fn device_id(&self) -> Option<&str> {
        self.device_id.as_deref()
    }

    /// Log file.
    pub fn log_file(&self) -> &CsvLogFile {
        &self.log
    }

    /// Transport, for state inspection.
    pub fn transport(&self) -> &Transport<O> {
        &self.transport
    }

    /// Query `*IDN?` and remember the answer.
    pub fn identify(&mut self) -> Option<&str> {
        match self.transport.identify() {
            Some(id) => {
                info!(instrument = %self.name, device = %id, "Instrument identified");
                self.device_id = Some(id);
            }
            None => warn!(instrument = %self.name, "No identification received"),
        }
        self.device_id.as_deref()
    }

    /// Fetch and parse one diagnostic report. An unreachable instrument
    /// yields a reading with every field unset.
    ///
    /// The reading is stamped once the exchange has returned, so the stamp is
    /// the time the report was parsed, not the time the cycle started.
    pub fn poll(&mut self) -> Reading {
        let raw = self.transport.exchange(PRINT_COMMAND);
        let captured_at = (self.clock)();
        if raw.is_empty() {
            warn!(instrument = %self.name, port = %self.transport.endpoint(), "Empty diagnostic report");
        } else {
            debug!(instrument = %self.name, bytes = raw.len(), "Diagnostic report received");
        }
        self.parser.parse(&raw, captured_at)
    }

    /// Poll and append the reading to the log file.
    ///
    /// A write failure is returned to the caller, who decides how to report it.
    pub fn log_once(&mut self) -> AppResult<Reading> {
        let reading = self.poll();
        self.log.append(&reading)?;
        Ok(reading)
    }
}

impl<O: ChannelOpener> fmt::Display for CsStandard<O> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "[CsStandard name:{} port:{} log:{}]",
            self.name,
            self.transport.endpoint(),
            self.log.path().display()
        )
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::adapters::{ScriptStep, ScriptedOpener};
    use crate::parameter::ParameterId;
    use crate::report::CsvFormat;
    use chrono::TimeZone;
    use std::time::Duration;

    fn now() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2024, 6, 1, 0, 0, 3).unwrap()
    }

    #[test]
    fn test_poll_parses_report() {
        let opener = ScriptedOpener::new("mock").with_session(vec![
            ScriptStep::line("SYSTEM:PRINT?"),
            ScriptStep::line("Zeeman Freq:   40012 Hz      C-field curr:  12.345 mA"),
        ]);
        let handle = opener.handle();
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLogFile::new(dir.path().join("cs.csv"), CsvFormat::default());
        let mut cs = CsStandard::new("CS1", Transport::new(opener), log).with_clock(now);

        let reading = cs.poll();
        assert_eq!(reading.captured_at(), now());
        assert_eq!(reading.value(ParameterId::ZeemanFrequency), 40012.0);
        assert_eq!(reading.value(ParameterId::CFieldCurrent), 12.345);
        assert_eq!(handle.sent(), vec!["SYSTEM:PRINT?\n".to_string()]);
    }

    #[test]
    fn test_reading_is_stamped_after_exchange() {
        let delay = Duration::from_millis(20);
        let opener = ScriptedOpener::new("slow")
            .with_read_delay(delay)
            .with_session(vec![ScriptStep::line("CBT ID: CBT047")]);
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLogFile::new(dir.path().join("cs.csv"), CsvFormat::default());
        let mut cs = CsStandard::new("CS1", Transport::new(opener), log);

        let before = Utc::now();
        let reading = cs.poll();
        // One line plus five timeouts, each read taking `delay`.
        let elapsed = (reading.captured_at() - before).to_std().unwrap();
        assert!(elapsed >= delay * 6, "stamped after {:?}", elapsed);
        assert_eq!(reading.cbt_id(), "CBT047");
    }

    #[test]
    fn test_unreachable_instrument_yields_empty_reading() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLogFile::new(dir.path().join("cs.csv"), CsvFormat::default());
        let mut cs = CsStandard::new("CS1", Transport::new(ScriptedOpener::new("gone")), log);

        assert_eq!(cs.identify(), None);
        let reading = cs.poll();
        assert!(reading.parameters().iter().all(|p| p.value().is_nan()));
        assert_eq!(cs.to_string(), format!("[CsStandard name:CS1 port:gone log:{}]", cs.log_file().path().display()));
    }
}
