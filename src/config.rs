//! Configuration using Figment
//!
//! Strongly-typed startup configuration. Values are loaded from:
//! 1. a TOML file (`config/cslog.toml` by default)
//! 2. environment variables prefixed with `CSLOG_`, nested keys separated by `__`
//!
//! ```text
//! CSLOG_APPLICATION__LOG_LEVEL=debug
//! CSLOG_SCHEDULE__INTERVAL_MINUTES=5
//! CSLOG_OUTPUT__DELIMITER=;
//! ```
//!
//! # Example file
//!
//! ```toml
//! [application]
//! name = "Cs clock logger"
//! log_level = "info"
//!
//! [schedule]
//! interval_minutes = 1
//! tolerance_seconds = 10
//!
//! [serial]
//! read_timeout = "1s"
//! timeout_threshold = 4
//!
//! [output]
//! directory = "logs"
//! extension = "csv"
//! delimiter = ","
//!
//! [[instruments]]
//! name = "CS1"
//! port = "/dev/ttyUSB0"
//! file_base_name = "cs1_log"
//! ```

use crate::adapters::serial_adapter::DEFAULT_READ_TIMEOUT;
use crate::error::{AppResult, DaqError};
use crate::report::CsvFormat;
use crate::transport::{DEFAULT_LINE_TERMINATOR, DEFAULT_TIMEOUT_THRESHOLD};
use figment::{
    providers::{Env, Format, Toml},
    Figment,
};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// Default configuration file location.
pub const DEFAULT_CONFIG_PATH: &str = "config/cslog.toml";

/// Prefix for environment overrides.
pub const ENV_PREFIX: &str = "CSLOG_";

/// Top-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Settings {
    /// Application settings
    #[serde(default)]
    pub application: ApplicationConfig,
    /// When readings are taken
    #[serde(default)]
    pub schedule: ScheduleConfig,
    /// Serial exchange tuning
    #[serde(default)]
    pub serial: SerialConfig,
    /// Log file layout
    #[serde(default)]
    pub output: OutputConfig,
    /// Polled instruments
    #[serde(default)]
    pub instruments: Vec<InstrumentConfig>,
}

/// Application-level configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApplicationConfig {
    /// Application name
    #[serde(default = "default_name")]
    pub name: String,
    /// Logging level (trace, debug, info, warn, error)
    #[serde(default = "default_log_level")]
    pub log_level: String,
}

/// Logging schedule
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScheduleConfig {
    /// Log on every minute divisible by this value (1-60)
    #[serde(default = "default_interval_minutes")]
    pub interval_minutes: u32,
    /// Only within the first N seconds of such a minute (1-59)
    #[serde(default = "default_tolerance_seconds")]
    pub tolerance_seconds: u32,
    /// How often the scheduler wakes up to check the clock
    #[serde(default = "default_poll_period", with = "humantime_serde")]
    pub poll_period: Duration,
}

/// Serial exchange tuning. Baud rate and framing are fixed by the instrument.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SerialConfig {
    /// Per-read timeout
    #[serde(default = "default_read_timeout", with = "humantime_serde")]
    pub read_timeout: Duration,
    /// Consecutive read timeouts tolerated before a reply counts as complete
    #[serde(default = "default_timeout_threshold")]
    pub timeout_threshold: u32,
    /// Terminator appended to every command
    #[serde(default = "default_line_terminator")]
    pub line_terminator: String,
}

/// Log file layout
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OutputConfig {
    /// Directory holding one log file per instrument
    #[serde(default = "default_directory")]
    pub directory: PathBuf,
    /// File extension, without the dot
    #[serde(default = "default_extension")]
    pub extension: String,
    /// Column delimiter shared by every log file of the run
    #[serde(default = "default_delimiter")]
    pub delimiter: char,
}

/// One polled instrument
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstrumentConfig {
    /// Display name, unique
    pub name: String,
    /// Serial port (e.g., "/dev/ttyUSB0", "COM3")
    pub port: String,
    /// Log file name without directory and extension
    pub file_base_name: String,
    /// Whether this instrument is polled
    #[serde(default = "default_enabled")]
    pub enabled: bool,
}

// ============================================================================
// Default value functions
// ============================================================================

fn default_name() -> String {
    "cslog".to_string()
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_interval_minutes() -> u32 {
    1
}

fn default_tolerance_seconds() -> u32 {
    10
}

fn default_poll_period() -> Duration {
    Duration::from_secs(1)
}

fn default_read_timeout() -> Duration {
    DEFAULT_READ_TIMEOUT
}

fn default_timeout_threshold() -> u32 {
    DEFAULT_TIMEOUT_THRESHOLD
}

fn default_line_terminator() -> String {
    DEFAULT_LINE_TERMINATOR.to_string()
}

fn default_directory() -> PathBuf {
    PathBuf::from("logs")
}

fn default_extension() -> String {
    "csv".to_string()
}

fn default_delimiter() -> char {
    ','
}

fn default_enabled() -> bool {
    true
}

impl Default for ApplicationConfig {
    fn default() -> Self {
        Self {
            name: default_name(),
            log_level: default_log_level(),
        }
    }
}

impl Default for ScheduleConfig {
    fn default() -> Self {
        Self {
            interval_minutes: default_interval_minutes(),
            tolerance_seconds: default_tolerance_seconds(),
            poll_period: default_poll_period(),
        }
    }
}

impl Default for SerialConfig {
    fn default() -> Self {
        Self {
            read_timeout: default_read_timeout(),
            timeout_threshold: default_timeout_threshold(),
            line_terminator: default_line_terminator(),
        }
    }
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            directory: default_directory(),
            extension: default_extension(),
            delimiter: default_delimiter(),
        }
    }
}

// ============================================================================
// Configuration Loading and Validation
// ============================================================================

impl Settings {
    /// Load from `path` plus `CSLOG_` environment overrides, then validate.
    pub fn load_from<P: AsRef<Path>>(path: P) -> AppResult<Self> {
        Self::from_figment(
            Figment::new()
                .merge(Toml::file(path.as_ref()))
                .merge(Env::prefixed(ENV_PREFIX).split("__")),
        )
    }

    /// Parse a TOML document without environment overrides, then validate.
    pub fn from_toml_str(toml: &str) -> AppResult<Self> {
        Self::from_figment(Figment::from(Toml::string(toml)))
    }

    fn from_figment(figment: Figment) -> AppResult<Self> {
        let settings: Self = figment.extract()?;
        settings.validate()?;
        Ok(settings)
    }

    /// Check semantic constraints that parsing cannot express.
    pub fn validate(&self) -> AppResult<()> {
        let valid_levels = ["trace", "debug", "info", "warn", "error"];
        if !valid_levels.contains(&self.application.log_level.as_str()) {
            return Err(invalid(format!(
                "Invalid log_level '{}'. Must be one of: {}",
                self.application.log_level,
                valid_levels.join(", ")
            )));
        }

        if !(1..=60).contains(&self.schedule.interval_minutes) {
            return Err(invalid(format!(
                "Invalid interval_minutes {}. Must be 1-60",
                self.schedule.interval_minutes
            )));
        }
        if !(1..=59).contains(&self.schedule.tolerance_seconds) {
            return Err(invalid(format!(
                "Invalid tolerance_seconds {}. Must be 1-59",
                self.schedule.tolerance_seconds
            )));
        }
        if self.schedule.poll_period.is_zero() {
            return Err(invalid("poll_period must be greater than zero".to_string()));
        }
        if self.serial.read_timeout.is_zero() {
            return Err(invalid("read_timeout must be greater than zero".to_string()));
        }

        self.csv_format()?;

        let mut names = HashSet::new();
        let mut files = HashSet::new();
        for instrument in &self.instruments {
            if instrument.name.trim().is_empty() {
                return Err(invalid("Instrument name cannot be empty".to_string()));
            }
            if !names.insert(instrument.name.trim()) {
                return Err(invalid(format!(
                    "Duplicate instrument name: '{}'",
                    instrument.name
                )));
            }
            if instrument.port.trim().is_empty() {
                return Err(invalid(format!(
                    "Instrument '{}': 'port' cannot be empty",
                    instrument.name
                )));
            }
            if instrument.file_base_name.trim().is_empty() {
                return Err(invalid(format!(
                    "Instrument '{}': 'file_base_name' cannot be empty",
                    instrument.name
                )));
            }
            if !files.insert(self.log_file_path(instrument)) {
                return Err(invalid(format!(
                    "Instrument '{}' shares its log file with another instrument",
                    instrument.name
                )));
            }
        }

        if !self.instruments.iter().any(|i| i.enabled) {
            return Err(invalid("No enabled instruments configured".to_string()));
        }
        Ok(())
    }

    /// Row format shared by all log files.
    pub fn csv_format(&self) -> AppResult<CsvFormat> {
        CsvFormat::new(self.output.delimiter)
    }

    /// `directory/file_base_name.extension` for `instrument`.
    pub fn log_file_path(&self, instrument: &InstrumentConfig) -> PathBuf {
        self.output
            .directory
            .join(instrument.file_base_name.trim())
            .with_extension(self.output.extension.trim().trim_start_matches('.'))
    }

    /// Instruments with `enabled = true`.
    pub fn enabled_instruments(&self) -> impl Iterator<Item = &InstrumentConfig> {
        self.instruments.iter().filter(|i| i.enabled)
    }
}

fn invalid(message: String) -> DaqError {
    DaqError::Configuration(message)
}
