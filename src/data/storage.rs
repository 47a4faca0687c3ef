//! Per-instrument CSV log files with clean feature flag handling.
use crate::report::{CsvFormat, Reading};
use std::path::{Path, PathBuf};

// ============================================================================
// CSV Writer
// ============================================================================

#[cfg(feature = "storage_csv")]
mod csv_enabled {
    use super::*;
    use crate::error::AppResult;
    use std::fs::{self, OpenOptions};
    use tracing::info;

    /// Append-only log file for one instrument.
    ///
    /// The header row is written once, when the file is created (or found
    /// empty); every later call only appends a data row. The file is opened
    /// and closed per row so that it can be rotated or copied between cycles.
    #[derive(Debug, Clone)]
    pub struct CsvLogFile {
        path: PathBuf,
        format: CsvFormat,
    }

    impl CsvLogFile {
        /// Log file at `path`, rows delimited per `format`.
        pub fn new(path: impl Into<PathBuf>, format: CsvFormat) -> Self {
            Self {
                path: path.into(),
                format,
            }
        }

        /// Target path.
        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Append `reading`, preceded by the header if the file is new.
        pub fn append(&self, reading: &Reading) -> AppResult<()> {
            if let Some(dir) = self.path.parent().filter(|d| !d.as_os_str().is_empty()) {
                fs::create_dir_all(dir)?;
            }
            let file = OpenOptions::new()
                .create(true)
                .append(true)
                .open(&self.path)?;
            let is_new = file.metadata()?.len() == 0;

            let mut writer = csv::WriterBuilder::new()
                .delimiter(self.format.delimiter_byte())
                .has_headers(false)
                .from_writer(file);
            if is_new {
                writer.write_record(reading.csv_header_fields())?;
            }
            writer.write_record(reading.csv_fields())?;
            writer.flush()?;

            info!(file = %self.path.display(), header = is_new, "Log file updated");
            Ok(())
        }
    }
}

#[cfg(not(feature = "storage_csv"))]
mod csv_disabled {
    use super::*;
    use crate::error::{AppResult, DaqError};

    /// Placeholder when CSV storage is compiled out.
    #[derive(Debug, Clone)]
    pub struct CsvLogFile {
        path: PathBuf,
    }

    impl CsvLogFile {
        /// Log file at `path`; every append fails.
        pub fn new(path: impl Into<PathBuf>, _format: CsvFormat) -> Self {
            Self { path: path.into() }
        }

        /// Target path.
        pub fn path(&self) -> &Path {
            &self.path
        }

        /// Always fails with [`DaqError::FeatureNotEnabled`].
        pub fn append(&self, _reading: &Reading) -> AppResult<()> {
            Err(DaqError::FeatureNotEnabled("storage_csv".to_string()))
        }
    }
}

#[cfg(feature = "storage_csv")]
pub use csv_enabled::CsvLogFile;

#[cfg(not(feature = "storage_csv"))]
pub use csv_disabled::CsvLogFile;

#[cfg(all(test, feature = "storage_csv"))]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn reading(cbt: &str) -> Reading {
        let at = Utc.with_ymd_and_hms(2024, 1, 2, 3, 4, 5).unwrap();
        Reading::parse(&format!("CBT ID: {}", cbt), at)
    }

    #[test]
    fn test_header_written_once() {
        let dir = tempfile::tempdir().unwrap();
        let log = CsvLogFile::new(dir.path().join("nested/cs1.csv"), CsvFormat::default());

        log.append(&reading("A")).unwrap();
        log.append(&reading("B")).unwrap();

        let content = std::fs::read_to_string(log.path()).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines.len(), 3);
        assert!(lines[0].starts_with("Time stamp,"));
        assert!(lines[1].contains(",A,"));
        assert!(lines[2].contains(",B,"));
    }

    #[test]
    fn test_existing_file_gets_no_header() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("cs1.csv");
        std::fs::write(&path, "previous run\n").unwrap();

        let format = CsvFormat::new(';').unwrap();
        let log = CsvLogFile::new(&path, format);
        log.append(&reading("A")).unwrap();

        let expected = reading("A").to_csv_row(&format);
        let content = std::fs::read_to_string(&path).unwrap();
        let lines: Vec<&str> = content.lines().collect();
        assert_eq!(lines, vec!["previous run", expected.as_str()]);
    }

    #[test]
    fn test_unwritable_path_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        // A directory where the file should be.
        let log = CsvLogFile::new(dir.path(), CsvFormat::default());
        assert!(log.append(&reading("A")).is_err());
    }
}
