//! Persistence of parsed readings.

pub mod storage;

pub use storage::CsvLogFile;
