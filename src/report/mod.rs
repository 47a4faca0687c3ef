//! Diagnostic report ingestion.
//!
//! [`parser`] holds the line-level extraction rules; [`reading`] assembles them
//! into a [`Reading`] and renders it as a log row.

pub mod parser;
pub mod reading;

pub use parser::parse_identification;
pub use reading::{CsvFormat, Reading, ReportParser, MISSING_TEXT, TIMESTAMP_FORMAT};
