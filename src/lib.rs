//! Core library for the cs_daq logger.
//!
//! Polls 5071A-class caesium frequency standards over RS-232, parses their
//! free-form `SYSTEM:PRINT?` diagnostic report into a fixed set of typed
//! measurements and appends each reading to a per-instrument CSV log.
//!
//! Data flows leaf-first:
//!
//! ```text
//! schedule -> transport::Transport::exchange -> raw text
//!          -> report::ReportParser::parse    -> report::Reading
//!          -> data::CsvLogFile::append
//! ```

pub mod adapters;
pub mod app;
pub mod config;
pub mod data;
pub mod error;
pub mod instrument;
pub mod parameter;
pub mod report;
pub mod schedule;
pub mod transport;
