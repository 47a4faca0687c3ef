//! Instrument drivers.

pub mod cs_standard;

pub use cs_standard::{Clock, CsStandard, PRINT_COMMAND};
