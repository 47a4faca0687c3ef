//! Custom error types for the logger.
//!
//! This module defines the primary error type, `DaqError`, for the whole crate.
//! Using the `thiserror` crate, it provides a centralized and consistent way to handle
//! the few things that can actually go wrong while polling a frequency standard.
//!
//! ## Error Hierarchy
//!
//! - **`Config`**: Wraps errors from `figment`, typically a missing file or a TOML value
//!   of the wrong shape.
//! - **`Configuration`**: Semantic errors that pass parsing but are logically incorrect
//!   (duplicate instrument names, an interval of zero minutes, ...).
//! - **`OverlappingKeys`**: Two parameter keys on the same report column where one is a
//!   substring of the other. The report parser matches keys by containment, so such a
//!   schema would make the later key silently overwrite the earlier one.
//! - **`Io`** / **`Serial`** / **`Csv`**: Wrapped lower-level failures. None of them is
//!   fatal to the polling loop; callers log them and try again on the next cycle.
//! - **`FeatureNotEnabled`**: Functionality compiled out via feature flags.
//!
//! Read timeouts are not errors: the transport uses them as end-of-reply
//! framing.

use thiserror::Error;

/// Convenience alias for results using the crate error type.
pub type AppResult<T> = std::result::Result<T, DaqError>;

/// Crate-wide error type.
#[derive(Error, Debug)]
pub enum DaqError {
    /// Configuration could not be loaded or deserialized.
    #[error("Configuration error: {0}")]
    Config(#[from] figment::Error),

    /// Configuration loaded but failed validation.
    #[error("Configuration validation error: {0}")]
    Configuration(String),

    /// Two parameter keys on the same report column overlap.
    #[error("Parameter key '{inner}' is contained in '{outer}' on the {side} column")]
    OverlappingKeys {
        /// Report column the keys are matched against.
        side: String,
        /// The longer key.
        outer: String,
        /// The key contained in `outer`.
        inner: String,
    },

    /// The CSV delimiter cannot be used by the log writer.
    #[error("Invalid CSV delimiter {0:?}: must be a single ASCII character other than a quote or line break")]
    InvalidDelimiter(char),

    /// File or port I/O failure.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serial port could not be opened or configured.
    #[cfg(feature = "instrument_serial")]
    #[error("Serial port error: {0}")]
    Serial(#[from] serialport::Error),

    /// CSV writer failure.
    #[cfg(feature = "storage_csv")]
    #[error("CSV error: {0}")]
    Csv(#[from] csv::Error),

    /// Serial support was compiled out.
    #[error("Serial support not enabled. Rebuild with --features instrument_serial")]
    SerialFeatureDisabled,

    /// A feature-gated backend was requested but not compiled in.
    #[error("Feature '{0}' is not enabled. Please build with --features {0}")]
    FeatureNotEnabled(String),
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_display() {
        let err = DaqError::Configuration("interval_minutes must be 1-60".to_string());
        assert_eq!(
            err.to_string(),
            "Configuration validation error: interval_minutes must be 1-60"
        );
    }

    #[test]
    fn test_overlapping_keys_display() {
        let err = DaqError::OverlappingKeys {
            side: "left".into(),
            outer: "CBT Oven Err".into(),
            inner: "CBT Oven".into(),
        };
        assert!(err.to_string().contains("'CBT Oven' is contained in 'CBT Oven Err'"));
    }
}
