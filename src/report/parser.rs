//! Line-level extraction for `SYSTEM:PRINT?` reports.
//!
//! The 5071A prints its diagnostics as ragged, two-column plain text:
//!
//! ```text
//! MJD 60123 14:05:33
//! Freq Offset:   +1.2E-13        Osc. control:   45.3 %
//! RF amplitude 1:  24.5 %        RF amplitude 2:  24.6 %
//! CBT ID: CBT047
//! ```
//!
//! There is no grammar to recover. Each line is classified by shape only:
//! splitting on `:` yields either one `label: value` pair ([`LineShape::Scalar`])
//! or two side-by-side pairs sharing the middle segment
//! ([`LineShape::DualColumn`]). Everything else is ignored. A line that carries
//! the `MJD` token is additionally checked for the device date stamp.

use once_cell::sync::Lazy;
use regex::Regex;
use std::borrow::Cow;

#[allow(clippy::expect_used)]
static MULTI_SPACE: Lazy<Regex> = Lazy::new(|| Regex::new(r" {2,}").expect("Invalid space regex"));

/// Collapses runs of spaces and splits into non-empty lines.
///
/// Any of `\r\n`, `\r` or `\n` ends a line.
pub fn normalize(raw: &str) -> Vec<String> {
    let collapsed: Cow<'_, str> = MULTI_SPACE.replace_all(raw, " ");
    collapsed
        .split(['\r', '\n'])
        .filter(|line| !line.is_empty())
        .map(str::to_string)
        .collect()
}

fn tokens(text: &str) -> impl Iterator<Item = &str> {
    text.split(' ').filter(|t| !t.is_empty())
}

/// Device date stamp: `MJD <day> <time-of-day>`.
///
/// Only lines containing `MJD` that split into exactly three tokens qualify,
/// and the day must be an integer. Anything else yields `None`.
pub fn parse_timestamp_line(line: &str) -> Option<(u32, String)> {
    if !line.contains("MJD") {
        return None;
    }
    let parts: Vec<&str> = tokens(line).collect();
    if parts.len() != 3 {
        return None;
    }
    let mjd = parts[1].parse::<u32>().ok()?;
    Some((mjd, parts[2].trim().to_string()))
}

/// Shape of a line after splitting on `:`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LineShape<'a> {
    /// `label: value`
    Scalar {
        /// Left of the colon.
        label: &'a str,
        /// Right of the colon.
        value: &'a str,
    },
    /// `left label: left value  right label: right value`
    DualColumn {
        /// Left label.
        left_label: &'a str,
        /// Left value followed by the right label.
        middle: &'a str,
        /// Right value.
        right_value: &'a str,
    },
    /// Any other segment count.
    Other,
}

/// Classifies a line by its non-empty `:`-separated segments.
pub fn classify(line: &str) -> LineShape<'_> {
    let segments: Vec<&str> = line.split(':').filter(|s| !s.is_empty()).collect();
    match segments[..] {
        [label, value] => LineShape::Scalar { label, value },
        [left_label, middle, right_value] => LineShape::DualColumn {
            left_label,
            middle,
            right_value,
        },
        _ => LineShape::Other,
    }
}

/// Parses one token as a plain decimal number, culture-independent.
///
/// Word forms such as `inf` or `NaN` are rejected so that label text never
/// passes for a value.
fn parse_invariant(token: &str) -> Option<f64> {
    let digits = token.trim_start_matches(['+', '-']);
    if !digits.starts_with(|c: char| c.is_ascii_digit() || c == '.') {
        return None;
    }
    token.parse::<f64>().ok()
}

/// First space-separated token of `text` that parses as a number, else `NaN`.
///
/// Units and flags after the number are skipped.
pub fn first_number(text: &str) -> f64 {
    tokens(text).find_map(parse_invariant).unwrap_or(f64::NAN)
}

/// Device identification out of a `*IDN?` reply.
///
/// Drops line endings, blank lines and the echoed command, and joins what is
/// left with single spaces. Returns `None` when nothing remains.
pub fn parse_identification(raw: &str, command: &str) -> Option<String> {
    let command = command.trim();
    let parts: Vec<&str> = raw
        .split(['\r', '\n'])
        .map(str::trim)
        .map(|line| line.strip_prefix(command).unwrap_or(line).trim())
        .filter(|line| !line.is_empty())
        .collect();
    if parts.is_empty() {
        None
    } else {
        Some(parts.join(" "))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_normalize_collapses_spaces_and_line_endings() {
        let lines = normalize("a    b\r\n\r\nc  d\re\n\n");
        assert_eq!(lines, vec!["a b", "c d", "e"]);
    }

    #[test]
    fn test_timestamp_line() {
        assert_eq!(
            parse_timestamp_line("MJD 60123 14:05:33"),
            Some((60123, "14:05:33".to_string()))
        );
        assert_eq!(parse_timestamp_line("MJD 60123"), None);
        assert_eq!(parse_timestamp_line("MJD 60123 14:05:33 UTC"), None);
        assert_eq!(parse_timestamp_line("MJD abc 14:05:33"), None);
        assert_eq!(parse_timestamp_line("60123 14:05:33 x"), None);
    }

    #[test]
    fn test_classify() {
        assert_eq!(
            classify("CBT ID: CBT047"),
            LineShape::Scalar {
                label: "CBT ID",
                value: " CBT047"
            }
        );
        assert_eq!(
            classify("Freq Offset: +1.2E-13 Osc. control: 45.3 %"),
            LineShape::DualColumn {
                left_label: "Freq Offset",
                middle: " +1.2E-13 Osc. control",
                right_value: " 45.3 %"
            }
        );
        assert_eq!(classify("no delimiter here"), LineShape::Other);
        assert_eq!(classify("a:b:c:d"), LineShape::Other);
        // Empty segments are dropped before counting.
        assert_eq!(classify("Log status:"), LineShape::Other);
    }

    #[test]
    fn test_first_number_skips_units_and_words() {
        assert_eq!(first_number(" 45.3 %"), 45.3);
        assert_eq!(first_number(" +1.2E-13 Osc. control"), 1.2e-13);
        assert_eq!(first_number("approx -12.1 V"), -12.1);
        assert_eq!(first_number(".5"), 0.5);
        assert!(first_number(" inf NaN V").is_nan());
        assert!(first_number("1,5 V").is_nan());
        assert!(first_number("").is_nan());
    }

    #[test]
    fn test_identification_strips_echo_and_noise() {
        let raw = "*IDN?\r\nHEWLETT-PACKARD,5071A,US12345678,2.40\r\n\r\n";
        assert_eq!(
            parse_identification(raw, "*IDN?").as_deref(),
            Some("HEWLETT-PACKARD,5071A,US12345678,2.40")
        );
        assert_eq!(parse_identification("\r\n*IDN?\r\n", "*IDN?"), None);
        assert_eq!(parse_identification("", "*IDN?"), None);
    }
}
