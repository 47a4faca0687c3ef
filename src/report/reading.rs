//! One parsed snapshot of an instrument's diagnostic report.

use super::parser::{self, LineShape};
use crate::error::{AppResult, DaqError};
use crate::parameter::{Parameter, ParameterId, ParameterSchema, Side};
use chrono::{DateTime, Utc};
use tracing::trace;

/// Placeholder for text fields the report did not carry.
pub const MISSING_TEXT: &str = "*";

/// Rendering of an absent device MJD.
const MISSING_MJD: &str = "-1";

/// Format of the capture timestamp column (UTC).
pub const TIMESTAMP_FORMAT: &str = "%Y.%m.%d/%H:%M:%S";

/// Titles of the leading metadata columns.
const METADATA_TITLES: [&str; 7] = [
    "Time stamp",
    "MJD (internal)",
    "Date (internal)",
    "CBT ID",
    "Status summary",
    "Power source",
    "Log status",
];

/// Single-value text fields, matched by exact label.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum ScalarField {
    CbtId,
    StatusSummary,
    PowerSource,
    LogStatus,
}

impl ScalarField {
    fn from_label(label: &str) -> Option<Self> {
        match label {
            "CBT ID" => Some(Self::CbtId),
            "Status summary" => Some(Self::StatusSummary),
            "Power source" => Some(Self::PowerSource),
            "Log status" => Some(Self::LogStatus),
            _ => None,
        }
    }
}

/// Column delimiter for rendered rows.
///
/// One value is built from configuration at startup and handed to every render
/// call, so all rows of a run share the delimiter without global state.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CsvFormat {
    delimiter: char,
}

impl CsvFormat {
    /// Builds a format, rejecting delimiters the CSV writer cannot use.
    pub fn new(delimiter: char) -> AppResult<Self> {
        if !delimiter.is_ascii() || matches!(delimiter, '"' | '\r' | '\n') {
            return Err(DaqError::InvalidDelimiter(delimiter));
        }
        Ok(Self { delimiter })
    }

    /// The delimiter character.
    pub fn delimiter(&self) -> char {
        self.delimiter
    }

    /// The delimiter as the byte the CSV writer expects.
    pub fn delimiter_byte(&self) -> u8 {
        // ASCII is checked in `new`.
        self.delimiter as u8
    }
}

impl Default for CsvFormat {
    fn default() -> Self {
        Self { delimiter: ',' }
    }
}

/// Parses raw report text against a validated schema.
///
/// Stateless apart from the schema; `parse` has no side effects and may be
/// called from several threads at once.
#[derive(Debug, Clone, Default)]
pub struct ReportParser {
    schema: ParameterSchema,
}

impl ReportParser {
    /// Wraps `schema` after checking it for overlapping keys.
    pub fn new(schema: ParameterSchema) -> AppResult<Self> {
        schema.validate()?;
        Ok(Self { schema })
    }

    /// Schema in use.
    pub fn schema(&self) -> &ParameterSchema {
        &self.schema
    }

    /// Parses `raw` into a reading stamped with `captured_at`.
    pub fn parse(&self, raw: &str, captured_at: DateTime<Utc>) -> Reading {
        let mut reading = Reading::empty(&self.schema, captured_at);
        for line in parser::normalize(raw) {
            if let Some((mjd, time)) = parser::parse_timestamp_line(&line) {
                reading.internal_mjd = Some(mjd);
                reading.internal_time = time;
            }
            match parser::classify(&line) {
                LineShape::Scalar { label, value } => reading.apply_scalar(label, value),
                LineShape::DualColumn {
                    left_label,
                    middle,
                    right_value,
                } => reading.apply_dual_column(&self.schema, left_label, middle, right_value),
                LineShape::Other => trace!(line = %line, "Ignoring report line"),
            }
        }
        reading
    }
}

/// One parsed diagnostic report.
///
/// Built once from a raw report and never changed afterwards.
#[derive(Debug, Clone, PartialEq)]
pub struct Reading {
    captured_at: DateTime<Utc>,
    internal_mjd: Option<u32>,
    internal_time: String,
    cbt_id: String,
    status_summary: String,
    power_source: String,
    log_status: String,
    parameters: Vec<Parameter>,
}

impl Reading {
    /// Parses `raw` with the stock 5071A schema.
    pub fn parse(raw: &str, captured_at: DateTime<Utc>) -> Self {
        ReportParser::default().parse(raw, captured_at)
    }

    fn empty(schema: &ParameterSchema, captured_at: DateTime<Utc>) -> Self {
        Self {
            captured_at,
            internal_mjd: None,
            internal_time: MISSING_TEXT.to_string(),
            cbt_id: MISSING_TEXT.to_string(),
            status_summary: MISSING_TEXT.to_string(),
            power_source: MISSING_TEXT.to_string(),
            log_status: MISSING_TEXT.to_string(),
            parameters: schema.defs().iter().map(|d| d.instantiate()).collect(),
        }
    }

    fn apply_scalar(&mut self, label: &str, value: &str) {
        let Some(field) = ScalarField::from_label(label) else {
            trace!(label, "Ignoring unknown scalar label");
            return;
        };
        let value = value.trim().to_string();
        match field {
            ScalarField::CbtId => self.cbt_id = value,
            ScalarField::StatusSummary => self.status_summary = value,
            ScalarField::PowerSource => self.power_source = value,
            ScalarField::LogStatus => self.log_status = value,
        }
    }

    fn apply_dual_column(
        &mut self,
        schema: &ParameterSchema,
        left_label: &str,
        middle: &str,
        right_value: &str,
    ) {
        for side in [Side::Left, Side::Right] {
            let (label, value_text) = match side {
                Side::Left => (left_label, middle),
                Side::Right => (middle, right_value),
            };
            for (def, param) in schema.defs().iter().zip(self.parameters.iter_mut()) {
                if def.side == side && param.name_is_in(label) {
                    param.set_value(parser::first_number(value_text));
                }
            }
        }
    }

    /// Wall-clock time the report was parsed.
    pub fn captured_at(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Device-reported Modified Julian Date.
    pub fn internal_mjd(&self) -> Option<u32> {
        self.internal_mjd
    }

    /// Device-reported time of day, `*` when absent.
    pub fn internal_time(&self) -> &str {
        &self.internal_time
    }

    /// Beam tube identifier, `*` when absent.
    pub fn cbt_id(&self) -> &str {
        &self.cbt_id
    }

    /// Status summary line, `*` when absent.
    pub fn status_summary(&self) -> &str {
        &self.status_summary
    }

    /// Power source, `*` when absent.
    pub fn power_source(&self) -> &str {
        &self.power_source
    }

    /// Internal log status, `*` when absent.
    pub fn log_status(&self) -> &str {
        &self.log_status
    }

    /// All parameters in column order.
    pub fn parameters(&self) -> &[Parameter] {
        &self.parameters
    }

    /// Parameter by id, if the schema has it.
    pub fn parameter(&self, id: ParameterId) -> Option<&Parameter> {
        self.parameters.iter().find(|p| p.id() == id)
    }

    /// Value by id; `NaN` when unparsed or not in the schema.
    pub fn value(&self, id: ParameterId) -> f64 {
        self.parameter(id).map_or(f64::NAN, Parameter::value)
    }

    /// Row cells in column order.
    pub fn csv_fields(&self) -> Vec<String> {
        let mut fields = Vec::with_capacity(METADATA_TITLES.len() + self.parameters.len());
        fields.push(self.captured_at.format(TIMESTAMP_FORMAT).to_string());
        fields.push(
            self.internal_mjd
                .map_or_else(|| MISSING_MJD.to_string(), |mjd| mjd.to_string()),
        );
        fields.push(self.internal_time.clone());
        fields.push(self.cbt_id.clone());
        fields.push(self.status_summary.clone());
        fields.push(self.power_source.clone());
        fields.push(self.log_status.clone());
        fields.extend(self.parameters.iter().map(Parameter::formatted));
        fields
    }

    /// Header cells in the same order as [`Reading::csv_fields`].
    pub fn csv_header_fields(&self) -> Vec<String> {
        METADATA_TITLES
            .iter()
            .map(|t| t.to_string())
            .chain(self.parameters.iter().map(Parameter::title))
            .collect()
    }

    /// Data row joined with the format's delimiter.
    pub fn to_csv_row(&self, format: &CsvFormat) -> String {
        join(&self.csv_fields(), format)
    }

    /// Header row joined with the format's delimiter.
    pub fn csv_header_row(&self, format: &CsvFormat) -> String {
        join(&self.csv_header_fields(), format)
    }
}

fn join(fields: &[String], format: &CsvFormat) -> String {
    fields.join(format.delimiter().to_string().as_str())
}
