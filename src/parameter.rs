//! Parameter model for the diagnostic report.
//!
//! A [`Parameter`] is one named scalar measurement out of a `SYSTEM:PRINT?`
//! report: the label it is found under, a display unit, the precision it is
//! logged with, and the parsed value. `NaN` is the resting value and means
//! "not reported this time"; it is not an error.
//!
//! The set of parameters is closed and known up front. [`ParameterId`] names
//! every field a 5071A prints, in log-column order, and [`ParameterSchema`]
//! binds each id to the label text it is matched against.
//!
//! # Matching
//!
//! Labels are matched by substring containment, so a key that is contained in
//! another key on the same report column would match both labels. Schemas are
//! checked for that when built:
//!
//! ```
//! use cs_daq::parameter::{ParameterDef, ParameterId, ParameterSchema, Precision, Side};
//!
//! let overlapping = vec![
//!     ParameterDef::new(ParameterId::CbtOven, "CBT Oven", "V", Precision::Fixed(1), Side::Left),
//!     ParameterDef::new(ParameterId::CbtOvenError, "CBT Oven Err", "oC", Precision::Fixed(2), Side::Left),
//! ];
//! assert!(ParameterSchema::new(overlapping).is_err());
//! assert!(ParameterSchema::hp5071a().validate().is_ok());
//! ```

use crate::error::{AppResult, DaqError};
use serde::{Deserialize, Serialize};
use std::fmt;

/// How a parameter value is rendered into a log column.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Precision {
    /// Fixed number of decimal places.
    Fixed(usize),
    /// Shortest round-trip mantissa, always in scientific notation.
    ///
    /// Suited to values far from 1 such as `1.2E-13`; `0.5` renders as `5E-1`
    /// and zero as `0E0`.
    Shortest,
}

impl Precision {
    /// Format `value` with this precision. `NaN` always renders as `NaN`.
    pub fn format(self, value: f64) -> String {
        match self {
            Precision::Fixed(places) => format!("{:.*}", places, value),
            Precision::Shortest => format!("{:E}", value),
        }
    }
}

/// Which half of a dual-column report line a parameter is printed in.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Side {
    /// Left-hand `label: value` pair.
    Left,
    /// Right-hand `label: value` pair.
    Right,
}

impl fmt::Display for Side {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Side::Left => f.write_str("left"),
            Side::Right => f.write_str("right"),
        }
    }
}

/// Every numeric field of the diagnostic report, in log-column order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum ParameterId {
    /// Fractional frequency offset.
    FrequencyOffset,
    /// Quartz oscillator control voltage, percent of range.
    OscillatorControl,
    /// Microwave amplitude, first channel.
    RfAmplitude1,
    /// Microwave amplitude, second channel.
    RfAmplitude2,
    /// Zeeman frequency.
    ZeemanFrequency,
    /// C-field current.
    CFieldCurrent,
    /// Electron multiplier voltage.
    EMultiplier,
    /// Signal gain.
    SignalGain,
    /// Caesium beam tube oven voltage.
    CbtOven,
    /// Caesium beam tube oven temperature error.
    CbtOvenError,
    /// Oscillator oven voltage.
    OscillatorOven,
    /// Ion pump current.
    IonPump,
    /// Hot-wire ionizer voltage.
    HwIonizer,
    /// Mass spectrometer voltage.
    MassSpec,
    /// SAW oscillator tuning voltage.
    SawTuning,
    /// DRO tuning voltage.
    DroTuning,
    /// 87 MHz PLL control voltage.
    Mhz87Pll,
    /// Microprocessor clock PLL control voltage.
    UpClockPll,
    /// +12 V supply rail.
    P12VSupply,
    /// -12 V supply rail.
    M12VSupply,
    /// +5 V supply rail.
    P5VSupply,
    /// Internal temperature.
    Thermometer,
}

impl ParameterId {
    /// All ids in log-column order.
    pub const ALL: [ParameterId; 22] = [
        ParameterId::FrequencyOffset,
        ParameterId::OscillatorControl,
        ParameterId::RfAmplitude1,
        ParameterId::RfAmplitude2,
        ParameterId::ZeemanFrequency,
        ParameterId::CFieldCurrent,
        ParameterId::EMultiplier,
        ParameterId::SignalGain,
        ParameterId::CbtOven,
        ParameterId::CbtOvenError,
        ParameterId::OscillatorOven,
        ParameterId::IonPump,
        ParameterId::HwIonizer,
        ParameterId::MassSpec,
        ParameterId::SawTuning,
        ParameterId::DroTuning,
        ParameterId::Mhz87Pll,
        ParameterId::UpClockPll,
        ParameterId::P12VSupply,
        ParameterId::M12VSupply,
        ParameterId::P5VSupply,
        ParameterId::Thermometer,
    ];

    /// Label, unit, precision and column of this field as a 5071A prints it.
    fn hp5071a(self) -> (&'static str, &'static str, Precision, Side) {
        use ParameterId::*;
        use Precision::{Fixed, Shortest};
        use Side::{Left, Right};
        match self {
            FrequencyOffset => ("Freq Offset", "", Shortest, Left),
            OscillatorControl => ("Osc. control", "%", Fixed(2), Right),
            RfAmplitude1 => ("RF amplitude 1", "%", Fixed(1), Left),
            RfAmplitude2 => ("RF amplitude 2", "%", Fixed(1), Right),
            ZeemanFrequency => ("Zeeman Freq", "Hz", Fixed(0), Left),
            CFieldCurrent => ("C-field curr", "mA", Fixed(3), Right),
            EMultiplier => ("E-multiplier", "V", Fixed(0), Left),
            SignalGain => ("Signal Gain", "%", Fixed(1), Right),
            CbtOven => ("CBT Oven", "V", Fixed(1), Left),
            CbtOvenError => ("CBT Oven Err", "oC", Fixed(2), Right),
            OscillatorOven => ("Osc. Oven", "V", Fixed(1), Left),
            IonPump => ("Ion Pump", "uA", Fixed(1), Right),
            HwIonizer => ("HW Ionizer", "V", Fixed(1), Left),
            MassSpec => ("Mass spec", "V", Fixed(1), Right),
            SawTuning => ("SAW Tuning", "V", Fixed(1), Left),
            DroTuning => ("DRO Tuning", "V", Fixed(1), Right),
            Mhz87Pll => ("87MHz PLL", "V", Fixed(1), Left),
            UpClockPll => ("uP Clock PLL", "V", Fixed(1), Right),
            P12VSupply => ("+12V supply", "V", Fixed(1), Left),
            M12VSupply => ("-12V supply", "V", Fixed(1), Right),
            P5VSupply => ("+5V supply", "V", Fixed(1), Left),
            Thermometer => ("Thermometer", "oC", Fixed(1), Right),
        }
    }
}

/// A named scalar measurement.
///
/// `key` and `unit` are fixed at construction; only the value changes, and
/// only while a report is being parsed.
#[derive(Debug, Clone, PartialEq)]
pub struct Parameter {
    id: ParameterId,
    key: String,
    unit: String,
    precision: Precision,
    value: f64,
}

impl Parameter {
    /// Creates a parameter with a `NaN` value. Key and unit are trimmed.
    pub fn new(id: ParameterId, key: &str, unit: &str, precision: Precision) -> Self {
        Self {
            id,
            key: key.trim().to_string(),
            unit: unit.trim().to_string(),
            precision,
            value: f64::NAN,
        }
    }

    /// Schema id.
    pub fn id(&self) -> ParameterId {
        self.id
    }

    /// Label the parameter is matched against.
    pub fn key(&self) -> &str {
        &self.key
    }

    /// Display unit, possibly empty.
    pub fn unit(&self) -> &str {
        &self.unit
    }

    /// Parsed value, `NaN` when the report did not carry it.
    pub fn value(&self) -> f64 {
        self.value
    }

    /// Column title, `"<key> / <unit>"`.
    pub fn title(&self) -> String {
        format!("{} / {}", self.key, self.unit)
    }

    /// Value rendered with the parameter's log precision.
    pub fn formatted(&self) -> String {
        self.precision.format(self.value)
    }

    /// Case-sensitive test whether `label` contains this parameter's key.
    pub fn name_is_in(&self, label: &str) -> bool {
        label.contains(self.key.as_str())
    }

    pub(crate) fn set_value(&mut self, value: f64) {
        self.value = value;
    }
}

impl fmt::Display for Parameter {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}={} {}", self.key, self.formatted(), self.unit)
    }
}

/// Definition of one schema entry.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterDef {
    /// Field id.
    pub id: ParameterId,
    /// Label text matched by containment.
    pub key: String,
    /// Display unit.
    pub unit: String,
    /// Log precision.
    pub precision: Precision,
    /// Report column the label is printed in.
    pub side: Side,
}

impl ParameterDef {
    /// Convenience constructor.
    pub fn new(id: ParameterId, key: &str, unit: &str, precision: Precision, side: Side) -> Self {
        Self {
            id,
            key: key.to_string(),
            unit: unit.to_string(),
            precision,
            side,
        }
    }

    /// Fresh parameter for this definition, value `NaN`.
    pub fn instantiate(&self) -> Parameter {
        Parameter::new(self.id, &self.key, &self.unit, self.precision)
    }
}

/// Ordered, validated set of parameter definitions.
///
/// Order is log-column order and also matching order: for one report line the
/// parser evaluates left-column definitions first, then right-column ones,
/// each in schema order.
#[derive(Debug, Clone, PartialEq)]
pub struct ParameterSchema {
    defs: Vec<ParameterDef>,
}

impl ParameterSchema {
    /// Builds a schema and rejects overlapping keys.
    pub fn new(defs: Vec<ParameterDef>) -> AppResult<Self> {
        let schema = Self { defs };
        schema.validate()?;
        Ok(schema)
    }

    /// The full 5071A field set.
    pub fn hp5071a() -> Self {
        let defs = ParameterId::ALL
            .iter()
            .map(|&id| {
                let (key, unit, precision, side) = id.hp5071a();
                ParameterDef::new(id, key, unit, precision, side)
            })
            .collect();
        Self { defs }
    }

    /// Checks that keys are non-empty, ids unique, and that no key on a column
    /// is a substring of another key on the same column.
    pub fn validate(&self) -> AppResult<()> {
        for (i, def) in self.defs.iter().enumerate() {
            if def.key.trim().is_empty() {
                return Err(DaqError::Configuration(format!(
                    "Parameter {:?} has an empty key",
                    def.id
                )));
            }
            for other in &self.defs[i + 1..] {
                if other.id == def.id {
                    return Err(DaqError::Configuration(format!(
                        "Parameter {:?} is defined twice",
                        def.id
                    )));
                }
                if other.side != def.side {
                    continue;
                }
                let (a, b) = (def.key.trim(), other.key.trim());
                if a.contains(b) {
                    return Err(overlap(def.side, a, b));
                }
                if b.contains(a) {
                    return Err(overlap(def.side, b, a));
                }
            }
        }
        Ok(())
    }

    /// Definitions in column order.
    pub fn defs(&self) -> &[ParameterDef] {
        &self.defs
    }

    /// Number of parameters.
    pub fn len(&self) -> usize {
        self.defs.len()
    }

    /// True when the schema has no parameters.
    pub fn is_empty(&self) -> bool {
        self.defs.is_empty()
    }
}

impl Default for ParameterSchema {
    fn default() -> Self {
        Self::hp5071a()
    }
}

fn overlap(side: Side, outer: &str, inner: &str) -> DaqError {
    DaqError::OverlappingKeys {
        side: side.to_string(),
        outer: outer.to_string(),
        inner: inner.to_string(),
    }
}
