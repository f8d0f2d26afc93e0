//! Scale-factor resolution and application.
//!
//! SunSpec publishes most measurements as an integer mantissa plus a signed
//! decimal exponent held in a companion register. The engineering value is
//! `mantissa * 10^exponent`.

use std::collections::BTreeMap;

use thiserror::Error;

use crate::catalog::{is_scale_factor, scale_factor_name};
use crate::decode::RawValue;

/// Key of the synthetic poll timestamp entry.
pub const TIMESTAMP_KEY: &str = "Time";

/// Scaling errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScaleError {
    /// A scale factor register did not hold a signed 16-bit value.
    #[error("Scale factor '{scale_factor}' for '{register}' is {found}, expected int16")]
    SchemaViolation {
        register: String,
        scale_factor: String,
        found: &'static str,
    },
}

/// A value after scaling.
#[derive(Debug, Clone, PartialEq)]
pub enum ScaledValue {
    Float(f64),
    Int16(i16),
    UInt16(u16),
    UInt32(u32),
    Text(String),
    /// Milliseconds since the Unix epoch.
    Timestamp(i64),
}

impl ScaledValue {
    /// Name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            ScaledValue::Float(_) => "float",
            ScaledValue::Int16(_) => "int16",
            ScaledValue::UInt16(_) => "uint16",
            ScaledValue::UInt32(_) => "uint32",
            ScaledValue::Text(_) => "string",
            ScaledValue::Timestamp(_) => "timestamp",
        }
    }
}

/// One cycle's values after scaling, keyed by register name.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ScaledReading {
    pub values: BTreeMap<String, ScaledValue>,
}

impl ScaledReading {
    /// Get a value by register name.
    pub fn get(&self, name: &str) -> Option<&ScaledValue> {
        self.values.get(name)
    }
}

/// Compute `value * 10^exponent`.
///
/// Negative exponents divide by the exact power of ten, so for exponents in
/// `-22..=22` the result is the correctly rounded decimal value.
pub fn apply_exponent(value: f64, exponent: i16) -> f64 {
    if exponent >= 0 {
        value * 10f64.powi(i32::from(exponent))
    } else {
        value / 10f64.powi(-i32::from(exponent))
    }
}

/// Scale one cycle of raw values and append the poll timestamp.
///
/// Scale-factor registers are consumed, never copied. Strings pass through.
/// Integers without a scale factor in this cycle pass through unscaled.
pub fn scale(
    values: &BTreeMap<String, RawValue>,
    timestamp_ms: i64,
) -> Result<ScaledReading, ScaleError> {
    let mut reading = ScaledReading::default();

    for (name, value) in values {
        if is_scale_factor(name) {
            continue;
        }

        let scaled = match value {
            RawValue::Text(text) => ScaledValue::Text(text.clone()),
            _ => {
                let sf_name = scale_factor_name(name);
                match (values.get(sf_name.as_ref()), value.as_f64()) {
                    (Some(RawValue::Int16(exponent)), Some(mantissa)) => {
                        ScaledValue::Float(apply_exponent(mantissa, *exponent))
                    }
                    (Some(other), _) => {
                        return Err(ScaleError::SchemaViolation {
                            register: name.clone(),
                            scale_factor: sf_name.into_owned(),
                            found: other.type_name(),
                        });
                    }
                    (None, _) => passthrough(value),
                }
            }
        };

        reading.values.insert(name.clone(), scaled);
    }

    reading
        .values
        .insert(TIMESTAMP_KEY.to_string(), ScaledValue::Timestamp(timestamp_ms));

    Ok(reading)
}

fn passthrough(value: &RawValue) -> ScaledValue {
    match value {
        RawValue::Int16(v) => ScaledValue::Int16(*v),
        RawValue::UInt16(v) => ScaledValue::UInt16(*v),
        RawValue::UInt32(v) => ScaledValue::UInt32(*v),
        RawValue::Text(text) => ScaledValue::Text(text.clone()),
    }
}
