//! Mapping of scaled SunSpec values onto the canonical reading published
//! to MQTT.

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

use crate::scaling::{ScaledReading, ScaledValue, TIMESTAMP_KEY};

/// Mapping errors. Each affects only the field it names.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum MappingError {
    #[error("Field '{field}' from '{register}' expects {expected}, got {found}")]
    TypeMismatch {
        register: &'static str,
        field: &'static str,
        expected: &'static str,
        found: &'static str,
    },
}

/// One inverter reading in the published schema.
///
/// Fields serialize in declaration order; absent values become `null`.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct CanonicalReading {
    #[serde(rename = "MeterId")]
    pub meter_id: Option<String>,
    #[serde(rename = "AC_Voltage_L1_N")]
    pub ac_voltage_l1_n: Option<f64>,
    #[serde(rename = "AC_Voltage_L2_N")]
    pub ac_voltage_l2_n: Option<f64>,
    #[serde(rename = "AC_Voltage_L3_N")]
    pub ac_voltage_l3_n: Option<f64>,
    #[serde(rename = "AC_Power")]
    pub ac_power: Option<f64>,
    #[serde(rename = "AC_Frequency")]
    pub ac_frequency: Option<f64>,
    #[serde(rename = "AC_VA")]
    pub ac_va: Option<f64>,
    #[serde(rename = "AC_VAR")]
    pub ac_var: Option<f64>,
    #[serde(rename = "AC_PF")]
    pub ac_pf: Option<f64>,
    #[serde(rename = "AC_Energy_WH")]
    pub ac_energy_wh: Option<f64>,
    #[serde(rename = "DC_Current")]
    pub dc_current: Option<f64>,
    #[serde(rename = "DC_Voltage")]
    pub dc_voltage: Option<f64>,
    #[serde(rename = "DC_Power")]
    pub dc_power: Option<f64>,
    #[serde(rename = "Temp_Sink")]
    pub temp_sink: Option<f64>,
    #[serde(rename = "InverterStatus")]
    pub inverter_status: Option<u16>,
    /// Poll time in milliseconds since the Unix epoch.
    pub time: Option<i64>,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum Field {
    MeterId,
    AcVoltageL1N,
    AcVoltageL2N,
    AcVoltageL3N,
    AcPower,
    AcFrequency,
    AcVa,
    AcVar,
    AcPf,
    AcEnergyWh,
    DcCurrent,
    DcVoltage,
    DcPower,
    TempSink,
    InverterStatus,
    Time,
}

impl Field {
    fn payload_name(&self) -> &'static str {
        match self {
            Field::MeterId => "MeterId",
            Field::AcVoltageL1N => "AC_Voltage_L1_N",
            Field::AcVoltageL2N => "AC_Voltage_L2_N",
            Field::AcVoltageL3N => "AC_Voltage_L3_N",
            Field::AcPower => "AC_Power",
            Field::AcFrequency => "AC_Frequency",
            Field::AcVa => "AC_VA",
            Field::AcVar => "AC_VAR",
            Field::AcPf => "AC_PF",
            Field::AcEnergyWh => "AC_Energy_WH",
            Field::DcCurrent => "DC_Current",
            Field::DcVoltage => "DC_Voltage",
            Field::DcPower => "DC_Power",
            Field::TempSink => "Temp_Sink",
            Field::InverterStatus => "InverterStatus",
            Field::Time => "time",
        }
    }

    fn expected(&self) -> &'static str {
        match self {
            Field::MeterId => "string",
            Field::InverterStatus => "uint16",
            Field::Time => "timestamp",
            _ => "float",
        }
    }
}

/// Source register for each canonical field.
const FIELD_MAP: &[(&str, Field)] = &[
    ("C_SerialNumber", Field::MeterId),
    ("I_AC_VoltageAN", Field::AcVoltageL1N),
    ("I_AC_VoltageBN", Field::AcVoltageL2N),
    ("I_AC_VoltageCN", Field::AcVoltageL3N),
    ("I_AC_Power", Field::AcPower),
    ("I_AC_Frequency", Field::AcFrequency),
    ("I_AC_VA", Field::AcVa),
    ("I_AC_VAR", Field::AcVar),
    ("I_AC_PF", Field::AcPf),
    ("I_AC_Energy_WH", Field::AcEnergyWh),
    ("I_DC_Current", Field::DcCurrent),
    ("I_DC_Voltage", Field::DcVoltage),
    ("I_DC_Power", Field::DcPower),
    ("I_Temp_Sink", Field::TempSink),
    ("I_Status", Field::InverterStatus),
    (TIMESTAMP_KEY, Field::Time),
];

impl CanonicalReading {
    /// Build a canonical reading from one cycle of scaled values.
    ///
    /// Fields whose source is missing stay `None`. A source of the wrong
    /// type is logged and reported, and the field stays `None`.
    pub fn from_scaled(scaled: &ScaledReading) -> (Self, Vec<MappingError>) {
        let mut reading = Self::default();
        let mut errors = Vec::new();

        for &(register, field) in FIELD_MAP {
            let Some(value) = scaled.get(register) else {
                continue;
            };

            if !reading.assign(field, value) {
                let error = MappingError::TypeMismatch {
                    register,
                    field: field.payload_name(),
                    expected: field.expected(),
                    found: value.type_name(),
                };
                warn!(register = %register, error = %error, "Skipping field");
                errors.push(error);
            }
        }

        (reading, errors)
    }

    /// Decoded operating state, if the status code was read.
    pub fn inverter_state(&self) -> Option<InverterState> {
        self.inverter_status.map(InverterState::from_code)
    }

    fn assign(&mut self, field: Field, value: &ScaledValue) -> bool {
        match (field, value) {
            (Field::MeterId, ScaledValue::Text(text)) => self.meter_id = Some(text.clone()),
            (Field::InverterStatus, ScaledValue::UInt16(code)) => {
                self.inverter_status = Some(*code)
            }
            (Field::Time, ScaledValue::Timestamp(ms)) => self.time = Some(*ms),
            (field, ScaledValue::Float(v)) => match self.float_slot(field) {
                Some(slot) => *slot = Some(*v),
                None => return false,
            },
            _ => return false,
        }
        true
    }

    fn float_slot(&mut self, field: Field) -> Option<&mut Option<f64>> {
        match field {
            Field::AcVoltageL1N => Some(&mut self.ac_voltage_l1_n),
            Field::AcVoltageL2N => Some(&mut self.ac_voltage_l2_n),
            Field::AcVoltageL3N => Some(&mut self.ac_voltage_l3_n),
            Field::AcPower => Some(&mut self.ac_power),
            Field::AcFrequency => Some(&mut self.ac_frequency),
            Field::AcVa => Some(&mut self.ac_va),
            Field::AcVar => Some(&mut self.ac_var),
            Field::AcPf => Some(&mut self.ac_pf),
            Field::AcEnergyWh => Some(&mut self.ac_energy_wh),
            Field::DcCurrent => Some(&mut self.dc_current),
            Field::DcVoltage => Some(&mut self.dc_voltage),
            Field::DcPower => Some(&mut self.dc_power),
            Field::TempSink => Some(&mut self.temp_sink),
            Field::MeterId | Field::InverterStatus | Field::Time => None,
        }
    }
}

/// SunSpec inverter operating state (`I_Status`).
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InverterState {
    Off,
    Sleeping,
    Starting,
    /// Producing power at the maximum power point.
    Mppt,
    Throttled,
    ShuttingDown,
    Fault,
    Standby,
    Unknown(u16),
}

impl InverterState {
    /// Decode a raw status code.
    pub fn from_code(code: u16) -> Self {
        match code {
            1 => InverterState::Off,
            2 => InverterState::Sleeping,
            3 => InverterState::Starting,
            4 => InverterState::Mppt,
            5 => InverterState::Throttled,
            6 => InverterState::ShuttingDown,
            7 => InverterState::Fault,
            8 => InverterState::Standby,
            other => InverterState::Unknown(other),
        }
    }
}

impl std::fmt::Display for InverterState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            InverterState::Off => write!(f, "off"),
            InverterState::Sleeping => write!(f, "sleeping"),
            InverterState::Starting => write!(f, "starting"),
            InverterState::Mppt => write!(f, "mppt"),
            InverterState::Throttled => write!(f, "throttled"),
            InverterState::ShuttingDown => write!(f, "shutting down"),
            InverterState::Fault => write!(f, "fault"),
            InverterState::Standby => write!(f, "standby"),
            InverterState::Unknown(code) => write!(f, "unknown ({})", code),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn scaled(entries: &[(&str, ScaledValue)]) -> ScaledReading {
        ScaledReading {
            values: entries
                .iter()
                .map(|(name, value)| (name.to_string(), value.clone()))
                .collect(),
        }
    }

    #[test]
    fn test_status_maps_to_inverter_status() {
        let (reading, errors) =
            CanonicalReading::from_scaled(&scaled(&[("I_Status", ScaledValue::UInt16(4))]));

        assert!(errors.is_empty());
        assert_eq!(reading.inverter_status, Some(4));
        assert_eq!(reading.inverter_state(), Some(InverterState::Mppt));
    }

    #[test]
    fn test_partial_reading() {
        let (reading, errors) = CanonicalReading::from_scaled(&scaled(&[
            ("I_AC_VoltageAN", ScaledValue::Float(240.0)),
            ("C_SerialNumber", ScaledValue::Text("7E1A2B3C".to_string())),
            ("C_SunSpec_DID", ScaledValue::UInt16(103)),
            (TIMESTAMP_KEY, ScaledValue::Timestamp(1_700_000_000_000)),
        ]));

        assert!(errors.is_empty());
        assert_eq!(
            reading,
            CanonicalReading {
                meter_id: Some("7E1A2B3C".to_string()),
                ac_voltage_l1_n: Some(240.0),
                time: Some(1_700_000_000_000),
                ..Default::default()
            }
        );
    }

    #[test]
    fn test_type_mismatch_leaves_field_absent() {
        let (reading, errors) = CanonicalReading::from_scaled(&scaled(&[
            ("I_AC_Power", ScaledValue::Int16(1500)),
            ("I_DC_Power", ScaledValue::Float(1550.0)),
        ]));

        assert_eq!(reading.ac_power, None);
        assert_eq!(reading.dc_power, Some(1550.0));
        assert_eq!(
            errors,
            vec![MappingError::TypeMismatch {
                register: "I_AC_Power",
                field: "AC_Power",
                expected: "float",
                found: "int16",
            }]
        );
    }

    #[test]
    fn test_serialized_field_order() {
        let reading = CanonicalReading {
            ac_power: Some(1500.0),
            inverter_status: Some(4),
            ..Default::default()
        };

        let json = serde_json::to_string(&reading).unwrap();
        assert_eq!(
            json,
            concat!(
                r#"{"MeterId":null,"AC_Voltage_L1_N":null,"AC_Voltage_L2_N":null,"#,
                r#""AC_Voltage_L3_N":null,"AC_Power":1500.0,"AC_Frequency":null,"#,
                r#""AC_VA":null,"AC_VAR":null,"AC_PF":null,"AC_Energy_WH":null,"#,
                r#""DC_Current":null,"DC_Voltage":null,"DC_Power":null,"#,
                r#""Temp_Sink":null,"InverterStatus":4,"time":null}"#
            )
        );
    }

    #[test]
    fn test_inverter_state_codes() {
        assert_eq!(InverterState::from_code(1), InverterState::Off);
        assert_eq!(InverterState::from_code(7), InverterState::Fault);
        assert_eq!(InverterState::from_code(8), InverterState::Standby);
        assert_eq!(InverterState::from_code(42), InverterState::Unknown(42));
        assert_eq!(InverterState::Unknown(42).to_string(), "unknown (42)");
    }
}
