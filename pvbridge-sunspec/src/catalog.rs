//! SunSpec register catalog for SolarEdge inverters.
//!
//! The catalog is an immutable table built once at startup. Scale-factor
//! companions follow the `<name>_SF` convention, except for a few registers
//! that share one exponent register (see [`scale_factor_name`]).

use std::borrow::Cow;
use std::collections::HashSet;

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Suffix marking a scale-factor register.
pub const SCALE_FACTOR_SUFFIX: &str = "_SF";

/// Largest string register the catalog accepts, in 16-bit words.
pub const MAX_STRING_WORDS: u16 = 16;

/// Registers whose scale factor does not follow the `<name>_SF` rule.
const SCALE_FACTOR_EXCEPTIONS: &[(&str, &str)] = &[
    ("I_AC_Current", "I_AC_Current_SF"),
    ("I_AC_CurrentA", "I_AC_Current_SF"),
    ("I_AC_CurrentB", "I_AC_Current_SF"),
    ("I_AC_CurrentC", "I_AC_Current_SF"),
    ("I_AC_VoltageAB", "I_AC_Voltage_SF"),
    ("I_AC_VoltageBC", "I_AC_Voltage_SF"),
    ("I_AC_VoltageCA", "I_AC_Voltage_SF"),
    ("I_AC_VoltageAN", "I_AC_Voltage_SF"),
    ("I_AC_VoltageBN", "I_AC_Voltage_SF"),
    ("I_AC_VoltageCN", "I_AC_Voltage_SF"),
    ("I_Temp_Sink", "I_Temp_SF"),
];

/// Catalog errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum CatalogError {
    #[error("Duplicate register name '{0}'")]
    DuplicateName(String),
    #[error("String register '{name}' has invalid length {words} (1-{max} words)")]
    InvalidStringLength { name: String, words: u16, max: u16 },
}

/// Primitive type of a register as laid out in the SunSpec map.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RegisterKind {
    /// Signed 16-bit integer (also used for scale factors).
    Int16,
    /// Unsigned 16-bit integer.
    UInt16,
    /// Unsigned 32-bit integer (2 registers, big-endian).
    UInt32,
    /// Text spanning a fixed number of registers.
    String,
    /// 32-bit accumulator (2 registers, big-endian).
    Accumulator32,
}

impl RegisterKind {
    /// Return the string name for this register kind.
    pub fn as_str(&self) -> &'static str {
        match self {
            RegisterKind::Int16 => "int16",
            RegisterKind::UInt16 => "uint16",
            RegisterKind::UInt32 => "uint32",
            RegisterKind::String => "string",
            RegisterKind::Accumulator32 => "acc32",
        }
    }

    /// Number of 16-bit registers for fixed-width kinds.
    fn fixed_words(&self) -> Option<u16> {
        match self {
            RegisterKind::Int16 | RegisterKind::UInt16 => Some(1),
            RegisterKind::UInt32 | RegisterKind::Accumulator32 => Some(2),
            RegisterKind::String => None,
        }
    }
}

impl std::fmt::Display for RegisterKind {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One register in the catalog.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisterDescriptor {
    /// Symbolic SunSpec name, unique within the catalog.
    pub name: Cow<'static, str>,
    /// Holding register address as sent on the wire.
    pub address: u16,
    /// Number of 16-bit registers to read.
    pub word_count: u16,
    /// Primitive type.
    pub kind: RegisterKind,
}

impl RegisterDescriptor {
    /// Descriptor for a fixed-width kind; the word count follows from the kind.
    pub const fn fixed(name: &'static str, address: u16, kind: RegisterKind) -> Self {
        let word_count = match kind {
            RegisterKind::UInt32 | RegisterKind::Accumulator32 => 2,
            _ => 1,
        };
        Self {
            name: Cow::Borrowed(name),
            address,
            word_count,
            kind,
        }
    }

    /// Descriptor for a string spanning `word_count` registers.
    pub const fn string(name: &'static str, address: u16, word_count: u16) -> Self {
        Self {
            name: Cow::Borrowed(name),
            address,
            word_count,
            kind: RegisterKind::String,
        }
    }

    /// Whether this register is a scale-factor (exponent) register.
    pub fn is_scale_factor(&self) -> bool {
        is_scale_factor(&self.name)
    }
}

/// Whether `name` follows the scale-factor naming convention.
pub fn is_scale_factor(name: &str) -> bool {
    name.ends_with(SCALE_FACTOR_SUFFIX)
}

/// Name of the scale-factor register for `name`.
///
/// The exception list is consulted before the `<name>_SF` rule.
pub fn scale_factor_name(name: &str) -> Cow<'static, str> {
    SCALE_FACTOR_EXCEPTIONS
        .iter()
        .find(|(register, _)| *register == name)
        .map(|(_, sf)| Cow::Borrowed(*sf))
        .unwrap_or_else(|| Cow::Owned(format!("{}{}", name, SCALE_FACTOR_SUFFIX)))
}

/// SolarEdge inverter registers (SunSpec common block and inverter model).
const SOLAREDGE_REGISTERS: &[RegisterDescriptor] = &[
    RegisterDescriptor::string("C_SerialNumber", 40052, 4),
    // 101 = single phase, 102 = split phase, 103 = three phase
    RegisterDescriptor::fixed("C_SunSpec_DID", 40069, RegisterKind::UInt16),
    RegisterDescriptor::fixed("C_SunSpec_Length", 40070, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_Current", 40071, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_CurrentA", 40072, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_CurrentB", 40073, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_CurrentC", 40074, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_Current_SF", 40075, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_VoltageAB", 40076, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_VoltageBC", 40077, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_VoltageCA", 40078, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_VoltageAN", 40079, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_VoltageBN", 40080, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_VoltageCN", 40081, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_Voltage_SF", 40082, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_Power", 40083, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_Power_SF", 40084, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_Frequency", 40085, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_AC_Frequency_SF", 40086, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_VA", 40087, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_VA_SF", 40088, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_VAR", 40089, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_VAR_SF", 40090, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_PF", 40091, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_PF_SF", 40092, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_AC_Energy_WH", 40093, RegisterKind::Accumulator32),
    // Documented as uint16 by the vendor, but it is a signed exponent.
    RegisterDescriptor::fixed("I_AC_Energy_WH_SF", 40095, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_DC_Current", 40096, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_DC_Current_SF", 40097, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_DC_Voltage", 40098, RegisterKind::UInt16),
    RegisterDescriptor::fixed("I_DC_Voltage_SF", 40099, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_DC_Power", 40100, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_DC_Power_SF", 40101, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_Temp_Sink", 40103, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_Temp_SF", 40106, RegisterKind::Int16),
    RegisterDescriptor::fixed("I_Status", 40107, RegisterKind::UInt16),
    // Vendor-defined operating state and error codes
    RegisterDescriptor::fixed("I_Status_Vendor", 40108, RegisterKind::UInt16),
];

/// Immutable register catalog, ordered by address.
#[derive(Debug, Clone)]
pub struct Catalog {
    registers: Vec<RegisterDescriptor>,
}

impl Catalog {
    /// Build a catalog, rejecting duplicate names and bad string lengths.
    ///
    /// Fixed-width descriptors get their word count normalized from the kind.
    pub fn new(
        registers: impl IntoIterator<Item = RegisterDescriptor>,
    ) -> Result<Self, CatalogError> {
        let mut seen = HashSet::new();
        let mut registers: Vec<RegisterDescriptor> = registers
            .into_iter()
            .map(|mut register| {
                if let Some(words) = register.kind.fixed_words() {
                    register.word_count = words;
                }
                register
            })
            .collect();

        for register in &registers {
            if !seen.insert(register.name.clone()) {
                return Err(CatalogError::DuplicateName(register.name.to_string()));
            }
            if register.kind == RegisterKind::String
                && !(1..=MAX_STRING_WORDS).contains(&register.word_count)
            {
                return Err(CatalogError::InvalidStringLength {
                    name: register.name.to_string(),
                    words: register.word_count,
                    max: MAX_STRING_WORDS,
                });
            }
        }

        registers.sort_by_key(|register| register.address);
        Ok(Self { registers })
    }

    /// The built-in SolarEdge catalog.
    ///
    /// `serial_number_words` sets the length of `C_SerialNumber`.
    pub fn solaredge(serial_number_words: u16) -> Result<Self, CatalogError> {
        Self::new(SOLAREDGE_REGISTERS.iter().cloned().map(|mut register| {
            if register.kind == RegisterKind::String && register.name == "C_SerialNumber" {
                register.word_count = serial_number_words;
            }
            register
        }))
    }

    /// Look up a register by name.
    pub fn lookup(&self, name: &str) -> Option<&RegisterDescriptor> {
        self.registers.iter().find(|register| register.name == name)
    }

    /// Iterate over all registers in address order.
    pub fn iter(&self) -> impl Iterator<Item = &RegisterDescriptor> {
        self.registers.iter()
    }

    /// Number of registers in the catalog.
    pub fn len(&self) -> usize {
        self.registers.len()
    }

    /// Whether the catalog is empty.
    pub fn is_empty(&self) -> bool {
        self.registers.is_empty()
    }
}
