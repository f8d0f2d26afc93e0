//! Decoding of raw holding-register words into typed values.

use thiserror::Error;

use crate::catalog::RegisterKind;

/// Decoding errors.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum DecodeError {
    #[error("Expected {expected} registers for {kind}, got {actual}")]
    ShortResponse {
        kind: RegisterKind,
        expected: u16,
        actual: usize,
    },
}

/// A register value as read from the device, before scaling.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RawValue {
    Int16(i16),
    UInt16(u16),
    UInt32(u32),
    Text(String),
}

impl RawValue {
    /// Integer value widened to `f64`, or `None` for text.
    pub fn as_f64(&self) -> Option<f64> {
        match self {
            RawValue::Int16(v) => Some(f64::from(*v)),
            RawValue::UInt16(v) => Some(f64::from(*v)),
            RawValue::UInt32(v) => Some(f64::from(*v)),
            RawValue::Text(_) => None,
        }
    }

    /// Name of the variant, for diagnostics.
    pub fn type_name(&self) -> &'static str {
        match self {
            RawValue::Int16(_) => "int16",
            RawValue::UInt16(_) => "uint16",
            RawValue::UInt32(_) => "uint32",
            RawValue::Text(_) => "string",
        }
    }
}

/// Decode the words of one register according to its kind.
///
/// All multi-word values are big-endian (high word first). Strings use the
/// high byte of each word first; trailing NULs and whitespace are trimmed.
pub fn decode(
    kind: RegisterKind,
    word_count: u16,
    words: &[u16],
) -> Result<RawValue, DecodeError> {
    let expected = match kind {
        RegisterKind::Int16 | RegisterKind::UInt16 => 1,
        RegisterKind::UInt32 | RegisterKind::Accumulator32 => 2,
        RegisterKind::String => word_count,
    };

    if words.len() < expected as usize {
        return Err(DecodeError::ShortResponse {
            kind,
            expected,
            actual: words.len(),
        });
    }

    let value = match kind {
        RegisterKind::Int16 => RawValue::Int16(words[0] as i16),
        RegisterKind::UInt16 => RawValue::UInt16(words[0]),
        RegisterKind::UInt32 | RegisterKind::Accumulator32 => {
            RawValue::UInt32(((words[0] as u32) << 16) | (words[1] as u32))
        }
        RegisterKind::String => {
            let bytes: Vec<u8> = words[..expected as usize]
                .iter()
                .flat_map(|word| word.to_be_bytes())
                .collect();
            let text = String::from_utf8_lossy(&bytes);
            RawValue::Text(
                text.trim_end_matches(|c: char| c == '\0' || c.is_whitespace())
                    .to_string(),
            )
        }
    };

    Ok(value)
}
