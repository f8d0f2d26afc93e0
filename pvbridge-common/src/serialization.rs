use serde::Serialize;

use crate::error::{Error, Result};

/// Serialization format for published readings.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Format {
    /// JSON format (human-readable, good for debugging).
    #[default]
    Json,

    /// CBOR format (compact binary, for constrained links).
    Cbor,
}

impl Format {
    /// Get the MIME type for this format.
    pub fn mime_type(&self) -> &'static str {
        match self {
            Format::Json => "application/json",
            Format::Cbor => "application/cbor",
        }
    }
}

/// Encode a value to bytes using the specified format.
pub fn encode<T: Serialize>(value: &T, format: Format) -> Result<Vec<u8>> {
    match format {
        Format::Json => serde_json::to_vec(value).map_err(Error::from),
        Format::Cbor => {
            let mut buf = Vec::new();
            ciborium::into_writer(value, &mut buf)?;
            Ok(buf)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;

    #[derive(Debug, PartialEq, Serialize, Deserialize)]
    struct Sample {
        #[serde(rename = "MeterId")]
        meter_id: Option<String>,
        #[serde(rename = "AC_Power")]
        ac_power: Option<f64>,
        time: i64,
    }

    fn sample() -> Sample {
        Sample {
            meter_id: Some("7E1A2B3C".to_string()),
            ac_power: None,
            time: 1_700_000_000_000,
        }
    }

    #[test]
    fn test_json_keeps_nulls() {
        let encoded = encode(&sample(), Format::Json).unwrap();
        let text = String::from_utf8(encoded).unwrap();
        assert_eq!(
            text,
            r#"{"MeterId":"7E1A2B3C","AC_Power":null,"time":1700000000000}"#
        );
    }

    #[test]
    fn test_cbor_encoding() {
        let encoded = encode(&sample(), Format::Cbor).unwrap();
        // Map with three entries.
        assert_eq!(encoded[0], 0xa3);

        let decoded: Sample = ciborium::from_reader(encoded.as_slice()).unwrap();
        assert_eq!(decoded, sample());
    }

    #[test]
    fn test_cbor_is_smaller() {
        let json = encode(&sample(), Format::Json).unwrap();
        let cbor = encode(&sample(), Format::Cbor).unwrap();

        assert!(cbor.len() < json.len(), "CBOR should be smaller than JSON");
    }

    #[test]
    fn test_mime_type() {
        assert_eq!(Format::Json.mime_type(), "application/json");
        assert_eq!(Format::Cbor.mime_type(), "application/cbor");
    }
}
