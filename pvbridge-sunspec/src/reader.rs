//! One pass over the catalog against an open device link.

use std::collections::BTreeMap;

use tracing::warn;

use crate::catalog::Catalog;
use crate::decode::{RawValue, decode};
use crate::link::RegisterRead;

/// A register that could not be read or decoded in this cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReadFailure {
    pub register: String,
    pub address: u16,
    pub error: String,
}

/// Outcome of one read pass.
#[derive(Debug, Clone, Default)]
pub struct ReadReport {
    /// Values actually obtained, keyed by register name.
    pub values: BTreeMap<String, RawValue>,
    /// Registers skipped this cycle.
    pub failures: Vec<ReadFailure>,
}

impl ReadReport {
    /// True when no register could be read at all.
    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Read every register in the catalog, in address order.
///
/// Failures are recorded and skipped; the pass always covers the whole
/// catalog.
pub async fn read_all<L: RegisterRead>(link: &mut L, catalog: &Catalog) -> ReadReport {
    let mut report = ReadReport::default();

    for register in catalog.iter() {
        let result = match link.read(register.address, register.word_count).await {
            Ok(words) => {
                decode(register.kind, register.word_count, &words).map_err(|e| e.to_string())
            }
            Err(e) => Err(e.to_string()),
        };

        match result {
            Ok(value) => {
                report.values.insert(register.name.to_string(), value);
            }
            Err(error) => {
                warn!(
                    register = %register.name,
                    address = register.address,
                    error = %error,
                    "Failed to read register"
                );
                report.failures.push(ReadFailure {
                    register: register.name.to_string(),
                    address: register.address,
                    error,
                });
            }
        }
    }

    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::catalog::{RegisterDescriptor, RegisterKind};
    use crate::link::LinkError;
    use std::collections::HashMap;

    /// Link backed by a fixed register image.
    struct ImageLink {
        words: HashMap<u16, u16>,
        requests: Vec<(u16, u16)>,
    }

    impl RegisterRead for ImageLink {
        async fn read(&mut self, address: u16, count: u16) -> Result<Vec<u16>, LinkError> {
            self.requests.push((address, count));
            (address..address + count)
                .map(|a| {
                    self.words
                        .get(&a)
                        .copied()
                        .ok_or_else(|| LinkError::Exception("IllegalDataAddress".to_string()))
                })
                .collect()
        }

        async fn close(&mut self) {}
    }

    fn catalog() -> Catalog {
        Catalog::new([
            RegisterDescriptor::fixed("I_AC_Power", 40083, RegisterKind::Int16),
            RegisterDescriptor::fixed("I_AC_Energy_WH", 40093, RegisterKind::Accumulator32),
            RegisterDescriptor::fixed("I_AC_Power_SF", 40084, RegisterKind::Int16),
            RegisterDescriptor::string("C_SerialNumber", 40052, 2),
        ])
        .unwrap()
    }

    #[tokio::test]
    async fn test_read_all_in_address_order() {
        let mut link = ImageLink {
            words: HashMap::from([
                (40052, 0x4142),
                (40053, 0x4300),
                (40083, 1500),
                (40084, 0xFFFF),
                (40093, 0x0001),
                (40094, 0x0000),
            ]),
            requests: Vec::new(),
        };

        let report = read_all(&mut link, &catalog()).await;

        assert_eq!(
            link.requests,
            vec![(40052, 2), (40083, 1), (40084, 1), (40093, 2)]
        );
        assert!(report.failures.is_empty());
        assert_eq!(report.values["I_AC_Power"], RawValue::Int16(1500));
        assert_eq!(report.values["I_AC_Power_SF"], RawValue::Int16(-1));
        assert_eq!(report.values["I_AC_Energy_WH"], RawValue::UInt32(65536));
        assert_eq!(report.values["C_SerialNumber"], RawValue::Text("ABC".to_string()));
    }

    #[tokio::test]
    async fn test_failures_are_skipped() {
        let mut link = ImageLink {
            words: HashMap::from([(40083, 1500), (40093, 0x0001)]),
            requests: Vec::new(),
        };

        let report = read_all(&mut link, &catalog()).await;

        assert_eq!(report.values.len(), 1);
        assert!(report.values.contains_key("I_AC_Power"));
        let failed: Vec<&str> = report.failures.iter().map(|f| f.register.as_str()).collect();
        assert_eq!(failed, vec!["C_SerialNumber", "I_AC_Power_SF", "I_AC_Energy_WH"]);
        assert_eq!(report.failures[1].address, 40084);
        assert!(!report.is_empty());
    }

    #[tokio::test]
    async fn test_short_response_is_a_failure() {
        struct ShortLink;

        impl RegisterRead for ShortLink {
            async fn read(&mut self, _address: u16, _count: u16) -> Result<Vec<u16>, LinkError> {
                Ok(vec![0x0001])
            }

            async fn close(&mut self) {}
        }

        let catalog = Catalog::new([RegisterDescriptor::fixed(
            "I_AC_Energy_WH",
            40093,
            RegisterKind::Accumulator32,
        )])
        .unwrap();

        let report = read_all(&mut ShortLink, &catalog).await;
        assert!(report.is_empty());
        assert_eq!(report.failures.len(), 1);
        assert!(report.failures[0].error.contains("Expected 2 registers"));
    }
}
