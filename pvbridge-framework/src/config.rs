//! Configuration traits and utilities.

use std::path::Path;

use serde::de::DeserializeOwned;

use crate::error::{BridgeError, Result};
use crate::{Format, LoggingConfig, MqttConfig};

/// Configuration of a bridge binary.
///
/// The implementor owns the MQTT and logging sections; everything else is
/// protocol specific and checked in an overridden [`validate`](Self::validate),
/// which should call [`validate_mqtt`] to keep the broker checks.
pub trait BridgeConfig: Sized + DeserializeOwned {
    fn mqtt(&self) -> &MqttConfig;

    fn logging(&self) -> &LoggingConfig;

    /// Serialization format for published telemetry.
    fn serialization(&self) -> Format {
        Format::Json
    }

    /// Topic telemetry is published to.
    fn topic(&self) -> &str {
        &self.mqtt().topic
    }

    /// Checked by [`load`](Self::load). The default only checks the broker
    /// settings.
    fn validate(&self) -> Result<()> {
        validate_mqtt(self.mqtt())
    }

    /// Parse a JSON5 file without validating it, for configs that still
    /// receive command line overrides.
    fn read(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = match std::fs::read_to_string(path) {
            Ok(content) => content,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                return Err(BridgeError::ConfigNotFound {
                    path: path.display().to_string(),
                });
            }
            Err(e) => return Err(e.into()),
        };
        Ok(json5::from_str(&content)?)
    }

    /// Parse a JSON5 file and validate it.
    fn load(path: impl AsRef<Path>) -> Result<Self> {
        let config = Self::read(path)?;
        config.validate()?;
        Ok(config)
    }
}

/// Broker checks shared by every bridge: a parseable URI and a topic.
pub fn validate_mqtt(mqtt: &MqttConfig) -> Result<()> {
    if mqtt.uri.is_empty() {
        return Err(BridgeError::validation("mqtt.uri is empty"));
    }
    mqtt.broker_address()
        .map_err(|e| BridgeError::validation(e.to_string()))?;
    if mqtt.topic.is_empty() {
        return Err(BridgeError::validation("mqtt.topic is empty"));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use std::io::Write;

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }
    }

    fn write_temp(name: &str, content: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(format!("pvbridge-{}-{}", std::process::id(), name));
        let mut file = std::fs::File::create(&path).unwrap();
        file.write_all(content.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_config_not_found() {
        let result = TestConfig::load("/nonexistent/path.json5");
        assert!(matches!(result, Err(BridgeError::ConfigNotFound { .. })));
    }

    #[test]
    fn test_load_validates() {
        let path = write_temp("no-topic.json5", r#"{ mqtt: { uri: "tcp://broker:1883" } }"#);

        assert!(TestConfig::read(&path).is_ok());
        assert!(matches!(
            TestConfig::load(&path),
            Err(BridgeError::ConfigValidation(_))
        ));

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_load_valid() {
        let path = write_temp(
            "valid.json5",
            r#"{ mqtt: { uri: "tcp://broker:1883", topic: "solar" } }"#,
        );

        let config = TestConfig::load(&path).unwrap();
        assert_eq!(config.topic(), "solar");
        assert_eq!(config.serialization(), Format::Json);

        std::fs::remove_file(path).ok();
    }

    #[test]
    fn test_parse_error() {
        let path = write_temp("broken.json5", "{ mqtt: ");
        assert!(matches!(
            TestConfig::read(&path),
            Err(BridgeError::ConfigParse(_))
        ));
        std::fs::remove_file(path).ok();
    }
}
