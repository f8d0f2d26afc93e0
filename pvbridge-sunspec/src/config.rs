//! Configuration for the SunSpec bridge.

use std::time::Duration;

use serde::{Deserialize, Serialize};

use pvbridge_framework::{
    BridgeConfig, BridgeError, Format, LoggingConfig, MqttConfig, Qos, Result, validate_mqtt,
};

use crate::catalog::MAX_STRING_WORDS;
use crate::poller::PollTimings;

/// Complete bridge configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct SunspecBridgeConfig {
    /// MQTT connection settings
    #[serde(default)]
    pub mqtt: MqttConfig,

    /// Inverter connection settings
    #[serde(default)]
    pub device: DeviceConfig,

    /// Reconnect and shutdown delays
    #[serde(default)]
    pub resilience: ResilienceConfig,

    /// Payload format for readings
    #[serde(default)]
    pub serialization: Format,

    /// Logging configuration
    #[serde(default)]
    pub logging: LoggingConfig,
}

/// Connection settings for the inverter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DeviceConfig {
    /// Host address (IP or hostname)
    pub host: String,

    /// TCP port
    pub port: u16,

    /// Modbus unit/slave ID (1-247)
    pub unit_id: u8,

    /// Poll interval in milliseconds
    pub poll_interval_ms: u64,

    /// Connect and per-request timeout in milliseconds
    pub timeout_ms: u64,

    /// Length of the serial number register, in 16-bit words
    pub serial_number_words: u16,
}

impl Default for DeviceConfig {
    fn default() -> Self {
        Self {
            host: String::new(),
            port: 502,
            unit_id: 1,
            poll_interval_ms: 15_000,
            timeout_ms: 10_000,
            serial_number_words: 4,
        }
    }
}

/// Delays used when the link fails and on shutdown.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ResilienceConfig {
    /// Wait after a cycle that read nothing, before reconnecting
    pub link_failure_backoff_ms: u64,

    /// Wait after closing a link, before reconnecting
    pub close_grace_ms: u64,

    /// Wait between failed connection attempts
    pub connect_retry_delay_ms: u64,

    /// Wait after connecting, before the first read
    pub settle_delay_ms: u64,

    /// Wait after disconnecting from the broker, before exiting
    pub shutdown_grace_ms: u64,
}

impl Default for ResilienceConfig {
    fn default() -> Self {
        Self {
            link_failure_backoff_ms: 40_000,
            close_grace_ms: 2_000,
            connect_retry_delay_ms: 5_000,
            settle_delay_ms: 1_000,
            shutdown_grace_ms: 2_000,
        }
    }
}

/// Values taken from the command line or environment.
///
/// Each set value replaces the one from the configuration file.
#[derive(Debug, Clone, Default)]
pub struct Overrides {
    pub modbus_hostname: Option<String>,
    pub modbus_port: Option<u16>,
    pub modbus_slave_id: Option<u8>,
    pub modbus_poll_interval_ms: Option<u64>,
    pub mqtt_uri: Option<String>,
    pub mqtt_client_id: Option<String>,
    pub mqtt_username: Option<String>,
    pub mqtt_password: Option<String>,
    pub mqtt_qos: Option<u8>,
    pub mqtt_topic: Option<String>,
}

impl SunspecBridgeConfig {
    /// Apply command line and environment overrides.
    pub fn apply_overrides(&mut self, overrides: &Overrides) -> Result<()> {
        if let Some(host) = &overrides.modbus_hostname {
            self.device.host = host.clone();
        }
        if let Some(port) = overrides.modbus_port {
            self.device.port = port;
        }
        if let Some(unit_id) = overrides.modbus_slave_id {
            self.device.unit_id = unit_id;
        }
        if let Some(interval) = overrides.modbus_poll_interval_ms {
            self.device.poll_interval_ms = interval;
        }
        if let Some(uri) = &overrides.mqtt_uri {
            self.mqtt.uri = uri.clone();
        }
        if let Some(client_id) = &overrides.mqtt_client_id {
            self.mqtt.client_id = Some(client_id.clone());
        }
        if let Some(username) = &overrides.mqtt_username {
            self.mqtt.username = Some(username.clone());
        }
        if let Some(password) = &overrides.mqtt_password {
            self.mqtt.password = Some(password.clone());
        }
        if let Some(qos) = overrides.mqtt_qos {
            self.mqtt.qos = Qos::try_from(qos).map_err(BridgeError::validation)?;
        }
        if let Some(topic) = &overrides.mqtt_topic {
            self.mqtt.topic = topic.clone();
        }
        Ok(())
    }

    /// Delays for the poll loop.
    pub fn poll_timings(&self) -> PollTimings {
        PollTimings {
            poll_interval: Duration::from_millis(self.device.poll_interval_ms),
            link_failure_backoff: Duration::from_millis(self.resilience.link_failure_backoff_ms),
            close_grace: Duration::from_millis(self.resilience.close_grace_ms),
            connect_retry_delay: Duration::from_millis(self.resilience.connect_retry_delay_ms),
            settle_delay: Duration::from_millis(self.resilience.settle_delay_ms),
        }
    }

    /// Connect and per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.device.timeout_ms)
    }

    /// Grace period between broker disconnect and exit.
    pub fn shutdown_grace(&self) -> Duration {
        Duration::from_millis(self.resilience.shutdown_grace_ms)
    }
}

impl BridgeConfig for SunspecBridgeConfig {
    fn mqtt(&self) -> &MqttConfig {
        &self.mqtt
    }

    fn logging(&self) -> &LoggingConfig {
        &self.logging
    }

    fn serialization(&self) -> Format {
        self.serialization
    }

    fn validate(&self) -> Result<()> {
        if self.device.host.is_empty() {
            return Err(BridgeError::validation("No Modbus host provided"));
        }

        if !(1..=247).contains(&self.device.unit_id) {
            return Err(BridgeError::validation(format!(
                "Modbus unit_id must be 1-247, got {}",
                self.device.unit_id
            )));
        }

        if self.device.poll_interval_ms == 0 {
            return Err(BridgeError::validation(
                "Poll interval must be greater than zero",
            ));
        }

        if self.device.timeout_ms == 0 {
            return Err(BridgeError::validation(
                "Request timeout must be greater than zero",
            ));
        }

        if !(1..=MAX_STRING_WORDS).contains(&self.device.serial_number_words) {
            return Err(BridgeError::validation(format!(
                "serial_number_words must be 1-{}, got {}",
                MAX_STRING_WORDS, self.device.serial_number_words
            )));
        }

        validate_mqtt(&self.mqtt)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn minimal() -> SunspecBridgeConfig {
        json5::from_str(
            r#"{
                mqtt: { uri: "tcp://10.10.1.1:1883", topic: "solar/inverter" },
                device: { host: "10.10.1.20" },
            }"#,
        )
        .unwrap()
    }

    #[test]
    fn test_parse_defaults() {
        let config = minimal();
        config.validate().unwrap();

        assert_eq!(config.device.port, 502);
        assert_eq!(config.device.unit_id, 1);
        assert_eq!(config.device.poll_interval_ms, 15_000);
        assert_eq!(config.mqtt.qos, Qos::AtLeastOnce);
        assert_eq!(config.serialization, Format::Json);
        assert_eq!(config.poll_timings(), PollTimings::default());
        assert_eq!(config.shutdown_grace(), Duration::from_secs(2));
        assert_eq!(config.request_timeout(), Duration::from_secs(10));
    }

    #[test]
    fn test_parse_full_config() {
        let config: SunspecBridgeConfig = json5::from_str(
            r#"{
                mqtt: {
                    uri: "mqtt://broker.local",
                    client_id: "roof-inverter",
                    qos: 2,
                    topic: "home/solar",
                },
                device: {
                    host: "inverter.local",
                    port: 1502,
                    unit_id: 3,
                    poll_interval_ms: 5000,
                    serial_number_words: 16,
                },
                resilience: { link_failure_backoff_ms: 1000, settle_delay_ms: 0 },
                serialization: "cbor",
                logging: { level: "debug" },
            }"#,
        )
        .unwrap();

        config.validate().unwrap();
        assert_eq!(config.device.port, 1502);
        assert_eq!(config.device.unit_id, 3);
        assert_eq!(config.mqtt.qos, Qos::ExactlyOnce);
        assert_eq!(config.serialization, Format::Cbor);
        assert_eq!(config.resilience.close_grace_ms, 2_000);

        let timings = config.poll_timings();
        assert_eq!(timings.poll_interval, Duration::from_secs(5));
        assert_eq!(timings.link_failure_backoff, Duration::from_secs(1));
        assert_eq!(timings.settle_delay, Duration::ZERO);
    }

    #[test]
    fn test_overrides_win() {
        let mut config = minimal();
        config
            .apply_overrides(&Overrides {
                modbus_hostname: Some("192.168.0.7".to_string()),
                modbus_slave_id: Some(2),
                mqtt_qos: Some(0),
                mqtt_topic: Some("garage/inverter".to_string()),
                mqtt_username: Some("solar".to_string()),
                ..Default::default()
            })
            .unwrap();

        assert_eq!(config.device.host, "192.168.0.7");
        assert_eq!(config.device.unit_id, 2);
        assert_eq!(config.device.port, 502);
        assert_eq!(config.mqtt.qos, Qos::AtMostOnce);
        assert_eq!(config.mqtt.topic, "garage/inverter");
        assert_eq!(config.mqtt.username.as_deref(), Some("solar"));
        assert_eq!(config.mqtt.uri, "tcp://10.10.1.1:1883");
    }

    #[test]
    fn test_invalid_qos_override() {
        let mut config = minimal();
        let result = config.apply_overrides(&Overrides {
            mqtt_qos: Some(3),
            ..Default::default()
        });
        assert!(matches!(result, Err(BridgeError::ConfigValidation(_))));
    }

    #[test]
    fn test_validate_missing_host() {
        let mut config = minimal();
        config.device.host.clear();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_unit_id() {
        let mut config = minimal();
        config.device.unit_id = 0;
        assert!(config.validate().is_err());
        config.device.unit_id = 248;
        assert!(config.validate().is_err());
        config.device.unit_id = 247;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_validate_poll_interval() {
        let mut config = minimal();
        config.device.poll_interval_ms = 0;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_validate_mqtt() {
        let mut config = minimal();
        config.mqtt.topic.clear();
        assert!(config.validate().is_err());

        let mut config = minimal();
        config.mqtt.uri = "ws://broker:80".to_string();
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_config_file_optional() {
        let mut config = SunspecBridgeConfig::default();
        assert!(config.validate().is_err());

        config
            .apply_overrides(&Overrides {
                modbus_hostname: Some("10.10.1.20".to_string()),
                mqtt_uri: Some("tcp://10.10.1.1".to_string()),
                mqtt_topic: Some("solar".to_string()),
                ..Default::default()
            })
            .unwrap();
        config.validate().unwrap();
    }
}
