use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::telemetry::Qos;

/// Default MQTT broker port when the URI does not carry one.
pub const DEFAULT_MQTT_PORT: u16 = 1883;

/// Common MQTT connection configuration.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct MqttConfig {
    /// Broker URI, e.g. `tcp://10.10.1.1:1883`.
    #[serde(default)]
    pub uri: String,

    /// Client identifier. Generated when not set.
    #[serde(default)]
    pub client_id: Option<String>,

    /// Optional username.
    #[serde(default)]
    pub username: Option<String>,

    /// Optional password.
    #[serde(default)]
    pub password: Option<String>,

    /// Quality of service for published readings.
    #[serde(default)]
    pub qos: Qos,

    /// Topic readings are published to.
    #[serde(default)]
    pub topic: String,

    /// Keep-alive interval in seconds.
    #[serde(default = "default_keep_alive")]
    pub keep_alive_secs: u64,

    /// Start with a clean session.
    #[serde(default)]
    pub clean_session: bool,
}

fn default_keep_alive() -> u64 {
    30
}

impl Default for MqttConfig {
    fn default() -> Self {
        Self {
            uri: String::new(),
            client_id: None,
            username: None,
            password: None,
            qos: Qos::default(),
            topic: String::new(),
            keep_alive_secs: default_keep_alive(),
            clean_session: false,
        }
    }
}

impl MqttConfig {
    /// Split the broker URI into host and port.
    ///
    /// Accepts `tcp://host:port`, `mqtt://host:port` and bare `host[:port]`.
    pub fn broker_address(&self) -> Result<(String, u16)> {
        let rest = match self.uri.split_once("://") {
            Some(("tcp" | "mqtt", rest)) => rest,
            Some((scheme, _)) => {
                return Err(Error::BrokerUri(format!(
                    "unsupported scheme '{}' in '{}'",
                    scheme, self.uri
                )));
            }
            None => self.uri.as_str(),
        };
        let rest = rest.trim_end_matches('/');

        let (host, port) = match rest.rsplit_once(':') {
            Some((host, port)) => {
                let port = port.parse::<u16>().map_err(|e| {
                    Error::BrokerUri(format!("invalid port '{}' in '{}': {}", port, self.uri, e))
                })?;
                (host, port)
            }
            None => (rest, DEFAULT_MQTT_PORT),
        };

        if host.is_empty() {
            return Err(Error::BrokerUri(format!("missing host in '{}'", self.uri)));
        }

        Ok((host.to_string(), port))
    }

    /// The configured client id, or a generated `pvbridge-<12 hex>` id.
    pub fn resolve_client_id(&self) -> String {
        match &self.client_id {
            Some(id) if !id.is_empty() => id.clone(),
            _ => {
                let id = uuid::Uuid::new_v4().simple().to_string();
                format!("pvbridge-{}", &id[..12])
            }
        }
    }
}

/// Log output format.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    /// Human-readable text format (default).
    #[default]
    Text,
    /// Structured JSON format.
    Json,
}

/// Common logging configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    #[serde(default = "default_log_level")]
    pub level: String,

    /// Log output format: "text" or "json".
    #[serde(default)]
    pub format: LogFormat,
}

fn default_log_level() -> String {
    "info".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            format: LogFormat::default(),
        }
    }
}
