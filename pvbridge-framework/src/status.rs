//! Bridge status reporting.
//!
//! Status messages are retained on `<topic>/status`. The `offline` status
//! doubles as the MQTT last will, so subscribers also learn about a bridge
//! that vanished without disconnecting.

use rumqttc::LastWill;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use crate::Result;
use crate::publisher::Publisher;

/// Topic suffix for status messages, relative to the telemetry topic.
pub const STATUS_SUFFIX: &str = "status";

/// Lifecycle state reported by a bridge.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum BridgeState {
    Running,
    Offline,
    /// Stopped because of a fatal error.
    Error,
}

/// A status message.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BridgeStatus {
    pub bridge: String,
    pub version: String,
    pub status: BridgeState,
    /// Extra top-level fields (device, interval, error message...).
    #[serde(flatten)]
    pub metadata: Map<String, Value>,
}

impl BridgeStatus {
    pub fn new(bridge: impl Into<String>, version: impl Into<String>, status: BridgeState) -> Self {
        Self {
            bridge: bridge.into(),
            version: version.into(),
            status,
            metadata: Map::new(),
        }
    }

    pub fn running(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, BridgeState::Running)
    }

    pub fn offline(bridge: impl Into<String>, version: impl Into<String>) -> Self {
        Self::new(bridge, version, BridgeState::Offline)
    }

    pub fn error(
        bridge: impl Into<String>,
        version: impl Into<String>,
        error: impl Into<String>,
    ) -> Self {
        let mut status = Self::new(bridge, version, BridgeState::Error);
        status
            .metadata
            .insert("error".to_string(), Value::String(error.into()));
        status
    }

    /// Merge the fields of a JSON object into the status.
    ///
    /// Non-object values are stored under a `metadata` key.
    pub fn with_metadata(mut self, metadata: Value) -> Self {
        match metadata {
            Value::Object(fields) => self.metadata.extend(fields),
            Value::Null => {}
            other => {
                self.metadata.insert("metadata".to_string(), other);
            }
        }
        self
    }

    /// Status topic for a telemetry topic.
    pub fn topic(telemetry_topic: &str) -> String {
        format!("{}/{}", telemetry_topic, STATUS_SUFFIX)
    }

    /// Publish this status, retained, to `{topic}/status`.
    pub async fn publish(&self, publisher: &Publisher) -> Result<()> {
        publisher
            .publish_json(&Self::topic(publisher.topic()), self, true)
            .await
    }

    /// Build an MQTT last will carrying this status.
    pub fn last_will(&self, topic: &str) -> Result<LastWill> {
        let payload = serde_json::to_vec(self)?;
        Ok(LastWill::new(
            Self::topic(topic),
            payload,
            rumqttc::QoS::AtLeastOnce,
            true,
        ))
    }
}

/// Publishes the status of one bridge instance.
///
/// Metadata given with the `running` status is repeated on later statuses.
pub struct StatusPublisher {
    publisher: Publisher,
    bridge_name: String,
    version: String,
    metadata: Map<String, Value>,
}

impl StatusPublisher {
    pub fn new(
        publisher: Publisher,
        bridge_name: impl Into<String>,
        version: impl Into<String>,
    ) -> Self {
        Self {
            publisher,
            bridge_name: bridge_name.into(),
            version: version.into(),
            metadata: Map::new(),
        }
    }

    /// Publish "running" and remember `metadata` for later statuses.
    pub async fn publish_running(&mut self, metadata: Option<Value>) -> Result<()> {
        if let Some(Value::Object(fields)) = metadata {
            self.metadata = fields;
        }
        self.send(BridgeStatus::running(&self.bridge_name, &self.version))
            .await
    }

    /// Publish "offline".
    pub async fn publish_offline(&self) -> Result<()> {
        self.send(BridgeStatus::offline(&self.bridge_name, &self.version))
            .await
    }

    /// Publish "error" with the error message.
    pub async fn publish_error(&self, error: impl Into<String>) -> Result<()> {
        self.send(BridgeStatus::error(&self.bridge_name, &self.version, error))
            .await
    }

    async fn send(&self, mut status: BridgeStatus) -> Result<()> {
        for (key, value) in &self.metadata {
            status.metadata.entry(key.clone()).or_insert_with(|| value.clone());
        }
        tracing::debug!(status = ?status.status, "Publishing bridge status");
        status.publish(&self.publisher).await
    }
}
