//! Telemetry publisher for MQTT.

use rumqttc::AsyncClient;
use serde::Serialize;

use pvbridge_common::{Format, Qos, encode};

use crate::error::{BridgeError, Result};

/// Publisher for sending telemetry to an MQTT broker.
///
/// Wraps an `rumqttc` client handle and provides convenient methods for
/// publishing serializable values with automatic encoding. Cloning is cheap;
/// all clones share the same connection.
#[derive(Clone, Debug)]
pub struct Publisher {
    client: AsyncClient,
    topic: String,
    qos: Qos,
    format: Format,
}

impl Publisher {
    /// Create a new publisher.
    pub fn new(client: AsyncClient, topic: impl Into<String>, qos: Qos, format: Format) -> Self {
        Self {
            client,
            topic: topic.into(),
            qos,
            format,
        }
    }

    /// Get the telemetry topic.
    pub fn topic(&self) -> &str {
        &self.topic
    }

    /// Get the quality of service used for telemetry.
    pub fn qos(&self) -> Qos {
        self.qos
    }

    /// Get the serialization format.
    pub fn format(&self) -> Format {
        self.format
    }

    /// Encode a value with the configured format and publish it to the
    /// telemetry topic (not retained).
    pub async fn publish<T: Serialize>(&self, value: &T) -> Result<()> {
        let payload =
            encode(value, self.format).map_err(|e| BridgeError::Serialization(e.to_string()))?;

        self.publish_raw(&self.topic, self.qos, false, payload).await
    }

    /// Publish raw bytes to a topic.
    ///
    /// Does not wait for queue space: while the broker is unreachable and the
    /// request queue is full, the message is rejected.
    pub async fn publish_raw(
        &self,
        topic: &str,
        qos: Qos,
        retain: bool,
        payload: Vec<u8>,
    ) -> Result<()> {
        self.client
            .try_publish(topic, qos.into(), retain, payload)
            .map_err(|e| BridgeError::Publish {
                topic: topic.to_string(),
                message: e.to_string(),
            })
    }

    /// Publish a JSON value to a topic.
    pub async fn publish_json<T: Serialize>(
        &self,
        topic: &str,
        value: &T,
        retain: bool,
    ) -> Result<()> {
        let payload = serde_json::to_vec(value)?;
        self.publish_raw(topic, Qos::AtLeastOnce, retain, payload).await
    }

    /// Ask the client to disconnect from the broker.
    ///
    /// Queued publishes ahead of the disconnect request are still flushed by
    /// the event loop.
    pub async fn disconnect(&self) -> Result<()> {
        self.client
            .try_disconnect()
            .map_err(|e| BridgeError::MqttConnection(e.to_string()))
    }
}
