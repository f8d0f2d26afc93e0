use std::time::Duration;

use rumqttc::{AsyncClient, Event, EventLoop, LastWill, MqttOptions, Outgoing, Packet};

use crate::config::MqttConfig;
use crate::error::Result;

/// Capacity of the request channel between the client handle and the event loop.
const REQUEST_CHANNEL_CAPACITY: usize = 64;

/// Delay before polling the event loop again after a connection error.
const RECONNECT_DELAY: Duration = Duration::from_secs(1);

/// Create an MQTT client using the provided configuration.
///
/// The connection is established lazily by [`drive_event_loop`], which must be
/// spawned for publishes to make progress.
pub fn connect(
    config: &MqttConfig,
    last_will: Option<LastWill>,
) -> Result<(AsyncClient, EventLoop)> {
    let (host, port) = config.broker_address()?;
    let client_id = config.resolve_client_id();

    let mut options = MqttOptions::new(client_id.clone(), host.clone(), port);
    options.set_keep_alive(Duration::from_secs(config.keep_alive_secs.max(5)));
    options.set_clean_session(config.clean_session);

    if let Some(username) = &config.username {
        options.set_credentials(
            username.clone(),
            config.password.clone().unwrap_or_default(),
        );
    }

    if let Some(will) = last_will {
        options.set_last_will(will);
    }

    tracing::info!(
        host = %host,
        port = port,
        client_id = %client_id,
        qos = %config.qos,
        "Connecting to MQTT broker"
    );

    Ok(AsyncClient::new(options, REQUEST_CHANNEL_CAPACITY))
}

/// Poll the MQTT event loop until the client disconnects.
///
/// Connection errors are logged and retried; `rumqttc` keeps queued
/// publishes and reconnects on the next poll.
pub async fn drive_event_loop(mut event_loop: EventLoop) {
    loop {
        match event_loop.poll().await {
            Ok(Event::Incoming(Packet::ConnAck(ack))) => {
                tracing::info!(code = ?ack.code, "Connected to MQTT broker");
            }
            Ok(Event::Outgoing(Outgoing::Disconnect)) => {
                tracing::info!("MQTT client disconnected");
                break;
            }
            Ok(event) => {
                tracing::trace!(?event, "MQTT event");
            }
            Err(e) => {
                tracing::warn!(error = %e, "MQTT connection error, retrying");
                tokio::time::sleep(RECONNECT_DELAY).await;
            }
        }
    }
}
