//! SunSpec inverter to MQTT bridge.
//!
//! Polls a SolarEdge inverter over Modbus TCP and publishes canonical
//! readings to an MQTT broker.

use anyhow::{Context, Result};
use clap::Parser;
use pvbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};

use pvbridge_sunspec::catalog::Catalog;
use pvbridge_sunspec::config::{Overrides, SunspecBridgeConfig};
use pvbridge_sunspec::link::ModbusTcpConnector;
use pvbridge_sunspec::poller::Poller;

/// Bridge between a SunSpec inverter and an MQTT broker.
///
/// Every override also accepts the underscore spelling used by older
/// deployments, e.g. `--modbus_slaveid`.
#[derive(Parser, Debug)]
#[command(name = "pvbridge-sunspec")]
#[command(about = "Polls a SunSpec inverter over Modbus TCP and publishes readings to MQTT")]
#[command(version)]
struct Args {
    #[command(flatten)]
    bridge: BridgeArgs,

    /// Inverter host name or IP address.
    #[arg(long, alias = "modbus_hostname", env = "MODBUS_HOSTNAME")]
    modbus_hostname: Option<String>,

    /// Inverter Modbus TCP port.
    #[arg(long, alias = "modbus_port", env = "MODBUS_PORT")]
    modbus_port: Option<u16>,

    /// Modbus unit id of the inverter.
    #[arg(long, alias = "modbus_slaveid", env = "MODBUS_SLAVEID")]
    modbus_slave_id: Option<u8>,

    /// Poll interval in milliseconds.
    #[arg(long, alias = "modbus_pollinterval", env = "MODBUS_POLLINTERVAL")]
    modbus_poll_interval: Option<u64>,

    /// Broker URI, e.g. tcp://10.10.1.1:1883.
    #[arg(long, alias = "mqtt_uri", env = "MQTT_URI")]
    mqtt_uri: Option<String>,

    /// MQTT client id.
    #[arg(long, alias = "mqtt_clientid", env = "MQTT_CLIENTID")]
    mqtt_client_id: Option<String>,

    /// MQTT username.
    #[arg(long, alias = "mqtt_username", env = "MQTT_USERNAME")]
    mqtt_username: Option<String>,

    /// MQTT password.
    #[arg(
        long,
        alias = "mqtt_password",
        env = "MQTT_PASSWORD",
        hide_env_values = true
    )]
    mqtt_password: Option<String>,

    /// MQTT quality of service (0, 1 or 2).
    #[arg(long, alias = "mqtt_qos", env = "MQTT_QOS")]
    mqtt_qos: Option<u8>,

    /// Topic readings are published to.
    #[arg(long, alias = "mqtt_topic", env = "MQTT_TOPIC")]
    mqtt_topic: Option<String>,
}

impl Args {
    fn overrides(&self) -> Overrides {
        Overrides {
            modbus_hostname: self.modbus_hostname.clone(),
            modbus_port: self.modbus_port,
            modbus_slave_id: self.modbus_slave_id,
            modbus_poll_interval_ms: self.modbus_poll_interval,
            mqtt_uri: self.mqtt_uri.clone(),
            mqtt_client_id: self.mqtt_client_id.clone(),
            mqtt_username: self.mqtt_username.clone(),
            mqtt_password: self.mqtt_password.clone(),
            mqtt_qos: self.mqtt_qos,
            mqtt_topic: self.mqtt_topic.clone(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let args = Args::parse();

    // The file is optional when everything comes from flags or environment
    let mut config = match args.bridge.config_path("pvbridge.json5") {
        Some(path) => SunspecBridgeConfig::read(&path)
            .with_context(|| format!("Failed to load config from {:?}", path))?,
        None => SunspecBridgeConfig::default(),
    };
    config.apply_overrides(&args.overrides())?;
    config.validate()?;

    let catalog = Catalog::solaredge(config.device.serial_number_words)?;
    let connector = ModbusTcpConnector::new(
        config.device.host.clone(),
        config.device.port,
        config.device.unit_id,
        config.request_timeout(),
    );
    let timings = config.poll_timings();
    let grace = config.shutdown_grace();

    let mut runner = BridgeRunner::new_with_args("sunspec", config, Some(&args.bridge))
        .await?
        .with_status_publishing()
        .with_shutdown_grace(grace);

    let device = &runner.config().device;
    tracing::info!(
        "SunSpec bridge running (device: {}:{}, unit: {}, interval: {}ms, topic: {})",
        device.host,
        device.port,
        device.unit_id,
        device.poll_interval_ms,
        runner.publisher().topic()
    );

    let metadata = serde_json::json!({
        "device": format!("{}:{}", device.host, device.port),
        "unit_id": device.unit_id,
        "poll_interval_ms": device.poll_interval_ms,
        "registers": catalog.len(),
        "content_type": runner.publisher().format().mime_type(),
    });

    let poller = Poller::new(connector, catalog, runner.publisher(), timings);
    runner.spawn_with_error("poller", poller.run());

    // Run until Ctrl+C / SIGTERM, or until the poller fails
    runner.run_with_metadata(Some(metadata)).await?;
    Ok(())
}
