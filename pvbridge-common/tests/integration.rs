//! Integration tests for pvbridge-common library.

use pvbridge_common::{Format, LogFormat, LoggingConfig, MqttConfig, Qos, connect, encode};
use serde::{Deserialize, Serialize};

#[derive(Debug, PartialEq, Serialize, Deserialize)]
struct Reading {
    #[serde(rename = "AC_Voltage_L1_N")]
    voltage: Option<f64>,
    #[serde(rename = "InverterStatus")]
    status: Option<u16>,
    time: Option<i64>,
}

#[derive(Debug, Deserialize)]
struct Settings {
    mqtt: MqttConfig,
    #[serde(default)]
    serialization: Format,
    #[serde(default)]
    logging: LoggingConfig,
}

#[tokio::test]
async fn test_config_to_client() {
    let settings: Settings = json5::from_str(
        r#"{
            // Broker on the local network
            mqtt: {
                uri: "tcp://192.168.1.20:1883",
                username: "solar",
                password: "secret",
                qos: 0,
                topic: "home/solar/inverter",
                keep_alive_secs: 60,
            },
            serialization: "cbor",
            logging: { level: "warn", format: "json" },
        }"#,
    )
    .expect("config should parse");

    assert_eq!(
        settings.mqtt.broker_address().unwrap(),
        ("192.168.1.20".to_string(), 1883)
    );
    assert_eq!(settings.mqtt.qos, Qos::AtMostOnce);
    assert_eq!(settings.mqtt.keep_alive_secs, 60);
    assert_eq!(settings.serialization, Format::Cbor);
    assert_eq!(settings.logging.format, LogFormat::Json);

    // Building the client does not touch the network.
    let (_client, _event_loop) = connect(&settings.mqtt, None).expect("client should build");
}

#[test]
fn test_reading_payloads() {
    let reading = Reading {
        voltage: Some(240.0),
        status: Some(4),
        time: None,
    };

    let json = encode(&reading, Format::Json).expect("JSON encode failed");
    assert_eq!(
        String::from_utf8(json.clone()).unwrap(),
        r#"{"AC_Voltage_L1_N":240.0,"InverterStatus":4,"time":null}"#
    );

    let cbor = encode(&reading, Format::Cbor).expect("CBOR encode failed");
    assert!(cbor.len() < json.len());
    let decoded: Reading = ciborium::from_reader(cbor.as_slice()).expect("CBOR decode failed");
    assert_eq!(decoded, reading);
}
