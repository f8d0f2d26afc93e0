//! Shared building blocks for pvbridge bridges.
//!
//! - [`telemetry`] - MQTT quality of service and timestamp helpers
//! - [`serialization`] - JSON/CBOR payload encoding
//! - [`config`] - MQTT and logging settings
//! - [`session`] - MQTT client creation and event loop driving
//! - [`error`] - the crate `Error`

pub mod config;
pub mod error;
pub mod serialization;
pub mod session;
pub mod telemetry;

pub use config::{DEFAULT_MQTT_PORT, LogFormat, LoggingConfig, MqttConfig};
pub use error::{Error, Result};
pub use serialization::{Format, encode};
pub use session::{connect, drive_event_loop};
pub use telemetry::{Qos, current_timestamp_millis};

/// Install the global tracing subscriber.
///
/// `config.level` must be a level name (`trace` to `error`, or `off`).
/// `RUST_LOG` takes precedence over it. Text output is meant for terminals;
/// JSON output puts event fields at the top level of each line.
pub fn init_tracing(config: &LoggingConfig) -> Result<()> {
    use tracing_subscriber::filter::LevelFilter;
    use tracing_subscriber::{EnvFilter, Layer, fmt, prelude::*};

    let level: LevelFilter = config
        .level
        .parse()
        .map_err(|e| Error::Config(format!("Invalid log level '{}': {}", config.level, e)))?;

    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::default().add_directive(level.into()));

    let layer = match config.format {
        LogFormat::Text => fmt::layer().with_target(false).boxed(),
        LogFormat::Json => fmt::layer().json().flatten_event(true).boxed(),
    };

    tracing_subscriber::registry()
        .with(layer)
        .with(filter)
        .try_init()
        .map_err(|e| Error::Config(format!("Failed to initialize tracing: {}", e)))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_init_tracing_rejects_unknown_level() {
        for level in ["loud", "verbose", "info,"] {
            let config = LoggingConfig {
                level: level.to_string(),
                format: LogFormat::Text,
            };
            assert!(
                matches!(init_tracing(&config), Err(Error::Config(ref message)) if message.contains(level)),
                "level '{}' should be rejected",
                level
            );
        }
    }
}
