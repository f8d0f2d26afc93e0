//! pvbridge Bridge Framework
//!
//! Common abstractions for building telemetry bridges that publish to MQTT.
//!
//! # Overview
//!
//! This framework provides:
//! - [`BridgeConfig`] trait for configuration loading and validation
//! - [`BridgeRunner`] for managing bridge lifecycle (startup, shutdown, signal handling)
//! - [`Publisher`] for publishing telemetry to MQTT with automatic serialization
//! - [`BridgeArgs`] for common CLI arguments
//! - [`BridgeStatus`] for standardized status reporting
//!
//! # Example
//!
//! ```ignore
//! use pvbridge_framework::{BridgeArgs, BridgeConfig, BridgeRunner};
//!
//! #[tokio::main]
//! async fn main() -> anyhow::Result<()> {
//!     let args = BridgeArgs::parse();
//!     let config = MyBridgeConfig::load("mybridge.json5")?;
//!
//!     let mut runner = BridgeRunner::new_with_args("mybridge", config, Some(&args))
//!         .await?
//!         .with_status_publishing();
//!
//!     // Protocol-specific workers; an error stops the bridge
//!     runner.spawn_with_error("poller", my_worker(runner.publisher()));
//!
//!     // Run until Ctrl+C, SIGTERM or a fatal worker error
//!     runner.run_with_metadata(None).await?;
//!     Ok(())
//! }
//! ```

mod args;
mod config;
mod error;
mod publisher;
mod runner;
mod status;

pub use args::BridgeArgs;
pub use config::{BridgeConfig, validate_mqtt};
pub use error::{BridgeError, Result};
pub use publisher::Publisher;
pub use runner::{BridgeRunner, DEFAULT_SHUTDOWN_GRACE};
pub use status::{BridgeState, BridgeStatus, STATUS_SUFFIX, StatusPublisher};

// Re-export commonly used types from pvbridge-common
pub use pvbridge_common::{Format, LogFormat, LoggingConfig, MqttConfig, Qos};
