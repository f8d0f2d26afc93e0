//! SunSpec inverter bridge.
//!
//! Polls a SolarEdge inverter over Modbus TCP, applies SunSpec scale factors
//! and publishes canonical readings to MQTT.
//!
//! # Pipeline
//!
//! ```text
//! catalog -> reader -> scaling -> mapping -> publisher
//! ```
//!
//! - [`catalog`] - the register table and scale-factor naming rules
//! - [`reader`] - one read pass over the catalog, tolerating per-register failures
//! - [`scaling`] - `mantissa * 10^exponent` resolution
//! - [`mapping`] - projection onto the published [`mapping::CanonicalReading`]
//! - [`poller`] - the poll loop and link recovery

pub mod catalog;
pub mod config;
pub mod decode;
pub mod link;
pub mod mapping;
pub mod poller;
pub mod reader;
pub mod scaling;
