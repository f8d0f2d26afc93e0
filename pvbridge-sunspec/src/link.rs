//! Device link: the register-read capability and its Modbus TCP implementation.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tokio_modbus::client::{Context, Reader};
use tokio_modbus::prelude::*;

/// Errors raised by a device link.
#[derive(Debug, Error)]
pub enum LinkError {
    #[error("Connection failed: {0}")]
    Connection(String),
    #[error("Request timed out after {0:?}")]
    Timeout(Duration),
    #[error("Read failed: {0}")]
    Read(String),
    #[error("Device exception: {0}")]
    Exception(String),
}

/// An open link able to read holding registers.
///
/// Reads are issued one at a time; the link is never shared.
pub trait RegisterRead: Send {
    /// Read `count` holding registers starting at `address`.
    fn read(
        &mut self,
        address: u16,
        count: u16,
    ) -> impl Future<Output = Result<Vec<u16>, LinkError>> + Send;

    /// Close the link. Errors are logged, not returned.
    fn close(&mut self) -> impl Future<Output = ()> + Send;
}

/// Opens new device links.
pub trait Connector: Send + Sync {
    type Link: RegisterRead;

    /// Establish a new link to the device.
    fn connect(&self) -> impl Future<Output = Result<Self::Link, LinkError>> + Send;

    /// Human-readable target, for logging.
    fn target(&self) -> String;
}

/// Connector for a Modbus TCP device.
#[derive(Debug, Clone)]
pub struct ModbusTcpConnector {
    host: String,
    port: u16,
    unit_id: u8,
    timeout: Duration,
}

impl ModbusTcpConnector {
    /// Create a connector; `timeout` bounds both connecting and each read.
    pub fn new(host: impl Into<String>, port: u16, unit_id: u8, timeout: Duration) -> Self {
        Self {
            host: host.into(),
            port,
            unit_id,
            timeout,
        }
    }
}

impl Connector for ModbusTcpConnector {
    type Link = ModbusTcpLink;

    async fn connect(&self) -> Result<ModbusTcpLink, LinkError> {
        let target = self.target();
        let addr = tokio::net::lookup_host(&target)
            .await
            .map_err(|e| LinkError::Connection(format!("Failed to resolve {}: {}", target, e)))?
            .next()
            .ok_or_else(|| LinkError::Connection(format!("No address found for {}", target)))?;

        let ctx = tokio::time::timeout(self.timeout, tcp::connect_slave(addr, Slave(self.unit_id)))
            .await
            .map_err(|_| LinkError::Timeout(self.timeout))?
            .map_err(|e| LinkError::Connection(e.to_string()))?;

        Ok(ModbusTcpLink {
            ctx,
            timeout: self.timeout,
        })
    }

    fn target(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}

/// An open Modbus TCP connection.
pub struct ModbusTcpLink {
    ctx: Context,
    timeout: Duration,
}

impl RegisterRead for ModbusTcpLink {
    async fn read(&mut self, address: u16, count: u16) -> Result<Vec<u16>, LinkError> {
        tokio::time::timeout(self.timeout, self.ctx.read_holding_registers(address, count))
            .await
            .map_err(|_| LinkError::Timeout(self.timeout))?
            .map_err(|e| LinkError::Read(e.to_string()))?
            .map_err(|e| LinkError::Exception(format!("{:?}", e)))
    }

    async fn close(&mut self) {
        match self.ctx.disconnect().await {
            Ok(_) => tracing::debug!("Modbus link closed"),
            Err(e) => tracing::warn!(error = %e, "Error closing Modbus link"),
        }
    }
}
