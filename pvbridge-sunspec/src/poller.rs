//! SunSpec inverter polling and reading publication.
//!
//! The poller owns the device link. Each cycle reads the whole catalog,
//! scales and maps the values, and hands the reading to a sink. A cycle that
//! yields no values at all marks the link as degraded; after a backoff the
//! link is closed and re-established.

use std::future::Future;
use std::time::Duration;

use thiserror::Error;
use tracing::{debug, info, warn};

use pvbridge_common::current_timestamp_millis;
use pvbridge_framework::Publisher;

use crate::catalog::Catalog;
use crate::link::{Connector, RegisterRead};
use crate::mapping::CanonicalReading;
use crate::reader::read_all;
use crate::scaling::{ScaleError, scale};

/// Error type for polling operations. All variants are fatal.
#[derive(Debug, Error)]
pub enum PollerError {
    #[error("Register map does not match the device: {0}")]
    Schema(#[from] ScaleError),
}

/// Destination for canonical readings.
pub trait ReadingSink: Send + Sync {
    fn publish(
        &self,
        reading: &CanonicalReading,
    ) -> impl Future<Output = pvbridge_framework::Result<()>> + Send;
}

impl ReadingSink for Publisher {
    async fn publish(&self, reading: &CanonicalReading) -> pvbridge_framework::Result<()> {
        Publisher::publish(self, reading).await
    }
}

/// Health of the device link.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LinkState {
    Connected,
    /// The last cycle read nothing; waiting out the backoff.
    Degraded,
    Reconnecting,
}

impl std::fmt::Display for LinkState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            LinkState::Connected => write!(f, "connected"),
            LinkState::Degraded => write!(f, "degraded"),
            LinkState::Reconnecting => write!(f, "reconnecting"),
        }
    }
}

/// Result of a single poll cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CycleOutcome {
    /// A reading was built and accepted by the sink.
    Published,
    /// A reading was built but the sink rejected it.
    Dropped,
    /// No register could be read.
    NoData,
}

/// Delays driving the poll loop.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollTimings {
    pub poll_interval: Duration,
    pub link_failure_backoff: Duration,
    pub close_grace: Duration,
    pub connect_retry_delay: Duration,
    pub settle_delay: Duration,
}

impl Default for PollTimings {
    fn default() -> Self {
        Self {
            poll_interval: Duration::from_millis(15_000),
            link_failure_backoff: Duration::from_millis(40_000),
            close_grace: Duration::from_millis(2_000),
            connect_retry_delay: Duration::from_millis(5_000),
            settle_delay: Duration::from_millis(1_000),
        }
    }
}

/// A poller for a single SunSpec inverter.
pub struct Poller<C: Connector, S: ReadingSink> {
    connector: C,
    catalog: Catalog,
    sink: S,
    timings: PollTimings,
    state: LinkState,
}

impl<C: Connector, S: ReadingSink> Poller<C, S> {
    /// Create a new poller.
    pub fn new(connector: C, catalog: Catalog, sink: S, timings: PollTimings) -> Self {
        Self {
            connector,
            catalog,
            sink,
            timings,
            state: LinkState::Reconnecting,
        }
    }

    /// Current link state.
    pub fn state(&self) -> LinkState {
        self.state
    }

    /// Run the polling loop.
    ///
    /// Only returns on a fatal error; stopping is left to the caller.
    pub async fn run(mut self) -> Result<(), PollerError> {
        info!(
            device = %self.connector.target(),
            registers = self.catalog.len(),
            interval_ms = self.timings.poll_interval.as_millis() as u64,
            "Starting SunSpec poller"
        );

        let mut link = self.connect().await;

        loop {
            match self.state {
                LinkState::Connected => {
                    if self.poll_once(&mut link).await? == CycleOutcome::NoData {
                        self.transition(LinkState::Degraded);
                    } else {
                        tokio::time::sleep(self.timings.poll_interval).await;
                    }
                }
                LinkState::Degraded => {
                    tokio::time::sleep(self.timings.link_failure_backoff).await;
                    self.transition(LinkState::Reconnecting);
                }
                LinkState::Reconnecting => {
                    link.close().await;
                    tokio::time::sleep(self.timings.close_grace).await;
                    link = self.connect().await;
                }
            }
        }
    }

    /// Perform a single poll cycle on an open link.
    pub async fn poll_once(&mut self, link: &mut C::Link) -> Result<CycleOutcome, PollerError> {
        let report = read_all(link, &self.catalog).await;

        if report.is_empty() {
            warn!(
                device = %self.connector.target(),
                failures = report.failures.len(),
                "No registers could be read"
            );
            return Ok(CycleOutcome::NoData);
        }

        let scaled = scale(&report.values, current_timestamp_millis())?;
        let (reading, mapping_errors) = CanonicalReading::from_scaled(&scaled);

        if let Some(state) = reading.inverter_state() {
            debug!(state = %state, "Inverter state");
        }

        match self.sink.publish(&reading).await {
            Ok(()) => {
                debug!(
                    values = report.values.len(),
                    failures = report.failures.len(),
                    skipped_fields = mapping_errors.len(),
                    "Published reading"
                );
                Ok(CycleOutcome::Published)
            }
            Err(e) => {
                warn!(error = %e, "Failed to publish reading, dropping it");
                Ok(CycleOutcome::Dropped)
            }
        }
    }

    /// Connect, retrying until it succeeds, then let the device settle.
    async fn connect(&mut self) -> C::Link {
        let link = loop {
            match self.connector.connect().await {
                Ok(link) => break link,
                Err(e) => {
                    warn!(
                        device = %self.connector.target(),
                        error = %e,
                        retry_ms = self.timings.connect_retry_delay.as_millis() as u64,
                        "Connection failed, retrying"
                    );
                    tokio::time::sleep(self.timings.connect_retry_delay).await;
                }
            }
        };

        info!(device = %self.connector.target(), "Connected to inverter");
        tokio::time::sleep(self.timings.settle_delay).await;
        self.transition(LinkState::Connected);
        link
    }

    fn transition(&mut self, next: LinkState) {
        if self.state != next {
            debug!(from = %self.state, to = %next, "Link state changed");
            self.state = next;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_timings() {
        let timings = PollTimings::default();
        assert_eq!(timings.poll_interval, Duration::from_secs(15));
        assert_eq!(timings.link_failure_backoff, Duration::from_secs(40));
        assert_eq!(timings.close_grace, Duration::from_secs(2));
        assert_eq!(timings.connect_retry_delay, Duration::from_secs(5));
        assert_eq!(timings.settle_delay, Duration::from_secs(1));
    }

    #[test]
    fn test_link_state_display() {
        assert_eq!(LinkState::Degraded.to_string(), "degraded");
        assert_eq!(LinkState::Reconnecting.to_string(), "reconnecting");
    }
}
