//! Bridge runner for lifecycle management.

use std::future::Future;
use std::time::Duration;

use tokio::signal;
use tokio::task::{JoinHandle, JoinSet};

use pvbridge_common::{LoggingConfig, connect, drive_event_loop, init_tracing};

use crate::BridgeArgs;
use crate::config::BridgeConfig;
use crate::error::{BridgeError, Result};
use crate::publisher::Publisher;
use crate::status::{BridgeStatus, StatusPublisher};

/// Default time given to in-flight work and the MQTT client before exit.
pub const DEFAULT_SHUTDOWN_GRACE: Duration = Duration::from_millis(2000);

/// Owns the MQTT client and the worker tasks of one bridge process.
///
/// `run` returns on Ctrl+C, SIGTERM or the first worker error. When status
/// publishing is enabled, `running` is published on start and `offline` or
/// `error` on the way out.
pub struct BridgeRunner<C: BridgeConfig> {
    name: String,
    version: String,
    config: C,
    publisher: Publisher,
    status_publisher: Option<StatusPublisher>,
    /// Task driving the MQTT event loop.
    event_loop: JoinHandle<()>,
    tasks: JoinSet<Result<()>>,
    shutdown_grace: Duration,
}

impl<C: BridgeConfig> BridgeRunner<C> {
    /// Initialise logging from the config, then connect. `--log-level`
    /// takes precedence over the configured level.
    pub async fn new_with_args(
        name: impl Into<String>,
        config: C,
        args: Option<&BridgeArgs>,
    ) -> Result<Self> {
        let log_config = match args.and_then(|a| a.log_level()) {
            Some(level) => LoggingConfig {
                level,
                format: config.logging().format,
            },
            None => config.logging().clone(),
        };

        init_tracing(&log_config).map_err(|e| BridgeError::config(e.to_string()))?;

        Self::connect(name, config).await
    }

    /// Create a runner without touching the global tracing subscriber.
    ///
    /// Must be called from within a Tokio runtime.
    pub async fn connect(name: impl Into<String>, config: C) -> Result<Self> {
        let name = name.into();
        let version = env!("CARGO_PKG_VERSION").to_string();

        tracing::info!(bridge = %name, version = %version, "Starting bridge");

        let last_will = BridgeStatus::offline(&name, &version).last_will(config.topic())?;
        let (client, event_loop) = connect(config.mqtt(), Some(last_will))?;
        let event_loop = tokio::spawn(drive_event_loop(event_loop));

        let publisher = Publisher::new(
            client,
            config.topic(),
            config.mqtt().qos,
            config.serialization(),
        );

        Ok(Self {
            name,
            version,
            config,
            publisher,
            status_publisher: None,
            event_loop,
            tasks: JoinSet::new(),
            shutdown_grace: DEFAULT_SHUTDOWN_GRACE,
        })
    }

    /// Publish retained status messages on start and stop.
    pub fn with_status_publishing(mut self) -> Self {
        self.status_publisher = Some(StatusPublisher::new(
            self.publisher.clone(),
            &self.name,
            &self.version,
        ));
        self
    }

    /// Set the grace period granted to in-flight work on shutdown.
    pub fn with_shutdown_grace(mut self, grace: Duration) -> Self {
        self.shutdown_grace = grace;
        self
    }

    pub fn config(&self) -> &C {
        &self.config
    }

    /// A handle to the telemetry publisher.
    pub fn publisher(&self) -> Publisher {
        self.publisher.clone()
    }

    /// Spawn a worker task that returns a Result.
    ///
    /// An error ends [`run_with_metadata`](Self::run_with_metadata) and is
    /// returned from it, so the process can decide how to exit.
    pub fn spawn_with_error<F, E>(&mut self, name: impl Into<String>, future: F)
    where
        F: Future<Output = std::result::Result<(), E>> + Send + 'static,
        E: std::fmt::Display + Send + 'static,
    {
        let name = name.into();
        self.tasks.spawn(async move {
            future.await.map_err(|e| {
                tracing::error!(worker = %name, error = %e, "Worker failed");
                BridgeError::worker(format!("{}: {}", name, e))
            })
        });
    }

    /// Run until a shutdown signal arrives or a worker fails, attaching
    /// `metadata` to every status message.
    ///
    /// After the final status and the disconnect request, the remaining
    /// tasks get the shutdown grace before they are aborted.
    pub async fn run_with_metadata(self, metadata: Option<serde_json::Value>) -> Result<()> {
        self.run_until(metadata, shutdown_signal()).await
    }

    /// [`run_with_metadata`](Self::run_with_metadata) with an explicit
    /// shutdown trigger.
    pub async fn run_until<S>(
        mut self,
        metadata: Option<serde_json::Value>,
        shutdown: S,
    ) -> Result<()>
    where
        S: Future<Output = ()>,
    {
        if let Some(status_pub) = self.status_publisher.as_mut() {
            if let Err(e) = status_pub.publish_running(metadata).await {
                tracing::warn!(error = %e, "Failed to publish running status");
            }
        }

        tracing::info!(
            bridge = %self.name,
            tasks = self.tasks.len(),
            "Bridge running. Press Ctrl+C to stop."
        );

        tokio::pin!(shutdown);
        let outcome = loop {
            tokio::select! {
                _ = &mut shutdown => {
                    tracing::info!(bridge = %self.name, "Received shutdown signal");
                    break Ok(());
                }
                Some(joined) = self.tasks.join_next() => match joined {
                    Ok(Ok(())) => tracing::debug!(bridge = %self.name, "Worker finished"),
                    Ok(Err(e)) => break Err(e),
                    Err(e) => break Err(BridgeError::worker(e.to_string())),
                },
            }
        };

        if let Some(ref status_pub) = self.status_publisher {
            let published = match &outcome {
                Ok(()) => status_pub.publish_offline().await,
                Err(e) => status_pub.publish_error(e.to_string()).await,
            };
            if let Err(e) = published {
                tracing::warn!(error = %e, "Failed to publish final status");
            }
        }

        if let Err(e) = self.publisher.disconnect().await {
            tracing::warn!(error = %e, "Error disconnecting MQTT client");
        }

        tracing::info!(
            bridge = %self.name,
            grace_ms = self.shutdown_grace.as_millis() as u64,
            "Shutting down"
        );
        tokio::time::sleep(self.shutdown_grace).await;

        self.tasks.shutdown().await;
        self.event_loop.abort();

        tracing::info!(bridge = %self.name, "Goodbye!");

        outcome
    }
}

/// Resolve when the process is asked to stop (Ctrl+C, or SIGTERM on Unix).
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl+C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match signal::unix::signal(signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {}
        _ = terminate => {}
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pvbridge_common::MqttConfig;
    use serde::Deserialize;
    use std::sync::Arc;
    use std::sync::atomic::{AtomicBool, Ordering};

    #[derive(Debug, Deserialize)]
    struct TestConfig {
        mqtt: MqttConfig,
        #[serde(default)]
        logging: LoggingConfig,
    }

    impl BridgeConfig for TestConfig {
        fn mqtt(&self) -> &MqttConfig {
            &self.mqtt
        }

        fn logging(&self) -> &LoggingConfig {
            &self.logging
        }
    }

    fn test_config() -> TestConfig {
        TestConfig {
            // Nothing listens here; the event loop just keeps retrying.
            mqtt: MqttConfig {
                uri: "tcp://127.0.0.1:1".to_string(),
                topic: "solar/test".to_string(),
                ..Default::default()
            },
            logging: LoggingConfig::default(),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_worker_error_ends_run() {
        let mut runner = BridgeRunner::connect("test", test_config())
            .await
            .unwrap()
            .with_status_publishing();

        assert_eq!(runner.publisher().topic(), "solar/test");

        runner.spawn_with_error("idle", async { Ok::<(), BridgeError>(()) });
        runner.spawn_with_error("failing", async { Err::<(), _>("catalog is wrong") });

        let result = runner.run_until(None, std::future::pending()).await;
        match result {
            Err(BridgeError::Worker(message)) => {
                assert_eq!(message, "failing: catalog is wrong");
            }
            other => panic!("expected worker error, got {:?}", other),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_waits_grace_then_aborts_workers() {
        let grace = Duration::from_secs(2);
        let mut runner = BridgeRunner::connect("test", test_config())
            .await
            .unwrap()
            .with_status_publishing()
            .with_shutdown_grace(grace);

        let finished = Arc::new(AtomicBool::new(false));
        let worker_finished = finished.clone();
        runner.spawn_with_error("poller", async move {
            tokio::time::sleep(Duration::from_secs(3600)).await;
            worker_finished.store(true, Ordering::SeqCst);
            Ok::<(), BridgeError>(())
        });

        let start = tokio::time::Instant::now();
        let signal = tokio::time::sleep(Duration::from_secs(5));
        let result = runner
            .run_until(Some(serde_json::json!({ "device": "inverter:502" })), signal)
            .await;

        assert!(result.is_ok());
        let elapsed = start.elapsed();
        assert!(elapsed >= Duration::from_secs(5) + grace);
        assert!(elapsed < Duration::from_secs(3600));
        assert!(!finished.load(Ordering::SeqCst));
    }

    #[tokio::test(start_paused = true)]
    async fn test_shutdown_grace_is_configurable() {
        let runner = BridgeRunner::connect("test", test_config())
            .await
            .unwrap()
            .with_shutdown_grace(Duration::from_millis(10));

        assert_eq!(runner.shutdown_grace, Duration::from_millis(10));
    }
}
