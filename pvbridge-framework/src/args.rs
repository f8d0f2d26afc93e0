//! CLI argument parsing for bridges.

use std::path::{Path, PathBuf};

use clap::Args;

/// Common CLI arguments for all bridges.
///
/// Bridges flatten this into their own `clap` parser next to their
/// protocol-specific overrides.
#[derive(Args, Debug, Clone, Default)]
pub struct BridgeArgs {
    /// Path to configuration file (JSON5 format).
    #[arg(short, long, env = "PVBRIDGE_CONFIG")]
    pub config: Option<PathBuf>,

    /// Override log level (trace, debug, info, warn, error).
    #[arg(long, env = "LOG_LEVEL")]
    pub log_level: Option<String>,
}

impl BridgeArgs {
    /// Resolve the configuration file to load.
    ///
    /// An explicit `--config` always wins. Otherwise `default_config` is used
    /// when it exists, so a bridge can also run from flags and environment alone.
    pub fn config_path(&self, default_config: &str) -> Option<PathBuf> {
        match &self.config {
            Some(path) => Some(path.clone()),
            None => {
                let default = Path::new(default_config);
                default.exists().then(|| default.to_path_buf())
            }
        }
    }

    /// Log level override, normalized to lowercase.
    pub fn log_level(&self) -> Option<String> {
        self.log_level.as_ref().map(|level| match level.to_lowercase().as_str() {
            "warning" => "warn".to_string(),
            other => other.to_string(),
        })
    }
}
