//! Daemon configuration.
//!
//! Sources, lowest precedence first: built-in defaults, an optional TOML file
//! named by `TUND_CONFIG`, then individual environment variables. The result
//! is validated before anything is acquired.

use std::num::NonZeroUsize;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::{Deserialize, Deserializer};

use crate::error::{LifecycleError, Result};
use crate::types::{LogLevel, ShutdownPolicy};

/// Log level of the runtime device.
pub const ENV_LOG_LEVEL: &str = "LOG_LEVEL";
/// Optional TOML configuration file.
pub const ENV_CONFIG_FILE: &str = "TUND_CONFIG";
/// Directory holding the UAPI sockets.
pub const ENV_SOCKET_DIR: &str = "TUND_SOCKET_DIR";
/// `abrupt` or `graceful-drain`.
pub const ENV_SHUTDOWN_POLICY: &str = "TUND_SHUTDOWN_POLICY";
/// Humantime duration, e.g. `5s` or `500ms`.
pub const ENV_DRAIN_TIMEOUT: &str = "TUND_DRAIN_TIMEOUT";
/// Number of async worker threads.
pub const ENV_WORKER_THREADS: &str = "TUND_WORKER_THREADS";

/// Default UAPI socket directory.
pub const DEFAULT_SOCKET_DIR: &str = "/var/run/wireguard";

fn default_socket_dir() -> PathBuf {
    PathBuf::from(DEFAULT_SOCKET_DIR)
}

fn default_drain_timeout() -> Duration {
    Duration::from_secs(5)
}

fn deserialize_duration<'de, D>(deserializer: D) -> std::result::Result<Duration, D::Error>
where
    D: Deserializer<'de>,
{
    let raw = String::deserialize(deserializer)?;
    humantime::parse_duration(&raw).map_err(serde::de::Error::custom)
}

/// Runtime configuration of the tunnel daemon.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct TunnelConfig {
    /// Level the runtime device logs at.
    #[serde(default)]
    pub log_level: LogLevel,

    /// Directory for `<interface>.sock` UAPI sockets.
    #[serde(default = "default_socket_dir")]
    pub socket_dir: PathBuf,

    /// Handling of in-flight control connections at shutdown.
    #[serde(default)]
    pub shutdown_policy: ShutdownPolicy,

    /// Upper bound on the graceful drain.
    #[serde(
        default = "default_drain_timeout",
        deserialize_with = "deserialize_duration"
    )]
    pub drain_timeout: Duration,

    /// Async worker threads; defaults to the available parallelism.
    #[serde(default)]
    pub worker_threads: Option<usize>,
}

impl Default for TunnelConfig {
    fn default() -> Self {
        Self {
            log_level: LogLevel::default(),
            socket_dir: default_socket_dir(),
            shutdown_policy: ShutdownPolicy::default(),
            drain_timeout: default_drain_timeout(),
            worker_threads: None,
        }
    }
}

impl TunnelConfig {
    /// Builds the configuration from the process environment.
    ///
    /// # Errors
    /// Returns an error if the config file or any variable is invalid.
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the configuration from an arbitrary variable lookup.
    ///
    /// # Errors
    /// Returns an error if the config file or any variable is invalid.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = match lookup(ENV_CONFIG_FILE) {
            Some(path) if !path.is_empty() => Self::load(path)?,
            _ => Self::default(),
        };
        config.apply_overrides(lookup)?;
        config.validate()?;
        Ok(config)
    }

    /// Loads configuration from a TOML file.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read, parsed or validated.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            LifecycleError::config(format!("failed to read {}: {e}", path.display()))
        })?;
        Self::from_toml_str(&content)
    }

    /// Parses configuration from TOML text.
    ///
    /// # Errors
    /// Returns an error if the text is not valid configuration.
    pub fn from_toml_str(content: &str) -> Result<Self> {
        let config: Self = toml::from_str(content)
            .map_err(|e| LifecycleError::config(format!("failed to parse config: {e}")))?;
        config.validate()?;
        Ok(config)
    }

    fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(raw) = lookup(ENV_LOG_LEVEL) {
            self.log_level = LogLevel::resolve(Some(raw.as_str()));
        }
        if let Some(dir) = lookup(ENV_SOCKET_DIR) {
            self.socket_dir = PathBuf::from(dir);
        }
        if let Some(policy) = lookup(ENV_SHUTDOWN_POLICY) {
            self.shutdown_policy = policy.parse()?;
        }
        if let Some(raw) = lookup(ENV_DRAIN_TIMEOUT) {
            self.drain_timeout = humantime::parse_duration(&raw).map_err(|e| {
                LifecycleError::config(format!("invalid {ENV_DRAIN_TIMEOUT} '{raw}': {e}"))
            })?;
        }
        if let Some(raw) = lookup(ENV_WORKER_THREADS) {
            let threads = raw.parse::<usize>().map_err(|e| {
                LifecycleError::config(format!("invalid {ENV_WORKER_THREADS} '{raw}': {e}"))
            })?;
            self.worker_threads = Some(threads);
        }
        Ok(())
    }

    /// Validates the configuration.
    ///
    /// # Errors
    /// Returns an error if the configuration is invalid.
    pub fn validate(&self) -> Result<()> {
        if self.socket_dir.as_os_str().is_empty() {
            return Err(LifecycleError::config("socket_dir cannot be empty"));
        }
        if self.worker_threads == Some(0) {
            return Err(LifecycleError::config(
                "worker_threads must be greater than 0",
            ));
        }
        Ok(())
    }

    /// Returns the worker thread count to build the runtime with.
    #[must_use]
    pub fn effective_worker_threads(&self) -> usize {
        self.worker_threads.unwrap_or_else(|| {
            std::thread::available_parallelism().map_or(1, NonZeroUsize::get)
        })
    }

    /// Returns the UAPI socket path for `interface`.
    #[must_use]
    pub fn socket_path(&self, interface: &str) -> PathBuf {
        self.socket_dir.join(format!("{interface}.sock"))
    }
}
