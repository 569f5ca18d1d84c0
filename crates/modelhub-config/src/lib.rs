//! Configuration loading and types for modelhub.
//!
//! This crate is responsible for:
//! - Defining the operator configuration consumed by the CLI and registry
//! - Loading configuration from TOML files
//! - Providing a simple default search strategy (/etc/modelhub/modelhub.toml, ./modelhub.toml)
//!
//! Every section is optional; a missing section takes its defaults so an
//! empty file is a valid configuration.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use modelhub_core::{HubError, Result};

/// Root configuration struct for modelhub.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct HubConfig {
    /// Where the registry snapshot lives.
    #[serde(default)]
    pub registry: RegistryConfig,

    /// Confirmation gate for destructive deletes.
    #[serde(default)]
    pub deletion: DeletionConfig,

    /// Outbound calls to provider APIs (discovery, connection tests).
    #[serde(default)]
    pub http: HttpConfig,

    /// Logging configuration.
    #[serde(default)]
    pub telemetry: Option<TelemetryConfig>,
}

impl HubConfig {
    /// Perform basic structural validation of the configuration.
    ///
    /// This does not touch the filesystem or the network; it only rejects
    /// values that can never work.
    pub fn validate(&self) -> Result<()> {
        if self.registry.path.as_os_str().is_empty() {
            return Err(HubError::invalid_config(
                "registry.path",
                "registry.path must not be empty",
            ));
        }

        if self.deletion.confirm_window_secs == 0 {
            return Err(HubError::invalid_config(
                "deletion.confirm_window_secs",
                "deletion.confirm_window_secs must be greater than zero",
            ));
        }

        if self.http.timeout_secs == 0 {
            return Err(HubError::invalid_config(
                "http.timeout_secs",
                "http.timeout_secs must be greater than zero",
            ));
        }

        Ok(())
    }

    /// Configured log level, if any.
    pub fn log_level(&self) -> Option<&str> {
        self.telemetry.as_ref().and_then(|t| t.log_level.as_deref())
    }
}

/// Registry snapshot location.
#[derive(Debug, Clone, Deserialize)]
pub struct RegistryConfig {
    /// Path of the JSON snapshot file. Defaults to `modelhub.json`.
    #[serde(default = "default_registry_path")]
    pub path: PathBuf,
}

impl Default for RegistryConfig {
    fn default() -> Self {
        Self {
            path: default_registry_path(),
        }
    }
}

/// Deletion confirmation settings.
#[derive(Debug, Clone, Deserialize)]
pub struct DeletionConfig {
    /// Seconds a delete stays armed waiting for its confirming call.
    #[serde(default = "default_confirm_window_secs")]
    pub confirm_window_secs: u64,
}

impl DeletionConfig {
    pub fn confirm_window(&self) -> Duration {
        Duration::from_secs(self.confirm_window_secs)
    }
}

impl Default for DeletionConfig {
    fn default() -> Self {
        Self {
            confirm_window_secs: default_confirm_window_secs(),
        }
    }
}

/// Outbound HTTP settings.
#[derive(Debug, Clone, Deserialize)]
pub struct HttpConfig {
    /// Per-request timeout for discovery and connection tests.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,
}

impl HttpConfig {
    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

impl Default for HttpConfig {
    fn default() -> Self {
        Self {
            timeout_secs: default_timeout_secs(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct TelemetryConfig {
    /// Log level or filter expression, e.g. `info` or `info,modelhub_registry=debug`.
    #[serde(default)]
    pub log_level: Option<String>,
}

/// Load configuration from a specific file path.
///
/// This function parses TOML into [`HubConfig`] and maps errors into
/// [`HubError::Config`] / [`HubError::InvalidConfig`] as appropriate.
pub fn load_from_path<P: AsRef<Path>>(path: P) -> Result<HubConfig> {
    let path_ref = path.as_ref();
    let contents = fs::read_to_string(path_ref).map_err(|err| {
        HubError::config(format!(
            "failed to read config file '{}': {}",
            path_ref.display(),
            err
        ))
    })?;

    let cfg: HubConfig = toml::from_str(&contents).map_err(|err| {
        HubError::invalid_config(
            path_ref.display().to_string(),
            format!("failed to parse config: {}", err),
        )
    })?;

    Ok(cfg)
}

/// Attempt to load configuration using the default search strategy.
///
/// Current strategy (in order):
/// 1. `/etc/modelhub/modelhub.toml`
/// 2. `./modelhub.toml` (in the current working directory)
///
/// Returns [`HubError::ConfigNotFound`] when neither exists so callers can
/// decide whether to fall back to [`HubConfig::default`].
pub fn load_default() -> Result<HubConfig> {
    let candidates = [
        PathBuf::from("/etc/modelhub/modelhub.toml"),
        std::env::current_dir()
            .unwrap_or_else(|_| PathBuf::from("."))
            .join("modelhub.toml"),
    ];

    for candidate in &candidates {
        if candidate.exists() {
            return load_from_path(candidate);
        }
    }

    Err(HubError::ConfigNotFound(
        "/etc/modelhub/modelhub.toml or ./modelhub.toml".to_string(),
    ))
}

fn default_registry_path() -> PathBuf {
    PathBuf::from("modelhub.json")
}

fn default_confirm_window_secs() -> u64 {
    5
}

fn default_timeout_secs() -> u64 {
    30
}
