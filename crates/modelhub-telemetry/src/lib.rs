use std::env;
use std::str::FromStr;
use std::sync::atomic::{AtomicU64, Ordering};

use time::{format_description, UtcOffset};
use tracing::Level;
use tracing_subscriber::filter::EnvFilter;
use tracing_subscriber::fmt;
use tracing_subscriber::fmt::time::OffsetTime;
use tracing_subscriber::prelude::*;

/// Error type for telemetry initialisation failures.
///
/// This is intentionally lightweight so `modelhub-telemetry` can be used
/// without depending on `modelhub-core`.
#[derive(Debug)]
pub enum TelemetryError {
    /// Provided log level string could not be parsed.
    InvalidLevel(String),

    /// Failed to configure the subscriber (should be rare).
    SubscriberInit(String),
}

impl std::fmt::Display for TelemetryError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            TelemetryError::InvalidLevel(level) => {
                write!(f, "invalid log level: {}", level)
            }
            TelemetryError::SubscriberInit(msg) => write!(f, "failed to init telemetry: {}", msg),
        }
    }
}

impl std::error::Error for TelemetryError {}

/// Result alias for telemetry operations.
pub type Result<T> = std::result::Result<T, TelemetryError>;

/// Interface for recording registry activity.
///
/// The registry calls these hooks at its mutation points. Implementations
/// must be cheap and non-panicking.
pub trait MetricsRecorder: Send + Sync + 'static {
    /// Record a registry operation.
    ///
    /// - `operation`: short, stable name (e.g. "upsert_endpoint", "toggle_model").
    /// - `success`: whether the operation changed state without error.
    fn record_mutation(&self, operation: &str, success: bool);

    /// Record a rejected payload and the field that failed validation.
    fn record_validation_failure(&self, field: &str);

    /// Record that a stale default selection was cleared.
    fn record_default_cleared(&self);

    /// Record a discovery merge and how many models it added.
    fn record_discovery(&self, endpoint: &str, added: usize);
}

/// A no-op metrics recorder that does nothing.
#[derive(Debug, Clone, Default)]
pub struct NoopMetricsRecorder;

impl MetricsRecorder for NoopMetricsRecorder {
    fn record_mutation(&self, _operation: &str, _success: bool) {}

    fn record_validation_failure(&self, _field: &str) {}

    fn record_default_cleared(&self) {}

    fn record_discovery(&self, _endpoint: &str, _added: usize) {}
}

/// Point-in-time copy of the counters held by [`CountingMetricsRecorder`].
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub mutations_ok: u64,
    pub mutations_failed: u64,
    pub validation_failures: u64,
    pub defaults_cleared: u64,
    pub discovery_runs: u64,
    pub models_discovered: u64,
}

/// In-process recorder backed by atomic counters.
///
/// Used by the CLI to print a session summary and by tests to assert that
/// hooks fire.
#[derive(Debug, Default)]
pub struct CountingMetricsRecorder {
    mutations_ok: AtomicU64,
    mutations_failed: AtomicU64,
    validation_failures: AtomicU64,
    defaults_cleared: AtomicU64,
    discovery_runs: AtomicU64,
    models_discovered: AtomicU64,
}

impl CountingMetricsRecorder {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read all counters.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            mutations_ok: self.mutations_ok.load(Ordering::Relaxed),
            mutations_failed: self.mutations_failed.load(Ordering::Relaxed),
            validation_failures: self.validation_failures.load(Ordering::Relaxed),
            defaults_cleared: self.defaults_cleared.load(Ordering::Relaxed),
            discovery_runs: self.discovery_runs.load(Ordering::Relaxed),
            models_discovered: self.models_discovered.load(Ordering::Relaxed),
        }
    }
}

impl MetricsRecorder for CountingMetricsRecorder {
    fn record_mutation(&self, operation: &str, success: bool) {
        let counter = if success {
            &self.mutations_ok
        } else {
            &self.mutations_failed
        };
        counter.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(operation, success, "registry mutation");
    }

    fn record_validation_failure(&self, field: &str) {
        self.validation_failures.fetch_add(1, Ordering::Relaxed);
        tracing::trace!(field, "validation failure");
    }

    fn record_default_cleared(&self) {
        self.defaults_cleared.fetch_add(1, Ordering::Relaxed);
    }

    fn record_discovery(&self, endpoint: &str, added: usize) {
        self.discovery_runs.fetch_add(1, Ordering::Relaxed);
        self.models_discovered
            .fetch_add(added as u64, Ordering::Relaxed);
        tracing::trace!(endpoint, added, "discovery merge");
    }
}

/// Initialise global tracing for modelhub binaries.
///
/// The effective filter is, in order of precedence: the explicit `level`
/// argument, `RUST_LOG`, then `info`. Logs go to stderr so command output on
/// stdout stays machine-readable.
pub fn init(level: Option<&str>) -> Result<()> {
    let filter = if let Some(level_str) = level {
        parse_level_filter(level_str)?
    } else if env::var("RUST_LOG").is_ok() {
        EnvFilter::from_default_env()
    } else {
        EnvFilter::new("info")
    };

    let timestamp_format = format_description::parse(
        "[year]-[month]-[day]T[hour]:[minute]:[second].[subsecond digits:3]",
    )
    .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    let fmt_layer = fmt::layer()
        .with_writer(std::io::stderr)
        .with_target(true)
        .with_thread_ids(false)
        .with_thread_names(false)
        .with_level(true)
        .with_timer(OffsetTime::new(
            // Falls back to UTC if the local offset cannot be determined.
            UtcOffset::current_local_offset().unwrap_or(UtcOffset::UTC),
            timestamp_format,
        ));

    tracing_subscriber::registry()
        .with(filter)
        .with(fmt_layer)
        .try_init()
        .map_err(|e| TelemetryError::SubscriberInit(e.to_string()))?;

    Ok(())
}

/// Parse a simple level string into an `EnvFilter`.
///
/// Supports both plain levels ("info", "debug", etc.) and full `EnvFilter`
/// expressions (like "info,modelhub_registry=debug").
fn parse_level_filter(level_str: &str) -> Result<EnvFilter> {
    if Level::from_str(level_str).is_ok() {
        return Ok(EnvFilter::new(level_str));
    }

    EnvFilter::builder()
        .parse(level_str)
        .map_err(|e| TelemetryError::InvalidLevel(format!("{} ({})", level_str, e)))
}
