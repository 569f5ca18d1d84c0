//! Persistence of the registry working copy.

use std::fs;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use modelhub_core::{DefaultModelSelection, Endpoint, HubError, Result};

/// Everything the registry needs to be rebuilt: endpoints in order plus the
/// default selection.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrySnapshot {
    #[serde(default)]
    pub endpoints: Vec<Endpoint>,

    #[serde(default = "DefaultModelSelection::empty")]
    pub default_model: DefaultModelSelection,
}

/// Where snapshots are loaded from and saved to.
pub trait RegistryStore {
    /// Load the last saved snapshot, or an empty one if nothing was saved yet.
    fn load(&self) -> Result<RegistrySnapshot>;

    /// Replace the stored snapshot.
    fn save(&self, snapshot: &RegistrySnapshot) -> Result<()>;
}

/// Snapshot stored as pretty-printed JSON in a single file.
#[derive(Debug, Clone)]
pub struct JsonFileStore {
    path: PathBuf,
}

impl JsonFileStore {
    pub fn new<P: Into<PathBuf>>(path: P) -> Self {
        Self { path: path.into() }
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    fn temp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_else(|| "modelhub.json".into());
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl RegistryStore for JsonFileStore {
    fn load(&self) -> Result<RegistrySnapshot> {
        if !self.path.exists() {
            tracing::debug!(path = %self.path.display(), "no snapshot yet, starting empty");
            return Ok(RegistrySnapshot::default());
        }

        let content = fs::read_to_string(&self.path)?;
        if content.trim().is_empty() {
            return Ok(RegistrySnapshot::default());
        }

        let snapshot: RegistrySnapshot = serde_json::from_str(&content).map_err(|e| {
            HubError::storage(format!(
                "failed to parse snapshot {}: {}",
                self.path.display(),
                e
            ))
        })?;

        tracing::debug!(
            path = %self.path.display(),
            endpoints = snapshot.endpoints.len(),
            "loaded snapshot"
        );

        Ok(snapshot)
    }

    fn save(&self, snapshot: &RegistrySnapshot) -> Result<()> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                fs::create_dir_all(parent)?;
            }
        }

        let json = serde_json::to_string_pretty(snapshot)?;
        let tmp = self.temp_path();

        // Write beside the target then rename, so readers never see a partial file.
        fs::write(&tmp, json)?;
        fs::rename(&tmp, &self.path)?;

        tracing::debug!(
            path = %self.path.display(),
            endpoints = snapshot.endpoints.len(),
            "saved snapshot"
        );

        Ok(())
    }
}
