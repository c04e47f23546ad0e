//! Lease state persistence for the command line host.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::lease::LeaseRecord;

/// A lease record stored on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LeaseState {
    /// The tracked lease.
    #[serde(flatten)]
    pub record: LeaseRecord,
    /// Timestamp of last update.
    pub updated_at: String,
}

impl LeaseState {
    /// Wrap a record.
    #[must_use]
    pub fn new(record: LeaseRecord) -> Self {
        Self {
            record,
            updated_at: chrono::Utc::now().to_rfc3339(),
        }
    }

    /// Load state from `path`, `None` if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the file cannot be read or parsed.
    pub fn load(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read state file {}", path.display()))?;
        let state: Self = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse state file {}", path.display()))?;

        info!(subscription_id = %state.record.subscription_id, "Loaded lease state");
        Ok(Some(state))
    }

    /// Load state from `path`, failing if it does not exist.
    ///
    /// # Errors
    /// Returns an error if the file is missing, unreadable or malformed.
    pub fn load_required(path: &Path) -> Result<Self> {
        Self::load(path)?
            .with_context(|| format!("No lease state at {}", path.display()))
    }

    /// Save state to `path`.
    ///
    /// # Errors
    /// Returns an error if the file cannot be written.
    pub fn save(&mut self, path: &Path) -> Result<()> {
        self.updated_at = chrono::Utc::now().to_rfc3339();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create {}", parent.display()))?;
        }

        let content =
            serde_json::to_string_pretty(self).context("Failed to serialize lease state")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write state file {}", path.display()))?;

        info!(
            subscription_id = %self.record.subscription_id,
            path = %path.display(),
            "Saved lease state"
        );
        Ok(())
    }

    /// Remove the state file at `path` if present.
    ///
    /// # Errors
    /// Returns an error if the file exists but cannot be removed.
    pub fn remove(path: &Path) -> Result<()> {
        if path.exists() {
            std::fs::remove_file(path)
                .with_context(|| format!("Failed to remove state file {}", path.display()))?;
        }
        Ok(())
    }

    /// Default state file location.
    #[must_use]
    pub fn default_path() -> PathBuf {
        PathBuf::from("subscription-lease.json")
    }
}
