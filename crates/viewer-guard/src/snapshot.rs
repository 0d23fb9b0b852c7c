//! JSON snapshot persistence for the in-memory rule store.

use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::entry::BlockEntry;
use crate::error::GuardResult;

/// On-disk contents of a snapshot.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct SnapshotData {
    /// Id the next inserted entry will receive.
    pub next_id: u64,
    /// Every stored entry, expired ones included.
    pub entries: Vec<BlockEntry>,
}

/// A JSON file holding the full rule set.
///
/// Writes go to a sibling temporary file which is then renamed over the
/// target, so a crash mid-write leaves the previous snapshot intact.
#[derive(Debug, Clone)]
pub struct JsonSnapshot {
    path: PathBuf,
}

impl JsonSnapshot {
    /// Create a snapshot handle for `path`. Nothing is read or written yet.
    #[must_use]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the snapshot file.
    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Load the snapshot. A missing file is an empty rule set.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file exists but cannot be read or parsed.
    pub fn load(&self) -> GuardResult<SnapshotData> {
        if !self.path.exists() {
            debug!(path = %self.path.display(), "No snapshot found, starting empty");
            return Ok(SnapshotData::default());
        }

        let contents = std::fs::read_to_string(&self.path)?;
        let data: SnapshotData = serde_json::from_str(&contents)?;
        debug!(
            path = %self.path.display(),
            entries = data.entries.len(),
            next_id = data.next_id,
            "Loaded snapshot"
        );
        Ok(data)
    }

    /// Persist `data`, replacing the previous snapshot atomically.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the file cannot be written.
    pub fn save(&self, data: &SnapshotData) -> GuardResult<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)?;
        }

        let json = serde_json::to_vec_pretty(data)?;
        let tmp = self.path.with_extension("json.tmp");
        std::fs::write(&tmp, json)?;
        std::fs::rename(&tmp, &self.path)?;
        Ok(())
    }
}
