use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::error::PersistenceError;
use crate::record::CollectionRecord;

/// What to do when the state file exists but cannot be parsed.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CorruptStatePolicy {
    /// Surface `PersistenceError::Corrupt` to the caller.
    #[default]
    Abort,
    /// Move the broken file to `<file>.corrupt` and start from an empty record.
    Recreate,
}

/// A `CollectionRecord` bound to its backing file.
///
/// Every mutator that changes durable fields writes the file before
/// returning, so a caller that observed `Ok` can rely on the change
/// surviving a crash.
#[derive(Debug)]
pub struct SyncState {
    path: PathBuf,
    record: CollectionRecord,
}

impl SyncState {
    /// Read the state file at `path`. A missing file yields an empty record
    /// (nothing is written).
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, PersistenceError> {
        let path = path.into();
        let bytes = match std::fs::read(&path) {
            Ok(bytes) => bytes,
            Err(e) if e.kind() == io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No sync state on disk, starting empty");
                return Ok(Self {
                    path,
                    record: CollectionRecord::default(),
                });
            }
            Err(e) => return Err(e.into()),
        };

        let mut record: CollectionRecord =
            serde_json::from_slice(&bytes).map_err(|e| PersistenceError::Corrupt {
                path: path.clone(),
                reason: e.to_string(),
            })?;

        let repaired = record.repair();
        if !repaired.is_empty() {
            tracing::warn!(
                path = %path.display(),
                locations = ?repaired,
                "Uploaded locations missing from collected set, added them back"
            );
        }

        tracing::info!(
            path = %path.display(),
            collected = record.collected_locations.len(),
            uploaded = record.uploaded_locations.len(),
            "Sync state loaded"
        );
        Ok(Self { path, record })
    }

    /// Load the state file, applying `policy` if it is corrupt. A record
    /// that did not exist yet is written immediately.
    pub fn open(path: impl Into<PathBuf>, policy: CorruptStatePolicy) -> Result<Self, PersistenceError> {
        let path = path.into();
        let existed = path.exists();

        match Self::load(&path) {
            Ok(state) => {
                if !existed {
                    state.save()?;
                }
                Ok(state)
            }
            Err(PersistenceError::Corrupt { path, reason }) if policy == CorruptStatePolicy::Recreate => {
                let backup = sibling_path(&path, ".corrupt")?;
                std::fs::rename(&path, &backup)?;
                tracing::warn!(
                    path = %path.display(),
                    backup = %backup.display(),
                    reason = %reason,
                    "Corrupt sync state moved aside, recreating"
                );
                let state = Self {
                    path,
                    record: CollectionRecord::default(),
                };
                state.save()?;
                Ok(state)
            }
            Err(e) => Err(e),
        }
    }

    /// Atomically replace the backing file with the in-memory record.
    pub fn save(&self) -> Result<(), PersistenceError> {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let bytes = serde_json::to_vec_pretty(&self.record)?;

        // Write to temp file first, then rename for atomicity
        let tmp_path = sibling_path(&self.path, ".tmp")?;
        std::fs::write(&tmp_path, &bytes)?;
        std::fs::rename(&tmp_path, &self.path)?;

        tracing::trace!(path = %self.path.display(), bytes = bytes.len(), "Sync state saved");
        Ok(())
    }

    /// Record a visited location. Returns `false` without touching the disk
    /// if it was already collected.
    pub fn mark_collected(&mut self, location: u32) -> Result<bool, PersistenceError> {
        if !self.record.collected_locations.insert(location) {
            return Ok(false);
        }
        if let Err(e) = self.save() {
            self.record.collected_locations.remove(&location);
            return Err(e);
        }
        Ok(true)
    }

    /// Record server acknowledgement for `locations`. Locations that were
    /// never collected are skipped.
    pub fn mark_uploaded(&mut self, locations: &[u32]) -> Result<(), PersistenceError> {
        let mut added = Vec::new();
        for &location in locations {
            if !self.record.collected_locations.contains(&location) {
                tracing::warn!(location, "Ignoring upload acknowledgement for uncollected location");
                continue;
            }
            if self.record.uploaded_locations.insert(location) {
                added.push(location);
            }
        }
        if added.is_empty() {
            return Ok(());
        }
        if let Err(e) = self.save() {
            for location in &added {
                self.record.uploaded_locations.remove(location);
            }
            return Err(e);
        }
        Ok(())
    }

    pub fn set_latest_message_displayed(&mut self, index: u64) -> Result<(), PersistenceError> {
        if self.record.latest_message_displayed == index {
            return Ok(());
        }
        let previous = std::mem::replace(&mut self.record.latest_message_displayed, index);
        if let Err(e) = self.save() {
            self.record.latest_message_displayed = previous;
            return Err(e);
        }
        Ok(())
    }

    pub fn pending_locations(&self) -> Vec<u32> {
        self.record.pending_locations()
    }

    pub fn record(&self) -> &CollectionRecord {
        &self.record
    }

    pub fn latest_message_displayed(&self) -> u64 {
        self.record.latest_message_displayed
    }

    pub fn path(&self) -> &Path {
        &self.path
    }
}

fn sibling_path(path: &Path, suffix: &str) -> Result<PathBuf, PersistenceError> {
    let name = path.file_name().ok_or_else(|| {
        PersistenceError::Io(io::Error::new(
            io::ErrorKind::InvalidInput,
            format!("sync state path has no file name: {}", path.display()),
        ))
    })?;
    let mut name = OsString::from(name);
    name.push(suffix);
    Ok(path.with_file_name(name))
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn data_path(dir: &TempDir) -> PathBuf {
        dir.path().join("data.json")
    }

    #[test]
    fn load_missing_file_is_empty() {
        let dir = TempDir::new().unwrap();
        let state = SyncState::load(data_path(&dir)).unwrap();
        assert_eq!(state.record(), &CollectionRecord::default());
        assert!(!data_path(&dir).exists());
    }

    #[test]
    fn open_missing_file_creates_it() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("nested").join("data.json");
        SyncState::open(&path, CorruptStatePolicy::Abort).unwrap();
        assert!(path.exists());
    }

    #[test]
    fn save_and_reload_roundtrip() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load(data_path(&dir)).unwrap();
        state.mark_collected(10).unwrap();
        state.mark_collected(15).unwrap();
        state.mark_uploaded(&[15]).unwrap();
        state.set_latest_message_displayed(4).unwrap();

        let reloaded = SyncState::load(data_path(&dir)).unwrap();
        assert_eq!(reloaded.record(), state.record());
        assert_eq!(reloaded.latest_message_displayed(), 4);
    }

    #[test]
    fn mark_collected_is_idempotent() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load(data_path(&dir)).unwrap();
        assert!(state.mark_collected(10).unwrap());
        assert!(!state.mark_collected(10).unwrap());
        assert_eq!(state.record().collected_locations.len(), 1);
    }

    #[test]
    fn mark_collected_is_durable_before_return() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load(data_path(&dir)).unwrap();
        state.mark_collected(42).unwrap();

        let on_disk: serde_json::Value =
            serde_json::from_slice(&std::fs::read(data_path(&dir)).unwrap()).unwrap();
        assert_eq!(on_disk["collected_locations"], serde_json::json!([42]));
        assert!(!dir.path().join("data.json.tmp").exists());
    }

    #[test]
    fn mark_uploaded_keeps_subset_invariant() {
        let dir = TempDir::new().unwrap();
        let mut state = SyncState::load(data_path(&dir)).unwrap();
        state.mark_collected(1).unwrap();
        state.mark_uploaded(&[1, 2]).unwrap();

        assert!(state.record().is_consistent());
        assert_eq!(state.record().uploaded_locations.len(), 1);
        assert!(state.pending_locations().is_empty());
    }

    #[test]
    fn malformed_file_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(data_path(&dir), b"{ not json").unwrap();
        let result = SyncState::load(data_path(&dir));
        assert!(matches!(result, Err(PersistenceError::Corrupt { .. })));
    }

    #[test]
    fn wrong_shape_is_corrupt() {
        let dir = TempDir::new().unwrap();
        std::fs::write(data_path(&dir), br#"{"collected_locations": "ten"}"#).unwrap();
        let result = SyncState::open(data_path(&dir), CorruptStatePolicy::Abort);
        assert!(matches!(result, Err(PersistenceError::Corrupt { .. })));
    }

    #[test]
    fn recreate_policy_moves_corrupt_file_aside() {
        let dir = TempDir::new().unwrap();
        std::fs::write(data_path(&dir), b"garbage").unwrap();

        let state = SyncState::open(data_path(&dir), CorruptStatePolicy::Recreate).unwrap();
        assert_eq!(state.record(), &CollectionRecord::default());
        assert_eq!(
            std::fs::read(dir.path().join("data.json.corrupt")).unwrap(),
            b"garbage"
        );
        assert!(SyncState::load(data_path(&dir)).is_ok());
    }

    #[test]
    fn inconsistent_file_is_repaired_on_load() {
        let dir = TempDir::new().unwrap();
        std::fs::write(
            data_path(&dir),
            br#"{"collected_locations": [1], "uploaded_locations": [1, 9], "latest_message_displayed": 0}"#,
        )
        .unwrap();
        let state = SyncState::load(data_path(&dir)).unwrap();
        assert!(state.record().is_consistent());
        assert!(state.record().collected_locations.contains(&9));
    }
}
