//! Persistence backends for usage counters

use std::fs;
use std::path::{Path, PathBuf};

use parking_lot::Mutex;
use tracing::{debug, warn};

use crate::error::Result;
use crate::models::UsageState;

/// Where usage counters live between runs
pub trait UsageStore: Send + Sync {
    /// Previously saved state, or `None` when nothing was stored yet
    fn load(&self) -> Result<Option<UsageState>>;

    /// Overwrite the stored state
    fn save(&self, state: &UsageState) -> Result<()>;

    /// Drop the stored state
    fn reset(&self) -> Result<()>;
}

/// JSON file store with atomic overwrite
#[derive(Debug, Clone)]
pub struct FileUsageStore {
    path: PathBuf,
}

impl FileUsageStore {
    /// Store backed by the JSON file at `path`
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    /// Location of the JSON file
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn tmp_path(&self) -> PathBuf {
        let mut name = self
            .path
            .file_name()
            .map(|n| n.to_os_string())
            .unwrap_or_default();
        name.push(".tmp");
        self.path.with_file_name(name)
    }
}

impl UsageStore for FileUsageStore {
    fn load(&self) -> Result<Option<UsageState>> {
        let raw = match fs::read_to_string(&self.path) {
            Ok(raw) => raw,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => return Ok(None),
            Err(e) => return Err(e.into()),
        };
        match serde_json::from_str(&raw) {
            Ok(state) => Ok(Some(state)),
            Err(e) => {
                // Start over rather than refusing to run
                warn!(path = %self.path.display(), error = %e, "Unreadable usage file, starting fresh");
                Ok(None)
            }
        }
    }

    fn save(&self, state: &UsageState) -> Result<()> {
        if let Some(parent) = self.path.parent().filter(|p| !p.as_os_str().is_empty()) {
            fs::create_dir_all(parent)?;
        }
        let tmp = self.tmp_path();
        fs::write(&tmp, serde_json::to_vec_pretty(state)?)?;
        fs::rename(&tmp, &self.path)?;
        debug!(path = %self.path.display(), "Saved usage state");
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        match fs::remove_file(&self.path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}

/// In-process store for tests and ephemeral runs
#[derive(Debug, Default)]
pub struct MemoryUsageStore {
    state: Mutex<Option<UsageState>>,
}

impl MemoryUsageStore {
    /// An empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Store pre-seeded with a state
    pub fn with_state(state: UsageState) -> Self {
        Self {
            state: Mutex::new(Some(state)),
        }
    }

    /// Copy of what was last saved
    pub fn snapshot(&self) -> Option<UsageState> {
        self.state.lock().clone()
    }
}

impl UsageStore for MemoryUsageStore {
    fn load(&self) -> Result<Option<UsageState>> {
        Ok(self.state.lock().clone())
    }

    fn save(&self, state: &UsageState) -> Result<()> {
        *self.state.lock() = Some(state.clone());
        Ok(())
    }

    fn reset(&self) -> Result<()> {
        *self.state.lock() = None;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Utc;

    #[test]
    fn test_file_store_load_or_create() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUsageStore::new(dir.path().join("nested").join("api_usage.json"));
        assert!(store.load().unwrap().is_none());

        let mut state = UsageState::fresh(["rawg"], Utc::now());
        state.usage.insert("rawg".into(), 7);
        store.save(&state).unwrap();

        assert_eq!(store.load().unwrap(), Some(state));
        assert!(!store.tmp_path().exists());
    }

    #[test]
    fn test_file_store_recovers_from_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("api_usage.json");
        fs::write(&path, "{not json").unwrap();
        let store = FileUsageStore::new(&path);
        assert!(store.load().unwrap().is_none());
    }

    #[test]
    fn test_reset_removes_file() {
        let dir = tempfile::tempdir().unwrap();
        let store = FileUsageStore::new(dir.path().join("api_usage.json"));
        store.save(&UsageState::fresh(["steam"], Utc::now())).unwrap();
        store.reset().unwrap();
        assert!(store.load().unwrap().is_none());
        store.reset().unwrap();
    }
}
