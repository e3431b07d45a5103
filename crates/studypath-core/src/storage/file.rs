use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use tracing::debug;

use crate::config::StorageConfig;

use super::error::StoreError;
use super::KeyValueStore;

const ENTRY_EXTENSION: &str = "json";

/// File-based store: one file per key.
///
/// ```text
/// .studypath/
///   studypath_roadmaps.json          # Metadata list
///   studypath_roadmap_{id}.json      # One roadmap aggregate
/// ```
pub struct FileStore {
    base_path: PathBuf,
}

impl FileStore {
    /// Creates a store rooted at `base_path`. The directory is created lazily.
    pub fn new(base_path: impl Into<PathBuf>) -> Self {
        Self {
            base_path: base_path.into(),
        }
    }

    /// Creates a store rooted at the configured data directory.
    pub fn with_config(config: &StorageConfig) -> Self {
        Self::new(config.data_path())
    }

    /// Returns the directory holding the entries.
    pub fn base_path(&self) -> &Path {
        &self.base_path
    }

    /// Returns the path of an entry, rejecting keys that could escape the directory.
    fn entry_path(&self, key: &str) -> Result<PathBuf, StoreError> {
        let valid = !key.is_empty()
            && key
                .chars()
                .all(|c| c.is_ascii_alphanumeric() || c == '_' || c == '-');
        if !valid {
            return Err(StoreError::InvalidKey(key.to_string()));
        }
        Ok(self.base_path.join(format!("{key}.{ENTRY_EXTENSION}")))
    }

    /// Ensures the base directory exists.
    fn ensure_dir(&self) -> Result<(), StoreError> {
        if !self.base_path.exists() {
            fs::create_dir_all(&self.base_path).map_err(|e| self.write_error(&self.base_path, e))?;
        }
        Ok(())
    }

    fn write_error(&self, path: &Path, source: std::io::Error) -> StoreError {
        if is_out_of_space(&source) {
            return StoreError::QuotaExceeded {
                key: path.display().to_string(),
                needed: 0,
                limit: 0,
            };
        }
        if source.kind() == ErrorKind::PermissionDenied {
            return StoreError::Unavailable(format!("{}: {source}", path.display()));
        }
        StoreError::io(path, source)
    }
}

impl KeyValueStore for FileStore {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        let path = self.entry_path(key)?;
        match fs::read_to_string(&path) {
            Ok(contents) => Ok(Some(contents)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        self.ensure_dir()?;

        // Write then rename so a crash never leaves a half-written entry.
        let tmp = path.with_extension("tmp");
        fs::write(&tmp, value).map_err(|e| self.write_error(&tmp, e))?;
        if let Err(e) = fs::rename(&tmp, &path) {
            let _ = fs::remove_file(&tmp);
            return Err(self.write_error(&path, e));
        }

        debug!(key, bytes = value.len(), "wrote store entry");
        Ok(())
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        let path = self.entry_path(key)?;
        match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(StoreError::io(&path, e)),
        }
    }

    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        if !self.base_path.exists() {
            return Ok(Vec::new());
        }

        let entries = fs::read_dir(&self.base_path).map_err(|e| StoreError::io(&self.base_path, e))?;

        let mut keys = Vec::new();
        for entry in entries {
            let entry = entry.map_err(|e| StoreError::io(&self.base_path, e))?;
            let path = entry.path();
            if path.extension().and_then(|e| e.to_str()) != Some(ENTRY_EXTENSION) {
                continue;
            }
            if let Some(stem) = path.file_stem().and_then(|s| s.to_str()) {
                keys.push(stem.to_string());
            }
        }
        keys.sort();

        Ok(keys)
    }

    fn is_available(&self) -> bool {
        if self.ensure_dir().is_err() {
            return false;
        }
        fs::metadata(&self.base_path)
            .map(|m| m.is_dir() && !m.permissions().readonly())
            .unwrap_or(false)
    }
}

#[cfg(unix)]
fn is_out_of_space(err: &std::io::Error) -> bool {
    // ENOSPC and EDQUOT on Linux.
    matches!(err.raw_os_error(), Some(28) | Some(122))
}

#[cfg(not(unix))]
fn is_out_of_space(_err: &std::io::Error) -> bool {
    false
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_set_get_remove() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path().join("data"));

        assert_eq!(store.get("studypath_roadmaps").unwrap(), None);
        store.set("studypath_roadmaps", "[]").unwrap();
        assert_eq!(store.get("studypath_roadmaps").unwrap().as_deref(), Some("[]"));
        assert_eq!(store.list_keys().unwrap(), vec!["studypath_roadmaps"]);

        store.remove("studypath_roadmaps").unwrap();
        store.remove("studypath_roadmaps").unwrap();
        assert_eq!(store.get("studypath_roadmaps").unwrap(), None);
    }

    #[test]
    fn test_rejects_path_like_keys() {
        let dir = TempDir::new().unwrap();
        let store = FileStore::new(dir.path());

        assert!(matches!(store.set("../evil", "x"), Err(StoreError::InvalidKey(_))));
        assert!(matches!(store.get("a/b"), Err(StoreError::InvalidKey(_))));
    }
}
