mod error;
mod file;
mod memory;
mod repository;

pub use error::{ImportError, RepositoryError, StoreError};
pub use file::FileStore;
pub use memory::MemoryStore;
pub use repository::{RoadmapPatch, RoadmapRepository, StorageInfo};

/// Trait for string key/value backends.
///
/// Implementations hold opaque documents under flat string keys. The
/// repository layers roadmap semantics on top.
pub trait KeyValueStore {
    /// Reads a value, `None` when the key is absent.
    fn get(&self, key: &str) -> Result<Option<String>, StoreError>;

    /// Writes a value, replacing any previous one.
    ///
    /// Fails with [`StoreError::QuotaExceeded`] when the backend is full.
    fn set(&self, key: &str, value: &str) -> Result<(), StoreError>;

    /// Removes a key. Removing an absent key is not an error.
    fn remove(&self, key: &str) -> Result<(), StoreError>;

    /// Lists every key currently held.
    fn list_keys(&self) -> Result<Vec<String>, StoreError>;

    /// Probes whether the backend can be used at all.
    fn is_available(&self) -> bool;
}

impl<T: KeyValueStore + ?Sized> KeyValueStore for std::sync::Arc<T> {
    fn get(&self, key: &str) -> Result<Option<String>, StoreError> {
        (**self).get(key)
    }

    fn set(&self, key: &str, value: &str) -> Result<(), StoreError> {
        (**self).set(key, value)
    }

    fn remove(&self, key: &str) -> Result<(), StoreError> {
        (**self).remove(key)
    }

    fn list_keys(&self) -> Result<Vec<String>, StoreError> {
        (**self).list_keys()
    }

    fn is_available(&self) -> bool {
        (**self).is_available()
    }
}
