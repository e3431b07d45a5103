//! Roadmap persistence over a bounded key/value store.
//!
//! Layout inside the store:
//!
//! ```text
//! {namespace}_roadmaps          # Metadata list, newest first
//! {namespace}_roadmap_{id}      # Full roadmap aggregate
//! ```

use serde_json::Value;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::config::StorageConfig;
use crate::progress::CompletedResources;
use crate::roadmap::{self, Edge, Position, Roadmap, RoadmapMetadata, TopicNode};

use super::error::{ImportError, RepositoryError, StoreError};
use super::KeyValueStore;

/// Field name used by documents written before per-resource tracking.
const LEGACY_COMPLETED_NODES: &str = "completedNodes";

/// Partial update merged by [`RoadmapRepository::update`].
#[derive(Debug, Clone, Default)]
pub struct RoadmapPatch {
    pub topic: Option<String>,
    pub title: Option<String>,
    pub nodes: Option<Vec<TopicNode>>,
    pub edges: Option<Vec<Edge>>,
    pub completed_resources: Option<CompletedResources>,
    /// `Some(None)` clears the saved position.
    pub last_position: Option<Option<Position>>,
}

impl RoadmapPatch {
    fn apply(self, roadmap: &mut Roadmap) {
        if let Some(topic) = self.topic {
            roadmap.topic = topic;
        }
        if let Some(title) = self.title {
            roadmap.title = title;
        }
        if let Some(nodes) = self.nodes {
            roadmap.nodes = nodes;
        }
        if let Some(edges) = self.edges {
            roadmap.edges = edges;
        }
        if let Some(completed) = self.completed_resources {
            roadmap.completed_resources = completed;
        }
        if let Some(position) = self.last_position {
            roadmap.last_position = position;
        }
    }
}

/// Snapshot of repository usage.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StorageInfo {
    pub available: bool,
    pub roadmap_count: usize,
    pub max_roadmaps: usize,
}

/// Roadmap aggregates plus their metadata list, bounded to
/// `max_roadmaps` entries.
pub struct RoadmapRepository<S: KeyValueStore> {
    store: S,
    config: StorageConfig,
}

impl<S: KeyValueStore> RoadmapRepository<S> {
    /// Creates a repository with the default namespace and capacity.
    pub fn new(store: S) -> Self {
        Self::with_config(store, StorageConfig::default())
    }

    /// Creates a repository with custom configuration.
    pub fn with_config(store: S, config: StorageConfig) -> Self {
        Self { store, config }
    }

    /// Returns the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    pub fn max_roadmaps(&self) -> usize {
        self.config.max_roadmaps
    }

    fn ensure_available(&self) -> Result<(), RepositoryError> {
        if self.store.is_available() {
            Ok(())
        } else {
            Err(RepositoryError::StorageUnavailable(
                "key/value store cannot be used".to_string(),
            ))
        }
    }

    /// Upserts the aggregate and its metadata entry.
    ///
    /// A new id goes to the front of the list. When that pushes the list
    /// past capacity, the oldest entries and their aggregates are evicted.
    /// If any write fails the store is restored to its previous contents.
    pub fn save(&self, roadmap: &Roadmap) -> Result<(), RepositoryError> {
        self.ensure_available()?;

        let key = self.config.roadmap_key(&roadmap.id);
        let blob = serde_json::to_string(roadmap)?;
        let previous_blob = self.store.get(&key)?;

        let mut list = self.list_metadata()?;
        let metadata = roadmap.to_metadata();
        let mut evicted = Vec::new();
        match list.iter().position(|m| m.id == roadmap.id) {
            Some(index) => list[index] = metadata,
            None => {
                list.insert(0, metadata);
                while list.len() > self.config.max_roadmaps {
                    if let Some(oldest) = list.pop() {
                        evicted.push(oldest);
                    }
                }
            }
        }

        // Evict first so the freed space is available to the new write.
        let mut stashed = Vec::with_capacity(evicted.len());
        for old in &evicted {
            let old_key = self.config.roadmap_key(&old.id);
            let removed = self
                .store
                .get(&old_key)
                .and_then(|old_blob| self.store.remove(&old_key).map(|()| old_blob));
            match removed {
                Ok(old_blob) => stashed.push((old_key, old_blob)),
                Err(e) => {
                    self.restore(&stashed);
                    return Err(e.into());
                }
            }
        }

        if let Err(e) = self.store.set(&key, &blob) {
            warn!(roadmap_id = %roadmap.id, error = %e, "roadmap write failed, rolling back");
            self.restore(&stashed);
            return Err(e.into());
        }

        let list_json = serde_json::to_string(&list)?;
        if let Err(e) = self.store.set(&self.config.list_key(), &list_json) {
            warn!(roadmap_id = %roadmap.id, error = %e, "metadata write failed, rolling back");
            stashed.push((key, previous_blob));
            self.restore(&stashed);
            return Err(e.into());
        }

        for old in &evicted {
            info!(roadmap_id = %old.id, title = %old.title, "evicted oldest roadmap");
        }
        debug!(roadmap_id = %roadmap.id, bytes = blob.len(), "saved roadmap");
        Ok(())
    }

    /// Puts back stashed entries after a failed save. Best effort.
    fn restore(&self, stashed: &[(String, Option<String>)]) {
        for (key, blob) in stashed.iter().rev() {
            let result = match blob {
                Some(blob) => self.store.set(key, blob),
                None => self.store.remove(key),
            };
            if let Err(e) = result {
                warn!(key = %key, error = %e, "rollback step failed");
            }
        }
    }

    /// Loads a roadmap.
    ///
    /// An id the store cannot hold as a key is reported as absent. A corrupt entry is deleted and reported as absent. Documents in the
    /// legacy node-completion shape are migrated on read, losing their
    /// completion state.
    pub fn get(&self, id: &str) -> Result<Option<Roadmap>, RepositoryError> {
        self.ensure_available()?;

        let raw = match self.store.get(&self.config.roadmap_key(id)) {
            Ok(Some(raw)) => raw,
            Ok(None) | Err(StoreError::InvalidKey(_)) => return Ok(None),
            Err(e) => return Err(e.into()),
        };

        match decode_roadmap(&raw) {
            Ok(roadmap) => Ok(Some(roadmap)),
            Err(e) => {
                warn!(roadmap_id = %id, error = %e, "deleting corrupt roadmap entry");
                self.delete(id)?;
                Ok(None)
            }
        }
    }

    /// Returns the metadata list, newest first.
    ///
    /// A corrupt list is cleared and reported as empty.
    pub fn list_metadata(&self) -> Result<Vec<RoadmapMetadata>, RepositoryError> {
        self.ensure_available()?;

        let list_key = self.config.list_key();
        let Some(raw) = self.store.get(&list_key)? else {
            return Ok(Vec::new());
        };

        match serde_json::from_str(&raw) {
            Ok(list) => Ok(list),
            Err(e) => {
                warn!(error = %e, "clearing corrupt roadmap list");
                self.store.remove(&list_key)?;
                Ok(Vec::new())
            }
        }
    }

    /// Removes a roadmap and its metadata entry. Deleting twice is fine.
    pub fn delete(&self, id: &str) -> Result<(), RepositoryError> {
        self.ensure_available()?;

        match self.store.remove(&self.config.roadmap_key(id)) {
            Ok(()) | Err(StoreError::InvalidKey(_)) => {}
            Err(e) => return Err(e.into()),
        }

        let mut list = self.list_metadata()?;
        let before = list.len();
        list.retain(|m| m.id != id);
        if list.len() != before {
            self.store
                .set(&self.config.list_key(), &serde_json::to_string(&list)?)?;
            info!(roadmap_id = %id, "deleted roadmap");
        }

        Ok(())
    }

    /// Merges `patch` into a stored roadmap and saves it.
    pub fn update(&self, id: &str, patch: RoadmapPatch) -> Result<Roadmap, RepositoryError> {
        let mut roadmap = self
            .get(id)?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;

        patch.apply(&mut roadmap);
        roadmap.touch();
        self.save(&roadmap)?;

        Ok(roadmap)
    }

    /// Parses, validates, re-identifies and saves an exported document.
    ///
    /// The imported roadmap always receives a fresh id, so an existing
    /// roadmap with the same id is never overwritten.
    pub fn import(&self, raw: &str) -> Result<Roadmap, ImportError> {
        let value: Value = serde_json::from_str(raw).map_err(ImportError::InvalidJson)?;
        let mut roadmap = roadmap::validate(&value)?;

        let original_id = std::mem::replace(&mut roadmap.id, Uuid::new_v4().to_string());
        self.save(&roadmap)?;

        info!(roadmap_id = %roadmap.id, %original_id, topic = %roadmap.topic, "imported roadmap");
        Ok(roadmap)
    }

    /// Serialises a stored roadmap as a pretty-printed document.
    pub fn export(&self, id: &str) -> Result<String, RepositoryError> {
        let roadmap = self
            .get(id)?
            .ok_or_else(|| RepositoryError::NotFound(id.to_string()))?;
        Ok(roadmap.to_pretty_json()?)
    }

    /// Loads every listed roadmap, skipping entries that turn out corrupt.
    pub fn list_roadmaps(&self) -> Result<Vec<Roadmap>, RepositoryError> {
        let mut roadmaps = Vec::new();
        for metadata in self.list_metadata()? {
            if let Some(roadmap) = self.get(&metadata.id)? {
                roadmaps.push(roadmap);
            }
        }
        Ok(roadmaps)
    }

    /// Removes every key in this repository's namespace.
    pub fn clear_all(&self) -> Result<(), RepositoryError> {
        self.ensure_available()?;

        let prefix = format!("{}_", self.config.namespace);
        let mut removed = 0usize;
        for key in self.store.list_keys()? {
            if key.starts_with(&prefix) {
                self.store.remove(&key)?;
                removed += 1;
            }
        }

        info!(removed, "cleared all roadmaps");
        Ok(())
    }

    /// Reports availability and how full the repository is.
    pub fn storage_info(&self) -> StorageInfo {
        let available = self.store.is_available();
        let roadmap_count = if available {
            self.list_metadata().map(|l| l.len()).unwrap_or(0)
        } else {
            0
        };

        StorageInfo {
            available,
            roadmap_count,
            max_roadmaps: self.config.max_roadmaps,
        }
    }
}

/// Decodes a stored aggregate, applying the legacy migration.
fn decode_roadmap(raw: &str) -> Result<Roadmap, serde_json::Error> {
    let mut value: Value = serde_json::from_str(raw)?;

    if let Some(obj) = value.as_object_mut() {
        if obj.remove(LEGACY_COMPLETED_NODES).is_some() {
            warn!("migrating legacy roadmap: node completion state is discarded");
            obj.insert(
                "completedResources".to_string(),
                Value::Object(Default::default()),
            );
        }
    }

    serde_json::from_value(value)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::RoadmapStructure;
    use crate::storage::MemoryStore;

    fn roadmap(topic: &str) -> Roadmap {
        Roadmap::new(
            topic,
            RoadmapStructure {
                nodes: vec![TopicNode::new("a", "A", 1, 1)],
                edges: Vec::new(),
            },
        )
    }

    #[test]
    fn test_resave_keeps_list_position() {
        let repo = RoadmapRepository::new(MemoryStore::new());
        let first = roadmap("First");
        let second = roadmap("Second");
        repo.save(&first).unwrap();
        repo.save(&second).unwrap();

        repo.save(&first).unwrap();

        let ids: Vec<String> = repo.list_metadata().unwrap().into_iter().map(|m| m.id).collect();
        assert_eq!(ids, vec![second.id, first.id]);
    }

    #[test]
    fn test_update_missing_is_not_found() {
        let repo = RoadmapRepository::new(MemoryStore::new());
        let err = repo.update("nope", RoadmapPatch::default()).unwrap_err();
        assert!(matches!(err, RepositoryError::NotFound(id) if id == "nope"));
    }

    #[test]
    fn test_update_merges_and_touches() {
        let repo = RoadmapRepository::new(MemoryStore::new());
        let original = roadmap("Rust");
        repo.save(&original).unwrap();

        let updated = repo
            .update(
                &original.id,
                RoadmapPatch {
                    title: Some("Renamed".to_string()),
                    last_position: Some(Some(Position::new("a", 0))),
                    ..RoadmapPatch::default()
                },
            )
            .unwrap();

        assert_eq!(updated.title, "Renamed");
        assert!(updated.updated_at >= original.updated_at);
        let stored = repo.get(&original.id).unwrap().unwrap();
        assert_eq!(stored.last_position, Some(Position::new("a", 0)));
        assert_eq!(repo.list_metadata().unwrap()[0].title, "Renamed");
    }

    #[test]
    fn test_unavailable_store_is_reported() {
        let repo = RoadmapRepository::new(MemoryStore::unavailable());
        assert!(matches!(
            repo.save(&roadmap("Rust")),
            Err(RepositoryError::StorageUnavailable(_))
        ));
        assert!(!repo.storage_info().available);
    }
}
