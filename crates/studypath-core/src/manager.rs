use thiserror::Error;
use tracing::info;

use crate::config::NEW_ROADMAP_ID;
use crate::generator::{GenerationError, RoadmapGenerator};
use crate::roadmap::{validate_topic, Roadmap, RoadmapMetadata};
use crate::storage::{ImportError, KeyValueStore, RepositoryError, RoadmapRepository};

/// Creates, loads and lists roadmaps.
///
/// This is the entry point a front end uses before handing a roadmap to a
/// [`LearningSession`](crate::navigation::LearningSession).
pub struct RoadmapManager<S: KeyValueStore, G: RoadmapGenerator> {
    repository: RoadmapRepository<S>,
    generator: G,
}

impl<S: KeyValueStore, G: RoadmapGenerator> RoadmapManager<S, G> {
    pub fn new(repository: RoadmapRepository<S>, generator: G) -> Self {
        Self {
            repository,
            generator,
        }
    }

    pub fn repository(&self) -> &RoadmapRepository<S> {
        &self.repository
    }

    /// Loads a roadmap, or generates one when `id` is the `new` sentinel.
    pub async fn open(&self, id: &str, topic: Option<&str>) -> Result<Roadmap, ManagerError> {
        if id == NEW_ROADMAP_ID {
            let topic = topic.ok_or(ManagerError::MissingTopic)?;
            return self.create(topic).await;
        }
        self.get(id)
    }

    /// Generates a roadmap for `topic` and saves it.
    pub async fn create(&self, topic: &str) -> Result<Roadmap, ManagerError> {
        let topic = validate_topic(topic).map_err(GenerationError::from)?;

        let structure = self.generator.generate(&topic).await?;

        let roadmap = Roadmap::new(topic, structure);
        self.repository.save(&roadmap)?;
        info!(id = %roadmap.id, nodes = roadmap.nodes.len(), "created roadmap");
        Ok(roadmap)
    }

    pub fn get(&self, id: &str) -> Result<Roadmap, ManagerError> {
        self.repository
            .get(id)?
            .ok_or_else(|| ManagerError::NotFound(id.to_string()))
    }

    /// Saved roadmaps, most recently created first.
    pub fn list(&self) -> Result<Vec<RoadmapMetadata>, ManagerError> {
        Ok(self.repository.list_metadata()?)
    }

    pub fn delete(&self, id: &str) -> Result<(), ManagerError> {
        Ok(self.repository.delete(id)?)
    }

    /// Imports a document as a new roadmap.
    pub fn import(&self, raw: &str) -> Result<Roadmap, ManagerError> {
        Ok(self.repository.import(raw)?)
    }

    /// The stored roadmap as a pretty-printed document.
    pub fn export(&self, id: &str) -> Result<String, ManagerError> {
        self.repository.export(id).map_err(|e| match e {
            RepositoryError::NotFound(id) => ManagerError::NotFound(id),
            other => ManagerError::Repository(other),
        })
    }
}

/// Errors that can occur in RoadmapManager operations.
#[derive(Debug, Error)]
pub enum ManagerError {
    #[error("Roadmap not found: {0}")]
    NotFound(String),

    #[error("A topic is required to create a new roadmap")]
    MissingTopic,

    #[error(transparent)]
    Generation(#[from] GenerationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error(transparent)]
    Import(#[from] ImportError),
}
