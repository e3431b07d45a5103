use std::collections::HashSet;
use std::sync::{Mutex, MutexGuard, PoisonError};

use thiserror::Error;
use tracing::{debug, info, warn};

use super::cursor::{Cursor, NavigationError, Transition};
use crate::progress::ProgressStats;
use crate::resources::{FetchError, ResourceFetcher, ResourceQuery};
use crate::roadmap::{Position, Resource, Roadmap};
use crate::storage::{KeyValueStore, RepositoryError, RoadmapRepository};

/// Errors that can occur while studying a roadmap.
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Roadmap not found: {0}")]
    RoadmapNotFound(String),

    #[error(transparent)]
    Navigation(#[from] NavigationError),

    #[error(transparent)]
    Repository(#[from] RepositoryError),

    #[error("Failed to serialize roadmap: {0}")]
    Export(#[from] serde_json::Error),
}

/// What happened to the target node's resources during a move.
#[derive(Debug)]
pub enum FetchOutcome {
    /// Resources were already known.
    NotNeeded,
    /// Resources were fetched and saved.
    Fetched { count: usize },
    /// Another request is already fetching this node.
    InFlight,
    /// The fetch failed. The node stays unfetched so a later visit retries.
    Failed(FetchError),
}

/// A committed move.
#[derive(Debug)]
pub struct Step {
    pub position: Position,
    pub fetch: FetchOutcome,
}

/// Removes a node from the in-flight set when dropped, including when
/// the owning future is cancelled.
struct InFlightGuard<'a> {
    set: &'a Mutex<HashSet<String>>,
    node_id: String,
}

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        lock(self.set).remove(&self.node_id);
    }
}

fn lock<T>(mutex: &Mutex<T>) -> MutexGuard<'_, T> {
    mutex.lock().unwrap_or_else(PoisonError::into_inner)
}

/// One learner working through one roadmap.
///
/// Every change is applied to a copy of the roadmap, saved, and only then
/// committed to the session, so a failed save leaves both the store and
/// the session unchanged. Locks are never held across an await; the
/// in-flight set guarantees at most one outstanding fetch per node.
pub struct LearningSession<'a, S: KeyValueStore, F: ResourceFetcher> {
    repository: &'a RoadmapRepository<S>,
    fetcher: &'a F,
    roadmap: Mutex<Roadmap>,
    cursor: Mutex<Cursor>,
    in_flight: Mutex<HashSet<String>>,
}

impl<'a, S: KeyValueStore, F: ResourceFetcher> LearningSession<'a, S, F> {
    /// Starts a session on an already loaded roadmap, restoring its saved
    /// position without fetching.
    pub fn new(repository: &'a RoadmapRepository<S>, fetcher: &'a F, roadmap: Roadmap) -> Self {
        let cursor = Cursor::resume(&roadmap);
        Self {
            repository,
            fetcher,
            roadmap: Mutex::new(roadmap),
            cursor: Mutex::new(cursor),
            in_flight: Mutex::new(HashSet::new()),
        }
    }

    /// Loads a roadmap and resumes at its saved position.
    ///
    /// When the saved node has no resources yet they are fetched, and the
    /// resource index is then clamped to what came back.
    pub async fn open(
        repository: &'a RoadmapRepository<S>,
        fetcher: &'a F,
        id: &str,
    ) -> Result<Self, SessionError> {
        let roadmap = repository
            .get(id)?
            .ok_or_else(|| SessionError::RoadmapNotFound(id.to_string()))?;
        let session = Self::new(repository, fetcher, roadmap);

        if let Some(position) = session.current() {
            if let FetchOutcome::Fetched { .. } = session.ensure_fetched(&position.node_id).await? {
                session.clamp_position()?;
            }
        }

        Ok(session)
    }

    /// Moves to the first resource of a node, fetching its resources if needed.
    pub async fn select_node(&self, node_id: &str) -> Result<Step, SessionError> {
        let transition = {
            let roadmap = lock(&self.roadmap);
            lock(&self.cursor).peek_select(&roadmap, node_id)?
        };
        self.move_to(transition).await
    }

    /// Next resource, or the first resource of the next node. `None` at the
    /// end, or while the current node's resources are still loading.
    pub async fn advance(&self) -> Result<Option<Step>, SessionError> {
        if self.current_is_loading() {
            return Ok(None);
        }
        let transition = {
            let roadmap = lock(&self.roadmap);
            lock(&self.cursor).peek_next(&roadmap)
        };
        match transition {
            Some(transition) => self.move_to(transition).await.map(Some),
            None => Ok(None),
        }
    }

    /// Previous resource, or the last resource of the previous node.
    /// `None` at the start, or while the current node is loading.
    pub async fn retreat(&self) -> Result<Option<Step>, SessionError> {
        if self.current_is_loading() {
            return Ok(None);
        }
        let transition = {
            let roadmap = lock(&self.roadmap);
            lock(&self.cursor).peek_prev(&roadmap)
        };
        match transition {
            Some(transition) => self.move_to(transition).await.map(Some),
            None => Ok(None),
        }
    }

    pub fn can_advance(&self) -> bool {
        if self.current_is_loading() {
            return false;
        }
        let roadmap = lock(&self.roadmap);
        lock(&self.cursor).can_advance(&roadmap)
    }

    pub fn can_retreat(&self) -> bool {
        if self.current_is_loading() {
            return false;
        }
        let roadmap = lock(&self.roadmap);
        lock(&self.cursor).can_retreat(&roadmap)
    }

    /// Moves within the current node depend on its resource count, so they
    /// wait for an outstanding fetch.
    fn current_is_loading(&self) -> bool {
        self.current()
            .is_some_and(|position| self.is_loading_node(&position.node_id))
    }

    async fn move_to(&self, transition: Transition) -> Result<Step, SessionError> {
        let position = transition.position;
        self.commit(|roadmap| roadmap.last_position = Some(position.clone()))?;
        lock(&self.cursor).apply(position.clone());
        debug!(node = %position.node_id, index = position.resource_index, "moved");

        let fetch = if transition.needs_fetch {
            self.ensure_fetched(&position.node_id).await?
        } else {
            FetchOutcome::NotNeeded
        };

        Ok(Step { position, fetch })
    }

    /// Fetches a node's resources unless they are known or already being
    /// fetched. Fetch failures are reported in the outcome; only a failed
    /// save is an error.
    pub async fn ensure_fetched(&self, node_id: &str) -> Result<FetchOutcome, SessionError> {
        let query = {
            let roadmap = lock(&self.roadmap);
            let node = roadmap
                .node(node_id)
                .ok_or_else(|| NavigationError::NodeNotFound(node_id.to_string()))?;
            if node.is_fetched() {
                return Ok(FetchOutcome::NotNeeded);
            }
            ResourceQuery::for_node(node, &roadmap.topic)
        };

        if !lock(&self.in_flight).insert(node_id.to_string()) {
            debug!(node = node_id, "fetch already in flight");
            return Ok(FetchOutcome::InFlight);
        }
        let _guard = InFlightGuard {
            set: &self.in_flight,
            node_id: node_id.to_string(),
        };

        let resources = match self.fetcher.fetch_resources(&query).await {
            Ok(resources) => resources,
            Err(e) => {
                warn!(node = node_id, error = %e, "failed to fetch resources");
                return Ok(FetchOutcome::Failed(e));
            }
        };

        let count = resources.len();
        self.commit(|roadmap| {
            if let Some(node) = roadmap.node_mut(node_id) {
                node.set_resources(resources);
            }
        })?;
        info!(node = node_id, count, "fetched resources");

        Ok(FetchOutcome::Fetched { count })
    }

    /// Flips completion of a resource. Returns whether it is now complete.
    pub fn toggle_resource_complete(&self, node_id: &str, resource_id: &str) -> Result<bool, SessionError> {
        let roadmap = self.commit(|roadmap| roadmap.toggle_resource_complete(node_id, resource_id))?;
        Ok(roadmap.completed_resources.is_complete(node_id, resource_id))
    }

    /// Flips completion of the resource under the cursor, if any.
    pub fn toggle_current(&self) -> Result<Option<bool>, SessionError> {
        let Some(position) = self.current() else {
            return Ok(None);
        };
        let Some(resource) = self.current_resource() else {
            return Ok(None);
        };
        self.toggle_resource_complete(&position.node_id, &resource.id)
            .map(Some)
    }

    pub fn current(&self) -> Option<Position> {
        lock(&self.cursor).position().cloned()
    }

    /// The resource under the cursor, once its node is fetched.
    pub fn current_resource(&self) -> Option<Resource> {
        let position = self.current()?;
        let roadmap = lock(&self.roadmap);
        roadmap
            .node(&position.node_id)?
            .resources()
            .get(position.resource_index)
            .cloned()
    }

    pub fn progress(&self) -> ProgressStats {
        lock(&self.roadmap).progress()
    }

    /// Whether any fetch is outstanding.
    pub fn is_loading(&self) -> bool {
        !lock(&self.in_flight).is_empty()
    }

    pub fn is_loading_node(&self, node_id: &str) -> bool {
        lock(&self.in_flight).contains(node_id)
    }

    /// Node ids in navigation order.
    pub fn sequence(&self) -> Vec<String> {
        lock(&self.cursor).sequence().to_vec()
    }

    /// A copy of the roadmap as of now.
    pub fn roadmap(&self) -> Roadmap {
        lock(&self.roadmap).clone()
    }

    /// The roadmap as a pretty-printed document.
    pub fn export(&self) -> Result<String, SessionError> {
        Ok(lock(&self.roadmap).to_pretty_json()?)
    }

    fn clamp_position(&self) -> Result<(), SessionError> {
        let clamped = {
            let roadmap = lock(&self.roadmap);
            let mut cursor = lock(&self.cursor).clone();
            cursor.clamp_to_resources(&roadmap)
        };
        if let Some(position) = clamped {
            self.commit(|roadmap| roadmap.last_position = Some(position.clone()))?;
            lock(&self.cursor).apply(position);
        }
        Ok(())
    }

    /// Applies `change` to a copy, saves it, then swaps it in.
    fn commit(&self, change: impl FnOnce(&mut Roadmap)) -> Result<Roadmap, SessionError> {
        let mut current = lock(&self.roadmap);
        let mut next = current.clone();
        change(&mut next);
        next.touch();
        self.repository.save(&next)?;
        *current = next.clone();
        Ok(next)
    }
}
