use thiserror::Error;

use crate::roadmap::{dfs_ids, Position, Roadmap};

/// Errors raised by cursor moves.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum NavigationError {
    #[error("Node not found: {0}")]
    NodeNotFound(String),
}

/// Where the learner is.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CursorState {
    #[default]
    Unpositioned,
    Positioned(Position),
}

/// A computed move, not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Transition {
    pub position: Position,
    /// The target node's resources have not been fetched yet.
    pub needs_fetch: bool,
}

/// Learner position over a roadmap's depth-first sequence.
///
/// The cursor only stores ids; resource counts are read from the roadmap
/// passed to each call. Moves are computed by the `peek_*` methods and
/// the `can_*` checks are defined in terms of them, so a check and the
/// move it guards always agree.
#[derive(Debug, Clone)]
pub struct Cursor {
    sequence: Vec<String>,
    state: CursorState,
}

impl Cursor {
    /// Creates an unpositioned cursor over the roadmap's sequence.
    pub fn new(roadmap: &Roadmap) -> Self {
        Self::from_sequence(dfs_ids(&roadmap.nodes, &roadmap.edges))
    }

    pub fn from_sequence(sequence: Vec<String>) -> Self {
        Self {
            sequence,
            state: CursorState::Unpositioned,
        }
    }

    /// Restores the saved position when its node still exists.
    ///
    /// The index is clamped right away if the node's resources are known;
    /// otherwise call [`Cursor::clamp_to_resources`] after fetching.
    pub fn resume(roadmap: &Roadmap) -> Self {
        let mut cursor = Self::new(roadmap);
        if let Some(saved) = &roadmap.last_position {
            if roadmap.node(&saved.node_id).is_some() {
                cursor.state = CursorState::Positioned(saved.clone());
                cursor.clamp_to_resources(roadmap);
            }
        }
        cursor
    }

    pub fn state(&self) -> &CursorState {
        &self.state
    }

    pub fn position(&self) -> Option<&Position> {
        match &self.state {
            CursorState::Positioned(position) => Some(position),
            CursorState::Unpositioned => None,
        }
    }

    /// Node ids in navigation order.
    pub fn sequence(&self) -> &[String] {
        &self.sequence
    }

    fn sequence_index(&self, node_id: &str) -> Option<usize> {
        self.sequence.iter().position(|id| id == node_id)
    }

    fn transition(roadmap: &Roadmap, node_id: &str, resource_index: usize) -> Transition {
        let needs_fetch = roadmap.node(node_id).is_some_and(|n| !n.is_fetched());
        Transition {
            position: Position::new(node_id, resource_index),
            needs_fetch,
        }
    }

    /// The move `select` would make.
    pub fn peek_select(&self, roadmap: &Roadmap, node_id: &str) -> Result<Transition, NavigationError> {
        if roadmap.node(node_id).is_none() {
            return Err(NavigationError::NodeNotFound(node_id.to_string()));
        }
        Ok(Self::transition(roadmap, node_id, 0))
    }

    /// The move `advance` would make, `None` at the end.
    pub fn peek_next(&self, roadmap: &Roadmap) -> Option<Transition> {
        let current = self.position()?;

        let count = roadmap
            .node(&current.node_id)
            .map_or(0, |n| n.resource_count());
        if current.resource_index + 1 < count {
            return Some(Self::transition(
                roadmap,
                &current.node_id,
                current.resource_index + 1,
            ));
        }

        let index = self.sequence_index(&current.node_id)?;
        let next_id = self.sequence.get(index + 1)?;
        Some(Self::transition(roadmap, next_id, 0))
    }

    /// The move `retreat` would make, `None` at the start.
    pub fn peek_prev(&self, roadmap: &Roadmap) -> Option<Transition> {
        let current = self.position()?;

        if current.resource_index > 0 {
            return Some(Self::transition(
                roadmap,
                &current.node_id,
                current.resource_index - 1,
            ));
        }

        let index = self.sequence_index(&current.node_id)?;
        let prev_id = self.sequence.get(index.checked_sub(1)?)?;
        let last = roadmap
            .node(prev_id)
            .filter(|n| n.is_fetched())
            .map_or(0, |n| n.resource_count().saturating_sub(1));
        Some(Self::transition(roadmap, prev_id, last))
    }

    pub fn can_advance(&self, roadmap: &Roadmap) -> bool {
        self.peek_next(roadmap).is_some()
    }

    pub fn can_retreat(&self, roadmap: &Roadmap) -> bool {
        self.peek_prev(roadmap).is_some()
    }

    /// Moves to the first resource of a node.
    pub fn select(&mut self, roadmap: &Roadmap, node_id: &str) -> Result<Transition, NavigationError> {
        let transition = self.peek_select(roadmap, node_id)?;
        self.apply(transition.position.clone());
        Ok(transition)
    }

    /// Moves forward one resource, or to the next node. No-op at the end.
    pub fn advance(&mut self, roadmap: &Roadmap) -> Option<Transition> {
        let transition = self.peek_next(roadmap)?;
        self.apply(transition.position.clone());
        Some(transition)
    }

    /// Moves back one resource, or to the previous node. No-op at the start.
    pub fn retreat(&mut self, roadmap: &Roadmap) -> Option<Transition> {
        let transition = self.peek_prev(roadmap)?;
        self.apply(transition.position.clone());
        Some(transition)
    }

    /// Sets the position directly.
    pub fn apply(&mut self, position: Position) {
        self.state = CursorState::Positioned(position);
    }

    /// Pulls the resource index back inside the current node's fetched
    /// resources. Returns the new position if it changed.
    pub fn clamp_to_resources(&mut self, roadmap: &Roadmap) -> Option<Position> {
        let CursorState::Positioned(position) = &mut self.state else {
            return None;
        };
        let node = roadmap.node(&position.node_id).filter(|n| n.is_fetched())?;

        let max = node.resource_count().saturating_sub(1);
        if position.resource_index > max {
            position.resource_index = max;
            return Some(position.clone());
        }
        None
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::{Edge, Resource, ResourceMetadata, ResourceType, RoadmapStructure, TopicNode};

    fn resources(ids: &[&str]) -> Vec<Resource> {
        ids.iter()
            .map(|id| Resource {
                id: id.to_string(),
                kind: ResourceType::Article,
                title: id.to_string(),
                url: format!("https://example.com/{id}"),
                description: String::new(),
                source: String::new(),
                metadata: ResourceMetadata::default(),
            })
            .collect()
    }

    fn roadmap() -> Roadmap {
        Roadmap::new(
            "Rust",
            RoadmapStructure {
                nodes: vec![
                    TopicNode::new("a", "A", 1, 1).with_resources(resources(&["r1", "r2"])),
                    TopicNode::new("b", "B", 2, 1).with_resources(resources(&["r3", "r4", "r5"])),
                    TopicNode::new("c", "C", 2, 2),
                ],
                edges: vec![Edge::new("a", "b"), Edge::new("a", "c")],
            },
        )
    }

    #[test]
    fn test_unpositioned_cannot_move() {
        let roadmap = roadmap();
        let mut cursor = Cursor::new(&roadmap);
        assert!(!cursor.can_advance(&roadmap));
        assert!(!cursor.can_retreat(&roadmap));
        assert_eq!(cursor.advance(&roadmap), None);
        assert_eq!(cursor.state(), &CursorState::Unpositioned);
    }

    #[test]
    fn test_select_unknown_node() {
        let roadmap = roadmap();
        let mut cursor = Cursor::new(&roadmap);
        assert_eq!(
            cursor.select(&roadmap, "ghost"),
            Err(NavigationError::NodeNotFound("ghost".to_string()))
        );
    }

    #[test]
    fn test_retreat_lands_on_last_resource_of_previous_node() {
        let roadmap = roadmap();
        let mut cursor = Cursor::new(&roadmap);
        cursor.select(&roadmap, "c").unwrap();

        let step = cursor.retreat(&roadmap).unwrap();
        assert_eq!(step.position, Position::new("b", 2));
        assert!(!step.needs_fetch);
    }

    #[test]
    fn test_advance_into_unfetched_node_needs_fetch() {
        let roadmap = roadmap();
        let mut cursor = Cursor::new(&roadmap);
        cursor.apply(Position::new("b", 2));

        let step = cursor.advance(&roadmap).unwrap();
        assert_eq!(step.position, Position::new("c", 0));
        assert!(step.needs_fetch);
        assert!(!cursor.can_advance(&roadmap));
    }

    #[test]
    fn test_resume_clamps_known_resources() {
        let mut roadmap = roadmap();
        roadmap.last_position = Some(Position::new("a", 7));
        let cursor = Cursor::resume(&roadmap);
        assert_eq!(cursor.position(), Some(&Position::new("a", 1)));

        roadmap.last_position = Some(Position::new("c", 4));
        let cursor = Cursor::resume(&roadmap);
        assert_eq!(cursor.position(), Some(&Position::new("c", 4)));

        roadmap.last_position = Some(Position::new("gone", 0));
        assert_eq!(Cursor::resume(&roadmap).state(), &CursorState::Unpositioned);
    }
}
