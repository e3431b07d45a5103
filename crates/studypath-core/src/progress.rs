//! Completion tracking and progress arithmetic.

use std::collections::{BTreeMap, BTreeSet};

use serde::{Deserialize, Serialize};

use crate::config::ESTIMATED_RESOURCES_PER_NODE;
use crate::roadmap::TopicNode;

/// Which resources the learner has completed, keyed by node id.
///
/// Nodes with nothing completed are never stored, so toggling the same
/// resource twice restores an equal value. Serialises as an object of
/// string arrays.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<String, BTreeSet<String>>")]
pub struct CompletedResources(BTreeMap<String, BTreeSet<String>>);

impl From<BTreeMap<String, BTreeSet<String>>> for CompletedResources {
    fn from(mut map: BTreeMap<String, BTreeSet<String>>) -> Self {
        map.retain(|_, done| !done.is_empty());
        Self(map)
    }
}

impl CompletedResources {
    /// Returns a new map with the resource's completion flipped.
    ///
    /// The receiver is left untouched.
    pub fn toggled(&self, node_id: &str, resource_id: &str) -> Self {
        let mut next = self.0.clone();
        let done = next.entry(node_id.to_string()).or_default();
        if !done.remove(resource_id) {
            done.insert(resource_id.to_string());
        }
        if done.is_empty() {
            next.remove(node_id);
        }
        Self(next)
    }

    pub fn is_complete(&self, node_id: &str, resource_id: &str) -> bool {
        self.0
            .get(node_id)
            .is_some_and(|done| done.contains(resource_id))
    }

    /// Completed resource ids recorded for a node.
    pub fn completed_for(&self, node_id: &str) -> impl Iterator<Item = &str> {
        self.0
            .get(node_id)
            .into_iter()
            .flat_map(|done| done.iter().map(String::as_str))
    }

    /// Nodes with at least one completed resource.
    pub fn node_ids(&self) -> impl Iterator<Item = &str> {
        self.0.keys().map(String::as_str)
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Completed resources of `node` that still exist on it.
    ///
    /// Entries for resources the node no longer lists are ignored.
    pub fn completed_count(&self, node: &TopicNode) -> usize {
        match self.0.get(&node.id) {
            None => 0,
            Some(done) => node
                .resources()
                .iter()
                .filter(|r| done.contains(&r.id))
                .count(),
        }
    }

    /// True iff the node has at least one resource and every one is complete.
    pub fn is_node_fully_complete(&self, node: &TopicNode) -> bool {
        let total = node.resource_count();
        total > 0 && self.completed_count(node) == total
    }

    /// Aggregates completion over `nodes`.
    ///
    /// Fetched nodes contribute their actual resource count. Unfetched nodes
    /// are estimated at [`ESTIMATED_RESOURCES_PER_NODE`] with nothing
    /// completed.
    pub fn progress_stats(&self, nodes: &[TopicNode]) -> ProgressStats {
        nodes.iter().fold(ProgressStats::default(), |acc, node| {
            if node.is_fetched() {
                ProgressStats {
                    completed_count: acc.completed_count + self.completed_count(node),
                    total_resources: acc.total_resources + node.resource_count(),
                }
            } else {
                ProgressStats {
                    completed_count: acc.completed_count,
                    total_resources: acc.total_resources + ESTIMATED_RESOURCES_PER_NODE,
                }
            }
        })
    }
}

/// Completed versus total resources across a roadmap.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ProgressStats {
    pub completed_count: usize,
    pub total_resources: usize,
}

impl ProgressStats {
    /// Whole-number percentage, rounded half up. Zero when there is nothing to do.
    pub fn percent(&self) -> u32 {
        if self.total_resources == 0 {
            return 0;
        }
        let scaled = (self.completed_count as u64) * 200 + self.total_resources as u64;
        (scaled / (2 * self.total_resources as u64)) as u32
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::roadmap::{Resource, ResourceMetadata, ResourceType};

    fn node_with(id: &str, resource_ids: &[&str]) -> TopicNode {
        let resources = resource_ids
            .iter()
            .map(|rid| Resource {
                id: rid.to_string(),
                kind: ResourceType::Video,
                title: rid.to_string(),
                url: format!("https://example.com/{rid}"),
                description: String::new(),
                source: "YouTube".to_string(),
                metadata: ResourceMetadata::default(),
            })
            .collect();
        TopicNode::new(id, id, 1, 1).with_resources(resources)
    }

    #[test]
    fn test_toggle_is_involutive() {
        let start = CompletedResources::default().toggled("a", "r1");
        let twice = start.toggled("b", "r2").toggled("b", "r2");
        assert_eq!(twice, start);
        assert_eq!(twice.node_ids().collect::<Vec<_>>(), vec!["a"]);
    }

    #[test]
    fn test_toggle_leaves_receiver_untouched() {
        let before = CompletedResources::default();
        let after = before.toggled("a", "r1");
        assert!(before.is_empty());
        assert!(after.is_complete("a", "r1"));
    }

    #[test]
    fn test_serialises_as_map_of_arrays() {
        let done = CompletedResources::default()
            .toggled("n1", "r2")
            .toggled("n1", "r1");
        let json = serde_json::to_string(&done).unwrap();
        assert_eq!(json, r#"{"n1":["r1","r2"]}"#);
    }

    #[test]
    fn test_fully_complete_requires_resources() {
        let empty = TopicNode::new("a", "A", 1, 1).with_resources(Vec::new());
        assert!(!CompletedResources::default().is_node_fully_complete(&empty));

        let node = node_with("a", &["r1", "r2"]);
        let half = CompletedResources::default().toggled("a", "r1");
        assert!(!half.is_node_fully_complete(&node));
        assert!(half.toggled("a", "r2").is_node_fully_complete(&node));
    }

    #[test]
    fn test_stale_entries_ignored() {
        let node = node_with("a", &["r1"]);
        let done = CompletedResources::default()
            .toggled("a", "r1")
            .toggled("a", "gone");
        assert_eq!(done.completed_count(&node), 1);
        assert!(done.is_node_fully_complete(&node));
    }

    #[test]
    fn test_percent_rounding() {
        let stats = |c, t| ProgressStats {
            completed_count: c,
            total_resources: t,
        };
        assert_eq!(stats(0, 0).percent(), 0);
        assert_eq!(stats(1, 3).percent(), 33);
        assert_eq!(stats(2, 3).percent(), 67);
        assert_eq!(stats(1, 8).percent(), 13);
        assert_eq!(stats(4, 4).percent(), 100);
    }
}
