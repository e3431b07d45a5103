//! Roadmap aggregate and its parts.
//!
//! The serialised shape follows the documents the web client stores and
//! exports: camelCase keys, RFC 3339 timestamps, and node payloads nested
//! under `data`.

mod linearize;
mod validate;

pub use linearize::{dfs_ids, dfs_sequence, outline, OutlineNode};
pub use validate::{
    sanitize_topic, validate, validate_structure, validate_topic, RoadmapStructure, SchemaError,
    TopicError,
};

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::progress::{CompletedResources, ProgressStats};

/// Kind of learning artifact.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ResourceType {
    /// A video. Older documents call this `youtube`.
    #[serde(alias = "youtube")]
    Video,
    Documentation,
    Article,
    Tutorial,
    Course,
}

impl ResourceType {
    /// Returns a human-readable name for the type.
    pub fn display_name(&self) -> &'static str {
        match self {
            ResourceType::Video => "Video",
            ResourceType::Documentation => "Documentation",
            ResourceType::Article => "Article",
            ResourceType::Tutorial => "Tutorial",
            ResourceType::Course => "Course",
        }
    }
}

/// Type-specific optional details about a resource.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceMetadata {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub duration: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub thumbnail: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub views: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub channel: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub read_time: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub published_date: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,
}

/// One learning artifact attached to a node.
///
/// Identity is `id` scoped to the owning node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: ResourceType,
    pub title: String,
    pub url: String,
    #[serde(default)]
    pub description: String,
    #[serde(default)]
    pub source: String,
    #[serde(default)]
    pub metadata: ResourceMetadata,
}

/// Diagram coordinates kept so exported documents round-trip to the web client.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
pub struct NodePosition {
    pub x: f64,
    pub y: f64,
}

/// Topic payload of a node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TopicData {
    pub label: String,
    pub description: String,
    /// Depth, 1 = root-most.
    pub level: u32,
    /// Sequence among siblings, used for deterministic tie-breaking.
    #[serde(default = "default_order")]
    pub order: u32,
    pub category: String,
    /// `None` until fetched; see `resources_fetched`.
    #[serde(default)]
    pub resources: Option<Vec<Resource>>,
    /// Resources have been requested at least once. Authoritative over
    /// the emptiness of `resources`.
    #[serde(default)]
    pub resources_fetched: bool,
}

fn default_order() -> u32 {
    1
}

/// One roadmap vertex.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TopicNode {
    pub id: String,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub kind: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub position: Option<NodePosition>,
    pub data: TopicData,
}

impl TopicNode {
    /// Creates an unfetched node.
    pub fn new(
        id: impl Into<String>,
        label: impl Into<String>,
        level: u32,
        order: u32,
    ) -> Self {
        Self {
            id: id.into(),
            kind: None,
            position: None,
            data: TopicData {
                label: label.into(),
                description: String::new(),
                level,
                order,
                category: String::new(),
                resources: None,
                resources_fetched: false,
            },
        }
    }

    /// Attaches fetched resources, marking the node as fetched.
    pub fn with_resources(mut self, resources: Vec<Resource>) -> Self {
        self.set_resources(resources);
        self
    }

    /// Stores a fetch result. An empty list still counts as fetched.
    pub fn set_resources(&mut self, resources: Vec<Resource>) {
        self.data.resources = Some(resources);
        self.data.resources_fetched = true;
    }

    /// Fetched resources, or an empty slice before fetch.
    pub fn resources(&self) -> &[Resource] {
        self.data.resources.as_deref().unwrap_or(&[])
    }

    /// Number of known resources.
    pub fn resource_count(&self) -> usize {
        self.resources().len()
    }

    /// Whether resources have been requested at least once.
    pub fn is_fetched(&self) -> bool {
        self.data.resources_fetched
    }

    /// Looks up a resource by its node-scoped id.
    pub fn resource(&self, resource_id: &str) -> Option<&Resource> {
        self.resources().iter().find(|r| r.id == resource_id)
    }

    /// Sort key used by the linearizer and the outline.
    pub(crate) fn sort_key(&self) -> (u32, u32) {
        (self.data.level, self.data.order)
    }
}

/// Directed relation: `target` is reached after `source`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Edge {
    #[serde(default)]
    pub id: String,
    pub source: String,
    pub target: String,
}

impl Edge {
    /// Creates an edge with a derived id.
    pub fn new(source: impl Into<String>, target: impl Into<String>) -> Self {
        let source = source.into();
        let target = target.into();
        Self {
            id: format!("edge_{source}_{target}"),
            source,
            target,
        }
    }
}

/// A learner's place in a roadmap: a node and an index into its resources.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Position {
    pub node_id: String,
    pub resource_index: usize,
}

impl Position {
    pub fn new(node_id: impl Into<String>, resource_index: usize) -> Self {
        Self {
            node_id: node_id.into(),
            resource_index,
        }
    }
}

/// The roadmap aggregate.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Roadmap {
    /// Globally unique identifier
    pub id: String,
    /// The user's original input
    pub topic: String,
    pub title: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    /// Always equal to `nodes.len()` after any mutation
    pub node_count: usize,
    pub nodes: Vec<TopicNode>,
    pub edges: Vec<Edge>,
    #[serde(default)]
    pub completed_resources: CompletedResources,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_position: Option<Position>,
}

impl Roadmap {
    /// Creates a roadmap from a validated generator response.
    ///
    /// Assigns a fresh id and titles it after the topic.
    pub fn new(topic: impl Into<String>, structure: RoadmapStructure) -> Self {
        let topic = topic.into();
        let now = Utc::now();

        Self {
            id: Uuid::new_v4().to_string(),
            title: format!("{topic} Roadmap"),
            topic,
            created_at: now,
            updated_at: now,
            node_count: structure.nodes.len(),
            nodes: structure.nodes,
            edges: structure.edges,
            completed_resources: CompletedResources::default(),
            last_position: None,
        }
    }

    /// Looks up a node by id.
    pub fn node(&self, id: &str) -> Option<&TopicNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    /// Looks up a node by id for mutation.
    pub fn node_mut(&mut self, id: &str) -> Option<&mut TopicNode> {
        self.nodes.iter_mut().find(|n| n.id == id)
    }

    /// Refreshes `updated_at` and the cached node count.
    pub fn touch(&mut self) {
        self.node_count = self.nodes.len();
        self.updated_at = Utc::now();
    }

    /// Flips completion of one resource, replacing the completion map.
    pub fn toggle_resource_complete(&mut self, node_id: &str, resource_id: &str) {
        self.completed_resources = self.completed_resources.toggled(node_id, resource_id);
    }

    /// True iff the node has resources and all of them are complete.
    pub fn is_node_fully_complete(&self, node: &TopicNode) -> bool {
        self.completed_resources.is_node_fully_complete(node)
    }

    /// Aggregate progress over every node.
    pub fn progress(&self) -> ProgressStats {
        self.completed_resources.progress_stats(&self.nodes)
    }

    /// Nodes in canonical learning order.
    pub fn dfs_sequence(&self) -> Vec<&TopicNode> {
        dfs_sequence(&self.nodes, &self.edges)
    }

    /// Projects the listing summary.
    pub fn to_metadata(&self) -> RoadmapMetadata {
        let stats = self.progress();
        RoadmapMetadata {
            id: self.id.clone(),
            title: self.title.clone(),
            topic: self.topic.clone(),
            created_at: self.created_at,
            node_count: self.nodes.len(),
            completed_count: stats.completed_count,
            total_resources: stats.total_resources,
        }
    }

    /// Serialises the full aggregate as a pretty-printed document.
    pub fn to_pretty_json(&self) -> Result<String, serde_json::Error> {
        serde_json::to_string_pretty(self)
    }

    /// Suggested file name for an exported document.
    pub fn export_file_name(&self) -> String {
        let slug = self.topic.split_whitespace().collect::<Vec<_>>().join("-");
        format!("{slug}-roadmap.json")
    }
}

/// A lightweight summary of a roadmap for listings.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoadmapMetadata {
    pub id: String,
    pub title: String,
    pub topic: String,
    pub created_at: DateTime<Utc>,
    pub node_count: usize,
    #[serde(default)]
    pub completed_count: usize,
    #[serde(default)]
    pub total_resources: usize,
}
