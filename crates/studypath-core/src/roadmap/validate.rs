//! Normalisation of untrusted roadmap documents.
//!
//! This is the only place defaults are applied. Everything downstream
//! assumes a fully populated [`Roadmap`].

use std::collections::HashSet;

use chrono::{DateTime, Utc};
use serde_json::{Map, Value};
use thiserror::Error;
use tracing::warn;
use uuid::Uuid;

use super::{Edge, NodePosition, Resource, Roadmap, TopicData, TopicNode};
use crate::config::{MAX_TOPIC_CHARS, MIN_TOPIC_CHARS};
use crate::progress::CompletedResources;

/// Errors raised for malformed roadmap documents.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SchemaError {
    #[error("Invalid roadmap structure: document must be a JSON object")]
    NotAnObject,

    #[error("Invalid roadmap structure: missing required field `{0}`")]
    MissingField(&'static str),

    #[error("Invalid roadmap structure: `{field}` must be {expected}")]
    WrongType {
        field: &'static str,
        expected: &'static str,
    },

    #[error("Invalid roadmap structure: nodes must be a non-empty array")]
    EmptyNodes,

    #[error("Invalid roadmap structure: node {index} is missing `{field}`")]
    MissingNodeField { index: usize, field: &'static str },

    #[error("Invalid roadmap structure: node {index}: {message}")]
    InvalidNode { index: usize, message: String },

    #[error("Invalid roadmap structure: duplicate node id `{0}`")]
    DuplicateNodeId(String),

    #[error("Invalid roadmap structure: edge {index}: {message}")]
    InvalidEdge { index: usize, message: String },

    #[error("Invalid roadmap structure: `{field}`: {message}")]
    InvalidField {
        field: &'static str,
        message: String,
    },
}

/// Topic input rejected before generation.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum TopicError {
    #[error("Please enter a topic to generate a roadmap")]
    Empty,

    #[error("Topic must be at least {} characters", MIN_TOPIC_CHARS)]
    TooShort,

    #[error("Topic is too long (maximum {} characters)", MAX_TOPIC_CHARS)]
    TooLong,

    #[error("Topic contains no usable characters")]
    NothingLeft,
}

/// Validated node and edge lists, as returned by the generator.
#[derive(Debug, Clone, PartialEq)]
pub struct RoadmapStructure {
    pub nodes: Vec<TopicNode>,
    pub edges: Vec<Edge>,
}

/// Validates a full roadmap document and applies defaults.
///
/// `updatedAt` is always refreshed; `createdAt` and `completedResources`
/// are filled in when absent; `nodeCount` is recomputed. A missing `id`
/// gets a fresh UUID.
pub fn validate(raw: &Value) -> Result<Roadmap, SchemaError> {
    let obj = raw.as_object().ok_or(SchemaError::NotAnObject)?;
    let structure = validate_structure(raw)?;

    let topic = required_text(obj, "topic")?;
    let title = required_text(obj, "title")?;
    let now = Utc::now();

    let created_at = match present(obj, "createdAt") {
        None => now,
        Some(value) => serde_json::from_value::<DateTime<Utc>>(value.clone()).map_err(|e| {
            SchemaError::InvalidField {
                field: "createdAt",
                message: e.to_string(),
            }
        })?,
    };

    let completed_resources = match present(obj, "completedResources") {
        None => CompletedResources::default(),
        Some(value) => serde_json::from_value(value.clone()).map_err(|e| {
            SchemaError::InvalidField {
                field: "completedResources",
                message: e.to_string(),
            }
        })?,
    };

    let last_position = match present(obj, "lastPosition") {
        None => None,
        Some(value) => Some(serde_json::from_value(value.clone()).map_err(|e| {
            SchemaError::InvalidField {
                field: "lastPosition",
                message: e.to_string(),
            }
        })?),
    };

    let id = present(obj, "id")
        .and_then(id_string)
        .filter(|id| !id.is_empty())
        .unwrap_or_else(|| Uuid::new_v4().to_string());

    Ok(Roadmap {
        id,
        topic,
        title,
        created_at,
        updated_at: now,
        node_count: structure.nodes.len(),
        nodes: structure.nodes,
        edges: structure.edges,
        completed_resources,
        last_position,
    })
}

/// Validates a bare `{nodes, edges}` document.
///
/// Edges pointing at unknown node ids are dropped so every kept edge
/// refers to a node in the list.
pub fn validate_structure(raw: &Value) -> Result<RoadmapStructure, SchemaError> {
    let obj = raw.as_object().ok_or(SchemaError::NotAnObject)?;

    let raw_nodes = required_array(obj, "nodes")?;
    if raw_nodes.is_empty() {
        return Err(SchemaError::EmptyNodes);
    }
    let raw_edges = required_array(obj, "edges")?;

    let mut seen = HashSet::with_capacity(raw_nodes.len());
    let mut nodes = Vec::with_capacity(raw_nodes.len());
    for (index, raw_node) in raw_nodes.iter().enumerate() {
        let node = parse_node(index, raw_node)?;
        if !seen.insert(node.id.clone()) {
            return Err(SchemaError::DuplicateNodeId(node.id));
        }
        nodes.push(node);
    }

    let mut edges = Vec::with_capacity(raw_edges.len());
    for (index, raw_edge) in raw_edges.iter().enumerate() {
        let edge = parse_edge(index, raw_edge)?;
        if !seen.contains(&edge.source) || !seen.contains(&edge.target) {
            warn!(
                edge = %edge.id,
                source = %edge.source,
                target = %edge.target,
                "dropping edge with unknown endpoint"
            );
            continue;
        }
        edges.push(edge);
    }

    Ok(RoadmapStructure { nodes, edges })
}

/// Checks a topic before it is sent to the generator.
///
/// Returns the trimmed topic.
pub fn validate_topic(topic: &str) -> Result<String, TopicError> {
    let trimmed = topic.trim();
    let chars = trimmed.chars().count();

    if chars == 0 {
        return Err(TopicError::Empty);
    }
    if chars < MIN_TOPIC_CHARS {
        return Err(TopicError::TooShort);
    }
    if chars > MAX_TOPIC_CHARS {
        return Err(TopicError::TooLong);
    }
    Ok(trimmed.to_string())
}

/// Keeps ASCII letters, digits, whitespace, `-` and `&`, then trims.
pub fn sanitize_topic(topic: &str) -> String {
    topic
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || c.is_whitespace() || *c == '-' || *c == '&')
        .collect::<String>()
        .trim()
        .to_string()
}

fn parse_node(index: usize, raw: &Value) -> Result<TopicNode, SchemaError> {
    let obj = raw.as_object().ok_or_else(|| SchemaError::InvalidNode {
        index,
        message: "must be an object".to_string(),
    })?;

    let id = present(obj, "id")
        .and_then(id_string)
        .filter(|id| !id.is_empty())
        .ok_or(SchemaError::MissingNodeField { index, field: "id" })?;

    // Flat nodes (no `data` wrapper) are accepted too.
    let data = present(obj, "data").and_then(Value::as_object).unwrap_or(obj);

    let label = node_text(index, data, "label")?;
    let description = node_text(index, data, "description")?;
    let category = node_text(index, data, "category")?;

    let level = match present(data, "level") {
        None => return Err(SchemaError::MissingNodeField { index, field: "level" }),
        Some(value) => integer(value)
            .filter(|level| *level > 0)
            .ok_or_else(|| SchemaError::InvalidNode {
                index,
                message: "level must be a positive integer".to_string(),
            })?,
    };

    let order = match present(data, "order") {
        None => 1,
        Some(value) => integer(value).ok_or_else(|| SchemaError::InvalidNode {
            index,
            message: "order must be a non-negative integer".to_string(),
        })?,
    };

    let resources = match present(data, "resources") {
        None => None,
        Some(value) => Some(
            serde_json::from_value::<Vec<Resource>>(value.clone()).map_err(|e| {
                SchemaError::InvalidNode {
                    index,
                    message: format!("invalid resources: {e}"),
                }
            })?,
        ),
    };

    let resources_fetched = match present(data, "resourcesFetched") {
        None => false,
        Some(value) => value.as_bool().ok_or_else(|| SchemaError::InvalidNode {
            index,
            message: "resourcesFetched must be a boolean".to_string(),
        })?,
    };

    let kind = present(obj, "type")
        .and_then(Value::as_str)
        .map(str::to_string);
    let position = present(obj, "position")
        .and_then(|value| serde_json::from_value::<NodePosition>(value.clone()).ok());

    Ok(TopicNode {
        id,
        kind,
        position,
        data: TopicData {
            label,
            description,
            level,
            order,
            category,
            resources,
            resources_fetched,
        },
    })
}

fn parse_edge(index: usize, raw: &Value) -> Result<Edge, SchemaError> {
    let obj = raw.as_object().ok_or_else(|| SchemaError::InvalidEdge {
        index,
        message: "must be an object".to_string(),
    })?;

    let endpoint = |field: &'static str| {
        present(obj, field)
            .and_then(id_string)
            .filter(|id| !id.is_empty())
            .ok_or_else(|| SchemaError::InvalidEdge {
                index,
                message: format!("missing `{field}`"),
            })
    };
    let source = endpoint("source")?;
    let target = endpoint("target")?;

    let id = present(obj, "id")
        .and_then(id_string)
        .unwrap_or_else(|| format!("edge_{source}_{target}"));

    Ok(Edge { id, source, target })
}

/// Returns the field unless it is absent or `null`.
fn present<'a>(obj: &'a Map<String, Value>, field: &str) -> Option<&'a Value> {
    obj.get(field).filter(|v| !v.is_null())
}

fn required_array<'a>(
    obj: &'a Map<String, Value>,
    field: &'static str,
) -> Result<&'a Vec<Value>, SchemaError> {
    match present(obj, field) {
        None => Err(SchemaError::MissingField(field)),
        Some(Value::Array(items)) => Ok(items),
        Some(_) => Err(SchemaError::WrongType {
            field,
            expected: "an array",
        }),
    }
}

fn required_text(obj: &Map<String, Value>, field: &'static str) -> Result<String, SchemaError> {
    match present(obj, field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(SchemaError::MissingField(field)),
        Some(_) => Err(SchemaError::WrongType {
            field,
            expected: "a string",
        }),
    }
}

fn node_text(
    index: usize,
    data: &Map<String, Value>,
    field: &'static str,
) -> Result<String, SchemaError> {
    match present(data, field) {
        Some(Value::String(s)) if !s.is_empty() => Ok(s.clone()),
        Some(Value::String(_)) | None => Err(SchemaError::MissingNodeField { index, field }),
        Some(_) => Err(SchemaError::InvalidNode {
            index,
            message: format!("{field} must be a string"),
        }),
    }
}

/// Ids arrive as strings or, from sloppier generators, as numbers.
fn id_string(value: &Value) -> Option<String> {
    match value {
        Value::String(s) => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}

fn integer(value: &Value) -> Option<u32> {
    if let Some(n) = value.as_u64() {
        return u32::try_from(n).ok();
    }
    value
        .as_f64()
        .filter(|f| f.fract() == 0.0 && *f >= 0.0 && *f <= f64::from(u32::MAX))
        .map(|f| f as u32)
}
