//! Canonical learning order over a roadmap's node/edge graph.
//!
//! The edge set should form a forest, but generated data can carry
//! multi-parent or disconnected nodes. The walk stays total and
//! deterministic regardless: a visited set stops repeats and an orphan sweep
//! appends whatever the roots never reached.

use std::collections::{HashMap, HashSet};

use super::{Edge, TopicNode};

/// A node in the collapsible sidebar tree.
#[derive(Debug, Clone, PartialEq)]
pub struct OutlineNode<'a> {
    pub node: &'a TopicNode,
    /// Zero for top-level entries.
    pub depth: usize,
    pub children: Vec<OutlineNode<'a>>,
}

impl<'a> OutlineNode<'a> {
    /// Visits this entry and its descendants in display order.
    pub fn walk(&self, visit: &mut impl FnMut(&OutlineNode<'a>)) {
        visit(self);
        for child in &self.children {
            child.walk(visit);
        }
    }
}

struct Graph<'a> {
    by_id: HashMap<&'a str, &'a TopicNode>,
    children: HashMap<&'a str, Vec<&'a TopicNode>>,
    roots: Vec<&'a TopicNode>,
}

impl<'a> Graph<'a> {
    fn build(nodes: &'a [TopicNode], edges: &'a [Edge]) -> Self {
        let by_id: HashMap<&str, &TopicNode> =
            nodes.iter().map(|n| (n.id.as_str(), n)).collect();

        let mut children: HashMap<&str, Vec<&TopicNode>> = HashMap::new();
        let mut targeted: HashSet<&str> = HashSet::new();
        for edge in edges {
            targeted.insert(edge.target.as_str());
            if let Some(child) = by_id.get(edge.target.as_str()) {
                children.entry(edge.source.as_str()).or_default().push(child);
            }
        }

        // Stable sorts: ties keep input (or edge) order.
        for list in children.values_mut() {
            list.sort_by_key(|n| n.sort_key());
        }
        let mut roots: Vec<&TopicNode> = nodes
            .iter()
            .filter(|n| !targeted.contains(n.id.as_str()))
            .collect();
        roots.sort_by_key(|n| n.sort_key());

        Self {
            by_id,
            children,
            roots,
        }
    }

    fn children_of(&self, id: &str) -> &[&'a TopicNode] {
        self.children.get(id).map(Vec::as_slice).unwrap_or(&[])
    }
}

/// Linearizes the graph into the canonical depth-first sequence.
///
/// Every node appears exactly once. Roots (nodes never targeted by an
/// edge) and each node's children are visited in `(level, order)` order;
/// nodes no root reaches follow in input order.
pub fn dfs_sequence<'a>(nodes: &'a [TopicNode], edges: &'a [Edge]) -> Vec<&'a TopicNode> {
    let graph = Graph::build(nodes, edges);
    let mut visited: HashSet<&str> = HashSet::with_capacity(nodes.len());
    let mut order = Vec::with_capacity(nodes.len());

    // Explicit stack; children pushed in reverse so the first child pops first.
    let mut stack: Vec<&TopicNode> = Vec::new();
    for root in &graph.roots {
        stack.push(root);
        while let Some(node) = stack.pop() {
            if !visited.insert(node.id.as_str()) {
                continue;
            }
            order.push(node);
            for child in graph.children_of(&node.id).iter().rev() {
                if !visited.contains(child.id.as_str()) {
                    stack.push(child);
                }
            }
        }
    }

    for node in nodes {
        if visited.insert(node.id.as_str()) {
            order.push(node);
        }
    }

    debug_assert_eq!(order.len(), graph.by_id.len());
    order
}

/// Same as [`dfs_sequence`], returning ids only.
pub fn dfs_ids(nodes: &[TopicNode], edges: &[Edge]) -> Vec<String> {
    dfs_sequence(nodes, edges)
        .into_iter()
        .map(|n| n.id.clone())
        .collect()
}

/// Builds the sidebar tree.
///
/// Each entry's children are its adjacency-children sorted by
/// `(level, order)`. A node is placed once, at its first position in the
/// depth-first order, so the result is a tree even for malformed edges.
pub fn outline<'a>(nodes: &'a [TopicNode], edges: &'a [Edge]) -> Vec<OutlineNode<'a>> {
    let graph = Graph::build(nodes, edges);
    let mut placed: HashSet<&str> = HashSet::with_capacity(nodes.len());
    let mut top = Vec::new();

    for root in &graph.roots {
        if let Some(entry) = place(&graph, root, 0, &mut placed) {
            top.push(entry);
        }
    }
    for node in nodes {
        if let Some(entry) = place(&graph, node, 0, &mut placed) {
            top.push(entry);
        }
    }
    top
}

fn place<'a>(
    graph: &Graph<'a>,
    node: &'a TopicNode,
    depth: usize,
    placed: &mut HashSet<&'a str>,
) -> Option<OutlineNode<'a>> {
    if !placed.insert(node.id.as_str()) {
        return None;
    }
    let children = graph
        .children_of(&node.id)
        .iter()
        .filter_map(|child| place(graph, child, depth + 1, placed))
        .collect();
    Some(OutlineNode {
        node,
        depth,
        children,
    })
}
