use std::collections::HashSet;

use studypath_core::roadmap::{dfs_ids, outline};
use studypath_core::{Edge, TopicNode};

/// Builds a forest of `n` nodes where node `i > 0` hangs off an earlier
/// node picked by a small LCG, except every `roots_every`-th node which
/// starts a new tree.
fn forest(n: usize, seed: u64, roots_every: usize) -> (Vec<TopicNode>, Vec<Edge>) {
    let mut state = seed;
    let mut next = move || {
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1442695040888963407);
        (state >> 33) as usize
    };

    let mut nodes: Vec<TopicNode> = Vec::with_capacity(n);
    let mut levels = Vec::with_capacity(n);
    let mut edges = Vec::new();
    for i in 0..n {
        let level = if i == 0 || i % roots_every == 0 {
            1
        } else {
            let parent = next() % i;
            edges.push(Edge::new(format!("n{parent}"), format!("n{i}")));
            levels[parent] + 1
        };
        levels.push(level);
        nodes.push(TopicNode::new(
            format!("n{i}"),
            format!("Node {i}"),
            level,
            (next() % 5) as u32,
        ));
    }
    (nodes, edges)
}

#[test]
fn test_sequence_is_total() {
    for seed in 0..20 {
        let (nodes, edges) = forest(40, seed, 13);
        let sequence = dfs_ids(&nodes, &edges);

        assert_eq!(sequence.len(), nodes.len());
        let unique: HashSet<&String> = sequence.iter().collect();
        assert_eq!(unique.len(), nodes.len());
    }
}

#[test]
fn test_sequence_is_deterministic() {
    let (nodes, edges) = forest(60, 7, 17);
    assert_eq!(dfs_ids(&nodes, &edges), dfs_ids(&nodes, &edges));
}

#[test]
fn test_parents_precede_children() {
    let (nodes, edges) = forest(50, 3, 11);
    let sequence = dfs_ids(&nodes, &edges);
    let index_of = |id: &str| sequence.iter().position(|s| s == id).unwrap();

    for edge in &edges {
        assert!(index_of(&edge.source) < index_of(&edge.target));
    }
}

#[test]
fn test_siblings_sorted() {
    let nodes = vec![
        TopicNode::new("a", "A", 1, 1),
        TopicNode::new("b", "B", 2, 1),
        TopicNode::new("c", "C", 2, 2),
    ];
    let edges = vec![Edge::new("a", "b"), Edge::new("a", "c")];
    assert_eq!(dfs_ids(&nodes, &edges), vec!["a", "b", "c"]);

    let reversed = vec![Edge::new("a", "c"), Edge::new("a", "b")];
    assert_eq!(dfs_ids(&nodes, &reversed), vec!["a", "b", "c"]);
}

#[test]
fn test_orphans_appended_in_input_order() {
    // "z" and "y" sit in a cycle no root reaches; "solo" is an isolated root.
    let nodes = vec![
        TopicNode::new("z", "Z", 2, 1),
        TopicNode::new("root", "Root", 1, 1),
        TopicNode::new("y", "Y", 2, 2),
        TopicNode::new("child", "Child", 2, 1),
        TopicNode::new("solo", "Solo", 1, 2),
    ];
    let edges = vec![
        Edge::new("root", "child"),
        Edge::new("z", "y"),
        Edge::new("y", "z"),
    ];

    assert_eq!(
        dfs_ids(&nodes, &edges),
        vec!["root", "child", "solo", "z", "y"]
    );
}

#[test]
fn test_outline_covers_every_node_once() {
    let (nodes, edges) = forest(30, 11, 9);
    let mut seen = Vec::new();
    for entry in outline(&nodes, &edges) {
        entry.walk(&mut |item| seen.push(item.node.id.clone()));
    }
    assert_eq!(seen, dfs_ids(&nodes, &edges));
}
