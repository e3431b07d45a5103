//! Terminal output for roadmaps and study sessions.

use std::borrow::Cow;
use std::time::Duration;

use indicatif::{ProgressBar, ProgressStyle};
use studypath_core::navigation::{FetchOutcome, Step};
use studypath_core::roadmap::outline;
use studypath_core::{Position, ProgressStats, Roadmap, RoadmapMetadata};

/// Starts a spinner on stderr. Call `finish_and_clear` when done.
pub fn spinner(message: impl Into<Cow<'static, str>>) -> ProgressBar {
    let pb = ProgressBar::new_spinner();
    pb.set_style(
        ProgressStyle::with_template("{spinner:.cyan} {msg}")
            .unwrap_or_else(|_| ProgressStyle::default_spinner()),
    );
    pb.set_message(message);
    pb.enable_steady_tick(Duration::from_millis(100));
    pb
}

pub fn progress_line(stats: &ProgressStats) -> String {
    format!(
        "{}/{} resources ({}%)",
        stats.completed_count,
        stats.total_resources,
        stats.percent()
    )
}

pub fn print_list(entries: &[RoadmapMetadata]) {
    if entries.is_empty() {
        println!("No roadmaps yet. Use 'studypath new <topic>' to create one.");
        return;
    }

    for entry in entries {
        let percent = ProgressStats {
            completed_count: entry.completed_count,
            total_resources: entry.total_resources,
        }
        .percent();
        println!("{}  {}", entry.id, entry.title);
        println!(
            "    {} topics, {}% complete, created {}",
            entry.node_count,
            percent,
            entry.created_at.format("%Y-%m-%d %H:%M")
        );
    }
}

/// Prints the roadmap as an indented tree.
///
/// `✓` marks fully completed topics, `>` the current one.
pub fn print_outline(roadmap: &Roadmap) {
    let current = roadmap.last_position.as_ref().map(|p| p.node_id.as_str());

    println!("{} ({})", roadmap.title, roadmap.id);
    for entry in outline(&roadmap.nodes, &roadmap.edges) {
        entry.walk(&mut |item| {
            let node = item.node;
            let marker = if current == Some(node.id.as_str()) {
                ">"
            } else if roadmap.is_node_fully_complete(node) {
                "✓"
            } else {
                " "
            };
            let counts = if node.is_fetched() {
                format!(
                    " [{}/{}]",
                    roadmap.completed_resources.completed_count(node),
                    node.resource_count()
                )
            } else {
                String::new()
            };
            println!(
                "{marker} {}{} ({}){counts}",
                "  ".repeat(item.depth),
                node.data.label,
                node.id
            );
        });
    }
    println!();
    println!("Progress: {}", progress_line(&roadmap.progress()));
}

/// Prints the resource at `position`.
pub fn print_position(roadmap: &Roadmap, position: &Position) {
    let Some(node) = roadmap.node(&position.node_id) else {
        return;
    };

    println!("{}", node.data.label);
    if !node.data.description.is_empty() {
        println!("  {}", node.data.description);
    }

    if !node.is_fetched() {
        println!("  Resources not loaded yet.");
        return;
    }
    let Some(resource) = node.resources().get(position.resource_index) else {
        println!("  No resources found for this topic.");
        return;
    };

    let done = roadmap
        .completed_resources
        .is_complete(&node.id, &resource.id);
    println!();
    println!(
        "  [{}/{}] {} {}",
        position.resource_index + 1,
        node.resource_count(),
        if done { "✓" } else { "•" },
        resource.title
    );
    println!("  {} · {}", resource.kind.display_name(), resource.source);
    println!("  {}", resource.url);
    if let Some(duration) = &resource.metadata.duration {
        println!("  Duration: {duration}");
    }
    if !resource.description.is_empty() {
        println!("  {}", resource.description);
    }
}

/// Reports what happened while loading resources for a step.
pub fn print_fetch(step: &Step) {
    match &step.fetch {
        FetchOutcome::NotNeeded => {}
        FetchOutcome::Fetched { count } => eprintln!("Loaded {count} resources."),
        FetchOutcome::InFlight => eprintln!("Resources are still loading."),
        FetchOutcome::Failed(e) => eprintln!("Could not load resources: {e}"),
    }
}
