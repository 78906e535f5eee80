//! Team hierarchy reporting.
//!
//! The adjacency structure (parent slug -> children) is built first; a
//! separate pure traversal renders the nested report. No shared map is
//! mutated while walking the tree.

use serde_json::{json, Value};
use std::collections::{HashMap, HashSet};

use crate::core::model::Team;

/// Parent slug -> child slugs, in listing order. `None` keys the roots; a
/// team whose parent is not in the listing is treated as a root.
pub fn build_adjacency(teams: &[Team]) -> HashMap<Option<String>, Vec<String>> {
    let known: HashSet<&str> = teams.iter().map(|t| t.slug.as_str()).collect();
    let mut adjacency: HashMap<Option<String>, Vec<String>> = HashMap::new();

    for team in teams {
        let parent = team
            .parent_slug
            .as_ref()
            .filter(|p| known.contains(p.as_str()))
            .cloned();
        adjacency.entry(parent).or_default().push(team.slug.clone());
    }

    adjacency
}

/// Render the nested hierarchy report from the adjacency structure.
pub fn render(teams: &[Team]) -> Value {
    let adjacency = build_adjacency(teams);
    let by_slug: HashMap<&str, &Team> = teams.iter().map(|t| (t.slug.as_str(), t)).collect();

    let roots = adjacency.get(&None).cloned().unwrap_or_default();
    Value::Array(
        roots
            .iter()
            .map(|slug| render_node(slug, &adjacency, &by_slug))
            .collect(),
    )
}

fn render_node(
    slug: &str,
    adjacency: &HashMap<Option<String>, Vec<String>>,
    by_slug: &HashMap<&str, &Team>,
) -> Value {
    let name = by_slug.get(slug).map(|t| t.name.as_str()).unwrap_or(slug);
    let children = adjacency
        .get(&Some(slug.to_string()))
        .map(|child_slugs| {
            child_slugs
                .iter()
                .map(|child| render_node(child, adjacency, by_slug))
                .collect::<Vec<_>>()
        })
        .unwrap_or_default();

    json!({
        "slug": slug,
        "name": name,
        "children": children,
    })
}
