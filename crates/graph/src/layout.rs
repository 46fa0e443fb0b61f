//! Layout parameters per mode and the position memory used by manual cluster layout.

use gitreader_protocol::paths::ancestor_paths;
use gitreader_protocol::{EdgeKind, GraphEdge, GraphLayoutMode, SymbolNode};
use lru::LruCache;
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use std::f64::consts::PI;
use std::num::NonZeroUsize;

use crate::cluster::folder_cluster_id;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub x: f64,
    pub y: f64,
}

impl Position {
    pub const ORIGIN: Position = Position { x: 0.0, y: 0.0 };

    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum LayoutName {
    /// Force directed.
    Cose,
    /// Layered, directed.
    Breadthfirst,
    /// Positions are taken as given.
    Preset,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayoutOptions {
    pub name: LayoutName,
    pub animate: bool,
    pub fit: bool,
    pub padding: f64,
    pub directed: bool,
    pub spacing_factor: f64,
    pub avoid_overlap: bool,
    pub avoid_overlap_padding: f64,
}

impl LayoutOptions {
    pub fn force() -> Self {
        Self {
            name: LayoutName::Cose,
            animate: false,
            fit: true,
            padding: 24.0,
            directed: false,
            spacing_factor: 1.0,
            avoid_overlap: false,
            avoid_overlap_padding: 0.0,
        }
    }

    pub fn layered() -> Self {
        Self {
            name: LayoutName::Breadthfirst,
            animate: false,
            fit: true,
            padding: 36.0,
            directed: true,
            spacing_factor: 1.35,
            avoid_overlap: true,
            avoid_overlap_padding: 24.0,
        }
    }

    pub fn preset() -> Self {
        Self {
            name: LayoutName::Preset,
            animate: false,
            fit: true,
            padding: 24.0,
            directed: false,
            spacing_factor: 1.0,
            avoid_overlap: false,
            avoid_overlap_padding: 0.0,
        }
    }

    /// Cluster uses the force layout unless the user arranged it by hand.
    pub fn for_mode(mode: GraphLayoutMode, manual_cluster: bool) -> Self {
        match mode {
            GraphLayoutMode::Cluster if manual_cluster => Self::preset(),
            GraphLayoutMode::Cluster => Self::force(),
            GraphLayoutMode::Layer => Self::layered(),
            GraphLayoutMode::Free => Self::preset(),
        }
    }

    /// Preset never moves nodes, so rebuilds skip running it.
    pub fn runs_on_rebuild(&self) -> bool {
        self.name != LayoutName::Preset
    }
}

/// Identity of one arrangement: the scope plus which clusters were open.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct LayoutKey {
    pub scope: String,
    pub expansion: String,
}

impl LayoutKey {
    pub fn new(scope: impl Into<String>, expansion: impl Into<String>) -> Self {
        Self {
            scope: scope.into(),
            expansion: expansion.into(),
        }
    }
}

pub type PositionMap = HashMap<String, Position>;

/// Bounded memory of user-arranged positions.
pub struct LayoutMemory {
    entries: LruCache<LayoutKey, PositionMap>,
}

impl LayoutMemory {
    pub fn new(capacity: usize) -> Self {
        let capacity = NonZeroUsize::new(capacity).unwrap_or(NonZeroUsize::MIN);
        Self {
            entries: LruCache::new(capacity),
        }
    }

    /// Merges `positions` into the entry for `key`; ids missing from the map are kept.
    pub fn remember(&mut self, key: LayoutKey, positions: PositionMap) {
        if positions.is_empty() {
            return;
        }
        if let Some(existing) = self.entries.get_mut(&key) {
            existing.extend(positions);
            return;
        }
        if let Some((evicted, _)) = self.entries.push(key, positions) {
            log::debug!(
                "Layout memory evicted {}:{}",
                evicted.scope,
                evicted.expansion
            );
        }
    }

    pub fn recall(&mut self, key: &LayoutKey) -> Option<&PositionMap> {
        self.entries.get(key).map(|positions| &*positions)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn clear(&mut self) {
        self.entries.clear();
    }
}

/// Positions for a fresh render: remembered, then snapshot, then a ring around the parent.
pub fn place_nodes(
    nodes: &[SymbolNode],
    edges: &[GraphEdge],
    remembered: Option<&PositionMap>,
    snapshot: &PositionMap,
) -> PositionMap {
    let lookup = |id: &str| {
        remembered
            .and_then(|positions| positions.get(id))
            .or_else(|| snapshot.get(id))
            .copied()
    };

    let mut placed = PositionMap::new();
    let mut orphans_by_parent: Vec<(String, Vec<&str>)> = Vec::new();
    let parents = parent_index(nodes, edges, |id| lookup(id).is_some());

    for node in nodes {
        if let Some(position) = lookup(&node.id) {
            placed.insert(node.id.clone(), position);
            continue;
        }
        let Some(parent) = parents.get(node.id.as_str()) else {
            continue;
        };
        match orphans_by_parent.iter_mut().find(|(id, _)| id == parent) {
            Some((_, children)) => children.push(node.id.as_str()),
            None => orphans_by_parent.push((parent.to_string(), vec![node.id.as_str()])),
        }
    }

    for (parent, children) in orphans_by_parent {
        let Some(center) = lookup(&parent).or_else(|| placed.get(&parent).copied()) else {
            continue;
        };
        for (id, position) in children.iter().zip(ring_positions(center, children.len())) {
            placed.insert((*id).to_string(), position);
        }
    }
    placed
}

/// `count` points evenly spaced on a circle of radius `80 + 12 * count`.
pub fn ring_positions(center: Position, count: usize) -> Vec<Position> {
    if count == 0 {
        return Vec::new();
    }
    let radius = 80.0 + 12.0 * count as f64;
    (0..count)
        .map(|index| {
            let angle = 2.0 * PI * index as f64 / count as f64;
            Position::new(center.x + radius * angle.cos(), center.y + radius * angle.sin())
        })
        .collect()
}

/// Parent of each node: the source of a `contains` edge, else the nearest ancestor folder
/// cluster that is either in view or still has a known position (an expanded folder).
fn parent_index<'a>(
    nodes: &'a [SymbolNode],
    edges: &'a [GraphEdge],
    has_position: impl Fn(&str) -> bool,
) -> HashMap<&'a str, String> {
    let present: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    let mut parents: HashMap<&str, String> = HashMap::new();
    for edge in edges.iter().filter(|edge| edge.kind == EdgeKind::Contains) {
        if present.contains(edge.source.as_str()) {
            parents
                .entry(edge.target.as_str())
                .or_insert_with(|| edge.source.clone());
        }
    }
    for node in nodes {
        if parents.contains_key(node.id.as_str()) {
            continue;
        }
        let Some(path) = node.path() else { continue };
        let nearest = ancestor_paths(path)
            .into_iter()
            .rev()
            .map(|ancestor| folder_cluster_id(&ancestor))
            .find(|cluster| {
                cluster != &node.id
                    && (present.contains(cluster.as_str()) || has_position(cluster.as_str()))
            });
        if let Some(cluster) = nearest {
            parents.insert(node.id.as_str(), cluster);
        }
    }
    parents
}

#[cfg(test)]
mod tests {
    use super::*;
    use gitreader_protocol::{Confidence, NodeKind};
    use pretty_assertions::assert_eq;

    fn close(a: Position, b: Position) -> bool {
        (a.x - b.x).abs() < 1e-9 && (a.y - b.y).abs() < 1e-9
    }

    #[test]
    fn options_follow_layout_mode() {
        assert_eq!(LayoutOptions::for_mode(GraphLayoutMode::Cluster, false).name, LayoutName::Cose);
        assert_eq!(
            LayoutOptions::for_mode(GraphLayoutMode::Cluster, true).name,
            LayoutName::Preset
        );
        let layered = LayoutOptions::for_mode(GraphLayoutMode::Layer, false);
        assert!(layered.directed && layered.avoid_overlap);
        assert_eq!(layered.spacing_factor, 1.35);
        assert!(!LayoutOptions::for_mode(GraphLayoutMode::Free, false).runs_on_rebuild());
    }

    #[test]
    fn ring_spacing_depends_on_sibling_count() {
        let ring = ring_positions(Position::new(10.0, 0.0), 2);
        assert!(close(ring[0], Position::new(10.0 + 104.0, 0.0)));
        assert!(close(ring[1], Position::new(10.0 - 104.0, 0.0)));
        assert!(ring_positions(Position::ORIGIN, 0).is_empty());
    }

    #[test]
    fn memory_evicts_least_recently_used() {
        let mut memory = LayoutMemory::new(2);
        let positions = |id: &str| PositionMap::from([(id.to_string(), Position::ORIGIN)]);
        memory.remember(LayoutKey::new("full", ""), positions("a"));
        memory.remember(LayoutKey::new("full", "x"), positions("b"));
        assert!(memory.recall(&LayoutKey::new("full", "")).is_some());
        memory.remember(LayoutKey::new("full", "y"), positions("c"));
        assert_eq!(memory.len(), 2);
        assert!(memory.recall(&LayoutKey::new("full", "x")).is_none());
        assert!(memory.recall(&LayoutKey::new("full", "")).is_some());
    }

    #[test]
    fn remember_merges_into_existing_entry() {
        let mut memory = LayoutMemory::new(4);
        let key = LayoutKey::new("full", "");
        memory.remember(key.clone(), PositionMap::from([("a".into(), Position::new(1.0, 1.0))]));
        memory.remember(key.clone(), PositionMap::from([("b".into(), Position::new(2.0, 2.0))]));
        let entry = memory.recall(&key).unwrap();
        assert_eq!(entry.len(), 2);
    }

    #[test]
    fn new_children_ring_around_remembered_parent() {
        let nodes = vec![
            SymbolNode::new("cluster:folder:app", "app", NodeKind::Folder).with_path("app"),
            SymbolNode::new("f1", "a.py", NodeKind::File).with_path("app/a.py"),
            SymbolNode::new("f2", "b.py", NodeKind::File).with_path("app/b.py"),
            SymbolNode::new("g", "c.py", NodeKind::File).with_path("lib/c.py"),
        ];
        let edges = vec![GraphEdge::new(
            "cluster:folder:app",
            "f1",
            EdgeKind::Contains,
            Confidence::Low,
        )];
        let snapshot = PositionMap::from([("cluster:folder:app".to_string(), Position::ORIGIN)]);
        let placed = place_nodes(&nodes, &edges, None, &snapshot);

        assert!(close(placed["cluster:folder:app"], Position::ORIGIN));
        assert!(close(placed["f1"], Position::new(104.0, 0.0)));
        assert!(close(placed["f2"], Position::new(-104.0, 0.0)));
        assert!(!placed.contains_key("g"));
    }

    #[test]
    fn children_of_expanded_folder_ring_around_its_old_position() {
        let nodes = vec![
            SymbolNode::new("cluster:folder:root/utils", "utils", NodeKind::Folder)
                .with_path("root/utils"),
            SymbolNode::new("file:main", "main.py", NodeKind::File).with_path("root/main.py"),
        ];
        let snapshot = PositionMap::from([(
            "cluster:folder:root".to_string(),
            Position::new(500.0, 500.0),
        )]);
        let placed = place_nodes(&nodes, &[], None, &snapshot);

        assert_eq!(placed.len(), 2);
        assert!(close(placed["cluster:folder:root/utils"], Position::new(604.0, 500.0)));
        assert!(close(placed["file:main"], Position::new(396.0, 500.0)));
        assert!(!placed.contains_key("cluster:folder:root"));
    }

    #[test]
    fn remembered_positions_win_over_snapshot() {
        let nodes = vec![SymbolNode::new("a", "a", NodeKind::Function)];
        let remembered = PositionMap::from([("a".to_string(), Position::new(5.0, 5.0))]);
        let snapshot = PositionMap::from([("a".to_string(), Position::new(9.0, 9.0))]);
        let placed = place_nodes(&nodes, &[], Some(&remembered), &snapshot);
        assert!(close(placed["a"], Position::new(5.0, 5.0)));
    }
}
