use gitreader_protocol::paths::{normalize_path, path_has_prefix};
use gitreader_protocol::{GraphEdge, GraphLayoutMode, NodeKind, SymbolNode, FULL_SCOPE};
use serde::Serialize;
use std::collections::HashSet;

/// Output contract shared by both view builders.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GraphView {
    pub nodes: Vec<SymbolNode>,
    pub edges: Vec<GraphEdge>,
    #[serde(rename = "totalNodes")]
    pub total_nodes: usize,
    #[serde(rename = "visibleNodes")]
    pub visible_nodes: usize,
    #[serde(rename = "isCapped")]
    pub is_capped: bool,
}

impl GraphView {
    /// The whole input, unfiltered.
    pub fn identity(nodes: &[SymbolNode], edges: &[GraphEdge]) -> Self {
        Self {
            nodes: nodes.to_vec(),
            edges: edges.to_vec(),
            total_nodes: nodes.len(),
            visible_nodes: nodes.len(),
            is_capped: false,
        }
    }

    pub fn empty() -> Self {
        Self {
            nodes: Vec::new(),
            edges: Vec::new(),
            total_nodes: 0,
            visible_nodes: 0,
            is_capped: false,
        }
    }

    pub fn node_ids(&self) -> Vec<&str> {
        self.nodes.iter().map(|node| node.id.as_str()).collect()
    }
}

/// Node ids that must survive degree capping when the cap allows.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct KeepSet {
    pub selected: Option<String>,
    pub snippet: Option<String>,
    pub snippet_file: Option<String>,
    pub focused: Option<String>,
}

impl KeepSet {
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        [
            self.selected.as_deref(),
            self.snippet.as_deref(),
            self.snippet_file.as_deref(),
            self.focused.as_deref(),
        ]
        .into_iter()
        .flatten()
    }
}

/// Status line and reveal affordance reported after each rebuild.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct NodeStatus {
    pub text: String,
    pub reveal_enabled: bool,
    pub reveal_label: String,
}

pub fn node_status(
    view: &GraphView,
    mode: GraphLayoutMode,
    tour_active: bool,
    cap_step: usize,
) -> NodeStatus {
    let (visible, total) = (view.visible_nodes, view.total_nodes);
    let status = |text: String, enabled: bool, label: &str| NodeStatus {
        text,
        reveal_enabled: enabled,
        reveal_label: label.to_string(),
    };

    if total == 0 {
        return status(String::new(), false, "Show more");
    }
    if tour_active {
        return status(format!("Guided view: {visible}/{total}"), false, "Guided");
    }
    if mode == GraphLayoutMode::Cluster {
        return status(
            format!("Cluster view: {visible} groups from {total}"),
            false,
            "Show more",
        );
    }
    if !view.is_capped {
        return status(format!("Showing {visible} nodes"), false, "Show more");
    }
    let next_cap = total.min(visible.saturating_add(cap_step));
    let label = if next_cap >= total { "Show all" } else { "Show more" };
    status(format!("Showing {visible} of {total}"), true, label)
}

/// Chapters named `group:*` or `story:*` are their own scope; everything else is `full`.
pub fn scope_for_chapter(chapter_id: &str) -> String {
    if chapter_id.starts_with("group:") || chapter_id.starts_with("story:") {
        return chapter_id.to_string();
    }
    FULL_SCOPE.to_string()
}

/// Narrows a scope's nodes to a `group:<folder>` chapter, falling back to everything.
pub fn filter_nodes_for_chapter(nodes: &[SymbolNode], chapter_id: &str) -> Vec<SymbolNode> {
    let Some(group) = chapter_id.strip_prefix("group:") else {
        return nodes.to_vec();
    };
    let filtered: Vec<SymbolNode> = nodes
        .iter()
        .filter(|node| {
            let Some(path) = node.path() else {
                return false;
            };
            let normalized = normalize_path(path);
            if group == "root" {
                return !normalized.contains('/');
            }
            normalized != group && path_has_prefix(group, &normalized)
        })
        .cloned()
        .collect();
    if filtered.is_empty() {
        return nodes.to_vec();
    }
    filtered
}

pub fn filter_edges_for_nodes(nodes: &[SymbolNode], edges: &[GraphEdge]) -> Vec<GraphEdge> {
    let allowed: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    edges
        .iter()
        .filter(|edge| allowed.contains(edge.source.as_str()) && allowed.contains(edge.target.as_str()))
        .cloned()
        .collect()
}

/// First node by reading priority; used when a fresh view has no explicit selection.
pub fn pick_focus_node(nodes: &[SymbolNode]) -> Option<&SymbolNode> {
    const PRIORITY: [NodeKind; 7] = [
        NodeKind::Function,
        NodeKind::Method,
        NodeKind::Class,
        NodeKind::File,
        NodeKind::Folder,
        NodeKind::Blueprint,
        NodeKind::External,
    ];
    PRIORITY
        .iter()
        .find_map(|kind| nodes.iter().find(|node| node.kind == *kind))
        .or_else(|| nodes.first())
}

pub fn file_node_for_symbol<'a>(
    nodes: &'a [SymbolNode],
    symbol: &SymbolNode,
) -> Option<&'a SymbolNode> {
    if symbol.kind == NodeKind::File {
        return nodes.iter().find(|node| node.id == symbol.id);
    }
    let path = normalize_path(symbol.path()?);
    nodes.iter().find(|node| {
        node.kind == NodeKind::File && node.path().map(normalize_path).as_deref() == Some(path.as_str())
    })
}
