//! Degree-capped view: the flat strategy used by the `layer` and `free` layouts.

use crate::view::{GraphView, KeepSet};
use gitreader_protocol::{GraphEdge, NodeKind, SymbolNode};
use std::cmp::Ordering;
use std::collections::{HashMap, HashSet};

/// Per-scope visibility caps, remembered for the lifetime of a session.
#[derive(Debug, Clone)]
pub struct NodeCaps {
    default_cap: usize,
    step: usize,
    by_scope: HashMap<String, usize>,
}

impl NodeCaps {
    pub fn new(default_cap: usize, step: usize) -> Self {
        Self {
            default_cap,
            step,
            by_scope: HashMap::new(),
        }
    }

    pub fn step(&self) -> usize {
        self.step
    }

    /// Cap for `scope`, established on first use and clamped to `total`.
    pub fn cap_for_scope(&mut self, scope: &str, total: usize) -> usize {
        let cap = match self.by_scope.get(scope) {
            Some(&cap) => cap.min(total),
            None => self.default_cap.min(total),
        };
        self.by_scope.insert(scope.to_string(), cap);
        cap
    }

    /// Raises the cap by one step. Returns the new cap, or `None` when everything is already shown.
    pub fn reveal_more(&mut self, scope: &str, total: usize) -> Option<usize> {
        let cap = self.cap_for_scope(scope, total);
        if cap >= total {
            return None;
        }
        let next = total.min(cap.saturating_add(self.step));
        self.by_scope.insert(scope.to_string(), next);
        log::debug!("Reveal more in scope {scope}: cap {cap} -> {next} of {total}");
        Some(next)
    }

    pub fn clear(&mut self) {
        self.by_scope.clear();
    }
}

fn kind_priority(kind: NodeKind) -> u8 {
    match kind {
        NodeKind::Function => 0,
        NodeKind::Method => 1,
        NodeKind::Class => 2,
        NodeKind::File => 3,
        NodeKind::Blueprint => 4,
        NodeKind::External => 5,
        NodeKind::Folder => 10,
    }
}

/// Keeps at most `cap` nodes, ranked by degree, then kind priority, then name.
///
/// Members of `keep` are placed first (in rank order) so they survive whenever
/// the cap has room for them.
pub fn build_capped_view(
    nodes: &[SymbolNode],
    edges: &[GraphEdge],
    cap: usize,
    keep: &KeepSet,
) -> GraphView {
    let total_nodes = nodes.len();
    if cap >= total_nodes {
        return GraphView::identity(nodes, edges);
    }

    let present: HashSet<&str> = nodes.iter().map(|node| node.id.as_str()).collect();
    let mut degree: HashMap<&str, usize> = HashMap::new();
    for edge in edges {
        if present.contains(edge.source.as_str()) {
            *degree.entry(edge.source.as_str()).or_default() += 1;
        }
        if present.contains(edge.target.as_str()) {
            *degree.entry(edge.target.as_str()).or_default() += 1;
        }
    }

    let keep_ids: HashSet<&str> = keep.ids().filter(|id| present.contains(id)).collect();

    let mut ranked: Vec<&SymbolNode> = nodes.iter().collect();
    ranked.sort_by(|a, b| {
        let da = degree.get(a.id.as_str()).copied().unwrap_or(0);
        let db = degree.get(b.id.as_str()).copied().unwrap_or(0);
        rank_order((a, da), (b, db)).then_with(|| a.id.cmp(&b.id))
    });

    let mut selected: Vec<&SymbolNode> = Vec::with_capacity(cap);
    for node in ranked.iter().filter(|node| keep_ids.contains(node.id.as_str())) {
        if selected.len() >= cap {
            break;
        }
        selected.push(node);
    }
    for node in &ranked {
        if selected.len() >= cap {
            break;
        }
        if keep_ids.contains(node.id.as_str()) {
            continue;
        }
        selected.push(node);
    }

    let selected_ids: HashSet<&str> = selected.iter().map(|node| node.id.as_str()).collect();
    let edges: Vec<GraphEdge> = edges
        .iter()
        .filter(|edge| {
            selected_ids.contains(edge.source.as_str()) && selected_ids.contains(edge.target.as_str())
        })
        .cloned()
        .collect();
    let nodes: Vec<SymbolNode> = selected.into_iter().cloned().collect();
    let visible_nodes = nodes.len();

    log::debug!("Capped view: {visible_nodes} of {total_nodes} nodes, {} edges", edges.len());

    GraphView {
        nodes,
        edges,
        total_nodes,
        visible_nodes,
        is_capped: total_nodes > visible_nodes,
    }
}

fn rank_order(a: (&SymbolNode, usize), b: (&SymbolNode, usize)) -> Ordering {
    b.1.cmp(&a.1)
        .then_with(|| kind_priority(a.0.kind).cmp(&kind_priority(b.0.kind)))
        .then_with(|| a.0.name.cmp(&b.0.name))
}
