//! Element model of what is currently on the canvas.
//!
//! The controller keeps its own copy so neighborhoods, connected edges and
//! visibility can be computed without asking the rendering backend.

use crate::labels::NodeLabel;
use crate::layout::Position;
use gitreader_protocol::{Confidence, EdgeKind, NodeKind};
use petgraph::graph::{DiGraph, EdgeIndex, NodeIndex};
use petgraph::visit::EdgeRef;
use petgraph::Direction;
use serde::Serialize;
use std::collections::HashMap;

/// Node element handed to the canvas.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CanvasNode {
    pub id: String,
    pub kind: NodeKind,
    pub label: NodeLabel,
    pub summary: String,
    pub position: Option<Position>,
}

/// Edge element handed to the canvas.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct CanvasEdge {
    /// `edge:<source>:<target>:<kind>:<index>`, unique within one render.
    pub id: String,
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub confidence: Confidence,
}

#[derive(Debug, Clone, Default)]
pub struct SceneGraph {
    pub graph: DiGraph<CanvasNode, CanvasEdge>,
    /// Node id -> NodeIndex mapping for fast lookup
    pub node_index: HashMap<String, NodeIndex>,
}

impl SceneGraph {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builds a scene, silently skipping edges whose endpoints are absent.
    pub fn from_elements(nodes: &[CanvasNode], edges: &[CanvasEdge]) -> Self {
        let mut scene = Self::new();
        for node in nodes {
            scene.add_node(node.clone());
        }
        for edge in edges {
            scene.add_edge(edge.clone());
        }
        scene
    }

    pub fn add_node(&mut self, node: CanvasNode) -> NodeIndex {
        if let Some(&idx) = self.node_index.get(&node.id) {
            return idx;
        }
        let id = node.id.clone();
        let idx = self.graph.add_node(node);
        self.node_index.insert(id, idx);
        idx
    }

    pub fn add_edge(&mut self, edge: CanvasEdge) -> Option<EdgeIndex> {
        let from = self.find_node(&edge.source)?;
        let to = self.find_node(&edge.target)?;
        Some(self.graph.add_edge(from, to, edge))
    }

    pub fn find_node(&self, id: &str) -> Option<NodeIndex> {
        self.node_index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.node_index.contains_key(id)
    }

    pub fn node(&self, id: &str) -> Option<&CanvasNode> {
        self.find_node(id).and_then(|idx| self.graph.node_weight(idx))
    }

    pub fn nodes(&self) -> impl Iterator<Item = &CanvasNode> {
        self.graph.node_weights()
    }

    pub fn edges(&self) -> impl Iterator<Item = &CanvasEdge> {
        self.graph.edge_weights()
    }

    /// Edges touching `id` in either direction.
    pub fn connected_edges(&self, id: &str) -> Vec<&CanvasEdge> {
        let Some(idx) = self.find_node(id) else {
            return Vec::new();
        };
        self.graph
            .edges_directed(idx, Direction::Outgoing)
            .chain(self.graph.edges_directed(idx, Direction::Incoming))
            .map(|edge| edge.weight())
            .collect()
    }

    /// Depth of every node from the in-degree-zero roots, breadth first.
    pub fn depths(&self) -> HashMap<NodeIndex, usize> {
        let mut depth = HashMap::new();
        let mut queue = std::collections::VecDeque::new();
        let mut roots: Vec<NodeIndex> = self
            .graph
            .node_indices()
            .filter(|&idx| {
                self.graph
                    .edges_directed(idx, Direction::Incoming)
                    .next()
                    .is_none()
            })
            .collect();
        if roots.is_empty() {
            roots.extend(self.graph.node_indices().next());
        }
        for root in roots {
            depth.insert(root, 0);
            queue.push_back(root);
        }
        loop {
            while let Some(current) = queue.pop_front() {
                let next_depth = depth[&current] + 1;
                for neighbor in self.graph.neighbors_directed(current, Direction::Outgoing) {
                    if !depth.contains_key(&neighbor) {
                        depth.insert(neighbor, next_depth);
                        queue.push_back(neighbor);
                    }
                }
            }
            // Nodes only reachable through cycles get their own root.
            match self.graph.node_indices().find(|idx| !depth.contains_key(idx)) {
                Some(orphan) => {
                    depth.insert(orphan, 0);
                    queue.push_back(orphan);
                }
                None => break,
            }
        }
        depth
    }

    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    pub fn is_empty(&self) -> bool {
        self.graph.node_count() == 0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::format_node_label;
    use gitreader_protocol::SymbolNode;

    fn canvas_node(id: &str) -> CanvasNode {
        let symbol = SymbolNode::new(id, id, NodeKind::Function);
        CanvasNode {
            id: id.to_string(),
            kind: NodeKind::Function,
            label: format_node_label(&symbol, 18),
            summary: String::new(),
            position: None,
        }
    }

    fn canvas_edge(source: &str, target: &str) -> CanvasEdge {
        CanvasEdge {
            id: format!("edge:{source}:{target}:calls:0"),
            source: source.to_string(),
            target: target.to_string(),
            kind: EdgeKind::Calls,
            confidence: Confidence::High,
        }
    }

    #[test]
    fn dangling_edges_are_skipped() {
        let scene = SceneGraph::from_elements(
            &[canvas_node("a"), canvas_node("b")],
            &[canvas_edge("a", "b"), canvas_edge("a", "ghost")],
        );
        assert_eq!(scene.node_count(), 2);
        assert_eq!(scene.edge_count(), 1);
        assert_eq!(scene.connected_edges("b").len(), 1);
        assert!(scene.connected_edges("ghost").is_empty());
    }

    #[test]
    fn depths_follow_edge_direction_and_cover_cycles() {
        let scene = SceneGraph::from_elements(
            &[canvas_node("a"), canvas_node("b"), canvas_node("c"), canvas_node("x"), canvas_node("y")],
            &[
                canvas_edge("a", "b"),
                canvas_edge("b", "c"),
                canvas_edge("x", "y"),
                canvas_edge("y", "x"),
            ],
        );
        let depths = scene.depths();
        let depth_of = |id: &str| depths[&scene.find_node(id).unwrap()];
        assert_eq!(depth_of("a"), 0);
        assert_eq!(depth_of("b"), 1);
        assert_eq!(depth_of("c"), 2);
        assert_eq!(depths.len(), 5);
        assert_eq!(depth_of("x") + depth_of("y"), 1);
    }
}
