//! Folder-cluster view: the hierarchical strategy used by the `cluster` layout.
//!
//! ```text
//! file tree ──walk──> visible set (folder clusters, files, expanded symbols, externals)
//!      │
//! raw edges ──representative──> retargeted edges ──merge (source,target,kind)──> view edges
//! ```

use crate::tree::{FileTree, TreeNodeId};
use crate::view::GraphView;
use gitreader_protocol::paths::{ancestor_paths, normalize_path};
use gitreader_protocol::{
    Confidence, EdgeKind, GraphEdge, NodeKind, SourceLocation, SymbolNode, FOLDER_CLUSTER_PREFIX,
};
use std::collections::{BTreeSet, HashMap, HashSet};

pub fn folder_cluster_id(path: &str) -> String {
    format!("{FOLDER_CLUSTER_PREFIX}{path}")
}

/// Folder and file ids the user has expanded. Survives rebuilds until toggled.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ClusterExpansion {
    expanded: BTreeSet<String>,
}

impl ClusterExpansion {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn is_expanded(&self, id: &str) -> bool {
        self.expanded.contains(id)
    }

    /// Flips `id` and returns whether it is now expanded.
    pub fn toggle(&mut self, id: &str) -> bool {
        if self.expanded.remove(id) {
            return false;
        }
        self.expanded.insert(id.to_string());
        true
    }

    pub fn expand(&mut self, id: impl Into<String>) {
        self.expanded.insert(id.into());
    }

    pub fn clear(&mut self) {
        self.expanded.clear();
    }

    pub fn len(&self) -> usize {
        self.expanded.len()
    }

    pub fn is_empty(&self) -> bool {
        self.expanded.is_empty()
    }

    /// Stable key of the expansion set, used to address remembered layouts.
    pub fn signature(&self) -> String {
        self.expanded.iter().cloned().collect::<Vec<_>>().join("|")
    }

    /// Shallowest collapsed folder on the way to `path`, if any.
    pub fn collapsed_ancestor(&self, path: &str) -> Option<String> {
        ancestor_paths(path)
            .into_iter()
            .map(|dir| folder_cluster_id(&dir))
            .find(|id| !self.is_expanded(id))
    }
}

/// True when `file` owns symbols that an expansion would reveal.
pub fn file_has_cluster_children(nodes: &[SymbolNode], file: &SymbolNode) -> bool {
    let Some(path) = file.path().map(normalize_path) else {
        return false;
    };
    nodes.iter().any(|node| {
        !matches!(node.kind, NodeKind::File | NodeKind::External)
            && node.path().map(normalize_path).as_deref() == Some(path.as_str())
    })
}

/// Builds the cluster view, deriving the file tree from `nodes`.
pub fn build_cluster_view(
    nodes: &[SymbolNode],
    edges: &[GraphEdge],
    expansion: &ClusterExpansion,
    show_external: bool,
) -> GraphView {
    let tree = FileTree::from_nodes(nodes);
    build_cluster_view_with_tree(nodes, edges, &tree, expansion, show_external)
}

/// Builds the cluster view over a file tree the caller already holds for `nodes`.
pub fn build_cluster_view_with_tree(
    nodes: &[SymbolNode],
    edges: &[GraphEdge],
    tree: &FileTree,
    expansion: &ClusterExpansion,
    show_external: bool,
) -> GraphView {
    if tree.is_empty() {
        return GraphView::identity(nodes, edges);
    }

    let mut walk = ClusterWalk::new(nodes, tree, expansion);
    walk.visit(FileTree::ROOT, None);
    walk.emit_expanded_symbols();
    if show_external {
        for node in nodes.iter().filter(|node| node.kind == NodeKind::External) {
            walk.add_node(node.clone());
        }
    }

    let by_id: HashMap<&str, &SymbolNode> = nodes.iter().map(|node| (node.id.as_str(), node)).collect();
    let mut merged = EdgeMerger::default();
    for edge in edges {
        let (Some(source), Some(target)) = (by_id.get(edge.source.as_str()), by_id.get(edge.target.as_str()))
        else {
            continue;
        };
        let source_rep = walk.representative(source, show_external);
        let target_rep = walk.representative(target, show_external);
        let (Some(source_rep), Some(target_rep)) = (source_rep, target_rep) else {
            continue;
        };
        if source_rep == target_rep {
            continue;
        }
        merged.add(source_rep, target_rep, edge.kind, edge.confidence);
    }
    for edge in std::mem::take(&mut walk.folder_edges) {
        merged.add(edge.source, edge.target, edge.kind, edge.confidence);
    }

    let visible_nodes = walk.visible.len();
    log::debug!(
        "Cluster view: {visible_nodes} visible from {} nodes ({} expanded)",
        nodes.len(),
        expansion.len()
    );

    GraphView {
        nodes: walk.visible,
        edges: merged.into_edges(),
        total_nodes: nodes.len(),
        visible_nodes,
        is_capped: false,
    }
}

struct ClusterWalk<'a> {
    tree: &'a FileTree,
    expansion: &'a ClusterExpansion,
    file_by_path: HashMap<String, &'a SymbolNode>,
    symbols_by_path: HashMap<String, Vec<&'a SymbolNode>>,
    visible: Vec<SymbolNode>,
    visible_ids: HashSet<String>,
    visible_files: Vec<(String, String)>,
    folder_edges: Vec<GraphEdge>,
}

impl<'a> ClusterWalk<'a> {
    fn new(nodes: &'a [SymbolNode], tree: &'a FileTree, expansion: &'a ClusterExpansion) -> Self {
        let mut file_by_path = HashMap::new();
        let mut symbols_by_path: HashMap<String, Vec<&SymbolNode>> = HashMap::new();
        for node in nodes {
            let Some(path) = node.path() else {
                continue;
            };
            let normalized = normalize_path(path);
            match node.kind {
                NodeKind::File => {
                    file_by_path.entry(normalized).or_insert(node);
                }
                NodeKind::External => {}
                _ => symbols_by_path.entry(normalized).or_default().push(node),
            }
        }
        Self {
            tree,
            expansion,
            file_by_path,
            symbols_by_path,
            visible: Vec::new(),
            visible_ids: HashSet::new(),
            visible_files: Vec::new(),
            folder_edges: Vec::new(),
        }
    }

    fn add_node(&mut self, node: SymbolNode) {
        if self.visible_ids.insert(node.id.clone()) {
            self.visible.push(node);
        }
    }

    fn add_contains(&mut self, parent: Option<&str>, child: &str) {
        if let Some(parent) = parent {
            self.folder_edges.push(GraphEdge::new(
                parent,
                child,
                EdgeKind::Contains,
                Confidence::Low,
            ));
        }
    }

    /// Depth-first walk. `parent_rep` is the visible node standing in for the
    /// current folder; expanded folders are not drawn and pass theirs through.
    fn visit(&mut self, id: TreeNodeId, parent_rep: Option<&str>) {
        let tree = self.tree;
        for child_id in tree.walk_children(id) {
            let child = tree.node(child_id);
            if child.is_file {
                let Some(file) = self.file_by_path.get(&child.path).copied() else {
                    continue;
                };
                self.add_node(file.clone());
                self.visible_files.push((file.id.clone(), child.path.clone()));
                self.add_contains(parent_rep, &file.id);
                continue;
            }

            let folder_id = folder_cluster_id(&child.path);
            if self.expansion.is_expanded(&folder_id) {
                self.visit(child_id, parent_rep);
                continue;
            }
            let count = tree.file_count(child_id);
            let mut folder = SymbolNode::new(
                folder_id.clone(),
                format!("({count} files) {}", child.name),
                NodeKind::Folder,
            );
            folder.location = Some(SourceLocation::for_path(child.path.clone()));
            self.add_node(folder);
            self.add_contains(parent_rep, &folder_id);
        }
    }

    fn emit_expanded_symbols(&mut self) {
        let files = std::mem::take(&mut self.visible_files);
        for (file_id, path) in &files {
            if !self.expansion.is_expanded(file_id) {
                continue;
            }
            let Some(symbols) = self.symbols_by_path.get(path) else {
                continue;
            };
            let symbols: Vec<SymbolNode> = symbols.iter().map(|node| (*node).clone()).collect();
            for symbol in symbols {
                self.add_node(symbol);
            }
        }
        self.visible_files = files;
    }

    /// The visible node that stands in for `node` when retargeting an edge.
    fn representative(&self, node: &SymbolNode, show_external: bool) -> Option<String> {
        if node.kind == NodeKind::External {
            return show_external.then(|| node.id.clone());
        }
        if self.visible_ids.contains(&node.id) {
            return Some(node.id.clone());
        }
        let path = normalize_path(node.path()?);
        if let Some(file) = self.file_by_path.get(&path) {
            if self.visible_ids.contains(&file.id) {
                return Some(file.id.clone());
            }
        }
        self.expansion
            .collapsed_ancestor(&path)
            .filter(|folder_id| self.visible_ids.contains(folder_id))
    }
}

/// Deduplicates edges by `(source, target, kind)`, keeping the highest confidence.
#[derive(Default)]
struct EdgeMerger {
    edges: Vec<GraphEdge>,
    index: HashMap<(String, String, EdgeKind), usize>,
}

impl EdgeMerger {
    fn add(&mut self, source: String, target: String, kind: EdgeKind, confidence: Confidence) {
        let key = (source, target, kind);
        if let Some(&slot) = self.index.get(&key) {
            let existing = &mut self.edges[slot];
            existing.confidence = existing.confidence.max(confidence);
            return;
        }
        let (source, target, kind) = key.clone();
        self.index.insert(key, self.edges.len());
        self.edges.push(GraphEdge::new(source, target, kind, confidence));
    }

    fn into_edges(self) -> Vec<GraphEdge> {
        self.edges
    }
}
