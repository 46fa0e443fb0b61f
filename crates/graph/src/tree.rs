//! Folder/file tree derived from the `file` nodes of a graph payload.
//!
//! Stored as an arena: every entry is addressed by its index and keeps index
//! lists for its parent and children, so the structure never owns itself
//! recursively. Index 0 is the unnamed root.

use gitreader_protocol::paths::normalize_path;
use gitreader_protocol::{NodeKind, SymbolNode};
use std::collections::HashMap;

pub type TreeNodeId = usize;

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TreeNode {
    pub name: String,
    pub path: String,
    pub is_file: bool,
    pub parent: Option<TreeNodeId>,
    /// Children ordered by segment name.
    children: Vec<TreeNodeId>,
    file_count: usize,
}

impl TreeNode {
    pub fn children(&self) -> &[TreeNodeId] {
        &self.children
    }

    fn is_folder_entry(&self) -> bool {
        !self.is_file
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FileTree {
    nodes: Vec<TreeNode>,
    by_path: HashMap<String, TreeNodeId>,
}

impl FileTree {
    pub const ROOT: TreeNodeId = 0;

    /// Builds the tree from every `kind=file` node with a path; other nodes are ignored.
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a SymbolNode>) -> Self {
        let mut tree = Self {
            nodes: vec![TreeNode {
                name: String::new(),
                path: String::new(),
                is_file: false,
                parent: None,
                children: Vec::new(),
                file_count: 0,
            }],
            by_path: HashMap::new(),
        };

        for node in nodes {
            if node.kind != NodeKind::File {
                continue;
            }
            let Some(path) = node.path() else {
                continue;
            };
            tree.insert_file(&normalize_path(path));
        }

        tree.recount();
        tree
    }

    fn insert_file(&mut self, normalized: &str) {
        if normalized.is_empty() {
            return;
        }
        let parts: Vec<&str> = normalized.split('/').collect();
        let mut cursor = Self::ROOT;
        let mut current = String::new();
        for (index, part) in parts.iter().enumerate() {
            if !current.is_empty() {
                current.push('/');
            }
            current.push_str(part);
            let is_file = index + 1 == parts.len();
            cursor = match self.by_path.get(&current) {
                Some(&existing) => existing,
                None => self.push_child(cursor, part, &current),
            };
            if is_file {
                self.nodes[cursor].is_file = true;
            }
        }
    }

    fn push_child(&mut self, parent: TreeNodeId, name: &str, path: &str) -> TreeNodeId {
        let id = self.nodes.len();
        self.nodes.push(TreeNode {
            name: name.to_string(),
            path: path.to_string(),
            is_file: false,
            parent: Some(parent),
            children: Vec::new(),
            file_count: 0,
        });
        self.by_path.insert(path.to_string(), id);

        let slot = {
            let nodes = &self.nodes;
            nodes[parent]
                .children
                .binary_search_by(|&child| nodes[child].name.as_str().cmp(name))
                .unwrap_or_else(|pos| pos)
        };
        self.nodes[parent].children.insert(slot, id);
        id
    }

    // Children are always pushed after their parent, so a reverse sweep is post-order.
    fn recount(&mut self) {
        for node in &mut self.nodes {
            node.file_count = usize::from(node.is_file);
        }
        for id in (1..self.nodes.len()).rev() {
            let count = self.nodes[id].file_count;
            if let Some(parent) = self.nodes[id].parent {
                self.nodes[parent].file_count += count;
            }
        }
    }

    pub fn node(&self, id: TreeNodeId) -> &TreeNode {
        &self.nodes[id]
    }

    pub fn find(&self, path: &str) -> Option<TreeNodeId> {
        self.by_path.get(&normalize_path(path)).copied()
    }

    /// Number of file leaves at or below `id`.
    pub fn file_count(&self, id: TreeNodeId) -> usize {
        self.nodes[id].file_count
    }

    /// Children in walk order: folders before files, then by name.
    pub fn walk_children(&self, id: TreeNodeId) -> Vec<TreeNodeId> {
        let mut out = self.nodes[id].children.clone();
        out.sort_by(|&a, &b| {
            let (a, b) = (&self.nodes[a], &self.nodes[b]);
            a.is_folder_entry()
                .cmp(&b.is_folder_entry())
                .reverse()
                .then_with(|| a.name.cmp(&b.name))
        });
        out
    }

    pub fn is_empty(&self) -> bool {
        self.nodes[Self::ROOT].file_count == 0
    }

    pub fn len(&self) -> usize {
        self.nodes.len() - 1
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn file(id: &str, path: &str) -> SymbolNode {
        SymbolNode::new(id, path, NodeKind::File).with_path(path)
    }

    #[test]
    fn builds_nested_paths_with_counts() {
        let nodes = vec![
            file("a", "root/utils/helpers.py"),
            file("b", "root/main.py"),
            file("c", "./root/utils/io.py"),
            SymbolNode::new("fn", "helper", NodeKind::Function).with_path("root/main.py"),
        ];
        let tree = FileTree::from_nodes(&nodes);

        assert_eq!(tree.len(), 5);
        let root = tree.find("root").unwrap();
        let utils = tree.find("root/utils").unwrap();
        assert_eq!(tree.file_count(FileTree::ROOT), 3);
        assert_eq!(tree.file_count(root), 3);
        assert_eq!(tree.file_count(utils), 2);
        assert!(tree.node(tree.find("root/utils/io.py").unwrap()).is_file);
        assert_eq!(tree.node(utils).parent, Some(root));
    }

    #[test]
    fn walk_puts_folders_first() {
        let nodes = vec![
            file("a", "src/zeta.py"),
            file("b", "src/alpha/mod.py"),
            file("c", "src/beta.py"),
        ];
        let tree = FileTree::from_nodes(&nodes);
        let src = tree.find("src").unwrap();
        let names: Vec<&str> = tree
            .walk_children(src)
            .into_iter()
            .map(|id| tree.node(id).name.as_str())
            .collect();
        assert_eq!(names, vec!["alpha", "beta.py", "zeta.py"]);

        let by_name: Vec<&str> = tree
            .node(src)
            .children()
            .iter()
            .map(|&id| tree.node(id).name.as_str())
            .collect();
        assert_eq!(by_name, vec!["alpha", "beta.py", "zeta.py"]);
    }

    #[test]
    fn pathless_and_non_file_nodes_are_skipped() {
        let nodes = vec![
            SymbolNode::new("x", "os", NodeKind::External),
            SymbolNode::new("f", "orphan", NodeKind::File),
        ];
        let tree = FileTree::from_nodes(&nodes);
        assert!(tree.is_empty());
        assert_eq!(tree.len(), 0);
    }
}
