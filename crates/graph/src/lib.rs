//! # Gitreader Graph
//!
//! Turns analysis-derived node/edge payloads into bounded, navigable graph views.
//!
//! ## Features
//!
//! - **Degree-capped view** - keep the best-connected nodes under a per-scope cap
//! - **Folder clustering** - collapse folder subtrees and file members into single nodes
//! - **Guided tours** - restrict the canvas to the nodes a tour step allows
//! - **View control** - filters, focus isolation, selection emphasis and layout memory
//!
//! ## Architecture
//!
//! ```text
//! GraphSource (directory / HTTP)
//!     │
//!     ├──> GraphStore (per-scope cache, shared in-flight fetches)
//!     │
//!     ├──> View builder (chosen by layout mode)
//!     │      ├─ cluster      -> build_cluster_view (file tree arena, representatives)
//!     │      └─ layer / free -> build_capped_view (degree rank, keep set)
//!     │
//!     ├──> GraphViewController (SceneGraph on petgraph)
//!     │      ├─ externals -> edge kinds -> dangling edges
//!     │      ├─ guided filter (tour)
//!     │      └─ focus isolation
//!     │
//!     └──> CanvasAdapter (HeadlessCanvas or a real backend)
//! ```

mod canvas;
mod capped;
mod cluster;
mod config;
mod controller;
mod error;
mod guided;
mod labels;
mod layout;
mod prefs;
mod scene;
mod session;
mod store;
mod tree;
mod view;

pub use canvas::{
    CanvasAdapter, CanvasEvent, CanvasUnavailable, ElementStyle, FitRecord, HeadlessCanvas,
    SceneStyle, StyleClass,
};
pub use capped::{build_capped_view, NodeCaps};
pub use cluster::{
    build_cluster_view, build_cluster_view_with_tree, file_has_cluster_children,
    folder_cluster_id, ClusterExpansion,
};
pub use config::ViewConfig;
pub use controller::{
    GraphViewController, RenderOutcome, CANVAS_UNAVAILABLE_MESSAGE, EMPTY_GRAPH_MESSAGE,
    SELECT_TO_FOCUS_MESSAGE,
};
pub use error::{GraphError, Result};
pub use guided::{apply_guided_filter, GuidedFilter};
pub use labels::{format_node_label, kind_badge, kind_label, tooltip, wrap_label, NodeLabel, Tooltip};
pub use layout::{
    place_nodes, ring_positions, LayoutKey, LayoutMemory, LayoutName, LayoutOptions, Position,
    PositionMap,
};
pub use prefs::{parse_layout_mode, Preferences};
pub use scene::{CanvasEdge, CanvasNode, SceneGraph};
pub use session::{GraphSession, LoadRequest, TapOutcome};
pub use store::{DirectorySource, GraphSource, GraphStore, RequestTicket, RequestTokens};
pub use tree::{FileTree, TreeNode, TreeNodeId};
pub use view::{
    file_node_for_symbol, filter_edges_for_nodes, filter_nodes_for_chapter, node_status,
    pick_focus_node, scope_for_chapter, GraphView, KeepSet, NodeStatus,
};
