//! Session orchestration: data store, view builders and controller wired together.
//!
//! Every user action mutates session state and then runs the same pipeline:
//! chapter nodes -> builder for the current layout mode -> controller render
//! -> node status.

use crate::canvas::CanvasAdapter;
use crate::capped::{build_capped_view, NodeCaps};
use crate::cluster::{build_cluster_view_with_tree, file_has_cluster_children, ClusterExpansion};
use crate::config::ViewConfig;
use crate::controller::{GraphViewController, RenderOutcome};
use crate::error::Result;
use crate::guided::GuidedFilter;
use crate::layout::LayoutKey;
use crate::store::{GraphSource, GraphStore, RequestTicket, RequestTokens};
use crate::tree::FileTree;
use crate::view::{
    file_node_for_symbol, filter_edges_for_nodes, filter_nodes_for_chapter, node_status,
    pick_focus_node, scope_for_chapter, GraphView, KeepSet, NodeStatus,
};
use gitreader_protocol::{
    EdgeKind, GraphEdge, GraphLayoutMode, GraphPayload, NodeKind, SymbolNode, TourStep,
};
use std::sync::Arc;

/// A load that has been issued but not yet applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadRequest {
    pub ticket: RequestTicket,
    pub scope: String,
    pub chapter: String,
}

/// What a canvas tap turned into.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TapOutcome {
    Toggled { id: String, expanded: bool },
    Selected { id: String },
}

struct ChapterData {
    scope: String,
    chapter: String,
    nodes: Vec<SymbolNode>,
    edges: Vec<GraphEdge>,
    tree: FileTree,
}

pub struct GraphSession<S: GraphSource, C: CanvasAdapter> {
    store: Arc<GraphStore<S>>,
    controller: GraphViewController<C>,
    caps: NodeCaps,
    expansion: ClusterExpansion,
    tokens: RequestTokens,
    data: Option<ChapterData>,
    keep: KeepSet,
    tour: Option<TourStep>,
    view: GraphView,
    status: NodeStatus,
}

impl<S: GraphSource, C: CanvasAdapter> GraphSession<S, C> {
    pub fn new(source: S, canvas: C, config: ViewConfig) -> Self {
        Self::with_store(Arc::new(GraphStore::new(source)), canvas, config)
    }

    pub fn with_store(store: Arc<GraphStore<S>>, canvas: C, config: ViewConfig) -> Self {
        let caps = NodeCaps::new(config.node_cap, config.node_cap_step);
        let view = GraphView::empty();
        let status = node_status(&view, GraphLayoutMode::default(), false, caps.step());
        Self {
            store,
            controller: GraphViewController::new(canvas, config),
            caps,
            expansion: ClusterExpansion::new(),
            tokens: RequestTokens::new(),
            data: None,
            keep: KeepSet::default(),
            tour: None,
            view,
            status,
        }
    }

    pub fn store(&self) -> Arc<GraphStore<S>> {
        Arc::clone(&self.store)
    }

    /// Loads the scope a chapter belongs to and renders the chapter. Returns false when
    /// the result was discarded.
    pub async fn load_chapter(&mut self, chapter_id: &str) -> Result<bool> {
        if self.tour.is_some() {
            log::debug!("Ignoring chapter {chapter_id} while a tour is active");
            return Ok(false);
        }
        let request = self.begin_load(chapter_id);
        self.fetch_and_finish(request).await
    }

    pub async fn load_scope(&mut self, scope: &str) -> Result<bool> {
        let request = self.begin_request(scope, scope);
        self.fetch_and_finish(request).await
    }

    async fn fetch_and_finish(&mut self, request: LoadRequest) -> Result<bool> {
        let store = Arc::clone(&self.store);
        let payload = store.load(&request.scope).await?;
        Ok(self.finish_load(request, &payload))
    }

    /// Issues a ticket for `chapter_id`; pair with [`GraphSession::finish_load`].
    pub fn begin_load(&mut self, chapter_id: &str) -> LoadRequest {
        let scope = scope_for_chapter(chapter_id);
        self.begin_request(&scope, chapter_id)
    }

    fn begin_request(&mut self, scope: &str, chapter: &str) -> LoadRequest {
        LoadRequest {
            ticket: self.tokens.begin(),
            scope: scope.to_string(),
            chapter: chapter.to_string(),
        }
    }

    /// Applies a fetched payload unless a newer request has been issued since.
    pub fn finish_load(&mut self, request: LoadRequest, payload: &GraphPayload) -> bool {
        if !self.tokens.is_current(request.ticket) {
            log::debug!(
                "Discarding stale graph for chapter {} (scope {})",
                request.chapter,
                request.scope
            );
            return false;
        }
        for warning in &payload.warnings {
            log::warn!("{}: {} ({})", warning.code, warning.message, warning.path);
        }

        let nodes = filter_nodes_for_chapter(&payload.nodes, &request.chapter);
        let edges = filter_edges_for_nodes(&nodes, &payload.edges);
        let tree = FileTree::from_nodes(&nodes);
        log::info!(
            "Loaded chapter {} from scope {}: {} nodes, {} edges",
            request.chapter,
            request.scope,
            nodes.len(),
            edges.len()
        );
        self.data = Some(ChapterData {
            scope: request.scope,
            chapter: request.chapter,
            nodes,
            edges,
            tree,
        });

        self.keep.focused = None;
        self.keep.selected = None;
        self.controller.reset_focus();
        self.refresh();

        let focus = pick_focus_node(&self.view.nodes).map(|node| node.id.clone());
        self.set_snippet_node(focus.as_deref());
        true
    }

    /// Rebuilds the view for the current layout mode and renders it. A guided tour
    /// always sees every node of the chapter, uncapped and unclustered.
    pub fn refresh(&mut self) -> RenderOutcome {
        let mode = self.controller.layout_mode();
        let (view, key) = match &self.data {
            None => (GraphView::empty(), LayoutKey::new("", "")),
            Some(data) => {
                let view = match mode {
                    _ if self.tour.is_some() => GraphView::identity(&data.nodes, &data.edges),
                    GraphLayoutMode::Cluster => build_cluster_view_with_tree(
                        &data.nodes,
                        &data.edges,
                        &data.tree,
                        &self.expansion,
                        self.controller.show_external(),
                    ),
                    GraphLayoutMode::Layer | GraphLayoutMode::Free => {
                        let cap = self.caps.cap_for_scope(&data.scope, data.nodes.len());
                        build_capped_view(&data.nodes, &data.edges, cap, &self.keep)
                    }
                };
                (view, LayoutKey::new(data.scope.clone(), self.expansion.signature()))
            }
        };

        let outcome = self.controller.render(&view, key);
        self.view = view;
        self.update_status();
        outcome
    }

    fn update_status(&mut self) {
        self.status = node_status(
            &self.view,
            self.controller.layout_mode(),
            self.tour.is_some(),
            self.caps.step(),
        );
    }

    /// Raises the current scope's cap by one step. Returns false when nothing changed.
    pub fn reveal_more(&mut self) -> bool {
        if self.tour.is_some() || self.controller.layout_mode() == GraphLayoutMode::Cluster {
            return false;
        }
        let Some(data) = &self.data else {
            return false;
        };
        if self.caps.reveal_more(&data.scope, data.nodes.len()).is_none() {
            return false;
        }
        self.refresh();
        true
    }

    pub fn toggle_cluster_expansion(&mut self, id: &str) -> bool {
        let expanded = self.expansion.toggle(id);
        log::debug!("Cluster {id} expanded={expanded}");
        if self.controller.layout_mode() == GraphLayoutMode::Cluster {
            self.refresh();
        }
        expanded
    }

    pub fn set_layout_mode(&mut self, mode: GraphLayoutMode) {
        if self.controller.layout_mode() == mode {
            return;
        }
        self.controller.set_layout_mode(mode);
        self.refresh();
    }

    pub fn set_manual_cluster_layout(&mut self, manual: bool) {
        self.controller.set_manual_cluster_layout(manual);
    }

    pub fn toggle_edge_filter(&mut self, kind: EdgeKind) -> bool {
        self.controller.toggle_edge_filter(kind)
    }

    /// Cluster views emit externals at build time, so they need a rebuild.
    pub fn toggle_external_nodes(&mut self) -> bool {
        let shown = self.controller.toggle_external_nodes();
        if self.controller.layout_mode() == GraphLayoutMode::Cluster {
            self.refresh();
        }
        shown
    }

    pub fn focus_selected(&mut self) -> bool {
        let focused = self.controller.focus_on_selected();
        self.keep.focused = self.controller.focus_node().map(str::to_string);
        focused
    }

    pub fn reset_focus(&mut self) {
        self.controller.reset_focus();
        self.keep.focused = None;
    }

    /// Selects `id`; a node hidden by the cap is pulled in through the keep set.
    pub fn select_node(&mut self, id: Option<&str>) {
        self.keep.selected = id.map(str::to_string);
        if let Some(id) = id {
            let known = self
                .data
                .as_ref()
                .is_some_and(|data| data.nodes.iter().any(|node| node.id == id));
            let shown = self.view.nodes.iter().any(|node| node.id == id);
            if known && !shown && self.controller.layout_mode() != GraphLayoutMode::Cluster {
                self.refresh();
            }
        }
        self.controller.select(id);
    }

    /// Records the node whose snippet is on screen, along with its file.
    pub fn set_snippet_node(&mut self, id: Option<&str>) {
        self.keep.snippet = id.map(str::to_string);
        self.keep.snippet_file = match (id, &self.data) {
            (Some(id), Some(data)) => data
                .nodes
                .iter()
                .find(|node| node.id == id)
                .and_then(|symbol| file_node_for_symbol(&data.nodes, symbol))
                .map(|file| file.id.clone()),
            _ => None,
        };
    }

    pub fn start_tour_step(&mut self, step: &TourStep) {
        self.tour = Some(step.clone());
        self.keep.focused = step.focus_node_id().map(str::to_string);
        self.controller.set_guided(Some(GuidedFilter::from_step(step)));
        self.refresh();
    }

    pub fn end_tour(&mut self) {
        if self.tour.take().is_none() {
            return;
        }
        self.keep.focused = self.controller.focus_node().map(str::to_string);
        self.controller.set_guided(None);
        self.refresh();
    }

    /// Drains canvas input. In cluster mode, tapping a folder or a file with symbols toggles it.
    pub fn handle_canvas_events(&mut self) -> Vec<TapOutcome> {
        let taps = self.controller.handle_events();
        let mut outcomes = Vec::with_capacity(taps.len());
        for id in taps {
            if self.controller.layout_mode() == GraphLayoutMode::Cluster && self.is_expandable(&id) {
                let expanded = self.toggle_cluster_expansion(&id);
                outcomes.push(TapOutcome::Toggled { id, expanded });
            } else {
                self.select_node(Some(&id));
                outcomes.push(TapOutcome::Selected { id });
            }
        }
        outcomes
    }

    fn is_expandable(&self, id: &str) -> bool {
        let Some(node) = self.view.nodes.iter().find(|node| node.id == id) else {
            return false;
        };
        match node.kind {
            NodeKind::Folder => node.is_folder_cluster(),
            NodeKind::File => self
                .data
                .as_ref()
                .is_some_and(|data| file_has_cluster_children(&data.nodes, node)),
            _ => false,
        }
    }

    pub fn node_status(&self) -> &NodeStatus {
        &self.status
    }

    pub fn view(&self) -> &GraphView {
        &self.view
    }

    pub fn keep_set(&self) -> &KeepSet {
        &self.keep
    }

    pub fn expansion(&self) -> &ClusterExpansion {
        &self.expansion
    }

    pub fn current_scope(&self) -> Option<&str> {
        self.data.as_ref().map(|data| data.scope.as_str())
    }

    pub fn current_chapter(&self) -> Option<&str> {
        self.data.as_ref().map(|data| data.chapter.as_str())
    }

    pub fn is_tour_active(&self) -> bool {
        self.tour.is_some()
    }

    pub fn controller(&self) -> &GraphViewController<C> {
        &self.controller
    }

    pub fn controller_mut(&mut self) -> &mut GraphViewController<C> {
        &mut self.controller
    }

    /// Ends the session: cached payloads, caps, expansion and canvas state are dropped.
    pub async fn teardown(&mut self) {
        self.store.clear().await;
        self.controller.teardown();
        self.caps.clear();
        self.expansion.clear();
        self.data = None;
        self.keep = KeepSet::default();
        self.tour = None;
        self.view = GraphView::empty();
        self.update_status();
    }
}
