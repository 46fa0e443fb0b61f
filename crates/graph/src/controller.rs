//! Stateful view controller.
//!
//! ```text
//! GraphView ──render──▶ SceneGraph ──filters──▶ SceneStyle ──▶ CanvasAdapter
//!                         │                        ▲
//!                         └── LayoutMemory ────────┘ (manual cluster layout)
//! ```
//!
//! Filters run in a fixed order: external nodes, edge kinds, dangling edges,
//! guided tour, focus isolation. Selection and hover only change emphasis.

use crate::canvas::{CanvasAdapter, CanvasEvent, ElementStyle, SceneStyle, StyleClass};
use crate::config::ViewConfig;
use crate::guided::{apply_guided_filter, GuidedFilter};
use crate::labels::{format_node_label, tooltip, Tooltip};
use crate::layout::{place_nodes, LayoutKey, LayoutMemory, LayoutOptions, PositionMap};
use crate::scene::{CanvasEdge, CanvasNode, SceneGraph};
use crate::view::GraphView;
use gitreader_protocol::{EdgeKind, GraphLayoutMode, NodeKind};
use std::collections::{BTreeSet, HashSet};

pub const EMPTY_GRAPH_MESSAGE: &str = "No nodes yet. Graph data has not loaded.";
pub const CANVAS_UNAVAILABLE_MESSAGE: &str = "Graph library not loaded.";
pub const SELECT_TO_FOCUS_MESSAGE: &str = "Select a node to focus.";

/// What a render call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RenderOutcome {
    Empty,
    Unavailable,
    Rendered { nodes: usize, edges: usize },
}

pub struct GraphViewController<C: CanvasAdapter> {
    canvas: C,
    config: ViewConfig,
    scene: SceneGraph,
    style: SceneStyle,
    ready: bool,
    layout_mode: GraphLayoutMode,
    manual_cluster_layout: bool,
    layout_memory: LayoutMemory,
    layout_key: Option<LayoutKey>,
    edge_filters: BTreeSet<EdgeKind>,
    show_external: bool,
    focus_node: Option<String>,
    selected: Vec<String>,
    hovered: Option<String>,
    guided: Option<GuidedFilter>,
}

impl<C: CanvasAdapter> GraphViewController<C> {
    pub fn new(canvas: C, config: ViewConfig) -> Self {
        let layout_memory = LayoutMemory::new(config.layout_memory_capacity);
        Self {
            canvas,
            config,
            scene: SceneGraph::new(),
            style: SceneStyle::default(),
            ready: false,
            layout_mode: GraphLayoutMode::default(),
            manual_cluster_layout: false,
            layout_memory,
            layout_key: None,
            edge_filters: EdgeKind::ALL.into_iter().collect(),
            show_external: true,
            focus_node: None,
            selected: Vec::new(),
            hovered: None,
            guided: None,
        }
    }

    pub fn render(&mut self, view: &GraphView, key: LayoutKey) -> RenderOutcome {
        if view.nodes.is_empty() {
            self.canvas.clear();
            self.canvas.set_overlay(Some(EMPTY_GRAPH_MESSAGE));
            self.scene = SceneGraph::new();
            self.style = SceneStyle::default();
            self.ready = false;
            return RenderOutcome::Empty;
        }
        if !self.canvas.is_mounted() {
            if let Err(err) = self.canvas.mount() {
                log::warn!("Canvas unavailable: {err}");
                self.canvas.set_overlay(Some(CANVAS_UNAVAILABLE_MESSAGE));
                self.ready = false;
                return RenderOutcome::Unavailable;
            }
        }

        let manual = self.manual_layout_active();
        let snapshot = if manual && self.ready {
            let positions = self.canvas.node_positions();
            if let Some(previous) = self.layout_key.clone() {
                self.layout_memory.remember(previous, positions.clone());
            }
            positions
        } else {
            PositionMap::new()
        };
        let placed = if manual {
            place_nodes(
                &view.nodes,
                &view.edges,
                self.layout_memory.recall(&key),
                &snapshot,
            )
        } else {
            PositionMap::new()
        };

        let nodes: Vec<CanvasNode> = view
            .nodes
            .iter()
            .map(|node| CanvasNode {
                id: node.id.clone(),
                kind: node.kind,
                label: format_node_label(node, self.config.label_line_length),
                summary: node.summary.clone(),
                position: placed.get(&node.id).copied(),
            })
            .collect();
        let present: HashSet<&str> = view.nodes.iter().map(|node| node.id.as_str()).collect();
        let edges: Vec<CanvasEdge> = view
            .edges
            .iter()
            .enumerate()
            .filter(|(_, edge)| {
                present.contains(edge.source.as_str()) && present.contains(edge.target.as_str())
            })
            .map(|(index, edge)| CanvasEdge {
                id: format!(
                    "edge:{}:{}:{}:{index}",
                    edge.source,
                    edge.target,
                    edge.kind.as_str()
                ),
                source: edge.source.clone(),
                target: edge.target.clone(),
                kind: edge.kind,
                confidence: edge.confidence,
            })
            .collect();

        self.canvas.set_overlay(None);
        self.canvas.render(&nodes, &edges);
        self.scene = SceneGraph::from_elements(&nodes, &edges);
        self.ready = true;

        self.selected.retain(|id| self.scene.contains(id));
        if self
            .hovered
            .as_deref()
            .is_some_and(|id| !self.scene.contains(id))
        {
            self.hovered = None;
        }
        self.canvas.set_selected(&self.selected);

        let options = LayoutOptions::for_mode(self.layout_mode, self.manual_cluster_layout);
        if options.runs_on_rebuild() {
            self.canvas.run_layout(&options);
        }
        if manual {
            self.layout_memory.remember(key.clone(), placed);
        }
        self.layout_key = Some(key);

        log::debug!(
            "Rendered {} nodes, {} edges ({} layout)",
            nodes.len(),
            edges.len(),
            self.layout_mode
        );
        self.apply_filters();
        RenderOutcome::Rendered {
            nodes: nodes.len(),
            edges: edges.len(),
        }
    }

    /// Recomputes visibility from scratch and pushes the style to the canvas.
    pub fn apply_filters(&mut self) {
        if !self.ready {
            return;
        }
        let mut style = SceneStyle::default();
        for node in self.scene.nodes() {
            let hidden = !self.show_external && node.kind == NodeKind::External;
            style.nodes.insert(
                node.id.clone(),
                ElementStyle {
                    hidden,
                    ..ElementStyle::default()
                },
            );
        }
        for edge in self.scene.edges() {
            let endpoint_hidden = [&edge.source, &edge.target]
                .iter()
                .any(|id| style.nodes.get(id.as_str()).map_or(true, |node| node.hidden));
            let hidden = !self.edge_filters.contains(&edge.kind) || endpoint_hidden;
            style.edges.insert(
                edge.id.clone(),
                ElementStyle {
                    hidden,
                    ..ElementStyle::default()
                },
            );
        }

        apply_guided_filter(&self.scene, &mut style, self.guided.as_ref());
        self.style = style;
        self.apply_focus();
        self.refresh_emphasis();
    }

    fn apply_focus(&mut self) {
        let Some(focus) = self.focus_node.clone() else {
            return;
        };
        if self.guided.is_some() {
            return;
        }
        let visible = self.style.node(&focus).is_some_and(|style| !style.hidden);
        if !visible {
            log::debug!("Focus target {focus} is gone, clearing focus");
            self.focus_node = None;
            return;
        }

        let mut keep_nodes: HashSet<String> = HashSet::from([focus.clone()]);
        let mut keep_edges: HashSet<String> = HashSet::new();
        for edge in self.scene.connected_edges(&focus) {
            if self.style.edge(&edge.id).is_some_and(|style| !style.hidden) {
                keep_edges.insert(edge.id.clone());
                keep_nodes.insert(edge.source.clone());
                keep_nodes.insert(edge.target.clone());
            }
        }
        for (id, style) in self.style.nodes.iter_mut() {
            if !keep_nodes.contains(id) {
                style.hidden = true;
            }
        }
        for (id, style) in self.style.edges.iter_mut() {
            if !keep_edges.contains(id) {
                style.hidden = true;
            }
        }
        let mut ids: Vec<String> = keep_nodes.into_iter().collect();
        ids.sort();
        self.canvas.fit(Some(&ids), self.config.fit_padding);
    }

    /// Updates emphasis and label classes without touching visibility.
    fn refresh_emphasis(&mut self) {
        if !self.ready {
            return;
        }
        let mut active: HashSet<&str> = HashSet::new();
        for id in self.selected.iter().chain(self.hovered.iter()) {
            for edge in self.scene.connected_edges(id) {
                active.insert(edge.id.as_str());
            }
        }
        let labels_by_zoom = self.canvas.zoom_level() >= self.config.label_zoom_threshold;
        for (id, style) in self.style.nodes.iter_mut() {
            let selected = self.selected.iter().any(|selected| selected == id);
            let hovered = self.hovered.as_deref() == Some(id.as_str());
            let guided = self.guided.as_ref().is_some_and(|guided| guided.allows(id));
            style.set(StyleClass::IsSelected, selected);
            style.set(StyleClass::IsHovered, hovered);
            style.set(
                StyleClass::LabelVisible,
                labels_by_zoom || selected || hovered || guided,
            );
        }
        for (id, style) in self.style.edges.iter_mut() {
            style.set(StyleClass::IsActive, active.contains(id.as_str()));
        }
        self.canvas.apply_style(&self.style);
    }

    pub fn select(&mut self, id: Option<&str>) {
        if !self.ready {
            return;
        }
        self.selected = id
            .filter(|id| self.scene.contains(id))
            .map(|id| vec![id.to_string()])
            .unwrap_or_default();
        self.canvas.set_selected(&self.selected);
        self.refresh_emphasis();
    }

    pub fn hover(&mut self, id: Option<&str>) {
        if !self.ready {
            return;
        }
        self.hovered = id.filter(|id| self.scene.contains(id)).map(str::to_string);
        self.refresh_emphasis();
    }

    /// Isolates the selected node's neighborhood. Returns false when nothing is selected.
    pub fn focus_on_selected(&mut self) -> bool {
        let Some(target) = self.selected.first().cloned() else {
            self.canvas.set_overlay(Some(SELECT_TO_FOCUS_MESSAGE));
            return false;
        };
        self.focus_on(&target)
    }

    pub fn focus_on(&mut self, id: &str) -> bool {
        if !self.ready {
            return false;
        }
        self.focus_node = Some(id.to_string());
        self.apply_filters();
        self.focus_node.is_some()
    }

    pub fn reset_focus(&mut self) {
        if self.focus_node.take().is_none() {
            return;
        }
        self.apply_filters();
        self.canvas.fit(None, self.config.fit_padding);
    }

    /// Flips one edge kind in the allowlist. Returns whether it is now shown.
    pub fn toggle_edge_filter(&mut self, kind: EdgeKind) -> bool {
        let enabled = if self.edge_filters.remove(&kind) {
            false
        } else {
            self.edge_filters.insert(kind);
            true
        };
        self.apply_filters();
        enabled
    }

    pub fn set_edge_filters(&mut self, kinds: impl IntoIterator<Item = EdgeKind>) {
        self.edge_filters = kinds.into_iter().collect();
        self.apply_filters();
    }

    pub fn toggle_external_nodes(&mut self) -> bool {
        self.show_external = !self.show_external;
        self.apply_filters();
        self.show_external
    }

    pub fn set_show_external(&mut self, show: bool) {
        self.show_external = show;
        self.apply_filters();
    }

    pub fn set_guided(&mut self, guided: Option<GuidedFilter>) {
        self.guided = guided;
        self.apply_filters();
    }

    /// Takes effect on the next render.
    pub fn set_layout_mode(&mut self, mode: GraphLayoutMode) {
        self.layout_mode = mode;
    }

    pub fn set_manual_cluster_layout(&mut self, manual: bool) {
        self.manual_cluster_layout = manual;
    }

    fn manual_layout_active(&self) -> bool {
        self.layout_mode == GraphLayoutMode::Cluster && self.manual_cluster_layout
    }

    pub fn zoom_by(&mut self, factor: f64) {
        if !self.ready {
            return;
        }
        let level = self.canvas.zoom_level() * factor;
        self.set_zoom(level);
    }

    pub fn set_zoom(&mut self, level: f64) {
        if !self.ready {
            return;
        }
        self.canvas.set_zoom(self.config.clamp_zoom(level));
        self.refresh_emphasis();
    }

    pub fn fit_view(&mut self) {
        if self.ready {
            self.canvas.fit(None, self.config.fit_padding);
        }
    }

    /// Applies hover, zoom and drag events; taps are returned for the caller to interpret.
    pub fn handle_events(&mut self) -> Vec<String> {
        let mut taps = Vec::new();
        for event in self.canvas.drain_events() {
            match event {
                CanvasEvent::NodeTap { id } => taps.push(id),
                CanvasEvent::NodeHover { id } => self.hover(id.as_deref()),
                CanvasEvent::Zoomed { level } => {
                    let clamped = self.config.clamp_zoom(level);
                    if clamped != level {
                        self.canvas.set_zoom(clamped);
                    }
                    self.refresh_emphasis();
                }
                CanvasEvent::NodeDragged { id, position } => {
                    if !self.manual_layout_active() {
                        continue;
                    }
                    if let Some(key) = self.layout_key.clone() {
                        self.layout_memory
                            .remember(key, PositionMap::from([(id, position)]));
                    }
                }
            }
        }
        taps
    }

    pub fn tooltip_for(&self, id: &str) -> Option<Tooltip> {
        self.scene.node(id).map(|node| tooltip(&node.label))
    }

    pub fn visible_node_ids(&self) -> Vec<&str> {
        self.style.visible_node_ids()
    }

    pub fn visible_edge_ids(&self) -> Vec<&str> {
        self.style.visible_edge_ids()
    }

    pub fn is_ready(&self) -> bool {
        self.ready
    }

    pub fn canvas(&self) -> &C {
        &self.canvas
    }

    pub fn canvas_mut(&mut self) -> &mut C {
        &mut self.canvas
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn style(&self) -> &SceneStyle {
        &self.style
    }

    pub fn layout_mode(&self) -> GraphLayoutMode {
        self.layout_mode
    }

    pub fn manual_cluster_layout(&self) -> bool {
        self.manual_cluster_layout
    }

    pub fn layout_memory(&self) -> &LayoutMemory {
        &self.layout_memory
    }

    pub fn focus_node(&self) -> Option<&str> {
        self.focus_node.as_deref()
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn edge_filters(&self) -> &BTreeSet<EdgeKind> {
        &self.edge_filters
    }

    pub fn show_external(&self) -> bool {
        self.show_external
    }

    pub fn is_guided(&self) -> bool {
        self.guided.is_some()
    }

    /// Drops every element and all remembered state.
    pub fn teardown(&mut self) {
        self.canvas.clear();
        self.scene = SceneGraph::new();
        self.style = SceneStyle::default();
        self.layout_memory.clear();
        self.layout_key = None;
        self.focus_node = None;
        self.selected.clear();
        self.hovered = None;
        self.guided = None;
        self.ready = false;
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::canvas::HeadlessCanvas;
    use crate::layout::{LayoutName, Position};
    use gitreader_protocol::{Confidence, GraphEdge, SymbolNode};
    use pretty_assertions::assert_eq;

    fn node(id: &str, kind: NodeKind) -> SymbolNode {
        SymbolNode::new(id, id, kind)
    }

    fn edge(source: &str, target: &str, kind: EdgeKind) -> GraphEdge {
        GraphEdge::new(source, target, kind, Confidence::High)
    }

    fn key() -> LayoutKey {
        LayoutKey::new("full", "")
    }

    /// f calls g and h; g calls k; x is external and imported by f.
    fn fixture() -> GraphView {
        GraphView::identity(
            &[
                node("f", NodeKind::Function),
                node("g", NodeKind::Function),
                node("h", NodeKind::Function),
                node("k", NodeKind::Function),
                node("x", NodeKind::External),
            ],
            &[
                edge("f", "g", EdgeKind::Calls),
                edge("f", "h", EdgeKind::Calls),
                edge("g", "k", EdgeKind::Calls),
                edge("f", "x", EdgeKind::Imports),
                edge("f", "missing", EdgeKind::Calls),
            ],
        )
    }

    fn controller() -> GraphViewController<HeadlessCanvas> {
        GraphViewController::new(HeadlessCanvas::new(), ViewConfig::default())
    }

    fn sorted(ids: Vec<&str>) -> Vec<&str> {
        let mut ids = ids;
        ids.sort_unstable();
        ids
    }

    #[test]
    fn empty_view_shows_overlay() {
        let mut controller = controller();
        assert_eq!(controller.render(&GraphView::empty(), key()), RenderOutcome::Empty);
        assert_eq!(controller.canvas().overlay(), Some(EMPTY_GRAPH_MESSAGE));
        assert!(!controller.canvas().is_mounted());
    }

    #[test]
    fn unavailable_canvas_turns_operations_into_noops() {
        let mut controller =
            GraphViewController::new(HeadlessCanvas::unavailable(), ViewConfig::default());
        assert_eq!(controller.render(&fixture(), key()), RenderOutcome::Unavailable);
        assert_eq!(controller.canvas().overlay(), Some(CANVAS_UNAVAILABLE_MESSAGE));
        assert!(!controller.focus_on("f"));
        controller.toggle_external_nodes();
        assert!(controller.visible_node_ids().is_empty());
        controller.select(Some("f"));
        controller.hover(Some("g"));
        controller.set_zoom(2.0);
        controller.zoom_by(1.5);
        assert!(controller.canvas().selected().is_empty());
        assert!(controller.selected().is_empty());
        assert_eq!(controller.canvas().zoom_level(), 1.0);

        controller.canvas_mut().set_available(true);
        assert!(matches!(
            controller.render(&fixture(), key()),
            RenderOutcome::Rendered { nodes: 5, edges: 4 }
        ));
        assert_eq!(controller.canvas().overlay(), None);
    }

    #[test]
    fn filters_hide_externals_then_edge_kinds_then_dangling() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        assert_eq!(controller.visible_edge_ids().len(), 4);

        assert!(!controller.toggle_external_nodes());
        assert_eq!(sorted(controller.visible_node_ids()), vec!["f", "g", "h", "k"]);
        assert!(!controller.visible_edge_ids().contains(&"edge:f:x:imports:3"));

        assert!(!controller.toggle_edge_filter(EdgeKind::Calls));
        assert!(controller.visible_edge_ids().is_empty());
        assert!(controller.toggle_edge_filter(EdgeKind::Calls));
        assert_eq!(controller.visible_edge_ids().len(), 3);
    }

    #[test]
    fn focus_isolates_visible_neighborhood_and_resets() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.set_edge_filters([EdgeKind::Calls]);
        controller.select(Some("f"));
        assert!(controller.focus_on_selected());
        assert_eq!(sorted(controller.visible_node_ids()), vec!["f", "g", "h"]);
        let last_fit = controller.canvas().fits().last().cloned().unwrap();
        assert_eq!(
            last_fit.ids,
            Some(vec!["f".to_string(), "g".to_string(), "h".to_string()])
        );

        controller.reset_focus();
        assert_eq!(controller.focus_node(), None);
        assert_eq!(controller.visible_node_ids().len(), 5);
        assert_eq!(controller.canvas().fits().last().unwrap().ids, None);
    }

    #[test]
    fn focus_on_hidden_node_clears_silently() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.set_show_external(false);
        assert!(!controller.focus_on("x"));
        assert_eq!(controller.focus_node(), None);
        assert_eq!(controller.visible_node_ids().len(), 4);
    }

    #[test]
    fn focus_without_selection_prompts() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        assert!(!controller.focus_on_selected());
        assert_eq!(controller.canvas().overlay(), Some(SELECT_TO_FOCUS_MESSAGE));
    }

    #[test]
    fn selection_and_hover_mark_active_edges() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.select(Some("k"));
        controller.hover(Some("h"));
        let active: Vec<&str> = controller
            .style()
            .edges
            .iter()
            .filter(|(_, style)| style.has(StyleClass::IsActive))
            .map(|(id, _)| id.as_str())
            .collect();
        assert_eq!(active, vec!["edge:f:h:calls:1", "edge:g:k:calls:2"]);
        assert_eq!(controller.visible_edge_ids().len(), 4);
    }

    #[test]
    fn labels_follow_zoom_selection_and_tour() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.set_zoom(0.5);
        controller.select(Some("g"));
        let labelled = |controller: &GraphViewController<HeadlessCanvas>| -> Vec<String> {
            controller
                .style()
                .nodes
                .iter()
                .filter(|(_, style)| style.has(StyleClass::LabelVisible))
                .map(|(id, _)| id.clone())
                .collect()
        };
        assert_eq!(labelled(&controller), vec!["g".to_string()]);

        controller.set_guided(Some(GuidedFilter::new(["h".to_string()], None)));
        assert_eq!(labelled(&controller), vec!["g".to_string(), "h".to_string()]);

        controller.set_guided(None);
        controller.set_zoom(10.0);
        assert_eq!(controller.canvas().zoom_level(), 2.5);
        assert_eq!(labelled(&controller).len(), 5);
    }

    #[test]
    fn focus_is_suspended_during_tour() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.set_guided(Some(GuidedFilter::new(
            ["f".to_string(), "k".to_string()],
            Some("f".to_string()),
        )));
        controller.focus_on("f");
        assert_eq!(sorted(controller.visible_node_ids()), vec!["f", "k"]);
        assert!(controller.visible_edge_ids().is_empty());
    }

    #[test]
    fn selection_survives_rebuild_when_node_remains() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.select(Some("g"));
        controller.render(&fixture(), key());
        assert_eq!(controller.selected(), &["g".to_string()]);

        let smaller = GraphView::identity(&[node("f", NodeKind::Function)], &[]);
        controller.render(&smaller, key());
        assert!(controller.selected().is_empty());
    }

    #[test]
    fn layout_runs_depend_on_mode() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.set_layout_mode(GraphLayoutMode::Layer);
        controller.render(&fixture(), key());
        controller.set_layout_mode(GraphLayoutMode::Free);
        controller.render(&fixture(), key());
        assert_eq!(
            controller.canvas().layout_runs(),
            &[LayoutName::Cose, LayoutName::Breadthfirst]
        );
    }

    #[test]
    fn manual_cluster_layout_restores_dragged_positions() {
        let mut controller = controller();
        controller.set_manual_cluster_layout(true);
        let view = GraphView::identity(
            &[node("a", NodeKind::Function), node("b", NodeKind::Function)],
            &[],
        );
        controller.render(&view, key());
        assert!(controller.canvas().layout_runs().is_empty());

        controller.canvas_mut().drag("a", Position::new(40.0, -8.0));
        assert!(controller.handle_events().is_empty());
        controller.render(&view, key());
        assert_eq!(controller.canvas().position("a"), Some(Position::new(40.0, -8.0)));

        let other = LayoutKey::new("full", "cluster:folder:app");
        controller.render(&view, other.clone());
        assert_eq!(controller.canvas().position("a"), Some(Position::new(40.0, -8.0)));
        assert_eq!(controller.layout_memory().len(), 2);
    }

    #[test]
    fn taps_are_returned_and_tooltips_resolve() {
        let mut controller = controller();
        controller.render(&fixture(), key());
        controller.canvas_mut().tap("g");
        controller.canvas_mut().hover(Some("h"));
        assert_eq!(controller.handle_events(), vec!["g".to_string()]);
        assert!(controller
            .style()
            .node("h")
            .unwrap()
            .has(StyleClass::IsHovered));
        let tip = controller.tooltip_for("g").unwrap();
        assert_eq!(tip.title, "g");
        assert_eq!(tip.meta, "Function");
        assert!(controller.tooltip_for("missing").is_none());
    }
}
