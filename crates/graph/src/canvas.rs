//! Rendering seam between the view controller and a drawing backend.
//!
//! The controller only talks to [`CanvasAdapter`]; [`HeadlessCanvas`] is the
//! in-memory backend used by the CLI and by tests.

use crate::layout::{LayoutName, LayoutOptions, Position, PositionMap};
use crate::scene::{CanvasEdge, CanvasNode, SceneGraph};
use serde::Serialize;
use std::collections::{BTreeMap, BTreeSet, HashMap, VecDeque};
use thiserror::Error;

#[derive(Debug, Clone, Copy, Error, PartialEq, Eq)]
#[error("graph library not loaded")]
pub struct CanvasUnavailable;

/// Visual classes the controller toggles on elements.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum StyleClass {
    LabelVisible,
    IsSelected,
    IsHovered,
    IsActive,
    IsGuidedFocus,
    IsGuidedHidden,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct ElementStyle {
    pub hidden: bool,
    pub classes: BTreeSet<StyleClass>,
}

impl ElementStyle {
    pub fn has(&self, class: StyleClass) -> bool {
        self.classes.contains(&class)
    }

    pub fn set(&mut self, class: StyleClass, on: bool) {
        if on {
            self.classes.insert(class);
        } else {
            self.classes.remove(&class);
        }
    }
}

/// Full style state pushed to the backend after every filter pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct SceneStyle {
    pub nodes: BTreeMap<String, ElementStyle>,
    pub edges: BTreeMap<String, ElementStyle>,
}

impl SceneStyle {
    pub fn node(&self, id: &str) -> Option<&ElementStyle> {
        self.nodes.get(id)
    }

    pub fn edge(&self, id: &str) -> Option<&ElementStyle> {
        self.edges.get(id)
    }

    pub fn visible_node_ids(&self) -> Vec<&str> {
        visible(&self.nodes)
    }

    pub fn visible_edge_ids(&self) -> Vec<&str> {
        visible(&self.edges)
    }
}

fn visible(styles: &BTreeMap<String, ElementStyle>) -> Vec<&str> {
    styles
        .iter()
        .filter(|(_, style)| !style.hidden)
        .map(|(id, _)| id.as_str())
        .collect()
}

/// User input reported by the backend.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum CanvasEvent {
    NodeTap { id: String },
    NodeHover { id: Option<String> },
    NodeDragged { id: String, position: Position },
    Zoomed { level: f64 },
}

pub trait CanvasAdapter {
    /// Creates the drawing surface; called lazily before the first non-empty render.
    fn mount(&mut self) -> Result<(), CanvasUnavailable>;
    fn is_mounted(&self) -> bool;
    /// Replaces every element on the surface.
    fn render(&mut self, nodes: &[CanvasNode], edges: &[CanvasEdge]);
    fn clear(&mut self);
    fn set_overlay(&mut self, message: Option<&str>);
    fn node_positions(&self) -> PositionMap;
    fn run_layout(&mut self, options: &LayoutOptions);
    fn apply_style(&mut self, style: &SceneStyle);
    fn set_selected(&mut self, ids: &[String]);
    /// Frames `ids`, or every visible element when `None`.
    fn fit(&mut self, ids: Option<&[String]>, padding: f64);
    fn zoom_level(&self) -> f64;
    fn set_zoom(&mut self, level: f64);
    fn drain_events(&mut self) -> Vec<CanvasEvent>;
}

const GRID_SPACING: f64 = 120.0;

/// One camera fit request.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FitRecord {
    pub ids: Option<Vec<String>>,
    pub padding: f64,
}

pub struct HeadlessCanvas {
    available: bool,
    mounted: bool,
    scene: SceneGraph,
    positions: PositionMap,
    overlay: Option<String>,
    style: SceneStyle,
    selected: Vec<String>,
    zoom: f64,
    layout_runs: Vec<LayoutName>,
    fits: Vec<FitRecord>,
    events: VecDeque<CanvasEvent>,
}

impl Default for HeadlessCanvas {
    fn default() -> Self {
        Self::new()
    }
}

impl HeadlessCanvas {
    pub fn new() -> Self {
        Self {
            available: true,
            mounted: false,
            scene: SceneGraph::new(),
            positions: PositionMap::new(),
            overlay: None,
            style: SceneStyle::default(),
            selected: Vec::new(),
            zoom: 1.0,
            layout_runs: Vec::new(),
            fits: Vec::new(),
            events: VecDeque::new(),
        }
    }

    /// A canvas whose backend failed to load.
    pub fn unavailable() -> Self {
        Self {
            available: false,
            ..Self::new()
        }
    }

    pub fn set_available(&mut self, available: bool) {
        self.available = available;
    }

    pub fn overlay(&self) -> Option<&str> {
        self.overlay.as_deref()
    }

    pub fn scene(&self) -> &SceneGraph {
        &self.scene
    }

    pub fn style(&self) -> &SceneStyle {
        &self.style
    }

    pub fn selected(&self) -> &[String] {
        &self.selected
    }

    pub fn layout_runs(&self) -> &[LayoutName] {
        &self.layout_runs
    }

    pub fn fits(&self) -> &[FitRecord] {
        &self.fits
    }

    pub fn position(&self, id: &str) -> Option<Position> {
        self.positions.get(id).copied()
    }

    /// Queues a tap as if the user clicked `id`.
    pub fn tap(&mut self, id: &str) {
        self.events.push_back(CanvasEvent::NodeTap { id: id.to_string() });
    }

    pub fn hover(&mut self, id: Option<&str>) {
        self.events.push_back(CanvasEvent::NodeHover {
            id: id.map(str::to_string),
        });
    }

    /// Moves `id` and queues the drag event.
    pub fn drag(&mut self, id: &str, position: Position) {
        if !self.scene.contains(id) {
            return;
        }
        self.positions.insert(id.to_string(), position);
        self.events.push_back(CanvasEvent::NodeDragged {
            id: id.to_string(),
            position,
        });
    }

    pub fn zoom_by_user(&mut self, level: f64) {
        self.zoom = level;
        self.events.push_back(CanvasEvent::Zoomed { level });
    }

    fn grid_layout(&mut self, spacing: f64) {
        let count = self.scene.node_count();
        let columns = (count as f64).sqrt().ceil().max(1.0) as usize;
        for (index, node) in self.scene.nodes().enumerate() {
            let position = Position::new(
                (index % columns) as f64 * spacing,
                (index / columns) as f64 * spacing,
            );
            self.positions.insert(node.id.clone(), position);
        }
    }

    fn layered_layout(&mut self, spacing: f64) {
        let depths = self.scene.depths();
        let mut per_row: HashMap<usize, usize> = HashMap::new();
        for idx in self.scene.graph.node_indices() {
            let depth = depths.get(&idx).copied().unwrap_or(0);
            let column = per_row.entry(depth).or_default();
            let node = &self.scene.graph[idx];
            self.positions.insert(
                node.id.clone(),
                Position::new(*column as f64 * spacing, depth as f64 * spacing),
            );
            *column += 1;
        }
    }
}

impl CanvasAdapter for HeadlessCanvas {
    fn mount(&mut self) -> Result<(), CanvasUnavailable> {
        if !self.available {
            return Err(CanvasUnavailable);
        }
        self.mounted = true;
        Ok(())
    }

    fn is_mounted(&self) -> bool {
        self.mounted
    }

    fn render(&mut self, nodes: &[CanvasNode], edges: &[CanvasEdge]) {
        self.scene = SceneGraph::from_elements(nodes, edges);
        self.positions = nodes
            .iter()
            .filter_map(|node| node.position.map(|position| (node.id.clone(), position)))
            .collect();
        self.style = SceneStyle::default();
    }

    fn clear(&mut self) {
        self.scene = SceneGraph::new();
        self.positions.clear();
        self.style = SceneStyle::default();
        self.selected.clear();
    }

    fn set_overlay(&mut self, message: Option<&str>) {
        self.overlay = message.map(str::to_string);
    }

    fn node_positions(&self) -> PositionMap {
        self.positions.clone()
    }

    fn run_layout(&mut self, options: &LayoutOptions) {
        let spacing = GRID_SPACING * options.spacing_factor;
        match options.name {
            LayoutName::Cose => self.grid_layout(spacing),
            LayoutName::Breadthfirst => self.layered_layout(spacing),
            LayoutName::Preset => {}
        }
        self.layout_runs.push(options.name);
        if options.fit {
            self.fit(None, options.padding);
        }
    }

    fn apply_style(&mut self, style: &SceneStyle) {
        self.style = style.clone();
    }

    fn set_selected(&mut self, ids: &[String]) {
        self.selected = ids
            .iter()
            .filter(|id| self.scene.contains(id))
            .cloned()
            .collect();
    }

    fn fit(&mut self, ids: Option<&[String]>, padding: f64) {
        self.fits.push(FitRecord {
            ids: ids.map(<[String]>::to_vec),
            padding,
        });
    }

    fn zoom_level(&self) -> f64 {
        self.zoom
    }

    fn set_zoom(&mut self, level: f64) {
        self.zoom = level;
    }

    fn drain_events(&mut self) -> Vec<CanvasEvent> {
        self.events.drain(..).collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::labels::format_node_label;
    use gitreader_protocol::{Confidence, EdgeKind, NodeKind, SymbolNode};

    fn element(id: &str) -> CanvasNode {
        let symbol = SymbolNode::new(id, id, NodeKind::Function);
        CanvasNode {
            id: id.to_string(),
            kind: NodeKind::Function,
            label: format_node_label(&symbol, 18),
            summary: String::new(),
            position: None,
        }
    }

    fn link(source: &str, target: &str) -> CanvasEdge {
        CanvasEdge {
            id: format!("edge:{source}:{target}:calls:0"),
            source: source.into(),
            target: target.into(),
            kind: EdgeKind::Calls,
            confidence: Confidence::Medium,
        }
    }

    #[test]
    fn unavailable_canvas_refuses_to_mount() {
        let mut canvas = HeadlessCanvas::unavailable();
        assert_eq!(canvas.mount(), Err(CanvasUnavailable));
        assert!(!canvas.is_mounted());
        canvas.set_available(true);
        assert!(canvas.mount().is_ok());
    }

    #[test]
    fn layered_layout_puts_targets_below_sources() {
        let mut canvas = HeadlessCanvas::new();
        canvas.render(
            &[element("a"), element("b"), element("c")],
            &[link("a", "b"), link("a", "c")],
        );
        canvas.run_layout(&LayoutOptions::layered());
        let a = canvas.position("a").unwrap();
        let b = canvas.position("b").unwrap();
        let c = canvas.position("c").unwrap();
        assert!(b.y > a.y);
        assert_eq!(b.y, c.y);
        assert_ne!(b.x, c.x);
        assert_eq!(canvas.layout_runs(), &[LayoutName::Breadthfirst]);
        assert_eq!(canvas.fits().len(), 1);
    }

    #[test]
    fn preset_keeps_given_positions() {
        let mut canvas = HeadlessCanvas::new();
        let mut node = element("a");
        node.position = Some(Position::new(7.0, 3.0));
        canvas.render(&[node, element("b")], &[]);
        canvas.run_layout(&LayoutOptions::preset());
        assert_eq!(canvas.position("a"), Some(Position::new(7.0, 3.0)));
        assert_eq!(canvas.position("b"), None);
    }

    #[test]
    fn drag_is_reported_once() {
        let mut canvas = HeadlessCanvas::new();
        canvas.render(&[element("a")], &[]);
        canvas.drag("a", Position::new(1.0, 2.0));
        canvas.drag("ghost", Position::ORIGIN);
        let events = canvas.drain_events();
        assert_eq!(events.len(), 1);
        assert!(canvas.drain_events().is_empty());
        assert_eq!(canvas.node_positions()["a"], Position::new(1.0, 2.0));
    }
}
