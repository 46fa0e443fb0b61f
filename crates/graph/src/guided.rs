use crate::canvas::{SceneStyle, StyleClass};
use crate::scene::SceneGraph;
use gitreader_protocol::TourStep;
use std::collections::HashSet;

/// Visibility restriction supplied by the active tour step.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct GuidedFilter {
    allowed: HashSet<String>,
    focus: Option<String>,
}

impl GuidedFilter {
    pub fn new(allowed: impl IntoIterator<Item = String>, focus: Option<String>) -> Self {
        Self {
            allowed: allowed.into_iter().collect(),
            focus,
        }
    }

    /// An empty allowed list means the step only names its own node.
    pub fn from_step(step: &TourStep) -> Self {
        let mut allowed: HashSet<String> = step.allowed_node_ids.iter().cloned().collect();
        if allowed.is_empty() && !step.node_id.is_empty() {
            allowed.insert(step.node_id.clone());
        }
        Self {
            allowed,
            focus: step.focus_node_id().map(str::to_string),
        }
    }

    pub fn allows(&self, id: &str) -> bool {
        self.allowed.contains(id)
    }

    pub fn focus(&self) -> Option<&str> {
        self.focus.as_deref()
    }

    pub fn allowed(&self) -> &HashSet<String> {
        &self.allowed
    }
}

/// Hides everything outside the tour's allowed set; with no tour, only clears guided classes.
pub fn apply_guided_filter(scene: &SceneGraph, style: &mut SceneStyle, guided: Option<&GuidedFilter>) {
    let Some(guided) = guided else {
        for entry in style.nodes.values_mut().chain(style.edges.values_mut()) {
            entry.set(StyleClass::IsGuidedFocus, false);
            entry.set(StyleClass::IsGuidedHidden, false);
        }
        return;
    };

    for node in scene.nodes() {
        let entry = style.nodes.entry(node.id.clone()).or_default();
        let allowed = guided.allows(&node.id);
        if !allowed {
            entry.hidden = true;
        }
        entry.set(StyleClass::IsGuidedHidden, !allowed);
        entry.set(StyleClass::IsGuidedFocus, guided.focus() == Some(node.id.as_str()));
    }
    for edge in scene.edges() {
        let entry = style.edges.entry(edge.id.clone()).or_default();
        let allowed = guided.allows(&edge.source) && guided.allows(&edge.target);
        if !allowed {
            entry.hidden = true;
        }
        entry.set(StyleClass::IsGuidedHidden, !allowed);
    }
}
