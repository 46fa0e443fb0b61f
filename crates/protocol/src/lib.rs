use anyhow::{anyhow, Result};
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

pub mod paths;

/// Scope name used when a chapter does not narrow the graph.
pub const FULL_SCOPE: &str = "full";

/// Prefix of synthetic folder ids produced by the cluster view.
pub const FOLDER_CLUSTER_PREFIX: &str = "cluster:folder:";

/// Canonical symbol kinds used for graph rendering, filters, and reader behavior.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum NodeKind {
    File,
    Folder,
    Class,
    Function,
    Method,
    Blueprint,
    External,
}

impl NodeKind {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::File => "file",
            Self::Folder => "folder",
            Self::Class => "class",
            Self::Function => "function",
            Self::Method => "method",
            Self::Blueprint => "blueprint",
            Self::External => "external",
        }
    }
}

/// Relationship types used by the graph to color edges and power filters.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum EdgeKind {
    Imports,
    Calls,
    Inherits,
    Contains,
    Blueprint,
}

impl EdgeKind {
    pub const ALL: [EdgeKind; 5] = [
        EdgeKind::Calls,
        EdgeKind::Imports,
        EdgeKind::Inherits,
        EdgeKind::Contains,
        EdgeKind::Blueprint,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            Self::Imports => "imports",
            Self::Calls => "calls",
            Self::Inherits => "inherits",
            Self::Contains => "contains",
            Self::Blueprint => "blueprint",
        }
    }
}

impl FromStr for EdgeKind {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "imports" => Ok(Self::Imports),
            "calls" => Ok(Self::Calls),
            "inherits" => Ok(Self::Inherits),
            "contains" => Ok(Self::Contains),
            "blueprint" => Ok(Self::Blueprint),
            other => Err(anyhow!("unknown edge kind '{other}'")),
        }
    }
}

/// Analysis certainty attached to edges. Variant order is the merge order.
#[derive(
    Debug, Serialize, Deserialize, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, JsonSchema,
)]
#[serde(rename_all = "snake_case")]
pub enum Confidence {
    Low,
    Medium,
    High,
}

/// Source span shared across snippets and symbol metadata.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct SourceLocation {
    pub path: String,
    #[serde(default)]
    pub start_line: u32,
    #[serde(default)]
    pub end_line: u32,
    #[serde(default)]
    pub start_col: u32,
    #[serde(default)]
    pub end_col: u32,
}

impl SourceLocation {
    pub fn for_path(path: impl Into<String>) -> Self {
        Self {
            path: path.into(),
            ..Self::default()
        }
    }
}

/// Graph node payload used by canvas rendering and reader selection.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct SymbolNode {
    pub id: String,
    pub name: String,
    pub kind: NodeKind,
    #[serde(default)]
    pub summary: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub signature: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub docstring: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub location: Option<SourceLocation>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub module: Option<String>,
}

impl SymbolNode {
    pub fn new(id: impl Into<String>, name: impl Into<String>, kind: NodeKind) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            kind,
            summary: String::new(),
            signature: None,
            docstring: None,
            location: None,
            module: None,
        }
    }

    pub fn with_path(mut self, path: impl Into<String>) -> Self {
        self.location = Some(SourceLocation::for_path(path));
        self
    }

    /// Raw location path, if the node has a non-empty one.
    pub fn path(&self) -> Option<&str> {
        self.location
            .as_ref()
            .map(|loc| loc.path.as_str())
            .filter(|path| !path.is_empty())
    }

    pub fn is_folder_cluster(&self) -> bool {
        self.kind == NodeKind::Folder && self.id.starts_with(FOLDER_CLUSTER_PREFIX)
    }
}

/// Graph edge payload used to render relationships in the canvas.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, Hash, JsonSchema)]
pub struct GraphEdge {
    pub source: String,
    pub target: String,
    pub kind: EdgeKind,
    pub confidence: Confidence,
}

impl GraphEdge {
    pub fn new(
        source: impl Into<String>,
        target: impl Into<String>,
        kind: EdgeKind,
        confidence: Confidence,
    ) -> Self {
        Self {
            source: source.into(),
            target: target.into(),
            kind,
            confidence,
        }
    }
}

/// Backend warning surfaced for partial parses or skipped files.
#[derive(Debug, Serialize, Deserialize, Clone, PartialEq, Eq, JsonSchema)]
pub struct ApiWarning {
    pub code: String,
    pub message: String,
    #[serde(default)]
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub line: Option<u32>,
}

/// Per-scope response of the analysis service.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, JsonSchema)]
pub struct GraphPayload {
    #[serde(default)]
    pub nodes: Vec<SymbolNode>,
    #[serde(default)]
    pub edges: Vec<GraphEdge>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub scope: Option<String>,
    #[serde(default, skip_serializing_if = "BTreeMap::is_empty")]
    pub stats: BTreeMap<String, f64>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<ApiWarning>,
}

impl GraphPayload {
    pub fn new(nodes: Vec<SymbolNode>, edges: Vec<GraphEdge>) -> Self {
        Self {
            nodes,
            edges,
            ..Self::default()
        }
    }

    pub fn from_json(raw: &[u8]) -> Result<Self> {
        serde_json::from_slice(raw).map_err(Into::into)
    }
}

/// Focus target for a tour step, used to sync reader and canvas highlights.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct TourFocus {
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub node_id: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_path: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub start_line: Option<u32>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub end_line: Option<u32>,
}

/// The graph-facing part of a guided tour step.
#[derive(Debug, Serialize, Deserialize, Clone, Default, PartialEq, Eq, JsonSchema)]
pub struct TourStep {
    pub step_index: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_steps: Option<u32>,
    pub node_id: String,
    #[serde(default)]
    pub allowed_node_ids: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub focus: Option<TourFocus>,
}

impl TourStep {
    /// Node that receives the guided focus class: the explicit focus, else the step node.
    pub fn focus_node_id(&self) -> Option<&str> {
        self.focus
            .as_ref()
            .and_then(|focus| focus.node_id.as_deref())
            .or(Some(self.node_id.as_str()))
            .filter(|id| !id.is_empty())
    }
}

/// Canvas layout modes used by graph controls and persisted preferences.
#[derive(Debug, Serialize, Deserialize, Clone, Copy, Default, PartialEq, Eq, Hash, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GraphLayoutMode {
    #[default]
    Cluster,
    Layer,
    Free,
}

impl GraphLayoutMode {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Cluster => "cluster",
            Self::Layer => "layer",
            Self::Free => "free",
        }
    }
}

impl fmt::Display for GraphLayoutMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for GraphLayoutMode {
    type Err = anyhow::Error;

    fn from_str(raw: &str) -> Result<Self> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "cluster" => Ok(Self::Cluster),
            "layer" => Ok(Self::Layer),
            "free" => Ok(Self::Free),
            other => Err(anyhow!(
                "unknown layout mode '{other}' (expected cluster|layer|free)"
            )),
        }
    }
}

pub fn serialize_json<T: Serialize>(value: &T) -> Result<String> {
    serde_json::to_string(value).map_err(Into::into)
}

/// JSON Schema of the per-scope payload the analysis service must return.
pub fn payload_schema() -> Result<serde_json::Value> {
    serde_json::to_value(schemars::schema_for!(GraphPayload)).map_err(Into::into)
}
