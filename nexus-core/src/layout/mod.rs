// Layout output model shared by the four algorithms.
//
// Every algorithm consumes caller-owned input by reference, copies what it needs into its own
// working records, and hands back a `LayoutResult`:
// - `Empty` when there is nothing to place (the renderer shows its empty state)
// - `Ready` with positioned nodes, edge paths and a padded viewport, built in one go by `finish`
//
// Submodules:
// - force: iterative simulation for neighbors/subgraph views
// - spatial_grid: circle buckets for the force collision pass
// - column_flow: source -> middle -> target columns
// - radial_cluster: two-circle membership diagram
// - timeline: date rail with anchor cards and satellites

use std::collections::HashSet;

use indexmap::IndexMap;
use serde::Serialize;

use crate::geometry::{BoundsAccumulator, Cubic, Point, Rect};

pub mod column_flow;
pub mod force;
pub mod radial_cluster;
pub mod spatial_grid;
pub mod timeline;

pub use force::ViewTransform;

/// Role tag used by the renderer for styling.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum NodeKind {
    Focus,
    Neighbor,
    Source,
    Middle,
    Target,
    ClusterCircle,
    ClusterTitle,
    Overlap,
    ExclusiveA,
    ExclusiveB,
    Placeholder,
    Rail,
    DatePill,
    Anchor,
    Satellite,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutNode {
    pub id: String,
    #[serde(flatten)]
    pub rect: Rect,
    pub kind: NodeKind,
    pub label: String,
    /// Category of the underlying graph node, when there is one.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub node_type: Option<String>,
}

impl LayoutNode {
    pub fn new(id: impl Into<String>, rect: Rect, kind: NodeKind, label: impl Into<String>) -> Self {
        Self { id: id.into(), rect, kind, label: label.into(), node_type: None }
    }

    pub fn with_type(mut self, node_type: impl Into<String>) -> Self {
        self.node_type = Some(node_type.into());
        self
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "type", rename_all = "camelCase")]
pub enum EdgePath {
    Cubic(Cubic),
    Polyline { points: Vec<Point> },
}

impl EdgePath {
    pub fn line(from: Point, to: Point) -> Self {
        EdgePath::Polyline { points: vec![from, to] }
    }

    /// SVG path data.
    pub fn to_svg(&self) -> String {
        match self {
            EdgePath::Cubic(c) => c.to_svg(),
            EdgePath::Polyline { points } => points
                .iter()
                .enumerate()
                .map(|(i, p)| format!("{}{} {}", if i == 0 { 'M' } else { 'L' }, p.x, p.y))
                .collect(),
        }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum EdgeStyle {
    Link,
    Funding,
    Action,
    Connection,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutEdge {
    pub source_id: String,
    pub target_id: String,
    pub path: EdgePath,
    pub style: EdgeStyle,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

/// A fully built layout.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct Layout {
    pub nodes: Vec<LayoutNode>,
    pub edges: Vec<LayoutEdge>,
    pub viewport: Rect,
    /// Fit-to-canvas transform (force layouts only).
    #[serde(skip_serializing_if = "Option::is_none")]
    pub transform: Option<ViewTransform>,
    /// Working-set node count per type, in first-seen order (force layouts only).
    #[serde(skip_serializing_if = "IndexMap::is_empty")]
    pub type_counts: IndexMap<String, usize>,
}

impl Layout {
    pub fn node(&self, id: &str) -> Option<&LayoutNode> {
        self.nodes.iter().find(|n| n.id == id)
    }

    pub fn nodes_of(&self, kind: NodeKind) -> impl Iterator<Item = &LayoutNode> {
        self.nodes.iter().filter(move |n| n.kind == kind)
    }

    pub fn edges_of(&self, style: EdgeStyle) -> impl Iterator<Item = &LayoutEdge> {
        self.edges.iter().filter(move |e| e.style == style)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(tag = "status", rename_all = "camelCase")]
pub enum LayoutResult {
    Empty,
    Ready(Layout),
}

impl LayoutResult {
    pub fn is_empty(&self) -> bool {
        matches!(self, LayoutResult::Empty)
    }

    pub fn layout(&self) -> Option<&Layout> {
        match self {
            LayoutResult::Ready(layout) => Some(layout),
            LayoutResult::Empty => None,
        }
    }

    pub fn into_layout(self) -> Option<Layout> {
        match self {
            LayoutResult::Ready(layout) => Some(layout),
            LayoutResult::Empty => None,
        }
    }
}

/// Assemble a result: viewport is the union of node rects grown by `padding`.
pub fn finish(nodes: Vec<LayoutNode>, edges: Vec<LayoutEdge>, padding: f64) -> LayoutResult {
    finish_within(nodes, edges, padding, 0.0)
}

/// Like [`finish`], but the viewport is at least `min_width` wide, content centered horizontally.
pub fn finish_within(nodes: Vec<LayoutNode>, edges: Vec<LayoutEdge>, padding: f64, min_width: f64) -> LayoutResult {
    let mut acc = BoundsAccumulator::new();
    for n in &nodes {
        acc.add(n.rect);
    }
    let Some(bounds) = acc.finish() else {
        return LayoutResult::Empty;
    };

    let mut viewport = bounds.expand(padding);
    if viewport.w < min_width {
        viewport.x = bounds.center().x - min_width / 2.0;
        viewport.w = min_width;
    }

    // An edge must never reference a node that is not in the result.
    let ids: HashSet<&str> = nodes.iter().map(|n| n.id.as_str()).collect();
    let before = edges.len();
    let edges: Vec<LayoutEdge> = edges
        .into_iter()
        .filter(|e| ids.contains(e.source_id.as_str()) && ids.contains(e.target_id.as_str()))
        .collect();
    if edges.len() != before {
        tracing::debug!(dropped = before - edges.len(), "edges without placed endpoints removed");
    }

    LayoutResult::Ready(Layout { nodes, edges, viewport, transform: None, type_counts: IndexMap::new() })
}
