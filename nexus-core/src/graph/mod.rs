//! Input graph model.
//!
//! A `GraphSnapshot` is the immutable `{nodes, edges}` pair every layout consumes. Aliased key names
//! from the data layer are resolved once in [`ingest`]; everything downstream reads canonical fields.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use crate::error::{DiagnosticKind, Diagnostics};

pub mod adjacency;
pub mod ingest;

/// Scalar attribute value carried through from the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum AttrValue {
    Bool(bool),
    Number(f64),
    Text(String),
}

impl AttrValue {
    /// Display form, numbers without a trailing `.0` when integral.
    pub fn as_text(&self) -> String {
        match self {
            AttrValue::Text(s) => s.clone(),
            AttrValue::Number(n) if n.fract() == 0.0 && n.abs() < 1e15 => format!("{}", *n as i64),
            AttrValue::Number(n) => n.to_string(),
            AttrValue::Bool(b) => b.to_string(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphNode {
    pub id: String,
    #[serde(rename = "type")]
    pub node_type: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub date: Option<String>,
    #[serde(default, skip_serializing_if = "IndexMap::is_empty")]
    pub attrs: IndexMap<String, AttrValue>,
}

impl GraphNode {
    pub fn new(id: impl Into<String>, node_type: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            node_type: node_type.into(),
            name: name.into(),
            date: None,
            attrs: IndexMap::new(),
        }
    }

    pub fn with_date(mut self, date: impl Into<String>) -> Self {
        self.date = Some(date.into());
        self
    }

    pub fn with_attr(mut self, key: impl Into<String>, value: AttrValue) -> Self {
        self.attrs.insert(key.into(), value);
        self
    }

    /// Attribute as display text; empty strings count as absent.
    pub fn attr_text(&self, key: &str) -> Option<String> {
        self.attrs
            .get(key)
            .map(AttrValue::as_text)
            .filter(|s| !s.trim().is_empty())
    }

    pub fn is_type(&self, ty: &str) -> bool {
        self.node_type.eq_ignore_ascii_case(ty)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct GraphEdge {
    pub source_id: String,
    pub target_id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
}

impl GraphEdge {
    pub fn new(source_id: impl Into<String>, target_id: impl Into<String>) -> Self {
        Self { source_id: source_id.into(), target_id: target_id.into(), label: None }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }
}

/// Validated snapshot: unique node ids, every edge resolves.
#[derive(Debug, Clone, Default)]
pub struct GraphSnapshot {
    nodes: Vec<GraphNode>,
    edges: Vec<GraphEdge>,
    index: HashMap<String, usize>,
}

impl GraphSnapshot {
    /// Build a snapshot, dropping duplicate nodes (first wins) and edges whose endpoints are unknown.
    pub fn new(nodes: Vec<GraphNode>, edges: Vec<GraphEdge>, diag: &mut Diagnostics) -> Self {
        let mut index = HashMap::with_capacity(nodes.len());
        let mut kept = Vec::with_capacity(nodes.len());
        for node in nodes {
            if index.contains_key(&node.id) {
                diag.report(DiagnosticKind::MalformedItem, node.id.clone(), "duplicate node id, keeping the first");
                continue;
            }
            index.insert(node.id.clone(), kept.len());
            kept.push(node);
        }

        let edges = edges
            .into_iter()
            .filter(|e| {
                let missing = [&e.source_id, &e.target_id]
                    .into_iter()
                    .find(|id| !index.contains_key(id.as_str()));
                match missing {
                    Some(id) => {
                        diag.report(
                            DiagnosticKind::DanglingReference,
                            format!("{}->{}", e.source_id, e.target_id),
                            format!("edge endpoint `{id}` is not in the node set"),
                        );
                        false
                    }
                    None => true,
                }
            })
            .collect();

        Self { nodes: kept, edges, index }
    }

    pub fn empty() -> Self {
        Self::default()
    }

    pub fn nodes(&self) -> &[GraphNode] {
        &self.nodes
    }

    pub fn edges(&self) -> &[GraphEdge] {
        &self.edges
    }

    pub fn node(&self, id: &str) -> Option<&GraphNode> {
        self.index.get(id).map(|&i| &self.nodes[i])
    }

    /// Position of the node in input order.
    pub fn position(&self, id: &str) -> Option<usize> {
        self.index.get(id).copied()
    }

    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_snapshot_drops_dangling_and_duplicates() {
        let mut diag = Diagnostics::new();
        let snap = GraphSnapshot::new(
            vec![
                GraphNode::new("a", "Entity", "A"),
                GraphNode::new("b", "Entity", "B"),
                GraphNode::new("a", "Entity", "A again"),
            ],
            vec![GraphEdge::new("a", "b"), GraphEdge::new("a", "ghost")],
            &mut diag,
        );

        assert_eq!(snap.nodes().len(), 2);
        assert_eq!(snap.node("a").map(|n| n.name.as_str()), Some("A"));
        assert_eq!(snap.edges().len(), 1);
        assert_eq!(diag.count(DiagnosticKind::MalformedItem), 1);
        assert_eq!(diag.count(DiagnosticKind::DanglingReference), 1);
    }

    #[test]
    fn test_attr_text() {
        let node = GraphNode::new("n", "Amount", "$100")
            .with_attr("amount", AttrValue::Number(100.0))
            .with_attr("blank", AttrValue::Text("  ".into()));
        assert_eq!(node.attr_text("amount").as_deref(), Some("100"));
        assert_eq!(node.attr_text("blank"), None);
        assert_eq!(node.attr_text("missing"), None);
        assert!(node.is_type("amount"));
    }
}
