//! JSON ingestion with alias-tolerant key resolution.
//!
//! The data layer hands over loosely shaped records (graph database rows, search hits, d3 link
//! objects whose endpoints were replaced by node objects). Aliases are resolved here, once, into
//! the canonical [`GraphNode`]/[`GraphEdge`] fields.
//!
//! Accepted aliases, first match wins:
//!
//! | field | keys |
//! |---|---|
//! | node id | `id`, `gid`, `elementId`, `element_id` |
//! | node type | `node_type`, `type`, first of `labels` |
//! | node name | `name`, `label`, `title`, `Entity Name`, `entity_name`, `relationship_name`, `Relationship NAME`, `summary`, `Summary` |
//! | edge source | `sourceId`, `source`, `from_gid`, `source_gid` |
//! | edge target | `targetId`, `target`, `to_gid`, `target_gid` |
//! | edge label | `label`, `relationship_type`, `relationship_name`, `type`, `relationship_summary`, `summary` |

use indexmap::IndexMap;
use serde_json::{Map, Value};

use crate::error::{DiagnosticKind, Diagnostics, LayoutError, Result};
use crate::graph::{AttrValue, GraphEdge, GraphNode, GraphSnapshot};

const NODE_ID_KEYS: &[&str] = &["id", "gid", "elementId", "element_id"];
const NODE_TYPE_KEYS: &[&str] = &["node_type", "type"];
const NODE_NAME_KEYS: &[&str] = &[
    "name",
    "label",
    "title",
    "Entity Name",
    "entity_name",
    "relationship_name",
    "Relationship NAME",
    "summary",
    "Summary",
];
const EDGE_SOURCE_KEYS: &[&str] = &["sourceId", "source", "from_gid", "source_gid"];
const EDGE_TARGET_KEYS: &[&str] = &["targetId", "target", "to_gid", "target_gid"];
const EDGE_LABEL_KEYS: &[&str] = &[
    "label",
    "relationship_type",
    "relationship_name",
    "type",
    "relationship_summary",
    "summary",
];

/// Parse a `{nodes, links|edges}` document into a validated snapshot.
///
/// `null` yields an empty snapshot. Anything other than an object, or a present `nodes`/`links`
/// field that is not an array, is a contract violation.
pub fn snapshot_from_json(value: &Value, diag: &mut Diagnostics) -> Result<GraphSnapshot> {
    let obj = match value {
        Value::Null => return Ok(GraphSnapshot::empty()),
        Value::Object(obj) => obj,
        _ => return Err(LayoutError::NotACollection { field: "snapshot".to_string() }),
    };

    let nodes = match obj.get("nodes") {
        Some(v) => nodes_from_json(v, "nodes", diag)?,
        None => Vec::new(),
    };
    let edges = match (obj.get("links"), obj.get("edges")) {
        (Some(v), _) => edges_from_json(v, "links", diag)?,
        (None, Some(v)) => edges_from_json(v, "edges", diag)?,
        (None, None) => Vec::new(),
    };

    let snapshot = GraphSnapshot::new(nodes, edges, diag);
    tracing::debug!(nodes = snapshot.nodes().len(), edges = snapshot.edges().len(), "snapshot ingested");
    Ok(snapshot)
}

/// Parse an array of node records. `field` names the array in errors and diagnostics.
pub fn nodes_from_json(value: &Value, field: &str, diag: &mut Diagnostics) -> Result<Vec<GraphNode>> {
    let items = as_array(value, field)?;
    let mut nodes = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        match item {
            Value::Object(obj) => nodes.push(node_from_object(obj, i, field, diag)),
            _ => diag.report(
                DiagnosticKind::MalformedItem,
                format!("{field}[{i}]"),
                "node record is not an object",
            ),
        }
    }
    Ok(nodes)
}

/// Parse an array of edge records, skipping (and reporting) those without both endpoints.
pub fn edges_from_json(value: &Value, field: &str, diag: &mut Diagnostics) -> Result<Vec<GraphEdge>> {
    let items = as_array(value, field)?;
    let mut edges = Vec::with_capacity(items.len());
    for (i, item) in items.iter().enumerate() {
        let Value::Object(obj) = item else {
            diag.report(DiagnosticKind::MalformedItem, format!("{field}[{i}]"), "edge record is not an object");
            continue;
        };
        let source = first_endpoint(obj, EDGE_SOURCE_KEYS);
        let target = first_endpoint(obj, EDGE_TARGET_KEYS);
        match (source, target) {
            (Some(source_id), Some(target_id)) => edges.push(GraphEdge {
                source_id,
                target_id,
                label: first_text(obj, EDGE_LABEL_KEYS).map(|(_, s)| s),
            }),
            _ => diag.report(
                DiagnosticKind::MalformedItem,
                format!("{field}[{i}]"),
                "edge is missing a source or target id",
            ),
        }
    }
    Ok(edges)
}

fn as_array<'a>(value: &'a Value, field: &str) -> Result<&'a [Value]> {
    match value {
        Value::Array(items) => Ok(items.as_slice()),
        Value::Null => Ok(&[][..]),
        _ => Err(LayoutError::NotACollection { field: field.to_string() }),
    }
}

fn node_from_object(obj: &Map<String, Value>, index: usize, field: &str, diag: &mut Diagnostics) -> GraphNode {
    let (id_key, id) = match first_text(obj, NODE_ID_KEYS) {
        Some(found) => found,
        None => {
            let id = format!("node-{index}");
            diag.report(
                DiagnosticKind::MalformedItem,
                format!("{field}[{index}]"),
                format!("node has no id, using `{id}`"),
            );
            ("", id)
        }
    };

    let (type_key, node_type) = first_text(obj, NODE_TYPE_KEYS)
        .or_else(|| {
            obj.get("labels")
                .and_then(Value::as_array)
                .and_then(|labels| labels.first())
                .and_then(scalar_text)
                .map(|t| ("labels", t))
        })
        .unwrap_or(("", "Unknown".to_string()));

    let (name_key, name) = first_text(obj, NODE_NAME_KEYS).unwrap_or(("", id.clone()));
    let date = obj.get("date").and_then(Value::as_str).map(str::to_string);

    let mut attrs = IndexMap::new();
    for (key, value) in obj {
        let key = key.as_str();
        if key == id_key || key == type_key || key == name_key || key == "date" {
            continue;
        }
        let attr = match value {
            Value::String(s) => AttrValue::Text(s.clone()),
            Value::Number(n) => match n.as_f64() {
                Some(f) => AttrValue::Number(f),
                None => continue,
            },
            Value::Bool(b) => AttrValue::Bool(*b),
            _ => continue,
        };
        attrs.insert(key.to_string(), attr);
    }

    GraphNode { id, node_type, name, date, attrs }
}

/// First alias whose value is a non-empty string or a number.
fn first_text<'k>(obj: &Map<String, Value>, keys: &[&'k str]) -> Option<(&'k str, String)> {
    keys.iter()
        .find_map(|&key| obj.get(key).and_then(scalar_text).map(|text| (key, text)))
}

/// Like [`first_text`], but an object value is searched for its own id (d3 replaces link endpoints
/// with the node objects).
fn first_endpoint(obj: &Map<String, Value>, keys: &[&str]) -> Option<String> {
    keys.iter().find_map(|&key| match obj.get(key)? {
        Value::Object(inner) => first_text(inner, NODE_ID_KEYS).map(|(_, id)| id),
        other => scalar_text(other),
    })
}

fn scalar_text(value: &Value) -> Option<String> {
    match value {
        Value::String(s) if !s.trim().is_empty() => Some(s.clone()),
        Value::Number(n) => Some(n.to_string()),
        _ => None,
    }
}
