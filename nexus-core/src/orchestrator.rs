//! Request dispatch and per-view cancellation.
//!
//! A host view sends a [`LayoutRequest`] whenever its data, mode or size changes. The orchestrator:
//! 1. cancels whatever run is still in flight for that view and registers a fresh token
//! 2. ingests the raw snapshot (and mode payloads) into typed records, collecting diagnostics
//! 3. runs the layout for the requested mode and wraps the outcome in a [`LayoutOutput`]
//!
//! Views never share state; the token registry is the only thing behind a lock.

use std::collections::HashMap;
use std::sync::Mutex;

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::config::EngineConfig;
use crate::error::{DiagnosticKind, Diagnostics, LayoutError, Result};
use crate::geometry::Size;
use crate::graph::ingest::{edges_from_json, nodes_from_json, snapshot_from_json};
use crate::graph::{GraphEdge, GraphNode, GraphSnapshot};
use crate::layout::column_flow::{self, Relationship, relationships_from_snapshot};
use crate::layout::force::{self, CancelToken};
use crate::layout::radial_cluster::{self, Cluster};
use crate::layout::{LayoutResult, timeline};
use crate::output::LayoutOutput;
use crate::text::{ApproxCharWidth, TextWidthEstimator};

#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum ViewMode {
    /// Focus node plus its one-hop neighbors, force layout.
    Neighbors,
    /// Whole snapshot, force layout.
    Subgraph,
    /// Source -> middle -> target columns.
    Flow,
    /// Two-circle cluster diagram.
    Cluster,
    /// Date rail with anchors and satellites.
    Timeline,
}

/// Explicit timeline payload. When absent, anchors are the dated snapshot nodes, satellites the
/// undated ones, and relationships the snapshot edges.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimelinePayload {
    #[serde(alias = "timeline_items", alias = "timelineItems")]
    pub anchors: Value,
    #[serde(alias = "floating_items", alias = "floatingItems")]
    pub satellites: Value,
    pub relationships: Value,
}

#[derive(Debug, Clone, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct LayoutRequest {
    #[serde(default)]
    pub view_id: String,
    pub mode: ViewMode,
    /// Raw `{nodes, links}` document; see [`crate::graph::ingest`] for accepted keys.
    #[serde(default)]
    pub snapshot: Value,
    #[serde(default)]
    pub focus_id: Option<String>,
    #[serde(default)]
    pub canvas: Option<Size>,
    /// Selected clusters, highest ranked first. Only the first two are drawn.
    #[serde(default)]
    pub clusters: Value,
    #[serde(default)]
    pub timeline: Option<TimelinePayload>,
    /// Explicit flow relationships; derived from the snapshot when absent.
    #[serde(default)]
    pub relationships: Value,
    #[serde(default)]
    pub config: EngineConfig,
}

impl LayoutRequest {
    pub fn new(view_id: impl Into<String>, mode: ViewMode, snapshot: Value) -> Self {
        Self {
            view_id: view_id.into(),
            mode,
            snapshot,
            focus_id: None,
            canvas: None,
            clusters: Value::Null,
            timeline: None,
            relationships: Value::Null,
            config: EngineConfig::default(),
        }
    }

    pub fn with_focus(mut self, focus_id: impl Into<String>) -> Self {
        self.focus_id = Some(focus_id.into());
        self
    }
}

pub struct Orchestrator<E = ApproxCharWidth> {
    estimator: E,
    in_flight: Mutex<HashMap<String, CancelToken>>,
}

impl Default for Orchestrator<ApproxCharWidth> {
    fn default() -> Self {
        Self::new()
    }
}

impl Orchestrator<ApproxCharWidth> {
    pub fn new() -> Self {
        Self::with_estimator(ApproxCharWidth::default())
    }
}

impl<E: TextWidthEstimator> Orchestrator<E> {
    pub fn with_estimator(estimator: E) -> Self {
        Self { estimator, in_flight: Mutex::new(HashMap::new()) }
    }

    /// Decode a JSON request and lay it out. Undecodable input yields an `invalidRequest` error.
    pub fn layout_json(&self, request: &str) -> LayoutOutput {
        match serde_json::from_str::<LayoutRequest>(request) {
            Ok(req) => self.layout(&req),
            Err(e) => {
                let view_id = serde_json::from_str::<Value>(request)
                    .ok()
                    .and_then(|v| v.get("viewId").and_then(Value::as_str).map(str::to_string))
                    .unwrap_or_default();
                LayoutOutput::failed(view_id, &LayoutError::InvalidRequest(e.to_string()), vec![])
            }
        }
    }

    pub fn layout(&self, request: &LayoutRequest) -> LayoutOutput {
        let token = self.register(&request.view_id);
        let mut diag = Diagnostics::new();
        tracing::debug!(view_id = %request.view_id, mode = ?request.mode, "layout requested");

        let outcome = self.dispatch(request, &token, &mut diag);
        self.release(&request.view_id, &token);

        match outcome {
            Ok(result) => LayoutOutput::ready(request.view_id.clone(), result, diag.into_vec()),
            Err(err) => {
                match err {
                    LayoutError::Cancelled => tracing::debug!(view_id = %request.view_id, "layout superseded"),
                    _ => tracing::warn!(view_id = %request.view_id, error = %err, "layout failed"),
                }
                LayoutOutput::failed(request.view_id.clone(), &err, diag.into_vec())
            }
        }
    }

    /// Stop the run in flight for `view_id`. Returns false when nothing was running.
    pub fn cancel(&self, view_id: &str) -> bool {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        match in_flight.remove(view_id) {
            Some(token) => {
                token.cancel();
                true
            }
            None => false,
        }
    }

    /// Number of views with a run in flight.
    pub fn in_flight(&self) -> usize {
        self.in_flight.lock().unwrap_or_else(|e| e.into_inner()).len()
    }

    fn register(&self, view_id: &str) -> CancelToken {
        let token = CancelToken::new();
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if let Some(previous) = in_flight.insert(view_id.to_string(), token.clone()) {
            previous.cancel();
        }
        token
    }

    fn release(&self, view_id: &str, token: &CancelToken) {
        let mut in_flight = self.in_flight.lock().unwrap_or_else(|e| e.into_inner());
        if in_flight.get(view_id).is_some_and(|t| t.is_same(token)) {
            in_flight.remove(view_id);
        }
    }

    fn dispatch(&self, request: &LayoutRequest, token: &CancelToken, diag: &mut Diagnostics) -> Result<LayoutResult> {
        let config = request.config.clamped();
        let snapshot = snapshot_from_json(&request.snapshot, diag)?;

        match request.mode {
            ViewMode::Neighbors => {
                let focus = request
                    .focus_id
                    .as_deref()
                    .ok_or_else(|| LayoutError::InvalidRequest("neighbors mode needs a focusId".into()))?;
                let canvas = request.canvas.unwrap_or_default();
                force::run(Some(focus), &snapshot, canvas, &config.force, token)
            }
            ViewMode::Subgraph => {
                let canvas = request.canvas.unwrap_or_default();
                force::run(None, &snapshot, canvas, &config.force, token)
            }
            ViewMode::Flow => {
                let relationships = flow_relationships(&request.relationships, &snapshot, diag)?;
                Ok(column_flow::run(&relationships, &config.column_flow, &self.estimator, diag))
            }
            ViewMode::Cluster => {
                let clusters = clusters_from_json(&request.clusters, diag)?;
                Ok(radial_cluster::run(clusters.first(), clusters.get(1), &config.radial))
            }
            ViewMode::Timeline => {
                let (anchors, satellites, relationships) = timeline_inputs(request.timeline.as_ref(), &snapshot, diag)?;
                Ok(timeline::run(&anchors, &satellites, &relationships, &config.timeline, diag))
            }
        }
    }
}

fn flow_relationships(value: &Value, snapshot: &GraphSnapshot, diag: &mut Diagnostics) -> Result<Vec<Relationship>> {
    match value {
        Value::Null => Ok(relationships_from_snapshot(snapshot, diag)),
        Value::Array(items) => Ok(items
            .iter()
            .enumerate()
            .filter_map(|(i, item)| match serde_json::from_value::<Relationship>(item.clone()) {
                Ok(rel) => Some(rel),
                Err(e) => {
                    diag.report(DiagnosticKind::MalformedItem, format!("relationships[{i}]"), e.to_string());
                    None
                }
            })
            .collect()),
        _ => Err(LayoutError::NotACollection { field: "relationships".into() }),
    }
}

fn clusters_from_json(value: &Value, diag: &mut Diagnostics) -> Result<Vec<Cluster>> {
    let items = match value {
        Value::Null => return Ok(Vec::new()),
        Value::Array(items) => items,
        _ => return Err(LayoutError::NotACollection { field: "clusters".into() }),
    };
    let mut clusters = Vec::with_capacity(items.len().min(2));
    for (i, item) in items.iter().enumerate() {
        match serde_json::from_value::<Cluster>(item.clone()) {
            Ok(cluster) => clusters.push(cluster),
            Err(e) => diag.report(DiagnosticKind::MalformedItem, format!("clusters[{i}]"), e.to_string()),
        }
    }
    if clusters.len() > 2 {
        diag.report(DiagnosticKind::Truncated, "clusters", format!("{} clusters beyond the first two ignored", clusters.len() - 2));
        clusters.truncate(2);
    }
    Ok(clusters)
}

type TimelineInputs = (Vec<GraphNode>, Vec<GraphNode>, Vec<GraphEdge>);

fn timeline_inputs(payload: Option<&TimelinePayload>, snapshot: &GraphSnapshot, diag: &mut Diagnostics) -> Result<TimelineInputs> {
    if let Some(payload) = payload {
        let anchors = nodes_from_json(&payload.anchors, "anchors", diag)?;
        let satellites = nodes_from_json(&payload.satellites, "satellites", diag)?;
        let relationships = edges_from_json(&payload.relationships, "relationships", diag)?;
        return Ok((anchors, satellites, relationships));
    }

    let (anchors, satellites): (Vec<GraphNode>, Vec<GraphNode>) =
        snapshot.nodes().iter().cloned().partition(|n| n.date.is_some());
    Ok((anchors, satellites, snapshot.edges().to_vec()))
}
