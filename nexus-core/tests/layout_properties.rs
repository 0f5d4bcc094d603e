//! Property-based invariant tests for the four layouts.
//!
//! 1. Every node rect lies inside the viewport, for all layouts.
//! 2. Column flow never overlaps two nodes of the same column.
//! 3. Identical input and params give identical results.
//! 4. Timeline never shows more dates, or more anchors per date, than its caps.

use std::collections::HashMap;

use nexus_core::config::{ColumnFlowParams, ForceParams, RadialClusterParams, TimelineParams};
use nexus_core::error::Diagnostics;
use nexus_core::geometry::Size;
use nexus_core::graph::{GraphEdge, GraphNode, GraphSnapshot};
use nexus_core::layout::column_flow::{self, FlowKind, Relationship};
use nexus_core::layout::force::{self, CancelToken};
use nexus_core::layout::radial_cluster::{self, Cluster, ClusterMember};
use nexus_core::layout::{Layout, LayoutResult, NodeKind, timeline};
use nexus_core::text::ApproxCharWidth;
use proptest::prelude::*;

// ── Helpers ─────────────────────────────────────────────────────────────

const LABELS: &[&str] = &[
    "Global Health Fund",
    "Acme",
    "Ministry of Water and Sanitation",
    "NGO",
    "Regional Development Authority of the North",
    "X",
];

fn relationship_strategy() -> impl Strategy<Value = Relationship> {
    (0..LABELS.len(), 0usize..6, 0..LABELS.len(), any::<bool>()).prop_map(|(s, m, t, funding)| {
        let kind = if funding { FlowKind::Funding } else { FlowKind::Action };
        Relationship::new(LABELS[s], format!("${}M", m * 5 + 1), LABELS[t], kind)
    })
}

fn assert_contained(layout: &Layout) -> Result<(), TestCaseError> {
    for n in &layout.nodes {
        prop_assert!(
            layout.viewport.contains_rect(&n.rect),
            "node {} at {:?} escapes viewport {:?}",
            n.id,
            n.rect,
            layout.viewport
        );
    }
    Ok(())
}

fn ready(result: &LayoutResult) -> Result<&Layout, TestCaseError> {
    match result.layout() {
        Some(layout) => Ok(layout),
        None => Err(TestCaseError::fail("expected a ready layout")),
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Column flow
// ═════════════════════════════════════════════════════════════════════════

proptest! {
    #[test]
    fn column_flow_contained_and_columns_disjoint(rels in prop::collection::vec(relationship_strategy(), 1..24)) {
        let mut diag = Diagnostics::new();
        let result = column_flow::run(&rels, &ColumnFlowParams::default(), &ApproxCharWidth::default(), &mut diag);
        let layout = ready(&result)?;
        assert_contained(layout)?;

        for kind in [NodeKind::Source, NodeKind::Middle, NodeKind::Target] {
            let column: Vec<_> = layout.nodes_of(kind).collect();
            for (i, a) in column.iter().enumerate() {
                for b in &column[i + 1..] {
                    let apart = a.rect.bottom() <= b.rect.y || b.rect.bottom() <= a.rect.y;
                    prop_assert!(apart, "{} {:?} overlaps {} {:?}", a.id, a.rect, b.id, b.rect);
                }
            }
        }
    }

    #[test]
    fn column_flow_deterministic(rels in prop::collection::vec(relationship_strategy(), 1..12)) {
        let params = ColumnFlowParams::default();
        let first = column_flow::run(&rels, &params, &ApproxCharWidth::default(), &mut Diagnostics::new());
        let second = column_flow::run(&rels, &params, &ApproxCharWidth::default(), &mut Diagnostics::new());
        prop_assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Radial cluster
// ═════════════════════════════════════════════════════════════════════════

fn cluster_strategy() -> impl Strategy<Value = Cluster> {
    prop::collection::vec(0usize..12, 0..10).prop_map(|ids| Cluster {
        value: Some("Kenya".to_string()),
        count: Some(ids.len()),
        members: ids.iter().map(|i| ClusterMember::new(format!("m{i}"), format!("Member {i}"))).collect(),
    })
}

proptest! {
    #[test]
    fn radial_contained_and_capped(a in cluster_strategy(), b in cluster_strategy()) {
        let params = RadialClusterParams::default();
        let result = radial_cluster::run(Some(&a), Some(&b), &params);
        let layout = ready(&result)?;
        assert_contained(layout)?;
        prop_assert!(layout.nodes_of(NodeKind::Overlap).count() <= 3);
        prop_assert!(layout.nodes_of(NodeKind::ExclusiveA).count() <= 3);
        prop_assert!(layout.nodes_of(NodeKind::ExclusiveB).count() <= 2);
        prop_assert_eq!(result, radial_cluster::run(Some(&a), Some(&b), &params));
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Timeline
// ═════════════════════════════════════════════════════════════════════════

fn timeline_strategy() -> impl Strategy<Value = (Vec<GraphNode>, Vec<GraphNode>, Vec<GraphEdge>)> {
    (
        prop::collection::vec(1u32..=20, 0..40),
        prop::collection::vec((0usize..40, 0usize..8), 0..20),
    )
        .prop_map(|(days, links)| {
            let anchors: Vec<GraphNode> = days
                .iter()
                .enumerate()
                .map(|(i, d)| GraphNode::new(format!("a{i}"), "Action", format!("Action {i}")).with_date(format!("2024-03-{d:02}")))
                .collect();
            let satellites: Vec<GraphNode> =
                (0..8).map(|i| GraphNode::new(format!("s{i}"), "Entity", format!("Entity {i}"))).collect();
            let edges = links
                .iter()
                .map(|(a, s)| GraphEdge::new(format!("a{a}"), format!("s{s}")))
                .collect();
            (anchors, satellites, edges)
        })
}

proptest! {
    #[test]
    fn timeline_contained_and_truncated((anchors, satellites, edges) in timeline_strategy()) {
        let params = TimelineParams::default();
        let result = timeline::run(&anchors, &satellites, &edges, &params, &mut Diagnostics::new());
        if anchors.is_empty() {
            prop_assert!(result.is_empty());
            return Ok(());
        }
        let layout = ready(&result)?;
        assert_contained(layout)?;
        prop_assert!(layout.nodes_of(NodeKind::DatePill).count() <= params.max_dates);

        let mut per_row: HashMap<u64, usize> = HashMap::new();
        for card in layout.nodes_of(NodeKind::Anchor) {
            *per_row.entry(card.rect.y.to_bits()).or_default() += 1;
        }
        prop_assert!(per_row.values().all(|&n| n <= params.max_items_per_date));

        // every satellite touches a placed anchor
        for sat in layout.nodes_of(NodeKind::Satellite) {
            let touches = edges.iter().any(|e| e.target_id == sat.id && layout.node(&e.source_id).is_some());
            prop_assert!(touches, "satellite {} has no placed anchor", sat.id);
        }

        let again = timeline::run(&anchors, &satellites, &edges, &params, &mut Diagnostics::new());
        prop_assert_eq!(result, again);
    }
}

// ═════════════════════════════════════════════════════════════════════════
// Force
// ═════════════════════════════════════════════════════════════════════════

fn snapshot_strategy() -> impl Strategy<Value = GraphSnapshot> {
    (2usize..10, prop::collection::vec((0usize..10, 0usize..10), 1..15)).prop_map(|(n, pairs)| {
        let nodes = (0..n).map(|i| GraphNode::new(format!("n{i}"), "Entity", format!("Node {i}"))).collect();
        let edges = pairs
            .iter()
            .map(|(a, b)| GraphEdge::new(format!("n{}", a % n), format!("n{}", b % n)))
            .collect();
        GraphSnapshot::new(nodes, edges, &mut Diagnostics::new())
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn force_contained_and_seeded(snapshot in snapshot_strategy()) {
        let params = ForceParams { max_ticks: 200, ..ForceParams::default() };
        let canvas = Size::new(640.0, 480.0);
        let first = force::run(None, &snapshot, canvas, &params, &CancelToken::new()).unwrap();
        let layout = ready(&first)?;
        assert_contained(layout)?;
        prop_assert_eq!(layout.nodes.len(), snapshot.nodes().len());

        let second = force::run(None, &snapshot, canvas, &params, &CancelToken::new()).unwrap();
        prop_assert_eq!(first, second);
    }
}
