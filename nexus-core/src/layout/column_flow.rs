// Three-column relationship flow: source -> middle -> target.
//
// Funding relationships are laid out first, action relationships below them. Slot rules:
// - source (column 1): funding relationships share one slot per source label; every action
//   relationship gets its own slot (the first two are "mid" slots, later ones "bottom" slots)
// - middle (column 2): one slot per literal label, shared across relationships and sections
// - target (column 3): one slot per relationship; when a (source, middle) pair fans out to several
//   targets they are spread around the middle's row instead of stacked on it
//
// Rows are placed top-down per section, then each column gets a push-down pass so no two nodes in
// the same column overlap vertically. Column 1 is left-aligned, columns 2 and 3 are centered.

use std::collections::HashMap;

use indexmap::IndexMap;
use serde::{Deserialize, Serialize};

use super::{EdgePath, EdgeStyle, LayoutEdge, LayoutNode, LayoutResult, NodeKind, finish_within};
use crate::config::ColumnFlowParams;
use crate::error::{DiagnosticKind, Diagnostics};
use crate::geometry::{Point, Rect, cubic_flow_controls};
use crate::graph::{GraphNode, GraphSnapshot};
use crate::text::{TextWidthEstimator, truncate_label};

/// Action sources past this many occurrences go to "bottom" slots.
const MID_SOURCE_SLOTS: usize = 2;

#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum FlowKind {
    Funding,
    Action,
}

impl FlowKind {
    fn as_str(self) -> &'static str {
        match self {
            FlowKind::Funding => "funding",
            FlowKind::Action => "action",
        }
    }

    fn style(self) -> EdgeStyle {
        match self {
            FlowKind::Funding => EdgeStyle::Funding,
            FlowKind::Action => EdgeStyle::Action,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Relationship {
    pub source: String,
    pub middle: String,
    pub target: String,
    pub kind: FlowKind,
}

impl Relationship {
    pub fn new(source: impl Into<String>, middle: impl Into<String>, target: impl Into<String>, kind: FlowKind) -> Self {
        Self { source: source.into(), middle: middle.into(), target: target.into(), kind }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
enum SourceKey {
    Shared(String),
    Occurrence(usize),
}

#[derive(Debug, Clone)]
struct Slot {
    id: String,
    label: String,
    column: usize,
    section: FlowKind,
    y: f64,
    width: f64,
}

struct SlotTable<'a> {
    params: &'a ColumnFlowParams,
    estimator: &'a dyn TextWidthEstimator,
    slots: Vec<Slot>,
}

impl SlotTable<'_> {
    fn push(&mut self, id: String, label: &str, column: usize, section: FlowKind, y: f64) -> usize {
        let p = self.params;
        let label = truncate_label(label, p.label_max_chars);
        let text_w = self.estimator.width(&label, p.font_size, &p.font_family);
        let width = (text_w + 2.0 * p.node_padding).clamp(p.min_node_width, p.max_node_width);
        self.slots.push(Slot { id, label, column, section, y, width });
        self.slots.len() - 1
    }

    /// Push-down pass over one section's slots in `column`: sort by desired row, then move each
    /// slot below its predecessor. Nothing ends up above `floor`.
    fn resolve_column(&mut self, column: usize, section: FlowKind, floor: f64, gap: f64) {
        let mut members: Vec<usize> = (0..self.slots.len())
            .filter(|&i| self.slots[i].column == column && self.slots[i].section == section)
            .collect();
        members.sort_by(|&a, &b| self.slots[a].y.total_cmp(&self.slots[b].y));

        let mut next_free = floor;
        for i in members {
            let slot = &mut self.slots[i];
            slot.y = slot.y.max(next_free);
            next_free = slot.y + self.params.node_height + gap;
        }
    }

    /// Target column: each group of split targets is spread `step` apart around its middle's row,
    /// groups taken in row order and pushed down as a whole so they never overlap.
    fn place_targets(&mut self, mut groups: Vec<(f64, Vec<usize>)>, floor: f64, gap: f64, step: f64) {
        groups.sort_by(|a, b| a.0.total_cmp(&b.0));
        let mut next_free = floor;
        for (base, targets) in groups {
            let spread = (targets.len().saturating_sub(1)) as f64 * step;
            let first = (base - spread / 2.0).max(next_free);
            for (i, &tgt) in targets.iter().enumerate() {
                self.slots[tgt].y = first + i as f64 * step;
            }
            next_free = first + spread + self.params.node_height + gap;
        }
    }

    fn section_bottom(&self, section: FlowKind) -> Option<f64> {
        self.slots
            .iter()
            .filter(|s| s.section == section)
            .map(|s| s.y + self.params.node_height)
            .reduce(f64::max)
    }
}

/// Lay out `relationships` as a funding section above an action section.
pub fn run(
    relationships: &[Relationship],
    params: &ColumnFlowParams,
    estimator: &dyn TextWidthEstimator,
    diag: &mut Diagnostics,
) -> LayoutResult {
    let params = params.clamped();

    let valid: Vec<&Relationship> = relationships
        .iter()
        .enumerate()
        .filter_map(|(i, r)| {
            if [&r.source, &r.middle, &r.target].iter().any(|s| s.trim().is_empty()) {
                diag.report(DiagnosticKind::MalformedItem, format!("relationship[{i}]"), "relationship is missing a source, middle or target");
                None
            } else {
                Some(r)
            }
        })
        .collect();
    if valid.is_empty() {
        tracing::debug!("column flow: no relationships");
        return LayoutResult::Empty;
    }

    let multiplier = if is_dense(&valid, params.density_threshold) { params.density_multiplier } else { 1.0 };
    let row_gap = params.row_gap * multiplier;
    let target_gap = params.target_row_gap * multiplier;
    let pitch = params.node_height + row_gap;
    let split_step = params.node_height + params.split_gap * multiplier;

    let mut table = SlotTable { params: &params, estimator, slots: Vec::new() };
    let mut middles: HashMap<&str, usize> = HashMap::new();
    // (source slot, middle slot, target slot, kind) per relationship
    let mut placed: Vec<(usize, usize, usize, FlowKind)> = Vec::with_capacity(valid.len());
    let mut top = params.start_y;

    for section in [FlowKind::Funding, FlowKind::Action] {
        let rels: Vec<&Relationship> = valid.iter().copied().filter(|r| r.kind == section).collect();
        if rels.is_empty() {
            continue;
        }

        let mut sources: IndexMap<SourceKey, usize> = IndexMap::new();
        let mut middle_rows = 0usize;
        let first_placed = placed.len();

        for (occurrence, rel) in rels.iter().enumerate() {
            let key = match section {
                FlowKind::Funding => SourceKey::Shared(rel.source.clone()),
                FlowKind::Action => SourceKey::Occurrence(occurrence),
            };
            let src = match sources.get(&key) {
                Some(&idx) => idx,
                None => {
                    let row = sources.len();
                    let id = match key {
                        SourceKey::Occurrence(n) if n < MID_SOURCE_SLOTS => format!("source-action-mid-{n}"),
                        SourceKey::Occurrence(n) => format!("source-action-bottom-{n}"),
                        SourceKey::Shared(_) => format!("source-funding-{row}"),
                    };
                    let idx = table.push(id, &rel.source, 0, section, top + row as f64 * pitch);
                    sources.insert(key, idx);
                    idx
                }
            };

            let mid = match middles.get(rel.middle.as_str()) {
                Some(&idx) => idx,
                None => {
                    let id = format!("middle-{}", middles.len());
                    let idx = table.push(id, &rel.middle, 1, section, top + middle_rows as f64 * pitch);
                    middle_rows += 1;
                    middles.insert(rel.middle.as_str(), idx);
                    idx
                }
            };

            // y is filled in once the middle column has settled
            let tgt = table.push(format!("target-{}", placed.len()), &rel.target, 2, section, top);
            placed.push((src, mid, tgt, section));
        }

        table.resolve_column(0, section, top, row_gap);
        table.resolve_column(1, section, top, row_gap);

        let mut splits: IndexMap<(usize, usize), Vec<usize>> = IndexMap::new();
        for &(src, mid, tgt, _) in &placed[first_placed..] {
            splits.entry((src, mid)).or_default().push(tgt);
        }
        let groups: Vec<(f64, Vec<usize>)> = splits
            .into_iter()
            .map(|((_, mid), targets)| (table.slots[mid].y, targets))
            .collect();
        table.place_targets(groups, top, target_gap, split_step);

        if let Some(bottom) = table.section_bottom(section) {
            top = bottom + params.section_gap;
        }
    }

    // Column x offsets, left to right.
    let mut col_width = [0.0f64; 3];
    for s in &table.slots {
        col_width[s.column] = col_width[s.column].max(s.width);
    }
    let col_left = [
        0.0,
        col_width[0] + params.column_gap,
        col_width[0] + params.column_gap + col_width[1] + params.column_gap,
    ];

    let nodes: Vec<LayoutNode> = table
        .slots
        .iter()
        .map(|s| {
            let x = match s.column {
                0 => col_left[0],
                c => col_left[c] + (col_width[c] - s.width) / 2.0,
            };
            let kind = [NodeKind::Source, NodeKind::Middle, NodeKind::Target][s.column];
            LayoutNode::new(s.id.clone(), Rect::new(x, s.y, s.width, params.node_height), kind, s.label.clone())
                .with_type(s.section.as_str())
        })
        .collect();

    let curve = |from: usize, to: usize, style: EdgeStyle| {
        let (a, b) = (&nodes[from].rect, &nodes[to].rect);
        let start = Point::new(a.right(), a.center().y);
        let end = Point::new(b.x, b.center().y);
        LayoutEdge {
            source_id: nodes[from].id.clone(),
            target_id: nodes[to].id.clone(),
            path: EdgePath::Cubic(cubic_flow_controls(start, end, params.curve_tension)),
            style,
            label: None,
        }
    };

    let mut edges = Vec::new();
    let mut linked: IndexMap<(usize, usize), FlowKind> = IndexMap::new();
    for &(src, mid, _, kind) in &placed {
        linked.entry((src, mid)).or_insert(kind);
    }
    for (&(src, mid), kind) in &linked {
        edges.push(curve(src, mid, kind.style()));
    }
    for &(_, mid, tgt, kind) in &placed {
        edges.push(curve(mid, tgt, kind.style()));
    }

    tracing::debug!(relationships = placed.len(), nodes = nodes.len(), edges = edges.len(), "column flow laid out");
    finish_within(nodes, edges, params.viewport_padding, params.nominal_width)
}

/// Any source or target label taking part in at least `threshold` relationships. Middles are
/// amounts and actions, often repeated verbatim, so they do not count.
fn is_dense(rels: &[&Relationship], threshold: usize) -> bool {
    let mut counts: HashMap<&str, usize> = HashMap::new();
    for r in rels {
        for label in [&r.source, &r.target] {
            *counts.entry(label.as_str()).or_default() += 1;
        }
    }
    counts.values().any(|&c| c >= threshold)
}

fn middle_label(node: &GraphNode) -> String {
    node.attr_text("amount")
        .or_else(|| node.attr_text("action_text"))
        .unwrap_or_else(|| node.name.clone())
}

/// Derive relationships from `Entity -> Amount|Action -> Entity` paths. Amount nodes yield funding
/// relationships, Action nodes yield action relationships.
pub fn relationships_from_snapshot(snapshot: &GraphSnapshot, diag: &mut Diagnostics) -> Vec<Relationship> {
    let mut out = Vec::new();
    for node in snapshot.nodes() {
        let kind = if node.is_type("Amount") {
            FlowKind::Funding
        } else if node.is_type("Action") {
            FlowKind::Action
        } else {
            continue;
        };

        let endpoint = |id: &str| snapshot.node(id).filter(|n| !n.is_type("Amount") && !n.is_type("Action"));
        let sources: Vec<&GraphNode> = snapshot
            .edges()
            .iter()
            .filter(|e| e.target_id == node.id)
            .filter_map(|e| endpoint(&e.source_id))
            .collect();
        let targets: Vec<&GraphNode> = snapshot
            .edges()
            .iter()
            .filter(|e| e.source_id == node.id)
            .filter_map(|e| endpoint(&e.target_id))
            .collect();

        if sources.is_empty() != targets.is_empty() {
            diag.report(DiagnosticKind::MalformedItem, node.id.clone(), format!("{} node is missing its source or target", kind.as_str()));
            continue;
        }

        let middle = middle_label(node);
        for s in &sources {
            for t in &targets {
                out.push(Relationship::new(s.name.clone(), middle.clone(), t.name.clone(), kind));
            }
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::geometry::Rect;
    use crate::graph::{AttrValue, GraphEdge};
    use crate::layout::Layout;
    use crate::text::ApproxCharWidth;

    fn layout(rels: &[Relationship]) -> Layout {
        let mut diag = Diagnostics::new();
        run(rels, &ColumnFlowParams::default(), &ApproxCharWidth::default(), &mut diag)
            .into_layout()
            .expect("non-empty layout")
    }

    fn funding(s: &str, m: &str, t: &str) -> Relationship {
        Relationship::new(s, m, t, FlowKind::Funding)
    }

    fn action(s: &str, m: &str, t: &str) -> Relationship {
        Relationship::new(s, m, t, FlowKind::Action)
    }

    fn assert_no_column_overlap(layout: &Layout) {
        for kind in [NodeKind::Source, NodeKind::Middle, NodeKind::Target] {
            let rects: Vec<Rect> = layout.nodes_of(kind).map(|n| n.rect).collect();
            for (i, a) in rects.iter().enumerate() {
                for b in &rects[i + 1..] {
                    assert!(a.bottom() <= b.y || b.bottom() <= a.y, "{kind:?} overlap: {a:?} vs {b:?}");
                }
            }
        }
    }

    #[test]
    fn test_split_gives_distinct_targets() {
        let layout = layout(&[funding("A", "$100", "B"), funding("A", "$100", "C")]);

        assert_eq!(layout.nodes_of(NodeKind::Source).count(), 1);
        assert_eq!(layout.nodes_of(NodeKind::Middle).count(), 1);
        let targets: Vec<&LayoutNode> = layout.nodes_of(NodeKind::Target).collect();
        assert_eq!(targets.len(), 2);
        assert_ne!(targets[0].rect, targets[1].rect);
        assert_eq!(targets[0].label, "B");
        assert_eq!(targets[1].label, "C");

        // one shared source->middle edge, one middle->target edge per relationship
        assert_eq!(layout.edges.len(), 3);
    }

    #[test]
    fn test_split_centered_on_middle_row() {
        let layout = layout(&[
            funding("A", "$5", "x"),
            funding("B", "$100", "y"),
            funding("B", "$100", "z"),
        ]);
        let mid = layout.nodes.iter().find(|n| n.label == "$100").unwrap();
        let ys: Vec<f64> = ["y", "z"]
            .iter()
            .map(|l| layout.nodes.iter().find(|n| n.label == *l).unwrap().rect.center().y)
            .collect();
        assert!(ys[0] < ys[1]);
        assert_eq!(ys[1] - ys[0], 24.0 + 100.0);
        // the split group is pushed below the first target as a whole
        assert!(ys[0] >= 20.0 + 24.0 + 24.0);
        assert!(mid.rect.center().y <= ys[1]);
    }

    #[test]
    fn test_single_target_aligns_with_middle() {
        let layout = layout(&[funding("A", "$1", "B")]);
        let mid = layout.nodes_of(NodeKind::Middle).next().unwrap();
        let tgt = layout.nodes_of(NodeKind::Target).next().unwrap();
        assert_eq!(mid.rect.y, tgt.rect.y);
    }

    #[test]
    fn test_funding_shares_source_action_does_not() {
        let layout = layout(&[
            funding("X", "$1", "a"),
            funding("X", "$2", "b"),
            action("Y", "sued", "c"),
            action("Y", "sued", "d"),
            action("Y", "paid", "e"),
        ]);
        let ids: Vec<&str> = layout.nodes_of(NodeKind::Source).map(|n| n.id.as_str()).collect();
        assert_eq!(
            ids,
            vec!["source-funding-0", "source-action-mid-0", "source-action-mid-1", "source-action-bottom-2"]
        );
        // "sued" is shared
        assert_eq!(layout.nodes_of(NodeKind::Middle).count(), 4);
    }

    #[test]
    fn test_funding_section_above_action() {
        let layout = layout(&[
            action("P", "met", "Q"),
            funding("A", "$1", "B"),
            funding("A", "$1", "C"),
            funding("A", "$1", "D"),
        ]);
        let bottom_of = |section: &str| {
            layout.nodes.iter().filter(|n| n.node_type.as_deref() == Some(section)).map(|n| n.rect.bottom()).fold(f64::MIN, f64::max)
        };
        let top_of = |section: &str| {
            layout.nodes.iter().filter(|n| n.node_type.as_deref() == Some(section)).map(|n| n.rect.y).fold(f64::MAX, f64::min)
        };
        assert!(bottom_of("funding") + 36.0 <= top_of("action") + 1e-9);
        assert_no_column_overlap(&layout);
    }

    #[test]
    fn test_dense_fan_out_has_no_overlap() {
        let mut rels = Vec::new();
        for i in 0..6 {
            rels.push(funding("Hub", "$100", &format!("T{i}")));
            rels.push(funding(&format!("S{i}"), &format!("${i}"), "Hub"));
            rels.push(action("Hub", "acted", &format!("A{i}")));
        }
        let layout = layout(&rels);
        assert_no_column_overlap(&layout);
        for n in &layout.nodes {
            assert!(layout.viewport.contains_rect(&n.rect));
        }
    }

    #[test]
    fn test_density_widens_rows() {
        let sparse = layout(&[funding("A", "$1", "B"), funding("C", "$2", "D")]);
        let dense = layout(&[funding("A", "$1", "B"), funding("C", "$2", "B"), funding("E", "$3", "B")]);
        let gap = |l: &Layout| {
            let ys: Vec<f64> = l.nodes_of(NodeKind::Source).map(|n| n.rect.y).collect();
            ys[1] - ys[0]
        };
        assert_eq!(gap(&sparse), 24.0 + 8.0);
        assert_eq!(gap(&dense), 24.0 + 12.0);
    }

    #[test]
    fn test_dense_split_widens_spread() {
        // A appears three times as a source, so the layout is dense
        let layout = layout(&[funding("A", "$1", "B"), funding("A", "$1", "C"), funding("A", "$1", "D")]);
        let ys: Vec<f64> = layout.nodes_of(NodeKind::Target).map(|n| n.rect.y).collect();
        assert_eq!(ys.len(), 3);
        assert_eq!(ys[1] - ys[0], 24.0 + 150.0);
        assert_eq!(ys[2] - ys[1], 24.0 + 150.0);
    }

    #[test]
    fn test_repeated_middle_alone_is_not_dense() {
        let layout = layout(&[funding("A", "$100", "B"), funding("C", "$100", "D"), funding("E", "$100", "F")]);
        let ys: Vec<f64> = layout.nodes_of(NodeKind::Source).map(|n| n.rect.y).collect();
        assert_eq!(ys[1] - ys[0], 24.0 + 8.0);
    }

    #[test]
    fn test_widths_and_alignment() {
        let layout = layout(&[funding("A", "Action Name Specific Text That Is Long", "Short")]);
        let mid = layout.nodes_of(NodeKind::Middle).next().unwrap();
        assert_eq!(mid.label, "Action Name S...");
        assert!(mid.rect.w <= 200.0);

        let src = layout.nodes_of(NodeKind::Source).next().unwrap();
        assert_eq!(src.rect.w, 80.0);
        assert_eq!(src.rect.x, 0.0);
        assert_eq!(mid.rect.x, 80.0 + 50.0);
    }

    #[test]
    fn test_curves_run_edge_to_edge() {
        let layout = layout(&[funding("A", "$1", "B")]);
        let EdgePath::Cubic(c) = &layout.edges[0].path else { panic!("expected a cubic") };
        let src = layout.node(&layout.edges[0].source_id).unwrap();
        let mid = layout.node(&layout.edges[0].target_id).unwrap();
        assert_eq!(c.start.x, src.rect.right());
        assert_eq!(c.end.x, mid.rect.x);
        assert!((c.c1.x - c.start.x - (c.end.x - c.start.x) * 0.4).abs() < 1e-9);
        assert_eq!(c.c1.y, c.start.y);
        assert_eq!(layout.edges[0].style, EdgeStyle::Funding);
    }

    #[test]
    fn test_viewport_has_nominal_width() {
        let layout = layout(&[funding("A", "$1", "B")]);
        assert!(layout.viewport.w >= 500.0);
        let content = layout.nodes.iter().map(|n| n.rect).reduce(|a, b| a.union(&b)).unwrap();
        assert!((layout.viewport.center().x - content.center().x).abs() < 1e-9);
    }

    #[test]
    fn test_deterministic_output() {
        let rels = [funding("A", "$1", "B"), action("C", "met", "D"), funding("A", "$1", "E")];
        let a = serde_json::to_string(&layout(&rels)).unwrap();
        let b = serde_json::to_string(&layout(&rels)).unwrap();
        assert_eq!(a, b);
    }

    #[test]
    fn test_empty_and_malformed() {
        let mut diag = Diagnostics::new();
        let params = ColumnFlowParams::default();
        assert!(run(&[], &params, &ApproxCharWidth::default(), &mut diag).is_empty());

        let result = run(&[funding("", "$1", "B"), funding("A", "$1", "B")], &params, &ApproxCharWidth::default(), &mut diag);
        assert_eq!(result.layout().unwrap().nodes.len(), 3);
        assert_eq!(diag.count(DiagnosticKind::MalformedItem), 1);
    }

    #[test]
    fn test_relationships_from_snapshot() {
        let mut diag = Diagnostics::new();
        let snap = GraphSnapshot::new(
            vec![
                GraphNode::new("e1", "Entity", "Fund"),
                GraphNode::new("e2", "Entity", "Charity"),
                GraphNode::new("m1", "Amount", "grant").with_attr("amount", AttrValue::Text("$100".into())),
                GraphNode::new("a1", "Action", "act").with_attr("action_text", AttrValue::Text("audited".into())),
                GraphNode::new("m2", "Amount", "orphan"),
            ],
            vec![
                GraphEdge::new("e1", "m1"),
                GraphEdge::new("m1", "e2"),
                GraphEdge::new("e2", "a1"),
                GraphEdge::new("a1", "e1"),
                GraphEdge::new("e1", "m2"),
            ],
            &mut diag,
        );
        let rels = relationships_from_snapshot(&snap, &mut diag);
        assert_eq!(
            rels,
            vec![funding("Fund", "$100", "Charity"), action("Charity", "audited", "Fund")]
        );
        assert_eq!(diag.count(DiagnosticKind::MalformedItem), 1);
    }
}
