// Timeline: a vertical date rail with anchor cards and floating satellites.
//
// Anchors are grouped by their raw date string, newest first. Only the first `max_dates` dates and the
// first `max_items_per_date` anchors of each date are placed; everything else is hidden, and a
// satellite shows up only when it touches at least one placed anchor.
//
// Geometry per date row `i` (y = first_date_y + i * date_gap):
// - date pill centered on (rail_x, y)
// - anchor card `j` with its top-left corner at (card_start_x + j * card_spacing, y - card_lift)
//
// A satellite sits at the mean top-left corner of its placed anchors, shifted by
// `satellite_offset` and a seeded jitter drawn from [0, jitter_range).

use std::collections::{HashMap, HashSet};
use std::sync::LazyLock;

use chrono::{DateTime, Datelike, NaiveDate, NaiveDateTime};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use regex::Regex;

use super::{EdgePath, EdgeStyle, LayoutEdge, LayoutNode, LayoutResult, NodeKind, finish};
use crate::config::TimelineParams;
use crate::error::{DiagnosticKind, Diagnostics};
use crate::geometry::{Point, Rect, centroid};
use crate::graph::adjacency::Adjacency;
use crate::graph::{GraphEdge, GraphNode};
use crate::text::truncate_label;

const RAIL_ID: &str = "rail";
/// The rail bar runs this far left of the pill column.
const RAIL_OFFSET_X: f64 = 40.0;
const RAIL_WIDTH: f64 = 20.0;
/// Rail starts this far above the first date row.
const RAIL_HEAD: f64 = 80.0;

const DATE_FORMATS: &[&str] = &["%Y-%m-%d", "%Y/%m/%d", "%b %d, %Y", "%B %d, %Y", "%d %b %Y"];
const DATETIME_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S", "%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S"];

static ISO_DATE: LazyLock<Option<Regex>> = LazyLock::new(|| Regex::new(r"\d{4}-\d{2}-\d{2}").ok());

/// Parse an anchor date, trying the common formats first and then pulling the first
/// `YYYY-MM-DD` substring out of whatever is left.
pub fn parse_date(raw: &str) -> Option<NaiveDate> {
    let raw = raw.trim();
    if raw.is_empty() {
        return None;
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.date_naive());
    }
    if let Some(date) = DATE_FORMATS.iter().find_map(|f| NaiveDate::parse_from_str(raw, f).ok()) {
        return Some(date);
    }
    if let Some(dt) = DATETIME_FORMATS.iter().find_map(|f| NaiveDateTime::parse_from_str(raw, f).ok()) {
        return Some(dt.date());
    }

    let re = ISO_DATE.as_ref()?;
    let found = re.find(raw)?;
    NaiveDate::parse_from_str(found.as_str(), "%Y-%m-%d").ok()
}

/// Pill text for a date, e.g. `Mar 5`.
fn pill_label(date: NaiveDate) -> String {
    date.format("%b %-d").to_string()
}

/// Anchors sharing one raw date key, in input order.
struct DateRow<'a> {
    key: String,
    date: NaiveDate,
    anchors: Vec<&'a GraphNode>,
}

/// Group anchors by their trimmed date string. Parsing only orders the rows and weeds out keys
/// that are not dates; `2024-03-05` and `2024-03-05T10:00:00` stay separate rows.
fn group_by_date<'a>(anchors: &'a [GraphNode], diag: &mut Diagnostics) -> Vec<DateRow<'a>> {
    let mut seen: HashSet<&str> = HashSet::new();
    let mut rows: Vec<DateRow<'a>> = Vec::new();
    let mut row_of: HashMap<&'a str, usize> = HashMap::new();

    for anchor in anchors {
        if !seen.insert(anchor.id.as_str()) {
            diag.report(DiagnosticKind::MalformedItem, &anchor.id, "duplicate anchor id ignored");
            continue;
        }
        let Some(key) = anchor.date.as_deref().map(str::trim).filter(|k| !k.is_empty()) else {
            diag.report(DiagnosticKind::UnparseableDate, &anchor.id, "anchor has no date");
            continue;
        };
        if let Some(&row) = row_of.get(key) {
            rows[row].anchors.push(anchor);
            continue;
        }
        match parse_date(key) {
            Some(date) => {
                row_of.insert(key, rows.len());
                rows.push(DateRow { key: key.to_string(), date, anchors: vec![anchor] });
            }
            None => diag.report(DiagnosticKind::UnparseableDate, &anchor.id, format!("cannot parse date `{key}`")),
        }
    }

    // stable: keys on the same day keep input order
    rows.sort_by(|a, b| b.date.cmp(&a.date));
    rows
}

/// Lay out `anchors` on the date rail and attach `satellites` through `relationships`.
pub fn run(
    anchors: &[GraphNode],
    satellites: &[GraphNode],
    relationships: &[GraphEdge],
    params: &TimelineParams,
    diag: &mut Diagnostics,
) -> LayoutResult {
    let params = params.clamped();

    let mut rows = group_by_date(anchors, diag);
    if rows.len() > params.max_dates {
        let hidden = rows.len() - params.max_dates;
        diag.report(DiagnosticKind::Truncated, "dates", format!("{hidden} older dates hidden"));
        rows.truncate(params.max_dates);
    }
    for row in &mut rows {
        if row.anchors.len() > params.max_items_per_date {
            let hidden = row.anchors.len() - params.max_items_per_date;
            diag.report(DiagnosticKind::Truncated, row.key.clone(), format!("{hidden} anchors hidden"));
            row.anchors.truncate(params.max_items_per_date);
        }
    }
    if rows.iter().all(|r| r.anchors.is_empty()) {
        tracing::debug!(anchors = anchors.len(), "timeline: nothing to place");
        return LayoutResult::Empty;
    }

    let mut nodes: Vec<LayoutNode> = Vec::new();
    // placed anchor id -> card rect
    let mut cards: HashMap<&str, Rect> = HashMap::new();

    let last_row_y = params.first_date_y + (rows.len() - 1) as f64 * params.date_gap;
    let rail_top = params.first_date_y - RAIL_HEAD;
    let rail_bottom = last_row_y + params.pill_height / 2.0;
    let year = rows[0].date.year().to_string();
    nodes.push(LayoutNode::new(
        RAIL_ID,
        Rect::new(params.rail_x - RAIL_OFFSET_X, rail_top, RAIL_WIDTH, rail_bottom - rail_top),
        NodeKind::Rail,
        year,
    ));

    for (i, row) in rows.iter().enumerate() {
        let y = params.first_date_y + i as f64 * params.date_gap;
        nodes.push(LayoutNode::new(
            format!("date-{i}"),
            Rect::centered(Point::new(params.rail_x, y), params.pill_width, params.pill_height),
            NodeKind::DatePill,
            pill_label(row.date),
        ));

        for (j, anchor) in row.anchors.iter().enumerate() {
            let rect = Rect::new(
                params.card_start_x + j as f64 * params.card_spacing,
                y - params.card_lift,
                params.card_width,
                params.card_height,
            );
            cards.insert(anchor.id.as_str(), rect);
            nodes.push(
                LayoutNode::new(anchor.id.clone(), rect, NodeKind::Anchor, truncate_label(&anchor.name, params.card_label_chars))
                    .with_type(anchor.node_type.clone()),
            );
        }
    }

    let edges = place_satellites(anchors, satellites, relationships, &cards, &params, &mut nodes, diag);

    tracing::debug!(dates = rows.len(), anchors = cards.len(), nodes = nodes.len(), edges = edges.len(), "timeline laid out");
    finish(nodes, edges, params.viewport_padding)
}

/// Place every satellite that touches a placed anchor; returns the connection edges.
fn place_satellites(
    anchors: &[GraphNode],
    satellites: &[GraphNode],
    relationships: &[GraphEdge],
    cards: &HashMap<&str, Rect>,
    params: &TimelineParams,
    nodes: &mut Vec<LayoutNode>,
    diag: &mut Diagnostics,
) -> Vec<LayoutEdge> {
    let anchor_ids: HashSet<&str> = anchors.iter().map(|a| a.id.as_str()).collect();
    let adjacency = Adjacency::from_edges(relationships);

    let mut labels: HashMap<(&str, &str), &str> = HashMap::new();
    for rel in relationships {
        if let Some(label) = rel.label.as_deref() {
            labels.entry((rel.source_id.as_str(), rel.target_id.as_str())).or_insert(label);
            labels.entry((rel.target_id.as_str(), rel.source_id.as_str())).or_insert(label);
        }
    }

    let mut rng = StdRng::seed_from_u64(params.seed);
    let mut jitter = |range: f64| if range > 0.0 { rng.gen_range(0.0..range) } else { 0.0 };

    let mut placed: HashSet<&str> = HashSet::new();
    let mut hidden = 0usize;
    let mut edges = Vec::new();

    for sat in satellites {
        if anchor_ids.contains(sat.id.as_str()) || !placed.insert(sat.id.as_str()) {
            diag.report(DiagnosticKind::MalformedItem, &sat.id, "satellite id is already in use");
            continue;
        }

        let linked: Vec<&str> = adjacency
            .get_neighbors(&sat.id)
            .iter()
            .map(|(id, _)| id.as_str())
            .filter(|id| anchor_ids.contains(id))
            .collect();
        let visible: Vec<(&str, Rect)> = linked
            .iter()
            .filter_map(|id| cards.get(id).map(|rect| (*id, *rect)))
            .collect();
        if visible.is_empty() {
            if !linked.is_empty() {
                hidden += 1;
            }
            continue;
        }

        let corners: Vec<Point> = visible.iter().map(|(_, r)| Point::new(r.x, r.y)).collect();
        let Some(base) = centroid(&corners) else { continue };
        let center = Point::new(
            base.x + params.satellite_offset.x + jitter(params.jitter_range.x),
            base.y + params.satellite_offset.y + jitter(params.jitter_range.y),
        );
        nodes.push(
            LayoutNode::new(
                sat.id.clone(),
                Rect::centered(center, params.satellite_width, params.satellite_height),
                NodeKind::Satellite,
                truncate_label(&sat.name, params.satellite_label_chars),
            )
            .with_type(sat.node_type.clone()),
        );

        for (anchor_id, card) in visible {
            let from = card.center();
            if from.distance(&center) < params.min_connection_length {
                continue;
            }
            edges.push(LayoutEdge {
                source_id: anchor_id.to_string(),
                target_id: sat.id.clone(),
                path: EdgePath::line(from, center),
                style: EdgeStyle::Connection,
                label: labels.get(&(anchor_id, sat.id.as_str())).map(|l| l.to_string()),
            });
        }
    }

    if hidden > 0 {
        diag.report(DiagnosticKind::Truncated, "satellites", format!("{hidden} satellites hidden with their anchors"));
    }
    edges
}

#[cfg(test)]
mod tests {
    use super::*;

    fn anchor(id: &str, date: &str) -> GraphNode {
        GraphNode::new(id, "Action", format!("Action {id}")).with_date(date)
    }

    fn satellite(id: &str) -> GraphNode {
        GraphNode::new(id, "Entity", format!("Entity {id}"))
    }

    fn no_jitter() -> TimelineParams {
        TimelineParams { jitter_range: Point::new(0.0, 0.0), ..TimelineParams::default() }
    }

    #[test]
    fn test_parse_date_formats() {
        let want = NaiveDate::from_ymd_opt(2024, 3, 5);
        assert_eq!(parse_date("2024-03-05"), want);
        assert_eq!(parse_date("2024/03/05"), want);
        assert_eq!(parse_date("2024-03-05T10:20:30"), want);
        assert_eq!(parse_date("2024-03-05T10:20:30Z"), want);
        assert_eq!(parse_date("Mar 05, 2024"), want);
        assert_eq!(parse_date("signed on 2024-03-05 in Geneva"), want);
        assert_eq!(parse_date("sometime last spring"), None);
        assert_eq!(parse_date(""), None);
    }

    #[test]
    fn test_no_anchors_is_empty() {
        let mut diag = Diagnostics::new();
        assert!(run(&[], &[satellite("s")], &[], &TimelineParams::default(), &mut diag).is_empty());

        // anchors exist but none has a usable date
        let undated = [GraphNode::new("a", "Action", "A"), anchor("b", "not a date")];
        assert!(run(&undated, &[], &[], &TimelineParams::default(), &mut diag).is_empty());
        assert_eq!(diag.count(DiagnosticKind::UnparseableDate), 2);
    }

    #[test]
    fn test_twelve_dates_keep_ten_most_recent() {
        let anchors: Vec<GraphNode> =
            (1..=12).map(|d| anchor(&format!("a{d}"), &format!("2024-01-{d:02}"))).collect();
        // s-old touches only the two oldest dates, s-mixed touches one old and one recent
        let satellites = [satellite("s-old"), satellite("s-mixed")];
        let rels = [
            GraphEdge::new("a1", "s-old"),
            GraphEdge::new("s-old", "a2"),
            GraphEdge::new("a1", "s-mixed"),
            GraphEdge::new("a12", "s-mixed"),
        ];
        let mut diag = Diagnostics::new();
        let layout = run(&anchors, &satellites, &rels, &no_jitter(), &mut diag).into_layout().unwrap();

        assert_eq!(layout.nodes_of(NodeKind::DatePill).count(), 10);
        assert_eq!(layout.nodes_of(NodeKind::Anchor).count(), 10);
        assert!(layout.node("a1").is_none());
        assert!(layout.node("a2").is_none());
        assert!(layout.node("s-old").is_none());
        assert!(layout.node("s-mixed").is_some());

        // newest date on the first row
        let top = layout.node("a12").unwrap();
        assert_eq!(top.rect.y, 140.0 - 30.0);
        assert_eq!(layout.node("date-0").unwrap().label, "Jan 12");

        let conns: Vec<_> = layout.edges_of(EdgeStyle::Connection).collect();
        assert_eq!(conns.len(), 1);
        assert_eq!(conns[0].source_id, "a12");
        assert!(diag.items().iter().any(|d| d.kind == DiagnosticKind::Truncated && d.subject == "dates"));
        assert!(diag.items().iter().any(|d| d.kind == DiagnosticKind::Truncated && d.subject == "satellites"));
    }

    #[test]
    fn test_eight_anchors_on_one_date_place_six() {
        let anchors: Vec<GraphNode> = (0..8).map(|i| anchor(&format!("a{i}"), "2024-05-01")).collect();
        let mut diag = Diagnostics::new();
        let layout = run(&anchors, &[], &[], &TimelineParams::default(), &mut diag).into_layout().unwrap();

        let cards: Vec<_> = layout.nodes_of(NodeKind::Anchor).collect();
        assert_eq!(cards.len(), 6);
        assert_eq!(cards[0].id, "a0");
        assert_eq!(cards[5].id, "a5");
        for (j, card) in cards.iter().enumerate() {
            assert_eq!(card.rect.x, 120.0 + j as f64 * 300.0);
        }
        assert_eq!(diag.count(DiagnosticKind::Truncated), 1);
    }

    #[test]
    fn test_distinct_raw_keys_get_their_own_rows() {
        let anchors = [
            anchor("a", "2024-03-05"),
            anchor("b", "2024-03-05T10:00:00"),
            anchor("c", " 2024-03-05 "),
            anchor("d", "2023-12-31"),
        ];
        let mut diag = Diagnostics::new();
        let layout = run(&anchors, &[], &[], &TimelineParams::default(), &mut diag).into_layout().unwrap();

        assert_eq!(layout.nodes_of(NodeKind::DatePill).count(), 3);
        // same day, two keys: input order, one row each
        let (ya, yb) = (layout.node("a").unwrap().rect.y, layout.node("b").unwrap().rect.y);
        assert_eq!(ya, 110.0);
        assert_eq!(yb, 110.0 + 180.0);
        // whitespace is trimmed before keying
        assert_eq!(layout.node("c").unwrap().rect.y, ya);
        assert_eq!(layout.node("date-1").unwrap().label, "Mar 5");
        assert_eq!(layout.node("rail").unwrap().label, "2024");
        assert!(diag.is_empty());
    }

    #[test]
    fn test_max_dates_counts_raw_keys() {
        // twelve keys over ten calendar days
        let mut anchors: Vec<GraphNode> =
            (1..=10).map(|d| anchor(&format!("a{d}"), &format!("2024-01-{d:02}"))).collect();
        anchors.push(anchor("b9", "2024-01-09T08:00:00"));
        anchors.push(anchor("b10", "2024-01-10T08:00:00"));
        let mut diag = Diagnostics::new();
        let layout = run(&anchors, &[], &[], &TimelineParams::default(), &mut diag).into_layout().unwrap();

        assert_eq!(layout.nodes_of(NodeKind::DatePill).count(), 10);
        assert_eq!(layout.nodes_of(NodeKind::Anchor).count(), 10);
        assert!(layout.node("a1").is_none());
        assert!(layout.node("a2").is_none());
        assert!(layout.node("b10").is_some());
    }

    #[test]
    fn test_satellite_sits_off_its_anchors_without_jitter() {
        let anchors = [anchor("a", "2024-03-05"), anchor("b", "2024-03-05")];
        let rels = [GraphEdge::new("a", "s").with_label("funded"), GraphEdge::new("s", "b")];
        let mut diag = Diagnostics::new();
        let layout =
            run(&anchors, &[satellite("s")], &rels, &no_jitter(), &mut diag).into_layout().unwrap();

        // anchor corners (120, 110) and (420, 110)
        let sat = layout.node("s").unwrap();
        assert_eq!(sat.rect.center(), Point::new(270.0 + 200.0, 110.0 + 50.0));
        assert_eq!(sat.rect.w, 120.0);

        let conns: Vec<_> = layout.edges_of(EdgeStyle::Connection).collect();
        assert_eq!(conns.len(), 2);
        assert_eq!(conns[0].label.as_deref(), Some("funded"));
        assert_eq!(conns[0].path.to_svg(), "M250 190L470 160");
    }

    #[test]
    fn test_short_connections_are_omitted() {
        let anchors = [anchor("a", "2024-03-05")];
        // card center is (250, 190); put the satellite right on it
        let params = TimelineParams { satellite_offset: Point::new(130.0, 80.0), ..no_jitter() };
        let mut diag = Diagnostics::new();
        let layout = run(&anchors, &[satellite("s")], &[GraphEdge::new("a", "s")], &params, &mut diag)
            .into_layout()
            .unwrap();
        assert!(layout.node("s").is_some());
        assert_eq!(layout.edges.len(), 0);
    }

    #[test]
    fn test_seeded_jitter_is_deterministic() {
        let anchors: Vec<GraphNode> = (0..4).map(|i| anchor(&format!("a{i}"), &format!("2024-02-0{}", i + 1))).collect();
        let satellites: Vec<GraphNode> = (0..4).map(|i| satellite(&format!("s{i}"))).collect();
        let rels: Vec<GraphEdge> = (0..4).map(|i| GraphEdge::new(format!("a{i}"), format!("s{i}"))).collect();
        let params = TimelineParams::default();

        let first = run(&anchors, &satellites, &rels, &params, &mut Diagnostics::new());
        let second = run(&anchors, &satellites, &rels, &params, &mut Diagnostics::new());
        assert_eq!(first, second);

        let layout = first.into_layout().unwrap();
        let a0 = layout.node("a0").unwrap().rect;
        let s0 = layout.node("s0").unwrap().rect.center();
        assert!(s0.x >= a0.x + 200.0 && s0.x < a0.x + 300.0);
        assert!(s0.y >= a0.y + 50.0 && s0.y < a0.y + 100.0);

        let reseeded = TimelineParams { seed: 7, ..params };
        assert_ne!(run(&anchors, &satellites, &rels, &reseeded, &mut Diagnostics::new()).into_layout().unwrap(), layout);
    }

    #[test]
    fn test_viewport_contains_every_node() {
        let anchors: Vec<GraphNode> = (0..15).map(|i| anchor(&format!("a{i}"), &format!("2024-06-{:02}", i % 5 + 1))).collect();
        let satellites: Vec<GraphNode> = (0..5).map(|i| satellite(&format!("s{i}"))).collect();
        let rels: Vec<GraphEdge> = (0..5).map(|i| GraphEdge::new(format!("a{}", i * 3), format!("s{i}"))).collect();
        let layout = run(&anchors, &satellites, &rels, &TimelineParams::default(), &mut Diagnostics::new())
            .into_layout()
            .unwrap();
        for n in &layout.nodes {
            assert!(layout.viewport.contains_rect(&n.rect), "{} escapes the viewport", n.id);
        }
    }
}
