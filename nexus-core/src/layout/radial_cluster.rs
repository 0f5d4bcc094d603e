// Two-circle cluster diagram.
//
// Members of the two top-ranked clusters are split into three disjoint regions (in both, only A,
// only B). Each region has a fixed marker cap and a fixed table of polar slots around its own
// center; members beyond the cap are not shown, unused slots become placeholder markers.
// Circle size does not follow member count.

use std::collections::HashSet;

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::Value;

use super::{LayoutNode, LayoutResult, NodeKind, finish};
use crate::config::RadialClusterParams;
use crate::geometry::{Point, Rect, polar};

const NOMINAL_CANVAS: f64 = 800.0;
const PLACEHOLDER_LABEL: &str = "—";

/// (angle in degrees, fraction of the region radius)
const OVERLAP_SLOTS: &[(f64, f64)] = &[(0.0, 0.6), (120.0, 0.6), (240.0, 0.6)];
const A_SLOTS: &[(f64, f64)] = &[(-50.0, 0.55), (70.0, 0.55), (190.0, 0.65)];
const B_SLOTS: &[(f64, f64)] = &[(-30.0, 0.55), (150.0, 0.6)];

fn scalar_string<'de, D: Deserializer<'de>>(d: D) -> std::result::Result<Option<String>, D::Error> {
    Ok(match Option::<Value>::deserialize(d)? {
        Some(Value::String(s)) => Some(s),
        Some(Value::Number(n)) => Some(n.to_string()),
        Some(Value::Bool(b)) => Some(b.to_string()),
        _ => None,
    })
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ClusterMember {
    #[serde(deserialize_with = "scalar_string")]
    pub id: Option<String>,
    #[serde(deserialize_with = "scalar_string")]
    pub name: Option<String>,
}

impl ClusterMember {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Self { id: Some(id.into()), name: Some(name.into()) }
    }

    pub fn label(&self) -> &str {
        self.name
            .as_deref()
            .filter(|s| !s.is_empty())
            .or(self.id.as_deref())
            .unwrap_or("Entity")
    }
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Cluster {
    /// Property value shared by the members.
    #[serde(deserialize_with = "scalar_string")]
    pub value: Option<String>,
    /// Total member count; the member list may be a sample.
    pub count: Option<usize>,
    #[serde(alias = "nodes")]
    pub members: Vec<ClusterMember>,
}

impl Cluster {
    fn title(&self) -> String {
        let count = self.count.unwrap_or(self.members.len());
        format!("{} ({count})", self.value.as_deref().unwrap_or(""))
    }

    fn ids(&self) -> HashSet<&str> {
        self.members.iter().filter_map(|m| m.id.as_deref()).collect()
    }
}

#[derive(Debug, Copy, Clone)]
struct Circle {
    center: Point,
    r: f64,
}

impl Circle {
    fn rect(&self) -> Rect {
        Rect::centered(self.center, self.r * 2.0, self.r * 2.0)
    }
}

struct Region<'a> {
    name: &'static str,
    kind: NodeKind,
    origin: Point,
    radius: f64,
    slots: &'static [(f64, f64)],
    cap: usize,
    members: Vec<&'a ClusterMember>,
}

/// Lay out the two clusters. `None` for both means nothing was selected.
pub fn run(a: Option<&Cluster>, b: Option<&Cluster>, params: &RadialClusterParams) -> LayoutResult {
    if a.is_none() && b.is_none() {
        tracing::debug!("radial cluster: no clusters selected");
        return LayoutResult::Empty;
    }
    let p = params.clamped();

    let sx = p.canvas_width / NOMINAL_CANVAS;
    let sy = p.canvas_height / NOMINAL_CANVAS;
    let s = sx.min(sy);
    let circle_a = Circle { center: Point::new(320.0 * sx, 320.0 * sy), r: (360.0 * p.circle_scale).round() * s };
    let circle_b = Circle { center: Point::new(480.0 * sx, 440.0 * sy), r: (330.0 * p.circle_scale).round() * s };
    let overlap_center = Point::new(
        (circle_a.center.x + circle_b.center.x) / 2.0,
        (circle_a.center.y + circle_b.center.y) / 2.0,
    );
    let overlap_r = circle_a.r.min(circle_b.r) * p.overlap_region_fraction;

    let empty = Cluster::default();
    let (ca, cb) = (a.unwrap_or(&empty), b.unwrap_or(&empty));
    let (ids_a, ids_b) = (ca.ids(), cb.ids());
    let in_set = |m: &ClusterMember, set: &HashSet<&str>| m.id.as_deref().is_some_and(|id| set.contains(id));

    let regions = [
        Region {
            name: "overlap",
            kind: NodeKind::Overlap,
            origin: overlap_center,
            radius: overlap_r,
            slots: OVERLAP_SLOTS,
            cap: p.overlap_cap,
            members: dedupe(ca.members.iter().filter(|m| in_set(*m, &ids_b))),
        },
        Region {
            name: "a",
            kind: NodeKind::ExclusiveA,
            origin: circle_a.center,
            radius: circle_a.r,
            slots: A_SLOTS,
            cap: p.exclusive_a_cap,
            members: dedupe(ca.members.iter().filter(|m| !in_set(*m, &ids_b))),
        },
        Region {
            name: "b",
            kind: NodeKind::ExclusiveB,
            origin: circle_b.center,
            radius: circle_b.r,
            slots: B_SLOTS,
            cap: p.exclusive_b_cap,
            members: dedupe(cb.members.iter().filter(|m| !in_set(*m, &ids_a))),
        },
    ];

    let mut nodes = Vec::new();
    for (id, circle, cluster, fallback) in [("cluster-a", circle_a, a, "Cluster A"), ("cluster-b", circle_b, b, "Cluster B")] {
        let title = cluster.map(Cluster::title).unwrap_or_else(|| fallback.to_string());
        let value = cluster.and_then(|c| c.value.clone()).unwrap_or_else(|| fallback.to_string());
        nodes.push(LayoutNode::new(id, circle.rect(), NodeKind::ClusterCircle, value));

        let title_center = Point::new(circle.center.x, circle.center.y - circle.r - p.title_offset);
        let title_w = title.chars().count() as f64 * p.char_width;
        nodes.push(LayoutNode::new(
            format!("{id}-title"),
            Rect::centered(title_center, title_w, p.marker_height),
            NodeKind::ClusterTitle,
            title,
        ));
    }

    let mut used_ids: HashSet<String> = nodes.iter().map(|n| n.id.clone()).collect();
    for region in &regions {
        let shown = region.members.len().min(region.cap);
        if region.members.len() > shown {
            tracing::debug!(region = region.name, hidden = region.members.len() - shown, "cluster markers capped");
        }
        let slot_count = if p.show_placeholders { region.cap } else { shown };

        for k in 0..slot_count {
            let center = slot_position(region, k);
            let (label, kind, member_id) = match region.members.get(k).filter(|_| k < shown) {
                Some(m) => (m.label().to_string(), region.kind, m.id.clone()),
                None => (PLACEHOLDER_LABEL.to_string(), NodeKind::Placeholder, None),
            };
            let id = member_id
                .filter(|id| !used_ids.contains(id))
                .unwrap_or_else(|| format!("marker-{}-{k}", region.name));
            used_ids.insert(id.clone());

            let width = 2.0 * p.marker_padding + p.marker_bar + label.chars().count() as f64 * p.char_width;
            nodes.push(LayoutNode::new(id, Rect::centered(center, width, p.marker_height), kind, label));
        }
    }

    tracing::debug!(nodes = nodes.len(), "radial cluster laid out");
    finish(nodes, Vec::new(), p.viewport_padding)
}

/// Slot `k` of a region: the fixed table first, then evenly spread angles at the last radius.
fn slot_position(region: &Region<'_>, k: usize) -> Point {
    let (deg, frac) = match region.slots.get(k) {
        Some(&slot) => slot,
        None => {
            let frac = region.slots.last().map(|s| s.1).unwrap_or(0.6);
            (k as f64 * 360.0 / region.cap.max(1) as f64, frac)
        }
    };
    polar(region.origin.x, region.origin.y, region.radius * frac, deg)
}

/// Members in order, dropping repeated ids. Members without an id are always kept.
fn dedupe<'a>(members: impl Iterator<Item = &'a ClusterMember>) -> Vec<&'a ClusterMember> {
    let mut seen = HashSet::new();
    members
        .filter(|m| m.id.as_deref().is_none_or(|id| seen.insert(id)))
        .collect()
}
