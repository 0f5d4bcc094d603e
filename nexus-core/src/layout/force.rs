// Force-directed layout for the neighbors and subgraph views.
//
// Working set:
// - neighbors mode: the focus node plus every node one edge away
// - subgraph mode: the whole snapshot
//
// The simulation follows the usual alpha-cooling model. Each tick:
// 1. alpha decays toward zero
// 2. link springs, many-body charge (both scaled by alpha) and collision push velocities
// 3. velocities decay, positions integrate, and a weak centering pull removes drift
//
// Below alpha_min the alpha-scaled forces switch off, so leftover motion decays geometrically and
// the run settles once the fastest node is under `convergence_threshold`.
// Positions live in fresh working records; the snapshot is only read.

use std::collections::HashMap;
use std::f64::consts::PI;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};

use indexmap::IndexMap;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::Serialize;

use super::spatial_grid::SpatialGrid;
use super::{EdgePath, EdgeStyle, LayoutEdge, LayoutNode, LayoutResult, NodeKind, finish};
use crate::config::ForceParams;
use crate::error::{LayoutError, Result};
use crate::geometry::{BoundsAccumulator, Point, Rect, Size};
use crate::graph::adjacency::Adjacency;
use crate::graph::GraphSnapshot;
use crate::text::truncate_label;

const ALPHA_MIN: f64 = 0.001;
const VELOCITY_DECAY: f64 = 0.4;
/// Squared distance below which charge is softened.
const CHARGE_DISTANCE_MIN2: f64 = 1.0;
const COLLISION_STRENGTH: f64 = 1.0;

/// Shared stop flag. Cloning shares the flag, so a newer request can stop an older run.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }

    /// True when both tokens share one flag.
    pub fn is_same(&self, other: &CancelToken) -> bool {
        Arc::ptr_eq(&self.0, &other.0)
    }
}

/// Uniform scale + translate that fits the padded node bounds into the canvas.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ViewTransform {
    pub scale: f64,
    pub translate_x: f64,
    pub translate_y: f64,
}

impl ViewTransform {
    /// Fit `bounds` into `canvas`, never zooming in past `max_zoom`.
    pub fn fit(bounds: Rect, canvas: Size, max_zoom: f64) -> Self {
        let sx = if bounds.w > 0.0 { canvas.width / bounds.w } else { max_zoom };
        let sy = if bounds.h > 0.0 { canvas.height / bounds.h } else { max_zoom };
        let scale = sx.min(sy).min(max_zoom);
        let c = bounds.center();
        Self {
            scale,
            translate_x: canvas.width / 2.0 - scale * c.x,
            translate_y: canvas.height / 2.0 - scale * c.y,
        }
    }

    pub fn apply(&self, p: Point) -> Point {
        Point::new(p.x * self.scale + self.translate_x, p.y * self.scale + self.translate_y)
    }
}

#[derive(Debug, Clone)]
struct SimNode {
    x: f64,
    y: f64,
    vx: f64,
    vy: f64,
}

#[derive(Debug, Clone)]
struct SimLink {
    source: usize,
    target: usize,
    strength: f64,
    /// Share of the correction applied to the target.
    bias: f64,
}

/// Stepper over working copies of the node positions.
#[derive(Debug, Clone)]
pub struct ForceSimulation {
    nodes: Vec<SimNode>,
    links: Vec<SimLink>,
    params: ForceParams,
    center: Point,
    alpha: f64,
    alpha_decay: f64,
    ticks: u32,
    max_speed: f64,
    rng: StdRng,
    grid: SpatialGrid,
}

impl ForceSimulation {
    /// `links` are index pairs into the `len` nodes. Initial placement is a phyllotaxis spiral
    /// around `center`, perturbed by the seeded generator.
    pub fn new(len: usize, links: &[(usize, usize)], params: &ForceParams, center: Point) -> Self {
        let params = params.clamped();
        let mut rng = StdRng::seed_from_u64(params.seed);
        let golden = PI * (3.0 - 5f64.sqrt());

        let nodes = (0..len)
            .map(|i| {
                let radius = 10.0 * (0.5 + i as f64).sqrt();
                let angle = i as f64 * golden;
                SimNode {
                    x: center.x + radius * angle.cos() + rng.gen_range(-0.5..0.5),
                    y: center.y + radius * angle.sin() + rng.gen_range(-0.5..0.5),
                    vx: 0.0,
                    vy: 0.0,
                }
            })
            .collect();

        let links: Vec<(usize, usize)> = links.iter().copied().filter(|&(s, t)| s < len && t < len).collect();
        let mut count = vec![0usize; len];
        for &(s, t) in &links {
            count[s] += 1;
            count[t] += 1;
        }
        let links = links
            .into_iter()
            .map(|(source, target)| SimLink {
                source,
                target,
                strength: 1.0 / count[source].min(count[target]).max(1) as f64,
                bias: count[source] as f64 / (count[source] + count[target]) as f64,
            })
            .collect();

        Self {
            nodes,
            links,
            center,
            alpha: 1.0,
            alpha_decay: 1.0 - ALPHA_MIN.powf(1.0 / 300.0),
            ticks: 0,
            max_speed: f64::INFINITY,
            rng,
            grid: SpatialGrid::new(params.collision_radius * 2.0),
            params,
        }
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    pub fn alpha(&self) -> f64 {
        self.alpha
    }

    pub fn ticks(&self) -> u32 {
        self.ticks
    }

    /// Fastest node speed after the last tick.
    pub fn max_speed(&self) -> f64 {
        self.max_speed
    }

    pub fn position(&self, i: usize) -> Option<Point> {
        self.nodes.get(i).map(|n| Point::new(n.x, n.y))
    }

    /// Advance one tick; returns the fastest node speed.
    pub fn tick(&mut self) -> f64 {
        self.alpha += (0.0 - self.alpha) * self.alpha_decay;
        if self.alpha >= ALPHA_MIN {
            self.apply_links();
            self.apply_charge();
        }
        self.apply_collision();

        let mut max_speed: f64 = 0.0;
        for n in &mut self.nodes {
            n.vx *= 1.0 - VELOCITY_DECAY;
            n.vy *= 1.0 - VELOCITY_DECAY;
            n.x += n.vx;
            n.y += n.vy;
            max_speed = max_speed.max((n.vx * n.vx + n.vy * n.vy).sqrt());
        }
        self.apply_centering();

        self.ticks += 1;
        self.max_speed = max_speed;
        tracing::trace!(tick = self.ticks, alpha = self.alpha, max_speed, "force tick");
        max_speed
    }

    fn jiggle(&mut self) -> f64 {
        (self.rng.r#gen::<f64>() - 0.5) * 1e-6
    }

    fn apply_links(&mut self) {
        for idx in 0..self.links.len() {
            let SimLink { source, target, strength, bias } = self.links[idx];
            let (s, t) = (&self.nodes[source], &self.nodes[target]);
            let mut dx = t.x + t.vx - s.x - s.vx;
            let mut dy = t.y + t.vy - s.y - s.vy;
            if dx == 0.0 {
                dx = self.jiggle();
            }
            if dy == 0.0 {
                dy = self.jiggle();
            }
            let l = (dx * dx + dy * dy).sqrt();
            let k = (l - self.params.link_distance) / l * self.alpha * strength;
            let (fx, fy) = (dx * k, dy * k);

            let t = &mut self.nodes[target];
            t.vx -= fx * bias;
            t.vy -= fy * bias;
            let s = &mut self.nodes[source];
            s.vx += fx * (1.0 - bias);
            s.vy += fy * (1.0 - bias);
        }
    }

    fn apply_charge(&mut self) {
        let strength = self.params.charge_strength;
        if strength == 0.0 {
            return;
        }
        let n = self.nodes.len();
        for i in 0..n {
            for j in 0..n {
                if i == j {
                    continue;
                }
                let mut dx = self.nodes[j].x - self.nodes[i].x;
                let mut dy = self.nodes[j].y - self.nodes[i].y;
                if dx == 0.0 {
                    dx = self.jiggle();
                }
                if dy == 0.0 {
                    dy = self.jiggle();
                }
                let mut l2 = dx * dx + dy * dy;
                if l2 < CHARGE_DISTANCE_MIN2 {
                    l2 = (CHARGE_DISTANCE_MIN2 * l2).sqrt();
                }
                let w = strength * self.alpha / l2;
                self.nodes[i].vx += dx * w;
                self.nodes[i].vy += dy * w;
            }
        }
    }

    fn apply_collision(&mut self) {
        let r = self.params.collision_radius;
        if r <= 0.0 {
            return;
        }
        self.grid.clear();
        for (i, n) in self.nodes.iter().enumerate() {
            self.grid.insert(i, Point::new(n.x + n.vx, n.y + n.vy), r);
        }
        let min_dist = 2.0 * r;
        for i in 0..self.nodes.len() {
            let p = Point::new(self.nodes[i].x + self.nodes[i].vx, self.nodes[i].y + self.nodes[i].vy);
            for j in self.grid.query(p, min_dist) {
                if j <= i {
                    continue;
                }
                let q = &self.nodes[j];
                let mut dx = p.x - (q.x + q.vx);
                let mut dy = p.y - (q.y + q.vy);
                let mut l2 = dx * dx + dy * dy;
                if l2 >= min_dist * min_dist {
                    continue;
                }
                if dx == 0.0 {
                    dx = self.jiggle();
                    l2 += dx * dx;
                }
                if dy == 0.0 {
                    dy = self.jiggle();
                    l2 += dy * dy;
                }
                let l = l2.sqrt();
                // equal radii: the correction is split evenly
                let k = (min_dist - l) / l * COLLISION_STRENGTH * 0.5;
                self.nodes[i].vx += dx * k;
                self.nodes[i].vy += dy * k;
                self.nodes[j].vx -= dx * k;
                self.nodes[j].vy -= dy * k;
            }
        }
    }

    fn apply_centering(&mut self) {
        let n = self.nodes.len();
        if n == 0 || self.params.center_strength == 0.0 {
            return;
        }
        let (sx, sy) = self.nodes.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
        let shift_x = (sx / n as f64 - self.center.x) * self.params.center_strength;
        let shift_y = (sy / n as f64 - self.center.y) * self.params.center_strength;
        for p in &mut self.nodes {
            p.x -= shift_x;
            p.y -= shift_y;
        }
    }
}

/// Result plus run statistics.
#[derive(Debug, Clone)]
pub struct ForceOutcome {
    pub result: LayoutResult,
    pub ticks: u32,
    pub converged: bool,
    pub max_speed: f64,
}

/// Lay out the neighbors of `focus_id`, or the whole snapshot when `focus_id` is `None`.
pub fn run(
    focus_id: Option<&str>,
    snapshot: &GraphSnapshot,
    canvas: Size,
    params: &ForceParams,
    cancel: &CancelToken,
) -> Result<LayoutResult> {
    simulate(focus_id, snapshot, canvas, params, cancel).map(|outcome| outcome.result)
}

/// Like [`run`], also reporting how the simulation ended.
pub fn simulate(
    focus_id: Option<&str>,
    snapshot: &GraphSnapshot,
    canvas: Size,
    params: &ForceParams,
    cancel: &CancelToken,
) -> Result<ForceOutcome> {
    settle(focus_id, snapshot, canvas, params, cancel, |_| {})
}

/// Runs the simulation, calling `on_tick` with the tick count after every step.
fn settle(
    focus_id: Option<&str>,
    snapshot: &GraphSnapshot,
    canvas: Size,
    params: &ForceParams,
    cancel: &CancelToken,
    mut on_tick: impl FnMut(u32),
) -> Result<ForceOutcome> {
    let params = params.clamped();
    let empty = || ForceOutcome { result: LayoutResult::Empty, ticks: 0, converged: true, max_speed: 0.0 };

    let members = working_set(focus_id, snapshot);
    if members.is_empty() {
        tracing::debug!(?focus_id, "force layout: empty working set");
        return Ok(empty());
    }

    let slot: HashMap<&str, usize> = members.iter().enumerate().map(|(i, id)| (*id, i)).collect();
    let edges: Vec<_> = snapshot
        .edges()
        .iter()
        .filter_map(|e| Some((e, *slot.get(e.source_id.as_str())?, *slot.get(e.target_id.as_str())?)))
        .filter(|(_, s, t)| s != t)
        .collect();
    let links: Vec<(usize, usize)> = edges.iter().map(|&(_, s, t)| (s, t)).collect();

    let mut sim = ForceSimulation::new(members.len(), &links, &params, canvas.center());
    let mut converged = false;
    while sim.ticks() < params.max_ticks {
        if cancel.is_cancelled() {
            tracing::debug!(ticks = sim.ticks(), "force layout cancelled");
            return Err(LayoutError::Cancelled);
        }
        let speed = sim.tick();
        on_tick(sim.ticks());
        if speed < params.convergence_threshold {
            converged = true;
            break;
        }
    }
    tracing::debug!(nodes = sim.len(), ticks = sim.ticks(), converged, max_speed = sim.max_speed(), "force layout settled");

    let mut bounds = BoundsAccumulator::new();
    let mut nodes = Vec::with_capacity(members.len());
    let mut type_counts: IndexMap<String, usize> = IndexMap::new();
    for (i, id) in members.iter().enumerate() {
        let Some(node) = snapshot.node(id) else { continue };
        let Some(center) = sim.position(i) else { continue };
        let is_focus = focus_id == Some(*id);
        let radius = if is_focus { params.focus_radius } else { params.node_radius };
        bounds.add_circle(center, radius);
        *type_counts.entry(node.node_type.clone()).or_default() += 1;
        nodes.push(
            LayoutNode::new(
                node.id.clone(),
                Rect::centered(center, radius * 2.0, radius * 2.0),
                if is_focus { NodeKind::Focus } else { NodeKind::Neighbor },
                truncate_label(&node.name, params.label_max_chars),
            )
            .with_type(node.node_type.clone()),
        );
    }

    let layout_edges = edges
        .iter()
        .filter_map(|&(e, s, t)| {
            Some(LayoutEdge {
                source_id: e.source_id.clone(),
                target_id: e.target_id.clone(),
                path: EdgePath::line(sim.position(s)?, sim.position(t)?),
                style: EdgeStyle::Link,
                label: e.label.as_deref().map(|l| truncate_label(l, params.label_max_chars)),
            })
        })
        .collect();

    let transform = bounds
        .finish()
        .map(|b| ViewTransform::fit(b.expand(params.fit_padding), canvas, params.max_zoom));

    let result = match finish(nodes, layout_edges, params.viewport_padding) {
        LayoutResult::Ready(mut layout) => {
            layout.transform = transform;
            layout.type_counts = type_counts;
            LayoutResult::Ready(layout)
        }
        LayoutResult::Empty => LayoutResult::Empty,
    };

    Ok(ForceOutcome { result, ticks: sim.ticks(), converged, max_speed: sim.max_speed() })
}

/// Ids to simulate, focus first in neighbors mode, otherwise snapshot order.
fn working_set<'a>(focus_id: Option<&str>, snapshot: &'a GraphSnapshot) -> Vec<&'a str> {
    let Some(focus_id) = focus_id else {
        return snapshot.nodes().iter().map(|n| n.id.as_str()).collect();
    };
    let Some(focus) = snapshot.node(focus_id) else {
        tracing::debug!(focus_id, "focus node is not in the snapshot");
        return Vec::new();
    };

    let adjacency = Adjacency::from_snapshot(snapshot);
    let neighbors: Vec<&'a str> = adjacency
        .get_neighbors(focus_id)
        .iter()
        .filter(|(id, _)| id != focus_id)
        .filter_map(|(id, _)| snapshot.node(id).map(|n| n.id.as_str()))
        .collect();
    if neighbors.is_empty() {
        return Vec::new();
    }

    let mut members = Vec::with_capacity(neighbors.len() + 1);
    members.push(focus.id.as_str());
    members.extend(neighbors);
    members
}
