// Layout parameters.
//
// One plain struct per algorithm, `Default` holding the tuned constants. Hosts send partial JSON
// option objects (`#[serde(default)]`), and every entry point runs `clamped()` first so
// out-of-range values are pulled back into range instead of failing.

use serde::{Deserialize, Serialize};

use crate::geometry::Point;

pub const DEFAULT_SEED: u64 = 0x5EED;

fn clamp_finite(v: f64, lo: f64, hi: f64, fallback: f64) -> f64 {
    if v.is_finite() { v.clamp(lo, hi) } else { fallback }
}

fn non_negative(v: f64, fallback: f64) -> f64 {
    if v.is_finite() { v.max(0.0) } else { fallback }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ForceParams {
    /// Spring rest length along each edge.
    pub link_distance: f64,
    /// Pairwise many-body strength; negative repels.
    pub charge_strength: f64,
    /// Minimum center-to-center separation is twice this.
    pub collision_radius: f64,
    pub max_ticks: u32,
    /// Max per-node speed (px/tick) below which the run counts as settled.
    pub convergence_threshold: f64,
    /// Upper bound on the fit-to-canvas scale.
    pub max_zoom: f64,
    /// Fraction of the centroid offset removed per tick.
    pub center_strength: f64,
    pub focus_radius: f64,
    pub node_radius: f64,
    /// Padding around the node bounds when fitting the view.
    pub fit_padding: f64,
    pub label_max_chars: usize,
    pub viewport_padding: f64,
    pub seed: u64,
}

impl Default for ForceParams {
    fn default() -> Self {
        Self {
            link_distance: 80.0,
            charge_strength: -300.0,
            collision_radius: 35.0,
            max_ticks: 500,
            convergence_threshold: 0.05,
            max_zoom: 3.0,
            center_strength: 0.1,
            focus_radius: 20.0,
            node_radius: 15.0,
            fit_padding: 40.0,
            label_max_chars: 20,
            viewport_padding: 20.0,
            seed: DEFAULT_SEED,
        }
    }
}

impl ForceParams {
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            link_distance: clamp_finite(self.link_distance, 1.0, 2000.0, d.link_distance),
            charge_strength: clamp_finite(self.charge_strength, -5000.0, 0.0, d.charge_strength),
            collision_radius: clamp_finite(self.collision_radius, 0.0, 500.0, d.collision_radius),
            max_ticks: self.max_ticks.clamp(1, 5000),
            convergence_threshold: clamp_finite(self.convergence_threshold, 1e-6, 10.0, d.convergence_threshold),
            max_zoom: clamp_finite(self.max_zoom, 0.1, 10.0, d.max_zoom),
            center_strength: clamp_finite(self.center_strength, 0.0, 1.0, d.center_strength),
            focus_radius: non_negative(self.focus_radius, d.focus_radius),
            node_radius: non_negative(self.node_radius, d.node_radius),
            fit_padding: non_negative(self.fit_padding, d.fit_padding),
            label_max_chars: self.label_max_chars.max(1),
            viewport_padding: non_negative(self.viewport_padding, d.viewport_padding),
            seed: self.seed,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct ColumnFlowParams {
    pub node_height: f64,
    /// Horizontal text padding inside a node.
    pub node_padding: f64,
    pub min_node_width: f64,
    pub max_node_width: f64,
    pub column_gap: f64,
    /// Gap between rows in the source and middle columns.
    pub row_gap: f64,
    /// Gap between rows in the target column.
    pub target_row_gap: f64,
    /// Extra space between the funding and action sections.
    pub section_gap: f64,
    /// Extra vertical spread between split target instances.
    pub split_gap: f64,
    /// A label in at least this many relationships makes the diagram "dense".
    pub density_threshold: usize,
    /// Row gap multiplier applied when dense.
    pub density_multiplier: f64,
    pub label_max_chars: usize,
    pub font_size: f64,
    pub font_family: String,
    pub start_y: f64,
    /// Horizontal fraction of the span used for curve control points.
    pub curve_tension: f64,
    pub nominal_width: f64,
    pub viewport_padding: f64,
}

impl Default for ColumnFlowParams {
    fn default() -> Self {
        Self {
            node_height: 24.0,
            node_padding: 8.0,
            min_node_width: 80.0,
            max_node_width: 200.0,
            column_gap: 50.0,
            row_gap: 8.0,
            target_row_gap: 24.0,
            section_gap: 36.0,
            split_gap: 100.0,
            density_threshold: 3,
            density_multiplier: 1.5,
            label_max_chars: 13,
            font_size: 16.0,
            font_family: "Archivo".to_string(),
            start_y: 20.0,
            curve_tension: 0.4,
            nominal_width: 500.0,
            viewport_padding: 20.0,
        }
    }
}

impl ColumnFlowParams {
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        let min_node_width = non_negative(self.min_node_width, d.min_node_width);
        Self {
            node_height: clamp_finite(self.node_height, 1.0, 1000.0, d.node_height),
            node_padding: non_negative(self.node_padding, d.node_padding),
            min_node_width,
            max_node_width: non_negative(self.max_node_width, d.max_node_width).max(min_node_width),
            column_gap: non_negative(self.column_gap, d.column_gap),
            row_gap: non_negative(self.row_gap, d.row_gap),
            target_row_gap: non_negative(self.target_row_gap, d.target_row_gap),
            section_gap: non_negative(self.section_gap, d.section_gap),
            split_gap: non_negative(self.split_gap, d.split_gap),
            density_threshold: self.density_threshold.max(1),
            density_multiplier: clamp_finite(self.density_multiplier, 1.0, 10.0, d.density_multiplier),
            label_max_chars: self.label_max_chars.max(1),
            font_size: clamp_finite(self.font_size, 1.0, 200.0, d.font_size),
            font_family: self.font_family.clone(),
            start_y: if self.start_y.is_finite() { self.start_y } else { d.start_y },
            curve_tension: clamp_finite(self.curve_tension, 0.0, 1.0, d.curve_tension),
            nominal_width: non_negative(self.nominal_width, d.nominal_width),
            viewport_padding: non_negative(self.viewport_padding, d.viewport_padding),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RadialClusterParams {
    pub canvas_width: f64,
    pub canvas_height: f64,
    /// Scale applied to the nominal circle radii so markers fit.
    pub circle_scale: f64,
    /// Overlap region radius as a fraction of the smaller circle.
    pub overlap_region_fraction: f64,
    pub overlap_cap: usize,
    pub exclusive_a_cap: usize,
    pub exclusive_b_cap: usize,
    pub show_placeholders: bool,
    pub marker_height: f64,
    pub marker_padding: f64,
    /// Width of the colored bar at the left of each marker.
    pub marker_bar: f64,
    pub char_width: f64,
    /// Gap between a circle's top edge and its title baseline.
    pub title_offset: f64,
    pub viewport_padding: f64,
}

impl Default for RadialClusterParams {
    fn default() -> Self {
        Self {
            canvas_width: 800.0,
            canvas_height: 800.0,
            circle_scale: 0.6,
            overlap_region_fraction: 0.35,
            overlap_cap: 3,
            exclusive_a_cap: 3,
            exclusive_b_cap: 2,
            show_placeholders: true,
            marker_height: 22.0,
            marker_padding: 6.0,
            marker_bar: 4.0,
            char_width: 7.0,
            title_offset: 18.0,
            viewport_padding: 20.0,
        }
    }
}

impl RadialClusterParams {
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        Self {
            canvas_width: clamp_finite(self.canvas_width, 100.0, 10_000.0, d.canvas_width),
            canvas_height: clamp_finite(self.canvas_height, 100.0, 10_000.0, d.canvas_height),
            circle_scale: clamp_finite(self.circle_scale, 0.05, 2.0, d.circle_scale),
            overlap_region_fraction: clamp_finite(self.overlap_region_fraction, 0.0, 1.0, d.overlap_region_fraction),
            overlap_cap: self.overlap_cap.min(64),
            exclusive_a_cap: self.exclusive_a_cap.min(64),
            exclusive_b_cap: self.exclusive_b_cap.min(64),
            show_placeholders: self.show_placeholders,
            marker_height: clamp_finite(self.marker_height, 1.0, 200.0, d.marker_height),
            marker_padding: non_negative(self.marker_padding, d.marker_padding),
            marker_bar: non_negative(self.marker_bar, d.marker_bar),
            char_width: clamp_finite(self.char_width, 0.5, 100.0, d.char_width),
            title_offset: non_negative(self.title_offset, d.title_offset),
            viewport_padding: non_negative(self.viewport_padding, d.viewport_padding),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimelineParams {
    pub max_dates: usize,
    pub max_items_per_date: usize,
    /// Satellite offset from the centroid of its anchors.
    pub satellite_offset: Point,
    /// Full width of the uniform jitter interval per axis; zero disables jitter.
    pub jitter_range: Point,
    pub rail_x: f64,
    pub first_date_y: f64,
    pub date_gap: f64,
    pub card_start_x: f64,
    pub card_spacing: f64,
    pub card_width: f64,
    pub card_height: f64,
    /// Cards sit this far above their date's rail y.
    pub card_lift: f64,
    pub pill_width: f64,
    pub pill_height: f64,
    pub satellite_width: f64,
    pub satellite_height: f64,
    pub card_label_chars: usize,
    pub satellite_label_chars: usize,
    /// Connections shorter than this are not emitted.
    pub min_connection_length: f64,
    pub viewport_padding: f64,
    pub seed: u64,
}

impl Default for TimelineParams {
    fn default() -> Self {
        Self {
            max_dates: 10,
            max_items_per_date: 6,
            satellite_offset: Point::new(200.0, 50.0),
            jitter_range: Point::new(100.0, 50.0),
            rail_x: 80.0,
            first_date_y: 140.0,
            date_gap: 180.0,
            card_start_x: 120.0,
            card_spacing: 300.0,
            card_width: 260.0,
            card_height: 160.0,
            card_lift: 30.0,
            pill_width: 30.0,
            pill_height: 177.0,
            satellite_width: 120.0,
            satellite_height: 28.0,
            card_label_chars: 30,
            satellite_label_chars: 12,
            min_connection_length: 10.0,
            viewport_padding: 20.0,
            seed: DEFAULT_SEED,
        }
    }
}

impl TimelineParams {
    pub fn clamped(&self) -> Self {
        let d = Self::default();
        let finite_point = |p: Point, fallback: Point| {
            if p.x.is_finite() && p.y.is_finite() { p } else { fallback }
        };
        let jitter = finite_point(self.jitter_range, d.jitter_range);
        Self {
            max_dates: self.max_dates,
            max_items_per_date: self.max_items_per_date,
            satellite_offset: finite_point(self.satellite_offset, d.satellite_offset),
            jitter_range: Point::new(jitter.x.max(0.0), jitter.y.max(0.0)),
            rail_x: if self.rail_x.is_finite() { self.rail_x } else { d.rail_x },
            first_date_y: if self.first_date_y.is_finite() { self.first_date_y } else { d.first_date_y },
            date_gap: non_negative(self.date_gap, d.date_gap),
            card_start_x: if self.card_start_x.is_finite() { self.card_start_x } else { d.card_start_x },
            card_spacing: non_negative(self.card_spacing, d.card_spacing),
            card_width: non_negative(self.card_width, d.card_width),
            card_height: non_negative(self.card_height, d.card_height),
            card_lift: if self.card_lift.is_finite() { self.card_lift } else { d.card_lift },
            pill_width: non_negative(self.pill_width, d.pill_width),
            pill_height: non_negative(self.pill_height, d.pill_height),
            satellite_width: non_negative(self.satellite_width, d.satellite_width),
            satellite_height: non_negative(self.satellite_height, d.satellite_height),
            card_label_chars: self.card_label_chars.max(1),
            satellite_label_chars: self.satellite_label_chars.max(1),
            min_connection_length: non_negative(self.min_connection_length, d.min_connection_length),
            viewport_padding: non_negative(self.viewport_padding, d.viewport_padding),
            seed: self.seed,
        }
    }
}

/// Everything a host can tune, as sent alongside a layout request.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EngineConfig {
    pub force: ForceParams,
    pub column_flow: ColumnFlowParams,
    pub radial: RadialClusterParams,
    pub timeline: TimelineParams,
    /// Overrides every algorithm's `viewportPadding` when set.
    pub viewport_padding: Option<f64>,
    /// Overrides every algorithm's seed when set.
    pub seed: Option<u64>,
}

impl EngineConfig {
    /// Apply the shared overrides, then clamp each algorithm's params.
    pub fn clamped(&self) -> Self {
        let mut cfg = self.clone();
        if let Some(pad) = self.viewport_padding {
            cfg.force.viewport_padding = pad;
            cfg.column_flow.viewport_padding = pad;
            cfg.radial.viewport_padding = pad;
            cfg.timeline.viewport_padding = pad;
        }
        if let Some(seed) = self.seed {
            cfg.force.seed = seed;
            cfg.timeline.seed = seed;
        }
        cfg.force = cfg.force.clamped();
        cfg.column_flow = cfg.column_flow.clamped();
        cfg.radial = cfg.radial.clamped();
        cfg.timeline = cfg.timeline.clamped();
        cfg
    }
}
