// Geometry helpers shared by every layout.
//
// All coordinates are f64 pixels, y grows downward (SVG convention).

use serde::{Deserialize, Serialize};

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn distance(&self, other: &Point) -> f64 {
        let dx = other.x - self.x;
        let dy = other.y - self.y;
        (dx * dx + dy * dy).sqrt()
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Serialize, Deserialize)]
pub struct Size {
    pub width: f64,
    pub height: f64,
}

impl Size {
    pub fn new(width: f64, height: f64) -> Self {
        Self { width, height }
    }

    pub fn center(&self) -> Point {
        Point::new(self.width / 2.0, self.height / 2.0)
    }
}

impl Default for Size {
    fn default() -> Self {
        Self { width: 800.0, height: 600.0 }
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Default, Serialize)]
pub struct Rect {
    pub x: f64,
    pub y: f64,
    #[serde(rename = "width")]
    pub w: f64,
    #[serde(rename = "height")]
    pub h: f64,
}

impl Rect {
    pub fn new(x: f64, y: f64, w: f64, h: f64) -> Self {
        Self { x, y, w, h }
    }

    /// Rect of the given size centered on `c`.
    pub fn centered(c: Point, w: f64, h: f64) -> Self {
        Self { x: c.x - w / 2.0, y: c.y - h / 2.0, w, h }
    }

    pub fn right(&self) -> f64 {
        self.x + self.w
    }

    pub fn bottom(&self) -> f64 {
        self.y + self.h
    }

    pub fn center(&self) -> Point {
        Point::new(self.x + self.w / 2.0, self.y + self.h / 2.0)
    }

    pub fn union(&self, other: &Rect) -> Rect {
        let x0 = self.x.min(other.x);
        let y0 = self.y.min(other.y);
        let x1 = self.right().max(other.right());
        let y1 = self.bottom().max(other.bottom());
        Rect { x: x0, y: y0, w: x1 - x0, h: y1 - y0 }
    }

    pub fn expand(&self, pad: f64) -> Rect {
        Rect { x: self.x - pad, y: self.y - pad, w: self.w + 2.0 * pad, h: self.h + 2.0 * pad }
    }

    /// True when `other` lies fully inside `self` (edges may touch).
    pub fn contains_rect(&self, other: &Rect) -> bool {
        const EPS: f64 = 1e-6;
        other.x >= self.x - EPS
            && other.y >= self.y - EPS
            && other.right() <= self.right() + EPS
            && other.bottom() <= self.bottom() + EPS
    }
}

/// Running union of rectangles. Empty until the first `add`.
#[derive(Debug, Clone, Default)]
pub struct BoundsAccumulator {
    bounds: Option<Rect>,
}

impl BoundsAccumulator {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn add(&mut self, r: Rect) {
        self.bounds = Some(match self.bounds {
            Some(b) => b.union(&r),
            None => r,
        });
    }

    pub fn add_circle(&mut self, c: Point, radius: f64) {
        self.add(Rect::centered(c, radius * 2.0, radius * 2.0));
    }

    pub fn finish(&self) -> Option<Rect> {
        self.bounds
    }
}

/// Point at `deg` degrees and distance `r` from `(cx, cy)`.
pub fn polar(cx: f64, cy: f64, r: f64, deg: f64) -> Point {
    let rad = deg.to_radians();
    Point::new(cx + r * rad.cos(), cy + r * rad.sin())
}

/// Cartesian offset `(dx, dy)` back to (radius, degrees).
pub fn to_polar(dx: f64, dy: f64) -> (f64, f64) {
    ((dx * dx + dy * dy).sqrt(), dy.atan2(dx).to_degrees())
}

/// Arithmetic mean of the points, `None` for an empty slice.
pub fn centroid(points: &[Point]) -> Option<Point> {
    if points.is_empty() {
        return None;
    }
    let n = points.len() as f64;
    let (sx, sy) = points.iter().fold((0.0, 0.0), |(sx, sy), p| (sx + p.x, sy + p.y));
    Some(Point::new(sx / n, sy / n))
}

/// Cubic bezier descriptor.
#[derive(Debug, Copy, Clone, PartialEq, Serialize)]
pub struct Cubic {
    pub start: Point,
    pub c1: Point,
    pub c2: Point,
    pub end: Point,
}

/// Horizontal "flow" curve: control points sit `tension` of the horizontal span inward from each
/// endpoint, at the endpoint's own height.
pub fn cubic_flow_controls(start: Point, end: Point, tension: f64) -> Cubic {
    let dx = end.x - start.x;
    Cubic {
        start,
        c1: Point::new(start.x + dx * tension, start.y),
        c2: Point::new(end.x - dx * tension, end.y),
        end,
    }
}

impl Cubic {
    /// SVG path data, `M.. C..`.
    pub fn to_svg(&self) -> String {
        format!(
            "M{} {}C{} {} {} {} {} {}",
            self.start.x, self.start.y, self.c1.x, self.c1.y, self.c2.x, self.c2.y, self.end.x, self.end.y
        )
    }
}
