// Spatial hash grid for collision queries.
//
// Instead of checking every pair of nodes each tick, circles are bucketed into square cells so a
// query only looks at the few cells its own bounding square touches.

use std::collections::HashMap;

use crate::geometry::Point;

/// A spatial hash grid of circles, identified by the caller's index.
#[derive(Debug, Clone)]
pub struct SpatialGrid {
    /// Size of each cell in the grid.
    cell_size: f64,
    /// Map from cell coordinates to the indices of circles touching that cell.
    cells: HashMap<(i64, i64), Vec<usize>>,
}

impl SpatialGrid {
    /// Cell size should be roughly the diameter of the largest expected circle.
    pub fn new(cell_size: f64) -> Self {
        Self {
            cell_size: if cell_size.is_finite() { cell_size.max(1.0) } else { 1.0 },
            cells: HashMap::new(),
        }
    }

    fn cell_range(&self, center: Point, radius: f64) -> impl Iterator<Item = (i64, i64)> {
        let cell = |v: f64| (v / self.cell_size).floor() as i64;
        let (min_x, max_x) = (cell(center.x - radius), cell(center.x + radius));
        let (min_y, max_y) = (cell(center.y - radius), cell(center.y + radius));
        (min_x..=max_x).flat_map(move |cx| (min_y..=max_y).map(move |cy| (cx, cy)))
    }

    pub fn insert(&mut self, index: usize, center: Point, radius: f64) {
        let cells: Vec<_> = self.cell_range(center, radius).collect();
        for cell in cells {
            self.cells.entry(cell).or_default().push(index);
        }
    }

    /// Indices of circles whose cells intersect the query circle's bounding square, ascending.
    /// May include false positives; the caller does the exact distance check.
    pub fn query(&self, center: Point, radius: f64) -> Vec<usize> {
        let mut result: Vec<usize> = self
            .cell_range(center, radius)
            .filter_map(|cell| self.cells.get(&cell))
            .flatten()
            .copied()
            .collect();
        result.sort_unstable();
        result.dedup();
        result
    }

    pub fn clear(&mut self) {
        self.cells.clear();
    }
}
