// Undirected adjacency over a snapshot's edges.
//
// Used to:
// 1. Select the one-hop working set around a focus node (force layout, neighbors mode)
// 2. Link timeline satellites to the anchors they touch
//
// Neighbor lists are ordered by first appearance so every consumer iterates deterministically.

use std::collections::HashMap;

use crate::graph::{GraphEdge, GraphSnapshot};

#[derive(Debug, Clone, Default)]
pub struct Adjacency {
    /// For each node, list of (neighbor, edge_count). Parallel edges are folded into the count.
    pub neighbors: HashMap<String, Vec<(String, usize)>>,
}

impl Adjacency {
    /// Build adjacency from a snapshot, neighbor lists sorted by node input order.
    pub fn from_snapshot(snapshot: &GraphSnapshot) -> Self {
        Self::build(snapshot.edges(), |id| snapshot.position(id).unwrap_or(usize::MAX))
    }

    /// Build adjacency from a bare edge list, neighbor lists sorted by first appearance.
    pub fn from_edges(edges: &[GraphEdge]) -> Self {
        let mut seen: HashMap<&str, usize> = HashMap::new();
        for e in edges {
            for id in [e.source_id.as_str(), e.target_id.as_str()] {
                let next = seen.len();
                seen.entry(id).or_insert(next);
            }
        }
        Self::build(edges, |id| seen.get(id).copied().unwrap_or(usize::MAX))
    }

    fn build(edges: &[GraphEdge], order: impl Fn(&str) -> usize) -> Self {
        // Count edges between pairs, pair order normalized
        let mut pair_counts: HashMap<(&str, &str), usize> = HashMap::new();
        for e in edges {
            let (a, b) = (e.source_id.as_str(), e.target_id.as_str());
            let pair = if a <= b { (a, b) } else { (b, a) };
            *pair_counts.entry(pair).or_default() += 1;
        }

        let mut neighbors: HashMap<String, Vec<(String, usize)>> = HashMap::new();
        for ((a, b), count) in pair_counts {
            neighbors.entry(a.to_string()).or_default().push((b.to_string(), count));
            if a != b {
                neighbors.entry(b.to_string()).or_default().push((a.to_string(), count));
            }
        }

        for list in neighbors.values_mut() {
            list.sort_by(|(x, _), (y, _)| order(x.as_str()).cmp(&order(y.as_str())).then_with(|| x.cmp(y)));
        }

        Self { neighbors }
    }

    /// Get the neighbors of a node, or empty slice if none.
    pub fn get_neighbors(&self, id: &str) -> &[(String, usize)] {
        self.neighbors.get(id).map(|v| v.as_slice()).unwrap_or(&[])
    }
}
