//! Undirected street graph built from the edge table, with Dijkstra under
//! three cost models.

use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap};

use safestreets_shared::{RouteKind, RouteResponse};
use tracing::{debug, info};

use crate::edges::EdgeRecord;

const EARTH_RADIUS_M: f64 = 6_371_000.0;
/// Endpoints closer than this (in degrees) share a node.
const NODE_SNAP_DEG: f64 = 1e-7;
/// A requested point this close to its attach node is not repeated in the path.
const SAME_POINT_M: f64 = 0.5;

pub fn haversine_m(a: [f64; 2], b: [f64; 2]) -> f64 {
    let (lat1, lat2) = (a[0].to_radians(), b[0].to_radians());
    let dlat = lat2 - lat1;
    let dlon = (b[1] - a[1]).to_radians();
    let h = (dlat / 2.0).sin().powi(2) + lat1.cos() * lat2.cos() * (dlon / 2.0).sin().powi(2);
    2.0 * EARTH_RADIUS_M * h.sqrt().asin()
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct Link {
    to: usize,
    length_m: f64,
    risk: f64,
}

/// Edge weight for one route kind.
pub fn link_cost(kind: RouteKind, length_m: f64, risk: f64, penalty: f64) -> f64 {
    let risk = risk.clamp(0.0, 1.0);
    match kind {
        RouteKind::Fastest => length_m,
        RouteKind::Safest => length_m * (1.0 + penalty * risk),
        RouteKind::Weighted => length_m * (1.0 + penalty / 2.0 * risk),
    }
}

#[derive(Debug, Clone, Copy)]
struct Cost(f64);

impl PartialEq for Cost {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for Cost {}

impl PartialOrd for Cost {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Cost {
    fn cmp(&self, other: &Self) -> Ordering {
        self.0.total_cmp(&other.0)
    }
}

#[derive(Debug, Default)]
pub struct RoadGraph {
    /// Node coordinates, `[lat, lon]`.
    nodes: Vec<[f64; 2]>,
    adjacency: Vec<Vec<Link>>,
}

impl RoadGraph {
    pub fn build(records: &[EdgeRecord]) -> Self {
        let mut graph = Self::default();
        let mut index: HashMap<(i64, i64), usize> = HashMap::new();
        for record in records {
            let a = graph.intern(&mut index, record.start());
            let b = graph.intern(&mut index, record.end());
            if a == b {
                continue;
            }
            let length_m = haversine_m(record.start(), record.end());
            graph.adjacency[a].push(Link {
                to: b,
                length_m,
                risk: record.risk_score,
            });
            graph.adjacency[b].push(Link {
                to: a,
                length_m,
                risk: record.risk_score,
            });
        }
        info!(nodes = graph.nodes.len(), "road graph built");
        graph
    }

    fn intern(&mut self, index: &mut HashMap<(i64, i64), usize>, point: [f64; 2]) -> usize {
        let key = (
            (point[0] / NODE_SNAP_DEG).round() as i64,
            (point[1] / NODE_SNAP_DEG).round() as i64,
        );
        *index.entry(key).or_insert_with(|| {
            self.nodes.push(point);
            self.adjacency.push(Vec::new());
            self.nodes.len() - 1
        })
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    /// Closest node and its distance in meters.
    pub fn nearest_node(&self, point: [f64; 2]) -> Option<(usize, f64)> {
        self.nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (i, haversine_m(point, *node)))
            .min_by(|a, b| a.1.total_cmp(&b.1))
    }

    pub fn shortest_path(
        &self,
        from: usize,
        to: usize,
        cost: impl Fn(f64, f64) -> f64,
    ) -> Option<Vec<usize>> {
        let n = self.nodes.len();
        if from >= n || to >= n {
            return None;
        }
        let mut dist = vec![f64::INFINITY; n];
        let mut prev: Vec<Option<usize>> = vec![None; n];
        let mut heap = BinaryHeap::new();
        dist[from] = 0.0;
        heap.push(Reverse((Cost(0.0), from)));

        while let Some(Reverse((Cost(d), u))) = heap.pop() {
            if u == to {
                break;
            }
            if d > dist[u] {
                continue;
            }
            for link in &self.adjacency[u] {
                let next = d + cost(link.length_m, link.risk);
                if next < dist[link.to] {
                    dist[link.to] = next;
                    prev[link.to] = Some(u);
                    heap.push(Reverse((Cost(next), link.to)));
                }
            }
        }

        if !dist[to].is_finite() {
            return None;
        }
        let mut path = vec![to];
        let mut cursor = to;
        while let Some(p) = prev[cursor] {
            path.push(p);
            cursor = p;
        }
        path.reverse();
        Some(path)
    }

    /// Route between two `[lat, lon]` points under every cost model.
    pub fn route(
        &self,
        origin: [f64; 2],
        destination: [f64; 2],
        penalty: f64,
        attach_max_m: f64,
    ) -> RouteResponse {
        let (Some((start, start_gap)), Some((end, end_gap))) =
            (self.nearest_node(origin), self.nearest_node(destination))
        else {
            debug!("route requested on an empty graph");
            return RouteResponse::default();
        };
        if start_gap > attach_max_m || end_gap > attach_max_m {
            info!(
                start_gap_m = start_gap,
                end_gap_m = end_gap,
                limit_m = attach_max_m,
                "attaching route endpoints to distant nodes"
            );
        }

        let mut response = RouteResponse::default();
        for kind in RouteKind::ALL {
            let path = self
                .shortest_path(start, end, |length, risk| {
                    link_cost(kind, length, risk, penalty)
                })
                .map(|nodes| self.stitch(origin, &nodes, destination));
            match kind {
                RouteKind::Fastest => response.fastest = path,
                RouteKind::Safest => response.safest = path,
                RouteKind::Weighted => response.weighted = path,
            }
        }
        response
    }

    fn stitch(&self, origin: [f64; 2], nodes: &[usize], destination: [f64; 2]) -> Vec<[f64; 2]> {
        let mut path = Vec::with_capacity(nodes.len() + 2);
        let coords: Vec<[f64; 2]> = nodes.iter().map(|i| self.nodes[*i]).collect();
        if coords
            .first()
            .is_none_or(|first| haversine_m(origin, *first) > SAME_POINT_M)
        {
            path.push(origin);
        }
        path.extend_from_slice(&coords);
        if coords
            .last()
            .is_none_or(|last| haversine_m(*last, destination) > SAME_POINT_M)
        {
            path.push(destination);
        }
        path
    }
}

#[cfg(test)]
pub(crate) mod tests {
    use super::*;

    pub(crate) const A: [f64; 2] = [40.750, -73.990];
    pub(crate) const B: [f64; 2] = [40.760, -73.980];
    pub(crate) const D: [f64; 2] = [40.760, -73.990];

    fn record(from: [f64; 2], to: [f64; 2], risk: f64) -> EdgeRecord {
        EdgeRecord {
            start_lat: from[0],
            start_lon: from[1],
            end_lat: to[0],
            end_lon: to[1],
            risk_score: risk,
        }
    }

    /// A short risky diagonal A-B and a longer safe detour A-D-B.
    pub(crate) fn diamond() -> Vec<EdgeRecord> {
        vec![record(A, B, 1.0), record(A, D, 0.0), record(D, B, 0.0)]
    }

    #[test]
    fn shared_endpoints_become_one_node() {
        let graph = RoadGraph::build(&diamond());
        assert_eq!(graph.node_count(), 3);
    }

    #[test]
    fn cost_models_pick_different_paths() {
        let graph = RoadGraph::build(&diamond());
        let response = graph.route(A, B, 4.0, 25.0);

        assert_eq!(response.fastest, Some(vec![A, B]));
        assert_eq!(response.safest, Some(vec![A, D, B]));
        assert_eq!(response.weighted, Some(vec![A, D, B]));
    }

    #[test]
    fn zero_penalty_makes_every_model_fastest() {
        let graph = RoadGraph::build(&diamond());
        let response = graph.route(A, B, 0.0, 25.0);
        assert_eq!(response.safest, response.fastest);
    }

    #[test]
    fn off_graph_points_are_stitched_to_nearest_nodes() {
        let graph = RoadGraph::build(&diamond());
        let origin = [40.7499, -73.9901];
        let response = graph.route(origin, B, 4.0, 25.0);
        assert_eq!(response.fastest, Some(vec![origin, A, B]));
    }

    #[test]
    fn disconnected_components_yield_no_path() {
        let mut records = diamond();
        records.push(record([41.0, -74.0], [41.01, -74.0], 0.2));
        let graph = RoadGraph::build(&records);
        let response = graph.route(A, [41.01, -74.0], 4.0, 25.0);
        assert!(response.is_empty());
    }

    #[test]
    fn empty_graph_routes_nothing() {
        let graph = RoadGraph::build(&[]);
        assert_eq!(graph.route(A, B, 4.0, 25.0), RouteResponse::default());
    }
}
