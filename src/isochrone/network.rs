use std::{cmp::Ordering, collections::BinaryHeap};

use ahash::AHashMap;
use geo::{Area, ConcaveHull, ConvexHull, Coord, LineString, MultiPoint, MultiPolygon, Point, Validation};
use rstar::{primitives::GeomWithData, RTree};

use super::{haversine_distance, IsochroneProvider};
use crate::{feature::{FeatureCollection, Geometry}, spatial::ReachedNetwork, Error, Result};

/// Endpoint snapping grid, in degrees (about 1 cm).
const SNAP: f64 = 1e-7;

/// Concavity passed to the hull; smaller values hug the reachable nodes tighter.
const CONCAVITY: f64 = 2.0;

type NodeEntry = GeomWithData<[f64; 2], usize>;

/// Whole-network summary of a street graph.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct NetworkStats {
    pub nodes: usize,
    /// Undirected segments between distinct nodes.
    pub edges: usize,
    /// Every node can reach every other one.
    pub connected: bool,
    pub average_degree: f64,
}

/// Walking isochrones computed over a local street network.
///
/// Nodes are line vertices (coincident vertices are merged) and edges are the
/// segments between them, weighted by walking time.
#[derive(Debug)]
pub struct NetworkIsochroneProvider {
    nodes: Vec<Coord<f64>>,
    offsets: Vec<u32>,
    edges: Vec<u32>,
    edge_seconds: Vec<f64>,
    rtree: RTree<NodeEntry>,
    speed_ms: f64,
}

impl NetworkIsochroneProvider {
    /// Build from the LineString/MultiLineString features of `network`; other
    /// geometries are ignored.
    pub fn new(network: &FeatureCollection, speed_ms: f64) -> Result<Self> {
        if !(speed_ms.is_finite() && speed_ms > 0.0) {
            return Err(Error::Config(format!("walking speed must be positive, got {speed_ms}")));
        }

        let mut nodes: Vec<Coord<f64>> = Vec::new();
        let mut index: AHashMap<(i64, i64), usize> = AHashMap::new();
        let mut adjacency: Vec<Vec<(u32, f64)>> = Vec::new();

        let mut node_id = |c: Coord<f64>, nodes: &mut Vec<Coord<f64>>, adjacency: &mut Vec<Vec<(u32, f64)>>| {
            let key = ((c.x / SNAP).round() as i64, (c.y / SNAP).round() as i64);
            *index.entry(key).or_insert_with(|| {
                nodes.push(c);
                adjacency.push(Vec::new());
                nodes.len() - 1
            })
        };

        let lines: Vec<&LineString<f64>> = network.iter()
            .flat_map(|f| match &f.geometry {
                Geometry::LineString(ls) => vec![ls],
                Geometry::MultiLineString(mls) => mls.0.iter().collect(),
                _ => vec![],
            })
            .collect();

        for line in lines {
            for segment in line.lines() {
                if !(segment.start.x.is_finite() && segment.start.y.is_finite()
                    && segment.end.x.is_finite() && segment.end.y.is_finite()) { continue }

                let a = node_id(segment.start, &mut nodes, &mut adjacency);
                let b = node_id(segment.end, &mut nodes, &mut adjacency);
                if a == b { continue }

                let seconds = haversine_distance(Point(segment.start), Point(segment.end)) / speed_ms;
                adjacency[a].push((b as u32, seconds));
                adjacency[b].push((a as u32, seconds));
            }
        }

        if adjacency.iter().all(Vec::is_empty) {
            return Err(Error::Config("street network contains no line segments".into()));
        }

        let offsets = std::iter::once(0u32)
            .chain(adjacency.iter().scan(0u32, |acc, adj| { *acc += adj.len() as u32; Some(*acc) }))
            .collect();
        let rtree = RTree::bulk_load(nodes.iter().enumerate()
            .map(|(i, c)| GeomWithData::new([c.x, c.y], i))
            .collect());

        tracing::debug!(nodes = nodes.len(), "built walking network");
        Ok(Self {
            nodes,
            offsets,
            edges: adjacency.iter().flatten().map(|(n, _)| *n).collect(),
            edge_seconds: adjacency.iter().flatten().map(|(_, s)| *s).collect(),
            rtree,
            speed_ms,
        })
    }

    #[inline] pub fn node_count(&self) -> usize { self.nodes.len() }

    /// Each segment is stored once per direction.
    #[inline] pub fn edge_count(&self) -> usize { self.edges.len() / 2 }

    pub fn stats(&self) -> NetworkStats {
        let mut seen = vec![false; self.nodes.len()];
        let mut stack = vec![0];
        seen[0] = true;
        while let Some(node) = stack.pop() {
            for (next, _) in self.edges_with_seconds(node) {
                if !seen[next] {
                    seen[next] = true;
                    stack.push(next);
                }
            }
        }

        NetworkStats {
            nodes: self.node_count(),
            edges: self.edge_count(),
            connected: seen.iter().all(|&s| s),
            average_degree: self.edges.len() as f64 / self.nodes.len() as f64,
        }
    }

    #[inline]
    fn edges_with_seconds(&self, node: usize) -> impl Iterator<Item = (usize, f64)> + '_ {
        (self.offsets[node] as usize..self.offsets[node + 1] as usize)
            .map(move |e| (self.edges[e] as usize, self.edge_seconds[e]))
    }

    /// Indices of the nodes reachable from `origin` within `budget` seconds, including
    /// the walk to the nearest node.
    fn reachable(&self, origin: Point<f64>, budget: f64) -> Vec<usize> {
        let Some(start) = self.rtree.nearest_neighbor(&[origin.x(), origin.y()]).map(|e| e.data) else {
            return Vec::new();
        };
        let access = haversine_distance(origin, Point(self.nodes[start])) / self.speed_ms;
        if access > budget { return Vec::new() }

        #[derive(Copy, Clone, PartialEq)]
        struct Entry { seconds: f64, node: usize }

        impl Eq for Entry {}

        impl Ord for Entry {
            fn cmp(&self, other: &Self) -> Ordering {
                // Reverse so the shortest time pops first.
                other.seconds.total_cmp(&self.seconds).then_with(|| other.node.cmp(&self.node))
            }
        }

        impl PartialOrd for Entry {
            fn partial_cmp(&self, other: &Self) -> Option<Ordering> { Some(self.cmp(other)) }
        }

        let mut best = vec![f64::INFINITY; self.nodes.len()];
        let mut heap = BinaryHeap::new();
        best[start] = access;
        heap.push(Entry { seconds: access, node: start });

        while let Some(Entry { seconds, node }) = heap.pop() {
            if seconds > best[node] { continue }
            for (next, cost) in self.edges_with_seconds(node) {
                let total = seconds + cost;
                if total <= budget && total < best[next] {
                    best[next] = total;
                    heap.push(Entry { seconds: total, node: next });
                }
            }
        }

        best.iter().enumerate()
            .filter(|(_, s)| s.is_finite())
            .map(|(i, _)| i)
            .collect()
    }

    /// Segments with both ends among `nodes`.
    fn edges_within(&self, nodes: &[usize]) -> usize {
        let mut inside = vec![false; self.nodes.len()];
        for &n in nodes { inside[n] = true }
        nodes.iter()
            .map(|&n| self.edges_with_seconds(n).filter(|&(next, _)| inside[next] && n < next).count())
            .sum()
    }

    fn reach(&self, origin: Point<f64>, minutes: f64) -> Result<(MultiPolygon<f64>, ReachedNetwork)> {
        let reachable = self.reachable(origin, minutes * 60.0);
        if reachable.len() < 3 {
            return Err(Error::IsochroneUnavailable {
                minutes: vec![minutes],
                reason: format!("only {} network nodes reachable", reachable.len()),
            });
        }
        let reached = ReachedNetwork { nodes: reachable.len(), edges: self.edges_within(&reachable) };

        let points: MultiPoint<f64> = reachable.iter().map(|&i| Point(self.nodes[i])).collect();
        let concave = points.concave_hull(CONCAVITY);
        let hull = if concave.is_valid() && concave.unsigned_area() > 0.0 {
            concave
        } else {
            tracing::debug!(minutes, "concave hull degenerate, using convex hull");
            points.convex_hull()
        };

        if hull.unsigned_area() <= 0.0 {
            return Err(Error::IsochroneUnavailable { minutes: vec![minutes], reason: "reachable nodes are collinear".into() });
        }
        tracing::debug!(minutes, nodes = reached.nodes, edges = reached.edges, "network isochrone");
        Ok((MultiPolygon::new(vec![hull]), reached))
    }
}

impl IsochroneProvider for NetworkIsochroneProvider {
    fn name(&self) -> &str { "street-network" }

    fn fetch(&self, origin: Point<f64>, minutes: f64) -> Result<MultiPolygon<f64>> {
        Ok(self.reach(origin, minutes)?.0)
    }

    fn fetch_reached(&self, origin: Point<f64>, minutes: f64) -> Result<(MultiPolygon<f64>, Option<ReachedNetwork>)> {
        let (polygon, reached) = self.reach(origin, minutes)?;
        Ok((polygon, Some(reached)))
    }
}

#[cfg(test)]
mod tests {
    use geo::{line_string, Intersects};

    use super::*;
    use crate::feature::Feature;

    /// A 5x5 street grid with 0.001 degree (about 111 m) blocks near the equator.
    fn grid() -> FeatureCollection {
        let step = 0.001;
        let mut features = Vec::new();
        for i in 0..5 {
            let v = i as f64 * step;
            let vertical: Vec<(f64, f64)> = (0..5).map(|j| (v, j as f64 * step)).collect();
            let horizontal: Vec<(f64, f64)> = (0..5).map(|j| (j as f64 * step, v)).collect();
            features.push(Feature::new(Geometry::LineString(LineString::from(vertical)), Default::default()));
            features.push(Feature::new(Geometry::LineString(LineString::from(horizontal)), Default::default()));
        }
        FeatureCollection::new(features)
    }

    #[test]
    fn shared_vertices_are_merged() {
        let provider = NetworkIsochroneProvider::new(&grid(), 1.25).unwrap();
        assert_eq!(provider.node_count(), 25);
    }

    #[test]
    fn reachability_grows_with_time() {
        let provider = NetworkIsochroneProvider::new(&grid(), 1.25).unwrap();
        let origin = Point::new(0.0, 0.0);
        // One block is about 111 m, so about 89 s at 1.25 m/s.
        assert_eq!(provider.reachable(origin, 60.0).len(), 1);
        assert_eq!(provider.reachable(origin, 5.0 * 60.0).len(), 10);
        assert_eq!(provider.reachable(origin, 10.0 * 60.0).len(), 22);

        let hull = provider.fetch(origin, 15.0).unwrap();
        assert!(hull.unsigned_area() > 0.0);
        assert!(hull.intersects(&Point::new(0.002, 0.002)));
    }

    #[test]
    fn reached_network_is_the_induced_subgraph() {
        let provider = NetworkIsochroneProvider::new(&grid(), 1.25).unwrap();
        let origin = Point::new(0.0, 0.0);

        let (_, reached) = provider.fetch_reached(origin, 5.0).unwrap();
        assert_eq!(reached, Some(ReachedNetwork { nodes: 10, edges: 12 }));
        let (_, reached) = provider.fetch_reached(origin, 10.0).unwrap();
        assert_eq!(reached, Some(ReachedNetwork { nodes: 22, edges: 34 }));
    }

    #[test]
    fn whole_network_stats() {
        let provider = NetworkIsochroneProvider::new(&grid(), 1.25).unwrap();
        let stats = provider.stats();
        assert_eq!((stats.nodes, stats.edges), (25, 40));
        assert!(stats.connected);
        assert!((stats.average_degree - 3.2).abs() < 1e-12);

        let islands = FeatureCollection::new(vec![
            Feature::new(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)]), Default::default()),
            Feature::new(Geometry::LineString(line_string![(x: 1.0, y: 1.0), (x: 1.001, y: 1.0)]), Default::default()),
        ]);
        let stats = NetworkIsochroneProvider::new(&islands, 1.25).unwrap().stats();
        assert_eq!((stats.nodes, stats.edges), (4, 2));
        assert!(!stats.connected);
    }

    #[test]
    fn too_few_nodes_is_a_failure() {
        let provider = NetworkIsochroneProvider::new(&grid(), 1.25).unwrap();
        let err = provider.fetch(Point::new(0.0, 0.0), 1.0).unwrap_err();
        assert!(matches!(err, Error::IsochroneUnavailable { .. }));
    }

    #[test]
    fn network_without_lines_is_rejected() {
        let points = FeatureCollection::new(vec![Feature::new(Point::new(0.0, 0.0), Default::default())]);
        assert!(matches!(NetworkIsochroneProvider::new(&points, 1.25), Err(Error::Config(_))));
        let single = FeatureCollection::new(vec![Feature::new(Geometry::LineString(line_string![(x: 0.0, y: 0.0), (x: 0.001, y: 0.0)]), Default::default())]);
        assert!(NetworkIsochroneProvider::new(&single, 0.0).is_err());
    }
}
