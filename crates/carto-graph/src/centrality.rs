//! Weighted betweenness centrality (Brandes, 2001).
//!
//! Shortest paths are found with Dijkstra over a caller-supplied edge cost.
//! Scores are normalized for undirected graphs: the sum over ordered
//! source/target pairs is scaled by
//! `1 / ((n - 1)(n - 2))`, and left as-is when `n <= 2`.

use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use std::cmp::{Ordering, Reverse};
use std::collections::BinaryHeap;

/// Relative tolerance for treating two path lengths as equal.
const PATH_EPSILON: f64 = 1e-9;

/// Minimum path cost, so that identical papers are still one hop apart.
pub const MIN_PATH_COST: f64 = 1e-6;

/// Path cost for an edge of the given cosine similarity.
///
/// Similar papers are close: cost is `1 - similarity`, floored at
/// [`MIN_PATH_COST`].
pub fn similarity_cost(similarity: f32) -> f64 {
    (1.0 - similarity as f64).max(MIN_PATH_COST)
}

#[derive(Debug, Clone, Copy, PartialEq)]
struct QueueEntry {
    dist: f64,
    node: usize,
}

impl Eq for QueueEntry {}

impl PartialOrd for QueueEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for QueueEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        self.dist
            .total_cmp(&other.dist)
            .then_with(|| self.node.cmp(&other.node))
    }
}

fn same_length(a: f64, b: f64) -> bool {
    (a - b).abs() <= PATH_EPSILON * a.abs().max(b.abs()).max(1.0)
}

/// Normalized betweenness centrality of every node, indexed by node index.
///
/// `cost` maps an edge weight to a strictly positive path length.
pub fn betweenness_centrality<N>(graph: &UnGraph<N, f32>, cost: impl Fn(f32) -> f64) -> Vec<f64> {
    let n = graph.node_count();
    let mut centrality = vec![0.0f64; n];

    let mut dist = vec![f64::INFINITY; n];
    let mut sigma = vec![0.0f64; n];
    let mut delta = vec![0.0f64; n];
    let mut done = vec![false; n];
    let mut preds: Vec<Vec<usize>> = vec![Vec::new(); n];
    let mut order: Vec<usize> = Vec::with_capacity(n);

    for s in 0..n {
        dist.fill(f64::INFINITY);
        sigma.fill(0.0);
        delta.fill(0.0);
        done.fill(false);
        preds.iter_mut().for_each(Vec::clear);
        order.clear();

        dist[s] = 0.0;
        sigma[s] = 1.0;
        let mut queue = BinaryHeap::from([Reverse(QueueEntry { dist: 0.0, node: s })]);

        while let Some(Reverse(QueueEntry { dist: d, node: v })) = queue.pop() {
            if done[v] {
                continue;
            }
            done[v] = true;
            order.push(v);

            for edge in graph.edges(NodeIndex::new(v)) {
                let w = if edge.source().index() == v {
                    edge.target().index()
                } else {
                    edge.source().index()
                };
                if done[w] {
                    continue;
                }
                let candidate = d + cost(*edge.weight());
                if dist[w].is_infinite()
                    || (candidate < dist[w] && !same_length(candidate, dist[w]))
                {
                    dist[w] = candidate;
                    sigma[w] = sigma[v];
                    preds[w].clear();
                    preds[w].push(v);
                    queue.push(Reverse(QueueEntry {
                        dist: candidate,
                        node: w,
                    }));
                } else if same_length(candidate, dist[w]) {
                    sigma[w] += sigma[v];
                    preds[w].push(v);
                }
            }
        }

        while let Some(w) = order.pop() {
            for &v in &preds[w] {
                delta[v] += sigma[v] / sigma[w] * (1.0 + delta[w]);
            }
            if w != s {
                centrality[w] += delta[w];
            }
        }
    }

    if n > 2 {
        let scale = 1.0 / ((n - 1) as f64 * (n - 2) as f64);
        centrality.iter_mut().for_each(|c| *c *= scale);
    }
    centrality
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn unit_cost(_: f32) -> f64 {
        1.0
    }

    fn path_graph(len: usize) -> UnGraph<(), f32> {
        let mut g = UnGraph::default();
        let nodes: Vec<_> = (0..len).map(|_| g.add_node(())).collect();
        for w in nodes.windows(2) {
            g.add_edge(w[0], w[1], 1.0);
        }
        g
    }

    #[test]
    fn test_similarity_cost() {
        assert!((similarity_cost(0.75) - 0.25).abs() < 1e-9);
        assert_eq!(similarity_cost(1.0), MIN_PATH_COST);
    }

    #[test]
    fn test_path_graph_center() {
        let scores = betweenness_centrality(&path_graph(3), unit_cost);
        assert_eq!(scores, vec![0.0, 1.0, 0.0]);
    }

    #[test]
    fn test_path_graph_five() {
        let scores = betweenness_centrality(&path_graph(5), unit_cost);
        let expected = [0.0, 0.5, 2.0 / 3.0, 0.5, 0.0];
        for (s, e) in scores.iter().zip(expected) {
            assert!((s - e).abs() < 1e-9, "{scores:?}");
        }
    }

    #[test]
    fn test_star_graph() {
        let mut g = UnGraph::<(), f32>::default();
        let hub = g.add_node(());
        for _ in 0..4 {
            let leaf = g.add_node(());
            g.add_edge(hub, leaf, 1.0);
        }
        let scores = betweenness_centrality(&g, unit_cost);
        assert!((scores[0] - 1.0).abs() < 1e-9);
        assert!(scores[1..].iter().all(|&s| s == 0.0));
    }

    #[test]
    fn test_equal_paths_split_credit() {
        // Square a-b-d, a-c-d: b and c each carry half of the a..d paths.
        let mut g = UnGraph::<(), f32>::default();
        let a = g.add_node(());
        let b = g.add_node(());
        let c = g.add_node(());
        let d = g.add_node(());
        g.add_edge(a, b, 1.0);
        g.add_edge(a, c, 1.0);
        g.add_edge(b, d, 1.0);
        g.add_edge(c, d, 1.0);

        let scores = betweenness_centrality(&g, unit_cost);
        // Each node lies on half of one pair's paths: 2 * 0.5 / (3 * 2).
        for s in scores {
            assert!((s - 1.0 / 6.0).abs() < 1e-9);
        }
    }

    #[test]
    fn test_weights_change_shortest_paths() {
        // a-b-c via cheap edges beats the direct expensive a-c edge.
        let mut g = UnGraph::<(), f32>::default();
        let a = g.add_node(());
        let b = g.add_node(());
        let c = g.add_node(());
        g.add_edge(a, b, 0.95);
        g.add_edge(b, c, 0.95);
        g.add_edge(a, c, 0.71);

        let scores = betweenness_centrality(&g, similarity_cost);
        assert!((scores[1] - 1.0).abs() < 1e-9);
        assert_eq!(scores[0], 0.0);
        assert_eq!(scores[2], 0.0);
    }

    #[test]
    fn test_tiny_and_edgeless_graphs() {
        assert!(betweenness_centrality(&path_graph(0), unit_cost).is_empty());
        assert_eq!(betweenness_centrality(&path_graph(2), unit_cost), vec![0.0, 0.0]);

        let mut g = UnGraph::<(), f32>::default();
        for _ in 0..4 {
            g.add_node(());
        }
        assert!(betweenness_centrality(&g, unit_cost).iter().all(|&s| s == 0.0));
    }
}
