//! Similarity graph statistics.
//!
//! Provides functions for summarizing graph structure: degree
//! distribution, density, connected components and top-node rankings.

use crate::similarity::SimilarityGraph;
use petgraph::algo::connected_components;
use serde::{Deserialize, Serialize};

// ============================================================================
// Types
// ============================================================================

/// Summary statistics about a similarity graph.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct GraphStats {
    /// Total number of papers.
    pub node_count: usize,
    /// Total number of edges.
    pub edge_count: usize,
    /// Papers without any edges.
    pub isolated_count: usize,
    /// Connected components, isolated papers included.
    pub component_count: usize,
    /// Average edges per paper.
    pub avg_degree: f32,
    /// Highest degree.
    pub max_degree: usize,
    /// Paper with the highest degree (first by id on ties).
    pub most_connected: Option<String>,
    /// Edges present over edges possible.
    pub density: f32,
    /// Mean similarity over all edges.
    pub mean_similarity: Option<f32>,
    /// Threshold the graph was built with.
    pub threshold: f32,
}

// ============================================================================
// Functions
// ============================================================================

/// Compute summary statistics for a graph.
pub fn compute_stats(graph: &SimilarityGraph) -> GraphStats {
    let node_count = graph.node_count();
    let edge_count = graph.edge_count();

    let degrees = top_nodes_by_degree(graph, node_count);
    let isolated_count = degrees.iter().filter(|(_, d)| *d == 0).count();
    let (most_connected, max_degree) = degrees
        .first()
        .filter(|(_, d)| *d > 0)
        .map(|(id, d)| (Some(id.clone()), *d))
        .unwrap_or((None, 0));

    let avg_degree = if node_count > 0 {
        (2 * edge_count) as f32 / node_count as f32
    } else {
        0.0
    };

    let possible = node_count.saturating_sub(1) * node_count / 2;
    let density = if possible > 0 {
        edge_count as f32 / possible as f32
    } else {
        0.0
    };

    let mean_similarity = (edge_count > 0).then(|| {
        graph.graph().edge_weights().map(|&w| w as f64).sum::<f64>() as f32 / edge_count as f32
    });

    GraphStats {
        node_count,
        edge_count,
        isolated_count,
        component_count: connected_components(graph.graph()),
        avg_degree,
        max_degree,
        most_connected,
        density,
        mean_similarity,
        threshold: graph.threshold(),
    }
}

/// Get the top `limit` papers by degree, ties broken by id.
pub fn top_nodes_by_degree(graph: &SimilarityGraph, limit: usize) -> Vec<(String, usize)> {
    let mut scores: Vec<(String, usize)> = graph
        .graph()
        .node_indices()
        .map(|n| (graph.graph()[n].clone(), graph.graph().edges(n).count()))
        .collect();

    scores.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(&b.0)));
    scores.truncate(limit);
    scores
}

// ============================================================================
// Tests
// ============================================================================
