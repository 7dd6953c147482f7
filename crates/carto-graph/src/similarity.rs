//! Similarity graphs over paper embeddings.
//!
//! Nodes are paper ids; an undirected edge joins every pair whose cosine
//! similarity is strictly greater than the threshold, weighted by that
//! similarity. Graphs are built fresh per call and never persisted.

use carto_core::Result;
use carto_core::math::{common_dimension, cosine_similarity};
use petgraph::graph::{NodeIndex, UnGraph};
use petgraph::visit::EdgeRef;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;

/// One edge of a [`SimilarityGraph`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SimilarityEdge {
    /// Lower-indexed endpoint.
    pub a: String,
    /// Higher-indexed endpoint.
    pub b: String,
    /// Cosine similarity between the two papers.
    pub similarity: f32,
}

/// Undirected graph of papers joined by high cosine similarity.
#[derive(Debug, Clone)]
pub struct SimilarityGraph {
    graph: UnGraph<String, f32>,
    index: HashMap<String, NodeIndex>,
    threshold: f32,
}

impl SimilarityGraph {
    /// Build a graph from resolved `(id, vector)` pairs.
    ///
    /// Duplicate ids keep their first vector. All vectors must share one
    /// dimensionality.
    pub fn build<I, V>(entries: I, threshold: f32) -> Result<Self>
    where
        I: IntoIterator<Item = (String, V)>,
        V: AsRef<[f32]>,
    {
        let mut graph = UnGraph::<String, f32>::default();
        let mut index = HashMap::new();
        let mut vectors: Vec<V> = Vec::new();

        for (id, vector) in entries {
            if index.contains_key(&id) {
                continue;
            }
            let node = graph.add_node(id.clone());
            index.insert(id, node);
            vectors.push(vector);
        }
        common_dimension(&vectors)?;

        for i in 0..vectors.len() {
            for j in (i + 1)..vectors.len() {
                let similarity = cosine_similarity(vectors[i].as_ref(), vectors[j].as_ref());
                if similarity > threshold {
                    graph.add_edge(NodeIndex::new(i), NodeIndex::new(j), similarity);
                }
            }
        }

        log::debug!(
            "Built similarity graph: {} nodes, {} edges (threshold {threshold})",
            graph.node_count(),
            graph.edge_count()
        );

        Ok(Self {
            graph,
            index,
            threshold,
        })
    }

    /// The underlying petgraph graph; node weights are paper ids.
    pub fn graph(&self) -> &UnGraph<String, f32> {
        &self.graph
    }

    /// Similarity threshold the graph was built with.
    pub fn threshold(&self) -> f32 {
        self.threshold
    }

    /// Number of papers.
    pub fn node_count(&self) -> usize {
        self.graph.node_count()
    }

    /// Number of edges.
    pub fn edge_count(&self) -> usize {
        self.graph.edge_count()
    }

    /// Whether `id` is a node.
    pub fn contains(&self, id: &str) -> bool {
        self.index.contains_key(id)
    }

    /// Paper ids in insertion order.
    pub fn ids(&self) -> impl Iterator<Item = &str> {
        self.graph.node_weights().map(String::as_str)
    }

    /// Node index of a paper.
    pub fn node_index(&self, id: &str) -> Option<NodeIndex> {
        self.index.get(id).copied()
    }

    /// Number of edges touching `id`, or `None` if it is not a node.
    pub fn degree(&self, id: &str) -> Option<usize> {
        self.node_index(id).map(|n| self.graph.edges(n).count())
    }

    /// Similarity on the edge between `a` and `b`, if there is one.
    pub fn similarity(&self, a: &str, b: &str) -> Option<f32> {
        let (a, b) = (self.node_index(a)?, self.node_index(b)?);
        self.graph.find_edge(a, b).map(|e| self.graph[e])
    }

    /// All edges in insertion order.
    pub fn edges(&self) -> Vec<SimilarityEdge> {
        self.graph
            .edge_references()
            .map(|e| SimilarityEdge {
                a: self.graph[e.source()].clone(),
                b: self.graph[e.target()].clone(),
                similarity: *e.weight(),
            })
            .collect()
    }
}

// ============================================================================
// Tests
// ============================================================================
