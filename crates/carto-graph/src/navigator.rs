//! The Navigator: centroids and bridge papers.
//!
//! The Navigator holds no state of its own beyond configuration. Paper ids
//! are resolved through a [`VectorSource`]; ids that do not resolve are
//! dropped with a warning, since upstream lists routinely mention papers
//! that were never indexed.

use crate::centrality::{betweenness_centrality, similarity_cost};
use crate::similarity::SimilarityGraph;
use crate::stats::{GraphStats, compute_stats};
use carto_core::math::common_dimension;
use carto_core::{Error, Result, VectorSource};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

/// Navigator configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NavigatorConfig {
    /// Minimum cosine similarity (exclusive) for a similarity-graph edge.
    #[serde(default = "default_similarity_threshold")]
    pub similarity_threshold: f32,

    /// Bridge papers returned when the caller does not say.
    #[serde(default = "default_top_k")]
    pub default_top_k: usize,
}

fn default_similarity_threshold() -> f32 {
    0.7
}

fn default_top_k() -> usize {
    5
}

impl Default for NavigatorConfig {
    fn default() -> Self {
        Self {
            similarity_threshold: default_similarity_threshold(),
            default_top_k: default_top_k(),
        }
    }
}

impl NavigatorConfig {
    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if !(-1.0..=1.0).contains(&self.similarity_threshold) {
            return Err(Error::config(format!(
                "navigator.similarity_threshold must be in [-1, 1], got {}",
                self.similarity_threshold
            )));
        }
        Ok(())
    }
}

/// A paper ranked by how many shortest paths run through it.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgePaper {
    /// Paper identifier.
    pub external_id: String,
    /// Normalized betweenness centrality in `[0, 1]`.
    pub centrality_score: f64,
    /// Edges touching the paper in the similarity graph.
    pub degree: usize,
}

/// Weighted mean of `vectors`.
///
/// Weights default to uniform and are normalized to sum to one. Returns
/// `Ok(None)` for an empty input. Mismatched lengths, mixed
/// dimensionalities, and negative or all-zero weights are usage errors.
pub fn centroid<V: AsRef<[f32]>>(
    vectors: &[V],
    weights: Option<&[f32]>,
) -> Result<Option<Vec<f32>>> {
    let Some(dim) = common_dimension(vectors)? else {
        return Ok(None);
    };

    let weights: Vec<f64> = match weights {
        Some(w) => {
            if w.len() != vectors.len() {
                return Err(Error::invalid_input(format!(
                    "{} weights supplied for {} vectors",
                    w.len(),
                    vectors.len()
                )));
            }
            if w.iter().any(|x| !x.is_finite() || *x < 0.0) {
                return Err(Error::invalid_input("weights must be finite and non-negative"));
            }
            w.iter().map(|&x| x as f64).collect()
        }
        None => vec![1.0; vectors.len()],
    };

    let total: f64 = weights.iter().sum();
    if total <= 0.0 {
        return Err(Error::invalid_input("weights must not all be zero"));
    }

    let mut sum = vec![0.0f64; dim];
    for (v, w) in vectors.iter().zip(&weights) {
        let w = w / total;
        for (acc, x) in sum.iter_mut().zip(v.as_ref()) {
            *acc += w * *x as f64;
        }
    }
    Ok(Some(sum.into_iter().map(|x| x as f32).collect()))
}

/// Structural analysis over papers resolved through a [`VectorSource`].
#[derive(Debug, Clone)]
pub struct Navigator<S> {
    source: S,
    config: NavigatorConfig,
}

impl<S: VectorSource> Navigator<S> {
    /// Create a navigator.
    pub fn new(source: S, config: NavigatorConfig) -> Self {
        Self { source, config }
    }

    /// Create a navigator with the default configuration.
    pub fn with_defaults(source: S) -> Self {
        Self::new(source, NavigatorConfig::default())
    }

    /// The active configuration.
    pub fn config(&self) -> &NavigatorConfig {
        &self.config
    }

    /// Weighted mean of raw vectors. See [`centroid`].
    pub fn centroid<V: AsRef<[f32]>>(
        &self,
        vectors: &[V],
        weights: Option<&[f32]>,
    ) -> Result<Option<Vec<f32>>> {
        centroid(vectors, weights)
    }

    /// Weighted mean of stored papers.
    ///
    /// Ids that do not resolve are dropped together with their weights.
    pub fn centroid_of<T: AsRef<str>>(
        &self,
        ids: &[T],
        weights: Option<&[f32]>,
    ) -> Result<Option<Vec<f32>>> {
        if let Some(w) = weights
            && w.len() != ids.len()
        {
            return Err(Error::invalid_input(format!(
                "{} weights supplied for {} ids",
                w.len(),
                ids.len()
            )));
        }

        let mut vectors = Vec::with_capacity(ids.len());
        let mut kept_weights = Vec::with_capacity(ids.len());
        for (i, id) in ids.iter().enumerate() {
            match self.source.vector(id.as_ref())? {
                Some(v) => {
                    vectors.push(v);
                    if let Some(w) = weights {
                        kept_weights.push(w[i]);
                    }
                }
                None => log::warn!("Dropping unresolved paper {} from centroid", id.as_ref()),
            }
        }

        let weights = weights.map(|_| kept_weights.as_slice());
        centroid(&vectors, weights)
    }

    /// Resolve ids to vectors, dropping duplicates and unknown ids.
    pub fn resolve<T: AsRef<str>>(&self, ids: &[T]) -> Result<Vec<(String, Vec<f32>)>> {
        let mut seen = HashSet::new();
        let mut resolved = Vec::with_capacity(ids.len());
        for id in ids {
            let id = id.as_ref();
            if !seen.insert(id) {
                continue;
            }
            match self.source.vector(id)? {
                Some(v) => resolved.push((id.to_string(), v)),
                None => log::warn!("Dropping unresolved paper {id}"),
            }
        }
        Ok(resolved)
    }

    /// Similarity graph over the resolvable subset of `ids`.
    pub fn similarity_graph<T: AsRef<str>>(&self, ids: &[T]) -> Result<SimilarityGraph> {
        SimilarityGraph::build(self.resolve(ids)?, self.config.similarity_threshold)
    }

    /// Statistics for a graph built by [`similarity_graph`](Self::similarity_graph).
    pub fn compute_stats(&self, graph: &SimilarityGraph) -> GraphStats {
        compute_stats(graph)
    }

    /// Papers that best connect two clusters.
    ///
    /// Builds a similarity graph over the union of both id sets and ranks
    /// its nodes by betweenness centrality, highest first. Ties go to the
    /// paper with more edges, then to the smaller id. An empty or edgeless
    /// graph yields an empty result.
    pub fn find_bridge_papers<A: AsRef<str>, B: AsRef<str>>(
        &self,
        cluster_a: &[A],
        cluster_b: &[B],
        top_k: usize,
    ) -> Result<Vec<BridgePaper>> {
        let ids: Vec<&str> = cluster_a
            .iter()
            .map(AsRef::as_ref)
            .chain(cluster_b.iter().map(AsRef::as_ref))
            .collect();
        let graph = self.similarity_graph(&ids)?;

        if top_k == 0 || graph.edge_count() == 0 {
            log::debug!(
                "No bridge papers: {} nodes, {} edges",
                graph.node_count(),
                graph.edge_count()
            );
            return Ok(Vec::new());
        }

        let scores = betweenness_centrality(graph.graph(), similarity_cost);
        let g = graph.graph();
        let mut ranked: Vec<BridgePaper> = g
            .node_indices()
            .map(|n| BridgePaper {
                external_id: g[n].clone(),
                centrality_score: scores[n.index()],
                degree: g.edges(n).count(),
            })
            .collect();

        ranked.sort_by(|a, b| {
            b.centrality_score
                .total_cmp(&a.centrality_score)
                .then_with(|| b.degree.cmp(&a.degree))
                .then_with(|| a.external_id.cmp(&b.external_id))
        });
        ranked.truncate(top_k);
        Ok(ranked)
    }
}

// ============================================================================
// Tests
// ============================================================================
