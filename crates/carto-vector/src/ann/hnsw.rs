//! Hierarchical navigable small world graph.
//!
//! Each node lives on layers `0..=level`, where `level` is drawn from an
//! exponential distribution seeded by the node's key, so rebuilding from
//! the same records yields the same layer assignment. Removal leaves a
//! tombstone that is still traversed but never returned.

use super::{AnnIndex, AnnSnapshot};
use crate::types::{HnswParams, IndexConfig, Metric, Neighbor, sort_neighbors};
use carto_core::math::check_dimension;
use carto_core::{Error, Result};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use serde::{Deserialize, Serialize};
use std::cmp::{Ordering, Reverse};
use std::collections::{BinaryHeap, HashMap, HashSet};

const MAX_LEVEL: usize = 16;

#[derive(Debug, Clone, Serialize, Deserialize)]
struct Node {
    key: u64,
    vector: Vec<f32>,
    level: usize,
    /// Neighbor node ids per layer, `links.len() == level + 1`.
    links: Vec<Vec<u32>>,
    deleted: bool,
}

/// A node id paired with its distance to the current query.
#[derive(Debug, Clone, Copy, PartialEq)]
struct Scored {
    distance: f32,
    node: u32,
}

impl Eq for Scored {}

impl PartialOrd for Scored {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for Scored {
    fn cmp(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.node.cmp(&other.node))
    }
}

/// HNSW approximate nearest-neighbor index.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HnswIndex {
    dimension: usize,
    metric: Metric,
    params: HnswParams,
    nodes: Vec<Node>,
    entry_point: Option<u32>,
    max_layer: usize,
    #[serde(skip)]
    key_to_node: HashMap<u64, u32>,
    #[serde(skip)]
    live: usize,
}

impl HnswIndex {
    /// Create an empty graph.
    pub fn new(dimension: usize, metric: Metric, params: HnswParams) -> Self {
        Self {
            dimension,
            metric,
            params,
            nodes: Vec::new(),
            entry_point: None,
            max_layer: 0,
            key_to_node: HashMap::new(),
            live: 0,
        }
    }

    /// Number of tombstoned nodes still in the graph.
    pub fn tombstones(&self) -> usize {
        self.nodes.len() - self.live
    }

    /// Validate a deserialized graph against `config` and rebuild lookups.
    pub(crate) fn restore(&mut self, config: &IndexConfig) -> Result<()> {
        if self.dimension != config.dimension || self.metric != config.metric {
            return Err(Error::invalid_data(
                "hnsw snapshot dimension or metric does not match configuration",
            ));
        }
        self.params = config.hnsw.clone();

        let count = self.nodes.len();
        if let Some(ep) = self.entry_point
            && ep as usize >= count
        {
            return Err(Error::invalid_data("hnsw entry point out of range"));
        }
        if count > 0 && self.entry_point.is_none() {
            return Err(Error::invalid_data("hnsw graph has nodes but no entry point"));
        }

        self.key_to_node.clear();
        self.live = 0;
        for (id, node) in self.nodes.iter().enumerate() {
            if node.vector.len() != self.dimension {
                return Err(Error::invalid_data(format!(
                    "hnsw node {id} has dimension {}",
                    node.vector.len()
                )));
            }
            if node.links.len() != node.level + 1 || node.level > self.max_layer {
                return Err(Error::invalid_data(format!(
                    "hnsw node {id} has inconsistent layers"
                )));
            }
            if node.links.iter().flatten().any(|&n| n as usize >= count) {
                return Err(Error::invalid_data(format!(
                    "hnsw node {id} links to a missing node"
                )));
            }
            if self.key_to_node.insert(node.key, id as u32).is_some() {
                return Err(Error::invalid_data(format!(
                    "hnsw key {} appears twice",
                    node.key
                )));
            }
            if !node.deleted {
                self.live += 1;
            }
        }
        Ok(())
    }

    fn random_level(&self, key: u64) -> usize {
        let mut rng = StdRng::seed_from_u64(key);
        let u: f64 = 1.0 - rng.random::<f64>();
        let ml = 1.0 / (self.params.m as f64).ln();
        ((-u.ln() * ml).floor() as usize).min(MAX_LEVEL)
    }

    fn distance_to(&self, query: &[f32], node: u32) -> f32 {
        self.metric.distance(query, &self.nodes[node as usize].vector)
    }

    fn neighbors(&self, node: u32, layer: usize) -> &[u32] {
        self.nodes[node as usize]
            .links
            .get(layer)
            .map(Vec::as_slice)
            .unwrap_or(&[])
    }

    /// Walk to the node closest to `query` on one layer.
    fn greedy(&self, query: &[f32], entry: u32, layer: usize) -> u32 {
        let mut current = Scored {
            distance: self.distance_to(query, entry),
            node: entry,
        };
        loop {
            let mut improved = false;
            for &n in self.neighbors(current.node, layer) {
                let candidate = Scored {
                    distance: self.distance_to(query, n),
                    node: n,
                };
                if candidate < current {
                    current = candidate;
                    improved = true;
                }
            }
            if !improved {
                return current.node;
            }
        }
    }

    /// Beam search on one layer; returns up to `ef` nodes nearest first.
    fn search_layer(&self, query: &[f32], entry: u32, layer: usize, ef: usize) -> Vec<Scored> {
        let start = Scored {
            distance: self.distance_to(query, entry),
            node: entry,
        };
        let mut visited = HashSet::from([entry]);
        let mut candidates = BinaryHeap::from([Reverse(start)]);
        let mut results = BinaryHeap::from([start]);

        while let Some(Reverse(candidate)) = candidates.pop() {
            if results.len() >= ef
                && results
                    .peek()
                    .is_some_and(|worst| candidate.distance > worst.distance)
            {
                break;
            }

            for &n in self.neighbors(candidate.node, layer) {
                if !visited.insert(n) {
                    continue;
                }
                let scored = Scored {
                    distance: self.distance_to(query, n),
                    node: n,
                };
                let admit = results.len() < ef
                    || results.peek().is_some_and(|worst| scored < *worst);
                if admit {
                    candidates.push(Reverse(scored));
                    results.push(scored);
                    if results.len() > ef {
                        results.pop();
                    }
                }
            }
        }

        results.into_sorted_vec()
    }

    /// Link `id` into the graph on every layer it occupies.
    ///
    /// Works for fresh nodes and for nodes whose vector just moved: the
    /// node's old links are kept until its new neighborhood is known.
    fn connect(&mut self, id: u32) {
        let level = self.nodes[id as usize].level;
        let Some(entry) = self.entry_point else {
            self.entry_point = Some(id);
            self.max_layer = level;
            return;
        };

        let query = self.nodes[id as usize].vector.clone();
        let mut current = entry;
        for layer in (level + 1..=self.max_layer).rev() {
            current = self.greedy(&query, current, layer);
        }

        for layer in (0..=level.min(self.max_layer)).rev() {
            let found = self.search_layer(&query, current, layer, self.params.ef_construction);
            let selected: Vec<u32> = found
                .iter()
                .filter(|s| s.node != id)
                .take(self.params.m)
                .map(|s| s.node)
                .collect();
            if let Some(&closest) = selected.first() {
                current = closest;
            }

            let cap = if layer == 0 {
                self.params.m_max0
            } else {
                self.params.m
            };
            self.nodes[id as usize].links[layer] = selected.clone();
            for n in selected {
                self.add_link(n, id, layer, cap);
            }
        }

        if level > self.max_layer {
            self.max_layer = level;
            self.entry_point = Some(id);
        }
    }

    /// Add `from -> to` on `layer`, pruning `from` back to `cap` links.
    fn add_link(&mut self, from: u32, to: u32, layer: usize, cap: usize) {
        let Some(links) = self.nodes[from as usize].links.get(layer) else {
            return;
        };
        if links.contains(&to) {
            return;
        }

        let mut updated = links.clone();
        updated.push(to);
        if updated.len() > cap {
            let base = &self.nodes[from as usize].vector;
            let mut scored: Vec<Scored> = updated
                .iter()
                .map(|&n| Scored {
                    distance: self.metric.distance(base, &self.nodes[n as usize].vector),
                    node: n,
                })
                .collect();
            scored.sort();
            scored.truncate(cap);
            updated = scored.into_iter().map(|s| s.node).collect();
        }
        self.nodes[from as usize].links[layer] = updated;
    }
}

impl AnnIndex for HnswIndex {
    fn name(&self) -> &'static str {
        "hnsw"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.live
    }

    fn contains(&self, key: u64) -> bool {
        self.key_to_node
            .get(&key)
            .is_some_and(|&id| !self.nodes[id as usize].deleted)
    }

    fn upsert(&mut self, key: u64, vector: &[f32]) -> Result<()> {
        check_dimension(vector, self.dimension)?;

        let id = match self.key_to_node.get(&key) {
            Some(&id) => {
                let node = &mut self.nodes[id as usize];
                node.vector = vector.to_vec();
                if node.deleted {
                    node.deleted = false;
                    self.live += 1;
                }
                id
            }
            None => {
                let id = u32::try_from(self.nodes.len())
                    .map_err(|_| Error::index("hnsw graph is full"))?;
                let level = self.random_level(key);
                self.nodes.push(Node {
                    key,
                    vector: vector.to_vec(),
                    level,
                    links: vec![Vec::new(); level + 1],
                    deleted: false,
                });
                self.key_to_node.insert(key, id);
                self.live += 1;
                id
            }
        };

        self.connect(id);
        Ok(())
    }

    fn remove(&mut self, key: u64) -> Result<bool> {
        let Some(&id) = self.key_to_node.get(&key) else {
            return Ok(false);
        };
        let node = &mut self.nodes[id as usize];
        if node.deleted {
            return Ok(false);
        }
        node.deleted = true;
        self.live -= 1;
        Ok(true)
    }

    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor>> {
        check_dimension(query, self.dimension)?;
        let Some(entry) = self.entry_point else {
            return Ok(Vec::new());
        };
        if limit == 0 || self.live == 0 {
            return Ok(Vec::new());
        }

        let mut current = entry;
        for layer in (1..=self.max_layer).rev() {
            current = self.greedy(query, current, layer);
        }

        let ef = self.params.ef_search.max(limit) + self.tombstones();
        let mut neighbors: Vec<Neighbor> = self
            .search_layer(query, current, 0, ef)
            .into_iter()
            .filter(|s| !self.nodes[s.node as usize].deleted)
            .map(|s| Neighbor {
                key: self.nodes[s.node as usize].key,
                distance: s.distance,
            })
            .collect();
        sort_neighbors(&mut neighbors);
        neighbors.truncate(limit);
        Ok(neighbors)
    }

    fn to_snapshot(&self) -> Option<AnnSnapshot> {
        Some(AnnSnapshot::Hnsw(self.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
