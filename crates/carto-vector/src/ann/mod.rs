//! Approximate nearest-neighbor index backends.
//!
//! The [`AnnIndex`] trait is the seam between [`VectorIndex`](crate::VectorIndex)
//! and the structure that answers "which keys are closest to this vector".
//! Two backends ship:
//!
//! - [`HnswIndex`]: hierarchical navigable small world graph (default)
//! - [`FlatIndex`]: exhaustive scan, exact, for small corpora and tests
//!
//! Backends speak only in internal keys; identity resolution happens in the
//! store.

mod hnsw;

pub use hnsw::HnswIndex;

use crate::types::{IndexBackend, IndexConfig, Metric, Neighbor, sort_neighbors};
use carto_core::math::check_dimension;
use carto_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// An approximate nearest-neighbor structure over internal keys.
///
/// Implementations must be `Send + Sync`; [`VectorIndex`](crate::VectorIndex)
/// guards them with a reader-writer lock.
pub trait AnnIndex: Send + Sync {
    /// Backend name.
    fn name(&self) -> &'static str;

    /// Vector dimensionality.
    fn dimension(&self) -> usize;

    /// Number of live entries.
    fn len(&self) -> usize;

    /// Whether the index has no live entries.
    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Whether `key` is a live entry.
    fn contains(&self, key: u64) -> bool;

    /// Insert `key`, or move it to `vector` if already present.
    fn upsert(&mut self, key: u64, vector: &[f32]) -> Result<()>;

    /// Remove `key`. Returns `false` if it was not present.
    fn remove(&mut self, key: u64) -> Result<bool>;

    /// Up to `limit` entries nearest `query`, sorted by distance then key.
    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor>>;

    /// Serializable form of the index, or `None` if the backend cannot be
    /// persisted.
    fn to_snapshot(&self) -> Option<AnnSnapshot>;
}

/// Persisted form of an index backend.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub enum AnnSnapshot {
    /// HNSW graph.
    Hnsw(HnswIndex),
    /// Flat entry list.
    Flat(FlatIndex),
}

impl AnnSnapshot {
    /// Backend kind of this snapshot.
    pub fn backend(&self) -> IndexBackend {
        match self {
            Self::Hnsw(_) => IndexBackend::Hnsw,
            Self::Flat(_) => IndexBackend::Flat,
        }
    }
}

/// Create an empty backend for `config`.
pub fn create_ann_index(config: &IndexConfig) -> Box<dyn AnnIndex> {
    match config.backend {
        IndexBackend::Hnsw => Box::new(HnswIndex::new(
            config.dimension,
            config.metric,
            config.hnsw.clone(),
        )),
        IndexBackend::Flat => Box::new(FlatIndex::new(config.dimension, config.metric)),
    }
}

/// Turn a loaded snapshot back into a live backend.
///
/// Fails if the snapshot was built for a different backend, metric, or
/// dimensionality than `config`, or if its structure is inconsistent.
pub fn restore_ann_index(snapshot: AnnSnapshot, config: &IndexConfig) -> Result<Box<dyn AnnIndex>> {
    if snapshot.backend() != config.backend {
        return Err(Error::invalid_data(format!(
            "snapshot backend {} does not match configured backend {}",
            snapshot.backend().name(),
            config.backend.name()
        )));
    }

    match snapshot {
        AnnSnapshot::Hnsw(mut index) => {
            index.restore(config)?;
            Ok(Box::new(index))
        }
        AnnSnapshot::Flat(index) => {
            if index.dimension != config.dimension || index.metric != config.metric {
                return Err(Error::invalid_data(
                    "flat snapshot dimension or metric does not match configuration",
                ));
            }
            if let Some((key, _)) = index
                .entries
                .iter()
                .find(|(_, v)| v.len() != index.dimension)
            {
                return Err(Error::invalid_data(format!(
                    "flat snapshot entry {key} has the wrong dimension"
                )));
            }
            Ok(Box::new(index))
        }
    }
}

// ============================================================================
// Flat backend
// ============================================================================

/// Exhaustive-scan index.
///
/// Exact results; each query is linear in the number of entries.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FlatIndex {
    dimension: usize,
    metric: Metric,
    entries: BTreeMap<u64, Vec<f32>>,
}

impl FlatIndex {
    /// Create an empty flat index.
    pub fn new(dimension: usize, metric: Metric) -> Self {
        Self {
            dimension,
            metric,
            entries: BTreeMap::new(),
        }
    }
}

impl AnnIndex for FlatIndex {
    fn name(&self) -> &'static str {
        "flat"
    }

    fn dimension(&self) -> usize {
        self.dimension
    }

    fn len(&self) -> usize {
        self.entries.len()
    }

    fn contains(&self, key: u64) -> bool {
        self.entries.contains_key(&key)
    }

    fn upsert(&mut self, key: u64, vector: &[f32]) -> Result<()> {
        check_dimension(vector, self.dimension)?;
        self.entries.insert(key, vector.to_vec());
        Ok(())
    }

    fn remove(&mut self, key: u64) -> Result<bool> {
        Ok(self.entries.remove(&key).is_some())
    }

    fn search(&self, query: &[f32], limit: usize) -> Result<Vec<Neighbor>> {
        check_dimension(query, self.dimension)?;
        if limit == 0 {
            return Ok(Vec::new());
        }

        let mut neighbors: Vec<Neighbor> = self
            .entries
            .iter()
            .map(|(&key, v)| Neighbor {
                key,
                distance: self.metric.distance(query, v),
            })
            .collect();
        sort_neighbors(&mut neighbors);
        neighbors.truncate(limit);
        Ok(neighbors)
    }

    fn to_snapshot(&self) -> Option<AnnSnapshot> {
        Some(AnnSnapshot::Flat(self.clone()))
    }
}

// ============================================================================
// Tests
// ============================================================================
