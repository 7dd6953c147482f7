//! Common types for the vector index.
//!
//! These types are shared by the store, the approximate index backends,
//! and the combined [`VectorIndex`](crate::VectorIndex).

use carto_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Caller-defined metadata attached to a paper.
///
/// Stored and returned verbatim; the index never interprets it.
pub type Metadata = serde_json::Map<String, serde_json::Value>;

// ============================================================================
// Configuration
// ============================================================================

/// Distance metric used by the approximate index.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Metric {
    /// `1 - cosine_similarity`; 0 means identical direction.
    #[default]
    Cosine,
    /// Straight-line distance.
    Euclidean,
}

impl Metric {
    /// Distance between two vectors in this metric's native unit.
    pub fn distance(&self, a: &[f32], b: &[f32]) -> f32 {
        match self {
            Self::Cosine => carto_core::math::cosine_distance(a, b),
            Self::Euclidean => carto_core::math::euclidean_distance(a, b),
        }
    }

    /// Metric name for diagnostics.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Cosine => "cosine",
            Self::Euclidean => "euclidean",
        }
    }
}

/// Which approximate index implementation to use.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum IndexBackend {
    /// Hierarchical navigable small world graph.
    #[default]
    Hnsw,
    /// Exhaustive scan; exact but linear per query.
    Flat,
}

impl IndexBackend {
    /// Backend name for diagnostics and snapshot metadata.
    pub fn name(&self) -> &'static str {
        match self {
            Self::Hnsw => "hnsw",
            Self::Flat => "flat",
        }
    }
}

/// HNSW construction and search parameters.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct HnswParams {
    /// Links per node on layers above 0.
    #[serde(default = "default_m")]
    pub m: usize,

    /// Links per node on layer 0.
    #[serde(default = "default_m_max0")]
    pub m_max0: usize,

    /// Candidate list size while inserting.
    #[serde(default = "default_ef_construction")]
    pub ef_construction: usize,

    /// Candidate list size while searching (raised to `limit` when smaller).
    #[serde(default = "default_ef_search")]
    pub ef_search: usize,
}

fn default_m() -> usize {
    16
}

fn default_m_max0() -> usize {
    32
}

fn default_ef_construction() -> usize {
    200
}

fn default_ef_search() -> usize {
    64
}

impl Default for HnswParams {
    fn default() -> Self {
        Self {
            m: default_m(),
            m_max0: default_m_max0(),
            ef_construction: default_ef_construction(),
            ef_search: default_ef_search(),
        }
    }
}

/// Vector index configuration.
///
/// Controls dimensionality, metric, backend selection, and storage location.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct IndexConfig {
    /// Embedding dimensionality `D`; every vector must have this length.
    #[serde(default = "default_dimension")]
    pub dimension: usize,

    /// Distance metric.
    #[serde(default)]
    pub metric: Metric,

    /// Approximate index backend.
    #[serde(default)]
    pub backend: IndexBackend,

    /// Directory for the durable store and index snapshot.
    ///
    /// `None` keeps everything in memory for the lifetime of the process.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,

    /// Whether to persist and reload snapshots of the approximate index.
    #[serde(default = "default_true")]
    pub snapshot: bool,

    /// HNSW tuning.
    #[serde(default)]
    pub hnsw: HnswParams,
}

fn default_dimension() -> usize {
    768
}

fn default_true() -> bool {
    true
}

impl Default for IndexConfig {
    fn default() -> Self {
        Self {
            dimension: default_dimension(),
            metric: Metric::default(),
            backend: IndexBackend::default(),
            data_dir: None,
            snapshot: default_true(),
            hnsw: HnswParams::default(),
        }
    }
}

impl IndexConfig {
    /// Create an in-memory configuration for the given dimensionality.
    pub fn new(dimension: usize) -> Self {
        Self {
            dimension,
            ..Default::default()
        }
    }

    /// Set the storage directory.
    pub fn with_data_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.data_dir = Some(dir.into().to_string_lossy().into_owned());
        self
    }

    /// Set the backend.
    pub fn with_backend(mut self, backend: IndexBackend) -> Self {
        self.backend = backend;
        self
    }

    /// Set the metric.
    pub fn with_metric(mut self, metric: Metric) -> Self {
        self.metric = metric;
        self
    }

    /// Check the configuration is usable.
    pub fn validate(&self) -> Result<()> {
        if self.dimension == 0 {
            return Err(Error::config("index dimension must be greater than 0"));
        }
        if self.hnsw.m < 2 {
            return Err(Error::config("hnsw.m must be at least 2"));
        }
        if self.hnsw.m_max0 < self.hnsw.m {
            return Err(Error::config("hnsw.m_max0 must be at least hnsw.m"));
        }
        if self.hnsw.ef_construction == 0 || self.hnsw.ef_search == 0 {
            return Err(Error::config("hnsw ef parameters must be greater than 0"));
        }
        Ok(())
    }
}

// ============================================================================
// Records
// ============================================================================

/// A paper as held by the durable store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PaperRecord {
    /// Caller-supplied identifier (e.g. an arXiv ID).
    pub external_id: String,

    /// Dense key assigned on first insertion; stable across replacements.
    pub internal_key: u64,

    /// The embedding.
    pub vector: Vec<f32>,

    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

/// What an `add` did to the store.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "outcome", rename_all = "snake_case")]
pub enum AddOutcome {
    /// A new record was created under a freshly assigned key.
    Inserted {
        /// The assigned internal key.
        key: u64,
    },
    /// An existing record was replaced; its key was reused.
    Replaced {
        /// The reused internal key.
        key: u64,
    },
}

impl AddOutcome {
    /// The internal key the record lives under.
    pub fn key(&self) -> u64 {
        match self {
            Self::Inserted { key } | Self::Replaced { key } => *key,
        }
    }
}

/// One record in an ingestion batch.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestRecord {
    /// Paper identifier.
    #[serde(alias = "external_id")]
    pub id: String,

    /// The embedding.
    pub vector: Vec<f32>,

    /// Opaque caller metadata.
    #[serde(default)]
    pub metadata: Metadata,
}

impl IngestRecord {
    /// Create a record with empty metadata.
    pub fn new(id: impl Into<String>, vector: Vec<f32>) -> Self {
        Self {
            id: id.into(),
            vector,
            metadata: Metadata::new(),
        }
    }

    /// Add a metadata entry.
    pub fn with_metadata(
        mut self,
        key: impl Into<String>,
        value: impl Into<serde_json::Value>,
    ) -> Self {
        self.metadata.insert(key.into(), value.into());
        self
    }
}

/// Summary of an ingestion batch.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct IngestReport {
    /// Records created.
    pub inserted: usize,

    /// Records replaced in place.
    pub replaced: usize,

    /// Records skipped because they failed.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub failed: Vec<IngestError>,

    /// Batch duration in milliseconds.
    pub duration_ms: u64,
}

impl IngestReport {
    /// Records that made it into the index.
    pub fn succeeded(&self) -> usize {
        self.inserted + self.replaced
    }
}

/// A record that could not be ingested.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IngestError {
    /// Identifier of the skipped record.
    pub external_id: String,
    /// Why it was skipped.
    pub message: String,
    /// Whether the failure was the caller's input rather than storage.
    pub usage_error: bool,
}

// ============================================================================
// Search types
// ============================================================================

/// A single nearest-neighbor match.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SearchHit {
    /// Paper identifier.
    pub external_id: String,

    /// Distance from the query in the metric's native unit.
    pub distance: f32,

    /// Metadata as stored.
    #[serde(default)]
    pub metadata: Metadata,
}

/// A raw match from an approximate index, before identity resolution.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Neighbor {
    /// Internal key.
    pub key: u64,
    /// Distance from the query.
    pub distance: f32,
}

/// Sort neighbors nearest first, breaking distance ties by key.
pub fn sort_neighbors(neighbors: &mut [Neighbor]) {
    neighbors.sort_by(|a, b| {
        a.distance
            .total_cmp(&b.distance)
            .then_with(|| a.key.cmp(&b.key))
    });
}

// ============================================================================
// Statistics
// ============================================================================

/// Snapshot of index state for diagnostics.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexStats {
    /// Records in the durable store.
    pub records: usize,
    /// Entries in the approximate index.
    pub indexed: usize,
    /// Embedding dimensionality.
    pub dimension: usize,
    /// Backend name.
    pub backend: String,
    /// Metric name.
    pub metric: String,
    /// Store write generation.
    pub generation: u64,
    /// Whether the on-disk snapshot matches the current generation.
    pub snapshot_fresh: bool,
    /// Storage directory, if durable.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_dir: Option<String>,
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    // ------------------------------------------------------------------------
    // IndexConfig tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_index_config_default() {
        let config = IndexConfig::default();
        assert_eq!(config.dimension, 768);
        assert_eq!(config.metric, Metric::Cosine);
        assert_eq!(config.backend, IndexBackend::Hnsw);
        assert!(config.data_dir.is_none());
        assert!(config.snapshot);
        assert_eq!(config.hnsw.m, 16);
        assert_eq!(config.hnsw.m_max0, 32);
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_index_config_deserialization_with_defaults() {
        let json = r#"{"dimension": 4, "backend": "flat"}"#;
        let config: IndexConfig = serde_json::from_str(json).unwrap();

        assert_eq!(config.dimension, 4);
        assert_eq!(config.backend, IndexBackend::Flat);
        assert_eq!(config.metric, Metric::Cosine);
        assert_eq!(config.hnsw.ef_search, 64);
    }

    #[test]
    fn test_index_config_validate() {
        assert!(IndexConfig::new(0).validate().is_err());

        let mut config = IndexConfig::new(4);
        config.hnsw.m = 1;
        assert!(config.validate().is_err());

        let mut config = IndexConfig::new(4);
        config.hnsw.m_max0 = 4;
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_index_config_builder() {
        let config = IndexConfig::new(8)
            .with_backend(IndexBackend::Flat)
            .with_metric(Metric::Euclidean)
            .with_data_dir("/tmp/carto");

        assert_eq!(config.dimension, 8);
        assert_eq!(config.backend, IndexBackend::Flat);
        assert_eq!(config.metric, Metric::Euclidean);
        assert_eq!(config.data_dir.as_deref(), Some("/tmp/carto"));
    }

    // ------------------------------------------------------------------------
    // Metric tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_metric_distance() {
        let a = [1.0, 0.0];
        let b = [0.0, 2.0];
        assert!((Metric::Cosine.distance(&a, &b) - 1.0).abs() < 1e-6);
        assert!((Metric::Euclidean.distance(&a, &b) - 5.0f32.sqrt()).abs() < 1e-6);
    }

    #[test]
    fn test_metric_serialization() {
        assert_eq!(serde_json::to_string(&Metric::Cosine).unwrap(), "\"cosine\"");
        let m: Metric = serde_json::from_str("\"euclidean\"").unwrap();
        assert_eq!(m, Metric::Euclidean);
    }

    // ------------------------------------------------------------------------
    // Record tests
    // ------------------------------------------------------------------------

    #[test]
    fn test_ingest_record_from_json() {
        let json = r#"{"id": "2101.00001", "vector": [0.1, 0.2], "metadata": {"title": "T"}}"#;
        let record: IngestRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "2101.00001");
        assert_eq!(record.vector, vec![0.1, 0.2]);
        assert_eq!(record.metadata["title"], "T");

        let json = r#"{"external_id": "p2", "vector": [1.0]}"#;
        let record: IngestRecord = serde_json::from_str(json).unwrap();
        assert_eq!(record.id, "p2");
        assert!(record.metadata.is_empty());
    }

    #[test]
    fn test_add_outcome_key() {
        assert_eq!(AddOutcome::Inserted { key: 3 }.key(), 3);
        assert_eq!(AddOutcome::Replaced { key: 7 }.key(), 7);
    }

    #[test]
    fn test_ingest_report_serialization_skips_empty_failures() {
        let report = IngestReport {
            inserted: 2,
            replaced: 1,
            failed: vec![],
            duration_ms: 5,
        };
        assert_eq!(report.succeeded(), 3);
        let json = serde_json::to_string(&report).unwrap();
        assert!(!json.contains("failed"));
    }

    #[test]
    fn test_sort_neighbors_breaks_ties_by_key() {
        let mut neighbors = vec![
            Neighbor { key: 9, distance: 0.5 },
            Neighbor { key: 2, distance: 0.5 },
            Neighbor { key: 4, distance: 0.1 },
        ];
        sort_neighbors(&mut neighbors);
        let keys: Vec<u64> = neighbors.iter().map(|n| n.key).collect();
        assert_eq!(keys, vec![4, 2, 9]);
    }
}
