//! The engine context object.
//!
//! An [`Engine`] owns the [`VectorIndex`] and wires it into a [`Navigator`]
//! and a [`Cartographer`]. Front ends construct one with [`Engine::open`]
//! and pass it (or clones of it) to whatever needs it.

use carto_core::{ConfigProvider, Error, Result};
use carto_graph::{BridgePaper, GraphStats, Navigator, NavigatorConfig};
use carto_topo::{
    Cartographer, CartographerConfig, GapCandidate, PersistenceDiagram, TopologicalFeature,
};
use carto_vector::{
    AddOutcome, IndexConfig, IndexMetadata, IndexStats, IngestRecord, IngestReport, Metadata,
    PaperRecord, SearchHit, VectorIndex,
};
use rand::Rng;
use serde::{Deserialize, Serialize};
use std::collections::HashSet;
use std::sync::Arc;

/// Configuration for every engine component.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    /// Vector index settings.
    #[serde(default)]
    pub index: IndexConfig,

    /// Navigator settings.
    #[serde(default)]
    pub navigator: NavigatorConfig,

    /// Cartographer settings.
    #[serde(default)]
    pub cartographer: CartographerConfig,
}

impl EngineConfig {
    /// Fill in the index data directory from a front-end configuration,
    /// unless one is already set.
    pub fn with_provider<C: ConfigProvider>(mut self, provider: &C) -> Result<Self> {
        if self.index.data_dir.is_none() {
            self.index.data_dir = Some(provider.data_path()?.to_string_lossy().into_owned());
        }
        Ok(self)
    }

    /// Check every section.
    pub fn validate(&self) -> Result<()> {
        self.index.validate()?;
        self.navigator.validate()?;
        self.cartographer.validate()
    }
}

/// Shared handle to an open index plus its analysis components.
///
/// Cloning is cheap; clones share the same index.
#[derive(Debug, Clone)]
pub struct Engine {
    config: Arc<EngineConfig>,
    index: Arc<VectorIndex>,
    navigator: Navigator<Arc<VectorIndex>>,
    cartographer: Cartographer,
}

impl Engine {
    /// Open the index and build the analysis components.
    pub fn open(config: EngineConfig) -> Result<Self> {
        config.validate()?;
        let index = Arc::new(VectorIndex::open(config.index.clone())?);
        log::info!(
            "Engine ready: {} papers, dimension {}",
            index.size(),
            index.dimension()
        );
        Ok(Self::assemble(config, index))
    }

    /// Open an engine whose index lives only in memory.
    pub fn in_memory(mut config: EngineConfig) -> Result<Self> {
        config.index.data_dir = None;
        Self::open(config)
    }

    fn assemble(config: EngineConfig, index: Arc<VectorIndex>) -> Self {
        let navigator = Navigator::new(Arc::clone(&index), config.navigator.clone());
        let cartographer = Cartographer::new(config.cartographer.clone());
        Self {
            config: Arc::new(config),
            index,
            navigator,
            cartographer,
        }
    }

    /// Persist the index snapshot.
    ///
    /// Other clones keep working; the snapshot simply goes stale again on
    /// their next write.
    pub fn shutdown(self) -> Result<Option<IndexMetadata>> {
        let saved = self.index.save_snapshot()?;
        log::info!("Engine shut down ({} papers)", self.index.size());
        Ok(saved)
    }

    /// The configuration the engine was opened with.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// The vector index.
    pub fn index(&self) -> &VectorIndex {
        &self.index
    }

    /// The navigator.
    pub fn navigator(&self) -> &Navigator<Arc<VectorIndex>> {
        &self.navigator
    }

    /// The cartographer.
    pub fn cartographer(&self) -> &Cartographer {
        &self.cartographer
    }

    // ==================== Index ====================

    /// Upsert a paper.
    pub fn add(&self, external_id: &str, vector: &[f32], metadata: Metadata) -> Result<AddOutcome> {
        self.index.add(external_id, vector, metadata)
    }

    /// Upsert many papers, skipping the ones that fail.
    pub fn add_batch(&self, records: impl IntoIterator<Item = IngestRecord>) -> IngestReport {
        self.index.add_batch(records)
    }

    /// Papers nearest a vector.
    pub fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        self.index.search(vector, limit)
    }

    /// Papers nearest a stored paper, excluding it.
    pub fn search_by_id(&self, external_id: &str, limit: usize) -> Result<Vec<SearchHit>> {
        self.index.search_by_id(external_id, limit)
    }

    /// A stored paper.
    pub fn get(&self, external_id: &str) -> Result<Option<PaperRecord>> {
        self.index.get(external_id)
    }

    /// Number of papers.
    pub fn size(&self) -> usize {
        self.index.size()
    }

    /// Index counters.
    pub fn stats(&self) -> Result<IndexStats> {
        self.index.stats()
    }

    // ==================== Navigator ====================

    /// Weighted mean of raw vectors.
    pub fn centroid<V: AsRef<[f32]>>(
        &self,
        vectors: &[V],
        weights: Option<&[f32]>,
    ) -> Result<Option<Vec<f32>>> {
        self.navigator.centroid(vectors, weights)
    }

    /// Weighted mean of stored papers; unknown ids are dropped.
    pub fn centroid_of<T: AsRef<str>>(
        &self,
        ids: &[T],
        weights: Option<&[f32]>,
    ) -> Result<Option<Vec<f32>>> {
        self.navigator.centroid_of(ids, weights)
    }

    /// Papers near the centroid of `seed_ids`, excluding the seeds.
    ///
    /// Returns an empty result when none of the seeds are indexed.
    pub fn explore_interest<T: AsRef<str>>(
        &self,
        seed_ids: &[T],
        limit: usize,
    ) -> Result<Vec<SearchHit>> {
        let Some(interest) = self.navigator.centroid_of(seed_ids, None)? else {
            log::warn!("None of the {} seed papers are indexed", seed_ids.len());
            return Ok(Vec::new());
        };

        let seeds: HashSet<&str> = seed_ids.iter().map(AsRef::as_ref).collect();
        let mut hits = self
            .index
            .search(&interest, limit.saturating_add(seeds.len()))?;
        hits.retain(|hit| !seeds.contains(hit.external_id.as_str()));
        hits.truncate(limit);
        Ok(hits)
    }

    /// Papers bridging two clusters.
    ///
    /// `top_k` defaults to the navigator's configured `default_top_k`.
    pub fn find_bridge_papers<A: AsRef<str>, B: AsRef<str>>(
        &self,
        cluster_a: &[A],
        cluster_b: &[B],
        top_k: Option<usize>,
    ) -> Result<Vec<BridgePaper>> {
        let top_k = top_k.unwrap_or(self.config.navigator.default_top_k);
        self.navigator.find_bridge_papers(cluster_a, cluster_b, top_k)
    }

    /// Similarity graph statistics over a set of papers.
    pub fn graph_stats<T: AsRef<str>>(&self, ids: &[T]) -> Result<GraphStats> {
        let graph = self.navigator.similarity_graph(ids)?;
        Ok(self.navigator.compute_stats(&graph))
    }

    // ==================== Cartographer ====================

    /// Vectors of the given papers, or of the whole corpus.
    pub fn points<T: AsRef<str>>(&self, ids: Option<&[T]>) -> Result<Vec<Vec<f32>>> {
        match ids {
            Some(ids) => Ok(self
                .navigator
                .resolve(ids)?
                .into_iter()
                .map(|(_, v)| v)
                .collect()),
            None => Ok(self
                .index
                .vectors()?
                .into_iter()
                .map(|(_, v)| v)
                .collect()),
        }
    }

    /// Persistence diagram of a point cloud.
    pub fn persistence_diagram<V: AsRef<[f32]>>(&self, points: &[V]) -> Result<PersistenceDiagram> {
        self.cartographer.persistence_diagram(points)
    }

    /// Significant voids in a point cloud.
    pub fn detect_voids<V: AsRef<[f32]>>(&self, points: &[V]) -> Result<Vec<TopologicalFeature>> {
        self.cartographer.detect_voids(points)
    }

    /// Maximin gap candidate in a point cloud.
    ///
    /// `samples` defaults to the cartographer's `default_samples`.
    pub fn find_gap<V, R>(
        &self,
        points: &[V],
        samples: Option<usize>,
        rng: &mut R,
    ) -> Result<Option<GapCandidate>>
    where
        V: AsRef<[f32]>,
        R: Rng + ?Sized,
    {
        let samples = samples.unwrap_or(self.config.cartographer.default_samples);
        self.cartographer.find_gap(points, samples, rng)
    }

    /// Maximin gap coordinates, at most one vector.
    pub fn find_gap_coordinates<V, R>(
        &self,
        points: &[V],
        samples: Option<usize>,
        rng: &mut R,
    ) -> Result<Vec<Vec<f32>>>
    where
        V: AsRef<[f32]>,
        R: Rng + ?Sized,
    {
        let samples = samples.unwrap_or(self.config.cartographer.default_samples);
        self.cartographer.find_gap_coordinates(points, samples, rng)
    }

    /// Search near a gap found in the corpus (or a subset of it).
    ///
    /// Returns the gap and the indexed papers closest to it, i.e. the
    /// nearest known work bordering the uncharted region.
    pub fn explore_gap<T, R>(
        &self,
        ids: Option<&[T]>,
        samples: Option<usize>,
        limit: usize,
        rng: &mut R,
    ) -> Result<Option<(GapCandidate, Vec<SearchHit>)>>
    where
        T: AsRef<str>,
        R: Rng + ?Sized,
    {
        let points = self.points(ids)?;
        let Some(gap) = self.find_gap(&points, samples, rng)? else {
            return Ok(None);
        };
        if gap.coordinates.len() != self.index.dimension() {
            return Err(Error::dimension_mismatch(
                self.index.dimension(),
                gap.coordinates.len(),
            ));
        }
        let neighbors = self.index.search(&gap.coordinates, limit)?;
        Ok(Some((gap, neighbors)))
    }
}

// ============================================================================
// Tests
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use std::path::PathBuf;
    use tempfile::tempdir;

    fn engine(dim: usize) -> Engine {
        Engine::in_memory(EngineConfig {
            index: IndexConfig::new(dim),
            ..Default::default()
        })
        .unwrap()
    }

    fn seeded_engine() -> Engine {
        let engine = engine(3);
        let report = engine.add_batch(vec![
            IngestRecord::new("a1", vec![1.0, 0.0, 0.0]),
            IngestRecord::new("a2", vec![0.98, 0.2, 0.0]),
            IngestRecord::new("a3", vec![0.98, -0.2, 0.0]),
            IngestRecord::new("m", vec![0.7, 0.7, 0.0]),
            IngestRecord::new("b1", vec![0.0, 1.0, 0.0]),
            IngestRecord::new("b2", vec![0.2, 0.98, 0.0]),
            IngestRecord::new("z", vec![0.0, 0.0, 1.0]),
        ]);
        assert_eq!(report.inserted, 7);
        engine
    }

    #[derive(Clone)]
    struct Lab {
        root: PathBuf,
    }

    impl ConfigProvider for Lab {
        fn project_name(&self) -> &str {
            "lab"
        }

        fn base_path(&self) -> Result<PathBuf> {
            Ok(self.root.clone())
        }
    }

    #[test]
    fn test_engine_is_shareable() {
        fn assert_send_sync<T: Send + Sync + Clone>() {}
        assert_send_sync::<Engine>();
    }

    #[test]
    fn test_explore_interest_excludes_seeds() {
        let engine = seeded_engine();
        let hits = engine.explore_interest(&["a1", "a2"], 2).unwrap();

        let ids: Vec<&str> = hits.iter().map(|h| h.external_id.as_str()).collect();
        assert_eq!(ids, vec!["a3", "m"]);
    }

    #[test]
    fn test_explore_interest_unknown_seeds() {
        let engine = seeded_engine();
        assert!(engine.explore_interest(&["nope"], 3).unwrap().is_empty());
    }

    #[test]
    fn test_bridges_use_default_top_k() {
        let engine = seeded_engine();
        let bridges = engine
            .find_bridge_papers(&["a1", "a2", "a3"], &["m", "b1", "b2", "z"], None)
            .unwrap();

        assert_eq!(bridges.len(), 5);
        assert_eq!(bridges[0].external_id, "m");
    }

    #[test]
    fn test_graph_stats() {
        let engine = seeded_engine();
        let stats = engine.graph_stats(&["a1", "a2", "z"]).unwrap();
        assert_eq!(stats.node_count, 3);
        assert_eq!(stats.edge_count, 1);
        assert_eq!(stats.isolated_count, 1);
    }

    #[test]
    fn test_points_subset_and_corpus() {
        let engine = seeded_engine();
        assert_eq!(engine.points(Some(&["a1", "ghost"][..])).unwrap().len(), 1);
        assert_eq!(engine.points::<&str>(None).unwrap().len(), 7);
    }

    #[test]
    fn test_explore_gap() {
        let engine = seeded_engine();
        let mut rng = StdRng::seed_from_u64(5);
        let (gap, hits) = engine
            .explore_gap::<&str, _>(None, Some(200), 2, &mut rng)
            .unwrap()
            .unwrap();

        assert_eq!(gap.coordinates.len(), 3);
        assert!(gap.clearance > 0.0);
        assert_eq!(hits.len(), 2);
    }

    #[test]
    fn test_voids_on_small_corpus_are_empty() {
        let engine = seeded_engine();
        let points = engine.points::<&str>(None).unwrap();
        assert!(engine.detect_voids(&points).unwrap().is_empty());
        assert!(!engine.persistence_diagram(&points).unwrap().features.is_empty());
    }

    #[test]
    fn test_invalid_config_rejected() {
        let mut config = EngineConfig::default();
        config.navigator.similarity_threshold = 2.0;
        assert!(Engine::in_memory(config).is_err());
    }

    #[test]
    fn test_provider_sets_data_dir() {
        let dir = tempdir().unwrap();
        let lab = Lab {
            root: dir.path().to_path_buf(),
        };
        let config = EngineConfig {
            index: IndexConfig::new(2),
            ..Default::default()
        }
        .with_provider(&lab)
        .unwrap();

        let expected = dir.path().join("index");
        assert_eq!(config.index.data_dir.as_deref(), expected.to_str());

        let engine = Engine::open(config.clone()).unwrap();
        engine.add("p", &[1.0, 0.0], Metadata::new()).unwrap();
        let saved = engine.shutdown().unwrap().unwrap();
        assert_eq!(saved.record_count, 1);

        let reopened = Engine::open(config).unwrap();
        assert_eq!(reopened.size(), 1);
        assert!(reopened.stats().unwrap().snapshot_fresh);
    }
}
