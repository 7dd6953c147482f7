//! The combined store + approximate index.
//!
//! [`VectorIndex`] keeps the durable [`VectorStore`] and an [`AnnIndex`]
//! backend in step. Every `add` is a small two-phase write:
//!
//! 1. stage the upsert in an uncommitted store transaction
//! 2. upsert the key into the approximate index
//! 3. commit the store transaction
//!
//! An index failure in step 2 aborts the transaction. A commit failure in
//! step 3 reverts the index entry. Either way `add` returns the error and
//! both containers are as they were before the call.
//!
//! Writers are serialized by the index write lock, which is held across
//! all three steps; searches take the read lock, so they never observe a
//! record that is in the index but not yet committed.

use crate::ann::{AnnIndex, create_ann_index, restore_ann_index};
use crate::persistence::{self, IndexMetadata};
use crate::store::VectorStore;
use crate::types::{
    AddOutcome, IndexConfig, IndexStats, IngestError, IngestRecord, IngestReport, Metadata,
    PaperRecord, SearchHit,
};
use carto_core::math::{check_dimension, check_finite};
use carto_core::{Error, Result, VectorSource};
use parking_lot::RwLock;
use std::path::{Path, PathBuf};
use std::time::Instant;

/// File name of the durable store inside the data directory.
pub const STORE_FILE: &str = "papers.redb";

/// Durable paper store with an approximate nearest-neighbor index.
pub struct VectorIndex {
    config: IndexConfig,
    store: VectorStore,
    ann: RwLock<Box<dyn AnnIndex>>,
    data_dir: Option<PathBuf>,
}

impl VectorIndex {
    /// Open the index described by `config`.
    ///
    /// With a `data_dir` the store is opened (or created) on disk and the
    /// approximate index is loaded from a fresh snapshot or rebuilt from
    /// the store. Without one, everything lives in memory.
    pub fn open(config: IndexConfig) -> Result<Self> {
        config.validate()?;
        let (store, data_dir) = open_store(&config)?;

        let ann = match &data_dir {
            Some(dir) if config.snapshot => load_or_rebuild(&config, &store, dir)?,
            _ => rebuild(&config, &store, create_ann_index(&config))?,
        };

        log::info!(
            "Opened vector index: {} records, backend={}, dimension={}",
            ann.len(),
            ann.name(),
            config.dimension
        );

        Ok(Self {
            config,
            store,
            ann: RwLock::new(ann),
            data_dir,
        })
    }

    /// Open an in-memory index, ignoring any configured `data_dir`.
    pub fn in_memory(mut config: IndexConfig) -> Result<Self> {
        config.data_dir = None;
        Self::open(config)
    }

    /// Open with a caller-supplied index backend.
    ///
    /// The backend is filled from the store before use.
    pub fn with_ann_index(config: IndexConfig, ann: Box<dyn AnnIndex>) -> Result<Self> {
        config.validate()?;
        if ann.dimension() != config.dimension {
            return Err(Error::config(format!(
                "index backend dimension {} does not match configured dimension {}",
                ann.dimension(),
                config.dimension
            )));
        }
        let (store, data_dir) = open_store(&config)?;
        let ann = rebuild(&config, &store, ann)?;
        Ok(Self {
            config,
            store,
            ann: RwLock::new(ann),
            data_dir,
        })
    }

    /// The configuration this index was opened with.
    pub fn config(&self) -> &IndexConfig {
        &self.config
    }

    /// Embedding dimensionality.
    pub fn dimension(&self) -> usize {
        self.config.dimension
    }

    /// Number of distinct records.
    pub fn size(&self) -> usize {
        self.ann.read().len()
    }

    /// Whether the index holds no records.
    pub fn is_empty(&self) -> bool {
        self.size() == 0
    }

    // ==================== Writes ====================

    /// Upsert a paper.
    ///
    /// Re-adding an existing `external_id` replaces its vector and metadata
    /// under the same internal key.
    pub fn add(
        &self,
        external_id: &str,
        vector: &[f32],
        metadata: Metadata,
    ) -> Result<AddOutcome> {
        if external_id.is_empty() {
            return Err(Error::invalid_input("external_id must not be empty"));
        }
        check_dimension(vector, self.config.dimension)?;
        check_finite(vector)?;

        let mut ann = self.ann.write();
        let staged = self.store.stage(external_id, vector, &metadata)?;
        let key = staged.key();
        let previous = staged.previous_vector().map(<[f32]>::to_vec);

        if let Err(e) = ann.upsert(key, vector) {
            log::error!("Index insert failed for {external_id} (key {key}), rolling back: {e}");
            if let Err(abort) = staged.abort() {
                log::warn!("Store rollback for {external_id} reported: {abort}");
            }
            return Err(e);
        }

        if let Err(e) = staged.commit() {
            log::error!("Store commit failed for {external_id} (key {key}), reverting index: {e}");
            let reverted = match &previous {
                Some(v) => ann.upsert(key, v),
                None => ann.remove(key).map(|_| ()),
            };
            if let Err(revert) = reverted {
                log::error!(
                    "Index revert for {external_id} failed, rebuilding on next open: {revert}"
                );
            }
            return Err(e);
        }

        let outcome = if previous.is_some() {
            AddOutcome::Replaced { key }
        } else {
            AddOutcome::Inserted { key }
        };
        log::debug!("Indexed {external_id}: {outcome:?}");
        Ok(outcome)
    }

    /// Upsert many papers, logging and skipping the ones that fail.
    pub fn add_batch(&self, records: impl IntoIterator<Item = IngestRecord>) -> IngestReport {
        let start = Instant::now();
        let mut report = IngestReport::default();

        for record in records {
            match self.add(&record.id, &record.vector, record.metadata) {
                Ok(AddOutcome::Inserted { .. }) => report.inserted += 1,
                Ok(AddOutcome::Replaced { .. }) => report.replaced += 1,
                Err(e) => {
                    log::error!("Skipping {}: {e}", record.id);
                    report.failed.push(IngestError {
                        external_id: record.id,
                        message: e.to_string(),
                        usage_error: e.is_usage_error(),
                    });
                }
            }
        }

        report.duration_ms = start.elapsed().as_millis() as u64;
        log::info!(
            "Ingested {} records ({} new, {} replaced, {} failed) in {}ms",
            report.succeeded(),
            report.inserted,
            report.replaced,
            report.failed.len(),
            report.duration_ms
        );
        report
    }

    // ==================== Queries ====================

    /// Up to `limit` papers nearest `vector`, nearest first.
    pub fn search(&self, vector: &[f32], limit: usize) -> Result<Vec<SearchHit>> {
        check_dimension(vector, self.config.dimension)?;
        check_finite(vector)?;

        let ann = self.ann.read();
        let neighbors = ann.search(vector, limit)?;
        let keys: Vec<u64> = neighbors.iter().map(|n| n.key).collect();
        let resolved = self.store.resolve(&keys)?;
        drop(ann);

        let hits = neighbors
            .into_iter()
            .zip(resolved)
            .filter_map(|(neighbor, entry)| match entry {
                Some((external_id, metadata)) => Some(SearchHit {
                    external_id,
                    distance: neighbor.distance,
                    metadata,
                }),
                None => {
                    log::warn!("Index key {} has no stored record", neighbor.key);
                    None
                }
            })
            .collect();
        Ok(hits)
    }

    /// Up to `limit` papers nearest a stored paper, excluding the paper itself.
    pub fn search_by_id(&self, external_id: &str, limit: usize) -> Result<Vec<SearchHit>> {
        let vector = self
            .store
            .vector(external_id)?
            .ok_or_else(|| Error::not_found(format!("paper {external_id} is not indexed")))?;

        let mut hits = self.search(&vector, limit.saturating_add(1))?;
        hits.retain(|hit| hit.external_id != external_id);
        hits.truncate(limit);
        Ok(hits)
    }

    /// The stored record for `external_id`.
    pub fn get(&self, external_id: &str) -> Result<Option<PaperRecord>> {
        self.store.get(external_id)
    }

    /// Whether `external_id` is stored.
    pub fn contains(&self, external_id: &str) -> Result<bool> {
        Ok(self.store.key_of(external_id)?.is_some())
    }

    /// Every stored record, in internal key order.
    pub fn records(&self) -> Result<Vec<PaperRecord>> {
        self.store.records()
    }

    /// Every stored `(external_id, vector)` pair, in internal key order.
    pub fn vectors(&self) -> Result<Vec<(String, Vec<f32>)>> {
        Ok(self
            .store
            .records()?
            .into_iter()
            .map(|r| (r.external_id, r.vector))
            .collect())
    }

    // ==================== Persistence ====================

    /// Persist the approximate index next to the store.
    ///
    /// Returns `None` for in-memory indexes, when snapshots are disabled,
    /// or when the backend cannot be serialized.
    pub fn save_snapshot(&self) -> Result<Option<IndexMetadata>> {
        let Some(dir) = self.data_dir.as_deref() else {
            return Ok(None);
        };
        if !self.config.snapshot {
            return Ok(None);
        }

        let ann = self.ann.read();
        let Some(snapshot) = ann.to_snapshot() else {
            log::debug!("Backend {} does not support snapshots", ann.name());
            return Ok(None);
        };
        let generation = self.store.generation()?;
        let metadata = persistence::save_snapshot(
            dir,
            &snapshot,
            generation,
            ann.len(),
            self.config.dimension,
            self.config.metric.name(),
        )?;
        log::info!(
            "Saved index snapshot at generation {generation} to {}",
            dir.display()
        );
        Ok(Some(metadata))
    }

    /// Diagnostic counters.
    pub fn stats(&self) -> Result<IndexStats> {
        let ann = self.ann.read();
        let generation = self.store.generation()?;
        Ok(IndexStats {
            records: self.store.len()?,
            indexed: ann.len(),
            dimension: self.config.dimension,
            backend: ann.name().to_string(),
            metric: self.config.metric.name().to_string(),
            generation,
            snapshot_fresh: self
                .data_dir
                .as_deref()
                .is_some_and(|dir| persistence::is_snapshot_fresh(dir, generation)),
            data_dir: self
                .data_dir
                .as_ref()
                .map(|d| d.to_string_lossy().into_owned()),
        })
    }
}

impl VectorSource for VectorIndex {
    fn vector(&self, external_id: &str) -> Result<Option<Vec<f32>>> {
        self.store.vector(external_id)
    }
}

impl std::fmt::Debug for VectorIndex {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorIndex")
            .field("dimension", &self.config.dimension)
            .field("backend", &self.config.backend)
            .field("data_dir", &self.data_dir)
            .field("size", &self.size())
            .finish()
    }
}

fn open_store(config: &IndexConfig) -> Result<(VectorStore, Option<PathBuf>)> {
    match &config.data_dir {
        Some(dir) => {
            let dir = PathBuf::from(dir);
            std::fs::create_dir_all(&dir).map_err(|e| Error::io_with_path(e, &dir))?;
            let store = VectorStore::open(dir.join(STORE_FILE), config.dimension)?;
            Ok((store, Some(dir)))
        }
        None => Ok((VectorStore::in_memory(config.dimension)?, None)),
    }
}

fn rebuild(
    config: &IndexConfig,
    store: &VectorStore,
    mut ann: Box<dyn AnnIndex>,
) -> Result<Box<dyn AnnIndex>> {
    let start = Instant::now();
    store.for_each_vector(|key, vector| ann.upsert(key, &vector))?;
    if !ann.is_empty() {
        log::info!(
            "Rebuilt {} index over {} records in {}ms (dimension {})",
            ann.name(),
            ann.len(),
            start.elapsed().as_millis(),
            config.dimension
        );
    }
    Ok(ann)
}

fn load_or_rebuild(
    config: &IndexConfig,
    store: &VectorStore,
    dir: &Path,
) -> Result<Box<dyn AnnIndex>> {
    let generation = store.generation()?;
    if let Some((snapshot, metadata)) = persistence::load_snapshot(dir, generation) {
        match restore_ann_index(snapshot, config) {
            Ok(ann) if ann.len() == store.len()? => {
                log::info!(
                    "Loaded index snapshot at generation {} ({} entries)",
                    metadata.generation,
                    ann.len()
                );
                return Ok(ann);
            }
            Ok(ann) => log::warn!(
                "Index snapshot holds {} entries but store has {}, rebuilding",
                ann.len(),
                store.len()?
            ),
            Err(e) => log::warn!("Index snapshot rejected, rebuilding: {e}"),
        }
    }
    rebuild(config, store, create_ann_index(config))
}

// ============================================================================
// Tests
// ============================================================================
