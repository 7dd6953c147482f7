//! Snapshot persistence and freshness checking for the approximate index.
//!
//! The store is the source of truth; the snapshot only saves a rebuild.
//! A snapshot is written as two files in the data directory:
//!
//! - `ann.snapshot.json`: the serialized backend
//! - `ann.meta.json`: [`IndexMetadata`] with the store generation and a
//!   blake3 checksum of the snapshot bytes
//!
//! When the generation or checksum does not match, the snapshot is ignored
//! and the index is rebuilt from the store.

use crate::ann::AnnSnapshot;
use carto_core::{Error, Result};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::time::{SystemTime, UNIX_EPOCH};

/// Snapshot file name.
pub const SNAPSHOT_FILE: &str = "ann.snapshot.json";

/// Snapshot metadata file name.
pub const METADATA_FILE: &str = "ann.meta.json";

/// Metadata stored alongside an index snapshot for freshness checking.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct IndexMetadata {
    /// Store generation at snapshot time.
    pub generation: u64,

    /// Number of live entries in the snapshot.
    pub record_count: usize,

    /// Vector dimensionality.
    pub dimension: usize,

    /// Backend name.
    pub backend: String,

    /// Metric name.
    pub metric: String,

    /// blake3 hex digest of the snapshot file.
    pub checksum: String,

    /// Build time, seconds since the Unix epoch.
    pub built_at: u64,
}

fn snapshot_path(dir: &Path) -> PathBuf {
    dir.join(SNAPSHOT_FILE)
}

fn metadata_path(dir: &Path) -> PathBuf {
    dir.join(METADATA_FILE)
}

/// Write `bytes` to `path` via a temporary file and rename.
fn write_atomic(path: &Path, bytes: &[u8]) -> Result<()> {
    let tmp = path.with_extension("tmp");
    std::fs::write(&tmp, bytes).map_err(|e| Error::io_with_path(e, &tmp))?;
    std::fs::rename(&tmp, path).map_err(|e| Error::io_with_path(e, path))?;
    Ok(())
}

/// Save a snapshot and its metadata into `dir`.
///
/// The snapshot file is written first, so a crash between the two writes
/// leaves metadata whose checksum no longer matches.
pub fn save_snapshot(
    dir: &Path,
    snapshot: &AnnSnapshot,
    generation: u64,
    record_count: usize,
    dimension: usize,
    metric: &str,
) -> Result<IndexMetadata> {
    let bytes = serde_json::to_vec(snapshot)?;
    let metadata = IndexMetadata {
        generation,
        record_count,
        dimension,
        backend: snapshot.backend().name().to_string(),
        metric: metric.to_string(),
        checksum: blake3::hash(&bytes).to_hex().to_string(),
        built_at: SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map(|d| d.as_secs())
            .unwrap_or(0),
    };

    write_atomic(&snapshot_path(dir), &bytes)?;
    save_metadata(&metadata_path(dir), &metadata)?;
    log::debug!(
        "Saved {} snapshot ({} entries, generation {})",
        metadata.backend,
        record_count,
        generation
    );
    Ok(metadata)
}

/// Load the snapshot in `dir` if it is fresh for `generation`.
///
/// Returns `None`, with a warning where relevant, when the snapshot is
/// missing, stale, or corrupt.
pub fn load_snapshot(dir: &Path, generation: u64) -> Option<(AnnSnapshot, IndexMetadata)> {
    let meta_path = metadata_path(dir);
    if !meta_path.exists() {
        log::debug!("No index snapshot in {}", dir.display());
        return None;
    }

    let metadata = match load_metadata(&meta_path) {
        Ok(m) => m,
        Err(e) => {
            log::warn!("Ignoring unreadable snapshot metadata: {e}");
            return None;
        }
    };
    if metadata.generation != generation {
        log::info!(
            "Index snapshot is stale (generation {} vs store {}), rebuilding",
            metadata.generation,
            generation
        );
        return None;
    }

    let path = snapshot_path(dir);
    let bytes = match std::fs::read(&path) {
        Ok(b) => b,
        Err(e) => {
            log::warn!("Ignoring unreadable snapshot {}: {e}", path.display());
            return None;
        }
    };
    if blake3::hash(&bytes).to_hex().as_str() != metadata.checksum {
        log::warn!("Index snapshot checksum mismatch, rebuilding");
        return None;
    }

    match serde_json::from_slice(&bytes) {
        Ok(snapshot) => Some((snapshot, metadata)),
        Err(e) => {
            log::warn!("Ignoring undecodable snapshot: {e}");
            None
        }
    }
}

/// Check whether the snapshot in `dir` matches `generation`.
pub fn is_snapshot_fresh(dir: &Path, generation: u64) -> bool {
    match load_metadata(&metadata_path(dir)) {
        Ok(metadata) => metadata.generation == generation,
        Err(_) => false,
    }
}

/// Save index metadata to a JSON file.
pub fn save_metadata(path: &Path, metadata: &IndexMetadata) -> Result<()> {
    let json = serde_json::to_string_pretty(metadata)?;
    write_atomic(path, json.as_bytes())
}

/// Load index metadata from a JSON file.
pub fn load_metadata(path: &Path) -> Result<IndexMetadata> {
    let json = std::fs::read_to_string(path).map_err(|e| Error::io_with_path(e, path))?;
    let metadata: IndexMetadata = serde_json::from_str(&json)?;
    Ok(metadata)
}

// ============================================================================
// Tests
// ============================================================================
