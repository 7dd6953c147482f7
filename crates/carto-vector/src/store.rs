//! Durable paper storage using redb.
//!
//! The store owns identity: it maps each `external_id` to a dense
//! `internal_key` and keeps the vector and metadata blobs under that key.
//!
//! # Tables
//!
//! | Table | Key | Value |
//! |-------|-----|-------|
//! | `ids` | external id | internal key |
//! | `keys` | internal key | external id |
//! | `metadata` | internal key | JSON-serialized metadata |
//! | `vectors` | internal key | little-endian `f32` blob, `4 * D` bytes |
//! | `state` | name | counter (`dimension`, `next_key`, `generation`, `records`) |
//!
//! Writes are staged: [`VectorStore::stage`] opens a write transaction and
//! applies the upsert without committing, so the caller can update the
//! approximate index before deciding to commit or abort.

use crate::types::{Metadata, PaperRecord};
use carto_core::{Error, Result};
use redb::{
    Database, ReadTransaction, ReadableDatabase, ReadableTable, TableDefinition, WriteTransaction,
};
use std::path::Path;

const IDS_TABLE: TableDefinition<&str, u64> = TableDefinition::new("ids");
const KEYS_TABLE: TableDefinition<u64, &str> = TableDefinition::new("keys");
const METADATA_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("metadata");
const VECTORS_TABLE: TableDefinition<u64, &[u8]> = TableDefinition::new("vectors");
const STATE_TABLE: TableDefinition<&str, u64> = TableDefinition::new("state");

const STATE_DIMENSION: &str = "dimension";
const STATE_NEXT_KEY: &str = "next_key";
const STATE_GENERATION: &str = "generation";
const STATE_RECORDS: &str = "records";

fn storage_err(e: impl std::fmt::Display) -> Error {
    Error::storage(e.to_string())
}

/// Encode a vector as a fixed-width little-endian blob.
pub fn encode_vector(vector: &[f32]) -> Vec<u8> {
    vector.iter().flat_map(|v| v.to_le_bytes()).collect()
}

/// Decode a blob written by [`encode_vector`].
pub fn decode_vector(bytes: &[u8], dimension: usize) -> Result<Vec<f32>> {
    if bytes.len() != dimension * 4 {
        return Err(Error::invalid_data(format!(
            "vector blob is {} bytes, expected {}",
            bytes.len(),
            dimension * 4
        )));
    }
    Ok(bytes
        .chunks_exact(4)
        .map(|c| f32::from_le_bytes([c[0], c[1], c[2], c[3]]))
        .collect())
}

/// Durable mapping from paper identifier to `(key, vector, metadata)`.
pub struct VectorStore {
    db: Database,
    dimension: usize,
    #[cfg(test)]
    commit_fault: std::sync::atomic::AtomicBool,
}

impl VectorStore {
    /// Create or open a store file.
    ///
    /// Fails with a configuration error if the file was created for a
    /// different dimensionality.
    pub fn open(path: impl AsRef<Path>, dimension: usize) -> Result<Self> {
        let db = Database::create(path.as_ref()).map_err(storage_err)?;
        Self::init(db, dimension)
    }

    /// Create a store that lives only in memory.
    pub fn in_memory(dimension: usize) -> Result<Self> {
        let db = Database::builder()
            .create_with_backend(redb::backends::InMemoryBackend::new())
            .map_err(storage_err)?;
        Self::init(db, dimension)
    }

    fn init(db: Database, dimension: usize) -> Result<Self> {
        let txn = db.begin_write().map_err(storage_err)?;
        {
            txn.open_table(IDS_TABLE).map_err(storage_err)?;
            txn.open_table(KEYS_TABLE).map_err(storage_err)?;
            txn.open_table(METADATA_TABLE).map_err(storage_err)?;
            txn.open_table(VECTORS_TABLE).map_err(storage_err)?;

            let mut state = txn.open_table(STATE_TABLE).map_err(storage_err)?;
            let stored = state
                .get(STATE_DIMENSION)
                .map_err(storage_err)?
                .map(|g| g.value());
            match stored {
                Some(d) if d as usize != dimension => {
                    return Err(Error::config(format!(
                        "store was created with dimension {d}, configured dimension is {dimension}"
                    )));
                }
                Some(_) => {}
                None => {
                    state
                        .insert(STATE_DIMENSION, dimension as u64)
                        .map_err(storage_err)?;
                }
            }
        }
        txn.commit().map_err(storage_err)?;

        Ok(Self {
            db,
            dimension,
            #[cfg(test)]
            commit_fault: std::sync::atomic::AtomicBool::new(false),
        })
    }

    /// Make the commit of the next staged write fail.
    #[cfg(test)]
    pub(crate) fn fail_next_commit(&self) {
        self.commit_fault.store(true, std::sync::atomic::Ordering::SeqCst);
    }

    /// The dimensionality every stored vector has.
    pub fn dimension(&self) -> usize {
        self.dimension
    }

    // ==================== Writes ====================

    /// Stage an upsert without committing it.
    ///
    /// An existing `external_id` keeps its internal key; a new one gets the
    /// next key in sequence. The store generation is bumped either way.
    pub fn stage(
        &self,
        external_id: &str,
        vector: &[f32],
        metadata: &Metadata,
    ) -> Result<StagedWrite> {
        let metadata_bytes = serde_json::to_vec(metadata)?;
        let vector_bytes = encode_vector(vector);

        let txn = self.db.begin_write().map_err(storage_err)?;
        let (key, previous) = {
            let mut ids = txn.open_table(IDS_TABLE).map_err(storage_err)?;
            let mut keys = txn.open_table(KEYS_TABLE).map_err(storage_err)?;
            let mut meta = txn.open_table(METADATA_TABLE).map_err(storage_err)?;
            let mut vectors = txn.open_table(VECTORS_TABLE).map_err(storage_err)?;
            let mut state = txn.open_table(STATE_TABLE).map_err(storage_err)?;

            let existing = ids
                .get(external_id)
                .map_err(storage_err)?
                .map(|g| g.value());

            let (key, previous) = match existing {
                Some(key) => {
                    let previous = match vectors.get(key).map_err(storage_err)? {
                        Some(g) => Some(decode_vector(g.value(), self.dimension)?),
                        None => None,
                    };
                    (key, previous)
                }
                None => {
                    let key = read_counter(&state, STATE_NEXT_KEY)?;
                    state
                        .insert(STATE_NEXT_KEY, key + 1)
                        .map_err(storage_err)?;
                    let records = read_counter(&state, STATE_RECORDS)?;
                    state
                        .insert(STATE_RECORDS, records + 1)
                        .map_err(storage_err)?;
                    ids.insert(external_id, key).map_err(storage_err)?;
                    keys.insert(key, external_id).map_err(storage_err)?;
                    (key, None)
                }
            };

            meta.insert(key, metadata_bytes.as_slice())
                .map_err(storage_err)?;
            vectors
                .insert(key, vector_bytes.as_slice())
                .map_err(storage_err)?;

            let generation = read_counter(&state, STATE_GENERATION)?;
            state
                .insert(STATE_GENERATION, generation + 1)
                .map_err(storage_err)?;

            (key, previous)
        };

        Ok(StagedWrite {
            txn,
            key,
            previous,
            #[cfg(test)]
            fail_commit: self
                .commit_fault
                .swap(false, std::sync::atomic::Ordering::SeqCst),
        })
    }

    // ==================== Reads ====================

    fn begin_read(&self) -> Result<ReadTransaction> {
        self.db.begin_read().map_err(storage_err)
    }

    /// Internal key for an identifier, if stored.
    pub fn key_of(&self, external_id: &str) -> Result<Option<u64>> {
        let txn = self.begin_read()?;
        let ids = txn.open_table(IDS_TABLE).map_err(storage_err)?;
        Ok(ids
            .get(external_id)
            .map_err(storage_err)?
            .map(|g| g.value()))
    }

    /// Full record for an identifier.
    pub fn get(&self, external_id: &str) -> Result<Option<PaperRecord>> {
        let txn = self.begin_read()?;
        let ids = txn.open_table(IDS_TABLE).map_err(storage_err)?;
        let Some(key) = ids
            .get(external_id)
            .map_err(storage_err)?
            .map(|g| g.value())
        else {
            return Ok(None);
        };
        self.read_record(&txn, key)
    }

    /// Stored vector for an identifier.
    pub fn vector(&self, external_id: &str) -> Result<Option<Vec<f32>>> {
        let txn = self.begin_read()?;
        let ids = txn.open_table(IDS_TABLE).map_err(storage_err)?;
        let Some(key) = ids
            .get(external_id)
            .map_err(storage_err)?
            .map(|g| g.value())
        else {
            return Ok(None);
        };
        let vectors = txn.open_table(VECTORS_TABLE).map_err(storage_err)?;
        match vectors.get(key).map_err(storage_err)? {
            Some(g) => Ok(Some(decode_vector(g.value(), self.dimension)?)),
            None => Ok(None),
        }
    }

    /// Resolve internal keys to `(external_id, metadata)` in one read.
    ///
    /// Keys without a record resolve to `None`.
    pub fn resolve(&self, keys: &[u64]) -> Result<Vec<Option<(String, Metadata)>>> {
        let txn = self.begin_read()?;
        let ids = txn.open_table(KEYS_TABLE).map_err(storage_err)?;
        let meta = txn.open_table(METADATA_TABLE).map_err(storage_err)?;

        let mut out = Vec::with_capacity(keys.len());
        for &key in keys {
            let Some(external_id) = ids
                .get(key)
                .map_err(storage_err)?
                .map(|g| g.value().to_string())
            else {
                out.push(None);
                continue;
            };
            let metadata = match meta.get(key).map_err(storage_err)? {
                Some(g) => decode_metadata(g.value())?,
                None => Metadata::new(),
            };
            out.push(Some((external_id, metadata)));
        }
        Ok(out)
    }

    /// Visit every stored `(key, vector)` pair in key order.
    pub fn for_each_vector(&self, mut f: impl FnMut(u64, Vec<f32>) -> Result<()>) -> Result<()> {
        let txn = self.begin_read()?;
        let vectors = txn.open_table(VECTORS_TABLE).map_err(storage_err)?;
        for entry in vectors.iter().map_err(storage_err)? {
            let (key, blob) = entry.map_err(storage_err)?;
            f(key.value(), decode_vector(blob.value(), self.dimension)?)?;
        }
        Ok(())
    }

    /// All records in key order.
    pub fn records(&self) -> Result<Vec<PaperRecord>> {
        let txn = self.begin_read()?;
        let keys = txn.open_table(KEYS_TABLE).map_err(storage_err)?;
        let mut out = Vec::new();
        for entry in keys.iter().map_err(storage_err)? {
            let (key, _) = entry.map_err(storage_err)?;
            if let Some(record) = self.read_record(&txn, key.value())? {
                out.push(record);
            }
        }
        Ok(out)
    }

    /// Number of distinct records.
    pub fn len(&self) -> Result<usize> {
        let txn = self.begin_read()?;
        let state = txn.open_table(STATE_TABLE).map_err(storage_err)?;
        Ok(read_counter(&state, STATE_RECORDS)? as usize)
    }

    /// Whether the store holds no records.
    pub fn is_empty(&self) -> Result<bool> {
        Ok(self.len()? == 0)
    }

    /// Write generation; increases with every committed upsert.
    pub fn generation(&self) -> Result<u64> {
        let txn = self.begin_read()?;
        let state = txn.open_table(STATE_TABLE).map_err(storage_err)?;
        read_counter(&state, STATE_GENERATION)
    }

    fn read_record(&self, txn: &ReadTransaction, key: u64) -> Result<Option<PaperRecord>> {
        let keys = txn.open_table(KEYS_TABLE).map_err(storage_err)?;
        let Some(external_id) = keys
            .get(key)
            .map_err(storage_err)?
            .map(|g| g.value().to_string())
        else {
            return Ok(None);
        };

        let vectors = txn.open_table(VECTORS_TABLE).map_err(storage_err)?;
        let vector = match vectors.get(key).map_err(storage_err)? {
            Some(g) => decode_vector(g.value(), self.dimension)?,
            None => {
                return Err(Error::invalid_data(format!(
                    "record {external_id} (key {key}) has no vector"
                )));
            }
        };

        let meta = txn.open_table(METADATA_TABLE).map_err(storage_err)?;
        let metadata = match meta.get(key).map_err(storage_err)? {
            Some(g) => decode_metadata(g.value())?,
            None => Metadata::new(),
        };

        Ok(Some(PaperRecord {
            external_id,
            internal_key: key,
            vector,
            metadata,
        }))
    }
}

impl std::fmt::Debug for VectorStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VectorStore")
            .field("dimension", &self.dimension)
            .finish()
    }
}

fn read_counter(table: &impl ReadableTable<&'static str, u64>, name: &str) -> Result<u64> {
    Ok(table
        .get(name)
        .map_err(storage_err)?
        .map(|g| g.value())
        .unwrap_or(0))
}

fn decode_metadata(bytes: &[u8]) -> Result<Metadata> {
    serde_json::from_slice(bytes)
        .map_err(|e| Error::invalid_data(format!("stored metadata is not a JSON object: {e}")))
}

/// An upsert applied inside an open write transaction.
///
/// Dropping it without calling [`commit`](Self::commit) aborts the write.
pub struct StagedWrite {
    txn: WriteTransaction,
    key: u64,
    previous: Option<Vec<f32>>,
    #[cfg(test)]
    fail_commit: bool,
}

impl StagedWrite {
    /// The internal key the record is written under.
    pub fn key(&self) -> u64 {
        self.key
    }

    /// Whether the write replaces an existing record.
    pub fn is_replace(&self) -> bool {
        self.previous.is_some()
    }

    /// The vector being replaced, if any.
    pub fn previous_vector(&self) -> Option<&[f32]> {
        self.previous.as_deref()
    }

    /// Make the write durable.
    pub fn commit(self) -> Result<()> {
        #[cfg(test)]
        {
            if self.fail_commit {
                self.txn.abort().map_err(storage_err)?;
                return Err(Error::storage("commit failed"));
            }
        }
        self.txn.commit().map_err(storage_err)
    }

    /// Discard the write.
    pub fn abort(self) -> Result<()> {
        self.txn.abort().map_err(storage_err)
    }
}

// ============================================================================
// Tests
// ============================================================================
